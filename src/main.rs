use std::sync::Arc;

use chat_client::{
    Action, ChatClientController, ClientConfig, HttpChatApi,
    terminal::{
        TerminalView,
        commands::{Command, HELP, parse_command},
    },
    view::{Control, Route},
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Controller = ChatClientController<HttpChatApi, TerminalView>;

enum PageExit {
    Navigate(Route),
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    // One HTTP client for the whole run so the login cookie survives page changes.
    let api = HttpChatApi::new(config.clone())?;
    info!(base_url = %config.base_url, "chat client starting");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut route = Route::Login;

    loop {
        let view = Arc::new(TerminalView::new(route, config.banner_ttl));
        let controller = Arc::new(ChatClientController::new(
            api.clone(),
            Arc::clone(&view),
            &config,
        ));

        if config.push_enabled {
            match api.push_channel() {
                Ok(channel) => controller.attach_push(channel.open(None)),
                Err(e) => warn!(error = %e, "push channel disabled"),
            }
        }

        view.print_intro();
        controller.init().await;

        let exit = run_page(&controller, &view, &mut lines).await?;
        controller.shutdown();
        match exit {
            PageExit::Navigate(next) => route = next,
            PageExit::Quit => break,
        }
    }

    Ok(())
}

async fn run_page(
    controller: &Arc<Controller>,
    view: &TerminalView,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<PageExit> {
    loop {
        if let Some(next) = view.take_navigation() {
            return Ok(PageExit::Navigate(next));
        }

        view.prompt();
        let Some(line) = lines.next_line().await? else {
            return Ok(PageExit::Quit);
        };

        match parse_command(&line) {
            Command::Quit => return Ok(PageExit::Quit),
            Command::Help => view.note(HELP),
            Command::Usage(usage) => view.note(usage),
            Command::OpenIndex(n) => match view.session_at(n) {
                Some(session_id) => {
                    controller.dispatch(Action::OpenSession(session_id)).await;
                }
                None => view.note("no such conversation, try /sessions"),
            },
            // Sends run in the background so the prompt stays usable while
            // the reply is pending.
            Command::Action(action @ Action::Send(_)) => {
                if !controller.is_bound(Control::MessageInput) {
                    view.note("sign in first, see /help");
                    continue;
                }
                let controller = Arc::clone(controller);
                tokio::spawn(async move {
                    controller.dispatch(action).await;
                });
            }
            Command::Action(action) => {
                if !controller.dispatch(action).await {
                    view.note("not available on this page");
                }
            }
        }
    }
}
