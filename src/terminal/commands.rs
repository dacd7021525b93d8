// src/terminal/commands.rs
use serde_json::{Map, Value};

use crate::{controller::Action, view::Panel};

#[derive(Debug)]
pub enum Command {
    Action(Action),
    /// 1-based row of the last rendered session list.
    OpenIndex(usize),
    Usage(&'static str),
    Help,
    Quit,
}

pub const HELP: &str = "\
/login <user> <password>            sign in
/register <user> <email> <password> create an account
/show login | /show register        switch form
/new                                start a new conversation
/sessions                           reload the conversation list
/open <n|session_id>                open a conversation
/topic [text|clear]                 show, set or clear the topic
/feedback [text|clear]              show, set or clear feedback
/context [key=value ...|clear]      show, merge or clear context
/logout                             sign out
/help                               this text
/quit                               exit
anything else                       send as a message";

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Action(Action::Send(line.to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let words: Vec<&str> = args.split_whitespace().collect();

    match name {
        "login" => match words.as_slice() {
            [username, password] => Command::Action(Action::Login {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Command::Usage("/login <user> <password>"),
        },
        "register" => match words.as_slice() {
            [username, email, password] => Command::Action(Action::Register {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            }),
            _ => Command::Usage("/register <user> <email> <password>"),
        },
        "show" => match args {
            "login" => Command::Action(Action::ShowPanel(Panel::Login)),
            "register" => Command::Action(Action::ShowPanel(Panel::Register)),
            _ => Command::Usage("/show login | /show register"),
        },
        "new" => Command::Action(Action::NewChat),
        "logout" => Command::Action(Action::Logout),
        "sessions" => Command::Action(Action::RefreshSessions),
        "open" => match args {
            "" => Command::Usage("/open <n|session_id>"),
            arg => match arg.parse::<usize>() {
                Ok(n) => Command::OpenIndex(n),
                Err(_) => Command::Action(Action::OpenSession(arg.to_string())),
            },
        },
        "topic" => Command::Action(match args {
            "" => Action::ShowTopic,
            "clear" => Action::ClearTopic,
            text => Action::SetTopic(text.to_string()),
        }),
        "feedback" => Command::Action(match args {
            "" => Action::ShowFeedback,
            "clear" => Action::ClearFeedback,
            text => Action::SetFeedback(text.to_string()),
        }),
        "context" => match args {
            "" => Command::Action(Action::ShowContext),
            "clear" => Command::Action(Action::ClearContext),
            pairs => match parse_pairs(pairs) {
                Some(map) => Command::Action(Action::MergeContext(map)),
                None => Command::Usage("/context [key=value ...|clear]"),
            },
        },
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Usage("unknown command, try /help"),
    }
}

// Values that parse as JSON keep their type; everything else is a string.
fn parse_pairs(args: &str) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    for pair in args.split_whitespace() {
        let (key, raw) = pair.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(key.to_string(), value);
    }
    Some(map)
}
