// src/services/api.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, cookie::Jar, header, redirect};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    config::ClientConfig,
    error::{ClientError, ClientResult},
    message::{
        ChatRecord, ContextRequest, ContextResponse, ErrorBody, FeedbackRequest, FeedbackResponse,
        HistoryResponse, LoginRequest, ProfileResponse, RegisterRequest, SendMessageRequest,
        SendMessageResponse, SessionSummary, SessionsResponse, TopicRequest, TopicResponse, User,
    },
    services::push::PushChannel,
};

/// The backend as seen from the client: one method per endpoint.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> ClientResult<()>;
    async fn register(&self, request: &RegisterRequest) -> ClientResult<()>;
    async fn profile(&self) -> ClientResult<User>;
    async fn logout(&self) -> ClientResult<()>;

    async fn send_message(&self, request: &SendMessageRequest) -> ClientResult<SendMessageResponse>;
    async fn sessions(&self) -> ClientResult<Vec<SessionSummary>>;
    async fn history(&self, session_id: &str) -> ClientResult<Vec<ChatRecord>>;

    async fn topic(&self, session_id: &str) -> ClientResult<Option<String>>;
    async fn set_topic(&self, session_id: &str, topic: &str) -> ClientResult<Option<String>>;
    async fn delete_topic(&self, session_id: &str) -> ClientResult<()>;

    async fn feedback(&self, session_id: &str) -> ClientResult<Option<String>>;
    async fn set_feedback(&self, session_id: &str, feedback: &str) -> ClientResult<Option<String>>;
    async fn delete_feedback(&self, session_id: &str) -> ClientResult<()>;

    async fn context(&self, session_id: &str) -> ClientResult<Option<Map<String, Value>>>;
    /// The server merges the given keys into the stored context and returns
    /// the result.
    async fn merge_context(
        &self,
        session_id: &str,
        context: &Map<String, Value>,
    ) -> ClientResult<Option<Map<String, Value>>>;
    async fn delete_context(&self, session_id: &str) -> ClientResult<()>;
}

/// `ChatApi` over HTTP. The login cookie lives in `cookies`, so one
/// `HttpChatApi` (and its clones) represents one signed-in browser session.
///
/// Redirects are not followed: the server answers anonymous API calls with
/// a redirect to its HTML login page, which surfaces as
/// [`ClientError::Redirected`].
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    cookies: Arc<Jar>,
    config: ClientConfig,
}

impl HttpChatApi {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let cookies = Arc::new(Jar::default());
        let mut builder = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .redirect(redirect::Policy::none());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            cookies,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Push channel for this backend, authenticated with the same cookies
    /// as the HTTP calls.
    pub fn push_channel(&self) -> ClientResult<PushChannel> {
        let origin = Url::parse(&self.config.base_url)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        Ok(PushChannel::new(self.config.push_url()?)
            .with_cookies(Arc::clone(&self.cookies), origin))
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    fn session_url(&self, session_id: &str, field: &str) -> String {
        self.url(&format!("/api/chat/session/{session_id}/{field}"))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.send(request).await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.bytes().await?;
        debug!(%status, path = %url, bytes = body.len(), "response received");

        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }
        Err(error_from_body(status, &body))
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await?;
        if response.status().is_redirection() {
            return Err(redirect_error(&response));
        }
        Ok(response)
    }

    /// For endpoints whose success body is not inspected.
    async fn execute_unit(&self, request: RequestBuilder) -> ClientResult<()> {
        self.execute::<IgnoredAny>(request).await.map(|_| ())
    }
}

fn error_from_body(status: StatusCode, body: &[u8]) -> ClientError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => ClientError::Api { status, message: error },
        Err(_) => ClientError::Status(status),
    }
}

fn redirect_error(response: &Response) -> ClientError {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    debug!(status = %response.status(), ?location, "redirect not followed");
    ClientError::Redirected { status: response.status(), location }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn login(&self, request: &LoginRequest) -> ClientResult<()> {
        self.execute_unit(self.client.post(self.url("/api/auth/login")).json(request))
            .await
    }

    async fn register(&self, request: &RegisterRequest) -> ClientResult<()> {
        self.execute_unit(self.client.post(self.url("/api/auth/register")).json(request))
            .await
    }

    async fn profile(&self) -> ClientResult<User> {
        let body: ProfileResponse = self
            .execute(self.client.get(self.url("/api/auth/profile")))
            .await?;
        Ok(body.user)
    }

    async fn logout(&self) -> ClientResult<()> {
        let response = self.send(self.client.post(self.url("/api/auth/logout"))).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await?;
        Err(error_from_body(status, &body))
    }

    async fn send_message(&self, request: &SendMessageRequest) -> ClientResult<SendMessageResponse> {
        self.execute(self.client.post(self.url("/api/chat/send")).json(request))
            .await
    }

    async fn sessions(&self) -> ClientResult<Vec<SessionSummary>> {
        let body: SessionsResponse = self
            .execute(self.client.get(self.url("/api/chat/sessions")))
            .await?;
        Ok(body.sessions)
    }

    async fn history(&self, session_id: &str) -> ClientResult<Vec<ChatRecord>> {
        let body: HistoryResponse = self
            .execute(self.client.get(self.url(&format!("/api/chat/history/{session_id}"))))
            .await?;
        Ok(body.messages)
    }

    async fn topic(&self, session_id: &str) -> ClientResult<Option<String>> {
        let body: TopicResponse = self
            .execute(self.client.get(self.session_url(session_id, "topic")))
            .await?;
        Ok(body.topic)
    }

    async fn set_topic(&self, session_id: &str, topic: &str) -> ClientResult<Option<String>> {
        let body: TopicResponse = self
            .execute(
                self.client
                    .post(self.session_url(session_id, "topic"))
                    .json(&TopicRequest { topic }),
            )
            .await?;
        Ok(body.topic)
    }

    async fn delete_topic(&self, session_id: &str) -> ClientResult<()> {
        self.execute_unit(self.client.delete(self.session_url(session_id, "topic")))
            .await
    }

    async fn feedback(&self, session_id: &str) -> ClientResult<Option<String>> {
        let body: FeedbackResponse = self
            .execute(self.client.get(self.session_url(session_id, "feedback")))
            .await?;
        Ok(body.feedback)
    }

    async fn set_feedback(&self, session_id: &str, feedback: &str) -> ClientResult<Option<String>> {
        let body: FeedbackResponse = self
            .execute(
                self.client
                    .post(self.session_url(session_id, "feedback"))
                    .json(&FeedbackRequest { feedback }),
            )
            .await?;
        Ok(body.feedback)
    }

    async fn delete_feedback(&self, session_id: &str) -> ClientResult<()> {
        self.execute_unit(self.client.delete(self.session_url(session_id, "feedback")))
            .await
    }

    async fn context(&self, session_id: &str) -> ClientResult<Option<Map<String, Value>>> {
        let body: ContextResponse = self
            .execute(self.client.get(self.session_url(session_id, "context")))
            .await?;
        Ok(body.context)
    }

    async fn merge_context(
        &self,
        session_id: &str,
        context: &Map<String, Value>,
    ) -> ClientResult<Option<Map<String, Value>>> {
        let body: ContextResponse = self
            .execute(
                self.client
                    .post(self.session_url(session_id, "context"))
                    .json(&ContextRequest { context }),
            )
            .await?;
        Ok(body.context)
    }

    async fn delete_context(&self, session_id: &str) -> ClientResult<()> {
        self.execute_unit(self.client.delete(self.session_url(session_id, "context")))
            .await
    }
}
