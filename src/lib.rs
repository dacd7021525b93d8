pub mod config;
pub mod controller;
pub mod error;
pub mod message;
pub mod services;
pub mod state;
pub mod terminal;
pub mod view;

pub use config::ClientConfig;
pub use controller::{Action, ChatClientController, SendOutcome};
pub use error::{ClientError, ClientResult};
pub use services::api::{ChatApi, HttpChatApi};
pub use view::View;
