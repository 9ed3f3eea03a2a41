//! Command handlers for the fintrack CLI.
//!
//! This module contains implementations for all CLI subcommands. Commands that work with
//! transactions each behave like one visit to the dashboard: they restore the session, load the
//! collection, apply one change and render the result.

mod add;
mod auth;
mod delete;
mod edit;
mod init;
mod show;

use crate::api::{self, Api, Mode};
use crate::auth::Session;
use crate::dashboard::{render, Dashboard, View};
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use add::add;
pub use auth::{auth, auth_verify, sign_out};
pub use delete::delete;
pub use edit::edit;
pub use init::init;
pub use show::show;

/// The output type for a command. This allows the command to return a consistent message,
/// optionally structured data, and optionally text to print for the user.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,

    /// Text to print on stdout, e.g. the rendered dashboard.
    #[serde(skip)]
    display: Option<String>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
            display: None,
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
            display: None,
        }
    }

    /// Adds text that `print` writes to stdout.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    /// Print the display text to stdout, the message to `info!` and the structured data (if it
    /// exists) as JSON to `debug!`.
    pub fn print(&self) {
        if let Some(display) = self.display() {
            println!("{display}");
        }
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// A signed-in user with a loaded dashboard.
struct Screen {
    email: String,
    api: Box<dyn Api + Send + Sync>,
    dashboard: Dashboard,
}

impl Screen {
    /// Requires an authenticated session, then loads the user's transactions.
    async fn open(config: &Config, mode: Mode) -> Result<Self> {
        let session = Session::restore(config, mode).await;
        let email = session
            .require()
            .pub_result(ErrorType::Auth)?
            .email()
            .to_string();
        let api = api::api(config, session.access_token().map(str::to_string), mode);
        let mut dashboard = Dashboard::new();
        dashboard
            .load(api.as_ref(), &email)
            .await
            .pub_result(ErrorType::Fetch)?;
        Ok(Self {
            email,
            api,
            dashboard,
        })
    }

    /// The rendered dashboard with `message`.
    fn out(&self, message: impl Into<String>) -> Out<View> {
        let view = self.dashboard.view();
        let text = render::render(&view, Some(&self.email));
        Out::new(message, view).with_display(text)
    }
}
