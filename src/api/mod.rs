//! The remote transactions API.
//!
//! The `Api` trait forwards the four operations of the transactions resource. There are two
//! implementations: `HttpApi`, which talks to the real service, and `TestApi`, which keeps data in
//! memory so that the whole program can run without the network.

mod http;
mod test_api;

use crate::model::{DeletePayload, Transaction, TransactionPayload};
use crate::{Config, Result};
use tracing::debug;

pub(crate) use http::HttpApi;
pub(crate) use test_api::{TestApi, DEMO_EMAIL};
#[cfg(test)]
pub(crate) use test_api::TestApiState;

/// The path of the transactions resource, relative to the configured API URL.
pub(crate) const TRANSACTIONS: &str = "transactions";

/// Environment variable that switches the program into `Mode::Testing`.
pub const TEST_MODE_ENV: &str = "FINTRACK_IN_TEST_MODE";

/// The operations of the remote transactions resource. Each call is a single request, there is
/// no retry and no deduplication.
#[async_trait::async_trait]
pub trait Api {
    /// `GET /transactions?email=<email>`
    async fn list(&self, email: &str) -> Result<Vec<Transaction>>;

    /// `POST /transactions`
    async fn create(&self, payload: &TransactionPayload) -> Result<()>;

    /// `PATCH /transactions`
    async fn update(&self, payload: &TransactionPayload) -> Result<()>;

    /// `DELETE /transactions`
    async fn delete(&self, payload: &DeletePayload) -> Result<()>;
}

/// Whether to talk to the real services or to in-memory stand-ins.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Remote,
    Testing,
}

impl Mode {
    /// Returns `Mode::Testing` when `FINTRACK_IN_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::Remote`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Remote,
        }
    }
}

/// Creates the `Api` for `mode`. `token` is sent as a bearer token when present.
pub(crate) fn api(config: &Config, token: Option<String>, mode: Mode) -> Box<dyn Api + Send + Sync> {
    match mode {
        Mode::Remote => {
            debug!("Using the transactions API at {}", config.api_url());
            Box::new(HttpApi::new(config.api_url().clone(), token))
        }
        Mode::Testing => {
            debug!("Using the in-memory transactions API");
            Box::new(TestApi::new(config.api_url().as_str()))
        }
    }
}
