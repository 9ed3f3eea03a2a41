//! Implements the `Api` trait with `reqwest`.

use crate::api::{Api, TRANSACTIONS};
use crate::model::{DeletePayload, Transaction, TransactionPayload};
use crate::Result;
use anyhow::Context;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

/// Talks to the transactions API over HTTP. The bearer token, if any, is attached to every
/// request.
pub(crate) struct HttpApi {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpApi {
    pub(crate) fn new(base: Url, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
            token,
        }
    }

    fn endpoint(&self) -> Result<Url> {
        self.base
            .join(TRANSACTIONS)
            .with_context(|| format!("Unable to build the transactions URL from {}", self.base))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<B>(&self, method: Method, body: &B) -> Result<()>
    where
        B: Serialize + Sync,
    {
        let url = self.endpoint()?;
        trace!("{method} {url}");
        let response = self
            .request(method.clone(), url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {method} request to the transactions API"))?;
        check_status(response, &method).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Api for HttpApi {
    async fn list(&self, email: &str) -> Result<Vec<Transaction>> {
        let mut url = self.endpoint()?;
        url.query_pairs_mut().append_pair("email", email);
        debug!("Fetching transactions for {email}");
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .context("Failed to send GET request to the transactions API")?;
        let response = check_status(response, &Method::GET).await?;
        let transactions: Vec<Transaction> = response
            .json()
            .await
            .context("Failed to parse the transactions API response")?;
        debug!("Received {} transactions", transactions.len());
        Ok(transactions)
    }

    async fn create(&self, payload: &TransactionPayload) -> Result<()> {
        self.send_json(Method::POST, payload).await
    }

    async fn update(&self, payload: &TransactionPayload) -> Result<()> {
        self.send_json(Method::PATCH, payload).await
    }

    async fn delete(&self, payload: &DeletePayload) -> Result<()> {
        self.send_json(Method::DELETE, payload).await
    }
}

/// Turns a non-success status into an error that includes the response body.
async fn check_status(response: Response, method: &Method) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response body".to_string());
    anyhow::bail!("Transactions API {method} failed with status {status}: {body}")
}
