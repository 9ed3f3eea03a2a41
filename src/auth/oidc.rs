//! OpenID Connect client operations: discovery, the authorization-code flow with PKCE, the
//! userinfo endpoint and token refresh.

use crate::auth::files::Profile;
use crate::config::IdentityConfig;
use crate::Result;
use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, CsrfToken, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

/// Used when the token response does not say how long the access token lasts.
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 3600;

/// The parts of the provider's discovery document that we use.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct ProviderMetadata {
    pub(super) issuer: String,
    pub(super) authorization_endpoint: String,
    pub(super) token_endpoint: String,
    #[serde(default)]
    pub(super) userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub(super) end_session_endpoint: Option<String>,
}

/// A token set received from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Tokens {
    pub(super) access_token: String,
    pub(super) refresh_token: Option<String>,
    pub(super) expires_at: DateTime<Utc>,
    pub(super) scopes: Vec<String>,
}

impl Tokens {
    fn from_response(response: &BasicTokenResponse, requested: &[String]) -> Self {
        let lifetime = response
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .unwrap_or_else(|| Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECONDS));
        let scopes = match response.scopes() {
            Some(granted) => granted.iter().map(|s| s.to_string()).collect(),
            None => requested.to_vec(),
        };
        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expires_at: Utc::now() + lifetime,
            scopes,
        }
    }
}

/// The URL to send the user to, plus what we need to finish the flow once they come back.
pub(super) struct Authorization {
    pub(super) url: Url,
    pub(super) csrf: CsrfToken,
    pub(super) verifier: PkceCodeVerifier,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

/// Performs the OpenID Connect requests for one configured client.
pub(super) struct Oidc {
    http: reqwest::Client,
    identity: IdentityConfig,
}

impl Oidc {
    pub(super) fn new(identity: IdentityConfig) -> Result<Self> {
        // Following redirects from the token endpoint is not allowed.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Unable to create the HTTP client")?;
        Ok(Self { http, identity })
    }

    pub(super) fn identity(&self) -> &IdentityConfig {
        &self.identity
    }

    /// Fetches `{authority}/.well-known/openid-configuration`.
    pub(super) async fn discover(&self) -> Result<ProviderMetadata> {
        let url = format!(
            "{}/{DISCOVERY_PATH}",
            self.identity.authority().trim_end_matches('/')
        );
        debug!("Discovering identity provider endpoints at {url}");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Unable to reach the identity provider at {url}"))?;
        if !response.status().is_success() {
            bail!(
                "The identity provider discovery request failed with status {}",
                response.status()
            );
        }
        let metadata: ProviderMetadata = response
            .json()
            .await
            .context("Unable to parse the identity provider discovery document")?;
        trace!("{metadata:?}");
        Ok(metadata)
    }

    /// Builds the authorization URL with a fresh CSRF state and PKCE challenge.
    pub(super) fn authorize(&self, metadata: &ProviderMetadata) -> Result<Authorization> {
        let client = BasicClient::new(ClientId::new(self.identity.client_id().to_string()))
            .set_auth_uri(
                AuthUrl::new(metadata.authorization_endpoint.clone())
                    .context("Invalid authorization endpoint")?,
            )
            .set_redirect_uri(redirect_url(&self.identity)?);

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.identity.scopes().iter().cloned().map(Scope::new))
            .set_pkce_challenge(challenge)
            .url();
        Ok(Authorization {
            url,
            csrf,
            verifier,
        })
    }

    /// Exchanges an authorization code for tokens.
    pub(super) async fn exchange(
        &self,
        metadata: &ProviderMetadata,
        code: String,
        verifier: PkceCodeVerifier,
    ) -> Result<Tokens> {
        let client = BasicClient::new(ClientId::new(self.identity.client_id().to_string()))
            .set_token_uri(token_url(&metadata.token_endpoint)?)
            .set_redirect_uri(redirect_url(&self.identity)?);
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(&self.http)
            .await
            .context("Unable to exchange the authorization code for tokens")?;
        Ok(Tokens::from_response(&response, self.identity.scopes()))
    }

    /// Uses a refresh token to obtain a new access token.
    pub(super) async fn refresh(&self, token_endpoint: &str, refresh_token: &str) -> Result<Tokens> {
        let client = BasicClient::new(ClientId::new(self.identity.client_id().to_string()))
            .set_token_uri(token_url(token_endpoint)?);
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
            .context("Unable to refresh the access token")?;
        Ok(Tokens::from_response(&response, self.identity.scopes()))
    }

    /// Asks the userinfo endpoint who the access token belongs to.
    pub(super) async fn userinfo(
        &self,
        metadata: &ProviderMetadata,
        access_token: &str,
    ) -> Result<Profile> {
        let endpoint = metadata
            .userinfo_endpoint
            .as_deref()
            .context("The identity provider does not advertise a userinfo endpoint")?;
        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Unable to reach the userinfo endpoint")?;
        if !response.status().is_success() {
            bail!(
                "The userinfo request failed with status {}",
                response.status()
            );
        }
        let info: UserInfo = response
            .json()
            .await
            .context("Unable to parse the userinfo response")?;
        let email = info
            .email
            .filter(|e| !e.is_empty())
            .context("The identity provider did not return an email address, is the 'email' scope configured?")?;
        Ok(Profile::new(email, info.name.or(info.username)))
    }
}

/// Builds `{endpoint}?client_id=..&logout_uri=..`.
pub(super) fn logout_url(endpoint: &str, client_id: &str, logout_uri: &str) -> Result<Url> {
    let mut url =
        Url::parse(endpoint).with_context(|| format!("Invalid logout endpoint '{endpoint}'"))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("logout_uri", logout_uri);
    Ok(url)
}

fn token_url(endpoint: &str) -> Result<TokenUrl> {
    TokenUrl::new(endpoint.to_string())
        .with_context(|| format!("Invalid token endpoint '{endpoint}'"))
}

fn redirect_url(identity: &IdentityConfig) -> Result<RedirectUrl> {
    RedirectUrl::new(identity.redirect_uri().to_string())
        .with_context(|| format!("Invalid redirect URI '{}'", identity.redirect_uri()))
}
