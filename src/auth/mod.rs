//! Signing in with the identity provider and keeping the resulting session on disk.
//!
//! `Session::initialize` runs the interactive authorization-code flow and is the only place that
//! asks the user to open a browser. Every other command restores the saved session with
//! `Session::restore`, refreshing the access token when it is about to expire.

mod callback;
mod files;
mod oidc;

use crate::api::{Mode, DEMO_EMAIL};
use crate::config::IdentityConfig;
use crate::{utils, Config, Result};
use anyhow::{bail, Context};
use callback::CallbackServer;
use chrono::{Duration, Utc};
use files::{File, SessionData};
use oidc::Oidc;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

pub use files::Profile;

/// How long sign-in waits for the browser to come back to the redirect URI.
pub const SIGN_IN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// The message shown when a command needs a signed-in user and there is none.
pub const NOT_SIGNED_IN: &str = "You are not signed in. Run 'fintrack auth' to sign in.";

const TEST_ACCESS_TOKEN: &str = "test-access-token";
const TEST_TOKEN_ENDPOINT: &str = "test://token";

/// Where the session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// No session has been saved.
    Unauthenticated,
    /// A saved session exists but its access token must be refreshed before use.
    Loading,
    Authenticated,
    /// The saved session cannot be used.
    Error(String),
}

/// The signed-in user's session.
#[derive(Debug)]
pub struct Session {
    identity: IdentityConfig,
    mode: Mode,
    file: Option<File<SessionData>>,
    status: AuthStatus,
}

impl Session {
    /// Runs the interactive sign-in and saves the session. In `Mode::Testing` the session is for
    /// the demo user and no network is used.
    pub async fn initialize(config: &Config, mode: Mode) -> Result<Self> {
        let data = match mode {
            Mode::Remote => {
                let oidc = Oidc::new(config.identity().clone())?;
                sign_in(&oidc, |url| {
                    info!("Open this URL in your browser to sign in:\n\n{url}\n");
                    info!(
                        "Waiting up to {} minutes for sign-in to complete",
                        SIGN_IN_TIMEOUT.as_secs() / 60
                    );
                })
                .await?
            }
            Mode::Testing => test_session(),
        };
        let file = File::new(config.session_path(), data);
        file.save().await.context("Unable to save the session")?;
        info!("Signed in as {}", file.data().profile().email());
        Ok(Self {
            identity: config.identity().clone(),
            mode,
            file: Some(file),
            status: AuthStatus::Authenticated,
        })
    }

    /// Reads the saved session without touching the network.
    pub async fn load(config: &Config, mode: Mode) -> Self {
        let path = config.session_path();
        let mut session = Self {
            identity: config.identity().clone(),
            mode,
            file: None,
            status: AuthStatus::Unauthenticated,
        };
        if !path.is_file() {
            debug!("No session file at {}", path.display());
            return session;
        }
        match File::<SessionData>::load(&path).await {
            Ok(file) => {
                session.status = if !file.data().is_expired() {
                    AuthStatus::Authenticated
                } else if file.data().refresh_token().is_some() {
                    AuthStatus::Loading
                } else {
                    AuthStatus::Error("Your session has expired".to_string())
                };
                session.file = Some(file);
            }
            Err(e) => {
                warn!("Unable to read the session file: {e:#}");
                session.status = AuthStatus::Error("Your saved session is unreadable".to_string());
            }
        }
        session
    }

    /// Loads the saved session and refreshes the access token if it is about to expire. A
    /// failed refresh leaves the session in `AuthStatus::Error`.
    pub async fn restore(config: &Config, mode: Mode) -> Self {
        let mut session = Self::load(config, mode).await;
        if session.status == AuthStatus::Loading {
            if let Err(e) = session.refresh().await {
                warn!("{e:#}");
                session.status = AuthStatus::Error("Your session could not be renewed".to_string());
            }
        }
        session
    }

    pub fn status(&self) -> &AuthStatus {
        &self.status
    }

    /// Where the session is saved, when there is one.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path())
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    /// The signed-in user, only when authenticated.
    pub fn profile(&self) -> Option<&Profile> {
        match (&self.status, &self.file) {
            (AuthStatus::Authenticated, Some(file)) => Some(file.data().profile()),
            _ => None,
        }
    }

    /// The access token, only when authenticated.
    pub fn access_token(&self) -> Option<&str> {
        match (&self.status, &self.file) {
            (AuthStatus::Authenticated, Some(file)) => Some(file.data().access_token()),
            _ => None,
        }
    }

    /// Returns the signed-in user or an error telling the user how to sign in.
    pub fn require(&self) -> Result<&Profile> {
        match &self.status {
            AuthStatus::Authenticated => self.profile().context(NOT_SIGNED_IN),
            AuthStatus::Unauthenticated => bail!(NOT_SIGNED_IN),
            AuthStatus::Loading => bail!("The session has not been restored yet"),
            AuthStatus::Error(message) => {
                bail!("{message}. Run 'fintrack auth' to sign in again.")
            }
        }
    }

    /// Obtains a new access token with the refresh token and saves it.
    pub async fn refresh(&mut self) -> Result<()> {
        let file = self.file.as_mut().context(NOT_SIGNED_IN)?;
        match self.mode {
            Mode::Remote => {
                let refresh_token = file
                    .data()
                    .refresh_token()
                    .context("The session has no refresh token")?
                    .to_string();
                let token_endpoint = file.data().token_endpoint().to_string();
                let tokens = Oidc::new(self.identity.clone())?
                    .refresh(&token_endpoint, &refresh_token)
                    .await?;
                file.data_mut()
                    .update(tokens.access_token, tokens.expires_at, tokens.refresh_token);
            }
            Mode::Testing => {
                let access_token = file.data().access_token().to_string();
                file.data_mut()
                    .update(access_token, Utc::now() + Duration::hours(1), None);
            }
        }
        file.save().await.context("Unable to save the refreshed session")?;
        debug!(
            "Access token refreshed, valid until {}",
            file.data().expires_at()
        );
        self.status = AuthStatus::Authenticated;
        Ok(())
    }
}

/// Removes the saved session, then returns the provider's logout URL if one is known. The local
/// session is gone even when the logout URL cannot be determined.
pub async fn sign_out(config: &Config, mode: Mode) -> Result<Option<Url>> {
    let path = config.session_path();
    if utils::remove_file(&path).await? {
        debug!("Removed {}", path.display());
    } else {
        debug!("There was no session file at {}", path.display());
    }

    let identity = config.identity();
    let endpoint = match (identity.logout_endpoint(), mode) {
        (Some(endpoint), _) => Some(endpoint.to_string()),
        (None, Mode::Testing) => None,
        (None, Mode::Remote) => match discover_logout_endpoint(identity).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!("Unable to look up the logout endpoint: {e:#}");
                None
            }
        },
    };
    endpoint
        .map(|e| oidc::logout_url(&e, identity.client_id(), identity.logout_uri()))
        .transpose()
}

async fn discover_logout_endpoint(identity: &IdentityConfig) -> Result<Option<String>> {
    let metadata = Oidc::new(identity.clone())?.discover().await?;
    Ok(metadata.end_session_endpoint)
}

/// The authorization-code flow. `open` is given the URL the user must visit once the callback
/// server is listening.
async fn sign_in(oidc: &Oidc, open: impl FnOnce(&Url)) -> Result<SessionData> {
    let metadata = oidc.discover().await?;
    debug!("Signing in with {}", metadata.issuer);
    let redirect_uri = oidc.identity().redirect_uri();
    let redirect =
        Url::parse(redirect_uri).with_context(|| format!("Invalid redirect URI '{redirect_uri}'"))?;
    let server = CallbackServer::bind(&redirect).await?;
    let authorization = oidc.authorize(&metadata)?;
    open(&authorization.url);

    let params = server.wait(SIGN_IN_TIMEOUT).await?;
    if params.state != *authorization.csrf.secret() {
        bail!("The sign-in response does not match the request that was sent");
    }
    let tokens = oidc
        .exchange(&metadata, params.code, authorization.verifier)
        .await?;
    let profile = oidc.userinfo(&metadata, &tokens.access_token).await?;
    Ok(SessionData::new(
        profile,
        tokens.access_token,
        tokens.refresh_token,
        tokens.expires_at,
        tokens.scopes,
        metadata.token_endpoint,
    ))
}

fn test_session() -> SessionData {
    SessionData::new(
        Profile::new(DEMO_EMAIL, Some("Demo User".to_string())),
        TEST_ACCESS_TOKEN.to_string(),
        Some("test-refresh-token".to_string()),
        Utc::now() + Duration::hours(1),
        Vec::new(),
        TEST_TOKEN_ENDPOINT.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{MockServer, TestEnv};

    #[tokio::test]
    async fn test_signed_in_env() {
        let env = TestEnv::new().await;
        let session = Session::restore(&env.config(), Mode::Testing).await;
        assert!(session.is_authenticated());
        assert_eq!(session.require().unwrap().email(), DEMO_EMAIL);
        assert_eq!(session.access_token(), Some(TEST_ACCESS_TOKEN));
    }

    #[tokio::test]
    async fn test_no_session() {
        let env = TestEnv::signed_out().await;
        let session = Session::restore(&env.config(), Mode::Testing).await;
        assert_eq!(session.status(), &AuthStatus::Unauthenticated);
        assert!(session.profile().is_none());
        assert!(session.access_token().is_none());
        assert_eq!(session.require().unwrap_err().to_string(), NOT_SIGNED_IN);
    }

    #[tokio::test]
    async fn test_unreadable_session() {
        let env = TestEnv::signed_out().await;
        std::fs::write(env.config().session_path(), "not json").unwrap();
        let session = Session::restore(&env.config(), Mode::Testing).await;
        assert!(matches!(session.status(), AuthStatus::Error(_)));
        assert!(session
            .require()
            .unwrap_err()
            .to_string()
            .contains("fintrack auth"));
    }

    async fn write_session(env: &TestEnv, expires_in: Duration, refresh: Option<&str>) {
        write_session_at(env, expires_in, refresh, TEST_TOKEN_ENDPOINT).await
    }

    async fn write_session_at(
        env: &TestEnv,
        expires_in: Duration,
        refresh: Option<&str>,
        token_endpoint: &str,
    ) {
        let data = SessionData::new(
            Profile::new(DEMO_EMAIL, None),
            "old-token".to_string(),
            refresh.map(str::to_string),
            Utc::now() + expires_in,
            Vec::new(),
            token_endpoint.to_string(),
        );
        File::new(env.config().session_path(), data)
            .save()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expiring_session_is_refreshed() {
        let env = TestEnv::signed_out().await;
        write_session(&env, Duration::minutes(2), Some("r")).await;

        let loaded = Session::load(&env.config(), Mode::Testing).await;
        assert_eq!(loaded.status(), &AuthStatus::Loading);
        assert!(loaded.require().is_err());

        let restored = Session::restore(&env.config(), Mode::Testing).await;
        assert!(restored.is_authenticated());
        let reloaded = Session::load(&env.config(), Mode::Testing).await;
        assert!(reloaded.is_authenticated());
    }

    async fn saved_session(env: &TestEnv) -> SessionData {
        File::<SessionData>::load(env.config().session_path())
            .await
            .unwrap()
            .data()
            .clone()
    }

    #[tokio::test]
    async fn test_restore_refreshes_with_provider() {
        let provider = MockServer::start(|_| {
            (
                200,
                r#"{"access_token":"new-token","token_type":"bearer","expires_in":3600}"#
                    .to_string(),
            )
        })
        .await;
        let env = TestEnv::signed_out().await;
        let token_endpoint = format!("{}token", provider.url());
        write_session_at(&env, Duration::minutes(2), Some("r-old"), &token_endpoint).await;

        let session = Session::restore(&env.config(), Mode::Remote).await;
        assert!(session.is_authenticated());
        assert_eq!(session.access_token(), Some("new-token"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/token");
        assert!(requests[0].body.contains("grant_type=refresh_token"));
        assert!(requests[0].body.contains("refresh_token=r-old"));

        // The provider did not rotate the refresh token, so the old one is kept on disk.
        let saved = saved_session(&env).await;
        assert_eq!(saved.access_token(), "new-token");
        assert_eq!(saved.refresh_token(), Some("r-old"));
        assert!(!saved.is_expired());
    }

    #[tokio::test]
    async fn test_restore_with_rejected_refresh_token() {
        let provider =
            MockServer::start(|_| (400, r#"{"error":"invalid_grant"}"#.to_string())).await;
        let env = TestEnv::signed_out().await;
        let token_endpoint = format!("{}token", provider.url());
        write_session_at(&env, Duration::minutes(2), Some("r-old"), &token_endpoint).await;

        let session = Session::restore(&env.config(), Mode::Remote).await;
        assert_eq!(
            session.status(),
            &AuthStatus::Error("Your session could not be renewed".to_string())
        );
        assert!(session.access_token().is_none());
        assert_eq!(
            session.require().unwrap_err().to_string(),
            "Your session could not be renewed. Run 'fintrack auth' to sign in again."
        );
        assert_eq!(provider.requests().len(), 1);

        let saved = saved_session(&env).await;
        assert_eq!(saved.access_token(), "old-token");
        assert_eq!(saved.refresh_token(), Some("r-old"));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let env = TestEnv::signed_out().await;
        write_session(&env, Duration::minutes(-10), None).await;
        let session = Session::restore(&env.config(), Mode::Testing).await;
        assert_eq!(
            session.status(),
            &AuthStatus::Error("Your session has expired".to_string())
        );
    }

    #[tokio::test]
    async fn test_sign_out_removes_session() {
        let env = TestEnv::new().await;
        assert!(env.config().session_path().is_file());
        let url = sign_out(&env.config(), Mode::Testing).await.unwrap();
        assert!(url.is_none());
        assert!(!env.config().session_path().is_file());
        let session = Session::restore(&env.config(), Mode::Testing).await;
        assert_eq!(session.status(), &AuthStatus::Unauthenticated);

        // A second sign-out is not an error.
        sign_out(&env.config(), Mode::Testing).await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_out_with_logout_endpoint() {
        let env = TestEnv::with_identity(
            IdentityConfig::new("https://auth.example.com", "client-1")
                .with_logout_endpoint(Some("https://auth.example.com/logout".to_string())),
        )
        .await;
        Session::initialize(&env.config(), Mode::Testing)
            .await
            .unwrap();
        let url = sign_out(&env.config(), Mode::Testing).await.unwrap().unwrap();
        assert_eq!(
            url.as_str(),
            "https://auth.example.com/logout?client_id=client-1&logout_uri=http%3A%2F%2Flocalhost%3A5173%2F"
        );
        assert!(!env.config().session_path().is_file());
    }

    #[tokio::test]
    async fn test_sign_out_discovers_logout_endpoint() {
        let provider = MockServer::start(|request| match request.path.as_str() {
            "/.well-known/openid-configuration" => {
                let base = format!("http://{}", request.host.as_deref().unwrap_or_default());
                (
                    200,
                    serde_json::json!({
                        "issuer": base,
                        "authorization_endpoint": format!("{base}/authorize"),
                        "token_endpoint": format!("{base}/token"),
                        "end_session_endpoint": format!("{base}/logout"),
                    })
                    .to_string(),
                )
            }
            _ => (404, String::new()),
        })
        .await;
        let env =
            TestEnv::with_identity(IdentityConfig::new(provider.url().as_str(), "client-1")).await;
        Session::initialize(&env.config(), Mode::Testing)
            .await
            .unwrap();

        let url = sign_out(&env.config(), Mode::Remote).await.unwrap().unwrap();
        assert_eq!(
            url.as_str(),
            format!(
                "{}logout?client_id=client-1&logout_uri=http%3A%2F%2Flocalhost%3A5173%2F",
                provider.url()
            )
        );
        assert!(!env.config().session_path().is_file());
        assert_eq!(
            provider.requests()[0].path,
            "/.well-known/openid-configuration"
        );
    }

    #[tokio::test]
    async fn test_sign_out_without_discovery() {
        let provider = MockServer::start(|_| (404, String::new())).await;
        let env =
            TestEnv::with_identity(IdentityConfig::new(provider.url().as_str(), "client-1")).await;
        Session::initialize(&env.config(), Mode::Testing)
            .await
            .unwrap();

        let url = sign_out(&env.config(), Mode::Remote).await.unwrap();
        assert!(url.is_none());
        assert!(!env.config().session_path().is_file());
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_flow() {
        let provider = MockServer::start(|request| match request.path.as_str() {
            "/.well-known/openid-configuration" => {
                let base = format!("http://{}", request.host.as_deref().unwrap_or_default());
                (
                    200,
                    serde_json::json!({
                        "issuer": base,
                        "authorization_endpoint": format!("{base}/authorize"),
                        "token_endpoint": format!("{base}/token"),
                        "userinfo_endpoint": format!("{base}/userinfo"),
                    })
                    .to_string(),
                )
            }
            "/token" => (
                200,
                r#"{"access_token":"a1","token_type":"bearer","expires_in":600,"refresh_token":"r1"}"#
                    .to_string(),
            ),
            "/userinfo" => (200, r#"{"email":"me@example.com","name":"Me"}"#.to_string()),
            _ => (404, String::new()),
        })
        .await;

        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let identity = IdentityConfig::new(provider.url().as_str(), "client-1")
            .with_redirect_uri(format!("http://127.0.0.1:{port}/"));
        let oidc = Oidc::new(identity).unwrap();

        let data = sign_in(&oidc, |url| {
            let state = url
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            tokio::spawn(async move {
                reqwest::get(format!("http://127.0.0.1:{port}/?code=c1&state={state}"))
                    .await
                    .unwrap();
            });
        })
        .await
        .unwrap();

        assert_eq!(data.profile().email(), "me@example.com");
        assert_eq!(data.access_token(), "a1");
        assert_eq!(data.refresh_token(), Some("r1"));
        assert!(data.token_endpoint().ends_with("/token"));
    }

    #[tokio::test]
    async fn test_sign_in_state_mismatch() {
        let provider = MockServer::start(|request| {
            let base = format!("http://{}", request.host.as_deref().unwrap_or_default());
            (
                200,
                serde_json::json!({
                    "issuer": base,
                    "authorization_endpoint": format!("{base}/authorize"),
                    "token_endpoint": format!("{base}/token"),
                })
                .to_string(),
            )
        })
        .await;
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let identity = IdentityConfig::new(provider.url().as_str(), "client-1")
            .with_redirect_uri(format!("http://127.0.0.1:{port}/"));
        let oidc = Oidc::new(identity).unwrap();

        let err = sign_in(&oidc, |_| {
            tokio::spawn(async move {
                reqwest::get(format!("http://127.0.0.1:{port}/?code=c1&state=forged"))
                    .await
                    .unwrap();
            });
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));
        assert_eq!(
            provider
                .requests()
                .iter()
                .filter(|r| r.path == "/token")
                .count(),
            0
        );
    }
}
