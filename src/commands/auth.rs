//! Authentication command handlers.
//!
//! This module implements the CLI commands for:
//! - `fintrack auth` - Interactive sign-in with the identity provider
//! - `fintrack auth --verify` - Verify and refresh the saved session
//! - `fintrack sign-out` - Forget the saved session

use crate::api::Mode;
use crate::auth::{self, Profile, Session};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;

/// Handles the `fintrack auth` command - runs the sign-in flow
///
/// This is the ONLY command that asks the user to open a browser.
///
/// 1. Discovers the identity provider's endpoints
/// 2. Prints the authorization URL and waits for the redirect on the configured redirect URI
/// 3. Exchanges the code for tokens, fetches the user's profile and saves the session
pub async fn auth(config: &Config, mode: Mode) -> Result<Out<Profile>> {
    let session = Session::initialize(config, mode)
        .await
        .context("Sign-in failed")
        .pub_result(ErrorType::Auth)?;
    let profile = session.require().pub_result(ErrorType::Auth)?.clone();
    Ok(Out::new(
        format!("Signed in as {}", profile.display_name()),
        profile,
    ))
}

/// Handles the `fintrack auth --verify` command - verifies the saved session
///
/// This command NEVER opens a browser. It refreshes the access token to prove that the saved
/// session still works. If the session is missing or cannot be refreshed, it fails with an error
/// telling the user to run `fintrack auth`.
pub async fn auth_verify(config: &Config, mode: Mode) -> Result<Out<Profile>> {
    let mut session = Session::load(config, mode).await;
    session
        .refresh()
        .await
        .context(
            "Unable to refresh the saved session. \n\n\
            You should run 'fintrack auth' (without the --verify flag).",
        )
        .pub_result(ErrorType::Auth)?;
    let profile = session.require().pub_result(ErrorType::Auth)?.clone();
    Ok(Out::new(
        format!("Your session for {} is valid!", profile.email()),
        profile,
    ))
}

/// Handles the `fintrack sign-out` command. The local session is removed first, then the
/// identity provider's logout URL is printed so the user can end the provider session too.
pub async fn sign_out(config: &Config, mode: Mode) -> Result<Out<Option<String>>> {
    let logout_url = auth::sign_out(config, mode)
        .await
        .pub_result(ErrorType::Auth)?
        .map(|url| url.to_string());
    Ok(match logout_url {
        Some(url) => Out::new(
            "Signed out. Open this URL to also sign out of your identity provider",
            Some(url.clone()),
        )
        .with_display(url),
        None => Out::new("Signed out", None),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DEMO_EMAIL;
    use crate::config::IdentityConfig;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_auth_in_test_mode() {
        let env = TestEnv::signed_out().await;
        let out = auth(&env.config(), Mode::Testing).await.unwrap();
        assert_eq!(out.structure().unwrap().email(), DEMO_EMAIL);
        assert!(env.config().session_path().is_file());
    }

    #[tokio::test]
    async fn test_verify() {
        let env = TestEnv::new().await;
        let out = auth_verify(&env.config(), Mode::Testing).await.unwrap();
        assert!(out.message().contains(DEMO_EMAIL));
    }

    #[tokio::test]
    async fn test_verify_without_session() {
        let env = TestEnv::signed_out().await;
        let err = auth_verify(&env.config(), Mode::Testing)
            .await
            .unwrap_err();
        assert_eq!(crate::error::error_type(&err), Some(ErrorType::Auth));
        assert!(err.to_string().contains("fintrack auth"));
    }

    #[tokio::test]
    async fn test_sign_out() {
        let env = TestEnv::new().await;
        let out = sign_out(&env.config(), Mode::Testing).await.unwrap();
        assert_eq!(out.message(), "Signed out");
        assert!(!env.config().session_path().is_file());
    }

    #[tokio::test]
    async fn test_sign_out_prints_logout_url() {
        let env = TestEnv::with_identity(
            IdentityConfig::new("https://auth.example.com", "client-1")
                .with_logout_endpoint(Some("https://auth.example.com/logout".to_string()))
                .with_logout_uri(Some("https://app.example.com/".to_string())),
        )
        .await;
        let out = sign_out(&env.config(), Mode::Testing).await.unwrap();
        let url = out.display().unwrap();
        assert!(url.starts_with("https://auth.example.com/logout?client_id=client-1"));
        assert!(url.contains("logout_uri=https%3A%2F%2Fapp.example.com%2F"));
    }
}
