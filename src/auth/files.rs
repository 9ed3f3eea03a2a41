//! Serialization and deserialization structures for the session file.
//! - `session.json`: the user's profile and the token set obtained from the identity provider

use crate::{utils, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// How long before the actual expiry a token is already treated as expired.
const EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Represents a file that we want to `Serialize`, `Deserialize`, and read from memory in-between
/// serializations and deserialization. Basically we are just holding the `path` and the `data`
/// here.
#[derive(Default, Debug, Clone)]
pub(super) struct File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    path: PathBuf,
    data: F,
}

impl<F> File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    /// Load data from a file and create a File instance
    pub(super) async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data: F = utils::deserialize(&path).await?;
        Ok(Self { path, data })
    }

    /// Create a File instance with the given path and data
    pub(super) fn new(path: impl Into<PathBuf>, data: F) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Save the current data to the file with owner-only permissions.
    pub(super) async fn save(&self) -> Result<()> {
        use anyhow::Context;
        let json =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize data to JSON")?;
        utils::write(&self.path, json).await?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, Permissions::from_mode(0o600))
                .context("Failed to set file permissions")?;
        }

        Ok(())
    }

    pub(super) fn data(&self) -> &F {
        &self.data
    }

    pub(super) fn data_mut(&mut self) -> &mut F {
        &mut self.data
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }
}

/// The signed-in user, as reported by the identity provider.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Profile {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// The display name, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// This is how we save the session. Along with the tokens we keep the token endpoint so that the
/// access token can be refreshed without discovering the provider's endpoints again.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct SessionData {
    profile: Profile,
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    scopes: Vec<String>,
    token_endpoint: String,
}

impl SessionData {
    pub(super) fn new(
        profile: Profile,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
        token_endpoint: String,
    ) -> Self {
        Self {
            profile,
            access_token,
            refresh_token,
            expires_at,
            scopes,
            token_endpoint,
        }
    }

    pub(super) fn profile(&self) -> &Profile {
        &self.profile
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub(super) fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub(super) fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Check if the token is expired or will expire soon (within 5 minutes)
    pub(super) fn is_expired(&self) -> bool {
        let now = Utc::now();
        let buffer = Duration::minutes(EXPIRY_BUFFER_MINUTES);
        self.expires_at <= now + buffer
    }

    /// Update the token with new values. A missing refresh token keeps the old one.
    pub(super) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = Some(rt);
        }
    }
}
