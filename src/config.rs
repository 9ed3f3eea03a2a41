//! Configuration file handling for fintrack.
//!
//! The configuration file is stored at `$FINTRACK_HOME/config.json` and contains the URL of the
//! transactions API and the settings needed to sign in with the identity provider.

use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "fintrack";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const SESSION_JSON: &str = "session.json";
const CONFIG_JSON: &str = "config.json";

/// The redirect URI used when none is given at init time.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5173/";

/// The scopes requested from the identity provider when none are configured.
pub const DEFAULT_SCOPES: &[&str] = &["phone", "openid", "email"];

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$FINTRACK_HOME` and from there it loads `$FINTRACK_HOME/config.json`. It provides
/// paths to other items that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    api_url: Url,
}

impl Config {
    /// Creates the data directory, its `.secrets` subdirectory and an initial `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/fintrack`
    /// - `api_url` - The base URL of the transactions API, e.g. `https://api.example.com/`
    /// - `identity` - The identity provider settings.
    ///
    /// # Errors
    /// - Returns an error if the URLs are invalid or any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        api_url: &str,
        identity: IdentityConfig,
    ) -> Result<Self> {
        let api_url = parse_api_url(api_url)?;
        identity.validate()?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the fintrack home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;
        restrict_dir(&secrets)?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_url: api_url.to_string(),
            identity,
            session_path: None,
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            api_url,
        })
    }

    /// This will
    /// - validate that the `fintrack_home` exists and that the config file exists
    /// - load and validate the config file
    /// - validate that the secrets directory exists
    pub async fn load(fintrack_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = fintrack_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The fintrack home directory is missing, run 'fintrack init'")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let api_url = parse_api_url(&config_file.api_url)?;

        let config = Self {
            root: root.clone(),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
            api_url,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// The base URL of the transactions API. It always ends with a `/`.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn identity(&self) -> &IdentityConfig {
        &self.config_file.identity
    }

    /// Returns the stored `session_path` if it is absolute, otherwise resolves the relative path.
    pub fn session_path(&self) -> PathBuf {
        let p = self.config_file.session_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// The identity provider settings. These mirror what an OpenID Connect client library needs:
/// the authority, the client id, the redirect URI and the scopes, plus where to send the user when
/// they sign out.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct IdentityConfig {
    /// The issuer URL. `{authority}/.well-known/openid-configuration` must exist.
    authority: String,

    /// The OAuth 2.0 client id registered with the authority. Public client, no secret.
    client_id: String,

    /// Must be a loopback `http` URL, a local server listens on its port during sign-in.
    redirect_uri: String,

    /// Scopes to request.
    #[serde(default = "default_scopes")]
    scopes: Vec<String>,

    /// The provider's logout endpoint. When missing, the discovered `end_session_endpoint` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logout_endpoint: Option<String>,

    /// Where the provider sends the browser after logout. Defaults to `redirect_uri`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logout_uri: Option<String>,
}

impl IdentityConfig {
    pub fn new(authority: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            client_id: client_id.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: default_scopes(),
            logout_endpoint: None,
            logout_uri: None,
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_logout_endpoint(mut self, logout_endpoint: Option<String>) -> Self {
        self.logout_endpoint = logout_endpoint;
        self
    }

    pub fn with_logout_uri(mut self, logout_uri: Option<String>) -> Self {
        self.logout_uri = logout_uri;
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn logout_endpoint(&self) -> Option<&str> {
        self.logout_endpoint.as_deref()
    }

    pub fn logout_uri(&self) -> &str {
        self.logout_uri.as_deref().unwrap_or(&self.redirect_uri)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.client_id.trim().is_empty(), "The client id is empty");
        Url::parse(&self.authority)
            .with_context(|| format!("Invalid authority URL '{}'", self.authority))?;
        Url::parse(&self.redirect_uri)
            .with_context(|| format!("Invalid redirect URI '{}'", self.redirect_uri))?;
        if let Some(logout_endpoint) = &self.logout_endpoint {
            Url::parse(logout_endpoint)
                .with_context(|| format!("Invalid logout endpoint '{logout_endpoint}'"))?;
        }
        Ok(())
    }
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "fintrack",
///   "config_version": 1,
///   "api_url": "https://jt23dkziya.execute-api.us-east-2.amazonaws.com/",
///   "identity": {
///     "authority": "https://cognito-idp.us-east-2.amazonaws.com/us-east-2_TxFfUECxf",
///     "client_id": "2unrtdvdr3g1raepl4r614vc0r",
///     "redirect_uri": "http://localhost:5173/",
///     "scopes": ["phone", "openid", "email"]
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "fintrack"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the transactions API
    api_url: String,

    /// Identity provider settings
    identity: IdentityConfig,

    /// Path to the session file (optional, relative to config.json or absolute)
    /// Defaults to $FINTRACK_HOME/.secrets/session.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path and checks its `app_name`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config version {} is not supported. Is a newer version of fintrack available?",
            config.config_version
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// Gets the session path.
    ///
    /// If the path is relative, it should be interpreted as relative to the config.json file.
    /// If None, defaults to $FINTRACK_HOME/.secrets/session.json
    pub fn session_path(&self) -> PathBuf {
        self.session_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(SESSION_JSON))
    }
}

/// Parses the API base URL, making sure that it ends with a `/` so that joining a relative path
/// keeps any path prefix, e.g. a deployment stage.
fn parse_api_url(s: &str) -> Result<Url> {
    let mut url = Url::parse(s).with_context(|| format!("Invalid API URL '{s}'"))?;
    if url.cannot_be_a_base() {
        bail!("The API URL '{s}' cannot be used as a base URL");
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn restrict_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
