use crate::args::InitArgs;
use crate::commands::Out;
use crate::config::IdentityConfig;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its `.secrets` subdirectory and an initial `config.json` holding
/// the transactions API URL and the identity provider settings.
///
/// # Arguments
/// - `fintrack_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/fintrack`
/// - `args` - The API URL, the authority and client id, and the optional redirect and logout
///   settings.
///
/// # Errors
/// - Returns an error if a URL is invalid or any file operations fail.
pub async fn init(fintrack_home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let mut identity = IdentityConfig::new(args.authority(), args.client_id())
        .with_logout_endpoint(args.logout_endpoint().map(str::to_string))
        .with_logout_uri(args.logout_uri().map(str::to_string));
    if let Some(redirect_uri) = args.redirect_uri() {
        identity = identity.with_redirect_uri(redirect_uri);
    }
    let config = Config::create(fintrack_home, args.api_url(), identity)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the fintrack directory and config at {}",
        config.root().display()
    )
    .into())
}
