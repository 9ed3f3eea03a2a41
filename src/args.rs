//! These structs provide the CLI interface for the fintrack CLI.

use crate::model::Category;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// fintrack: A command-line personal finance tracker.
///
/// Your transactions are kept by a remote transactions API. You sign in with your identity
/// provider, then list, add, edit and delete transactions from the command line. Every command
/// that reads transactions shows the dashboard: your income, expenses and balance, a breakdown of
/// expenses by category, and a page of the transaction table.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. You need the base URL of the transactions API
    /// and the details of the OpenID Connect client registered for fintrack with your identity
    /// provider: the authority (issuer) URL and the client id. The redirect URI registered for
    /// the client must be a loopback URL such as http://localhost:5173/.
    Init(InitArgs),
    /// Sign in with your identity provider.
    Auth(AuthArgs),
    /// Forget the saved session and print the identity provider's logout URL.
    SignOut,
    /// Show the dashboard.
    Show(ShowArgs),
    /// Add a transaction.
    Add(AddArgs),
    /// Change an existing transaction.
    Edit(EditArgs),
    /// Delete a transaction.
    Delete(DeleteArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where fintrack configuration and the session are held. Defaults to
    /// ~/fintrack
    #[arg(long, env = "FINTRACK_HOME", default_value_t = default_fintrack_home())]
    fintrack_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, fintrack_home: PathBuf) -> Self {
        Self {
            log_level,
            fintrack_home: fintrack_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn fintrack_home(&self) -> &DisplayPath {
        &self.fintrack_home
    }
}

/// (Not shown): Args for the `fintrack init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of the transactions API, e.g. https://jt23dkziya.execute-api.us-east-2.amazonaws.com/
    #[arg(long)]
    api_url: String,

    /// The URL of the identity provider, e.g.
    /// https://cognito-idp.us-east-2.amazonaws.com/us-east-2_TxFfUECxf
    #[arg(long)]
    authority: String,

    /// The OAuth client id registered for fintrack.
    #[arg(long)]
    client_id: String,

    /// Where the identity provider sends the browser after sign-in. fintrack listens on this
    /// address while you sign in.
    #[arg(long)]
    redirect_uri: Option<String>,

    /// The identity provider's logout endpoint, when it does not advertise one itself.
    #[arg(long)]
    logout_endpoint: Option<String>,

    /// Where the identity provider sends the browser after logout. Defaults to the redirect URI.
    #[arg(long)]
    logout_uri: Option<String>,
}

impl InitArgs {
    pub fn new(
        api_url: impl Into<String>,
        authority: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            authority: authority.into(),
            client_id: client_id.into(),
            redirect_uri: None,
            logout_endpoint: None,
            logout_uri: None,
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_logout_endpoint(mut self, logout_endpoint: impl Into<String>) -> Self {
        self.logout_endpoint = Some(logout_endpoint.into());
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    pub fn logout_endpoint(&self) -> Option<&str> {
        self.logout_endpoint.as_deref()
    }

    pub fn logout_uri(&self) -> Option<&str> {
        self.logout_uri.as_deref()
    }
}

/// (Not shown): Args for the `fintrack auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh the saved session without opening a browser.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `fintrack show` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct ShowArgs {
    /// Only show transactions in this category.
    #[arg(long)]
    category: Option<Category>,

    /// The page of the transaction table to show, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: usize,
}

impl ShowArgs {
    pub fn new(category: Option<Category>, page: usize) -> Self {
        Self { category, page }
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn page(&self) -> usize {
        self.page
    }
}

/// (Not shown): Args for the `fintrack add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The amount. Enter the magnitude, the sign is decided by the category: Salary is income,
    /// everything else is an expense.
    #[arg(long, allow_hyphen_values = true)]
    amount: String,

    /// One of Food, Rent, Utilities, Entertainment, Travel, Shopping, Health, Salary, Other.
    #[arg(long)]
    category: String,

    /// The date, YYYY-MM-DD.
    #[arg(long)]
    date: String,
}

impl AddArgs {
    pub fn new(
        amount: impl Into<String>,
        category: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            amount: amount.into(),
            category: category.into(),
            date: date.into(),
        }
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn date(&self) -> &str {
        &self.date
    }
}

/// (Not shown): Args for the `fintrack edit` command. Fields that are not given keep their
/// current values.
#[derive(Debug, Parser, Clone)]
pub struct EditArgs {
    /// The id of the transaction to change.
    id: String,

    /// The new amount.
    #[arg(long, allow_hyphen_values = true)]
    amount: Option<String>,

    /// The new category. Required when the transaction has a category from the server that
    /// fintrack does not know, since fintrack cannot send that category back unchanged.
    #[arg(long)]
    category: Option<String>,

    /// The new date, YYYY-MM-DD.
    #[arg(long)]
    date: Option<String>,
}

impl EditArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            amount: None,
            category: None,
            date: None,
        }
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn amount(&self) -> Option<&str> {
        self.amount.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

/// (Not shown): Args for the `fintrack delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The id of the transaction to delete.
    id: String,

    /// Delete without asking for confirmation.
    #[arg(long, short)]
    yes: bool,
}

impl DeleteArgs {
    pub fn new(id: impl Into<String>, yes: bool) -> Self {
        Self { id: id.into(), yes }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn yes(&self) -> bool {
        self.yes
    }
}

fn default_fintrack_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("fintrack"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --fintrack-home or FINTRACK_HOME instead of relying on the \
                default fintrack home directory. If you continue using the program right now, you \
                may have problems!",
            );
            PathBuf::from("fintrack")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
