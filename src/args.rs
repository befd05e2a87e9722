//! These structs provide the CLI interface for the household CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

use crate::config::DEFAULT_WORKSHEET;

/// The default address of the dashboard.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8501";

/// household: A dashboard for the family budget kept in a Google sheet.
///
/// The sheet holds one row per transaction with the columns Data, Categorias, Valor and
/// Descrição. This program reads it, classifies each category as income or expense, and serves a
/// login-protected dashboard with monthly balances, category averages, trend charts and a
/// forecast. New transactions entered in the dashboard are appended to the sheet.
///
/// You will need a Google OAuth client for the Sheets API. Run `household init` with the
/// downloaded client secret, then `household auth`, then add a user with `household user add`.
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
    /// Create the data directory and initialize the configuration files.
    ///
    /// - Decide what directory you want to store data in and pass this as --household-home. By
    ///   default, it will be $HOME/household.
    ///
    /// - Get the URL of your Google Sheet and pass it as --sheet-url.
    ///
    /// - Create a Google OAuth client (desktop application) with access to the Sheets API and
    ///   download its client secret JSON. Pass the file as --client-secret.
    Init(InitArgs),
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
    /// Manage the users who can log in to the dashboard.
    User(UserArgs),
    /// Serve the dashboard.
    Serve(ServeArgs),
    /// Print the income, expense and balance of one month, or of all months.
    Summary(SummaryArgs),
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

    /// The directory where the configuration and credentials are held. Defaults to ~/household
    #[arg(long, env = "HOUSEHOLD_HOME", default_value_t = default_household_home())]
    household_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, household_home: PathBuf) -> Self {
        Self {
            log_level,
            household_home: household_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn household_home(&self) -> &DisplayPath {
        &self.household_home
    }
}

/// (Not shown): Args for the `household init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to your Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The name of the worksheet (tab) that holds the transactions.
    #[arg(long, default_value = DEFAULT_WORKSHEET)]
    worksheet: String,

    /// The path to your downloaded OAuth client secret. This file will be copied to the default
    /// secrets location in the main data directory.
    #[arg(long)]
    client_secret: PathBuf,
}

impl InitArgs {
    pub fn new(
        sheet_url: impl Into<String>,
        worksheet: impl Into<String>,
        client_secret: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            worksheet: worksheet.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }
}

/// (Not shown): Args for the `household auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication.
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

/// (Not shown): Args for the `household user` command.
#[derive(Debug, Parser, Clone)]
pub struct UserArgs {
    #[command(subcommand)]
    action: UserSubcommand,
}

impl UserArgs {
    pub fn new(action: UserSubcommand) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &UserSubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserSubcommand {
    /// Add a user, or change the password of an existing one.
    Add(UserAddArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct UserAddArgs {
    #[arg(long)]
    username: String,

    /// Only its SHA-256 hash is stored.
    #[arg(long, env = "HOUSEHOLD_PASSWORD")]
    password: String,
}

impl UserAddArgs {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// (Not shown): Args for the `household serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The address to listen on.
    #[arg(long, env = "HOUSEHOLD_LISTEN", default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,
}

impl ServeArgs {
    pub fn new(listen: SocketAddr) -> Self {
        Self { listen }
    }

    pub fn listen(&self) -> SocketAddr {
        self.listen
    }
}

/// (Not shown): Args for the `household summary` command.
#[derive(Debug, Parser, Clone)]
pub struct SummaryArgs {
    /// A month such as Jan/2024. Omit it, or pass "Saldo Atual", for every month.
    #[arg(long)]
    month: Option<String>,
}

impl SummaryArgs {
    pub fn new(month: Option<String>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Option<&str> {
        self.month.as_deref()
    }
}

fn default_household_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("household"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --household-home or HOUSEHOLD_HOME instead of relying on the \
                default household home directory. If you continue using the program right now, \
                you may have problems!",
            );
            PathBuf::from("household")
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
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
