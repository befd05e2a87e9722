//! Access to the backing spreadsheet.
//!
//! `Sheet` is the seam: `GoogleSheet` talks to the Google Sheets API and `TestSheet` holds rows in
//! memory. Which one is used is decided by `Mode`.

mod files;
mod google_sheet;
mod oauth;
mod test_sheet;

use crate::error::Res;
use crate::Config;
use tracing::debug;

pub(crate) use oauth::TokenProvider;
pub(crate) use test_sheet::{TestSheet, TestSheetState};

/// OAuth scopes required for reading and appending to the sheet.
pub(crate) const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// The environment variable that switches the app to the in-memory sheet.
pub const TEST_MODE_VAR: &str = "HOUSEHOLD_IN_TEST_MODE";

/// Whether to use Google or the in-memory test sheet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Google,
    Test,
}

impl Mode {
    /// `Mode::Test` when `HOUSEHOLD_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_VAR) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// Raw row access to a spreadsheet. Every returned row is a list of formatted cell strings, and the
/// first row of a worksheet is its header row.
#[async_trait::async_trait]
pub(crate) trait Sheet: Send {
    /// Fetches every row of `worksheet`.
    async fn get(&mut self, worksheet: &str) -> Res<Vec<Vec<String>>>;

    /// Appends one row after the last row of `worksheet`. Values are interpreted as if typed by a
    /// user, so `1234,56` becomes a number in a Brazilian-locale sheet.
    async fn append(&mut self, worksheet: &str, row: &[String]) -> Res<()>;
}

/// Creates the `Sheet` for `mode`. In Google mode this loads, and if needed refreshes, the OAuth
/// token.
pub(crate) async fn sheet(config: &Config, mode: Mode) -> Res<Box<dyn Sheet + Send>> {
    match mode {
        Mode::Google => {
            let token_provider =
                TokenProvider::load(config.client_secret_path(), config.token_path()).await?;
            let sheet = google_sheet::GoogleSheet::new(config.spreadsheet_id(), token_provider)
                .await?;
            Ok(Box::new(sheet))
        }
        Mode::Test => {
            debug!("Using the in-memory test sheet");
            Ok(Box::new(TestSheet::new(config.spreadsheet_id())))
        }
    }
}
