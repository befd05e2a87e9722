use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its secrets subdirectory and:
/// - Creates an initial `config.json` file using `sheet_url` and `worksheet`
/// - Copies `secret_file` into its default location in the home directory.
///
/// # Arguments
/// - `household_home` - The directory that will be the home directory, e.g. `$HOME/household`
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
///   OAuth workflow.
/// - `url` - The URL of the Google Sheet where the transactions are kept.
/// - `worksheet` - The tab holding the transactions.
///
/// # Errors
/// - Returns an error if any file operations fail or the URL is not a Google Sheets URL.
pub async fn init(
    household_home: &Path,
    secret_file: &Path,
    url: &str,
    worksheet: &str,
) -> Result<Out<()>> {
    let config = Config::create(household_home, secret_file, url, worksheet)
        .await
        .context("Unable to create the home directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the household directory at {}. Next, run 'household auth'.",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret.json");
        std::fs::write(&secret, "{}").unwrap();
        let err = init(&dir.path().join("home"), &secret, "https://example.com", "Dados")
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
