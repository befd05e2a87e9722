//! Authentication command handlers for OAuth flow.
//!
//! This module implements the CLI commands for:
//! - `household auth` - Initial OAuth consent flow
//! - `household auth --verify` - Verify and refresh authentication

use crate::api::TokenProvider;
use crate::commands::{load_config, Out};
use crate::error::{ErrorType, IntoResult};
use crate::Result;
use anyhow::Context;
use std::path::Path;

/// Handles the `household auth` command - runs the OAuth consent flow
///
/// This is the only command that asks the user to open a browser. It prints the consent URL,
/// waits for Google to redirect to a local listener and saves the tokens to `token.json`.
///
/// # Errors
/// Returns an error if the OAuth flow fails or if client_secret.json is missing
pub async fn auth(household_home: &Path) -> Result<Out<()>> {
    let config = load_config(household_home).await?;
    let _ = TokenProvider::initialize(config.client_secret_path(), config.token_path())
        .await
        .pub_result(ErrorType::Auth)?;
    Ok("Authorization complete.".into())
}

/// Handles the `household auth --verify` command - verifies authentication
///
/// This command never opens a browser. It loads the saved tokens and refreshes the access token.
/// If the token is missing, invalid, or has the wrong scopes, it fails with an error telling the
/// user to run `household auth`.
pub async fn auth_verify(household_home: &Path) -> Result<Out<()>> {
    let config = load_config(household_home).await?;
    let mut token_provider = TokenProvider::load(config.client_secret_path(), config.token_path())
        .await
        .context(
            "Unable to use the existing tokens found in the token JSON file. \n\n\
            You should run 'household auth' (without the --verify flag).",
        )
        .pub_result(ErrorType::Auth)?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")
        .pub_result(ErrorType::Auth)?;
    Ok("Your OAuth token is valid!".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_verify_without_token() {
        let env = TestEnv::new().await;
        let err = auth_verify(env.config().root()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Auth);
        assert!(format!("{err:#}").contains("household auth"));
    }
}
