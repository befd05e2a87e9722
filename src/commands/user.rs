use crate::commands::{load_config, Out};
use crate::error::{Error, ErrorType, IntoResult};
use crate::Result;
use std::path::Path;

/// Adds a dashboard user, or replaces the password of an existing one, in `config.json`.
pub async fn user_add(household_home: &Path, username: &str, password: &str) -> Result<Out<()>> {
    let username = username.trim();
    if username.is_empty() || password.trim().is_empty() {
        return Err(Error::msg(
            ErrorType::Validation,
            "The username and password cannot be empty",
        ));
    }

    let mut config = load_config(household_home).await?;
    let existed = config.users().contains_key(username);
    config
        .set_user(username, password)
        .await
        .pub_result(ErrorType::Config)?;
    let verb = if existed { "Updated" } else { "Added" };
    Ok(format!("{verb} user '{username}'").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::check_credentials;
    use crate::test::{TestEnv, TEST_USER};
    use crate::Config;

    #[tokio::test]
    async fn test_user_add() {
        let env = TestEnv::new().await;
        let root = env.config().root().to_path_buf();

        let out = user_add(&root, "joao", "senha").await.unwrap();
        assert_eq!(out.message(), "Added user 'joao'");
        let out = user_add(&root, TEST_USER, "nova").await.unwrap();
        assert_eq!(out.message(), "Updated user 'maria'");

        let config = Config::load(&root).await.unwrap();
        assert!(check_credentials(config.users(), "joao", "senha"));
        assert!(check_credentials(config.users(), TEST_USER, "nova"));
    }

    #[tokio::test]
    async fn test_user_add_rejects_empty() {
        let env = TestEnv::new().await;
        let err = user_add(env.config().root(), " ", "x").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
    }
}
