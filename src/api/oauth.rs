//! OAuth 2.0 for the Google Sheets API.
//!
//! `TokenProvider::initialize` runs the installed-app consent flow: it listens on a loopback port,
//! logs the consent URL, waits for Google to redirect back with an authorization code and
//! exchanges that code for tokens. After that, `TokenProvider::load` reads the saved tokens and
//! refreshes the access token without a browser whenever it is within five minutes of expiry.

use crate::api::files::{File, SecretFile, TokenFile, REDIRECT};
use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use anyhow::{bail, Context};
use chrono::Utc;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Google does not always report `expires_in`; access tokens last an hour.
const DEFAULT_EXPIRY: Duration = Duration::from_secs(3600);

const SUCCESS_PAGE: &str = "<html><body><h2>Authorization complete.</h2>\
    <p>You can close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h2>Authorization failed.</h2>\
    <p>Return to the terminal for details.</p></body></html>";

/// Holds the client credentials and the saved token, and keeps the access token fresh.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Runs the consent flow and saves the resulting tokens to `token_path`.
    pub(crate) async fn initialize(
        secret_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
    ) -> Res<Self> {
        let secret_path = secret_path.into();
        let token_path = token_path.into();
        info!(
            "Loading OAuth credentials from {}",
            secret_path.to_string_lossy()
        );
        let secret = SecretFile::load(&secret_path).await?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("Unable to start the local OAuth callback listener")?;
        let port = listener
            .local_addr()
            .context("Unable to read the callback listener address")?
            .port();
        let redirect = format!("{REDIRECT}:{port}");

        let client = BasicClient::new(ClientId::new(secret.client_id().to_string()))
            .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
            .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
            .set_token_uri(
                TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?,
            )
            .set_redirect_uri(RedirectUrl::new(redirect).context("Invalid redirect URI")?);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in OAUTH_SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (auth_url, csrf) = request
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        info!("Open this URL in your browser to authorize access to your sheet:\n\n{auth_url}\n");
        info!("Waiting for the authorization callback on http://localhost:{port}");

        let callback = wait_for_callback(listener).await?;
        if let Some(error) = callback.error {
            bail!("Google returned an OAuth error: {error}");
        }
        if callback.state.as_deref() != Some(csrf.secret().as_str()) {
            bail!("The OAuth callback state did not match, refusing the authorization code");
        }
        let code = callback
            .code
            .context("The OAuth callback did not include an authorization code")?;

        let http_client = http_client()?;
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .context("Unable to exchange the authorization code for tokens")?;

        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .context("Google did not return a refresh token")?;
        let scopes = match response.scopes() {
            Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
            None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
        };
        let data = TokenFile::new(
            scopes,
            response.access_token().secret().to_string(),
            refresh_token,
            expires_at(response.expires_in()),
            None,
        );
        let token = File::new(token_path, data);
        token.save().await?;
        info!("Authorization successful, tokens saved to {}", token.path().display());
        Ok(Self { secret, token })
    }

    /// Loads existing credentials and tokens. Never opens a browser.
    pub(crate) async fn load(
        secret_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
    ) -> Res<Self> {
        let secret_path = secret_path.into();
        let token_path = token_path.into();
        let secret = SecretFile::load(&secret_path).await?;
        let token = TokenFile::load(&token_path).await.with_context(|| {
            format!(
                "Unable to load tokens from {}. Run 'household auth' first.",
                token_path.display()
            )
        })?;
        Ok(Self { secret, token })
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        let client = BasicClient::new(ClientId::new(self.secret.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.secret.client_secret().to_string()))
            .set_token_uri(
                TokenUrl::new(self.secret.token_uri().to_string()).context("Invalid token_uri")?,
            );
        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let http_client = http_client()?;
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http_client)
            .await
            .context("Unable to refresh the OAuth access token")?;

        self.token.data_mut().update(
            response.access_token().secret().to_string(),
            expires_at(response.expires_in()),
            response.refresh_token().map(|t| t.secret().to_string()),
        );
        self.token.save().await?;
        debug!("Token refreshed, valid until {}", self.token.data().expires_at());
        Ok(())
    }

    /// The current access token, which may be expired.
    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }

    /// The current access token, refreshed first if it expires within five minutes.
    pub(crate) async fn token_with_refresh(&mut self) -> Res<String> {
        if self.token.data().is_expired() {
            debug!("The access token is expired or about to expire, refreshing");
            self.refresh().await?;
        }
        Ok(self.token().to_string())
    }
}

fn http_client() -> Res<reqwest::Client> {
    // The token endpoint is never followed through redirects
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the HTTP client")
}

fn expires_at(expires_in: Option<Duration>) -> chrono::DateTime<Utc> {
    let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRY);
    let expires_in = chrono::Duration::from_std(expires_in)
        .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_EXPIRY.as_secs() as i64));
    Utc::now() + expires_in
}

/// The query parameters Google sends to the redirect URI.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn is_callback(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// Serves HTTP on `listener` until a request carrying `code` or `error` arrives.
async fn wait_for_callback(listener: TcpListener) -> Res<CallbackParams> {
    let (tx, mut rx) = oneshot::channel();
    let tx: CallbackSender = Arc::new(Mutex::new(Some(tx)));
    loop {
        tokio::select! {
            params = &mut rx => {
                return params.context("The OAuth callback listener stopped unexpectedly");
            }
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("Unable to accept the OAuth callback")?;
                let tx = tx.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle_callback(req, tx.clone()));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("OAuth callback connection closed with an error: {e}");
                    }
                });
            }
        }
    }
}

async fn handle_callback(
    req: Request<Incoming>,
    tx: CallbackSender,
) -> std::result::Result<Response<String>, Infallible> {
    let params = CallbackParams::from_query(req.uri().query().unwrap_or_default());
    if !params.is_callback() {
        let mut response = Response::new(String::new());
        *response.status_mut() = StatusCode::NOT_FOUND;
        return Ok(response);
    }
    let page = if params.code.is_some() {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };
    let sender = match tx.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    match sender {
        Some(sender) => {
            if sender.send(params).is_err() {
                warn!("The OAuth flow stopped before the callback arrived");
            }
        }
        None => debug!("Ignoring a repeated OAuth callback"),
    }
    Ok(Response::new(page.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_params() {
        let params = CallbackParams::from_query("state=abc&code=4%2F0Ab&scope=x");
        assert_eq!(params.code.as_deref(), Some("4/0Ab"));
        assert_eq!(params.state.as_deref(), Some("abc"));
        assert!(params.is_callback());

        let params = CallbackParams::from_query("error=access_denied&state=abc");
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert!(params.is_callback());

        assert!(!CallbackParams::from_query("").is_callback());
    }

    #[test]
    fn test_expires_at_defaults_to_an_hour() {
        let at = expires_at(None);
        let remaining = at - Utc::now();
        assert!(remaining > chrono::Duration::minutes(59));
        assert!(remaining <= chrono::Duration::minutes(60));
    }

    #[tokio::test]
    async fn test_wait_for_callback_receives_code() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let waiter = tokio::spawn(wait_for_callback(listener));

        let client = reqwest::Client::new();
        let favicon = client
            .get(format!("http://127.0.0.1:{port}/favicon.ico"))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status().as_u16(), 404);

        let page = client
            .get(format!("http://127.0.0.1:{port}/?code=abc&state=xyz"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("Authorization complete"));

        let params = waiter.await.unwrap().unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
    }
}
