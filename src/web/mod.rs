//! The dashboard web application.
//!
//! Every request is tied to a [`Session`] through the `session` cookie. A browser without a valid
//! cookie gets a new session ID in the cookie of the response, and the session is only stored once
//! something is written to it.

mod charts;
mod html;
mod pages;

use crate::error::{ErrorType, IntoResult, Result};
use crate::forecast::{Forecaster, SeasonalForecaster};
use crate::session::{Session, SessionStore};
use crate::source::DataSource;
use anyhow::Context;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

/// Shared state of the web server. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub source: DataSource,
    pub sessions: SessionStore,
    pub forecaster: Arc<dyn Forecaster>,
}

impl AppState {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            sessions: SessionStore::new(),
            forecaster: Arc::new(SeasonalForecaster),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::login_page))
        .route("/login", post(pages::login))
        .route("/logout", post(pages::logout))
        .route("/painel", get(pages::dashboard))
        .route("/dados", get(pages::data).post(pages::append))
        .route("/tendencias", get(pages::trends))
        .route("/health", get(pages::health))
        .with_state(state)
}

/// Binds `listen` and serves the dashboard until the process is stopped.
pub async fn serve(state: AppState, listen: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Unable to listen on {listen}"))
        .pub_result(ErrorType::Config)?;
    let local = listener
        .local_addr()
        .context("Unable to read the listening address")
        .pub_result(ErrorType::Internal)?;
    info!("Dashboard listening on http://{local}");
    axum::serve(listener, router(state))
        .await
        .context("The web server stopped")
        .pub_result(ErrorType::Internal)
}

/// The session behind a request. When the browser did not present a known one, the visit starts
/// an unsaved, logged-out session under a new ID.
pub(crate) struct Visit {
    pub id: Uuid,
    pub session: Session,
    set_cookie: Option<HeaderValue>,
}

impl Visit {
    pub async fn start(sessions: &SessionStore, headers: &HeaderMap) -> Self {
        if let Some(id) = session_id(headers) {
            if let Some(session) = sessions.get(id).await {
                return Self {
                    id,
                    session,
                    set_cookie: None,
                };
            }
            debug!("Unknown session {id}, starting a new one");
        }
        let id = Uuid::new_v4();
        Self {
            id,
            session: Session::default(),
            set_cookie: cookie(id),
        }
    }

    /// Turns `response` into a `Response`, setting the session cookie if this visit created it.
    pub fn respond(self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if let Some(value) = self.set_cookie {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        response
    }
}

fn cookie(id: Uuid) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .ok()
}

/// The ID in the `session` cookie, if there is one and it is a UUID.
fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}
