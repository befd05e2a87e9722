use crate::api::Mode;
use crate::commands::load_config;
use crate::source::DataSource;
use crate::web::{self, AppState};
use crate::Result;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{info, warn};

/// Serves the dashboard on `listen` until the process is stopped.
pub async fn serve(household_home: &Path, mode: Mode, listen: SocketAddr) -> Result<()> {
    let config = load_config(household_home).await?;
    if config.users().is_empty() {
        warn!("No users are configured, nobody can log in. Add one with 'household user add'.");
    }
    info!(
        "Serving worksheet '{}' of {}",
        config.worksheet(),
        config.sheet_url()
    );
    let source = DataSource::new(config, mode);
    if source.mode() == Mode::Test {
        warn!("Using the in-memory test sheet, nothing is read from or written to Google");
    }
    web::serve(AppState::new(source), listen).await
}
