//! The data source adapter: cached reads of the transaction worksheet and the append/refresh
//! cycle.

use crate::api::{self, Mode, Sheet};
use crate::cache::TtlCache;
use crate::error::{Error, ErrorType, IntoResult, Res, Result};
use crate::model::{NewTransaction, Transactions};
use crate::Config;
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// The warning shown when the sheet could not be read.
pub const CONNECTIVITY_WARNING: &str =
    "Não foi possível carregar os dados da planilha. Os valores exibidos estão zerados.";

/// A table along with the warning to show if it had to be replaced by an empty one.
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub table: Transactions,
    pub warning: Option<String>,
}

/// Reads and appends rows of the configured worksheet. Cheap to clone; clones share the cache and
/// the sheet client.
#[derive(Clone)]
pub struct DataSource {
    config: Config,
    mode: Mode,
    cache: TtlCache<String, Transactions>,
    sheet: Arc<Mutex<Option<Box<dyn Sheet + Send>>>>,
}

impl DataSource {
    pub fn new(config: Config, mode: Mode) -> Self {
        let cache = TtlCache::new(config.cache_ttl());
        debug!(
            "Rows of '{}' are cached for {}s",
            config.worksheet(),
            cache.ttl().as_secs()
        );
        Self {
            config,
            mode,
            cache,
            sheet: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The cleaned table, from memory if it was fetched within the cache window.
    pub async fn fetch(&self) -> Result<Transactions> {
        let key = self.config.worksheet().to_string();
        self.cache
            .get_or_fetch(&key, || self.fetch_uncached())
            .await
            .pub_result(ErrorType::Connectivity)
    }

    /// Like `fetch`, but a failure becomes an empty table and a warning.
    pub async fn load(&self) -> Loaded {
        match self.fetch().await {
            Ok(table) => Loaded {
                table,
                warning: None,
            },
            Err(e) => {
                warn!("Unable to load the transactions: {e:#}");
                Loaded {
                    table: Transactions::default(),
                    warning: Some(CONNECTIVITY_WARNING.to_string()),
                }
            }
        }
    }

    /// Drops the cached table and loads it again.
    pub async fn reload(&self) -> Loaded {
        self.invalidate().await;
        self.load().await
    }

    pub async fn invalidate(&self) {
        self.cache
            .invalidate(&self.config.worksheet().to_string())
            .await;
    }

    /// Validates `row`, writes it to the sheet, then invalidates the cache and reloads the table.
    ///
    /// A `Validation` error means nothing was written. A `Connectivity` error means the write
    /// failed; the cache is left as it was.
    pub async fn append(&self, row: &NewTransaction) -> Result<Loaded> {
        row.validate()
            .map_err(|e| Error::new(ErrorType::Validation, e))?;
        let cells = row.to_sheet_row();
        let mut guard = self
            .connected()
            .await
            .pub_result(ErrorType::Connectivity)?;
        let result = match guard.as_mut() {
            Some(sheet) => sheet.append(self.config.worksheet(), &cells).await,
            None => Err(anyhow::anyhow!("The spreadsheet client is missing")),
        };
        if result.is_err() {
            *guard = None;
        }
        drop(guard);
        result
            .context("Unable to save the new row")
            .pub_result(ErrorType::Connectivity)?;
        info!(
            "Appended a '{}' row of {} dated {}",
            row.category.trim(),
            row.amount,
            row.date
        );
        Ok(self.reload().await)
    }

    async fn fetch_uncached(&self) -> Res<Transactions> {
        let mut guard = self.connected().await?;
        let result = match guard.as_mut() {
            Some(sheet) => sheet.get(self.config.worksheet()).await,
            None => Err(anyhow::anyhow!("The spreadsheet client is missing")),
        };
        if result.is_err() {
            // start over with a new client next time
            *guard = None;
        }
        let table = Transactions::parse(result?);
        debug!(
            "Loaded {} transactions ({} dropped)",
            table.len(),
            table.dropped()
        );
        Ok(table)
    }

    /// Locks the sheet client, creating it first if needed.
    async fn connected(&self) -> Res<MutexGuard<'_, Option<Box<dyn Sheet + Send>>>> {
        let mut guard = self.sheet.lock().await;
        if guard.is_none() {
            let sheet = api::sheet(&self.config, self.mode)
                .await
                .context("Unable to connect to the spreadsheet")?;
            *guard = Some(sheet);
        }
        Ok(guard)
    }
}
