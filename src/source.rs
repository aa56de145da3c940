use crate::error::{KpiError, Result};
use crate::schema::{Row, SourceTable, TableMeta};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Anything that can hand over the full contents of a source table.
///
/// Every call is a fresh snapshot; implementations must not cache.
pub trait RowSource: Send + Sync {
    fn fetch_rows(&self, table: SourceTable) -> BoxFuture<'_, Result<Vec<Row>>>;

    /// Row count and sample columns. The default derives both from a full fetch.
    fn inspect_table(&self, table: SourceTable) -> BoxFuture<'_, Result<TableMeta>> {
        async move {
            let rows = self.fetch_rows(table).await?;
            let columns = rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default();
            Ok(TableMeta {
                name: table.table_name().to_string(),
                count: Some(rows.len() as u64),
                columns,
                error: None,
            })
        }
        .boxed()
    }

    /// Diagnostic for a source that is reachable only in degraded mode.
    fn configuration_warning(&self) -> Option<String> {
        None
    }
}

/// In-memory rows per table, with optional per-table failures.
#[derive(Debug, Default)]
pub struct StaticSource {
    tables: HashMap<SourceTable, std::result::Result<Vec<Row>, String>>,
    warning: Option<String>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, table: SourceTable, rows: Vec<Row>) -> Self {
        self.tables.insert(table, Ok(rows));
        self
    }

    pub fn with_failure(mut self, table: SourceTable, reason: impl Into<String>) -> Self {
        self.tables.insert(table, Err(reason.into()));
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RowSource for StaticSource {
    fn fetch_rows(&self, table: SourceTable) -> BoxFuture<'_, Result<Vec<Row>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let result = match self.tables.get(&table) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(reason)) => Err(KpiError::SourceUnavailable(format!(
                "{}: {}",
                table, reason
            ))),
            None => Ok(Vec::new()),
        };
        futures::future::ready(result).boxed()
    }

    fn configuration_warning(&self) -> Option<String> {
        self.warning.clone()
    }
}
