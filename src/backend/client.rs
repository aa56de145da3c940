use crate::config::BackendConfig;
use crate::error::{KpiError, Result};
use crate::schema::{Row, SourceTable, TableMeta};
use crate::source::RowSource;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

const REST_PATH: &str = "rest/v1";

#[derive(Clone)]
struct Credentials {
    base_url: String,
    anon_key: String,
}

/// Read-only client for the backend's REST interface.
///
/// Only issues `select *` queries; all filtering and aggregation happens
/// locally. Without credentials every fetch returns an empty row set.
#[derive(Clone)]
pub struct PostgrestClient {
    client: Client,
    credentials: Option<Credentials>,
    config_error: Option<String>,
}

impl PostgrestClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &BackendConfig) -> Self {
        let config_error = config.config_error();
        let credentials = match (&config.url, &config.anon_key) {
            (Some(url), Some(key)) if config_error.is_none() => Some(Credentials {
                base_url: url.trim().trim_end_matches('/').to_string(),
                anon_key: key.trim().to_string(),
            }),
            _ => None,
        };

        Self {
            client,
            credentials,
            config_error,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn table_url(&self, table: SourceTable) -> Option<String> {
        self.credentials
            .as_ref()
            .map(|c| format!("{}/{}/{}", c.base_url, REST_PATH, table.table_name()))
    }

    fn credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            KpiError::Config(
                self.config_error
                    .clone()
                    .unwrap_or_else(|| "Backend is not configured".to_string()),
            )
        })
    }

    fn authorized(&self, builder: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        builder
            .header("apikey", &credentials.anon_key)
            .bearer_auth(&credentials.anon_key)
    }

    async fn checked(table: SourceTable, res: Response) -> Result<Response> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await?;
            return Err(KpiError::BackendStatus {
                table: table.table_name().to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(res)
    }

    /// Every row of `table`, unfiltered.
    pub async fn select_all(&self, table: SourceTable) -> Result<Vec<Row>> {
        let Some(credentials) = self.credentials.as_ref() else {
            warn!(
                "Backend not configured, returning no rows for {}: {}",
                table,
                self.config_error.as_deref().unwrap_or("missing credentials")
            );
            return Ok(Vec::new());
        };

        let url = format!("{}/{}/{}", credentials.base_url, REST_PATH, table.table_name());
        let res = self
            .authorized(self.client.get(&url), credentials)
            .query(&[("select", "*")])
            .send()
            .await?;
        let res = Self::checked(table, res).await?;

        let body: Value = res.json().await?;
        let rows = rows_from_payload(table, body)?;
        debug!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Exact row count from the `Content-Range` header of a HEAD request.
    pub async fn exact_count(&self, table: SourceTable) -> Result<Option<u64>> {
        let credentials = self.credentials()?;
        let url = format!("{}/{}/{}", credentials.base_url, REST_PATH, table.table_name());
        let res = self
            .authorized(self.client.head(&url), credentials)
            .header("Prefer", "count=exact")
            .query(&[("select", "*")])
            .send()
            .await?;
        let res = Self::checked(table, res).await?;

        Ok(res
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total))
    }

    /// Column names of the first row, empty for an empty table.
    pub async fn sample_columns(&self, table: SourceTable) -> Result<Vec<String>> {
        let credentials = self.credentials()?;
        let url = format!("{}/{}/{}", credentials.base_url, REST_PATH, table.table_name());
        let res = self
            .authorized(self.client.get(&url), credentials)
            .query(&[("select", "*"), ("limit", "1")])
            .send()
            .await?;
        let res = Self::checked(table, res).await?;

        let body: Value = res.json().await?;
        let rows = rows_from_payload(table, body)?;
        Ok(rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default())
    }

    pub async fn inspect(&self, table: SourceTable) -> Result<TableMeta> {
        let count = self.exact_count(table).await?;
        let columns = self.sample_columns(table).await?;
        info!(
            "Inspected {}: {} rows, {} columns",
            table,
            count.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string()),
            columns.len()
        );
        Ok(TableMeta {
            name: table.table_name().to_string(),
            count,
            columns,
            error: None,
        })
    }
}

impl RowSource for PostgrestClient {
    fn fetch_rows(&self, table: SourceTable) -> BoxFuture<'_, Result<Vec<Row>>> {
        self.select_all(table).boxed()
    }

    fn inspect_table(&self, table: SourceTable) -> BoxFuture<'_, Result<TableMeta>> {
        self.inspect(table).boxed()
    }

    fn configuration_warning(&self) -> Option<String> {
        self.config_error.clone()
    }
}

/// Total from a `Content-Range` value such as `0-24/3573` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Splits a JSON array payload into rows, rejecting anything but objects.
pub fn rows_from_payload(table: SourceTable, body: Value) -> Result<Vec<Row>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(KpiError::UnexpectedPayload {
                table: table.table_name().to_string(),
                details: format!("expected a JSON array, got {}", value_kind(&other)),
            })
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(row) => Ok(row),
            other => Err(KpiError::UnexpectedPayload {
                table: table.table_name().to_string(),
                details: format!("element #{} is {}, not an object", idx, value_kind(&other)),
            }),
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_rows_from_payload() {
        let rows = rows_from_payload(
            SourceTable::VendasAtacado,
            json!([{"valor": "10,00"}, {"valor": 5}]),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);

        assert!(rows_from_payload(SourceTable::VendasAtacado, json!(null))
            .unwrap()
            .is_empty());

        let err = rows_from_payload(SourceTable::LeadsGoogle, json!({"message": "denied"}));
        assert!(matches!(err, Err(KpiError::UnexpectedPayload { .. })));

        let err = rows_from_payload(SourceTable::LeadsGoogle, json!([{"a": 1}, 7]));
        match err {
            Err(KpiError::UnexpectedPayload { details, .. }) => {
                assert!(details.contains("element #1"))
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let client = PostgrestClient::new(&BackendConfig::new("https://demo.supabase.co/", "anon"));
        assert!(client.is_configured());
        assert_eq!(
            client.table_url(SourceTable::LeadsCloserAtacado).as_deref(),
            Some("https://demo.supabase.co/rest/v1/leads-closer-atacado")
        );
    }

    #[tokio::test]
    async fn test_unconfigured_client_degrades_to_empty_rows() {
        let client = PostgrestClient::new(&BackendConfig::default());
        assert!(!client.is_configured());
        assert!(client.configuration_warning().is_some());

        let rows = client.fetch_rows(SourceTable::LeadsGoogle).await.unwrap();
        assert!(rows.is_empty());

        let err = client.inspect_table(SourceTable::LeadsGoogle).await;
        assert!(matches!(err, Err(KpiError::Config(_))));
    }
}
