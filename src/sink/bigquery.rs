use crate::error::AppError;
use crate::sink::{SinkRow, TableRef, UsageSink};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest<'a> {
    skip_invalid_rows: bool,
    ignore_unknown_values: bool,
    rows: Vec<InsertRow<'a>>,
}

/// Rows carry no `insertId`, which turns off best-effort de-duplication.
#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    json: &'a SinkRow,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InsertAllResponse {
    insert_errors: Vec<InsertError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InsertError {
    index: u64,
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorProto {
    reason: String,
    message: String,
}

fn describe_insert_errors(errors: &[InsertError]) -> String {
    errors
        .iter()
        .map(|e| {
            let details = e
                .errors
                .iter()
                .map(|p| format!("{}: {}", p.reason, p.message))
                .collect::<Vec<_>>()
                .join("; ");
            format!("row {}: {details}", e.index)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// BigQuery streaming inserts through the `tabledata.insertAll` REST endpoint.
pub struct BigQuerySink {
    client: Client,
    base_url: String,
    token: String,
}

impl BigQuerySink {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn insert_url(&self, table: &TableRef) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.base_url, table.project_id, table.dataset_id, table.table_id
        )
    }
}

#[async_trait]
impl UsageSink for BigQuerySink {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    #[instrument(skip(self, table, rows), fields(table = %table, rows = rows.len()))]
    async fn insert_rows(&self, table: &TableRef, rows: &[SinkRow]) -> Result<(), AppError> {
        let request = InsertAllRequest {
            skip_invalid_rows: false,
            ignore_unknown_values: false,
            rows: rows.iter().map(|json| InsertRow { json }).collect(),
        };
        let url = self.insert_url(table);
        debug!(url = %url, "streaming rows to BigQuery");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Sink(format!("error while bulk-inserting into {table}: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::Sink(format!("error while reading the insert response for {table}: {e}"))
        })?;
        if !status.is_success() {
            return Err(AppError::Sink(format!(
                "bulk insert into {table} failed.\nStatus code: {}\nResponse body: {body}",
                status.as_u16()
            )));
        }

        let parsed: InsertAllResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::Sink(format!("unexpected insert response for {table}: {e}"))
        })?;
        if !parsed.insert_errors.is_empty() {
            return Err(AppError::Sink(format!(
                "bulk insert into {table} rejected {} rows\n{}",
                parsed.insert_errors.len(),
                describe_insert_errors(&parsed.insert_errors)
            )));
        }

        Ok(())
    }
}
