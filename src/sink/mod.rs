use crate::error::AppError;
use crate::models::{UsageRecord, UsageWindow};
use crate::proration::{normalize_plan, prorate};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

pub mod bigquery;

/// Destination table, `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(project_id: &str, dataset_id: &str, table_id: &str) -> Result<Self, AppError> {
        let check = |label: &str, value: &str| -> Result<String, AppError> {
            let value = value.trim();
            if value.is_empty() {
                return Err(AppError::Config(format!("{label} is mandatory")));
            }
            if value.contains(['.', '/']) {
                return Err(AppError::Config(format!(
                    "{label} {value:?} must not contain '.' or '/'"
                )));
            }
            Ok(value.to_string())
        };

        Ok(Self {
            project_id: check("project ID", project_id)?,
            dataset_id: check("dataset ID", dataset_id)?,
            table_id: check("table ID", table_id)?,
        })
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// One flattened usage line as stored in the analytics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkRow {
    #[serde(serialize_with = "millis_rfc3339")]
    pub start_time: DateTime<Utc>,
    #[serde(serialize_with = "millis_rfc3339")]
    pub end_time: DateTime<Utc>,
    pub project: String,
    pub metro: String,
    pub plan: String,
    #[serde(rename = "type")]
    pub usage_type: String,
    pub name: String,
    pub price: f64,
    pub quantity: f64,
    pub total: f64,
}

fn millis_rfc3339<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Applies the plan normalisation and pro-ration rules, then flattens
/// the surviving records into rows carrying the window bounds.
pub fn build_rows(project: &str, records: Vec<UsageRecord>, window: &UsageWindow) -> Vec<SinkRow> {
    records
        .into_iter()
        .filter_map(|mut record| {
            normalize_plan(&mut record);
            prorate(record, window)
        })
        .map(|record| SinkRow {
            start_time: window.start,
            end_time: window.end,
            project: project.to_string(),
            metro: record.metro,
            plan: record.plan,
            usage_type: record.usage_type,
            name: record.name,
            price: record.price,
            quantity: record.quantity,
            total: record.total,
        })
        .collect()
}

#[async_trait]
pub trait UsageSink {
    fn name(&self) -> &'static str;

    /// Appends every row unconditionally; no content de-duplication.
    async fn insert_rows(&self, table: &TableRef, rows: &[SinkRow]) -> Result<(), AppError>;
}
