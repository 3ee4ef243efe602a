use crate::error::AppError;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const HARDWARE_RESERVATION: &str = "HardwareReservation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// One billable line item for a project within a queried window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UsageRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub metro: String,
    #[serde(deserialize_with = "null_as_default")]
    pub plan: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub usage_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub quantity: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub total: f64,
}

/// Explicit `null` fields read as their zero value, same as missing ones.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl UsageRecord {
    pub fn is_reservation(&self) -> bool {
        self.usage_type == HARDWARE_RESERVATION
    }
}

/// Usage records grouped by project name.
pub type UsageMap = BTreeMap<String, Vec<UsageRecord>>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SummaryRecord {
    pub price: f64,
    pub quantity: f64,
    pub total: f64,
    pub base_price: f64,
    pub base_quantity: f64,
    pub base_total: f64,
}

impl SummaryRecord {
    pub fn accumulate(&mut self, other: &SummaryRecord) {
        self.price += other.price;
        self.quantity += other.quantity;
        self.total += other.total;
        self.base_price += other.base_price;
        self.base_quantity += other.base_quantity;
        self.base_total += other.base_total;
    }

    /// Percentage change of the report total against the baseline total.
    /// A zero baseline yields an infinite or NaN value.
    pub fn percent_change(&self) -> f64 {
        100.0 * (self.total - self.base_total) / self.base_total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportType {
    #[default]
    AllExceptReservations,
    ReservationsOnly,
}

impl ReportType {
    pub fn parse(input: &str) -> Result<Self, AppError> {
        match input {
            "" => Ok(ReportType::AllExceptReservations),
            "reservations" => Ok(ReportType::ReservationsOnly),
            other => Err(AppError::Config(format!(
                "Invalid report type {other:?}, only valid types are \"reservations\" or <blank>"
            ))),
        }
    }

    pub fn includes(self, usage_type: &str) -> bool {
        (self == ReportType::ReservationsOnly) == (usage_type == HARDWARE_RESERVATION)
    }
}

/// Half-open query window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UsageWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::Config(format!(
                "window start {start} must be before window end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window covering whole days from `first` through `last`, both inclusive.
    pub fn from_dates(first: NaiveDate, last: NaiveDate) -> Result<Self, AppError> {
        let end = last
            .checked_add_days(Days::new(1))
            .ok_or_else(|| AppError::Config(format!("date {last} is out of range")))?;
        Self::new(
            first.and_time(chrono::NaiveTime::MIN).and_utc(),
            end.and_time(chrono::NaiveTime::MIN).and_utc(),
        )
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    pub fn is_single_day(&self) -> bool {
        self.duration_secs() == 86_400
    }
}
