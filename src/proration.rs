//! Billing rules applied to raw usage lines before they are summed or uploaded.

use crate::models::{UsageMap, UsageRecord, UsageWindow};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

pub const PRORATED_RESERVATION_NAME: &str = "Hardware Reservation daily pro-rated";
const OUTBOUND_BANDWIDTH: &str = "Outbound Bandwidth";

pub fn days_in_month(at: DateTime<Utc>) -> u32 {
    let (year, month) = (at.year(), at.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 31,
    }
}

/// Reservations are billed as a flat monthly amount whatever the query window,
/// so they are turned into a daily run-rate. Only one-day windows can be
/// pro-rated; reservations in any other window are dropped.
pub fn prorate(mut record: UsageRecord, window: &UsageWindow) -> Option<UsageRecord> {
    if !record.is_reservation() {
        return Some(record);
    }
    if !window.is_single_day() {
        return None;
    }

    let days = f64::from(days_in_month(window.start));
    record.price /= days;
    record.total /= days;
    record.name = PRORATED_RESERVATION_NAME.to_string();
    Some(record)
}

pub fn prorate_all(usages: UsageMap, window: &UsageWindow) -> UsageMap {
    usages
        .into_iter()
        .map(|(project, records)| {
            let records = records
                .into_iter()
                .filter_map(|r| prorate(r, window))
                .collect();
            (project, records)
        })
        .collect()
}

/// The API reports bandwidth with its category in `plan` rather than `type`.
pub fn normalize_plan(record: &mut UsageRecord) {
    if record.plan == OUTBOUND_BANDWIDTH {
        record.usage_type = record.plan.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HARDWARE_RESERVATION;

    fn reservation(total: f64) -> UsageRecord {
        UsageRecord {
            metro: "da".into(),
            plan: "m3.small.x86".into(),
            usage_type: HARDWARE_RESERVATION.into(),
            name: "reservation-1".into(),
            price: total,
            quantity: 1.0,
            total,
        }
    }

    fn window(first: (i32, u32, u32), last: (i32, u32, u32)) -> UsageWindow {
        UsageWindow::from_dates(
            NaiveDate::from_ymd_opt(first.0, first.1, first.2).expect("date"),
            NaiveDate::from_ymd_opt(last.0, last.1, last.2).expect("date"),
        )
        .expect("window")
    }

    #[test]
    fn days_in_month_handles_leap_years_and_december() {
        assert_eq!(days_in_month(window((2024, 2, 10), (2024, 2, 10)).start), 29);
        assert_eq!(days_in_month(window((2023, 2, 10), (2023, 2, 10)).start), 28);
        assert_eq!(days_in_month(window((2023, 12, 31), (2023, 12, 31)).start), 31);
        assert_eq!(days_in_month(window((2023, 4, 1), (2023, 4, 1)).start), 30);
    }

    #[test]
    fn one_day_window_divides_reservation_by_days_in_month() {
        let out = prorate(reservation(310.0), &window((2024, 1, 15), (2024, 1, 15)))
            .expect("one-day reservation is kept");
        assert_eq!(out.total, 310.0 / 31.0);
        assert_eq!(out.price, 310.0 / 31.0);
        assert_eq!(out.quantity, 1.0);
        assert_eq!(out.name, PRORATED_RESERVATION_NAME);
    }

    #[test]
    fn multi_day_window_drops_reservations() {
        let two_days = window((2024, 1, 15), (2024, 1, 16));
        assert!(prorate(reservation(310.0), &two_days).is_none());

        let mut usages = UsageMap::new();
        usages.insert("alpha".into(), vec![reservation(310.0)]);
        let out = prorate_all(usages, &two_days);
        assert!(out["alpha"].is_empty());
    }

    #[test]
    fn other_usage_types_pass_through_unchanged() {
        let instance = UsageRecord {
            usage_type: "Instance".into(),
            total: 12.0,
            ..Default::default()
        };
        let out = prorate(instance.clone(), &window((2024, 1, 15), (2024, 1, 16)));
        assert_eq!(out, Some(instance));
    }

    #[test]
    fn outbound_bandwidth_plan_overrides_type() {
        let mut record = UsageRecord {
            plan: "Outbound Bandwidth".into(),
            usage_type: "Bandwidth".into(),
            ..Default::default()
        };
        normalize_plan(&mut record);
        assert_eq!(record.usage_type, "Outbound Bandwidth");

        let mut other = UsageRecord {
            plan: "c3.small.x86".into(),
            usage_type: "Instance".into(),
            ..Default::default()
        };
        normalize_plan(&mut other);
        assert_eq!(other.usage_type, "Instance");
    }
}
