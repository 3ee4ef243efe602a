use crate::models::SummaryRecord;
use crate::summary::Summary;
use crate::timestamp::DATE_FORMAT;
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use std::fmt::Write;

/// Two-decimal number with English thousands separators.
/// Non-finite values print as `NaN` or `Inf`, signed like finite ones.
pub fn format_amount(value: f64, signed: bool) -> String {
    let plus = if signed { "+" } else { "" };
    if value.is_nan() {
        return format!("{plus}NaN");
    }
    // Negative values keep their sign even when they round to zero.
    let sign = if value.is_sign_negative() { "-" } else { plus };
    if value.is_infinite() {
        return format!("{sign}Inf");
    }

    let cents = (value.abs() * 100.0).round();
    let whole = (cents / 100.0).trunc() as u64;
    let frac = (cents % 100.0) as u64;
    format!("{sign}{}.{frac:02}", whole.to_formatted_string(&Locale::en))
}

fn push_row(out: &mut String, label: &str, summary: &SummaryRecord) {
    let _ = writeln!(
        out,
        "{:<15.15} {:>11} {:>11} {:>7}%",
        label,
        format_amount(summary.base_total, false),
        format_amount(summary.total, false),
        format_amount(summary.percent_change(), true),
    );
}

/// Renders the comparison table: baseline total, report total and change per project,
/// followed by the grand total. Rows keep the order of `summary.projects`.
pub fn render_report(summary: &Summary, baseline_end: NaiveDate, report_end: NaiveDate) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<15.15} {:>11} {:>11}",
        "Project",
        baseline_end.format(DATE_FORMAT).to_string(),
        report_end.format(DATE_FORMAT).to_string(),
    );
    for (project, record) in &summary.projects {
        push_row(&mut out, project, record);
    }
    push_row(&mut out, "Total", &summary.totals);
    out
}
