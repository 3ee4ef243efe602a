use crate::models::{ReportType, SummaryRecord, UsageMap, UsageRecord};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub projects: Vec<(String, SummaryRecord)>,
    pub totals: SummaryRecord,
    /// Projects with baseline usage but nothing in the report window.
    /// They are not part of `projects` or `totals`.
    pub baseline_only: Vec<String>,
}

impl Summary {
    pub fn sort_projects_case_insensitive(&mut self) {
        self.projects
            .sort_by_cached_key(|(name, _)| name.to_uppercase());
    }
}

fn sum_included(report_type: ReportType, records: &[UsageRecord]) -> (f64, f64, f64) {
    records
        .iter()
        .filter(|r| report_type.includes(&r.usage_type))
        .fold((0.0, 0.0, 0.0), |(price, quantity, total), r| {
            (price + r.price, quantity + r.quantity, total + r.total)
        })
}

/// Sums each report-window project against the same key in the baseline.
pub fn summarize(report_type: ReportType, baseline: &UsageMap, usages: &UsageMap) -> Summary {
    let mut summary = Summary::default();

    for (project, records) in usages {
        let (price, quantity, total) = sum_included(report_type, records);
        let (base_price, base_quantity, base_total) = baseline
            .get(project)
            .map(|base| sum_included(report_type, base))
            .unwrap_or_default();

        let record = SummaryRecord {
            price,
            quantity,
            total,
            base_price,
            base_quantity,
            base_total,
        };
        summary.totals.accumulate(&record);
        summary.projects.push((project.clone(), record));
    }

    summary.baseline_only = baseline
        .keys()
        .filter(|project| !usages.contains_key(*project))
        .cloned()
        .collect();

    summary
}
