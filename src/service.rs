use crate::config::AppConfig;
use crate::error::AppError;
use crate::gateway::{split_gateways, GATEWAY_PROJECT};
use crate::models::{Project, ReportType, UsageWindow};
use crate::proration::prorate_all;
use crate::providers::{fetch_usages, UsageSource};
use crate::report::render_report;
use crate::sink::{build_rows, TableRef, UsageSink};
use crate::summary::summarize;
use chrono::{Days, NaiveDate};
use reqwest::Client;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostSummaryRequest {
    pub report_type: ReportType,
    pub only_gateways: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub baseline_start: NaiveDate,
    pub baseline_end: NaiveDate,
}

fn days_before(date: NaiveDate, days: u64) -> Result<NaiveDate, AppError> {
    date.checked_sub_days(Days::new(days))
        .ok_or_else(|| AppError::Config(format!("date {date} minus {days} days is out of range")))
}

impl CostSummaryRequest {
    /// Report covers `days` days ending on `end_date`. The baseline covers the
    /// same number of days, ending on `baseline_end` or the day before the report starts.
    pub fn new(
        days: u32,
        end_date: NaiveDate,
        baseline_end: Option<NaiveDate>,
        report_type: ReportType,
        only_gateways: bool,
    ) -> Result<Self, AppError> {
        if days == 0 {
            return Err(AppError::Config(
                "number of days to aggregate must be at least 1".into(),
            ));
        }
        let span = u64::from(days - 1);
        let start_date = days_before(end_date, span)?;
        let baseline_end = match baseline_end {
            Some(date) => date,
            None => days_before(start_date, 1)?,
        };
        let baseline_start = days_before(baseline_end, span)?;

        Ok(Self {
            report_type,
            only_gateways,
            start_date,
            end_date,
            baseline_start,
            baseline_end,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub window: UsageWindow,
    pub table: TableRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadReport {
    pub projects: usize,
    pub rows: usize,
}

pub fn build_http_client(cfg: &AppConfig) -> Result<Client, AppError> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = cfg.connect_timeout() {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = cfg.request_timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

pub struct BillingService {
    source: Box<dyn UsageSource + Send + Sync>,
}

impl BillingService {
    pub fn new(source: Box<dyn UsageSource + Send + Sync>) -> Self {
        Self { source }
    }

    async fn projects(&self, only_gateways: bool) -> Result<Vec<Project>, AppError> {
        let mut projects = self.source.list_projects().await?;
        info!(count = projects.len(), "loaded project list");

        if only_gateways {
            projects.retain(|p| p.name == GATEWAY_PROJECT);
            if projects.is_empty() {
                return Err(AppError::Config(format!(
                    "no project named {GATEWAY_PROJECT:?} found"
                )));
            }
        } else {
            projects.sort_by_cached_key(|p| p.name.to_uppercase());
        }
        Ok(projects)
    }

    /// Builds the comparative text report for the request.
    pub async fn cost_summary(&self, request: &CostSummaryRequest) -> Result<String, AppError> {
        let projects = self.projects(request.only_gateways).await?;

        let window = UsageWindow::from_dates(request.start_date, request.end_date)?;
        let baseline_window = UsageWindow::from_dates(request.baseline_start, request.baseline_end)?;

        let mut usages = fetch_usages(self.source.as_ref(), &window, &projects).await?;
        let mut baseline = fetch_usages(self.source.as_ref(), &baseline_window, &projects).await?;

        if request.only_gateways {
            usages = split_gateways(usages);
            baseline = split_gateways(baseline);
        }

        let usages = prorate_all(usages, &window);
        let baseline = prorate_all(baseline, &baseline_window);

        let mut summary = summarize(request.report_type, &baseline, &usages);
        if !request.only_gateways {
            summary.sort_projects_case_insensitive();
        }
        for project in &summary.baseline_only {
            warn!(project = %project, "project has baseline usage only and is left out of the report");
        }

        Ok(render_report(&summary, request.baseline_end, request.end_date))
    }

    /// Streams the window's usage into the sink, one batch per project.
    pub async fn upload(
        &self,
        sink: &(dyn UsageSink + Send + Sync),
        request: &UploadRequest,
    ) -> Result<UploadReport, AppError> {
        info!(
            start = %request.window.start,
            end = %request.window.end,
            table = %request.table,
            "Inserting from {} to {}",
            request.window.start,
            request.window.end
        );

        let projects = self.projects(false).await?;
        let usages = fetch_usages(self.source.as_ref(), &request.window, &projects).await?;

        let mut report = UploadReport::default();
        for (project, records) in usages {
            let rows = build_rows(&project, records, &request.window);
            if rows.is_empty() {
                info!(project = %project, "no records to insert");
                continue;
            }

            info!(sink = sink.name(), "{project}: inserting {} records", rows.len());
            sink.insert_rows(&request.table, &rows)
                .await
                .map_err(|e| match e {
                    AppError::Sink(msg) => AppError::Sink(format!("project {project}: {msg}")),
                    other => other,
                })?;

            report.projects += 1;
            report.rows += rows.len();
        }

        Ok(report)
    }
}
