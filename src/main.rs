mod config;
mod error;
mod gateway;
mod logging;
mod models;
mod proration;
mod providers;
mod report;
mod service;
mod sink;
mod summary;
mod timestamp;

use chrono::{DateTime, Days, Duration, NaiveDate, SubsecRound, Utc};
use clap::{Args, Parser, Subcommand};
use config::{get_api_token, get_bigquery_token, load_config, AppConfig};
use error::AppError;
use models::{ReportType, UsageWindow};
use providers::equinix::EquinixAdapter;
use service::{build_http_client, BillingService, CostSummaryRequest, UploadRequest};
use sink::bigquery::BigQuerySink;
use sink::TableRef;
use std::process::ExitCode;
use timestamp::{parse_date, parse_partial_iso};
use tracing::{debug, error, info};

#[derive(Debug, Parser)]
#[command(name = "equinix-billing", version)]
#[command(about = "Equinix Metal cost summaries and BigQuery usage uploads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compare per-project costs against a baseline period
    #[command(name = "cost-summary", alias = "cost_summary")]
    CostSummary(CostSummaryArgs),
    /// Upload usage records to a BigQuery table
    Bigquery(BigqueryArgs),
}

#[derive(Debug, Args)]
struct CostSummaryArgs {
    /// Number of days to aggregate
    #[arg(short, long, default_value_t = 1)]
    days: u32,

    /// End date in YYYY-MM-DD format (default: 2 days ago)
    #[arg(short, long)]
    end: Option<String>,

    /// Baseline end date in YYYY-MM-DD format (default: day before the start date)
    #[arg(short, long)]
    baseline: Option<String>,

    /// Report type: "reservations", or blank for everything except reservations
    #[arg(short = 't', long = "type", default_value = "")]
    report_type: String,

    /// Only report gateways, split between Kubo and LB nodes
    #[arg(short, long)]
    gateways: bool,
}

#[derive(Debug, Args)]
struct BigqueryArgs {
    /// Start time in ISO8601 format, UTC assumed for partial values (default: 2 days ago)
    #[arg(short, long)]
    start: Option<String>,

    /// Time interval in seconds
    #[arg(short, long, default_value_t = 86_400)]
    interval: i64,

    /// BigQuery project ID
    #[arg(short, long)]
    project: String,

    /// BigQuery dataset ID
    #[arg(short, long)]
    dataset: String,

    /// BigQuery table ID
    #[arg(short, long)]
    table: String,
}

fn two_days_ago(today: NaiveDate) -> Result<NaiveDate, AppError> {
    today
        .checked_sub_days(Days::new(2))
        .ok_or_else(|| AppError::Config(format!("cannot go back two days from {today}")))
}

fn cost_summary_request(
    args: &CostSummaryArgs,
    today: NaiveDate,
) -> Result<CostSummaryRequest, AppError> {
    let report_type = ReportType::parse(&args.report_type)?;
    let end_date = match &args.end {
        Some(raw) => parse_date(raw)?,
        None => two_days_ago(today)?,
    };
    let baseline_end = args.baseline.as_deref().map(parse_date).transpose()?;
    CostSummaryRequest::new(args.days, end_date, baseline_end, report_type, args.gateways)
}

fn upload_window(start: Option<&str>, interval: i64, now: DateTime<Utc>) -> Result<UsageWindow, AppError> {
    if interval <= 0 {
        return Err(AppError::Config(format!(
            "time interval must be a positive number of seconds, got {interval}"
        )));
    }
    let start = match start {
        Some(raw) => parse_partial_iso(raw)?,
        None => (now - Duration::days(2)).trunc_subsecs(3),
    };
    let end = start
        .checked_add_signed(Duration::seconds(interval))
        .ok_or_else(|| AppError::Config(format!("interval {interval}s is out of range")))?;
    UsageWindow::new(start, end)
}

fn billing_service(cfg: &AppConfig, client: reqwest::Client) -> Result<BillingService, AppError> {
    let token = get_api_token()?;
    let adapter = EquinixAdapter::new(client, cfg.api_base_url.clone(), token);
    Ok(BillingService::new(Box::new(adapter)))
}

async fn run(cli: Cli, cfg: AppConfig) -> Result<(), AppError> {
    let client = build_http_client(&cfg)?;

    match cli.command {
        Commands::CostSummary(args) => {
            let svc = billing_service(&cfg, client)?;
            let request = cost_summary_request(&args, Utc::now().date_naive())?;
            debug!(?request, "cost summary");
            let report = svc.cost_summary(&request).await?;
            print!("{report}");
        }
        Commands::Bigquery(args) => {
            let svc = billing_service(&cfg, client.clone())?;
            let window = upload_window(args.start.as_deref(), args.interval, Utc::now())?;
            let table = TableRef::new(&args.project, &args.dataset, &args.table)?;
            let sink = BigQuerySink::new(client, cfg.bigquery_base_url.clone(), get_bigquery_token()?);
            let report = svc.upload(&sink, &UploadRequest { window, table }).await?;
            info!(
                projects = report.projects,
                rows = report.rows,
                "upload finished"
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(&cfg);

    match run(cli, cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
