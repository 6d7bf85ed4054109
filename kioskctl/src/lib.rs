use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;

use kiosk_core::{KioskConfig, MetricsSnapshot, UrlCatalog};

mod commands;

pub use commands::run::RunArgs;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] kiosk_core::ConfigError),
    #[error("url catalog error: {0}")]
    Catalog(#[from] kiosk_core::CatalogError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metrics error: {0}")]
    Metrics(#[from] kiosk_core::MetricsError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("probe error: {0}")]
    Probe(#[from] kiosk_core::ProbeError),
    #[error("rotation error: {0}")]
    Rotation(#[from] kiosk_core::RotationError),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Kiosk web-page rotation daemon", long_about = None)]
pub struct Cli {
    /// Path to the kiosk configuration file
    #[arg(long, default_value = "configs/kiosk.toml")]
    pub config: PathBuf,
    /// Path to the URL catalog file
    #[arg(long, default_value = "configs/urls.toml")]
    pub urls: PathBuf,
    /// Output format for reporting commands
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the rotation daemon until interrupted
    Run(RunArgs),
    /// Validate configuration and URL catalog
    Check,
    /// Show the last persisted metrics snapshot
    Metrics,
    /// List catalog categories, or one category's URLs
    Catalog(CatalogArgs),
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Show only this category
    #[arg(long)]
    pub category: Option<String>,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();

    match &cli.command {
        Commands::Run(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::run::execute(&cli, args))
        }
        Commands::Check => {
            let report = check_report(&cli);
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more checks failed".to_string(),
                ));
            }
            Ok(())
        }
        Commands::Metrics => {
            let config = KioskConfig::load_or_default(&cli.config);
            let snapshot = MetricsSnapshot::read(&config.observability.metrics_path)?;
            render(&snapshot, cli.format)
        }
        Commands::Catalog(args) => {
            let catalog = UrlCatalog::load_or_default(&cli.urls);
            let listing = catalog_listing(&catalog, args);
            render(&listing, cli.format)
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn check_report(cli: &Cli) -> Vec<CheckEntry> {
    let mut report = Vec::new();

    let config = match KioskConfig::load(&cli.config) {
        Ok(config) => {
            report.push(CheckEntry::ok(
                "config",
                format!("{} parsed", cli.config.display()),
            ));
            config
        }
        Err(err) => {
            report.push(CheckEntry::warn(
                "config",
                format!("{err}; daemon would fall back to defaults"),
            ));
            KioskConfig::default()
        }
    };

    match UrlCatalog::load(&cli.urls) {
        Ok(catalog) => {
            if catalog.is_empty() {
                report.push(CheckEntry::error(
                    "catalog",
                    format!("{} contains no urls", cli.urls.display()),
                ));
            } else {
                report.push(CheckEntry::ok(
                    "catalog",
                    format!(
                        "{} urls across {} categories",
                        catalog.len(),
                        catalog.categories.len()
                    ),
                ));
            }
        }
        Err(err) => {
            report.push(CheckEntry::warn(
                "catalog",
                format!("{err}; daemon would fall back to the built-in list"),
            ));
        }
    }

    if config.network.user_agents.is_empty() {
        report.push(CheckEntry::warn(
            "user_agents",
            "pool is empty, the built-in fallback agent will be used".to_string(),
        ));
    }

    let metrics_path = &config.observability.metrics_path;
    if metrics_path.exists() {
        match MetricsSnapshot::read(metrics_path) {
            Ok(snapshot) => report.push(CheckEntry::ok(
                "metrics",
                format!(
                    "last snapshot: {} visits, {:.0}% success",
                    snapshot.total_visits,
                    snapshot.success_rate * 100.0
                ),
            )),
            Err(err) => report.push(CheckEntry::warn(
                "metrics",
                format!("snapshot unreadable: {err}"),
            )),
        }
    } else {
        report.push(CheckEntry::warn(
            "metrics",
            format!("{} not yet written", metrics_path.display()),
        ));
    }

    report
}

fn catalog_listing(catalog: &UrlCatalog, args: &CatalogArgs) -> CatalogListing {
    match &args.category {
        Some(name) => CatalogListing {
            categories: catalog
                .categories
                .iter()
                .filter(|category| category.name.eq_ignore_ascii_case(name))
                .map(|category| CategoryListing {
                    name: category.name.clone(),
                    url_count: category.urls.len(),
                    urls: category.urls.clone(),
                })
                .collect(),
        },
        None => CatalogListing {
            categories: catalog
                .categories
                .iter()
                .map(|category| CategoryListing {
                    name: category.name.clone(),
                    url_count: category.urls.len(),
                    urls: Vec::new(),
                })
                .collect(),
        },
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct CheckEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{label}")
    }
}

impl CheckEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for Vec<CheckEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(|entry| {
                format!(
                    "[{status}] {name} — {detail}",
                    status = entry.status,
                    name = entry.name,
                    detail = entry.detail
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for MetricsSnapshot {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Generated: {}", self.generated_at),
            format!("Session duration: {} s", self.session_duration_secs),
            format!(
                "Visits: {} total, {} successful ({:.0}%)",
                self.total_visits,
                self.successful_visits,
                self.success_rate * 100.0
            ),
            format!("Browser restarts: {}", self.browser_restarts),
            format!("Avg load time: {:.2} s", self.avg_load_time_secs),
            format!("Avg memory: {:.1}%", self.avg_memory_percent),
        ];
        if !self.failed_urls.is_empty() {
            lines.push("Failed urls:".to_string());
            for url in &self.failed_urls {
                lines.push(format!("  - {url}"));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogListing {
    pub categories: Vec<CategoryListing>,
}

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    pub name: String,
    pub url_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

impl DisplayFallback for CatalogListing {
    fn display(&self) -> String {
        if self.categories.is_empty() {
            return "no matching categories".to_string();
        }
        let mut lines = Vec::new();
        for category in &self.categories {
            lines.push(format!("{} ({} urls)", category.name, category.url_count));
            for url in &category.urls {
                lines.push(format!("  - {url}"));
            }
        }
        lines.join("\n")
    }
}
