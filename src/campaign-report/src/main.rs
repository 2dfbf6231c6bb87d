//! Campaign Report: loads email campaign statistics for a date window and
//! prints market or date grouped performance tables and click breakdowns.

mod render;

use std::sync::Arc;

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_core::DateWindow;
use campaign_integrations::{
    fetch_click_outcomes, CampaignLoader, EmailPlatformClient, ExchangeRateClient,
    LoadedCampaigns,
};
use campaign_reporting::{analyze, select, GroupingMode, LinkFilter, ReportSnapshot};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str = "campaign_report=info,campaign_integrations=info";

#[derive(Parser, Debug)]
#[command(name = "campaign-report")]
#[command(about = "Email campaign performance and click reporting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Email platform API key (overrides config)
    #[arg(long, global = true, env = "CAMPAIGN_REPORT__API__API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Email platform API base URL (overrides config)
    #[arg(long, global = true, env = "CAMPAIGN_REPORT__API__BASE_URL")]
    api_base_url: Option<String>,

    /// Exchange-rate provider app id (overrides config)
    #[arg(long, global = true, env = "CAMPAIGN_REPORT__EXCHANGE__APP_ID", hide_env_values = true)]
    rates_app_id: Option<String>,

    /// Exchange-rate endpoint (overrides config)
    #[arg(long, global = true, env = "CAMPAIGN_REPORT__EXCHANGE__RATES_URL")]
    rates_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Grouped performance table with subtotals and a grand total
    Report {
        /// First send date, YYYY-MM-DD
        #[arg(long)]
        start: String,

        /// Last send date, YYYY-MM-DD
        #[arg(long)]
        end: String,

        /// Grouping: country or date (default from config)
        #[arg(long)]
        group_by: Option<GroupingMode>,

        /// Only report these campaigns, e.g. "2, hn, promo"
        #[arg(long)]
        select: Option<String>,

        /// When the window is empty, retry once with the start moved back this many days
        #[arg(long)]
        widen_days: Option<u32>,

        /// Hide the local-currency value column
        #[arg(long, default_value_t = false)]
        hide_local: bool,

        /// Print the snapshot as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Per-URL click breakdown for selected campaigns
    Clicks {
        /// First send date, YYYY-MM-DD
        #[arg(long)]
        start: String,

        /// Last send date, YYYY-MM-DD
        #[arg(long)]
        end: String,

        /// Campaigns to analyze, e.g. "1, 4, gt"
        #[arg(long)]
        select: String,

        /// Link filter: all, product or category
        #[arg(long, default_value = "all")]
        filter: LinkFilter,

        /// Print the click report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(key) = cli.api_key {
        config.api.api_key = key;
    }
    if let Some(url) = cli.api_base_url {
        config.api.base_url = url;
    }
    if let Some(app_id) = cli.rates_app_id {
        config.exchange.app_id = app_id;
    }
    if let Some(url) = cli.rates_url {
        config.exchange.rates_url = url;
    }
    config.validate_credentials()?;

    info!(
        base_url = %config.api.base_url,
        rates_url = %config.exchange.rates_url,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Report {
            start,
            end,
            group_by,
            select,
            widen_days,
            hide_local,
            json,
        } => {
            let window = DateWindow::parse(&start, &end)?;
            if let Some(days) = widen_days {
                config.report.widen_empty_window_days = Some(days);
            }
            let grouping = match group_by {
                Some(mode) => mode,
                None => config
                    .report
                    .default_grouping
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .context("report.default_grouping")?,
            };
            let show_local = config.report.show_local_value && !hide_local;
            cmd_report(&config, window, grouping, select, show_local, json).await
        }
        Commands::Clicks {
            start,
            end,
            select,
            filter,
            json,
        } => {
            let window = DateWindow::parse(&start, &end)?;
            cmd_clicks(&config, window, &select, filter, json).await
        }
    }
}

async fn load(
    config: &AppConfig,
    client: Arc<EmailPlatformClient>,
    window: DateWindow,
) -> anyhow::Result<LoadedCampaigns> {
    let rates = Arc::new(ExchangeRateClient::new(&config.exchange)?);
    let loader = CampaignLoader::new(client, rates)
        .with_base_currency(config.exchange.base_currency.clone())
        .with_report_config(&config.report);
    loader
        .load(window)
        .await
        .with_context(|| format!("loading campaigns for {window}"))
}

async fn cmd_report(
    config: &AppConfig,
    window: DateWindow,
    grouping: GroupingMode,
    query: Option<String>,
    show_local: bool,
    json: bool,
) -> anyhow::Result<()> {
    let client = Arc::new(EmailPlatformClient::new(&config.api)?);
    let loaded = load(config, client, window).await?;
    if loaded.window != window {
        info!(requested = %window, used = %loaded.window, "report covers a widened window");
    }

    let records = match query.as_deref() {
        Some(query) => select(&loaded.records, query),
        None => loaded.records,
    };
    let snapshot = tokio::task::spawn_blocking(move || ReportSnapshot::build(&records, grouping))
        .await
        .context("report build task failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", render::render_report(&snapshot, show_local));
    }
    Ok(())
}

async fn cmd_clicks(
    config: &AppConfig,
    window: DateWindow,
    query: &str,
    filter: LinkFilter,
    json: bool,
) -> anyhow::Result<()> {
    let client = Arc::new(EmailPlatformClient::new(&config.api)?);
    let loaded = load(config, client.clone(), window).await?;

    let selected = select(&loaded.records, query);
    if selected.is_empty() {
        warn!(query, "no campaigns matched the selection");
    }
    let outcomes = fetch_click_outcomes(client.as_ref(), &selected).await;
    let report = analyze(outcomes, filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::render_clicks(&report));
    }
    Ok(())
}
