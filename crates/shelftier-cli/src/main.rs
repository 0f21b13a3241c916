mod args;
mod report;

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use shelftier_core::{Channel, DeltaBase, Tier};
use tracing_subscriber::EnvFilter;

use crate::args::{parse_positive, PolicyArgs, TiersArgs, WindowArgs};
use crate::report::{OrdersArgs, SummaryOptions};

#[derive(Debug, Parser)]
#[command(name = "shelftier-cli")]
#[command(about = "Run sales aggregation and tiering over exported order files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Aggregate orders into per-product sales rows.
    Aggregate {
        /// JSON array of order records.
        #[arg(long)]
        orders: PathBuf,
        #[arg(long, default_value = "TOTAL")]
        channel: Channel,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Assign tiers to already-aggregated product rows.
    Assign {
        /// JSON array of product sales rows.
        #[arg(long)]
        rows: PathBuf,
        #[command(flatten)]
        tiers: TiersArgs,
    },
    /// Aggregate orders and assign tiers by quantity share.
    Recalculate {
        #[arg(long)]
        orders: PathBuf,
        #[arg(long, default_value = "TOTAL")]
        channel: Channel,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        policy: PolicyArgs,
        #[command(flatten)]
        tiers: TiersArgs,
    },
    /// Ranked, filtered and paginated summary with share deltas.
    Summary {
        #[arg(long)]
        orders: PathBuf,
        #[arg(long, default_value = "TOTAL")]
        channel: Channel,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        policy: PolicyArgs,
        #[command(flatten)]
        tiers: TiersArgs,
        /// Keep only these tiers (comma-separated).
        #[arg(long = "tier", value_delimiter = ',')]
        tier_filter: Vec<Tier>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1, value_parser = parse_positive::<usize>)]
        page: usize,
        #[arg(long, default_value_t = 50, value_parser = parse_positive::<usize>)]
        page_size: usize,
        /// Skip the comparison window; every delta is zero.
        #[arg(long)]
        lite: bool,
        #[arg(long, env = "SHELFTIER_DELTA_BASE", default_value = "anchor_start")]
        delta_base: DeltaBase,
    },
    /// Exact-SKU totals, overall and per originating app.
    Sku {
        #[arg(long)]
        orders: PathBuf,
        #[arg(long)]
        sku: String,
        #[arg(long, default_value = "TOTAL")]
        channel: Channel,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Tiers config file utilities.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the normalized config, failing on inverted thresholds.
    Validate {
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let level = std::env::var("SHELFTIER_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    run(cli, Utc::now(), &mut stdout.lock())
}

fn run(cli: Cli, now: DateTime<Utc>, out: &mut impl Write) -> anyhow::Result<()> {
    match cli.command {
        Commands::Aggregate {
            orders,
            channel,
            window,
            policy,
        } => report::run_aggregate(&orders, channel, &window, &policy, now, out),
        Commands::Assign { rows, tiers } => report::run_assign(&rows, &tiers, now, out),
        Commands::Recalculate {
            orders,
            channel,
            window,
            policy,
            tiers,
        } => {
            let args = OrdersArgs {
                orders: &orders,
                channel,
                window: &window,
                policy: &policy,
                tiers: &tiers,
            };
            report::run_recalculate(&args, now, out)
        }
        Commands::Summary {
            orders,
            channel,
            window,
            policy,
            tiers,
            tier_filter,
            search,
            page,
            page_size,
            lite,
            delta_base,
        } => {
            let args = OrdersArgs {
                orders: &orders,
                channel,
                window: &window,
                policy: &policy,
                tiers: &tiers,
            };
            let options = SummaryOptions {
                tiers: tier_filter,
                search,
                page,
                page_size,
                lite,
                delta_base,
            };
            report::run_summary(&args, options, now, out)
        }
        Commands::Sku {
            orders,
            sku,
            channel,
            window,
            policy,
        } => report::run_sku(&orders, &sku, channel, &window, &policy, now, out),
        Commands::Config {
            command: ConfigCommands::Validate { path },
        } => report::run_config_validate(&path, out),
    }
}

#[cfg(test)]
mod tests;
