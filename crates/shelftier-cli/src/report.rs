use std::io::Write;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shelftier_core::{
    Channel, DeltaBase, OrderRecord, ProductSalesRow, Tier, TiersConfig, TiersConfigInput,
};
use shelftier_engine::{
    assign_tiers, previous_window, summarize_sku, Orchestrator, SalesInput, SummaryQuery,
};

use crate::args::{PolicyArgs, TiersArgs, WindowArgs};

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub(crate) fn emit<T: Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn load_orders(path: &Path) -> anyhow::Result<Vec<OrderRecord>> {
    let orders: Vec<OrderRecord> = read_json(path)?;
    tracing::debug!(count = orders.len(), path = %path.display(), "loaded orders");
    Ok(orders)
}

pub(crate) fn run_aggregate(
    orders: &Path,
    channel: Channel,
    window: &WindowArgs,
    policy: &PolicyArgs,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let orders = load_orders(orders)?;
    let window = window.resolve(now, TiersConfig::default().sales_window_days)?;
    let policy_values = policy.policy();
    let selected = window.select(&orders, policy_values.time_field);
    let rows = policy
        .aggregator()
        .aggregate(&selected, channel, &window, &policy_values);
    tracing::info!(%channel, orders = selected.len(), products = rows.len(), "aggregated");
    emit(out, &rows)
}

pub(crate) fn run_assign(
    rows: &Path,
    tiers: &TiersArgs,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let rows: Vec<ProductSalesRow> = read_json(rows)?;
    let config = tiers.load()?;
    emit(out, &assign_tiers(&rows, &config, now))
}

pub(crate) struct OrdersArgs<'a> {
    pub orders: &'a Path,
    pub channel: Channel,
    pub window: &'a WindowArgs,
    pub policy: &'a PolicyArgs,
    pub tiers: &'a TiersArgs,
}

pub(crate) fn run_recalculate(
    args: &OrdersArgs<'_>,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let orders = load_orders(args.orders)?;
    let config = args.tiers.load()?;
    let window = args.window.resolve(now, config.sales_window_days)?;
    let policy = args.policy.policy();
    let aggregator = args.policy.aggregator();
    let orchestrator = Orchestrator {
        aggregator: &aggregator,
        config: &config,
        policy: &policy,
        now,
    };
    let selected = window.select(&orders, policy.time_field);
    let assignments =
        orchestrator.recalculate(SalesInput::Orders(selected), args.channel, &window)?;
    emit(out, &assignments)
}

#[derive(Debug, Clone)]
pub(crate) struct SummaryOptions {
    pub tiers: Vec<Tier>,
    pub search: Option<String>,
    pub page: usize,
    pub page_size: usize,
    pub lite: bool,
    pub delta_base: DeltaBase,
}

pub(crate) fn run_summary(
    args: &OrdersArgs<'_>,
    options: SummaryOptions,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let orders = load_orders(args.orders)?;
    let config = args.tiers.load()?;
    let window = args.window.resolve(now, config.sales_window_days)?;
    let policy = args.policy.policy();
    let aggregator = args.policy.aggregator();
    let orchestrator = Orchestrator {
        aggregator: &aggregator,
        config: &config,
        policy: &policy,
        now,
    };

    let current = orchestrator.ranked_rows(
        SalesInput::Orders(window.select(&orders, policy.time_field)),
        args.channel,
        &window,
    )?;
    let prev_window = if options.lite {
        None
    } else {
        Some(previous_window(
            &window,
            options.delta_base,
            args.window.tz_offset_hours,
        )?)
    };
    let previous = prev_window
        .map(|w| {
            orchestrator.ranked_rows(
                SalesInput::Orders(w.select(&orders, policy.time_field)),
                args.channel,
                &w,
            )
        })
        .transpose()?;

    let query = SummaryQuery {
        tiers: options.tiers,
        search: options.search,
        page: options.page,
        page_size: options.page_size,
    };
    let summary =
        orchestrator.summarize(current, previous.as_deref(), window, prev_window, &query)?;
    emit(out, &summary)
}

pub(crate) fn run_sku(
    orders: &Path,
    sku: &str,
    channel: Channel,
    window: &WindowArgs,
    policy: &PolicyArgs,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let orders = load_orders(orders)?;
    let window = window.resolve(now, TiersConfig::default().sales_window_days)?;
    let selected = window.select(&orders, policy.time_field);
    emit(out, &summarize_sku(&policy.aggregator(), &selected, sku.trim(), channel))
}

/// Normalizes a config file without writing it back. Threshold-order
/// violations are errors; other malformed fields fall back to defaults.
pub(crate) fn run_config_validate(path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let input: TiersConfigInput = read_json(path)?;
    let config = TiersConfig::normalized(&input, &TiersConfig::default())
        .with_context(|| format!("validating {}", path.display()))?;
    emit(out, &config)
}
