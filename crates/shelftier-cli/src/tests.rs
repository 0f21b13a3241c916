use std::path::PathBuf;

use serde_json::{json, Value};
use shelftier_core::TimeField;

use super::*;

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn fixture(name: &str, value: &Value) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "shelftier-cli-{}-{name}.json",
        std::process::id()
    ));
    std::fs::write(&path, value.to_string()).expect("write fixture");
    path
}

fn orders_file(name: &str) -> PathBuf {
    let line = |qty: u32, amount: &str, sku: &str, product: &str, title: &str| {
        json!({
            "quantity": qty,
            "amount": amount,
            "variant": { "sku": sku, "productId": product, "productName": title }
        })
    };
    fixture(
        name,
        &json!([
            {
                "id": "o1",
                "processedAt": "2024-05-10T10:00:00Z",
                "lineItems": [line(3, "90.00", "ROSE-30", "p1", "Rose")]
            },
            {
                "id": "o2",
                "processedAt": "2024-05-12T10:00:00Z",
                "appName": "Point of Sale",
                "lineItems": [line(1, "60.00", "IRIS-100", "p2", "Iris")]
            },
            {
                "id": "o3",
                "processedAt": "2024-04-20T10:00:00Z",
                "lineItems": [line(1, "100.00", "IRIS-100", "p2", "Iris")]
            }
        ]),
    )
}

fn run_args(args: &[&str]) -> anyhow::Result<Value> {
    let cli = Cli::try_parse_from(args)?;
    let mut out = Vec::new();
    run(cli, now(), &mut out)?;
    Ok(serde_json::from_slice(&out)?)
}

fn path_str(path: &std::path::Path) -> &str {
    path.to_str().expect("utf8 temp path")
}

const MAY: [&str; 4] = [
    "--from",
    "2024-05-01T00:00:00Z",
    "--to",
    "2024-06-01T00:00:00Z",
];

// -------------------------------------------------------------------------
// Parsing
// -------------------------------------------------------------------------

#[test]
fn parses_aggregate_with_defaults() {
    let cli = Cli::try_parse_from(["shelftier-cli", "aggregate", "--orders", "o.json"])
        .expect("expected valid cli args");
    let Commands::Aggregate {
        channel,
        window,
        policy,
        ..
    } = cli.command
    else {
        panic!("expected aggregate command");
    };
    assert_eq!(channel, Channel::Total);
    assert!(window.from.is_none());
    assert!(!policy.net);
    assert_eq!(policy.time_field, TimeField::ProcessedAt);
    assert_eq!(policy.pos_app_names, vec!["Point of Sale".to_string()]);
}

#[test]
fn parses_negative_offset_and_pos_app_list() {
    let cli = Cli::try_parse_from([
        "shelftier-cli",
        "aggregate",
        "--orders",
        "o.json",
        "--tz-offset-hours",
        "-5",
        "--pos-app",
        "Point of Sale,Kiosk",
        "--channel",
        "pos",
    ])
    .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Aggregate {
            channel: Channel::Pos,
            ref window,
            ref policy,
            ..
        } if window.tz_offset_hours == -5 && policy.pos_app_names.len() == 2
    ));
}

#[test]
fn from_requires_to() {
    let result = Cli::try_parse_from([
        "shelftier-cli",
        "aggregate",
        "--orders",
        "o.json",
        "--from",
        "2024-05-01T00:00:00Z",
    ]);
    assert!(result.is_err());
}

#[test]
fn until_conflicts_with_explicit_bounds() {
    let mut args = vec!["shelftier-cli", "aggregate", "--orders", "o.json"];
    args.extend(MAY);
    args.extend(["--until", "2024-05-31"]);
    assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn summary_parses_tier_filter_and_rejects_zero_page() {
    let cli = Cli::try_parse_from([
        "shelftier-cli",
        "summary",
        "--orders",
        "o.json",
        "--tier",
        "SS,b",
        "--delta-base",
        "month_prev",
    ])
    .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Summary {
            ref tier_filter,
            page: 1,
            page_size: 50,
            delta_base: DeltaBase::PreviousMonth,
            ..
        } if tier_filter == &vec![Tier::Ss, Tier::B]
    ));

    let result = Cli::try_parse_from(["shelftier-cli", "summary", "--orders", "o.json", "--page", "0"]);
    assert!(result.is_err());
}

#[test]
fn parses_config_validate() {
    let cli = Cli::try_parse_from(["shelftier-cli", "config", "validate", "tiers.json"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommands::Validate { ref path }
        } if path == &PathBuf::from("tiers.json")
    ));
}

#[test]
fn missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["shelftier-cli"]).is_err());
}

// -------------------------------------------------------------------------
// Commands
// -------------------------------------------------------------------------

#[test]
fn aggregate_reads_orders_in_window() {
    let orders = orders_file("aggregate");
    let mut args = vec!["shelftier-cli", "aggregate", "--orders", path_str(&orders)];
    args.extend(MAY);
    let rows = run_args(&args).expect("aggregate runs");

    let rows = rows.as_array().expect("rows array");
    assert_eq!(rows.len(), 2);
    let rose = rows
        .iter()
        .find(|r| r["productId"] == "p1")
        .expect("p1 row");
    assert_eq!(rose["qty30"], 3);
    assert_eq!(rose["qty100"], 0);
    let iris = rows
        .iter()
        .find(|r| r["productId"] == "p2")
        .expect("p2 row");
    assert_eq!(iris["qty100"], 1);
}

#[test]
fn oversized_day_count_is_an_error() {
    let orders = orders_file("aggregate-days");
    let err = run_args(&[
        "shelftier-cli",
        "aggregate",
        "--orders",
        path_str(&orders),
        "--days",
        "4294967295",
    ])
    .expect_err("window cannot be represented");
    assert!(format!("{err:#}").contains("representable range"));
}

#[test]
fn aggregate_online_channel_excludes_pos_orders() {
    let orders = orders_file("aggregate-online");
    let mut args = vec![
        "shelftier-cli",
        "aggregate",
        "--orders",
        path_str(&orders),
        "--channel",
        "ONLINE",
    ];
    args.extend(MAY);
    let rows = run_args(&args).expect("aggregate runs");
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["productId"], "p1");
}

#[test]
fn summary_reports_share_deltas() {
    let orders = orders_file("summary");
    let mut args = vec![
        "shelftier-cli",
        "summary",
        "--orders",
        path_str(&orders),
        "--tz-offset-hours",
        "0",
    ];
    args.extend(MAY);
    let summary = run_args(&args).expect("summary runs");

    assert_eq!(summary["total"], 2);
    assert_eq!(summary["rows"][0]["productId"], "p1");
    assert_eq!(summary["rows"][0]["rank"], 1);
    assert!((summary["rows"][0]["deltaSharePct"].as_f64().unwrap() - 60.0).abs() < 1e-9);
    assert!((summary["rows"][1]["deltaSharePct"].as_f64().unwrap() + 60.0).abs() < 1e-9);
    assert_eq!(summary["previousWindow"]["from"], "2024-03-31T00:00:00Z");
}

#[test]
fn lite_summary_has_zero_deltas() {
    let orders = orders_file("summary-lite");
    let mut args = vec![
        "shelftier-cli",
        "summary",
        "--orders",
        path_str(&orders),
        "--lite",
        "--page-size",
        "1",
    ];
    args.extend(MAY);
    let summary = run_args(&args).expect("summary runs");

    assert_eq!(summary["total"], 2);
    assert_eq!(summary["rows"].as_array().map(Vec::len), Some(1));
    assert_eq!(summary["rows"][0]["deltaSharePct"], 0.0);
    assert!(summary.get("previousWindow").is_none());
}

#[test]
fn assign_uses_config_thresholds_and_quantity_shares() {
    let row = |id: &str, qty: i64| {
        json!({
            "productId": id,
            "name": id,
            "qty30": qty,
            "qty100": 0,
            "revenue": "0",
            "totalSales": "0"
        })
    };
    let rows = fixture("assign-rows", &json!([row("p1", 10), row("p2", 5), row("p3", 85)]));
    let config = fixture(
        "assign-config",
        &json!({ "tierSSPct": 50, "tierSPct": 8, "tierAPct": 2, "tiersTopCount": 0 }),
    );

    let out = run_args(&[
        "shelftier-cli",
        "assign",
        "--rows",
        path_str(&rows),
        "--config",
        path_str(&config),
    ])
    .expect("assign runs");

    let tiers: Vec<(String, String)> = out
        .as_array()
        .expect("assignments")
        .iter()
        .map(|a| {
            (
                a["productId"].as_str().unwrap_or_default().to_string(),
                a["tier"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    assert_eq!(
        tiers,
        vec![
            ("p3".to_string(), "SS".to_string()),
            ("p1".to_string(), "S".to_string()),
            ("p2".to_string(), "A".to_string()),
        ]
    );
}

#[test]
fn recalculate_covers_every_product_once() {
    let orders = orders_file("recalculate");
    let mut args = vec!["shelftier-cli", "recalculate", "--orders", path_str(&orders)];
    args.extend(MAY);
    let out = run_args(&args).expect("recalculate runs");
    let ids: Vec<&str> = out
        .as_array()
        .expect("assignments")
        .iter()
        .filter_map(|a| a["productId"].as_str())
        .collect();
    assert_eq!(ids, vec!["p1", "p2"]);
}

#[test]
fn sku_totals_group_by_app() {
    let orders = orders_file("sku");
    let args = [
        "shelftier-cli",
        "sku",
        "--orders",
        path_str(&orders),
        "--sku",
        "IRIS-100",
        "--from",
        "2024-04-01T00:00:00Z",
        "--to",
        "2024-06-01T00:00:00Z",
    ];
    let out = run_args(&args).expect("sku runs");
    assert_eq!(out["qty"], 2);
    assert_eq!(out["byApp"]["Point of Sale"]["qty"], 1);
    assert_eq!(out["byApp"]["Online Store"]["qty"], 1);
}

#[test]
fn config_validate_normalizes_malformed_fields() {
    let path = fixture(
        "config-valid",
        &json!({ "tierSSPct": "lots", "tiersTopCount": 12 }),
    );
    let out = run_args(&["shelftier-cli", "config", "validate", path_str(&path)])
        .expect("validate runs");
    assert_eq!(out["tierSSPct"], 20.0);
    assert_eq!(out["tiersTopCount"], 12);
}

#[test]
fn config_validate_rejects_inverted_thresholds() {
    let path = fixture("config-inverted", &json!({ "tierSSPct": 1, "tierSPct": 5 }));
    let err = run_args(&["shelftier-cli", "config", "validate", path_str(&path)])
        .expect_err("inverted thresholds fail");
    assert!(format!("{err:#}").contains("SS >= S >= A"));
}
