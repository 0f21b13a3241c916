//! Query-string parsing for the tier routes. Every parser returns a message
//! suitable for a `bad_request` response.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use shelftier_core::{Channel, DeltaBase, Tier, TimeField, MAX_SALES_WINDOW_DAYS};
use shelftier_engine::{calendar_month, days_ending_on, trailing_days, SalesWindow};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryParams {
    pub channel: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    /// Last local day (`YYYY-MM-DD`) of a `days`-long window.
    pub on: Option<String>,
    pub days: Option<String>,
    pub tiers: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub lite: Option<String>,
    pub net: Option<String>,
    pub net_of_returns: Option<String>,
    pub by_refund_date: Option<String>,
    /// `refund_date` or `order_date`; overrides `byRefundDate`.
    pub returns_policy: Option<String>,
    pub time_field: Option<String>,
    pub delta_base: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSkuParams {
    pub sku: Option<String>,
    pub channel: Option<String>,
    pub days: Option<String>,
    pub on: Option<String>,
    pub time_field: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateBody {
    pub channel: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// How the requested window was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Trailing,
    Explicit,
    Anchored(NaiveDate),
    Month { year: i32, month: u32 },
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn channel(value: Option<&str>) -> Result<Channel, String> {
    present(value).map_or(Ok(Channel::Total), |v| {
        v.parse::<Channel>().map_err(|e| e.to_string())
    })
}

pub fn time_field(value: Option<&str>, default: TimeField) -> Result<TimeField, String> {
    present(value).map_or(Ok(default), |v| {
        v.parse::<TimeField>().map_err(|e| e.to_string())
    })
}

pub fn delta_base(value: Option<&str>, default: DeltaBase) -> Result<DeltaBase, String> {
    present(value).map_or(Ok(default), |v| {
        v.parse::<DeltaBase>().map_err(|e| e.to_string())
    })
}

pub fn flag(name: &str, value: Option<&str>, default: bool) -> Result<bool, String> {
    let Some(v) = present(value) else {
        return Ok(default);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{name} must be a boolean, got {v:?}")),
    }
}

pub fn positive(name: &str, value: Option<&str>, default: usize) -> Result<usize, String> {
    let Some(v) = present(value) else {
        return Ok(default);
    };
    match v.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!("{name} must be a positive integer, got {v:?}")),
    }
}

/// Window length in local days, at most [`MAX_SALES_WINDOW_DAYS`].
pub fn window_days(value: Option<&str>, default: u32) -> Result<u32, String> {
    let Some(v) = present(value) else {
        return Ok(default);
    };
    match v.parse::<u32>() {
        Ok(n) if (1..=MAX_SALES_WINDOW_DAYS).contains(&n) => Ok(n),
        _ => Err(format!(
            "days must be between 1 and {MAX_SALES_WINDOW_DAYS}, got {v:?}"
        )),
    }
}

/// `returnsPolicy` wins over `byRefundDate` when both are given.
pub fn by_refund_date(
    returns_policy: Option<&str>,
    by_refund_date: Option<&str>,
    default: bool,
) -> Result<bool, String> {
    match present(returns_policy).map(str::to_ascii_lowercase).as_deref() {
        None => flag("byRefundDate", by_refund_date, default),
        Some("refund_date") => Ok(true),
        Some("order_date") => Ok(false),
        Some(other) => Err(format!(
            "returnsPolicy must be refund_date or order_date, got {other:?}"
        )),
    }
}

pub fn tiers(value: Option<&str>) -> Result<Vec<Tier>, String> {
    let Some(v) = present(value) else {
        return Ok(Vec::new());
    };
    v.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<Tier>().map_err(|e| e.to_string()))
        .collect()
}

fn instant(name: &str, value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("{name} must be an RFC 3339 timestamp: {e}"))
}

/// Explicit `[from, to)` when both bounds are given, `None` when neither is.
pub fn explicit_window(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Option<SalesWindow>, String> {
    match (present(from), present(to)) {
        (None, None) => Ok(None),
        (Some(f), Some(t)) => {
            let window = SalesWindow::new(instant("from", f)?, instant("to", t)?)
                .map_err(|e| e.to_string())?;
            Ok(Some(window))
        }
        _ => Err("from and to must be given together".to_string()),
    }
}

pub fn anchor_date(value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    present(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| format!("on must be a YYYY-MM-DD date, got {v:?}"))
        })
        .transpose()
}

/// `days` local days ending on `on` when given, else the trailing completed
/// days before `now`.
pub fn day_window(
    on: Option<&str>,
    days: u32,
    now: DateTime<Utc>,
    offset_hours: i32,
) -> Result<(SalesWindow, WindowMode), String> {
    match anchor_date(on)? {
        Some(date) => days_ending_on(date, days, offset_hours)
            .map(|w| (w, WindowMode::Anchored(date)))
            .map_err(|e| e.to_string()),
        None => trailing_days(now, days, true, offset_hours)
            .map(|w| (w, WindowMode::Trailing))
            .map_err(|e| e.to_string()),
    }
}

/// Parses `month` as `YYYY-MM` or a bare month number. A bare month takes
/// its year from `year`, else from the current local year.
pub fn month(
    month: Option<&str>,
    year: Option<&str>,
    now: DateTime<Utc>,
    offset_hours: i32,
) -> Result<Option<(i32, u32)>, String> {
    let Some(m) = present(month) else {
        return Ok(None);
    };
    let bad = || format!("month must be YYYY-MM or 1-12, got {m:?}");

    let (y, mo) = if let Some((y, mo)) = m.split_once('-') {
        let y = y.parse::<i32>().map_err(|_| bad())?;
        (y, mo.parse::<u32>().map_err(|_| bad())?)
    } else {
        let mo = m.parse::<u32>().map_err(|_| bad())?;
        let y = match present(year) {
            Some(y) => y
                .parse::<i32>()
                .map_err(|_| format!("year must be an integer, got {y:?}"))?,
            None => {
                let tz = FixedOffset::east_opt(offset_hours * 3600)
                    .ok_or_else(|| "invalid UTC offset".to_string())?;
                now.with_timezone(&tz).year()
            }
        };
        (y, mo)
    };
    if !(1..=12).contains(&mo) {
        return Err(bad());
    }
    Ok(Some((y, mo)))
}

/// Picks the report window: a calendar month wins over explicit bounds,
/// which win over an `on` anchor date, which wins over the trailing
/// completed-day default. `days` sizes the last two.
pub fn resolve_window(
    params: &SummaryParams,
    now: DateTime<Utc>,
    default_days: u32,
    offset_hours: i32,
) -> Result<(SalesWindow, WindowMode), String> {
    if let Some((year, m)) = month(
        params.month.as_deref(),
        params.year.as_deref(),
        now,
        offset_hours,
    )? {
        let window = calendar_month(year, m, offset_hours).map_err(|e| e.to_string())?;
        return Ok((window, WindowMode::Month { year, month: m }));
    }
    if let Some(window) = explicit_window(params.from.as_deref(), params.to.as_deref())? {
        return Ok((window, WindowMode::Explicit));
    }
    let days = window_days(params.days.as_deref(), default_days)?;
    day_window(params.on.as_deref(), days, now, offset_hours)
}
