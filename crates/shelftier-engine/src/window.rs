//! Half-open reporting windows anchored to a fixed UTC offset.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use shelftier_core::{DeltaBase, OrderRecord, TimeField};

use crate::error::EngineError;

/// A half-open time range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl SalesWindow {
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyWindow`] unless `from < to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, EngineError> {
        if from >= to {
            return Err(EngineError::EmptyWindow { from, to });
        }
        Ok(Self { from, to })
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at < self.to
    }

    #[must_use]
    pub fn span(&self) -> Duration {
        self.to - self.from
    }

    /// Window length rounded up to whole days, at least one.
    #[must_use]
    pub fn whole_days(&self) -> i64 {
        let secs = self.span().num_seconds();
        ((secs + 86_399) / 86_400).max(1)
    }

    /// Orders whose `field` timestamp falls inside the window. Orders
    /// without that timestamp are skipped.
    #[must_use]
    pub fn select(&self, orders: &[OrderRecord], field: TimeField) -> Vec<OrderRecord> {
        orders
            .iter()
            .filter(|o| o.timestamp(field).is_some_and(|t| self.contains(t)))
            .cloned()
            .collect()
    }
}

fn offset(offset_hours: i32) -> Result<FixedOffset, EngineError> {
    FixedOffset::east_opt(offset_hours * 3600).ok_or(EngineError::OutOfRange)
}

fn local_midnight(date: NaiveDate, tz: FixedOffset) -> Result<DateTime<Utc>, EngineError> {
    let naive = date.and_hms_opt(0, 0, 0).ok_or(EngineError::OutOfRange)?;
    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(EngineError::OutOfRange)
}

/// The trailing `days` local days ending at `now`.
///
/// With `completed_only` the window ends at the start of the current local
/// day; otherwise it ends at the start of the next one.
///
/// # Errors
///
/// Returns [`EngineError::ZeroDays`] when `days` is 0 and
/// [`EngineError::OutOfRange`] when the start cannot be represented.
pub fn trailing_days(
    now: DateTime<Utc>,
    days: u32,
    completed_only: bool,
    offset_hours: i32,
) -> Result<SalesWindow, EngineError> {
    if days == 0 {
        return Err(EngineError::ZeroDays(days));
    }
    let tz = offset(offset_hours)?;
    let today = now.with_timezone(&tz).date_naive();
    let end_date = if completed_only {
        today
    } else {
        today.succ_opt().ok_or(EngineError::OutOfRange)?
    };
    let to = local_midnight(end_date, tz)?;
    SalesWindow::new(days_before(to, i64::from(days))?, to)
}

/// The `days` local days ending with (and including) the local date `on`.
///
/// # Errors
///
/// Returns [`EngineError::ZeroDays`] when `days` is 0.
pub fn days_ending_on(
    on: NaiveDate,
    days: u32,
    offset_hours: i32,
) -> Result<SalesWindow, EngineError> {
    if days == 0 {
        return Err(EngineError::ZeroDays(days));
    }
    let tz = offset(offset_hours)?;
    let to = local_midnight(on.succ_opt().ok_or(EngineError::OutOfRange)?, tz)?;
    SalesWindow::new(days_before(to, i64::from(days))?, to)
}

/// The local calendar month `month` (1-12) of `year`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidMonth`] for a month outside 1-12.
pub fn calendar_month(year: i32, month: u32, offset_hours: i32) -> Result<SalesWindow, EngineError> {
    let start =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(EngineError::InvalidMonth { year, month })?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or(EngineError::OutOfRange)?;
    let tz = offset(offset_hours)?;
    SalesWindow::new(local_midnight(start, tz)?, local_midnight(end, tz)?)
}

fn shift_back(at: DateTime<Utc>, by: Duration) -> Result<DateTime<Utc>, EngineError> {
    at.checked_sub_signed(by).ok_or(EngineError::OutOfRange)
}

fn days_before(at: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, EngineError> {
    shift_back(at, Duration::try_days(days).ok_or(EngineError::OutOfRange)?)
}

/// Derives the comparison window that precedes `current`.
///
/// # Errors
///
/// Returns [`EngineError::OutOfRange`] when the shifted bounds cannot be
/// represented.
pub fn previous_window(
    current: &SalesWindow,
    base: DeltaBase,
    offset_hours: i32,
) -> Result<SalesWindow, EngineError> {
    match base {
        DeltaBase::AnchorStart => {
            SalesWindow::new(shift_back(current.from, current.span())?, current.from)
        }
        DeltaBase::AnchorEnd => {
            let days = current.whole_days();
            SalesWindow::new(days_before(current.from, days)?, days_before(current.to, days)?)
        }
        DeltaBase::PreviousMonth => {
            let tz = offset(offset_hours)?;
            let local = current.from.with_timezone(&tz);
            let (year, month) = if local.month() == 1 {
                (local.year() - 1, 12)
            } else {
                (local.year(), local.month() - 1)
            };
            calendar_month(year, month, offset_hours)
        }
    }
}
