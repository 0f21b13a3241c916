use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use shelftier_core::{
    AccountingPolicy, AppConfig, Channel, DeltaBase, TierAssignment, TiersConfig,
    TiersConfigInput, TimeField,
};
use shelftier_engine::{
    previous_window, trailing_days, EngineError, Orchestrator, RankedRow, SalesWindow, SkuSummary,
    SlimRow, Summary, SummaryQuery,
};

use super::params::{self, DebugSkuParams, RecalculateBody, SummaryParams, WindowMode};
use super::{
    map_engine_error, map_provider_error, with_store, ApiError, ApiResponse, AppState,
    ResponseMeta,
};
use crate::middleware::RequestId;

const DEFAULT_PAGE_SIZE: usize = 50;

const CSV_COLUMNS: [&str; 9] = [
    "productId",
    "name",
    "tier",
    "rank",
    "qty30",
    "qty100",
    "revenue",
    "sharePct",
    "deltaSharePct",
];

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

pub(super) async fn get_config(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<TiersConfig>>, ApiError> {
    let config = with_store(&state, &req_id.0, |store| store.read()).await?;
    Ok(Json(ApiResponse {
        data: config,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn put_config(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<TiersConfig>>, ApiError> {
    let input: TiersConfigInput = serde_json::from_slice(&body).map_err(|e| {
        ApiError::bad_request(req_id.0.clone(), format!("invalid tiers config body: {e}"))
    })?;
    let saved = with_store(&state, &req_id.0, move |store| store.write(&input)).await?;
    Ok(Json(ApiResponse {
        data: saved,
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Recalculate
// ---------------------------------------------------------------------------

pub(super) async fn recalculate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<Vec<TierAssignment>>>, ApiError> {
    let rid = req_id.0;
    let request: RecalculateBody = if body.iter().all(u8::is_ascii_whitespace) {
        RecalculateBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(rid.clone(), format!("invalid body: {e}")))?
    };
    let tiers_config = with_store(&state, &rid, |store| store.read()).await?;
    let now = Utc::now();

    let channel =
        params::channel(request.channel.as_deref()).map_err(|m| ApiError::bad_request(&rid, m))?;
    let window = match params::explicit_window(request.from.as_deref(), request.to.as_deref())
        .map_err(|m| ApiError::bad_request(&rid, m))?
    {
        Some(w) => w,
        None => trailing_days(
            now,
            tiers_config.sales_window_days,
            true,
            state.config.tz_offset_hours,
        )
        .map_err(|e| map_engine_error(rid.clone(), &e))?,
    };

    let policy = &state.config.policy;
    let input = state
        .provider
        .sales(&[channel], &window, policy)
        .await
        .map_err(|e| map_provider_error(rid.clone(), &e))?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::new(&rid, "internal_error", "sales source returned no data"))?;

    let orchestrator = Orchestrator {
        aggregator: &state.aggregator,
        config: &tiers_config,
        policy,
        now,
    };
    let assignments = orchestrator
        .recalculate(input, channel, &window)
        .map_err(|e| map_engine_error(rid.clone(), &e))?;

    tracing::info!(
        %channel,
        from = %window.from,
        to = %window.to,
        products = assignments.len(),
        "recalculated tier assignments"
    );
    Ok(Json(ApiResponse {
        data: assignments,
        meta: ResponseMeta::new(rid),
    }))
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub(super) struct ChannelBreakdown {
    online: Vec<SlimRow>,
    pos: Vec<SlimRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SummaryPayload {
    #[serde(flatten)]
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<ChannelBreakdown>,
}

/// A fully validated summary request.
#[derive(Debug)]
struct SummaryRequest {
    channel: Channel,
    window: SalesWindow,
    mode: WindowMode,
    delta_base: DeltaBase,
    lite: bool,
    csv: bool,
    policy: AccountingPolicy,
    query: SummaryQuery,
}

impl SummaryRequest {
    fn parse(
        p: &SummaryParams,
        app: &AppConfig,
        tiers_config: &TiersConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        let (window, mode) = params::resolve_window(
            p,
            now,
            tiers_config.sales_window_days,
            app.tz_offset_hours,
        )?;
        let delta_base = match mode {
            WindowMode::Month { .. } => DeltaBase::PreviousMonth,
            _ => params::delta_base(p.delta_base.as_deref(), app.delta_base)?,
        };
        let csv = match p.format.as_deref().map(str::trim) {
            None | Some("" | "json") => false,
            Some(f) if f.eq_ignore_ascii_case("csv") => true,
            Some(other) => return Err(format!("unsupported format {other:?}")),
        };
        let policy = AccountingPolicy {
            net_of_returns: params::flag(
                "net",
                p.net.as_deref().or(p.net_of_returns.as_deref()),
                app.policy.net_of_returns,
            )?,
            by_refund_date: params::by_refund_date(
                p.returns_policy.as_deref(),
                p.by_refund_date.as_deref(),
                app.policy.by_refund_date,
            )?,
            time_field: params::time_field(p.time_field.as_deref(), app.policy.time_field)?,
            ..app.policy.clone()
        };
        Ok(Self {
            channel: params::channel(p.channel.as_deref())?,
            window,
            mode,
            delta_base,
            lite: params::flag("lite", p.lite.as_deref(), false)?,
            csv,
            policy,
            query: SummaryQuery {
                tiers: params::tiers(p.tiers.as_deref())?,
                search: p.search.clone(),
                page: params::positive("page", p.page.as_deref(), 1)?,
                page_size: params::positive("pageSize", p.page_size.as_deref(), DEFAULT_PAGE_SIZE)?,
            },
        })
    }

    /// Current channel first, then the ONLINE/POS breakdown when requested.
    fn channels(&self) -> Vec<Channel> {
        if self.wants_breakdown() {
            vec![self.channel, Channel::Online, Channel::Pos]
        } else {
            vec![self.channel]
        }
    }

    fn wants_breakdown(&self) -> bool {
        !self.lite && self.channel == Channel::Total
    }
}

pub(super) async fn summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<SummaryParams>,
) -> Result<Response, ApiError> {
    let rid = req_id.0;
    let tiers_config = with_store(&state, &rid, |store| store.read()).await?;
    let now = Utc::now();
    let req = SummaryRequest::parse(&query, &state.config, &tiers_config, now)
        .map_err(|m| ApiError::bad_request(&rid, m))?;

    let prev_window = if req.lite {
        None
    } else {
        Some(
            previous_window(&req.window, req.delta_base, state.config.tz_offset_hours)
                .map_err(|e| map_engine_error(rid.clone(), &e))?,
        )
    };

    let channels = req.channels();
    let provider = &state.provider;
    let (current_inputs, previous_inputs) = tokio::try_join!(
        provider.sales(&channels, &req.window, &req.policy),
        async {
            match &prev_window {
                Some(w) => provider.sales(&[req.channel], w, &req.policy).await.map(Some),
                None => Ok(None),
            }
        }
    )
    .map_err(|e| map_provider_error(rid.clone(), &e))?;

    let orchestrator = Orchestrator {
        aggregator: &state.aggregator,
        config: &tiers_config,
        policy: &req.policy,
        now,
    };
    let engine_error = |e: EngineError| map_engine_error(rid.clone(), &e);

    let mut ranked = channels
        .iter()
        .zip(current_inputs)
        .map(|(&channel, input)| orchestrator.ranked_rows(input, channel, &req.window))
        .collect::<Result<Vec<_>, _>>()
        .map_err(engine_error)?
        .into_iter();
    let current = ranked.next().unwrap_or_default();
    let breakdown = req.wants_breakdown().then(|| ChannelBreakdown {
        online: slim(ranked.next()),
        pos: slim(ranked.next()),
    });

    let previous = match (prev_window, previous_inputs.and_then(|v| v.into_iter().next())) {
        (Some(w), Some(input)) => Some(
            orchestrator
                .ranked_rows(input, req.channel, &w)
                .map_err(engine_error)?,
        ),
        _ => None,
    };

    let summary = orchestrator
        .summarize(
            current,
            previous.as_deref(),
            req.window,
            prev_window,
            &req.query,
        )
        .map_err(engine_error)?;

    tracing::info!(
        channel = %req.channel,
        from = %req.window.from,
        to = %req.window.to,
        total = summary.total,
        lite = req.lite,
        "computed tier summary"
    );

    let mut out = HeaderMap::new();
    window_headers(&mut out, &req, state.config.http_cache_secs);

    if req.csv {
        let body = summary_csv(&summary).map_err(|e| {
            tracing::error!(error = %e, "csv export failed");
            ApiError::new(&rid, "internal_error", "csv export failed")
        })?;
        insert_header(&mut out, header::CONTENT_TYPE, "text/csv; charset=utf-8");
        insert_header(
            &mut out,
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"tiers-summary-{}-{}.csv\"",
                req.channel,
                req.window.from.format("%Y%m%d")
            ),
        );
        return Ok((out, body).into_response());
    }

    let payload = SummaryPayload {
        summary,
        channels: breakdown,
    };
    let body = serde_json::to_vec(&payload).map_err(|e| {
        tracing::error!(error = %e, "summary serialization failed");
        ApiError::new(&rid, "internal_error", "summary serialization failed")
    })?;
    let etag = weak_etag(&body);
    insert_header(&mut out, header::ETAG, &etag);

    if etag_matches(&headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, out).into_response());
    }

    Ok((
        out,
        Json(ApiResponse {
            data: payload,
            meta: ResponseMeta::new(rid),
        }),
    )
        .into_response())
}

fn slim(rows: Option<Vec<RankedRow>>) -> Vec<SlimRow> {
    rows.unwrap_or_default().iter().map(SlimRow::from).collect()
}

fn weak_etag(body: &[u8]) -> String {
    format!("W/\"{:x}\"", Sha256::digest(body))
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag || tag.trim() == "*"))
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: impl AsRef<str>) {
    if let Ok(v) = HeaderValue::from_str(value.as_ref()) {
        headers.insert(name, v);
    }
}

fn window_headers(out: &mut HeaderMap, req: &SummaryRequest, cache_secs: u64) {
    let named = |n: &'static str| HeaderName::from_static(n);
    insert_header(out, header::CACHE_CONTROL, format!("public, max-age={cache_secs}"));
    insert_header(out, named("x-window-from"), req.window.from.to_rfc3339());
    insert_header(out, named("x-window-to"), req.window.to.to_rfc3339());
    insert_header(out, named("x-net-of-returns"), req.policy.net_of_returns.to_string());
    insert_header(out, named("x-by-refund-date"), req.policy.by_refund_date.to_string());
    insert_header(out, named("x-time-field"), req.policy.time_field.as_str());
    insert_header(out, named("x-delta-base"), req.delta_base.as_str());
    if req.lite {
        insert_header(out, named("x-lite"), "true");
    }
    match req.mode {
        WindowMode::Month { year, month } => {
            insert_header(out, named("x-month-mode"), "true");
            insert_header(out, named("x-month"), month.to_string());
            insert_header(out, named("x-year"), year.to_string());
        }
        WindowMode::Anchored(on) => {
            insert_header(out, named("x-anchor-date"), on.format("%Y-%m-%d").to_string());
        }
        WindowMode::Trailing | WindowMode::Explicit => {}
    }
}

fn summary_csv(summary: &Summary) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for r in &summary.rows {
        writer.write_record([
            r.row.product_id.clone(),
            r.row.name.clone(),
            r.tier.to_string(),
            r.rank.to_string(),
            r.row.qty30.to_string(),
            r.row.qty100.to_string(),
            r.row.revenue.to_string(),
            r.row.share_pct.unwrap_or(0.0).to_string(),
            r.delta_share_pct.to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

// ---------------------------------------------------------------------------
// Per-SKU diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DebugSkuData {
    channel: Channel,
    window: SalesWindow,
    time_field: TimeField,
    #[serde(flatten)]
    summary: SkuSummary,
}

pub(super) async fn debug_sku(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DebugSkuParams>,
) -> Result<Json<ApiResponse<DebugSkuData>>, ApiError> {
    let rid = req_id.0;
    let sku = query
        .sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request(&rid, "missing sku"))?;
    let tiers_config = with_store(&state, &rid, |store| store.read()).await?;

    let channel =
        params::channel(query.channel.as_deref()).map_err(|m| ApiError::bad_request(&rid, m))?;
    let time_field = params::time_field(query.time_field.as_deref(), state.config.policy.time_field)
        .map_err(|m| ApiError::bad_request(&rid, m))?;
    let (window, _) = params::window_days(query.days.as_deref(), tiers_config.sales_window_days)
        .and_then(|days| {
            params::day_window(
                query.on.as_deref(),
                days,
                Utc::now(),
                state.config.tz_offset_hours,
            )
        })
        .map_err(|m| ApiError::bad_request(&rid, m))?;
    let policy = AccountingPolicy {
        time_field,
        ..state.config.policy.clone()
    };

    let summary = state
        .provider
        .sku_summary(&state.aggregator, sku, channel, &window, &policy)
        .await
        .map_err(|e| map_provider_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: DebugSkuData {
            channel,
            window,
            time_field,
            summary,
        },
        meta: ResponseMeta::new(rid),
    }))
}
