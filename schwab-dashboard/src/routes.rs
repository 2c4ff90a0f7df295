//! HTTP routes
//!
//! Every endpoint answers JSON. Figures and tables are ready to hand to a
//! plotting front end; see [`crate::figures`] and [`crate::tables`].

use crate::error::{DashboardError, DashboardResult};
use crate::figures::{history_price_figure, history_volume_figure};
use crate::period::{determine_frequency, parse_time_period, DEFAULT_PERIOD};
use crate::state::DashboardState;
use crate::tables::{self, expiration_dates, option_chain_table, option_metrics, DEFAULT_MAX_ROWS};
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use schwab_rest::OptionChainRequest;
use schwab_types::ContractType;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

type SharedState = Arc<DashboardState>;

/// Stream quotes only
const NO_FIELDS: [&str; 0] = [];

/// Build the dashboard router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/symbols", get(list_symbols).post(add_symbol))
        .route("/api/symbols/:index", delete(remove_symbol))
        .route("/api/history", get(history))
        .route("/api/options/:symbol", get(options))
        .route("/api/data-table/:symbol", get(data_table))
        .route("/api/realtime", post(toggle_realtime))
        .route("/api/realtime/status", get(realtime_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_symbols(State(st): State<SharedState>) -> Json<Value> {
    Json(json!({ "symbols": st.symbols() }))
}

#[derive(Deserialize)]
struct AddSymbol {
    symbol: String,
}

async fn add_symbol(
    State(st): State<SharedState>,
    Json(body): Json<AddSymbol>,
) -> DashboardResult<Json<Value>> {
    let symbols = st.add_symbol(&body.symbol)?;
    Ok(Json(json!({ "symbols": symbols })))
}

async fn remove_symbol(
    State(st): State<SharedState>,
    Path(index): Path<usize>,
) -> DashboardResult<Json<Value>> {
    let symbols = st.remove_symbol(index)?;
    Ok(Json(json!({ "symbols": symbols })))
}

#[derive(Deserialize)]
struct PeriodQuery {
    period: Option<String>,
    max_rows: Option<usize>,
}

/// Price history of every dashboard symbol with price and volume figures
///
/// While streaming is active the figures show streamed data instead.
async fn history(
    State(st): State<SharedState>,
    Query(q): Query<PeriodQuery>,
) -> DashboardResult<Json<Value>> {
    let period = q.period.as_deref().unwrap_or(DEFAULT_PERIOD);
    let (period_type, count) = parse_time_period(period)?;
    let (frequency_type, frequency) = determine_frequency(period_type, count);

    let symbols = st.symbols();
    let mut histories = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for symbol in &symbols {
        match st
            .manager()
            .get_price_history(symbol, period_type, count, frequency_type, frequency, true)
            .await
        {
            Ok(history) if !history.is_empty() => {
                histories.insert(symbol.clone(), history);
            }
            Ok(_) => debug!("No price history for {}", symbol),
            Err(e) => {
                warn!("Error fetching price history for {}: {}", symbol, e);
                errors.insert(symbol.clone(), e.to_string());
            }
        }
    }

    let streaming = st.realtime().is_active();
    let (price_figure, volume_figure) = if streaming {
        (
            st.buffers().price_figure(&symbols),
            st.buffers().volume_figure(&symbols),
        )
    } else {
        (history_price_figure(&histories), history_volume_figure(&histories))
    };

    Ok(Json(json!({
        "period": period,
        "frequency_type": frequency_type,
        "frequency": frequency,
        "source": if streaming { "realtime" } else { "history" },
        "histories": histories,
        "price_figure": price_figure,
        "volume_figure": volume_figure,
        "errors": errors,
    })))
}

#[derive(Deserialize)]
struct OptionsQuery {
    #[serde(rename = "type")]
    option_type: Option<String>,
}

/// Option table for a symbol, from the stream when it has data, else REST
async fn options(
    State(st): State<SharedState>,
    Path(symbol): Path<String>,
    Query(q): Query<OptionsQuery>,
) -> DashboardResult<Json<Value>> {
    let symbol = symbol.trim().to_uppercase();
    let filter: ContractType = q
        .option_type
        .as_deref()
        .unwrap_or("both")
        .parse()
        .map_err(|e| DashboardError::BadRequest(format!("{}", e)))?;

    if st.realtime().is_active() && st.buffers().has_options(&symbol) {
        return Ok(Json(json!({
            "symbol": symbol,
            "source": "realtime",
            "table": st.buffers().option_table(&symbol, filter),
        })));
    }

    let chain = st
        .manager()
        .get_option_chain(&OptionChainRequest::new(symbol.clone()))
        .await?;
    Ok(Json(json!({
        "symbol": symbol,
        "source": "rest",
        "underlying_price": chain.underlying_price,
        "table": option_chain_table(&chain, filter),
        "expiration_dates": expiration_dates(&chain),
        "metrics": option_metrics(&chain),
    })))
}

/// First rows of a symbol's price history
async fn data_table(
    State(st): State<SharedState>,
    Path(symbol): Path<String>,
    Query(q): Query<PeriodQuery>,
) -> DashboardResult<Json<Value>> {
    let symbol = symbol.trim().to_uppercase();
    let period = q.period.as_deref().unwrap_or(DEFAULT_PERIOD);
    let (period_type, count) = parse_time_period(period)?;
    let (frequency_type, frequency) = determine_frequency(period_type, count);

    let history = st
        .manager()
        .get_price_history(&symbol, period_type, count, frequency_type, frequency, true)
        .await?;
    let table = tables::data_table(&history, q.max_rows.unwrap_or(DEFAULT_MAX_ROWS))?;
    Ok(Json(json!({
        "symbol": symbol,
        "period": period,
        "total_rows": history.candles.len(),
        "table": table,
    })))
}

#[derive(Deserialize)]
struct RealtimeToggle {
    on: bool,
}

/// Turn streaming of the dashboard symbols on or off
async fn toggle_realtime(
    State(st): State<SharedState>,
    Json(body): Json<RealtimeToggle>,
) -> DashboardResult<Json<Value>> {
    let state = Arc::clone(&st);
    // Starting and stopping join streamer threads
    let message = tokio::task::spawn_blocking(move || -> DashboardResult<&'static str> {
        let realtime = state.realtime();
        if body.on {
            let started = realtime.start_streaming(&state.symbols(), &NO_FIELDS)?;
            Ok(if started {
                "Real-time streaming active"
            } else {
                "Real-time streaming already active"
            })
        } else if realtime.stop_streaming() {
            Ok("Real-time streaming stopped")
        } else {
            Ok("Real-time streaming not active")
        }
    })
    .await
    .map_err(|e| DashboardError::Task(e.to_string()))??;

    Ok(Json(json!({
        "ok": true,
        "active": st.realtime().is_active(),
        "message": message,
    })))
}

async fn realtime_status(State(st): State<SharedState>) -> Json<Value> {
    Json(json!({
        "streaming": st.realtime().streaming_status(),
        "streamer": st.manager().streamer().status(),
    }))
}
