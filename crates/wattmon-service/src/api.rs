//! REST API endpoints for the wattmon service.
//!
//! Thin handlers over the document store: daily and range views,
//! consumption aggregates, and metadata access. All endpoints are
//! device-scoped and reject identifiers missing from the registry before
//! touching the store.
//!
//! Errors are structured JSON via [`ApiError`]; client mistakes (bad dates,
//! unknown devices, missing metadata) return 400, store trouble returns
//! 500.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::{Date, OffsetDateTime};

use wattmon_types::{EnergyDay, Metadata, format_day, parse_day};

use crate::consumption;
use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/api/health", get(health))
        // Views
        .route("/devices", get(list_devices))
        .route("/dev_id/{dev_id}/json/date/{date}", get(get_json_date))
        .route("/dev_id/{dev_id}/json/last_value", get(get_json_last_value))
        .route(
            "/dev_id/{dev_id}/json/range/{from_date}/{to_date}",
            get(get_json_range),
        )
        .route(
            "/dev_id/{dev_id}/json/date/{date}/consumption",
            get(get_json_date_consumption),
        )
        .route(
            "/dev_id/{dev_id}/json/date/{date}/mean-consumption",
            get(get_json_date_mean_consumption),
        )
        .route(
            "/dev_id/{dev_id}/json/yesterday/consumption",
            get(get_json_yesterday_consumption),
        )
        .route(
            "/dev_id/{dev_id}/json/last_month/consumption",
            get(get_json_last_month_consumption),
        )
        .route(
            "/dev_id/{dev_id}/json/30days/average_consumption",
            get(get_json_30days_average_consumption),
        )
        .route(
            "/dev_id/{dev_id}/json/30days/average_consumption_div_home_size",
            get(get_json_30days_average_div_home_size),
        )
        // Metadata
        .route("/dev_id/{dev_id}/meta", get(get_meta_all))
        .route("/dev_id/{dev_id}/meta/{field}", get(get_meta_field))
        .route("/dev_id/{dev_id}/has-meta/{field}", get(get_has_meta))
        .route("/dev_id/{dev_id}/set-meta/{field}", get(set_meta_null))
        .route("/dev_id/{dev_id}/set-meta/{field}/{value}", get(set_meta))
        // Plots (rendering is an external concern; see DESIGN.md)
        .route("/dev_id/{dev_id}/plot/date/{date}", get(plot_not_implemented))
        .route(
            "/dev_id/{dev_id}/plot/range/{from_date}/{to_date}",
            get(plot_range_not_implemented),
        )
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub scheduler_running: bool,
    pub registered_devices: usize,
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        scheduler_running: state.scheduler.is_running(),
        registered_devices: state.registry.len(),
    })
}

/// Query parameters for view endpoints.
#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    /// Look the day up in the local cache before the central store.
    #[serde(default)]
    from_cache: bool,
    /// Comma-separated list of sensors to include.
    sensors: Option<String>,
}

impl ViewQuery {
    fn sensor_list(&self) -> Option<Vec<String>> {
        self.sensors.as_ref().map(|s| {
            s.split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
    }
}

/// Query parameters for consumption endpoints.
#[derive(Debug, Default, Deserialize)]
struct ConsumptionQuery {
    #[serde(default)]
    from_cache: bool,
    /// Return only the bare numerical value.
    #[serde(default)]
    simplify: bool,
}

/// Returns the list of devices that are registered.
async fn list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.registry.ids().map(String::from).collect())
}

/// Returns the daily data for a device and date.
async fn get_json_date(
    State(state): State<Arc<AppState>>,
    Path((dev_id, date)): Path<(String, String)>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<EnergyDay>, ApiError> {
    check_device(&state, &dev_id)?;
    let date = parse_date(&state, &date)?;

    let day = get_data(
        &state,
        &dev_id,
        date,
        query.from_cache,
        query.sensor_list().as_deref(),
    )
    .await?;
    Ok(Json(day))
}

/// Returns the most recent record from today.
async fn get_json_last_value(
    State(state): State<Arc<AppState>>,
    Path(dev_id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<EnergyDay>, ApiError> {
    check_device(&state, &dev_id)?;
    let today = state.today();

    let mut day = get_data(&state, &dev_id, today, false, query.sensor_list().as_deref()).await?;
    if let Some(last) = day.records.pop() {
        day.records = vec![last];
    }
    Ok(Json(day))
}

/// Range response: one day of records per date in the span.
#[derive(Debug, Serialize)]
pub struct RangeResponse {
    pub from_date: String,
    pub to_date: String,
    pub range_data: Vec<EnergyDay>,
}

/// Returns the data for every day in an inclusive date range.
async fn get_json_range(
    State(state): State<Arc<AppState>>,
    Path((dev_id, from_date, to_date)): Path<(String, String, String)>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<RangeResponse>, ApiError> {
    check_device(&state, &dev_id)?;
    let (from, to) = parse_date_range(&state, &from_date, &to_date)?;

    let sensors = query.sensor_list();
    let mut range_data = Vec::new();
    let mut day = from;
    while day <= to {
        range_data.push(get_data(&state, &dev_id, day, query.from_cache, sensors.as_deref()).await?);
        match day.next_day() {
            Some(next) => day = next,
            None => break,
        }
    }

    Ok(Json(RangeResponse {
        from_date: format_day(from),
        to_date: format_day(to),
        range_data,
    }))
}

/// Returns the consumption for the given date.
async fn get_json_date_consumption(
    State(state): State<Arc<AppState>>,
    Path((dev_id, date)): Path<(String, String)>,
    Query(query): Query<ConsumptionQuery>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;
    let date = parse_date(&state, &date)?;

    let consumption = consumption_for(&state, &dev_id, date, query.from_cache).await?;
    Ok(Json(simplified(consumption, query.simplify)))
}

/// Returns the consumption of yesterday.
async fn get_json_yesterday_consumption(
    State(state): State<Arc<AppState>>,
    Path(dev_id): Path<String>,
    Query(query): Query<ConsumptionQuery>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;
    let date = parse_date(&state, "yesterday")?;

    let consumption = consumption_for(&state, &dev_id, date, query.from_cache).await?;
    Ok(Json(simplified(consumption, query.simplify)))
}

/// Returns the consumption over the previous calendar month, estimating
/// across days with no data.
async fn get_json_last_month_consumption(
    State(state): State<Arc<AppState>>,
    Path(dev_id): Path<String>,
    Query(query): Query<ConsumptionQuery>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;

    let days = consumption::last_month_days(state.today());
    let mut consumptions = Vec::with_capacity(days.len());
    for day in &days {
        consumptions.push(consumption_for(&state, &dev_id, *day, query.from_cache).await?);
    }

    let (total, empty_days) = consumption::month_total(&consumptions);
    if query.simplify {
        return Ok(Json(json!(total)));
    }

    let missing_data = empty_days != 0;
    Ok(Json(json!({
        "consumption": total,
        "unit": "kwh",
        "month": days.first().map(|d| d.month().to_string()),
        "missing_data": missing_data,
        "number_of_days_with_energy_data": consumptions.len() - empty_days,
        "number_of_days_without_energy_data": empty_days,
    })))
}

/// Returns the average daily consumption over the last 30 days.
async fn get_json_30days_average_consumption(
    State(state): State<Arc<AppState>>,
    Path(dev_id): Path<String>,
    Query(query): Query<ConsumptionQuery>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;

    let (average, detail) = average_30_days(&state, &dev_id, query.from_cache).await?;
    if query.simplify {
        return Ok(Json(json!(average)));
    }
    Ok(Json(detail))
}

/// Returns the 30-day average consumption divided by the home size.
async fn get_json_30days_average_div_home_size(
    State(state): State<Arc<AppState>>,
    Path(dev_id): Path<String>,
    Query(query): Query<ConsumptionQuery>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;

    let size = home_size(&state, &dev_id).await?;
    let (average, _) = average_30_days(&state, &dev_id, query.from_cache).await?;
    Ok(Json(json!(average / size)))
}

/// Returns the consumption over the home size for the given date.
async fn get_json_date_mean_consumption(
    State(state): State<Arc<AppState>>,
    Path((dev_id, date)): Path<(String, String)>,
    Query(query): Query<ConsumptionQuery>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;
    let date = parse_date(&state, &date)?;

    let size = home_size(&state, &dev_id).await?;
    let consumption = consumption_for(&state, &dev_id, date, query.from_cache).await?;
    Ok(Json(json!(consumption / size)))
}

/// Returns the metadata for the device's household.
async fn get_meta_all(
    State(state): State<Arc<AppState>>,
    Path(dev_id): Path<String>,
) -> Result<Json<Metadata>, ApiError> {
    check_device(&state, &dev_id)?;
    Ok(Json(state.store.fetch_meta(&dev_id).await?))
}

/// Returns one metadata field, or an empty object when it does not exist.
async fn get_meta_field(
    State(state): State<Arc<AppState>>,
    Path((dev_id, field)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;

    let meta = state.store.fetch_meta(&dev_id).await?;
    let mut body = serde_json::Map::new();
    if let Some(value) = meta.get(&field) {
        body.insert(field, value.clone());
    }
    Ok(Json(Value::Object(body)))
}

/// Returns whether a metadata field exists (and is not the string "null").
async fn get_has_meta(
    State(state): State<Arc<AppState>>,
    Path((dev_id, field)): Path<(String, String)>,
) -> Result<Json<bool>, ApiError> {
    check_device(&state, &dev_id)?;

    let meta = state.store.fetch_meta(&dev_id).await?;
    Ok(Json(meta.has(&field)))
}

/// Clears a metadata field.
async fn set_meta_null(
    State(state): State<Arc<AppState>>,
    Path((dev_id, field)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;
    state
        .store
        .set_meta_field(&dev_id, &field, Value::Null)
        .await?;
    Ok(Json(Value::Null))
}

/// Sets a metadata field, updating it when it already exists.
async fn set_meta(
    State(state): State<Arc<AppState>>,
    Path((dev_id, field, value)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;

    // Accept JSON literals (numbers, booleans, null); anything else is a string.
    let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
    state.store.set_meta_field(&dev_id, &field, value).await?;
    Ok(Json(Value::Null))
}

/// Plot rendering is not served by this backend.
async fn plot_not_implemented(
    State(state): State<Arc<AppState>>,
    Path((dev_id, _date)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;
    Err(ApiError::NotImplemented)
}

/// Plot rendering is not served by this backend.
async fn plot_range_not_implemented(
    State(state): State<Arc<AppState>>,
    Path((dev_id, _from, _to)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    check_device(&state, &dev_id)?;
    Err(ApiError::NotImplemented)
}

// ==========================================================================
// Shared handler helpers
// ==========================================================================

fn check_device(state: &AppState, device: &str) -> Result<(), ApiError> {
    if state.registry.contains(device) {
        Ok(())
    } else {
        Err(ApiError::UnknownDevice(device.to_string()))
    }
}

fn parse_date(state: &AppState, label: &str) -> Result<Date, ApiError> {
    parse_day(label, state.today()).map_err(|_| ApiError::BadDate(label.to_string()))
}

fn parse_date_range(state: &AppState, from: &str, to: &str) -> Result<(Date, Date), ApiError> {
    let range_error = || ApiError::BadDateRange(from.to_string(), to.to_string());
    let from_date = parse_day(from, state.today()).map_err(|_| range_error())?;
    let to_date = parse_day(to, state.today()).map_err(|_| range_error())?;
    if from_date > to_date {
        return Err(range_error());
    }
    Ok((from_date, to_date))
}

/// Fetch a day, consulting the cache when asked, and writing finished days
/// back to it.
async fn get_data(
    state: &AppState,
    device: &str,
    date: Date,
    from_cache: bool,
    sensors: Option<&[String]>,
) -> Result<EnergyDay, ApiError> {
    let day = if from_cache && let Some(hit) = state.cache.load(device, date) {
        hit
    } else {
        let fetched = state.store.fetch_day(device, date).await?;
        state.cache.store(device, &fetched, state.today());
        fetched
    };

    Ok(match sensors {
        Some(sensors) => day.select(sensors),
        None => day,
    })
}

async fn consumption_for(
    state: &AppState,
    device: &str,
    date: Date,
    from_cache: bool,
) -> Result<f64, ApiError> {
    let day = get_data(state, device, date, from_cache, None).await?;
    Ok(consumption::daily_consumption(&day))
}

/// 30-day average with window details; fails when too few days carry data.
async fn average_30_days(
    state: &AppState,
    device: &str,
    from_cache: bool,
) -> Result<(f64, Value), ApiError> {
    let days = consumption::last_30_days(state.today());
    let mut consumptions = Vec::with_capacity(days.len());
    for day in &days {
        consumptions.push(consumption_for(state, device, *day, from_cache).await?);
    }

    let (start, end) = consumption::trim_empty_window(&consumptions)
        .ok_or(ApiError::MissingEnergyData)?;
    let window = &consumptions[start..=end];
    let average = window.iter().sum::<f64>() / window.len() as f64;
    let missing_within = window.iter().any(|c| *c == 0.0);

    let detail = json!({
        "consumption": average,
        "unit": "kwh",
        "window_start_day": format_day(days[start]),
        "window_end_day": format_day(days[end]),
        "window_size": end - start,
        "missing_data_within_window": missing_within,
        "start": start,
        "end": end,
    });
    Ok((average, detail))
}

async fn home_size(state: &AppState, device: &str) -> Result<f64, ApiError> {
    let meta = state.store.fetch_meta(device).await?;
    match meta.f64("size") {
        Some(size) if size > 0.0 => Ok(size),
        _ => Err(ApiError::MissingMetadataField("size".to_string())),
    }
}

fn simplified(consumption: f64, simplify: bool) -> Value {
    if simplify {
        json!(consumption)
    } else {
        json!({
            "consumption": consumption,
            "unit": "kwh",
        })
    }
}

// ==========================================================================
// Errors
// ==========================================================================

/// Application error type.
#[derive(Debug)]
pub enum ApiError {
    BadDate(String),
    BadDateRange(String, String),
    UnknownDevice(String),
    MissingEnergyData,
    MissingMetadataField(String),
    NotImplemented,
    Store(wattmon_store::Error),
}

impl From<wattmon_store::Error> for ApiError {
    fn from(e: wattmon_store::Error) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadDate(date) => (
                StatusCode::BAD_REQUEST,
                format!("Bad date ({date}), not in ISO format (YYYY-MM-DD)."),
            ),
            ApiError::BadDateRange(from, to) => (
                StatusCode::BAD_REQUEST,
                format!(
                    "Bad date range ({from} - {to}). Dates must be in ISO format (YYYY-MM-DD) \
                     and placed in correct order."
                ),
            ),
            ApiError::UnknownDevice(device) => (
                StatusCode::BAD_REQUEST,
                format!(
                    "Bad device ({device}), is not registered. Check /devices to verify which \
                     devices are registered."
                ),
            ),
            ApiError::MissingEnergyData => (
                StatusCode::BAD_REQUEST,
                "Can't find enough energy data to do the calculations. Make sure the device is \
                 turned on, configured correctly and is recording data."
                    .to_string(),
            ),
            ApiError::MissingMetadataField(field) => (
                StatusCode::BAD_REQUEST,
                format!(
                    "Can't find the field '{field}' for this device. Please ensure that the \
                     field '{field}' has been specified in the metadata for this device."
                ),
            ),
            ApiError::NotImplemented => (
                StatusCode::NOT_IMPLEMENTED,
                "This feature is currently not implemented".to_string(),
            ),
            ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = json!({
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
