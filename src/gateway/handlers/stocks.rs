//! Stock snapshot handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes, ok};
use super::read_through;
use crate::cache::keys;
use crate::store::{NewStockSnapshot, StockSnapshot};

/// Snapshot ingestion
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStockRequest {
    #[validate(length(min = 1, max = 16))]
    #[schema(example = "AAPL")]
    pub ticker: String,
    #[validate(custom(function = "positive_price"))]
    #[schema(value_type = String, example = "148.5")]
    pub open_price: Decimal,
    #[validate(custom(function = "positive_price"))]
    #[schema(value_type = String, example = "150")]
    pub close_price: Decimal,
    #[validate(custom(function = "positive_price"))]
    #[schema(value_type = String, example = "151.2")]
    pub high: Decimal,
    #[validate(custom(function = "positive_price"))]
    #[schema(value_type = String, example = "147.9")]
    pub low: Decimal,
    #[validate(range(min = 0))]
    pub volume: i64,
    pub timestamp: DateTime<Utc>,
}

fn positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_positive() && !price.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("price_must_be_positive"))
    }
}

/// Record a price snapshot
///
/// POST /api/v1/stocks
#[utoipa::path(
    post,
    path = "/api/v1/stocks",
    request_body = CreateStockRequest,
    responses(
        (status = 200, description = "Snapshot stored", body = StockSnapshot, content_type = "application/json"),
        (status = 400, description = "Invalid parameters")
    ),
    tag = "Stocks"
)]
pub async fn create_stock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStockRequest>,
) -> ApiResult<StockSnapshot> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Invalid snapshot: {}", e)))?;

    let snapshot = state
        .store
        .insert_snapshot(NewStockSnapshot {
            ticker: req.ticker,
            open_price: req.open_price,
            close_price: req.close_price,
            high: req.high,
            low: req.low,
            volume: req.volume,
            timestamp: req.timestamp,
        })
        .await?;

    tracing::info!(
        id = snapshot.id,
        ticker = %snapshot.ticker,
        close = %snapshot.close_price,
        "Snapshot stored"
    );
    ok(snapshot)
}

/// All snapshots (cached)
///
/// GET /api/v1/stocks
#[utoipa::path(
    get,
    path = "/api/v1/stocks",
    responses(
        (status = 200, description = "All snapshots", body = Vec<StockSnapshot>, content_type = "application/json"),
        (status = 404, description = "No snapshots recorded")
    ),
    tag = "Stocks"
)]
pub async fn list_stocks(State(state): State<Arc<AppState>>) -> ApiResult<Vec<StockSnapshot>> {
    let snapshots = read_through(state.cache.as_ref(), keys::STOCKS, || async {
        let rows = state.store.list_snapshots().await.map_err(ApiError::from)?;
        Ok((!rows.is_empty()).then_some(rows))
    })
    .await?;

    match snapshots {
        Some(snapshots) => ok(snapshots),
        None => ApiError::not_found(error_codes::STOCK_NOT_FOUND, "No stocks found").into_err(),
    }
}

/// Latest snapshot for a ticker (cached)
///
/// GET /api/v1/stocks/{ticker}
#[utoipa::path(
    get,
    path = "/api/v1/stocks/{ticker}",
    params(
        ("ticker" = String, Path, description = "Ticker symbol")
    ),
    responses(
        (status = 200, description = "Latest snapshot", body = StockSnapshot, content_type = "application/json"),
        (status = 404, description = "Stock not found")
    ),
    tag = "Stocks"
)]
pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> ApiResult<StockSnapshot> {
    let snapshot = read_through(state.cache.as_ref(), &keys::stock(&ticker), || async {
        state
            .store
            .latest_snapshot(&ticker)
            .await
            .map_err(ApiError::from)
    })
    .await?;

    match snapshot {
        Some(snapshot) => ok(snapshot),
        None => ApiError::not_found(error_codes::STOCK_NOT_FOUND, "Stock not found").into_err(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::handlers::test_support::app_state;
    use axum::http::StatusCode;
    use chrono::TimeZone;

    fn request(ticker: &str, close: i64, ts: DateTime<Utc>) -> Json<CreateStockRequest> {
        Json(CreateStockRequest {
            ticker: ticker.to_string(),
            open_price: Decimal::from(close),
            close_price: Decimal::from(close),
            high: Decimal::from(close + 1),
            low: Decimal::from(close - 1),
            volume: 500,
            timestamp: ts,
        })
    }

    #[tokio::test]
    async fn test_empty_list_is_404() {
        let err = list_stocks(State(app_state())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_stock_returns_latest() {
        let state = app_state();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
        create_stock(State(state.clone()), request("AAPL", 190, t0 + chrono::Duration::days(1)))
            .await
            .unwrap();
        create_stock(State(state.clone()), request("AAPL", 180, t0))
            .await
            .unwrap();

        let (_, Json(resp)) = get_stock(State(state.clone()), Path("AAPL".to_string()))
            .await
            .unwrap();
        assert_eq!(resp.data.unwrap().close_price, Decimal::from(190));

        let (_, Json(resp)) = list_stocks(State(state)).await.unwrap();
        assert_eq!(resp.data.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stock_list_is_stale_until_ttl() {
        let state = app_state();
        let now = Utc::now();
        create_stock(State(state.clone()), request("AAPL", 100, now)).await.unwrap();

        let (_, Json(first)) = list_stocks(State(state.clone())).await.unwrap();
        create_stock(State(state.clone()), request("MSFT", 400, now)).await.unwrap();

        // Cached list does not see the new snapshot
        let (_, Json(second)) = list_stocks(State(state)).await.unwrap();
        assert_eq!(first.data.unwrap().len(), 1);
        assert_eq!(second.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_snapshot_rejected() {
        let mut req = request("AAPL", 10, Utc::now());
        req.0.volume = -1;
        let err = create_stock(State(app_state()), req).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_positive_prices_rejected() {
        let state = app_state();
        let cases: [fn(&mut CreateStockRequest); 4] = [
            |r| r.open_price = Decimal::ZERO,
            |r| r.close_price = Decimal::from(-150),
            |r| r.high = Decimal::ZERO,
            |r| r.low = "-0.01".parse().unwrap(),
        ];
        for set in cases {
            let mut req = request("AAPL", 10, Utc::now());
            set(&mut req.0);
            let err = create_stock(State(state.clone()), req).await.unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_eq!(err.code, error_codes::INVALID_PARAMETER);
        }

        // Nothing was stored
        let err = list_stocks(State(state)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
