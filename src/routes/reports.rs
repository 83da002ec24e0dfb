use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_user_id, error::AppResult, schemas::FinancialSummaryQuery, state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/reports/financial-summary",
        axum::routing::get(financial_summary),
    )
}

async fn financial_summary(
    State(state): State<AppState>,
    Query(query): Query<FinancialSummaryQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let summary = state.finance.financial_summary(user_id, &query).await?;
    Ok(Json(json!({ "data": summary })))
}
