use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_user_id,
    error::AppResult,
    schemas::{
        CreateUtilityBillInput, OrgScopeQuery, PayUtilityBillInput, UpdateUtilityBillInput,
        UtilityBillPath, UtilityBillsQuery,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/utility-bills",
            axum::routing::get(list_bills).post(create_bill),
        )
        .route(
            "/utility-bills/{bill_id}",
            axum::routing::get(get_bill).patch(update_bill).delete(delete_bill),
        )
        .route("/utility-bills/{bill_id}/pay", axum::routing::post(pay_bill))
}

async fn list_bills(
    State(state): State<AppState>,
    Query(query): Query<UtilityBillsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let bills = state.utility_bills.list(user_id, &query).await?;
    Ok(Json(json!({ "data": bills })))
}

async fn create_bill(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUtilityBillInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = require_user_id(&state, &headers).await?;
    let bill = state.utility_bills.create(user_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": bill }))))
}

async fn get_bill(
    State(state): State<AppState>,
    Path(path): Path<UtilityBillPath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let bill = state
        .utility_bills
        .get(user_id, path.bill_id, scope.org_id)
        .await?;
    Ok(Json(json!({ "data": bill })))
}

async fn update_bill(
    State(state): State<AppState>,
    Path(path): Path<UtilityBillPath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
    Json(payload): Json<UpdateUtilityBillInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let bill = state
        .utility_bills
        .update(user_id, path.bill_id, scope.org_id, &payload)
        .await?;
    Ok(Json(json!({ "data": bill })))
}

async fn pay_bill(
    State(state): State<AppState>,
    Path(path): Path<UtilityBillPath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
    Json(payload): Json<PayUtilityBillInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let (bill, payment) = state
        .utility_bills
        .pay(user_id, path.bill_id, scope.org_id, &payload)
        .await?;
    Ok(Json(json!({ "data": { "bill": bill, "payment": payment } })))
}

async fn delete_bill(
    State(state): State<AppState>,
    Path(path): Path<UtilityBillPath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let user_id = require_user_id(&state, &headers).await?;
    state
        .utility_bills
        .delete(user_id, path.bill_id, scope.org_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
