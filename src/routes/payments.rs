use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_user_id,
    error::AppResult,
    schemas::{CreatePaymentInput, OrgScopeQuery, PaymentPath, PaymentsQuery, UpdatePaymentInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/payments",
            axum::routing::get(list_payments).post(create_payment),
        )
        .route(
            "/payments/{payment_id}",
            axum::routing::get(get_payment)
                .patch(update_payment)
                .delete(delete_payment),
        )
}

async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let payments = state.payments.list(user_id, &query).await?;
    Ok(Json(json!({ "data": payments })))
}

async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = require_user_id(&state, &headers).await?;
    let payment = state.payments.create(user_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": payment }))))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let payment = state
        .payments
        .get(user_id, path.payment_id, scope.org_id)
        .await?;
    Ok(Json(json!({ "data": payment })))
}

async fn update_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
    Json(payload): Json<UpdatePaymentInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let payment = state
        .payments
        .update(user_id, path.payment_id, scope.org_id, &payload)
        .await?;
    Ok(Json(json!({ "data": payment })))
}

async fn delete_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let user_id = require_user_id(&state, &headers).await?;
    state
        .payments
        .delete(user_id, path.payment_id, scope.org_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
