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
        CreateLeaseInput, ExpiringLeasesQuery, LeasePath, LeaseStatsQuery, LeasesQuery,
        OrgScopeQuery, RenewLeaseInput, TerminateLeaseInput, UpdateLeaseInput,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/leases", axum::routing::get(list_leases).post(create_lease))
        .route("/leases/stats", axum::routing::get(lease_stats))
        .route("/leases/expiring", axum::routing::get(expiring_leases))
        .route(
            "/leases/{lease_id}",
            axum::routing::get(get_lease)
                .patch(update_lease)
                .delete(delete_lease),
        )
        .route(
            "/leases/{lease_id}/terminate",
            axum::routing::post(terminate_lease),
        )
        .route("/leases/{lease_id}/renew", axum::routing::post(renew_lease))
}

async fn list_leases(
    State(state): State<AppState>,
    Query(query): Query<LeasesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let leases = state.leases.list(user_id, &query).await?;
    Ok(Json(json!({ "data": leases })))
}

async fn create_lease(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateLeaseInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = require_user_id(&state, &headers).await?;
    let lease = state.leases.create(user_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": lease }))))
}

async fn get_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let lease = state.leases.get(user_id, path.lease_id, scope.org_id).await?;
    Ok(Json(json!({ "data": lease })))
}

async fn update_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
    Json(payload): Json<UpdateLeaseInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let lease = state
        .leases
        .update(user_id, path.lease_id, scope.org_id, &payload)
        .await?;
    Ok(Json(json!({ "data": lease })))
}

async fn delete_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let user_id = require_user_id(&state, &headers).await?;
    state
        .leases
        .delete(user_id, path.lease_id, scope.org_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn terminate_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
    Json(payload): Json<TerminateLeaseInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let lease = state
        .leases
        .terminate(user_id, path.lease_id, scope.org_id, &payload)
        .await?;
    Ok(Json(json!({ "data": lease })))
}

async fn renew_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
    Json(payload): Json<RenewLeaseInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = require_user_id(&state, &headers).await?;
    let lease = state
        .leases
        .renew(user_id, path.lease_id, scope.org_id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": lease }))))
}

async fn lease_stats(
    State(state): State<AppState>,
    Query(query): Query<LeaseStatsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let stats = state
        .leases
        .stats(user_id, query.org_id, query.property_id)
        .await?;
    Ok(Json(json!({ "data": stats })))
}

async fn expiring_leases(
    State(state): State<AppState>,
    Query(query): Query<ExpiringLeasesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let leases = state
        .leases
        .find_expiring(user_id, query.org_id, query.days_ahead)
        .await?;
    Ok(Json(json!({ "data": leases })))
}
