use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_user_id,
    error::AppResult,
    schemas::{CreateExpenseInput, ExpensePath, ExpensesQuery, OrgScopeQuery, UpdateExpenseInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/expenses",
            axum::routing::get(list_expenses).post(create_expense),
        )
        .route(
            "/expenses/{expense_id}",
            axum::routing::get(get_expense)
                .patch(update_expense)
                .delete(delete_expense),
        )
}

async fn list_expenses(
    State(state): State<AppState>,
    Query(query): Query<ExpensesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let expenses = state.expenses.list(user_id, &query).await?;
    Ok(Json(json!({ "data": expenses })))
}

async fn create_expense(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateExpenseInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = require_user_id(&state, &headers).await?;
    let expense = state.expenses.create(user_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": expense }))))
}

async fn get_expense(
    State(state): State<AppState>,
    Path(path): Path<ExpensePath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let expense = state
        .expenses
        .get(user_id, path.expense_id, scope.org_id)
        .await?;
    Ok(Json(json!({ "data": expense })))
}

async fn update_expense(
    State(state): State<AppState>,
    Path(path): Path<ExpensePath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
    Json(payload): Json<UpdateExpenseInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let expense = state
        .expenses
        .update(user_id, path.expense_id, scope.org_id, &payload)
        .await?;
    Ok(Json(json!({ "data": expense })))
}

async fn delete_expense(
    State(state): State<AppState>,
    Path(path): Path<ExpensePath>,
    Query(scope): Query<OrgScopeQuery>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let user_id = require_user_id(&state, &headers).await?;
    state
        .expenses
        .delete(user_id, path.expense_id, scope.org_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
