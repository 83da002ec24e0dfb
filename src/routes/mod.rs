use axum::{routing::get, Router};

use crate::state::AppState;

pub mod expenses;
pub mod health;
pub mod leases;
pub mod payments;
pub mod reports;
pub mod utility_bills;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(leases::router())
        .merge(payments::router())
        .merge(expenses::router())
        .merge(utility_bills::router())
        .merge(reports::router())
}
