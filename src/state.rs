use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::services::expenses::ExpensesService;
use crate::services::finance::FinanceService;
use crate::services::leases::LeaseService;
use crate::services::payments::PaymentsService;
use crate::services::utility_bills::UtilityBillsService;
use crate::tenancy::OrgGuard;

/// Shared application state. Every service is constructed here, once, and
/// handed its dependencies explicitly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: PgPool,
    pub leases: LeaseService,
    pub payments: PaymentsService,
    pub expenses: ExpensesService,
    pub utility_bills: UtilityBillsService,
    pub finance: FinanceService,
}

impl AppState {
    pub fn build(config: AppConfig) -> AppResult<Self> {
        let options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|error| AppError::Internal(format!("Invalid DATABASE_URL: {error}")))?;

        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_pool_max_connections)
            .min_connections(config.db_pool_min_connections)
            .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
            .connect_lazy_with(options);

        let guard = OrgGuard::new(db_pool.clone(), &config);
        let leases = LeaseService::new(db_pool.clone(), guard.clone());
        let payments = PaymentsService::new(db_pool.clone(), guard.clone());
        let expenses = ExpensesService::new(db_pool.clone(), guard.clone());
        let utility_bills = UtilityBillsService::new(db_pool.clone(), guard.clone());
        let finance = FinanceService::new(
            db_pool.clone(),
            guard,
            payments.clone(),
            expenses.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            leases,
            payments,
            expenses,
            utility_bills,
            finance,
        })
    }
}
