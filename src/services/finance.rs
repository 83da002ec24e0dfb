use chrono::{Datelike, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::FinancialSummary;
use crate::schemas::FinancialSummaryQuery;
use crate::services::expenses::ExpensesService;
use crate::services::payments::PaymentsService;
use crate::tenancy::OrgGuard;

/// Collection rate is not computed yet; reported as a fixed figure until
/// the due-vs-received ledger lands.
const RENT_COLLECTION_RATE_PLACEHOLDER: f64 = 95.0;

/// Read-only financial reporting. Composes the payment and expense feeds
/// into a per-property summary; never writes anything.
#[derive(Clone)]
pub struct FinanceService {
    pool: PgPool,
    guard: OrgGuard,
    payments: PaymentsService,
    expenses: ExpensesService,
}

impl FinanceService {
    pub fn new(
        pool: PgPool,
        guard: OrgGuard,
        payments: PaymentsService,
        expenses: ExpensesService,
    ) -> Self {
        Self {
            pool,
            guard,
            payments,
            expenses,
        }
    }

    pub async fn financial_summary(
        &self,
        caller: Uuid,
        query: &FinancialSummaryQuery,
    ) -> AppResult<FinancialSummary> {
        self.guard.require_member(caller, query.org_id).await?;

        let today = Utc::now().date_naive();
        let (start, end) = resolve_period(&query.period, query.start_date, query.end_date, today)?;

        let income = self
            .payments
            .property_income(query.property_id, start, end, query.org_id)
            .await?;
        let expenses = self
            .expenses
            .property_expenses(query.property_id, start, end, query.org_id)
            .await?;

        let (occupied_units, total_units) = self
            .unit_occupancy(query.property_id, query.org_id)
            .await?;

        Ok(FinancialSummary {
            period_start: start,
            period_end: end,
            income,
            expenses,
            net_income: income - expenses,
            rent_collection_rate: RENT_COLLECTION_RATE_PLACEHOLDER,
            occupancy_rate: occupancy_rate(occupied_units, total_units),
            occupied_units,
            total_units,
        })
    }

    async fn unit_occupancy(&self, property_id: Uuid, org_id: Uuid) -> AppResult<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE status = 'occupied'), COUNT(*)
             FROM units
             WHERE property_id = $1 AND organization_id = $2",
        )
        .bind(property_id)
        .bind(org_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Unit"))?;
        Ok(row)
    }
}

/// Resolve a named reporting period to concrete dates. The month, quarter,
/// and year periods run from their calendar start through today; custom
/// requires both bounds.
fn resolve_period(
    period: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let first_of = |year: i32, month: u32| {
        NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppError::Internal("Invalid period start.".to_string()))
    };
    match period {
        "month" => Ok((first_of(today.year(), today.month())?, today)),
        "quarter" => {
            let quarter_month = ((today.month() - 1) / 3) * 3 + 1;
            Ok((first_of(today.year(), quarter_month)?, today))
        }
        "year" => Ok((first_of(today.year(), 1)?, today)),
        "custom" => {
            let (start, end) = match (start, end) {
                (Some(start), Some(end)) => (start, end),
                _ => {
                    return Err(AppError::BadRequest(
                        "Custom period requires start_date and end_date.".to_string(),
                    ))
                }
            };
            if start > end {
                return Err(AppError::BadRequest(
                    "start_date must be on or before end_date.".to_string(),
                ));
            }
            Ok((start, end))
        }
        other => Err(AppError::BadRequest(format!(
            "Unknown period '{other}'; expected month, quarter, year, or custom."
        ))),
    }
}

fn occupancy_rate(occupied: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    occupied as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_period_runs_from_first_to_today() {
        let today = date(2026, 8, 17);
        let (start, end) = resolve_period("month", None, None, today).unwrap();
        assert_eq!(start, date(2026, 8, 1));
        assert_eq!(end, today);
    }

    #[test]
    fn quarter_period_snaps_to_quarter_start() {
        let today = date(2026, 8, 17);
        let (start, _) = resolve_period("quarter", None, None, today).unwrap();
        assert_eq!(start, date(2026, 7, 1));

        let january = date(2026, 1, 2);
        let (start, _) = resolve_period("quarter", None, None, january).unwrap();
        assert_eq!(start, date(2026, 1, 1));

        let december = date(2026, 12, 31);
        let (start, _) = resolve_period("quarter", None, None, december).unwrap();
        assert_eq!(start, date(2026, 10, 1));
    }

    #[test]
    fn year_period_starts_january_first() {
        let today = date(2026, 8, 17);
        let (start, end) = resolve_period("year", None, None, today).unwrap();
        assert_eq!(start, date(2026, 1, 1));
        assert_eq!(end, today);
    }

    #[test]
    fn custom_period_requires_both_bounds() {
        let today = date(2026, 8, 17);
        let err = resolve_period("custom", Some(date(2026, 1, 1)), None, today).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err =
            resolve_period("custom", Some(date(2026, 2, 1)), Some(date(2026, 1, 1)), today)
                .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let (start, end) =
            resolve_period("custom", Some(date(2026, 1, 1)), Some(date(2026, 2, 1)), today)
                .unwrap();
        assert_eq!(start, date(2026, 1, 1));
        assert_eq!(end, date(2026, 2, 1));
    }

    #[test]
    fn unknown_period_is_rejected() {
        let today = date(2026, 8, 17);
        let err = resolve_period("fortnight", None, None, today).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn occupancy_rate_handles_empty_property() {
        assert_eq!(occupancy_rate(0, 0), 0.0);
        assert_eq!(occupancy_rate(1, 4), 25.0);
        assert_eq!(occupancy_rate(4, 4), 100.0);
    }
}
