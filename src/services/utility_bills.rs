use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Payment, UtilityBill, UtilityBillStatus};
use crate::schemas::{
    clamp_limit_in_range, CreateUtilityBillInput, PayUtilityBillInput, UpdateUtilityBillInput,
    UtilityBillsQuery,
};
use crate::tenancy::{require_org_match, OrgGuard};

const BILL_COLUMNS: &str = "id, organization_id, property_id, unit_id, lease_id, tenant_id, \
     utility_type, period_start, period_end, due_date, amount, status, \
     meter_start, meter_end, consumption, rate, payment_id, notes, \
     recorded_by, created_at";

const PAYMENT_COLUMNS: &str = "id, organization_id, property_id, unit_id, lease_id, tenant_id, \
     payment_type, status, method, amount, currency, transaction_date, \
     due_date, paid_date, reference_id, notes, recorded_by, created_at";

/// Utility bill lifecycle: CRUD plus the pay operation that settles a bill
/// and records the matching payment atomically.
#[derive(Clone)]
pub struct UtilityBillsService {
    pool: PgPool,
    guard: OrgGuard,
}

impl UtilityBillsService {
    pub fn new(pool: PgPool, guard: OrgGuard) -> Self {
        Self { pool, guard }
    }

    pub async fn create(
        &self,
        caller: Uuid,
        input: &CreateUtilityBillInput,
    ) -> AppResult<UtilityBill> {
        input.check()?;
        self.guard
            .require_member(caller, input.organization_id)
            .await?;

        sqlx::query_as::<_, UtilityBill>(&format!(
            "INSERT INTO utility_bills (
                organization_id, property_id, unit_id, lease_id, tenant_id,
                utility_type, period_start, period_end, due_date, amount,
                status, meter_start, meter_end, consumption, rate, notes,
                recorded_by
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'due', $11, $12, $13, $14, $15, $16)
             RETURNING {BILL_COLUMNS}"
        ))
        .bind(input.organization_id)
        .bind(input.property_id)
        .bind(input.unit_id)
        .bind(input.lease_id)
        .bind(input.tenant_id)
        .bind(input.utility_type)
        .bind(input.period_start)
        .bind(input.period_end)
        .bind(input.due_date)
        .bind(input.amount)
        .bind(input.meter_start)
        .bind(input.meter_end)
        .bind(input.consumption)
        .bind(input.rate)
        .bind(&input.notes)
        .bind(caller)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Utility bill"))
    }

    pub async fn get(&self, caller: Uuid, bill_id: Uuid, org_id: Uuid) -> AppResult<UtilityBill> {
        self.guard.require_member(caller, org_id).await?;
        let bill = fetch_bill(&self.pool, bill_id).await?;
        require_org_match(bill.organization_id, org_id)?;
        Ok(bill)
    }

    pub async fn list(
        &self,
        caller: Uuid,
        query: &UtilityBillsQuery,
    ) -> AppResult<Vec<UtilityBill>> {
        self.guard.require_member(caller, query.org_id).await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {BILL_COLUMNS} FROM utility_bills WHERE organization_id = "
        ));
        builder.push_bind(query.org_id);
        if let Some(property_id) = query.property_id {
            builder.push(" AND property_id = ").push_bind(property_id);
        }
        if let Some(unit_id) = query.unit_id {
            builder.push(" AND unit_id = ").push_bind(unit_id);
        }
        if let Some(lease_id) = query.lease_id {
            builder.push(" AND lease_id = ").push_bind(lease_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        builder.push(" ORDER BY due_date DESC LIMIT ");
        builder.push_bind(clamp_limit_in_range(query.limit, 1, 1000));

        builder
            .build_query_as::<UtilityBill>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Utility bill"))
    }

    pub async fn update(
        &self,
        caller: Uuid,
        bill_id: Uuid,
        org_id: Uuid,
        patch: &UpdateUtilityBillInput,
    ) -> AppResult<UtilityBill> {
        if let Some(amount) = patch.amount {
            if amount <= 0.0 {
                return Err(AppError::UnprocessableEntity(
                    "amount must be greater than zero.".to_string(),
                ));
            }
        }
        self.guard.require_member(caller, org_id).await?;
        let bill = fetch_bill(&self.pool, bill_id).await?;
        require_org_match(bill.organization_id, org_id)?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "UPDATE utility_bills SET organization_id = organization_id",
        );
        if let Some(value) = patch.due_date {
            builder.push(", due_date = ").push_bind(value);
        }
        if let Some(value) = patch.amount {
            builder.push(", amount = ").push_bind(value);
        }
        if let Some(value) = patch.status {
            builder.push(", status = ").push_bind(value);
        }
        if let Some(value) = patch.meter_start {
            builder.push(", meter_start = ").push_bind(value);
        }
        if let Some(value) = patch.meter_end {
            builder.push(", meter_end = ").push_bind(value);
        }
        if let Some(value) = patch.consumption {
            builder.push(", consumption = ").push_bind(value);
        }
        if let Some(value) = patch.rate {
            builder.push(", rate = ").push_bind(value);
        }
        if let Some(value) = &patch.notes {
            builder.push(", notes = ").push_bind(value.clone());
        }
        builder.push(" WHERE id = ").push_bind(bill_id);
        builder.push(format!(" RETURNING {BILL_COLUMNS}"));

        builder
            .build_query_as::<UtilityBill>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Utility bill"))
    }

    /// Settle a bill: record the payment, flip the bill to paid, and link
    /// the two. One transaction so a crash cannot leave a paid bill without
    /// its payment or the reverse.
    pub async fn pay(
        &self,
        caller: Uuid,
        bill_id: Uuid,
        org_id: Uuid,
        input: &PayUtilityBillInput,
    ) -> AppResult<(UtilityBill, Payment)> {
        self.guard.require_member(caller, org_id).await?;
        if let Some(amount) = input.amount {
            if amount <= 0.0 {
                return Err(AppError::UnprocessableEntity(
                    "amount must be greater than zero.".to_string(),
                ));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;

        let bill = sqlx::query_as::<_, UtilityBill>(&format!(
            "SELECT {BILL_COLUMNS} FROM utility_bills WHERE id = $1 FOR UPDATE"
        ))
        .bind(bill_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;
        require_org_match(bill.organization_id, org_id)?;

        if bill.status == UtilityBillStatus::Paid && bill.payment_id.is_some() {
            return Err(AppError::Conflict("Utility bill is already paid.".to_string()));
        }
        if bill.status == UtilityBillStatus::Canceled {
            return Err(AppError::Conflict(
                "Utility bill is canceled and cannot be paid.".to_string(),
            ));
        }

        let amount = input.amount.unwrap_or(bill.amount);
        let paid_date = input.paid_date.unwrap_or_else(|| Utc::now().date_naive());

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (
                organization_id, property_id, unit_id, lease_id, tenant_id,
                payment_type, status, method, amount, currency,
                transaction_date, due_date, paid_date, reference_id, notes,
                recorded_by
             ) VALUES ($1, $2, $3, $4, $5, 'utility', 'successful', $6, $7, 'USD', $8, $9, $8, $10, $11, $12)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(bill.organization_id)
        .bind(bill.property_id)
        .bind(bill.unit_id)
        .bind(bill.lease_id)
        .bind(bill.tenant_id)
        .bind(&input.method)
        .bind(amount)
        .bind(paid_date)
        .bind(bill.due_date)
        .bind(&input.reference_id)
        .bind(&input.notes)
        .bind(caller)
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Payment"))?;

        let bill = sqlx::query_as::<_, UtilityBill>(&format!(
            "UPDATE utility_bills SET status = 'paid', payment_id = $2
             WHERE id = $1
             RETURNING {BILL_COLUMNS}"
        ))
        .bind(bill_id)
        .bind(payment.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;

        tx.commit()
            .await
            .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;
        Ok((bill, payment))
    }

    /// Delete the bill together with its linked payment when one exists.
    pub async fn delete(&self, caller: Uuid, bill_id: Uuid, org_id: Uuid) -> AppResult<()> {
        self.guard.require_member(caller, org_id).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;

        let bill = sqlx::query_as::<_, UtilityBill>(&format!(
            "SELECT {BILL_COLUMNS} FROM utility_bills WHERE id = $1 FOR UPDATE"
        ))
        .bind(bill_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;
        require_org_match(bill.organization_id, org_id)?;

        sqlx::query("DELETE FROM utility_bills WHERE id = $1")
            .bind(bill_id)
            .execute(&mut *tx)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;

        if let Some(payment_id) = bill.payment_id {
            sqlx::query("DELETE FROM payments WHERE id = $1")
                .bind(payment_id)
                .execute(&mut *tx)
                .await
                .map_err(|error| AppError::from_sqlx(error, "Payment"))?;
        }

        tx.commit()
            .await
            .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;
        Ok(())
    }
}

async fn fetch_bill(pool: &PgPool, bill_id: Uuid) -> AppResult<UtilityBill> {
    sqlx::query_as::<_, UtilityBill>(&format!(
        "SELECT {BILL_COLUMNS} FROM utility_bills WHERE id = $1"
    ))
    .bind(bill_id)
    .fetch_one(pool)
    .await
    .map_err(|error| AppError::from_sqlx(error, "Utility bill"))
}
