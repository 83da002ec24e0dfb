use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Payment;
use crate::schemas::{clamp_limit_in_range, CreatePaymentInput, PaymentsQuery, UpdatePaymentInput};
use crate::tenancy::{require_org_match, OrgGuard};

const PAYMENT_COLUMNS: &str = "id, organization_id, property_id, unit_id, lease_id, tenant_id, \
     payment_type, status, method, amount, currency, transaction_date, due_date, paid_date, \
     reference_id, notes, recorded_by, created_at";

/// Organization-scoped CRUD over payment records plus the income feed for
/// the financial summary.
#[derive(Clone)]
pub struct PaymentsService {
    pool: PgPool,
    guard: OrgGuard,
}

impl PaymentsService {
    pub fn new(pool: PgPool, guard: OrgGuard) -> Self {
        Self { pool, guard }
    }

    pub async fn create(
        &self,
        caller: Uuid,
        input: &CreatePaymentInput,
    ) -> AppResult<Payment> {
        crate::schemas::validate_input(input)?;
        self.guard
            .require_member(caller, input.organization_id)
            .await?;

        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (
                organization_id, property_id, unit_id, lease_id, tenant_id,
                payment_type, status, method, amount, currency,
                transaction_date, due_date, paid_date, reference_id, notes, recorded_by
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(input.organization_id)
        .bind(input.property_id)
        .bind(input.unit_id)
        .bind(input.lease_id)
        .bind(input.tenant_id)
        .bind(input.payment_type)
        .bind(input.status)
        .bind(&input.method)
        .bind(input.amount)
        .bind(&input.currency)
        .bind(input.transaction_date)
        .bind(input.due_date)
        .bind(input.paid_date)
        .bind(&input.reference_id)
        .bind(&input.notes)
        .bind(caller)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Payment"))
    }

    pub async fn get(&self, caller: Uuid, payment_id: Uuid, org_id: Uuid) -> AppResult<Payment> {
        self.guard.require_member(caller, org_id).await?;
        let payment = fetch_payment(&self.pool, payment_id).await?;
        require_org_match(payment.organization_id, org_id)?;
        Ok(payment)
    }

    pub async fn list(&self, caller: Uuid, query: &PaymentsQuery) -> AppResult<Vec<Payment>> {
        self.guard.require_member(caller, query.org_id).await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE organization_id = "
        ));
        builder.push_bind(query.org_id);
        if let Some(property_id) = query.property_id {
            builder.push(" AND property_id = ").push_bind(property_id);
        }
        if let Some(lease_id) = query.lease_id {
            builder.push(" AND lease_id = ").push_bind(lease_id);
        }
        if let Some(payment_type) = query.payment_type {
            builder.push(" AND payment_type = ").push_bind(payment_type);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(from_date) = query.from_date {
            builder.push(" AND transaction_date >= ").push_bind(from_date);
        }
        if let Some(to_date) = query.to_date {
            builder.push(" AND transaction_date <= ").push_bind(to_date);
        }
        builder.push(" ORDER BY transaction_date DESC LIMIT ");
        builder.push_bind(clamp_limit_in_range(query.limit, 1, 1000));

        builder
            .build_query_as::<Payment>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Payment"))
    }

    pub async fn update(
        &self,
        caller: Uuid,
        payment_id: Uuid,
        org_id: Uuid,
        patch: &UpdatePaymentInput,
    ) -> AppResult<Payment> {
        patch.check()?;
        self.guard.require_member(caller, org_id).await?;
        let payment = fetch_payment(&self.pool, payment_id).await?;
        require_org_match(payment.organization_id, org_id)?;

        let mut builder =
            QueryBuilder::<Postgres>::new("UPDATE payments SET organization_id = organization_id");
        if let Some(value) = patch.status {
            builder.push(", status = ").push_bind(value);
        }
        if let Some(value) = &patch.method {
            builder.push(", method = ").push_bind(value.clone());
        }
        if let Some(value) = patch.amount {
            builder.push(", amount = ").push_bind(value);
        }
        if let Some(value) = patch.transaction_date {
            builder.push(", transaction_date = ").push_bind(value);
        }
        if let Some(value) = patch.due_date {
            builder.push(", due_date = ").push_bind(value);
        }
        if let Some(value) = patch.paid_date {
            builder.push(", paid_date = ").push_bind(value);
        }
        if let Some(value) = &patch.reference_id {
            builder.push(", reference_id = ").push_bind(value.clone());
        }
        if let Some(value) = &patch.notes {
            builder.push(", notes = ").push_bind(value.clone());
        }
        builder.push(" WHERE id = ").push_bind(payment_id);
        builder.push(format!(" RETURNING {PAYMENT_COLUMNS}"));

        builder
            .build_query_as::<Payment>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Payment"))
    }

    pub async fn delete(&self, caller: Uuid, payment_id: Uuid, org_id: Uuid) -> AppResult<()> {
        self.guard.require_member(caller, org_id).await?;
        let payment = fetch_payment(&self.pool, payment_id).await?;
        require_org_match(payment.organization_id, org_id)?;

        sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(payment_id)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Payment"))?;
        Ok(())
    }

    /// Income feed for the financial summary: the sum of successful payment
    /// amounts for a property inside the window. Not filtered by payment
    /// type; deposits and late fees count toward gross cash-in, and
    /// narrowing this is a pending product decision.
    pub async fn property_income(
        &self,
        property_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        org_id: Uuid,
    ) -> AppResult<f64> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)
             FROM payments
             WHERE organization_id = $1 AND property_id = $2
               AND status = 'successful'
               AND transaction_date >= $3 AND transaction_date <= $4",
        )
        .bind(org_id)
        .bind(property_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Payment"))
    }
}

async fn fetch_payment(pool: &PgPool, payment_id: Uuid) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
    ))
    .bind(payment_id)
    .fetch_one(pool)
    .await
    .map_err(|error| AppError::from_sqlx(error, "Payment"))
}
