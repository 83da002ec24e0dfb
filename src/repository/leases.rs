use chrono::{Duration, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    BillingType, Lease, LeaseStats, LeaseStatus, PaymentFrequency, StatusCount, Unit, UnitStatus,
};
use crate::schemas::{
    clamp_limit_in_range, CreateLeaseInput, LeasesQuery, RenewLeaseInput, TerminateLeaseInput,
    UpdateLeaseInput,
};
use crate::tenancy::require_org_match;

const LEASE_COLUMNS: &str = "id, organization_id, unit_id, tenant_id, start_date, end_date, \
     rent_amount, deposit_amount, status, payment_day, payment_frequency, \
     water_included, water_billing_type, water_fixed_amount, \
     electricity_included, electricity_billing_type, electricity_fixed_amount, \
     gas_included, gas_billing_type, gas_fixed_amount, \
     internet_included, internet_billing_type, internet_fixed_amount, \
     document_url, notes, created_by, renewed_from_lease_id, renewed_to_lease_id, \
     created_at, updated_at";

/// Owns every lease write and the unit-occupancy side effects of those
/// writes. Multi-row transitions run inside one transaction; the
/// `one_active_lease_per_unit` partial unique index backs the pre-checks so
/// concurrent creates on the same unit fail deterministically.
#[derive(Clone)]
pub struct LeaseRepository {
    pool: PgPool,
}

struct NewLease {
    organization_id: Uuid,
    unit_id: Uuid,
    tenant_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    rent_amount: f64,
    deposit_amount: f64,
    payment_day: i16,
    payment_frequency: PaymentFrequency,
    water_included: bool,
    water_billing_type: BillingType,
    water_fixed_amount: Option<f64>,
    electricity_included: bool,
    electricity_billing_type: BillingType,
    electricity_fixed_amount: Option<f64>,
    gas_included: bool,
    gas_billing_type: BillingType,
    gas_fixed_amount: Option<f64>,
    internet_included: bool,
    internet_billing_type: BillingType,
    internet_fixed_amount: Option<f64>,
    document_url: Option<String>,
    notes: Option<String>,
    created_by: Uuid,
    renewed_from_lease_id: Option<Uuid>,
}

impl LeaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an active lease against a free unit and flip the unit to
    /// occupied, in one transaction.
    pub async fn create(&self, input: &CreateLeaseInput, created_by: Uuid) -> AppResult<Lease> {
        let mut tx = begin(&self.pool).await?;

        let unit = fetch_unit_for_update(&mut tx, input.unit_id).await?;
        require_org_match(unit.organization_id, input.organization_id)?;
        ensure_unit_free(&mut tx, &unit, None).await?;

        let lease = insert_lease(
            &mut tx,
            NewLease {
                organization_id: input.organization_id,
                unit_id: input.unit_id,
                tenant_id: input.tenant_id,
                start_date: input.start_date,
                end_date: input.end_date,
                rent_amount: input.rent_amount,
                deposit_amount: input.deposit_amount,
                payment_day: input.payment_day,
                payment_frequency: input.payment_frequency,
                water_included: input.water.included,
                water_billing_type: input.water.billing_type,
                water_fixed_amount: input.water.fixed_amount,
                electricity_included: input.electricity.included,
                electricity_billing_type: input.electricity.billing_type,
                electricity_fixed_amount: input.electricity.fixed_amount,
                gas_included: input.gas.included,
                gas_billing_type: input.gas.billing_type,
                gas_fixed_amount: input.gas.fixed_amount,
                internet_included: input.internet.included,
                internet_billing_type: input.internet.billing_type,
                internet_fixed_amount: input.internet.fixed_amount,
                document_url: input.document_url.clone(),
                notes: input.notes.clone(),
                created_by,
                renewed_from_lease_id: None,
            },
        )
        .await?;

        set_unit_status(&mut tx, unit.id, UnitStatus::Occupied).await?;
        commit(tx).await?;
        Ok(lease)
    }

    /// Apply a patch. A unit move re-runs the availability checks on the
    /// destination and flips both units; a status change to
    /// terminated/expired vacates the lease's unit.
    pub async fn update(
        &self,
        lease_id: Uuid,
        org_id: Uuid,
        patch: &UpdateLeaseInput,
    ) -> AppResult<Lease> {
        patch.check()?;
        let mut tx = begin(&self.pool).await?;

        let lease = fetch_lease_for_update(&mut tx, lease_id).await?;
        require_org_match(lease.organization_id, org_id)?;

        if patch.is_empty() {
            commit(tx).await?;
            return Ok(lease);
        }

        let touches_occupancy = patch.unit_id.is_some()
            || patch.status.is_some()
            || patch.start_date.is_some()
            || patch.end_date.is_some();
        if lease.status.is_terminal() && touches_occupancy {
            return Err(AppError::Conflict(format!(
                "Lease is {}; its unit, status, and dates can no longer change.",
                lease.status.as_str()
            )));
        }

        let merged_start = patch.start_date.unwrap_or(lease.start_date);
        let merged_end = patch.end_date.unwrap_or(lease.end_date);
        if merged_start >= merged_end {
            return Err(AppError::UnprocessableEntity(
                "start_date must be before end_date.".to_string(),
            ));
        }

        if let Some(next_status) = patch.status {
            check_status_transition(lease.status, next_status)?;
        }

        let unit_moved = patch
            .unit_id
            .filter(|next_unit| *next_unit != lease.unit_id);
        if let Some(next_unit_id) = unit_moved {
            let destination = fetch_unit_for_update(&mut tx, next_unit_id).await?;
            require_org_match(destination.organization_id, org_id)?;
            ensure_unit_free(&mut tx, &destination, Some(lease.id)).await?;
            // Only an in-force lease actually holds its unit.
            if lease.status == LeaseStatus::Active {
                set_unit_status(&mut tx, lease.unit_id, UnitStatus::Vacant).await?;
                set_unit_status(&mut tx, destination.id, UnitStatus::Occupied).await?;
            }
        }

        // Terminating or expiring through a plain update still vacates the
        // unit the lease ends up on.
        if matches!(
            patch.status,
            Some(LeaseStatus::Terminated) | Some(LeaseStatus::Expired)
        ) {
            let effective_unit = unit_moved.unwrap_or(lease.unit_id);
            set_unit_status(&mut tx, effective_unit, UnitStatus::Vacant).await?;
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE leases SET updated_at = NOW()");
        if let Some(value) = patch.unit_id {
            builder.push(", unit_id = ").push_bind(value);
        }
        if let Some(value) = patch.start_date {
            builder.push(", start_date = ").push_bind(value);
        }
        if let Some(value) = patch.end_date {
            builder.push(", end_date = ").push_bind(value);
        }
        if let Some(value) = patch.rent_amount {
            builder.push(", rent_amount = ").push_bind(value);
        }
        if let Some(value) = patch.deposit_amount {
            builder.push(", deposit_amount = ").push_bind(value);
        }
        if let Some(value) = patch.status {
            builder.push(", status = ").push_bind(value);
        }
        if let Some(value) = patch.payment_day {
            builder.push(", payment_day = ").push_bind(value);
        }
        if let Some(value) = patch.payment_frequency {
            builder.push(", payment_frequency = ").push_bind(value);
        }
        if let Some(value) = &patch.document_url {
            builder.push(", document_url = ").push_bind(value.clone());
        }
        if let Some(value) = &patch.notes {
            builder.push(", notes = ").push_bind(value.clone());
        }
        builder.push(" WHERE id = ").push_bind(lease_id);
        builder.push(format!(" RETURNING {LEASE_COLUMNS}"));

        let updated = builder
            .build_query_as::<Lease>()
            .fetch_one(&mut *tx)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

        commit(tx).await?;
        Ok(updated)
    }

    /// End an active lease early in one atomic unit of work: status becomes
    /// terminated, the end date moves to the termination date, the reason is
    /// appended to notes, the unit is vacated, and an optional deposit
    /// refund payment is recorded.
    pub async fn terminate(
        &self,
        lease_id: Uuid,
        org_id: Uuid,
        input: &TerminateLeaseInput,
        recorded_by: Uuid,
    ) -> AppResult<Lease> {
        if let Some(refund) = input.refund_amount {
            if refund < 0.0 {
                return Err(AppError::UnprocessableEntity(
                    "refund_amount must not be negative.".to_string(),
                ));
            }
        }

        let mut tx = begin(&self.pool).await?;

        let lease = fetch_lease_for_update(&mut tx, lease_id).await?;
        require_org_match(lease.organization_id, org_id)?;
        if lease.status != LeaseStatus::Active {
            return Err(AppError::Conflict(
                "Lease is not active and cannot be terminated.".to_string(),
            ));
        }
        check_termination_date(lease.start_date, input.termination_date)?;

        let notes = append_termination_note(
            lease.notes.as_deref(),
            &input.reason,
            input.termination_date,
        );

        let terminated = sqlx::query_as::<_, Lease>(&format!(
            "UPDATE leases
             SET status = 'terminated', end_date = $2, notes = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING {LEASE_COLUMNS}"
        ))
        .bind(lease_id)
        .bind(input.termination_date)
        .bind(&notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

        set_unit_status(&mut tx, lease.unit_id, UnitStatus::Vacant).await?;

        if let Some(refund) = input.refund_amount.filter(|amount| *amount > 0.0) {
            sqlx::query(
                "INSERT INTO payments (
                    organization_id, unit_id, lease_id, tenant_id,
                    payment_type, status, method, amount, currency,
                    transaction_date, paid_date, notes, recorded_by
                 ) VALUES ($1, $2, $3, $4, 'deposit', 'refunded', 'refund', $5, 'USD', $6, $6, $7, $8)",
            )
            .bind(org_id)
            .bind(lease.unit_id)
            .bind(lease.id)
            .bind(lease.tenant_id)
            .bind(refund)
            .bind(input.termination_date)
            .bind(format!("Deposit refund on lease termination: {}", input.reason))
            .bind(recorded_by)
            .execute(&mut *tx)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Payment"))?;
        }

        commit(tx).await?;
        Ok(terminated)
    }

    /// Create a successor lease starting where the predecessor ends, mark
    /// the predecessor renewed, and link the two explicitly. The unit stays
    /// occupied throughout.
    pub async fn renew(
        &self,
        lease_id: Uuid,
        org_id: Uuid,
        input: &RenewLeaseInput,
        created_by: Uuid,
    ) -> AppResult<Lease> {
        let mut tx = begin(&self.pool).await?;

        let lease = fetch_lease_for_update(&mut tx, lease_id).await?;
        require_org_match(lease.organization_id, org_id)?;
        if lease.status != LeaseStatus::Active {
            return Err(AppError::Conflict(
                "Lease is not active and cannot be renewed.".to_string(),
            ));
        }

        let new_start = renewal_start(lease.start_date, lease.end_date);
        if input.new_end_date <= new_start {
            return Err(AppError::UnprocessableEntity(
                "new_end_date must be after the current lease end date.".to_string(),
            ));
        }
        let rent_amount = renewal_rent(lease.rent_amount, input.new_rent_amount);
        if rent_amount <= 0.0 {
            return Err(AppError::UnprocessableEntity(
                "new_rent_amount must be greater than zero.".to_string(),
            ));
        }
        let deposit_amount =
            renewal_deposit(input.preserve_deposit, lease.deposit_amount, input.new_deposit_amount);
        if deposit_amount < 0.0 {
            return Err(AppError::UnprocessableEntity(
                "new_deposit_amount must not be negative.".to_string(),
            ));
        }

        // The predecessor leaves 'active' first so the partial unique index
        // admits the successor row.
        sqlx::query("UPDATE leases SET status = 'renewed', updated_at = NOW() WHERE id = $1")
            .bind(lease.id)
            .execute(&mut *tx)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

        let successor = insert_lease(
            &mut tx,
            NewLease {
                organization_id: lease.organization_id,
                unit_id: lease.unit_id,
                tenant_id: lease.tenant_id,
                start_date: new_start,
                end_date: input.new_end_date,
                rent_amount,
                deposit_amount,
                payment_day: lease.payment_day,
                payment_frequency: lease.payment_frequency,
                water_included: lease.water_included,
                water_billing_type: lease.water_billing_type,
                water_fixed_amount: lease.water_fixed_amount,
                electricity_included: lease.electricity_included,
                electricity_billing_type: lease.electricity_billing_type,
                electricity_fixed_amount: lease.electricity_fixed_amount,
                gas_included: lease.gas_included,
                gas_billing_type: lease.gas_billing_type,
                gas_fixed_amount: lease.gas_fixed_amount,
                internet_included: lease.internet_included,
                internet_billing_type: lease.internet_billing_type,
                internet_fixed_amount: lease.internet_fixed_amount,
                document_url: None,
                notes: None,
                created_by,
                renewed_from_lease_id: Some(lease.id),
            },
        )
        .await?;

        sqlx::query("UPDATE leases SET renewed_to_lease_id = $2 WHERE id = $1")
            .bind(lease.id)
            .bind(successor.id)
            .execute(&mut *tx)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

        commit(tx).await?;
        Ok(successor)
    }

    /// Delete a lease with no dependent financial records, vacating its
    /// unit when the lease was still active.
    pub async fn delete(&self, lease_id: Uuid, org_id: Uuid) -> AppResult<()> {
        let mut tx = begin(&self.pool).await?;

        let lease = fetch_lease_for_update(&mut tx, lease_id).await?;
        require_org_match(lease.organization_id, org_id)?;

        let payment_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE lease_id = $1")
                .bind(lease.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|error| AppError::from_sqlx(error, "Payment"))?;
        if payment_count > 0 {
            return Err(AppError::Conflict(
                "Cannot delete lease with associated transactions.".to_string(),
            ));
        }

        let bill_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM utility_bills WHERE lease_id = $1")
                .bind(lease.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|error| AppError::from_sqlx(error, "Utility bill"))?;
        if bill_count > 0 {
            return Err(AppError::Conflict(
                "Cannot delete lease with associated utility bills.".to_string(),
            ));
        }

        if lease.status == LeaseStatus::Active {
            set_unit_status(&mut tx, lease.unit_id, UnitStatus::Vacant).await?;
        }

        sqlx::query("DELETE FROM leases WHERE id = $1")
            .bind(lease.id)
            .execute(&mut *tx)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

        commit(tx).await?;
        Ok(())
    }

    pub async fn get(&self, lease_id: Uuid, org_id: Uuid) -> AppResult<Lease> {
        let lease = sqlx::query_as::<_, Lease>(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE id = $1"
        ))
        .bind(lease_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Lease"))?;
        require_org_match(lease.organization_id, org_id)?;
        Ok(lease)
    }

    pub async fn list(&self, query: &LeasesQuery) -> AppResult<Vec<Lease>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE organization_id = "
        ));
        builder.push_bind(query.org_id);
        if let Some(unit_id) = query.unit_id {
            builder.push(" AND unit_id = ").push_bind(unit_id);
        }
        if let Some(tenant_id) = query.tenant_id {
            builder.push(" AND tenant_id = ").push_bind(tenant_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(clamp_limit_in_range(query.limit, 1, 1000));

        builder
            .build_query_as::<Lease>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Lease"))
    }

    /// Portfolio counters: totals, per-status breakdown, leases expiring
    /// within 30 days, average active rent, and the monthly rent roll of
    /// active monthly-frequency leases. Optionally scoped to one property
    /// through the unit table.
    pub async fn lease_stats(
        &self,
        org_id: Uuid,
        property_id: Option<Uuid>,
    ) -> AppResult<LeaseStats> {
        let today = Utc::now().date_naive();
        let horizon = today + Duration::days(30);

        let mut status_query = QueryBuilder::<Postgres>::new(
            "SELECT status, COUNT(*) AS count FROM leases WHERE organization_id = ",
        );
        status_query.push_bind(org_id);
        push_property_scope(&mut status_query, property_id);
        status_query.push(" GROUP BY status");

        let status_rows = status_query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

        let mut by_status = Vec::with_capacity(status_rows.len());
        for row in status_rows {
            let status: LeaseStatus = row
                .try_get("status")
                .map_err(|error| AppError::from_sqlx(error, "Lease"))?;
            let count: i64 = row
                .try_get("count")
                .map_err(|error| AppError::from_sqlx(error, "Lease"))?;
            by_status.push(StatusCount { status, count });
        }

        let mut expiring_query = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM leases WHERE organization_id = ",
        );
        expiring_query.push_bind(org_id);
        expiring_query.push(" AND status = 'active' AND end_date >= ");
        expiring_query.push_bind(today);
        expiring_query.push(" AND end_date <= ");
        expiring_query.push_bind(horizon);
        push_property_scope(&mut expiring_query, property_id);

        let expiring_within_30_days: i64 = expiring_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

        let mut rent_query = QueryBuilder::<Postgres>::new(
            "SELECT COALESCE(AVG(rent_amount), 0) AS average_rent, \
             COALESCE(SUM(rent_amount) FILTER (WHERE payment_frequency = 'monthly'), 0) AS monthly_total \
             FROM leases WHERE status = 'active' AND organization_id = ",
        );
        rent_query.push_bind(org_id);
        push_property_scope(&mut rent_query, property_id);

        let rent_row = rent_query
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Lease"))?;
        let average_active_rent: f64 = rent_row.try_get("average_rent").unwrap_or(0.0);
        let total_monthly_rent: f64 = rent_row.try_get("monthly_total").unwrap_or(0.0);

        Ok(fold_stats(
            by_status,
            expiring_within_30_days,
            average_active_rent,
            total_monthly_rent,
        ))
    }

    /// Active leases ending within `[today, today + days_ahead]`, the query
    /// hook an external scheduler uses for expirations and reminders.
    pub async fn find_expiring(&self, org_id: Uuid, days_ahead: i64) -> AppResult<Vec<Lease>> {
        let today = Utc::now().date_naive();
        let horizon = today + Duration::days(days_ahead.max(0));

        sqlx::query_as::<_, Lease>(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases
             WHERE organization_id = $1 AND status = 'active'
               AND end_date >= $2 AND end_date <= $3
             ORDER BY end_date ASC"
        ))
        .bind(org_id)
        .bind(today)
        .bind(horizon)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Lease"))
    }
}

async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::from_sqlx(error, "Lease"))
}

async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|error| AppError::from_sqlx(error, "Lease"))
}

async fn fetch_lease_for_update(
    tx: &mut Transaction<'static, Postgres>,
    lease_id: Uuid,
) -> AppResult<Lease> {
    sqlx::query_as::<_, Lease>(&format!(
        "SELECT {LEASE_COLUMNS} FROM leases WHERE id = $1 FOR UPDATE"
    ))
    .bind(lease_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|error| AppError::from_sqlx(error, "Lease"))
}

async fn fetch_unit_for_update(
    tx: &mut Transaction<'static, Postgres>,
    unit_id: Uuid,
) -> AppResult<Unit> {
    sqlx::query_as::<_, Unit>(
        "SELECT id, organization_id, property_id, name, status, created_at
         FROM units WHERE id = $1 FOR UPDATE",
    )
    .bind(unit_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|error| AppError::from_sqlx(error, "Unit"))
}

async fn set_unit_status(
    tx: &mut Transaction<'static, Postgres>,
    unit_id: Uuid,
    status: UnitStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE units SET status = $2 WHERE id = $1")
        .bind(unit_id)
        .bind(status)
        .execute(&mut **tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Unit"))?;
    Ok(())
}

/// A unit can take a new lease only when vacant and without a competing
/// active lease. `exclude_lease_id` ignores the lease being moved.
async fn ensure_unit_free(
    tx: &mut Transaction<'static, Postgres>,
    unit: &Unit,
    exclude_lease_id: Option<Uuid>,
) -> AppResult<()> {
    let active_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM leases
         WHERE unit_id = $1 AND status = 'active' AND ($2::uuid IS NULL OR id <> $2)",
    )
    .bind(unit.id)
    .bind(exclude_lease_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

    if active_count > 0 {
        return Err(AppError::Conflict(format!(
            "Unit {} already has an active lease.",
            unit.name
        )));
    }
    if unit.status != UnitStatus::Vacant {
        return Err(AppError::Conflict(format!(
            "Unit {} is not available for a new lease.",
            unit.name
        )));
    }
    Ok(())
}

async fn insert_lease(
    tx: &mut Transaction<'static, Postgres>,
    new: NewLease,
) -> AppResult<Lease> {
    sqlx::query_as::<_, Lease>(&format!(
        "INSERT INTO leases (
            organization_id, unit_id, tenant_id, start_date, end_date,
            rent_amount, deposit_amount, status, payment_day, payment_frequency,
            water_included, water_billing_type, water_fixed_amount,
            electricity_included, electricity_billing_type, electricity_fixed_amount,
            gas_included, gas_billing_type, gas_fixed_amount,
            internet_included, internet_billing_type, internet_fixed_amount,
            document_url, notes, created_by, renewed_from_lease_id
         ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, 'active', $8, $9,
            $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21,
            $22, $23, $24, $25
         ) RETURNING {LEASE_COLUMNS}"
    ))
    .bind(new.organization_id)
    .bind(new.unit_id)
    .bind(new.tenant_id)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.rent_amount)
    .bind(new.deposit_amount)
    .bind(new.payment_day)
    .bind(new.payment_frequency)
    .bind(new.water_included)
    .bind(new.water_billing_type)
    .bind(new.water_fixed_amount)
    .bind(new.electricity_included)
    .bind(new.electricity_billing_type)
    .bind(new.electricity_fixed_amount)
    .bind(new.gas_included)
    .bind(new.gas_billing_type)
    .bind(new.gas_fixed_amount)
    .bind(new.internet_included)
    .bind(new.internet_billing_type)
    .bind(new.internet_fixed_amount)
    .bind(new.document_url)
    .bind(new.notes)
    .bind(new.created_by)
    .bind(new.renewed_from_lease_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|error| match &error {
        // Lost the race on the partial unique index: same outcome as the
        // pre-check, not an internal error.
        sqlx::Error::Database(db_error) if db_error.code().as_deref() == Some("23505") => {
            AppError::Conflict("Unit already has an active lease.".to_string())
        }
        _ => AppError::from_sqlx(error, "Lease"),
    })
}

fn push_property_scope(builder: &mut QueryBuilder<'_, Postgres>, property_id: Option<Uuid>) {
    if let Some(property_id) = property_id {
        builder.push(" AND unit_id IN (SELECT id FROM units WHERE property_id = ");
        builder.push_bind(property_id);
        builder.push(")");
    }
}

/// Status writes reachable through `update`. Terminal targets other than
/// renewal are allowed from in-force statuses; superseding goes through
/// `renew`, and nothing returns to pending.
fn check_status_transition(current: LeaseStatus, next: LeaseStatus) -> AppResult<()> {
    if next == current {
        return Ok(());
    }
    match next {
        LeaseStatus::Terminated | LeaseStatus::Expired => Ok(()),
        LeaseStatus::Active if current == LeaseStatus::Pending => Ok(()),
        LeaseStatus::Renewed => Err(AppError::Conflict(
            "Use the renew operation to supersede a lease.".to_string(),
        )),
        _ => Err(AppError::Conflict(format!(
            "Lease status cannot change from {} to {}.",
            current.as_str(),
            next.as_str()
        ))),
    }
}

/// The shortened lease still has to satisfy start < end; a termination on
/// or before the start date would be rejected by the table constraint and
/// must fail as caller input instead.
fn check_termination_date(start_date: NaiveDate, termination_date: NaiveDate) -> AppResult<()> {
    if termination_date <= start_date {
        return Err(AppError::UnprocessableEntity(
            "termination_date must be after the lease start date.".to_string(),
        ));
    }
    Ok(())
}

fn append_termination_note(
    existing: Option<&str>,
    reason: &str,
    termination_date: NaiveDate,
) -> String {
    let note = format!("Terminated on {termination_date}: {reason}");
    match existing.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => format!("{text}\n{note}"),
        None => note,
    }
}

/// The successor picks up the day the predecessor ends. `max` guards
/// against degenerate rows where end_date drifted before start_date.
fn renewal_start(predecessor_start: NaiveDate, predecessor_end: NaiveDate) -> NaiveDate {
    predecessor_start.max(predecessor_end)
}

fn renewal_rent(current_rent: f64, override_rent: Option<f64>) -> f64 {
    override_rent.unwrap_or(current_rent)
}

fn renewal_deposit(
    preserve_deposit: bool,
    current_deposit: f64,
    new_deposit: Option<f64>,
) -> f64 {
    if preserve_deposit {
        current_deposit
    } else {
        new_deposit.unwrap_or(0.0)
    }
}

fn fold_stats(
    by_status: Vec<StatusCount>,
    expiring_within_30_days: i64,
    average_active_rent: f64,
    total_monthly_rent: f64,
) -> LeaseStats {
    let total_leases = by_status.iter().map(|entry| entry.count).sum();
    let active_leases = by_status
        .iter()
        .filter(|entry| entry.status == LeaseStatus::Active)
        .map(|entry| entry.count)
        .sum();
    LeaseStats {
        total_leases,
        active_leases,
        expiring_within_30_days,
        by_status,
        average_active_rent,
        total_monthly_rent,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        append_termination_note, check_status_transition, check_termination_date, fold_stats,
        renewal_deposit, renewal_rent, renewal_start,
    };
    use crate::models::{LeaseStatus, StatusCount};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn appends_termination_reason_to_notes() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(
            append_termination_note(None, "tenant relocation", date),
            "Terminated on 2026-03-15: tenant relocation"
        );
        assert_eq!(
            append_termination_note(Some("existing note"), "sold", date),
            "existing note\nTerminated on 2026-03-15: sold"
        );
        assert_eq!(
            append_termination_note(Some("  "), "sold", date),
            "Terminated on 2026-03-15: sold"
        );
    }

    #[test]
    fn termination_date_must_fall_after_lease_start() {
        let start = date(2026, 1, 1);
        assert!(check_termination_date(start, date(2026, 1, 1)).is_err());
        assert!(check_termination_date(start, date(2025, 12, 15)).is_err());
        assert!(check_termination_date(start, date(2026, 1, 2)).is_ok());
    }

    #[test]
    fn renewal_starts_where_the_predecessor_ends() {
        assert_eq!(
            renewal_start(date(2026, 1, 1), date(2027, 1, 1)),
            date(2027, 1, 1)
        );
        // Degenerate row: never start the successor before the predecessor.
        assert_eq!(
            renewal_start(date(2027, 6, 1), date(2027, 1, 1)),
            date(2027, 6, 1)
        );
    }

    #[test]
    fn renewal_rent_carries_over_unless_overridden() {
        assert_eq!(renewal_rent(1000.0, None), 1000.0);
        assert_eq!(renewal_rent(1000.0, Some(1150.0)), 1150.0);
    }

    #[test]
    fn renewal_deposit_prefers_predecessor_when_preserved() {
        assert_eq!(renewal_deposit(true, 1200.0, Some(500.0)), 1200.0);
        assert_eq!(renewal_deposit(false, 1200.0, Some(500.0)), 500.0);
        assert_eq!(renewal_deposit(false, 1200.0, None), 0.0);
    }

    #[test]
    fn status_transitions_follow_the_state_machine() {
        assert!(check_status_transition(LeaseStatus::Active, LeaseStatus::Terminated).is_ok());
        assert!(check_status_transition(LeaseStatus::Active, LeaseStatus::Expired).is_ok());
        assert!(check_status_transition(LeaseStatus::Pending, LeaseStatus::Active).is_ok());
        assert!(check_status_transition(LeaseStatus::Active, LeaseStatus::Renewed).is_err());
        assert!(check_status_transition(LeaseStatus::Active, LeaseStatus::Pending).is_err());
    }

    #[test]
    fn folds_status_counts_into_stats() {
        let stats = fold_stats(
            vec![
                StatusCount {
                    status: LeaseStatus::Active,
                    count: 4,
                },
                StatusCount {
                    status: LeaseStatus::Terminated,
                    count: 2,
                },
                StatusCount {
                    status: LeaseStatus::Renewed,
                    count: 1,
                },
            ],
            3,
            950.0,
            3800.0,
        );
        assert_eq!(stats.total_leases, 7);
        assert_eq!(stats.active_leases, 4);
        assert_eq!(stats.expiring_within_30_days, 3);
        assert_eq!(stats.average_active_rent, 950.0);
        assert_eq!(stats.total_monthly_rent, 3800.0);
    }
}
