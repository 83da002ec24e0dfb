use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Expense;
use crate::schemas::{clamp_limit_in_range, CreateExpenseInput, ExpensesQuery, UpdateExpenseInput};
use crate::tenancy::{require_org_match, OrgGuard};

const EXPENSE_COLUMNS: &str = "id, organization_id, property_id, unit_id, category, amount, \
     expense_date, vendor, description, payment_id, recorded_by, created_at";

/// Organization-scoped CRUD over expenses, with the optional mirrored
/// reimbursement payment created in the same transaction as the expense.
#[derive(Clone)]
pub struct ExpensesService {
    pool: PgPool,
    guard: OrgGuard,
}

impl ExpensesService {
    pub fn new(pool: PgPool, guard: OrgGuard) -> Self {
        Self { pool, guard }
    }

    pub async fn create(&self, caller: Uuid, input: &CreateExpenseInput) -> AppResult<Expense> {
        crate::schemas::validate_input(input)?;
        self.guard
            .require_member(caller, input.organization_id)
            .await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::from_sqlx(error, "Expense"))?;

        // The mirrored payment and the expense row share one transaction:
        // neither persists without the other.
        let payment_id: Option<Uuid> = if input.create_payment {
            let id: Uuid = sqlx::query_scalar(
                "INSERT INTO payments (
                    organization_id, property_id, unit_id,
                    payment_type, status, method, amount, currency,
                    transaction_date, notes, recorded_by
                 ) VALUES ($1, $2, $3, 'expense_reimbursement', 'successful', $4, $5, $6, $7, $8, $9)
                 RETURNING id",
            )
            .bind(input.organization_id)
            .bind(input.property_id)
            .bind(input.unit_id)
            .bind(&input.payment_method)
            .bind(input.amount)
            .bind(&input.currency)
            .bind(input.expense_date)
            .bind(format!("Reimbursement for expense: {}", input.category))
            .bind(caller)
            .fetch_one(&mut *tx)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Payment"))?;
            Some(id)
        } else {
            None
        };

        let expense = sqlx::query_as::<_, Expense>(&format!(
            "INSERT INTO expenses (
                organization_id, property_id, unit_id, category, amount,
                expense_date, vendor, description, payment_id, recorded_by
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {EXPENSE_COLUMNS}"
        ))
        .bind(input.organization_id)
        .bind(input.property_id)
        .bind(input.unit_id)
        .bind(&input.category)
        .bind(input.amount)
        .bind(input.expense_date)
        .bind(&input.vendor)
        .bind(&input.description)
        .bind(payment_id)
        .bind(caller)
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Expense"))?;

        tx.commit()
            .await
            .map_err(|error| AppError::from_sqlx(error, "Expense"))?;
        Ok(expense)
    }

    pub async fn get(&self, caller: Uuid, expense_id: Uuid, org_id: Uuid) -> AppResult<Expense> {
        self.guard.require_member(caller, org_id).await?;
        let expense = fetch_expense(&self.pool, expense_id).await?;
        require_org_match(expense.organization_id, org_id)?;
        Ok(expense)
    }

    pub async fn list(&self, caller: Uuid, query: &ExpensesQuery) -> AppResult<Vec<Expense>> {
        self.guard.require_member(caller, query.org_id).await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE organization_id = "
        ));
        builder.push_bind(query.org_id);
        if let Some(property_id) = query.property_id {
            builder.push(" AND property_id = ").push_bind(property_id);
        }
        if let Some(category) = &query.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(from_date) = query.from_date {
            builder.push(" AND expense_date >= ").push_bind(from_date);
        }
        if let Some(to_date) = query.to_date {
            builder.push(" AND expense_date <= ").push_bind(to_date);
        }
        builder.push(" ORDER BY expense_date DESC LIMIT ");
        builder.push_bind(clamp_limit_in_range(query.limit, 1, 1000));

        builder
            .build_query_as::<Expense>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Expense"))
    }

    pub async fn update(
        &self,
        caller: Uuid,
        expense_id: Uuid,
        org_id: Uuid,
        patch: &UpdateExpenseInput,
    ) -> AppResult<Expense> {
        patch.check()?;
        self.guard.require_member(caller, org_id).await?;
        let expense = fetch_expense(&self.pool, expense_id).await?;
        require_org_match(expense.organization_id, org_id)?;

        let mut builder =
            QueryBuilder::<Postgres>::new("UPDATE expenses SET organization_id = organization_id");
        if let Some(value) = &patch.category {
            builder.push(", category = ").push_bind(value.clone());
        }
        if let Some(value) = patch.amount {
            builder.push(", amount = ").push_bind(value);
        }
        if let Some(value) = patch.expense_date {
            builder.push(", expense_date = ").push_bind(value);
        }
        if let Some(value) = &patch.vendor {
            builder.push(", vendor = ").push_bind(value.clone());
        }
        if let Some(value) = &patch.description {
            builder.push(", description = ").push_bind(value.clone());
        }
        builder.push(" WHERE id = ").push_bind(expense_id);
        builder.push(format!(" RETURNING {EXPENSE_COLUMNS}"));

        builder
            .build_query_as::<Expense>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Expense"))
    }

    /// Delete the expense and, when one was mirrored, its linked payment in
    /// the same transaction.
    pub async fn delete(&self, caller: Uuid, expense_id: Uuid, org_id: Uuid) -> AppResult<()> {
        self.guard.require_member(caller, org_id).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::from_sqlx(error, "Expense"))?;

        let expense = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 FOR UPDATE"
        ))
        .bind(expense_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Expense"))?;
        require_org_match(expense.organization_id, org_id)?;

        sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(expense_id)
            .execute(&mut *tx)
            .await
            .map_err(|error| AppError::from_sqlx(error, "Expense"))?;

        if let Some(payment_id) = expense.payment_id {
            sqlx::query("DELETE FROM payments WHERE id = $1")
                .bind(payment_id)
                .execute(&mut *tx)
                .await
                .map_err(|error| AppError::from_sqlx(error, "Payment"))?;
        }

        tx.commit()
            .await
            .map_err(|error| AppError::from_sqlx(error, "Expense"))?;
        Ok(())
    }

    /// Expense feed for the financial summary: sum of amounts over the
    /// window for a property.
    pub async fn property_expenses(
        &self,
        property_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        org_id: Uuid,
    ) -> AppResult<f64> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)
             FROM expenses
             WHERE organization_id = $1 AND property_id = $2
               AND expense_date >= $3 AND expense_date <= $4",
        )
        .bind(org_id)
        .bind(property_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Expense"))
    }
}

async fn fetch_expense(pool: &PgPool, expense_id: Uuid) -> AppResult<Expense> {
    sqlx::query_as::<_, Expense>(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1"
    ))
    .bind(expense_id)
    .fetch_one(pool)
    .await
    .map_err(|error| AppError::from_sqlx(error, "Expense"))
}
