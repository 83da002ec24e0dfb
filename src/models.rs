use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Occupancy state of a unit. Derived state: flipped only by lease
/// repository transitions, never written directly by a CRUD call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Vacant,
    Occupied,
    NoticeGiven,
    UnderMaintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lease_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    Active,
    Pending,
    Expired,
    Terminated,
    Renewed,
}

impl LeaseStatus {
    /// Terminal statuses are never re-activated by this engine.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Terminated | Self::Renewed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
            Self::Renewed => "renewed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_frequency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    Monthly,
    Quarterly,
    Annually,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "utility_billing_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    LandlordPays,
    TenantPays,
    Split,
    FixedAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Rent,
    Deposit,
    LateFee,
    Utility,
    Maintenance,
    ManagementFee,
    OtherIncome,
    OwnerPayout,
    ExpenseReimbursement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
    Refunded,
    PartiallyRefunded,
    Disputed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "utility_bill_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UtilityBillStatus {
    Due,
    Paid,
    Overdue,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "utility_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UtilityType {
    Water,
    Electricity,
    Gas,
    Internet,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub status: UnitStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Lease {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub unit_id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rent_amount: f64,
    pub deposit_amount: f64,
    pub status: LeaseStatus,
    pub payment_day: i16,
    pub payment_frequency: PaymentFrequency,
    pub water_included: bool,
    pub water_billing_type: BillingType,
    pub water_fixed_amount: Option<f64>,
    pub electricity_included: bool,
    pub electricity_billing_type: BillingType,
    pub electricity_fixed_amount: Option<f64>,
    pub gas_included: bool,
    pub gas_billing_type: BillingType,
    pub gas_fixed_amount: Option<f64>,
    pub internet_included: bool,
    pub internet_billing_type: BillingType,
    pub internet_fixed_amount: Option<f64>,
    pub document_url: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub renewed_from_lease_id: Option<Uuid>,
    pub renewed_to_lease_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub property_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub lease_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub method: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub property_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub category: String,
    pub amount: f64,
    pub expense_date: NaiveDate,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub payment_id: Option<Uuid>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UtilityBill {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub property_id: Uuid,
    pub unit_id: Uuid,
    pub lease_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub utility_type: UtilityType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub due_date: NaiveDate,
    pub amount: f64,
    pub status: UtilityBillStatus,
    pub meter_start: Option<f64>,
    pub meter_end: Option<f64>,
    pub consumption: Option<f64>,
    pub rate: Option<f64>,
    pub payment_id: Option<Uuid>,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Aggregate lease counts for a dashboard; computed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct LeaseStats {
    pub total_leases: i64,
    pub active_leases: i64,
    pub expiring_within_30_days: i64,
    pub by_status: Vec<StatusCount>,
    pub average_active_rent: f64,
    pub total_monthly_rent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: LeaseStatus,
    pub count: i64,
}

/// Period-bounded financial projection. Recomputed on every request,
/// never persisted or cached.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialSummary {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub income: f64,
    pub expenses: f64,
    pub net_income: f64,
    pub rent_collection_rate: f64,
    pub occupancy_rate: f64,
    pub occupied_units: i64,
    pub total_units: i64,
}

#[cfg(test)]
mod tests {
    use super::LeaseStatus;

    #[test]
    fn terminal_statuses() {
        assert!(LeaseStatus::Expired.is_terminal());
        assert!(LeaseStatus::Terminated.is_terminal());
        assert!(LeaseStatus::Renewed.is_terminal());
        assert!(!LeaseStatus::Active.is_terminal());
        assert!(!LeaseStatus::Pending.is_terminal());
    }
}
