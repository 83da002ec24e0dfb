use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{
    BillingType, LeaseStatus, PaymentFrequency, PaymentStatus, PaymentType, UtilityBillStatus,
    UtilityType,
};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

pub fn clamp_limit_in_range(limit: Option<i64>, min: i64, max: i64) -> i64 {
    limit.unwrap_or(max).clamp(min, max)
}

fn default_payment_frequency() -> PaymentFrequency {
    PaymentFrequency::Monthly
}
fn default_billing_type() -> BillingType {
    BillingType::LandlordPays
}
fn default_payment_day() -> i16 {
    1
}
fn default_false() -> bool {
    false
}
fn default_true() -> bool {
    true
}
fn default_currency_usd() -> String {
    "USD".to_string()
}
fn default_method_bank_transfer() -> String {
    "bank_transfer".to_string()
}
fn default_period_month() -> String {
    "month".to_string()
}
fn default_days_ahead() -> i64 {
    30
}

// ── Leases ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct UtilityConfigInput {
    #[serde(default = "default_false")]
    pub included: bool,
    #[serde(default = "default_billing_type")]
    pub billing_type: BillingType,
    pub fixed_amount: Option<f64>,
}

impl Default for UtilityConfigInput {
    fn default() -> Self {
        Self {
            included: false,
            billing_type: BillingType::LandlordPays,
            fixed_amount: None,
        }
    }
}

impl UtilityConfigInput {
    /// A fixed amount must be present exactly when billing is fixed-amount.
    pub fn check(&self, utility: &str) -> Result<(), AppError> {
        match (self.billing_type, self.fixed_amount) {
            (BillingType::FixedAmount, None) => Err(AppError::UnprocessableEntity(format!(
                "{utility}: fixed_amount is required when billing_type is fixed_amount."
            ))),
            (BillingType::FixedAmount, Some(amount)) if amount <= 0.0 => {
                Err(AppError::UnprocessableEntity(format!(
                    "{utility}: fixed_amount must be greater than zero."
                )))
            }
            (billing_type, Some(_)) if billing_type != BillingType::FixedAmount => {
                Err(AppError::UnprocessableEntity(format!(
                    "{utility}: fixed_amount is only allowed when billing_type is fixed_amount."
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateLeaseInput {
    pub organization_id: Uuid,
    pub unit_id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 0.01, message = "rent_amount must be greater than zero"))]
    pub rent_amount: f64,
    #[validate(range(min = 0.0, message = "deposit_amount must not be negative"))]
    #[serde(default)]
    pub deposit_amount: f64,
    #[validate(range(min = 1, max = 31, message = "payment_day must be between 1 and 31"))]
    #[serde(default = "default_payment_day")]
    pub payment_day: i16,
    #[serde(default = "default_payment_frequency")]
    pub payment_frequency: PaymentFrequency,
    #[serde(default)]
    pub water: UtilityConfigInput,
    #[serde(default)]
    pub electricity: UtilityConfigInput,
    #[serde(default)]
    pub gas: UtilityConfigInput,
    #[serde(default)]
    pub internet: UtilityConfigInput,
    pub document_url: Option<String>,
    pub notes: Option<String>,
}

impl CreateLeaseInput {
    /// Cross-field rules that run before any persistence access.
    pub fn check(&self) -> Result<(), AppError> {
        validate_input(self)?;
        if self.start_date >= self.end_date {
            return Err(AppError::UnprocessableEntity(
                "start_date must be before end_date.".to_string(),
            ));
        }
        self.water.check("water")?;
        self.electricity.check("electricity")?;
        self.gas.check("gas")?;
        self.internet.check("internet")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct UpdateLeaseInput {
    pub unit_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub rent_amount: Option<f64>,
    pub deposit_amount: Option<f64>,
    pub status: Option<LeaseStatus>,
    pub payment_day: Option<i16>,
    pub payment_frequency: Option<PaymentFrequency>,
    pub document_url: Option<String>,
    pub notes: Option<String>,
}

impl UpdateLeaseInput {
    pub fn check(&self) -> Result<(), AppError> {
        if let Some(rent) = self.rent_amount {
            if rent <= 0.0 {
                return Err(AppError::UnprocessableEntity(
                    "rent_amount must be greater than zero.".to_string(),
                ));
            }
        }
        if let Some(deposit) = self.deposit_amount {
            if deposit < 0.0 {
                return Err(AppError::UnprocessableEntity(
                    "deposit_amount must not be negative.".to_string(),
                ));
            }
        }
        if let Some(day) = self.payment_day {
            if !(1..=31).contains(&day) {
                return Err(AppError::UnprocessableEntity(
                    "payment_day must be between 1 and 31.".to_string(),
                ));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start >= end {
                return Err(AppError::UnprocessableEntity(
                    "start_date must be before end_date.".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.unit_id.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.rent_amount.is_none()
            && self.deposit_amount.is_none()
            && self.status.is_none()
            && self.payment_day.is_none()
            && self.payment_frequency.is_none()
            && self.document_url.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerminateLeaseInput {
    pub termination_date: NaiveDate,
    pub reason: String,
    pub refund_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewLeaseInput {
    pub new_end_date: NaiveDate,
    pub new_rent_amount: Option<f64>,
    #[serde(default = "default_true")]
    pub preserve_deposit: bool,
    pub new_deposit_amount: Option<f64>,
}

/// Org scope for single-resource routes; every read and write is checked
/// against the caller's membership in this organization.
#[derive(Debug, Clone, Deserialize)]
pub struct OrgScopeQuery {
    pub org_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeasesQuery {
    pub org_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub status: Option<LeaseStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaseStatsQuery {
    pub org_id: Uuid,
    pub property_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpiringLeasesQuery {
    pub org_id: Uuid,
    #[serde(default = "default_days_ahead")]
    pub days_ahead: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeasePath {
    pub lease_id: Uuid,
}

// ── Payments ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreatePaymentInput {
    pub organization_id: Uuid,
    pub property_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub lease_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    #[serde(default = "default_method_bank_transfer")]
    pub method: String,
    #[validate(range(min = 0.01, message = "amount must be greater than zero"))]
    pub amount: f64,
    #[serde(default = "default_currency_usd")]
    pub currency: String,
    pub transaction_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct UpdatePaymentInput {
    pub status: Option<PaymentStatus>,
    pub method: Option<String>,
    pub amount: Option<f64>,
    pub transaction_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
}

impl UpdatePaymentInput {
    pub fn check(&self) -> Result<(), AppError> {
        if let Some(amount) = self.amount {
            if amount <= 0.0 {
                return Err(AppError::UnprocessableEntity(
                    "amount must be greater than zero.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsQuery {
    pub org_id: Uuid,
    pub property_id: Option<Uuid>,
    pub lease_id: Option<Uuid>,
    pub payment_type: Option<PaymentType>,
    pub status: Option<PaymentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentPath {
    pub payment_id: Uuid,
}

// ── Expenses ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateExpenseInput {
    pub organization_id: Uuid,
    pub property_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub category: String,
    #[validate(range(min = 0.01, message = "amount must be greater than zero"))]
    pub amount: f64,
    pub expense_date: NaiveDate,
    pub vendor: Option<String>,
    pub description: Option<String>,
    /// When true, a mirrored reimbursement payment is created in the same
    /// transaction as the expense row.
    #[serde(default = "default_false")]
    pub create_payment: bool,
    #[serde(default = "default_method_bank_transfer")]
    pub payment_method: String,
    #[serde(default = "default_currency_usd")]
    pub currency: String,
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct UpdateExpenseInput {
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub expense_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub description: Option<String>,
}

impl UpdateExpenseInput {
    pub fn check(&self) -> Result<(), AppError> {
        if let Some(amount) = self.amount {
            if amount <= 0.0 {
                return Err(AppError::UnprocessableEntity(
                    "amount must be greater than zero.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpensesQuery {
    pub org_id: Uuid,
    pub property_id: Option<Uuid>,
    pub category: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpensePath {
    pub expense_id: Uuid,
}

// ── Utility bills ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateUtilityBillInput {
    pub organization_id: Uuid,
    pub property_id: Uuid,
    pub unit_id: Uuid,
    pub lease_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub utility_type: UtilityType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(range(min = 0.01, message = "amount must be greater than zero"))]
    pub amount: f64,
    pub meter_start: Option<f64>,
    pub meter_end: Option<f64>,
    pub consumption: Option<f64>,
    pub rate: Option<f64>,
    pub notes: Option<String>,
}

impl CreateUtilityBillInput {
    pub fn check(&self) -> Result<(), AppError> {
        validate_input(self)?;
        if self.period_start > self.period_end {
            return Err(AppError::UnprocessableEntity(
                "period_start must be on or before period_end.".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct UpdateUtilityBillInput {
    pub due_date: Option<NaiveDate>,
    pub amount: Option<f64>,
    pub status: Option<UtilityBillStatus>,
    pub meter_start: Option<f64>,
    pub meter_end: Option<f64>,
    pub consumption: Option<f64>,
    pub rate: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayUtilityBillInput {
    /// Defaults to the bill amount when omitted.
    pub amount: Option<f64>,
    #[serde(default = "default_method_bank_transfer")]
    pub method: String,
    pub reference_id: Option<String>,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UtilityBillsQuery {
    pub org_id: Uuid,
    pub property_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub lease_id: Option<Uuid>,
    pub status: Option<UtilityBillStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UtilityBillPath {
    pub bill_id: Uuid,
}

// ── Reports ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct FinancialSummaryQuery {
    pub org_id: Uuid,
    pub property_id: Uuid,
    #[serde(default = "default_period_month")]
    pub period: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillingType;

    fn lease_input() -> CreateLeaseInput {
        CreateLeaseInput {
            organization_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            rent_amount: 1000.0,
            deposit_amount: 1000.0,
            payment_day: 1,
            payment_frequency: PaymentFrequency::Monthly,
            water: UtilityConfigInput::default(),
            electricity: UtilityConfigInput::default(),
            gas: UtilityConfigInput::default(),
            internet: UtilityConfigInput::default(),
            document_url: None,
            notes: None,
        }
    }

    #[test]
    fn accepts_valid_lease_input() {
        assert!(lease_input().check().is_ok());
    }

    #[test]
    fn rejects_start_after_end() {
        let mut input = lease_input();
        input.end_date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert!(input.check().is_err());
    }

    #[test]
    fn rejects_fixed_amount_billing_without_amount() {
        let mut input = lease_input();
        input.water.billing_type = BillingType::FixedAmount;
        input.water.fixed_amount = None;
        let error = input.check().unwrap_err();
        assert!(error.to_string().contains("fixed_amount is required"));
    }

    #[test]
    fn rejects_fixed_amount_on_non_fixed_billing() {
        let mut input = lease_input();
        input.gas.billing_type = BillingType::Split;
        input.gas.fixed_amount = Some(40.0);
        assert!(input.check().is_err());
    }

    #[test]
    fn accepts_fixed_amount_billing_with_amount() {
        let mut input = lease_input();
        input.internet.billing_type = BillingType::FixedAmount;
        input.internet.fixed_amount = Some(35.0);
        assert!(input.check().is_ok());
    }

    #[test]
    fn rejects_out_of_range_payment_day() {
        let mut input = lease_input();
        input.payment_day = 32;
        assert!(input.check().is_err());
    }

    #[test]
    fn rejects_non_positive_rent() {
        let mut input = lease_input();
        input.rent_amount = 0.0;
        assert!(input.check().is_err());
    }

    #[test]
    fn update_check_rejects_inverted_dates() {
        let patch = UpdateLeaseInput {
            start_date: NaiveDate::from_ymd_opt(2026, 6, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 5, 1),
            ..UpdateLeaseInput::default()
        };
        assert!(patch.check().is_err());
    }

    #[test]
    fn clamps_limits() {
        assert_eq!(clamp_limit_in_range(None, 1, 500), 500);
        assert_eq!(clamp_limit_in_range(Some(10_000), 1, 500), 500);
        assert_eq!(clamp_limit_in_range(Some(-5), 1, 500), 1);
        assert_eq!(clamp_limit_in_range(Some(50), 1, 500), 50);
    }
}
