use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Lease, LeaseStats};
use crate::repository::leases::LeaseRepository;
use crate::schemas::{
    CreateLeaseInput, LeasesQuery, RenewLeaseInput, TerminateLeaseInput, UpdateLeaseInput,
};
use crate::services::documents;
use crate::tenancy::{OrgGuard, ROLE_ADMIN, ROLE_AGENT, ROLE_LANDLORD};

const LEASE_EDIT_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_LANDLORD, ROLE_AGENT];
const LEASE_TERMINATE_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_LANDLORD];
const LEASE_RENEW_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_LANDLORD, ROLE_AGENT];
const LEASE_DELETE_ROLES: &[&str] = &[ROLE_ADMIN];

/// Lease lifecycle entry point. Role checks live here; the repository
/// handles the transactional state machine.
#[derive(Clone)]
pub struct LeaseService {
    pool: PgPool,
    repo: LeaseRepository,
    guard: OrgGuard,
}

impl LeaseService {
    pub fn new(pool: PgPool, guard: OrgGuard) -> Self {
        let repo = LeaseRepository::new(pool.clone());
        Self { pool, repo, guard }
    }

    pub async fn create(&self, caller: Uuid, input: &CreateLeaseInput) -> AppResult<Lease> {
        input.check()?;
        self.guard
            .require_role(caller, input.organization_id, LEASE_EDIT_ROLES)
            .await?;
        let lease = self.repo.create(input, caller).await?;
        Ok(self.attach_document(lease).await)
    }

    pub async fn get(&self, caller: Uuid, lease_id: Uuid, org_id: Uuid) -> AppResult<Lease> {
        self.guard.require_member(caller, org_id).await?;
        self.repo.get(lease_id, org_id).await
    }

    pub async fn list(&self, caller: Uuid, query: &LeasesQuery) -> AppResult<Vec<Lease>> {
        self.guard.require_member(caller, query.org_id).await?;
        self.repo.list(query).await
    }

    pub async fn update(
        &self,
        caller: Uuid,
        lease_id: Uuid,
        org_id: Uuid,
        patch: &UpdateLeaseInput,
    ) -> AppResult<Lease> {
        self.guard
            .require_role(caller, org_id, LEASE_EDIT_ROLES)
            .await?;
        self.repo.update(lease_id, org_id, patch).await
    }

    pub async fn terminate(
        &self,
        caller: Uuid,
        lease_id: Uuid,
        org_id: Uuid,
        input: &TerminateLeaseInput,
    ) -> AppResult<Lease> {
        self.guard
            .require_role(caller, org_id, LEASE_TERMINATE_ROLES)
            .await?;
        self.repo.terminate(lease_id, org_id, input, caller).await
    }

    pub async fn renew(
        &self,
        caller: Uuid,
        lease_id: Uuid,
        org_id: Uuid,
        input: &RenewLeaseInput,
    ) -> AppResult<Lease> {
        self.guard
            .require_role(caller, org_id, LEASE_RENEW_ROLES)
            .await?;
        let lease = self.repo.renew(lease_id, org_id, input, caller).await?;
        Ok(self.attach_document(lease).await)
    }

    pub async fn delete(&self, caller: Uuid, lease_id: Uuid, org_id: Uuid) -> AppResult<()> {
        self.guard
            .require_role(caller, org_id, LEASE_DELETE_ROLES)
            .await?;
        self.repo.delete(lease_id, org_id).await
    }

    pub async fn stats(
        &self,
        caller: Uuid,
        org_id: Uuid,
        property_id: Option<Uuid>,
    ) -> AppResult<LeaseStats> {
        self.guard.require_member(caller, org_id).await?;
        self.repo.lease_stats(org_id, property_id).await
    }

    pub async fn find_expiring(
        &self,
        caller: Uuid,
        org_id: Uuid,
        days_ahead: i64,
    ) -> AppResult<Vec<Lease>> {
        self.guard.require_member(caller, org_id).await?;
        self.repo.find_expiring(org_id, days_ahead).await
    }

    /// Document generation is best effort; the lease is already committed
    /// and a failure here must not surface as a request error.
    async fn attach_document(&self, mut lease: Lease) -> Lease {
        match documents::generate_lease_document(&self.pool, &lease).await {
            Ok(document_url) => lease.document_url = Some(document_url),
            Err(error) => {
                tracing::warn!(lease_id = %lease.id, %error, "lease document generation failed");
            }
        }
        lease
    }
}
