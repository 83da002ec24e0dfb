use moka::future::Cache;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Roles recognized by the engine. Stored lowercase in
/// `organization_members.role`.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_LANDLORD: &str = "landlord";
pub const ROLE_AGENT: &str = "agent";

#[derive(Debug, Clone)]
pub struct Membership {
    pub role: String,
}

/// Capability checker shared by every service: resolves the caller's
/// membership in an organization and enforces role allow-lists and
/// organization ownership of fetched rows. Constructed once at startup and
/// injected into each component.
#[derive(Clone)]
pub struct OrgGuard {
    pool: PgPool,
    membership_cache: Cache<(Uuid, Uuid), Membership>,
}

impl OrgGuard {
    pub fn new(pool: PgPool, config: &AppConfig) -> Self {
        let membership_cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.org_membership_cache_ttl_seconds))
            .max_capacity(config.org_membership_cache_max_entries)
            .build();
        Self {
            pool,
            membership_cache,
        }
    }

    async fn membership(&self, user_id: Uuid, org_id: Uuid) -> AppResult<Option<Membership>> {
        if let Some(cached) = self.membership_cache.get(&(user_id, org_id)).await {
            return Ok(Some(cached));
        }

        let row = sqlx::query(
            "SELECT role FROM organization_members
             WHERE organization_id = $1 AND user_id = $2
             LIMIT 1",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Membership"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let membership = Membership {
            role: row
                .try_get::<String, _>("role")
                .unwrap_or_else(|_| "unknown".to_string()),
        };
        self.membership_cache
            .insert((user_id, org_id), membership.clone())
            .await;
        Ok(Some(membership))
    }

    pub async fn require_member(&self, user_id: Uuid, org_id: Uuid) -> AppResult<Membership> {
        self.membership(user_id, org_id).await?.ok_or_else(|| {
            AppError::Forbidden("Forbidden: not a member of this organization.".to_string())
        })
    }

    pub async fn require_role(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        allowed_roles: &[&str],
    ) -> AppResult<Membership> {
        let membership = self.require_member(user_id, org_id).await?;
        if role_allowed(&membership.role, allowed_roles) {
            return Ok(membership);
        }
        Err(AppError::Forbidden(format!(
            "Forbidden: role '{}' is not allowed for this action.",
            membership.role
        )))
    }
}

/// Row-level tenancy check, applied after a row is fetched and before its
/// data is returned or mutated. Deliberately does not reveal whether the
/// resource exists in another organization.
pub fn require_org_match(resource_org_id: Uuid, caller_org_id: Uuid) -> AppResult<()> {
    if resource_org_id == caller_org_id {
        return Ok(());
    }
    Err(AppError::Forbidden("Not permitted.".to_string()))
}

fn role_allowed(role: &str, allowed_roles: &[&str]) -> bool {
    allowed_roles
        .iter()
        .any(|allowed| role.eq_ignore_ascii_case(allowed))
}

#[cfg(test)]
mod tests {
    use super::{require_org_match, role_allowed, ROLE_ADMIN, ROLE_AGENT, ROLE_LANDLORD};
    use uuid::Uuid;

    #[test]
    fn matches_roles_case_insensitively() {
        assert!(role_allowed("admin", &[ROLE_ADMIN, ROLE_LANDLORD]));
        assert!(role_allowed("ADMIN", &[ROLE_ADMIN]));
        assert!(!role_allowed("agent", &[ROLE_ADMIN, ROLE_LANDLORD]));
        assert!(role_allowed("agent", &[ROLE_AGENT]));
        assert!(!role_allowed("viewer", &[ROLE_ADMIN, ROLE_LANDLORD, ROLE_AGENT]));
    }

    #[test]
    fn org_match_does_not_reveal_existence() {
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        assert!(require_org_match(org_a, org_a).is_ok());
        let error = require_org_match(org_a, org_b).unwrap_err();
        assert_eq!(error.to_string(), "Not permitted.");
    }
}
