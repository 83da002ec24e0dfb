use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Lease;

/// Record a generated lease agreement and point the lease at it. Callers
/// treat failure as non-fatal; the lease itself is already committed.
pub async fn generate_lease_document(pool: &PgPool, lease: &Lease) -> AppResult<String> {
    let document_id = Uuid::new_v4();
    let document_url = format!("/documents/leases/{document_id}.pdf");

    let mut tx = pool
        .begin()
        .await
        .map_err(|error| AppError::from_sqlx(error, "Lease document"))?;

    sqlx::query(
        "INSERT INTO lease_documents (id, organization_id, lease_id, document_url)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(document_id)
    .bind(lease.organization_id)
    .bind(lease.id)
    .bind(&document_url)
    .execute(&mut *tx)
    .await
    .map_err(|error| AppError::from_sqlx(error, "Lease document"))?;

    sqlx::query("UPDATE leases SET document_url = $2, updated_at = NOW() WHERE id = $1")
        .bind(lease.id)
        .bind(&document_url)
        .execute(&mut *tx)
        .await
        .map_err(|error| AppError::from_sqlx(error, "Lease"))?;

    tx.commit()
        .await
        .map_err(|error| AppError::from_sqlx(error, "Lease document"))?;
    Ok(document_url)
}
