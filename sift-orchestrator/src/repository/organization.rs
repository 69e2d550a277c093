//! Organization Repository
//!
//! Read-only lookups into the dashboard's organization tables.

use sqlx::PgPool;

/// Check whether an organization exists
pub async fn exists(pool: &PgPool, org_id: &str) -> Result<bool, sqlx::Error> {
    let found: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM organizations WHERE id = $1)")
            .bind(org_id)
            .fetch_one(pool)
            .await?;

    Ok(found)
}

/// First member to join the organization, taken as its owner
pub async fn first_member(pool: &PgPool, org_id: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT id
        FROM members
        WHERE org_id = $1
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .bind(org_id)
    .fetch_optional(pool)
    .await
}
