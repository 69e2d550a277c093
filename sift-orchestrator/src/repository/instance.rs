//! Instance Repository
//!
//! Handles all database operations on `pipeline_instances`.

use serde_json::Value;
use sift_core::domain::instance::PipelineInstance;
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new instance for an organization
pub async fn create(
    pool: &PgPool,
    org_id: &str,
    config: &Value,
) -> Result<PipelineInstance, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    sqlx::query(
        r#"
        INSERT INTO pipeline_instances (id, org_id, config, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(org_id)
    .bind(config)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(PipelineInstance {
        id,
        org_id: org_id.to_string(),
        config: config.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Find every instance of an organization, oldest first
pub async fn find_by_org(pool: &PgPool, org_id: &str) -> Result<Vec<PipelineInstance>, sqlx::Error> {
    let rows = sqlx::query_as::<_, InstanceRow>(
        r#"
        SELECT id, org_id, config, created_at, updated_at
        FROM pipeline_instances
        WHERE org_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(org_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Replace the config of an organization's instance
pub async fn update_config(pool: &PgPool, org_id: &str, config: &Value) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE pipeline_instances
        SET config = $1, updated_at = $2
        WHERE org_id = $3
        "#,
    )
    .bind(config)
    .bind(now)
    .bind(org_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete an instance by ID
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pipeline_instances WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: Uuid,
    org_id: String,
    config: Value,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<InstanceRow> for PipelineInstance {
    fn from(row: InstanceRow) -> Self {
        PipelineInstance {
            id: row.id,
            org_id: row.org_id,
            config: row.config,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
