//! Version Repository
//!
//! Handles all database operations on `pipeline_instance_versions`.

use serde_json::Value;
use sift_core::domain::instance::PipelineInstanceVersion;
use sqlx::PgPool;
use uuid::Uuid;

/// Append a version to an instance's history
pub async fn create(
    pool: &PgPool,
    instance_id: Uuid,
    config: &Value,
    version_number: i32,
    created_by: &str,
) -> Result<PipelineInstanceVersion, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    sqlx::query(
        r#"
        INSERT INTO pipeline_instance_versions (
            id, instance_id, config, version_number, created_by, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(instance_id)
    .bind(config)
    .bind(version_number)
    .bind(created_by)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(PipelineInstanceVersion {
        id,
        instance_id,
        config: config.clone(),
        version_number,
        created_by: created_by.to_string(),
        created_at: now,
    })
}

/// Highest version number recorded for an instance
pub async fn latest_number(pool: &PgPool, instance_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    let latest: Option<i32> = sqlx::query_scalar(
        "SELECT MAX(version_number) FROM pipeline_instance_versions WHERE instance_id = $1",
    )
    .bind(instance_id)
    .fetch_one(pool)
    .await?;

    Ok(latest)
}

/// List an instance's versions in order
pub async fn list_by_instance(
    pool: &PgPool,
    instance_id: Uuid,
) -> Result<Vec<PipelineInstanceVersion>, sqlx::Error> {
    let rows = sqlx::query_as::<_, VersionRow>(
        r#"
        SELECT id, instance_id, config, version_number, created_by, created_at
        FROM pipeline_instance_versions
        WHERE instance_id = $1
        ORDER BY version_number ASC
        "#,
    )
    .bind(instance_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    instance_id: Uuid,
    config: Value,
    version_number: i32,
    created_by: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<VersionRow> for PipelineInstanceVersion {
    fn from(row: VersionRow) -> Self {
        PipelineInstanceVersion {
            id: row.id,
            instance_id: row.instance_id,
            config: row.config,
            version_number: row.version_number,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}
