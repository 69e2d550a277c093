use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Organizations and members belong to the dashboard schema; they are
    // created here only so a standalone deployment has something to read.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            name TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pipeline instances table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_instances (
            id UUID PRIMARY KEY,
            org_id TEXT NOT NULL,
            config JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create version history table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_instance_versions (
            id UUID PRIMARY KEY,
            instance_id UUID NOT NULL REFERENCES pipeline_instances(id) ON DELETE CASCADE,
            config JSONB NOT NULL,
            version_number INTEGER NOT NULL,
            created_by TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (instance_id, version_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Not unique: duplicate instances from racing creators are tolerated
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_instances_org_id ON pipeline_instances(org_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_members_org_id ON members(org_id, created_at)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
