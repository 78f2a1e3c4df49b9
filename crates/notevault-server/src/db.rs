//! Database connection, migrations and first-run seeding.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::error::AppError;

/// Creates a database connection pool.
///
/// # Arguments
/// * `database_url` - PostgreSQL connection string
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Runs all pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Creates the first admin account when the admins table is empty.
///
/// Returns `true` when an admin was inserted.
pub async fn seed_admin(pool: &PgPool, username: &str, password: &str) -> Result<bool, AppError> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM admins LIMIT 1")
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(false);
    }

    let username = username.trim().to_lowercase();
    let password_hash = hash_password(password)?;

    sqlx::query(
        r#"
        INSERT INTO admins (id, username, email, password_hash, created_at)
        VALUES ($1, $2, $2, $3, NOW())
        ON CONFLICT (username) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&username)
    .bind(&password_hash)
    .execute(pool)
    .await?;

    tracing::info!(username = %username, "Admin user initialized");
    Ok(true)
}
