use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

use crate::auth::password::hash_password;
use crate::config::Config;
use crate::model::role::Role;

/// One long-lived pool shared by every handler; schema migrations run before
/// the server accepts traffic.
pub async fn init_db(config: &Config) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    seed_super_admin(&pool, config).await?;

    Ok(pool)
}

/// Creates the first SUPER_ADMIN from `SUPER_ADMIN_EMAIL`/`SUPER_ADMIN_PASSWORD`
/// when no user exists yet.
async fn seed_super_admin(pool: &MySqlPool, config: &Config) -> Result<()> {
    let (Some(email), Some(password)) = (&config.super_admin_email, &config.super_admin_password)
    else {
        return Ok(());
    };

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if users > 0 {
        return Ok(());
    }

    let hashed = hash_password(password).map_err(|e| anyhow::anyhow!("hashing failed: {e}"))?;

    sqlx::query(
        r#"
        INSERT INTO users (email, password, full_name, role_id)
        VALUES (?, ?, 'Super Admin', ?)
        "#,
    )
    .bind(email.trim().to_lowercase())
    .bind(hashed)
    .bind(Role::SuperAdmin.id())
    .execute(pool)
    .await
    .context("Failed to seed super admin")?;

    info!(email = %email, "Seeded initial SUPER_ADMIN account");
    Ok(())
}
