use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use moneywise_db::config::DbConfig;
use moneywise_db::models::CreateUserData;
use moneywise_db::redact::Redacted;

/// A dedicated, migrated database for one test.
#[allow(dead_code)]
pub struct TestDb {
    pub pool: PgPool,
    pub db_name: String,
}

/// Points at a port nothing listens on, with a short acquire timeout.
#[allow(dead_code)]
pub fn unreachable_config() -> DbConfig {
    DbConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        database: "moneywise".to_string(),
        user: "postgres".to_string(),
        password: Redacted::new("not-a-real-password".to_string()),
        max_connections: 2,
        min_connections: 0,
        idle_timeout: Duration::from_millis(1_000),
        connection_timeout: Duration::from_millis(500),
        ssl: false,
    }
}

#[allow(dead_code)]
pub fn sample_user(email: &str) -> CreateUserData {
    CreateUserData {
        email: email.to_string(),
        name: "Sample".to_string(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        email_verification_token: None,
    }
}

fn admin_url(base_url: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.to_string())
}

/// Create a fresh database with the schema applied.
#[allow(dead_code)]
pub async fn spawn_db() -> TestDb {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let db_name = format!("moneywise_test_{}", Uuid::now_v7().simple());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    moneywise_db::db::migrate(&pool)
        .await
        .expect("Failed to run migrations on test database");

    TestDb { pool, db_name }
}

/// Drop the test database.
#[allow(dead_code)]
pub async fn cleanup(db: TestDb) {
    db.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!(
        "DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)",
        db.db_name
    ))
    .execute(&admin_pool)
    .await;

    admin_pool.close().await;
}
