//! End-to-end connectivity check against the configured database.
//!
//! The probe builds a lazy pool, acquires a single connection, runs one
//! read-only query and reports what it saw. The pool is closed before the
//! probe returns, whichever way it went.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};

use crate::config::DbConfig;
use crate::error::ProbeError;

pub const DIAGNOSTIC_QUERY: &str = "SELECT NOW() AS current_time, version() AS pg_version";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const SUCCESS_BANNER: &str = "=== Database connection test PASSED ===";
pub const FAILURE_BANNER: &str = "=== Database connection test FAILED ===";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently owned by the pool, idle or checked out.
    pub total: u32,
    pub idle: usize,
    /// Acquisitions still waiting for a connection.
    pub waiting: usize,
}

impl PoolStats {
    pub fn in_use(&self) -> usize {
        (self.total as usize).saturating_sub(self.idle)
    }
}

#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub server_time: DateTime<Utc>,
    pub version: String,
    pub stats: PoolStats,
}

impl ProbeReport {
    pub fn short_version(&self) -> String {
        short_version(&self.version)
    }
}

/// First two whitespace-separated tokens, e.g. `"PostgreSQL 16.2"`.
pub fn short_version(version: &str) -> String {
    version.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

pub struct ConnectivityProbe {
    pool: PgPool,
    waiting: Arc<AtomicUsize>,
}

struct WaitingGuard(Arc<AtomicUsize>);

impl WaitingGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        WaitingGuard(Arc::clone(counter))
    }
}

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConnectivityProbe {
    /// Build the pool without opening any connection.
    pub fn new(config: &DbConfig) -> Self {
        let pool = config
            .pool_options()
            .connect_lazy_with(config.connect_options());

        ConnectivityProbe {
            pool,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check out one connection, waiting at most the configured acquire
    /// timeout. The connection goes back to the pool when dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, sqlx::Error> {
        let _waiting = WaitingGuard::enter(&self.waiting);
        self.pool.acquire().await
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.pool.size(),
            idle: self.pool.num_idle(),
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }

    /// Close the pool and wait for every connection to shut down. Safe to
    /// call more than once.
    pub async fn shutdown(&self) -> Result<(), ProbeError> {
        tokio::time::timeout(SHUTDOWN_TIMEOUT, self.pool.close())
            .await
            .map_err(|_| ProbeError::ShutdownTimedOut)
    }
}

async fn query_server_info(conn: &mut PgConnection) -> Result<(DateTime<Utc>, String), sqlx::Error> {
    sqlx::query_as::<_, (DateTime<Utc>, String)>(DIAGNOSTIC_QUERY)
        .fetch_one(conn)
        .await
}

/// Run the full probe, writing the operator report to `out`.
pub async fn run<W: Write>(config: &DbConfig, out: &mut W) -> Result<ProbeReport, ProbeError> {
    let probe = ConnectivityProbe::new(config);
    run_with(&probe, config, out).await
}

/// Same as [`run`] against a caller-built probe. Its pool is closed by the
/// time this returns, on success and failure alike.
pub async fn run_with<W: Write>(
    probe: &ConnectivityProbe,
    config: &DbConfig,
    out: &mut W,
) -> Result<ProbeReport, ProbeError> {
    if let Err(err) = writeln!(out, "{config}").and_then(|()| writeln!(out)) {
        if let Err(shutdown_err) = probe.shutdown().await {
            tracing::debug!("Suppressed pool shutdown error after output failure: {shutdown_err}");
        }
        return Err(err.into());
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "Probing database connectivity"
    );

    let outcome = match check(probe, out).await {
        Ok(report) => probe.shutdown().await.map(|()| report),
        Err(err) => {
            if let Err(shutdown_err) = probe.shutdown().await {
                tracing::debug!("Suppressed pool shutdown error after probe failure: {shutdown_err}");
            }
            Err(err)
        }
    };

    match &outcome {
        Ok(report) => {
            tracing::info!(version = %report.short_version(), "Database connectivity verified");
            writeln!(out)?;
            writeln!(out, "{SUCCESS_BANNER}")?;
        }
        Err(err) => {
            tracing::error!("Database connectivity check failed: {err}");
            if let Err(write_err) = write_failure(out, err) {
                tracing::debug!("Failed to write failure report: {write_err}");
            }
        }
    }

    outcome
}

async fn check<W: Write>(probe: &ConnectivityProbe, out: &mut W) -> Result<ProbeReport, ProbeError> {
    writeln!(out, "1. Acquiring connection from pool...")?;
    let mut conn = probe.acquire().await?;
    tracing::debug!("Connection acquired");

    writeln!(out, "2. Connected. Running diagnostic query...")?;
    let (server_time, version) = query_server_info(&mut conn).await?;

    let report = ProbeReport {
        server_time,
        version,
        stats: probe.stats(),
    };

    writeln!(out, "3. Server time: {}", report.server_time.to_rfc3339())?;
    writeln!(out, "4. Server version: {}", report.short_version())?;
    writeln!(
        out,
        "5. Pool stats: total={} idle={} waiting={}",
        report.stats.total, report.stats.idle, report.stats.waiting
    )?;

    Ok(report)
}

fn write_failure<W: Write>(out: &mut W, err: &ProbeError) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{FAILURE_BANNER}")?;
    writeln!(out, "  message: {err}")?;
    writeln!(out, "  code: {}", err.code().as_deref().unwrap_or("-"))?;
    writeln!(out, "  detail: {}", err.detail().as_deref().unwrap_or("-"))?;
    writeln!(out, "  error: {err:#?}")
}
