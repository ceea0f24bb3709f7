mod common;

use std::io::Write;

use moneywise_db::config::DbConfig;
use moneywise_db::error::ProbeError;
use moneywise_db::probe::{self, ConnectivityProbe, PoolStats, FAILURE_BANNER, SUCCESS_BANNER};

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("expected {needle:?} in output:\n{haystack}"))
}

// ── Pure helpers ────────────────────────────────────────────────

#[test]
fn version_is_truncated_to_two_tokens() {
    let full = "PostgreSQL 16.2 (Debian 16.2-1.pgdg120+2) on x86_64-pc-linux-gnu, compiled by gcc";
    assert_eq!(probe::short_version(full), "PostgreSQL 16.2");
    assert_eq!(probe::short_version("  PostgreSQL\t15.4  "), "PostgreSQL 15.4");
    assert_eq!(probe::short_version("PostgreSQL"), "PostgreSQL");
    assert_eq!(probe::short_version(""), "");
}

#[test]
fn in_use_never_exceeds_total() {
    let stats = PoolStats { total: 3, idle: 1, waiting: 0 };
    assert_eq!(stats.in_use(), 2);
    assert!(stats.idle + stats.in_use() <= stats.total as usize);

    let racing = PoolStats { total: 1, idle: 2, waiting: 0 };
    assert_eq!(racing.in_use(), 0);
}

// ── Failure path ────────────────────────────────────────────────

#[tokio::test]
async fn lazy_pool_opens_nothing() {
    let probe = ConnectivityProbe::new(&common::unreachable_config());

    assert_eq!(probe.stats(), PoolStats { total: 0, idle: 0, waiting: 0 });
    assert!(!probe.pool().is_closed());

    probe.shutdown().await.unwrap();
}

#[tokio::test]
async fn unreachable_host_reports_failure_without_querying() {
    let config = common::unreachable_config();
    let probe = ConnectivityProbe::new(&config);
    let mut out = Vec::new();

    let err = probe::run_with(&probe, &config, &mut out).await.unwrap_err();
    let output = String::from_utf8(out).unwrap();
    assert!(probe.pool().is_closed());
    assert_eq!(probe.stats().waiting, 0);

    let summary = position(&output, "Database configuration:");
    let step_one = position(&output, "1. Acquiring connection");
    let banner = position(&output, FAILURE_BANNER);
    assert!(summary < step_one && step_one < banner);

    assert!(!output.contains("2. Connected"));
    assert!(!output.contains(SUCCESS_BANNER));
    assert!(output.contains("  message: "));
    assert!(output.contains("  code: "));
    assert!(output.contains("  detail: "));
    assert!(!output.contains("not-a-real-password"));

    assert!(matches!(err, ProbeError::Database(_)));
    assert!(err.code().is_some());
}

#[tokio::test]
async fn unreachable_host_via_run_returns_error() {
    let mut out = Vec::new();

    let err = probe::run(&common::unreachable_config(), &mut out).await.unwrap_err();
    assert!(matches!(err, ProbeError::Database(_)));
    assert!(String::from_utf8(out).unwrap().contains(FAILURE_BANNER));
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn unwritable_output_still_closes_pool() {
    let config = common::unreachable_config();
    let probe = ConnectivityProbe::new(&config);

    let err = probe::run_with(&probe, &config, &mut BrokenPipe).await.unwrap_err();
    assert!(matches!(err, ProbeError::Output(_)));
    assert!(probe.pool().is_closed());
}

#[tokio::test]
async fn failed_acquire_still_allows_clean_shutdown() {
    let probe = ConnectivityProbe::new(&common::unreachable_config());

    assert!(probe.acquire().await.is_err());
    assert_eq!(probe.stats().waiting, 0);

    probe.shutdown().await.unwrap();
    assert!(probe.pool().is_closed());

    // Second shutdown is a no-op.
    probe.shutdown().await.unwrap();
    assert!(probe.pool().is_closed());
}

// ── Success path ────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires PostgreSQL reachable via the DB_* variables"]
async fn reachable_database_reports_in_order() {
    let _ = dotenvy::dotenv();
    let config = DbConfig::from_env().unwrap();
    let probe = ConnectivityProbe::new(&config);
    let mut out = Vec::new();

    let report = probe::run_with(&probe, &config, &mut out).await.unwrap();
    let output = String::from_utf8(out).unwrap();
    assert!(probe.pool().is_closed());
    probe.shutdown().await.unwrap();

    let markers = [
        "Database configuration:",
        "1. Acquiring connection",
        "2. Connected",
        "3. Server time: ",
        "4. Server version: ",
        "5. Pool stats: ",
        SUCCESS_BANNER,
    ];
    let positions: Vec<usize> = markers.iter().map(|m| position(&output, m)).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "out of order:\n{output}");
    assert!(!output.contains(FAILURE_BANNER));

    assert_eq!(report.short_version().split_whitespace().count(), 2);
    assert!(report.stats.total >= 1);
    assert!(report.stats.idle + report.stats.in_use() <= report.stats.total as usize);
    assert_eq!(report.stats.waiting, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL reachable via the DB_* variables"]
async fn shutdown_after_successful_check_is_idempotent() {
    let _ = dotenvy::dotenv();
    let config = DbConfig::from_env().unwrap();
    let probe = ConnectivityProbe::new(&config);

    {
        let _conn = probe.acquire().await.unwrap();
        assert!(probe.stats().in_use() >= 1);
    }

    probe.shutdown().await.unwrap();
    probe.shutdown().await.unwrap();
    assert!(probe.pool().is_closed());
}
