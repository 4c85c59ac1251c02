//! Runs the real session against a server named by `DOCDB_CONNECTION_STRING`.
//!
//! Ignored by default; run with
//! `DOCDB_CONNECTION_STRING=mongodb://... cargo test -p docdb-session -- --ignored`.
//! The transport mode comes from `DOCDB_TEST_TLS` (`disabled`, `insecure` or
//! `strict`) and defaults to `disabled` for a local server.

use docdb_session::{ErrorKind, MongoConnector, SessionConfig, SessionRunner, TransportSecurity};

fn live_config() -> Option<SessionConfig> {
    let transport = std::env::var("DOCDB_TEST_TLS")
        .ok()
        .and_then(|mode| mode.parse().ok())
        .unwrap_or(TransportSecurity::Disabled);
    SessionConfig::from_env(transport).ok()
}

#[tokio::test]
#[ignore = "needs a reachable MongoDB-compatible server"]
async fn test_live_session_twice() {
    let Some(config) = live_config()
    else {
        return;
    };
    let runner = SessionRunner::new(MongoConnector, config);

    for _ in 0..2 {
        let report = runner.run(&()).await.unwrap();
        assert!(report.inserted_id.is_some());
        assert_eq!(report.modified_count, 1);
        assert_eq!(report.deleted_count, 1);
    }
}

#[tokio::test]
#[ignore = "opens a TCP connection to a closed local port"]
async fn test_unreachable_server_fails_within_timeout() {
    let config = SessionConfig::new(
        "mongodb://127.0.0.1:9/?directConnection=true",
        TransportSecurity::Disabled,
    )
    .with_timeout(std::time::Duration::from_secs(2));
    let runner = SessionRunner::new(MongoConnector, config);

    let started = std::time::Instant::now();
    let err = runner.run(&()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}
