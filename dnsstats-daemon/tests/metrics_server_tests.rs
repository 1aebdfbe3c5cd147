//! Integration tests for metrics server functionality.

use dnsstats_core::config::MetricsConfig;
use dnsstats_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn install_fails_with_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9100,
    };

    assert!(metrics_server::install_metrics_recorder(&config).is_err());
}

#[tokio::test]
#[serial]
async fn install_succeeds_with_valid_config() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19180,
    };

    let result = metrics_server::install_metrics_recorder(&config);
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
}
