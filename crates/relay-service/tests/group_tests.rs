//! Group operations: per-device isolation, deadlines and repeated ids

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use relay_client::testing::MockTransport;
use relay_client::{DeviceTransport, HttpReply, HttpRequest, TransportError};
use relay_core::{Device, Generation, MemoryRegistry};
use relay_params::ParameterCatalog;
use relay_schema::{CapabilityStore, MemoryCapabilityFiles};
use relay_service::{ParameterService, ServiceConfig};
use serde_json::json;

use common::*;

fn plug_at(id: &str, ip: &str) -> Device {
    Device::new(id, Generation::Gen1)
        .with_ip(ip)
        .with_raw_type("SHPLG-S")
}

/// Never answers for one host, delegates the rest
struct HangingTransport {
    stuck_host: String,
    inner: Arc<MockTransport>,
}

#[async_trait]
impl DeviceTransport for HangingTransport {
    async fn send(&self, host: &str, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        if host == self.stuck_host {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.inner.send(host, request).await
    }
}

/// Answers every request, each after a delay
struct SlowTransport {
    delay: Duration,
    inner: Arc<MockTransport>,
}

#[async_trait]
impl DeviceTransport for SlowTransport {
    async fn send(&self, host: &str, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        tokio::time::sleep(self.delay).await;
        self.inner.send(host, request).await
    }
}

fn service_over(transport: Arc<dyn DeviceTransport>, config: ServiceConfig) -> ParameterService {
    ParameterService::new(
        Arc::new(ParameterCatalog::builtin()),
        Arc::new(CapabilityStore::new(Arc::new(MemoryCapabilityFiles::new()))),
        transport,
        config,
    )
}

#[tokio::test]
async fn test_group_write_isolates_unreachable_device() {
    let mock = Arc::new(MockTransport::new());
    FakeSettings::install(&mock, json!({"eco_mode": true}), true);
    mock.set_unreachable("10.0.0.12");
    let service = service(&mock, vec![plug_capability()]);

    let devices = vec![
        plug_at("shellyplug-s-000001", "10.0.0.11"),
        plug_at("shellyplug-s-000002", "10.0.0.12"),
        plug_at("shellyplug-s-000003", "10.0.0.13"),
    ];
    let report = service
        .set_parameter_for_group(&devices, "eco_mode", json!(false), false)
        .await;

    assert_eq!(report.summary(), "2/3 succeeded");
    assert_eq!(report.failed(), vec!["shellyplug-s-000002"]);
    let failed = report.get("shellyplug-s-000002").unwrap();
    assert!(failed.error.as_deref().unwrap().contains("unreachable"));
    assert!(report.get("shellyplug-s-000001").unwrap().success);

    let reads = service.get_parameter_for_group(&devices, "eco_mode").await;
    assert_eq!(reads.succeeded(), 2);
    assert_eq!(
        reads.get("shellyplug-s-000003").unwrap().value,
        Some(json!(false))
    );
}

#[tokio::test]
async fn test_group_read_missing_parameter_fails_that_device() {
    let mock = Arc::new(MockTransport::new());
    mock.on(|host, req| {
        if req.path != "/settings" {
            return None;
        }
        let body = if host == "10.0.0.21" {
            json!({"eco_mode": true})
        } else {
            json!({})
        };
        Some(Ok(HttpReply::json(&body)))
    });
    let service = service(&mock, vec![]);

    let devices = vec![
        plug_at("shellyplug-s-000021", "10.0.0.21"),
        plug_at("shellyplug-s-000022", "10.0.0.22"),
    ];
    let report = service.get_parameter_for_group(&devices, "eco_mode").await;

    assert_eq!(report.summary(), "1/2 succeeded");
    assert_eq!(
        report.get("shellyplug-s-000021").unwrap().value,
        Some(json!(true))
    );
    let missing = report.get("shellyplug-s-000022").unwrap();
    assert_eq!(
        missing.error.as_deref(),
        Some("Parameter not found: eco_mode")
    );
}

#[tokio::test]
async fn test_hanging_device_is_bounded_by_timeout() {
    let mock = Arc::new(MockTransport::new());
    FakeSettings::install(&mock, json!({"eco_mode": true}), true);
    let transport = Arc::new(HangingTransport {
        stuck_host: "10.0.0.32".to_string(),
        inner: mock.clone(),
    });

    let mut config = ServiceConfig::default();
    config.verification.settle_delay_ms = 0;
    config.batch.per_device_timeout_ms = Some(100);
    let service = service_over(transport, config);

    let devices = vec![
        plug_at("shellyplug-s-000031", "10.0.0.31"),
        plug_at("shellyplug-s-000032", "10.0.0.32"),
    ];
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        service.set_parameter_for_group(&devices, "eco_mode", json!(false), false),
    )
    .await
    .expect("group write should not wait for the hanging device");

    assert_eq!(report.summary(), "1/2 succeeded");
    assert_eq!(report.failed(), vec!["shellyplug-s-000032"]);
    let error = report.get("shellyplug-s-000032").unwrap().error.clone().unwrap();
    assert_eq!(
        error,
        "Device did not finish in time: shellyplug-s-000032: no result within 100ms"
    );
}

#[tokio::test]
async fn test_slow_device_runs_whole_write_chain_in_group() {
    // Every write is acknowledged but the value never changes
    let mock = Arc::new(MockTransport::new());
    mock.on(|_, req| {
        req.path
            .starts_with("/settings")
            .then(|| Ok(HttpReply::json(&json!({"eco_mode": true}))))
    });
    let transport = Arc::new(SlowTransport {
        delay: Duration::from_millis(20),
        inner: mock.clone(),
    });

    let mut config = ServiceConfig::default();
    config.verification.settle_delay_ms = 50;
    let service = service_over(transport, config);

    let device = plug_at("shellyplug-s-000033", "10.0.0.33");
    let alone = service
        .set(&device, "eco_mode", json!(false), false)
        .await
        .unwrap_err();
    assert_eq!(alone.kind(), "write_failed");
    let requests_alone = mock.request_count();

    mock.clear_requests();
    let report = service
        .set_parameter_for_group(&[device], "eco_mode", json!(false), false)
        .await;

    assert_eq!(report.summary(), "0/1 succeeded");
    let error = report.get("shellyplug-s-000033").unwrap().error.clone().unwrap();
    assert_eq!(error, alone.to_string());
    assert!(error.contains("save_flag"));
    assert!(!error.contains("unreachable"));
    assert_eq!(mock.request_count(), requests_alone);
}

#[tokio::test]
async fn test_repeated_device_is_handled_once() {
    let mock = Arc::new(MockTransport::new());
    FakeSettings::install(&mock, json!({"eco_mode": true}), true);
    let service = service(&mock, vec![plug_capability()]);

    let devices = vec![
        plug_at("shellyplug-s-000051", "10.0.0.51"),
        plug_at("shellyplug-s-000051", "10.0.0.52"),
        plug_at("shellyplug-s-000053", "10.0.0.53"),
    ];
    let report = service
        .set_parameter_for_group(&devices, "eco_mode", json!(false), false)
        .await;

    assert_eq!(report.total(), 2);
    assert_eq!(report.summary(), "2/2 succeeded");
    assert!(mock.requests_for("10.0.0.52").is_empty());
    assert!(!mock.requests_for("10.0.0.51").is_empty());

    let registry = MemoryRegistry::with_devices([plug()]);
    let unknown = "shellyplug-s-FFFFFF".to_string();
    let ids = vec![plug().id, plug().id, unknown.clone(), unknown];
    let reads = service
        .get_parameter_for_ids(&registry, &ids, "eco_mode")
        .await;
    assert_eq!(reads.total(), 2);
    assert_eq!(reads.summary(), "1/2 succeeded");
}

#[tokio::test]
async fn test_group_by_ids_reports_unknown_ids() {
    let mock = Arc::new(MockTransport::new());
    FakeSettings::install(&mock, json!({"eco_mode": true}), true);
    let service = service(&mock, vec![plug_capability()]);
    let registry = MemoryRegistry::with_devices([plug()]);

    let ids = vec![plug().id, "shellyplug-s-FFFFFF".to_string()];
    let report = service
        .set_parameter_for_ids(&registry, &ids, "eco_mode", json!(false), false)
        .await;

    assert_eq!(report.total(), 2);
    assert!(report.get(&plug().id).unwrap().success);
    assert_eq!(
        report.get("shellyplug-s-FFFFFF").unwrap().error.as_deref(),
        Some("unknown device shellyplug-s-FFFFFF")
    );

    let reads = service
        .get_parameter_for_ids(&registry, &ids, "eco_mode")
        .await;
    assert_eq!(reads.summary(), "1/2 succeeded");
    assert_eq!(reads.get(&plug().id).unwrap().value, Some(json!(false)));
}

#[tokio::test]
async fn test_discover_many() {
    let mock = Arc::new(MockTransport::new());
    mock.on_get("/shelly", json!({"type": "SHPLG-S", "num_outputs": 1}));
    mock.on_get("/settings", json!({"eco_mode": false, "max_power": 2500}));
    mock.set_unreachable("10.0.0.42");

    let mut config = ServiceConfig::default();
    config.discovery.max_concurrency = 1;
    let service = service_with(&mock, vec![], config);

    let devices = vec![
        plug_at("shellyplug-s-000041", "10.0.0.41"),
        plug_at("shellyplug-s-000042", "10.0.0.42"),
    ];
    let report = service.discover_many(&devices).await;

    assert_eq!(report.summary(), "1/2 succeeded");
    let found = report.get("shellyplug-s-000041").unwrap();
    assert_eq!(found.value.as_ref().unwrap()["device_type"], json!("SHPLG-S"));
    assert!(service.capability_for(&devices[0]).is_some());
}
