//! ParameterService behavior against scripted devices

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use relay_client::testing::MockTransport;
use relay_core::{Device, Generation, RelayError};
use relay_service::Verification;
use serde_json::json;

use common::*;

#[tokio::test]
async fn test_gen1_eco_mode_set_then_get() {
    let mock = Arc::new(MockTransport::new());
    let settings = FakeSettings::install(&mock, json!({"eco_mode": true}), true);
    let service = service(&mock, vec![plug_capability()]);
    let device = plug();

    let outcome = service.set(&device, "eco_mode", json!(false), false).await.unwrap();
    assert_eq!(outcome.strategy, "settings_query");
    assert_eq!(outcome.attempts[0].verification, Verification::Matched);
    assert_eq!(
        mock.requests()[0].request.to_string(),
        "GET /settings?eco_mode=false"
    );
    assert_eq!(settings.get("eco_mode"), json!(false));

    let value = service.get(&device, "eco_mode", true).await.unwrap();
    assert_eq!(value, Some(json!(false)));
}

#[tokio::test]
async fn test_read_only_refused_before_any_request() {
    let mock = Arc::new(MockTransport::new());
    let service = service(&mock, vec![plug_capability()]);

    let err = service
        .set(&plug(), "uptime", json!(0), false)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::ReadOnlyParameter(ref name) if name == "uptime"));

    // Catalog marks it read-only even without a capability
    let bare = Device::new("shelly1-AABB", Generation::Gen1).with_ip(PLUG_HOST);
    let err = service.set(&bare, "uptime", json!(0), false).await.unwrap_err();
    assert_eq!(err.kind(), "read_only_parameter");

    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_invalid_value_refused_before_any_request() {
    let mock = Arc::new(MockTransport::new());
    let service = service(&mock, vec![]);

    let err = service
        .set(&plug(), "max_power", json!(99999), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_value");
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_fallback_exhaustion_leaves_settings_unchanged() {
    let mock = Arc::new(MockTransport::new());
    let settings = FakeSettings::install(&mock, json!({"eco_mode": true}), false);
    let service = service(&mock, vec![plug_capability()]);

    let err = service
        .set(&plug(), "eco_mode", json!(false), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "write_failed");
    assert_eq!(settings.get("eco_mode"), json!(true));
    assert_eq!(
        service.get(&plug(), "eco_mode", true).await.unwrap(),
        Some(json!(true))
    );
}

#[tokio::test]
async fn test_catalog_mapping_without_capability() {
    let mock = Arc::new(MockTransport::new());
    let settings = FakeSettings::install(&mock, json!({"max_power": 2500}), true);
    let service = service(&mock, vec![]);

    // String input is coerced to the catalog type before encoding
    let outcome = service
        .set(&plug(), "max_power", json!("1800"), false)
        .await
        .unwrap();
    assert_eq!(outcome.value, json!(1800));
    assert_eq!(
        mock.requests()[0].request.to_string(),
        "GET /settings?max_power=1800"
    );
    assert_eq!(settings.get("max_power"), json!(1800));
}

#[tokio::test]
async fn test_gen2_setconfig_nests_capability_path() {
    let mock = Arc::new(MockTransport::new());
    mock.on_rpc("Shelly.SetConfig", json!({"restart_required": false}));
    mock.on_rpc("Sys.GetConfig", json!({"device": {"eco_mode": true}}));
    let service = service(&mock, vec![plus_capability()]);
    let device = plus();

    let outcome = service.set(&device, "eco_mode", json!(true), false).await.unwrap();
    assert!(outcome.warnings.is_empty());

    let first = &mock.requests()[0];
    assert_eq!(first.host, PLUS_HOST);
    assert_eq!(first.rpc_method().as_deref(), Some("Shelly.SetConfig"));
    assert_eq!(
        first.rpc_params(),
        Some(json!({"config": {"device": {"eco_mode": true}}}))
    );

    assert_eq!(
        service.get(&device, "eco_mode", true).await.unwrap(),
        Some(json!(true))
    );
}

#[tokio::test]
async fn test_gen2_get_falls_back_to_shelly_getconfig() {
    let mock = Arc::new(MockTransport::new());
    mock.on_rpc(
        "Shelly.GetConfig",
        json!({"sys": {"device": {"name": "hall"}}}),
    );
    let service = service(&mock, vec![]);

    // Catalog says Sys.SetConfig/device.name; Sys.GetConfig is missing here
    let value = service.get(&plus(), "name", true).await.unwrap();
    assert_eq!(value, Some(json!("hall")));
}

#[tokio::test]
async fn test_restart_after_write() {
    let mock = Arc::new(MockTransport::new());
    FakeSettings::install(&mock, json!({"mqtt_enable": false}), true);
    mock.on_status("/reboot", 500);
    let service = service(&mock, vec![]);

    let outcome = service
        .set(&plug(), "mqtt_enable", json!(true), true)
        .await
        .unwrap();
    assert_eq!(
        mock.requests()[0].request.to_string(),
        "GET /settings?mqtt_enable=on"
    );
    assert!(!outcome.restarted);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].kind(), "protocol");

    mock.on_status("/reboot", 200);
    let outcome = service
        .set(&plug(), "mqtt_enable", json!(false), true)
        .await
        .unwrap();
    assert!(outcome.restarted);
    assert!(outcome.warnings.is_empty());

    // Without auto_restart nothing is rebooted
    mock.clear_requests();
    service
        .set(&plug(), "mqtt_enable", json!(true), false)
        .await
        .unwrap();
    assert!(mock.requests().iter().all(|r| r.request.path != "/reboot"));
}

#[tokio::test]
async fn test_switch_turn_on_gen1() {
    let mock = Arc::new(MockTransport::new());
    mock.on_get("/relay/0", json!({"ison": true}));
    let service = service(&mock, vec![]);

    let outcome = service
        .set(&plug(), "switch.0.turn", json!("toggle"), false)
        .await
        .unwrap();
    assert_eq!(outcome.attempts[0].verification, Verification::Unverifiable);
    assert_eq!(
        mock.requests()[0].request.to_string(),
        "GET /relay/0?turn=toggle"
    );

    assert_eq!(
        service.get(&plug(), "switch.0.output", true).await.unwrap(),
        Some(json!(true))
    );

    let err = service
        .set(&plug(), "switch.0.turn", json!(42), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_value");
}

#[tokio::test]
async fn test_unreachable_and_unsupported_devices() {
    let mock = Arc::new(MockTransport::new());
    mock.set_unreachable(PLUG_HOST);
    let service = service(&mock, vec![plug_capability()]);

    let err = service.get(&plug(), "eco_mode", true).await.unwrap_err();
    assert!(err.is_unreachable());

    let no_ip = Device::new("shellyplug-s-1", Generation::Gen1);
    let err = service.get(&no_ip, "eco_mode", true).await.unwrap_err();
    assert!(err.is_unreachable());

    let unknown = Device::new("mystery-1", Generation::Unknown).with_ip("10.0.0.9");
    let err = service
        .set(&unknown, "eco_mode", json!(true), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_generation");
}

#[tokio::test]
async fn test_missing_parameter_is_none() {
    let mock = Arc::new(MockTransport::new());
    mock.on_get("/settings", json!({"eco_mode": false}));
    mock.on_get("/status", json!({"uptime": 12}));
    let service = service(&mock, vec![]);

    assert_eq!(service.get(&plug(), "no_such_thing", false).await.unwrap(), None);
    assert_eq!(
        service.get(&plug(), "uptime", false).await.unwrap(),
        Some(json!(12))
    );
}

#[tokio::test]
async fn test_list_all_with_capability() {
    let mock = Arc::new(MockTransport::new());
    mock.on_get("/settings", json!({"eco_mode": false}));
    mock.on_get("/status", json!({"uptime": 321}));
    let service = service(&mock, vec![plug_capability()]);

    let writable = service.list_all(&plug(), false).await.unwrap();
    assert_eq!(writable.keys().collect::<Vec<_>>(), vec!["eco_mode"]);
    assert_eq!(writable["eco_mode"].value, Some(json!(false)));

    mock.clear_requests();
    let all = service.list_all(&plug(), true).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["uptime"].value, Some(json!(321)));
    assert!(all["uptime"].read_only);
    // One request per distinct API
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn test_list_all_without_capability_gen1() {
    let mock = Arc::new(MockTransport::new());
    mock.on_get(
        "/settings",
        json!({"eco_mode": false, "device": {"mac": "AABBCC"}}),
    );
    mock.on_get("/status", json!({"uptime": 5}));
    mock.on_get("/shelly", json!({"type": "SHPLG-S"}));
    let service = service(&mock, vec![]);

    let all = service.list_all(&plug(), true).await.unwrap();
    assert_eq!(
        all.keys().cloned().collect::<Vec<_>>(),
        vec!["device_mac", "eco_mode", "type", "uptime"]
    );
    assert!(!all["eco_mode"].read_only);
    assert_eq!(all["eco_mode"].api, "settings");
    assert!(all["device_mac"].read_only);
    assert_eq!(all["uptime"].value, Some(json!(5)));
    assert_eq!(all["type"].api, "shelly");

    let writable = service.list_all(&plug(), false).await.unwrap();
    assert_eq!(writable.keys().collect::<Vec<_>>(), vec!["eco_mode"]);
}

#[tokio::test]
async fn test_list_all_without_capability_gen2() {
    let mock = Arc::new(MockTransport::new());
    mock.on_rpc(
        "Shelly.GetConfig",
        json!({"sys": {"device": {"eco_mode": false, "name": "hall"}}}),
    );
    mock.on_rpc("Shelly.GetStatus", json!({"sys": {"uptime": 10}}));
    let service = service(&mock, vec![]);

    let all = service.list_all(&plus(), true).await.unwrap();
    let eco = &all["sys_device_eco_mode"];
    assert_eq!(eco.api, "Sys.SetConfig");
    assert_eq!(eco.parameter_path, "device.eco_mode");
    assert_eq!(eco.component.as_deref(), Some("sys"));
    assert_eq!(eco.value, Some(json!(false)));
    assert!(all["sys_uptime"].read_only);
    assert_eq!(all["sys_uptime"].value, Some(json!(10)));
}

#[tokio::test]
async fn test_discover_caches_and_forget() {
    let mock = Arc::new(MockTransport::new());
    mock.on_get("/shelly", json!({"type": "SHPLG-S", "num_outputs": 1}));
    mock.on_get("/settings", json!({"eco_mode": false, "max_power": 2500}));
    let service = service(&mock, vec![]);
    let device = plug();

    assert!(service.capability_for(&device).is_none());
    let capability = service.discover(&device).await.unwrap();
    assert_eq!(capability.device_type, "SHPLG-S");
    assert!(capability.has_parameter("eco_mode"));
    assert!(service.store().get("SHPLG-S").is_some());

    assert!(service.forget(&device.id));
    assert!(!service.forget(&device.id));
    // Back through the store by raw type
    let again = service.capability_for(&device).unwrap();
    assert_eq!(again.device_type, "SHPLG-S");
}
