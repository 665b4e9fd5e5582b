//! ISAPI Device Client Tests
//!
//! Runs `IsapiDeviceClient` against the in-process gateway mock:
//! - Digest challenge handling and challenge caching
//! - Search pagination
//! - Enroll, modify and delete status handling

mod common;

use common::*;
use roster_sync::config::{DeviceConfig, Secret};
use roster_sync::model::CanonicalUser;
use roster_sync::provider::device::IsapiDeviceClient;
use roster_sync::provider::{DeviceDirectory, DeviceTarget};
use std::time::Duration;

fn client(device: &MockDevice, password: &str, page_size: u32) -> IsapiDeviceClient {
    init_rustls();
    let config = DeviceConfig {
        host: Some(device.url.clone()),
        username: DEVICE_USERNAME.to_string(),
        password: Secret::new(password),
        page_size,
        ..DeviceConfig::default()
    };
    IsapiDeviceClient::new(&config, Duration::from_secs(5)).expect("Failed to build client")
}

fn lobby() -> DeviceTarget {
    DeviceTarget::new("lobby", "A1").primary()
}

fn ids(users: &[serde_json::Value]) -> Vec<&str> {
    users
        .iter()
        .map(|u| u["employeeNo"].as_str().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_fetch_pages_through_all_users() {
    let device = MockDevice::start().await;
    device.seed(
        "A1",
        (1..=5)
            .map(|i| device_record(&format!("S{i}"), &format!("User {i}"), true))
            .collect(),
    );

    let users = client(&device, DEVICE_PASSWORD, 2)
        .fetch_users(&lobby())
        .await
        .unwrap();

    assert_eq!(ids(&users), vec!["S1", "S2", "S3", "S4", "S5"]);
    // pages at 0, 2 and 4
    assert_eq!(device.state.searches.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_fetch_empty_device() {
    let device = MockDevice::start().await;
    let users = client(&device, DEVICE_PASSWORD, 30)
        .fetch_users(&lobby())
        .await
        .unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn test_digest_challenge_is_answered_once_and_cached() {
    let device = MockDevice::start().await;
    device.seed("A1", vec![device_record("S1", "A", true)]);
    let client = client(&device, DEVICE_PASSWORD, 30);

    client.fetch_users(&lobby()).await.unwrap();
    client
        .create_user(&lobby(), &CanonicalUser::new("S2", "B", true))
        .await
        .unwrap();
    client.fetch_users(&lobby()).await.unwrap();

    assert_eq!(device.challenges(), 1);
}

#[tokio::test]
async fn test_digest_challenge_found_after_basic_offer() {
    let device = MockDevice::start().await;
    device.offer_basic_first();
    device.seed("A1", vec![device_record("S1", "A", true)]);

    let users = client(&device, DEVICE_PASSWORD, 30)
        .fetch_users(&lobby())
        .await
        .unwrap();

    assert_eq!(ids(&users), vec!["S1"]);
    assert_eq!(device.challenges(), 1);
}

#[tokio::test]
async fn test_wrong_password_fails_fetch() {
    let device = MockDevice::start().await;
    let err = client(&device, "wrong", 30)
        .fetch_users(&lobby())
        .await
        .unwrap_err();

    assert_eq!(err.origin, "device 'lobby'");
    assert!(err.to_string().contains("rejected the device credentials"));
}

#[tokio::test]
async fn test_broken_device_fails_fetch() {
    let device = MockDevice::start().await;
    device.break_index("A1");
    let err = client(&device, DEVICE_PASSWORD, 30)
        .fetch_users(&lobby())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_create_update_delete() {
    let device = MockDevice::start().await;
    let client = client(&device, DEVICE_PASSWORD, 30);
    let target = lobby();

    client
        .create_user(&target, &CanonicalUser::new("S01461", "LUIS RIOS", true).with_pin("1234"))
        .await
        .unwrap();
    let enrolled = device.users("A1");
    assert_eq!(enrolled.len(), 1);
    assert_eq!(enrolled[0]["password"], "1234");
    assert_eq!(enrolled[0]["RightPlan"][0]["planTemplateNo"], "1");

    client
        .update_user(&target, &CanonicalUser::new("S01461", "LUIS A. RIOS", false))
        .await
        .unwrap();
    assert_eq!(
        device.summary("A1"),
        vec![("S01461".to_string(), "LUIS A. RIOS".to_string(), false)]
    );

    client.delete_user(&target, "S01461").await.unwrap();
    assert!(device.users("A1").is_empty());
}

#[tokio::test]
async fn test_device_status_errors_surface() {
    let device = MockDevice::start().await;
    device.seed("A1", vec![device_record("S1", "A", true)]);
    let client = client(&device, DEVICE_PASSWORD, 30);

    let err = client
        .create_user(&lobby(), &CanonicalUser::new("S1", "A", true))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("employeeNoAlreadyExist"));

    let err = client
        .update_user(&lobby(), &CanonicalUser::new("S404", "Nobody", true))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("employeeNoNotExist"));
}

#[tokio::test]
async fn test_target_host_override() {
    let base = MockDevice::start().await;
    let other = MockDevice::start().await;
    other.seed("B2", vec![device_record("S7", "Other", true)]);

    let client = client(&base, DEVICE_PASSWORD, 30);
    let target = DeviceTarget::new("garage", "B2").with_host(other.url.clone());

    let users = client.fetch_users(&target).await.unwrap();
    assert_eq!(ids(&users), vec!["S7"]);
    assert_eq!(base.challenges(), 0);
    assert_eq!(other.challenges(), 1);
}
