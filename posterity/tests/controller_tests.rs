use chrono::{Duration, Utc};
use posterity::Posterity;
use posterity_delivery::DeliveryError;
use posterity_store::{
    DeliveryPatch, DeliveryStatus, FileStore, Letter, LetterId, Recipient, RecordStore,
    StoreError,
};
use pretty_assertions::assert_eq;

#[test]
fn test_sample_config_parses() {
    let posterity: Posterity = ron::from_str(include_str!("../../posterity.config.ron")).unwrap();

    let status = posterity.email_config().unwrap();
    assert!(!status.is_configured());
    assert_eq!(status.missing(), vec!["api_key", "from"]);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let posterity: Posterity = ron::from_str("Posterity()").unwrap();
    assert!(posterity.email_config().is_none());
}

#[tokio::test]
async fn test_run_now_on_empty_store() {
    let posterity: Posterity =
        ron::from_str("Posterity(store: Memory(), notifier: Log)").unwrap();

    let summary = posterity.run_now().await.unwrap();
    assert_eq!(summary.processed(), 0);
}

#[tokio::test]
async fn test_run_now_fails_on_unreadable_letter() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!("Posterity(store: File(path: {:?}), notifier: Log)", dir.path());

    let store = FileStore::builder()
        .path(dir.path().to_path_buf())
        .build()
        .unwrap();
    store.init().unwrap();

    let recipient = Recipient::new(None, "me@example.com");
    store.insert_recipient(recipient.clone()).await.unwrap();
    let now = Utc::now();
    let letter = Letter::new(
        recipient.id,
        None,
        "hello",
        now - Duration::days(10),
        now - Duration::days(1),
    );
    store.insert_letter(letter.clone()).await.unwrap();
    std::fs::write(
        dir.path().join("letters").join(letter.id.filename()),
        b"\xff\xff\xff",
    )
    .unwrap();

    let posterity: Posterity = ron::from_str(&config).unwrap();
    let err = posterity.run_now().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DeliveryError>(),
        Some(DeliveryError::Scan(StoreError::Serialization(_)))
    ));
}

#[tokio::test]
async fn test_test_email_rejects_bad_address() {
    let posterity: Posterity = ron::from_str("Posterity(notifier: Log)").unwrap();

    assert!(posterity.send_test_email("nobody").await.is_err());
    assert!(posterity.send_test_email("me@example.com").await.is_ok());
}

#[tokio::test]
async fn test_letter_status_from_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!("Posterity(store: File(path: {:?}))", dir.path());

    let store = FileStore::builder()
        .path(dir.path().to_path_buf())
        .build()
        .unwrap();
    store.init().unwrap();

    let recipient = Recipient::new(None, "me@example.com");
    store.insert_recipient(recipient.clone()).await.unwrap();

    let now = Utc::now();
    let overdue = Letter::new(
        recipient.id,
        Some("Old".to_string()),
        "hello",
        now - Duration::days(400),
        now - Duration::days(2),
    );
    let future = Letter::new(
        recipient.id,
        None,
        "later",
        now,
        now + Duration::days(30),
    );
    store.insert_letter(overdue.clone()).await.unwrap();
    store.insert_letter(future.clone()).await.unwrap();

    let posterity: Posterity = ron::from_str(&config).unwrap();
    let report = posterity.letter_status(overdue.id).await.unwrap();
    assert_eq!(report.status, DeliveryStatus::PendingDelivery);
    assert!(report.to_string().contains("Pending Delivery"));

    let posterity: Posterity = ron::from_str(&config).unwrap();
    let report = posterity.letter_status(future.id).await.unwrap();
    assert_eq!(report.status, DeliveryStatus::Scheduled);

    store
        .update_delivery_state(&overdue.id, &DeliveryPatch::Sent { at: now })
        .await
        .unwrap();
    let posterity: Posterity = ron::from_str(&config).unwrap();
    let report = posterity.letter_status(overdue.id).await.unwrap();
    assert_eq!(report.status, DeliveryStatus::Delivered);
    assert!(report.to_string().contains("Delivered at:"));

    let posterity: Posterity = ron::from_str(&config).unwrap();
    let missing = posterity.letter_status(LetterId::generate()).await;
    assert!(matches!(
        missing.unwrap_err().downcast_ref::<StoreError>(),
        Some(StoreError::LetterNotFound(_))
    ));
}
