mod common;

use anyhow::Result;
use common::{amount_of, funded_user, test_service};
use remit::application::{AppError, TransferRequest, WalletService};

#[tokio::test]
async fn test_register_and_lookup_users() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let alice = service
        .register_user(" 5550001 ", Some("Alice".to_string()))
        .await?;
    assert_eq!(alice.handle, "5550001");

    let found = service.get_user("5550001").await?;
    assert_eq!(found, alice);

    let duplicate = service.register_user("5550001", None).await;
    assert!(matches!(duplicate, Err(AppError::UserAlreadyExists(_))));

    let invalid = service.register_user("555 0001", None).await;
    assert!(matches!(invalid, Err(AppError::InvalidHandle(_))));

    let missing = service.get_user("5559999").await;
    assert!(matches!(missing, Err(AppError::UserNotFound(_))));

    service.register_user("5550002", None).await?;
    let handles: Vec<String> = service
        .list_users()
        .await?
        .into_iter()
        .map(|u| u.handle)
        .collect();
    assert_eq!(handles, vec!["5550001", "5550002"]);

    Ok(())
}

#[tokio::test]
async fn test_deposits_accumulate() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.register_user("5550001", None).await?;

    service.deposit("5550001", 2500).await?;
    service.deposit("5550001", 500).await?;

    let entry = service.get_balance("5550001").await?;
    assert_eq!(entry.balance.amount, 3000);
    assert_eq!(entry.balance.locked, 0);

    let invalid = service.deposit("5550001", 0).await;
    assert!(matches!(invalid, Err(AppError::InvalidAmount(_))));

    let unknown = service.deposit("5559999", 100).await;
    assert!(matches!(unknown, Err(AppError::UserNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_p2p_transfer_messages() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (_, alice) = funded_user(&service, "5550001", 100).await?;
    funded_user(&service, "5550002", 0).await?;

    let ok = service.p2p_transfer(Some(&alice), "5550002", 40.0).await;
    assert_eq!(ok.message, "Transfer successful");
    assert!(ok.is_success());

    let cases = [
        (None, "5550002", 10.0, "Error while sending"),
        (Some(&alice), "5550002", 0.0, "Invalid amount"),
        (Some(&alice), "5550002", -5.0, "Invalid amount"),
        (Some(&alice), "5550002", f64::NAN, "Invalid amount"),
        (Some(&alice), "5550002", 2.5, "Invalid amount"),
        (Some(&alice), "5559999", 10.0, "User not found"),
        (Some(&alice), "5550001", 10.0, "Cannot send money to yourself"),
        (Some(&alice), "5550002", 150.0, "Insufficient funds"),
    ];
    for (session, to, amount, expected) in cases {
        let outcome = service.p2p_transfer(session, to, amount).await;
        assert_eq!(outcome.message, expected, "sending {} to {}", amount, to);
        assert!(!outcome.is_success());
    }

    assert_eq!(amount_of(&service, "5550001").await?, 60);
    assert_eq!(amount_of(&service, "5550002").await?, 40);
    Ok(())
}

#[tokio::test]
async fn test_outcome_serializes_as_message_object() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (_, alice) = funded_user(&service, "5550001", 100).await?;

    let outcome = service.p2p_transfer(Some(&alice), "5559999", 10.0).await;
    assert_eq!(
        serde_json::to_value(&outcome)?,
        serde_json::json!({ "message": "User not found" })
    );
    Ok(())
}

#[tokio::test]
async fn test_integrity_after_mixed_activity() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (_, alice) = funded_user(&service, "5550001", 10000).await?;
    let (_, bob) = funded_user(&service, "5550002", 5000).await?;
    funded_user(&service, "5550003", 0).await?;

    service
        .send(Some(&alice), &TransferRequest::new("5550002", 2500))
        .await?;
    service
        .send(Some(&bob), &TransferRequest::new("5550003", 7000))
        .await?;
    let _ = service
        .send(Some(&alice), &TransferRequest::new("5550003", 999999))
        .await;

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);
    assert_eq!(report.user_count, 3);
    assert_eq!(report.balance_count, 3);
    assert_eq!(report.deposit_count, 2);
    assert_eq!(report.transfer_count, 2);
    assert_eq!(report.total_balance, 15000);
    assert_eq!(report.total_deposited, 15000);
    Ok(())
}

#[tokio::test]
async fn test_reconnect_sees_committed_state() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let db_path = temp_dir.path().join("wallet.db");
    let path = db_path.to_str().unwrap();

    {
        let service = WalletService::init(path).await?;
        let (_, alice) = funded_user(&service, "5550001", 300).await?;
        funded_user(&service, "5550002", 0).await?;
        service
            .send(Some(&alice), &TransferRequest::new("5550002", 120))
            .await?;
    }

    let service = WalletService::connect(path).await?;
    assert_eq!(amount_of(&service, "5550001").await?, 180);
    assert_eq!(amount_of(&service, "5550002").await?, 120);

    let session = service.session_for("5550002").await?;
    assert_eq!(session.user_id, service.get_user("5550002").await?.id);
    Ok(())
}
