/// Integration tests with mocked external APIs
/// Tests the vision proxy, payment gateway client and booking notifier
/// without hitting real external services
use movco_lead_api::analysis::{
    fallback_estimate, placeholder_estimate, FALLBACK_BASE_GBP, FALLBACK_PER_PHOTO_GBP,
};
use movco_lead_api::config::Config;
use movco_lead_api::payment_client::PaymentClient;
use movco_lead_api::services::{BookingNotifier, VisionService};
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(vision_base_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        vision_base_url,
        gateway_base_url: "https://api.stripe.com".to_string(),
        gateway_secret_key: "sk_test_key".to_string(),
        gateway_webhook_secret: "whsec_test".to_string(),
        checkout_success_url: "https://movco.test/wallet?topup=success".to_string(),
        checkout_cancel_url: "https://movco.test/wallet?topup=cancelled".to_string(),
        booking_notify_url: None,
        admin_token: Some("test_admin_token".to_string()),
        default_lead_price_pence: 500,
    }
}

#[tokio::test]
async fn test_vision_analysis_successful_response() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "estimate": 842.50,
        "description": "2-bed flat, mostly boxed",
        "items": [
            {"name": "Sofa", "quantity": 1, "estimated_volume_ft3": 45.0},
            {"name": "Box", "quantity": 12}
        ],
        "totalVolumeM3": 14.2,
        "totalAreaM2": 18.5,
        "distance_miles": 42.3,
        "duration_text": "1 hour 5 mins",
        "van_count": 2,
        "recommended_movers": 3
    });

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .and(body_string_contains("221B Baker Street"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = VisionService::new(&config);

    let result = service
        .analyze(
            "221B Baker Street, NW1 6XE",
            "10 Downing St, SW1A 2AA",
            &["https://photos.test/room1.jpg".to_string()],
        )
        .await;

    assert!(result.is_ok());
    let analysis = result.unwrap();
    assert_eq!(analysis.estimate, 842.50);
    assert_eq!(analysis.items.len(), 2);
    assert_eq!(analysis.items[0].name, "Sofa");
    assert_eq!(analysis.total_volume_m3, 14.2);
    assert_eq!(analysis.van_count, Some(2));
    assert_eq!(analysis.pricing_method, "vision");
}

#[tokio::test]
async fn test_vision_analysis_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = VisionService::new(&config);

    let result = service
        .analyze("A", "B", &["https://photos.test/room1.jpg".to_string()])
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_vision_analysis_malformed_response() {
    let mock_server = MockServer::start().await;

    // 200 but not the expected shape
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"unexpected": true})),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = VisionService::new(&config);

    let result = service
        .analyze("A", "B", &["https://photos.test/room1.jpg".to_string()])
        .await;

    assert!(result.is_err());
}

#[test]
fn test_fallback_estimate_is_deterministic() {
    // Vision failures must degrade to the same heuristic every time
    let a = fallback_estimate(3);
    let b = fallback_estimate(3);
    assert_eq!(a.estimate, b.estimate);
    assert_eq!(a.total_volume_m3, b.total_volume_m3);
    assert_eq!(a.pricing_method, "fallback");
    assert_eq!(a.estimate, FALLBACK_BASE_GBP + 3.0 * FALLBACK_PER_PHOTO_GBP);
}

#[test]
fn test_placeholder_estimate_for_no_photos() {
    let result = placeholder_estimate();
    assert_eq!(result.pricing_method, "placeholder");
    assert_eq!(result.estimate, FALLBACK_BASE_GBP);
    assert!(result.items.is_empty());
}

#[tokio::test]
async fn test_checkout_session_creation_success() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "id": "cs_test_a1b2c3",
        "url": "https://checkout.gateway.test/pay/cs_test_a1b2c3"
    });

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("Authorization", "Bearer sk_test_key"))
        .and(body_string_contains("wallet_topup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let client =
        PaymentClient::new(mock_server.uri(), "sk_test_key".to_string()).expect("client");

    let session = client
        .create_topup_session(
            Uuid::new_v4(),
            2500,
            Some("cus_123"),
            "https://movco.test/success",
            "https://movco.test/cancel",
        )
        .await;

    assert!(session.is_ok());
    let session = session.unwrap();
    assert_eq!(session.session_id, "cs_test_a1b2c3");
    assert!(session.url.contains("cs_test_a1b2c3"));
}

#[tokio::test]
async fn test_checkout_session_gateway_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(
            ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": {"message": "Your card was declined."}
            })),
        )
        .mount(&mock_server)
        .await;

    let client =
        PaymentClient::new(mock_server.uri(), "sk_test_key".to_string()).expect("client");

    let result = client
        .create_topup_session(
            Uuid::new_v4(),
            2500,
            None,
            "https://movco.test/success",
            "https://movco.test/cancel",
        )
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_checkout_session_missing_url_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cs_test_1"})),
        )
        .mount(&mock_server)
        .await;

    let client =
        PaymentClient::new(mock_server.uri(), "sk_test_key".to_string()).expect("client");

    let result = client
        .create_topup_session(
            Uuid::new_v4(),
            2500,
            None,
            "https://movco.test/success",
            "https://movco.test/cancel",
        )
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_booking_notification_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(body_string_contains("interested"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = BookingNotifier::new(format!("{}/notify", mock_server.uri()));
    let result = notifier
        .notify(Uuid::new_v4(), true, "221B Baker Street, NW1 6XE", "LS1 4AP")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_booking_notification_endpoint_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let notifier = BookingNotifier::new(format!("{}/notify", mock_server.uri()));
    let result = notifier
        .notify(Uuid::new_v4(), false, "A", "B")
        .await;

    // The handler logs and swallows this; here we just assert it surfaces as Err
    assert!(result.is_err());
}

#[tokio::test]
async fn test_concurrent_vision_requests() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "estimate": 500.0,
        "description": "Studio flat",
        "items": [],
        "totalVolumeM3": 6.0,
        "totalAreaM2": 7.8
    });

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .expect(10)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());

    let mut handles = vec![];
    for i in 0..10 {
        let config_clone = config.clone();
        let handle = tokio::spawn(async move {
            let service = VisionService::new(&config_clone);
            service
                .analyze(
                    &format!("Flat {}, SW1A 2AA", i),
                    "NW1 6XE",
                    &["https://photos.test/room.jpg".to_string()],
                )
                .await
        });
        handles.push(handle);
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
