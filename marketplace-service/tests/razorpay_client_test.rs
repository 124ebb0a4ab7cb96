use marketplace_service::config::RazorpayConfig;
use marketplace_service::services::RazorpayClient;
use marketplace_service::services::razorpay::{GatewayError, PaymentVerification};
use secrecy::Secret;
use serde_json::json;
use service_core::signature::hmac_sha256_hex;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_config(api_base_url: String) -> RazorpayConfig {
    RazorpayConfig {
        key_id: "rzp_test_key".to_string(),
        key_secret: Secret::new("rzp_test_secret".to_string()),
        webhook_secret: Secret::new("whsec_test".to_string()),
        api_base_url,
    }
}

#[tokio::test]
async fn creates_order_in_minor_units() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_partial_json(json!({
            "amount": 45_000,
            "currency": "INR"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_MNO123",
            "entity": "order",
            "amount": 45_000,
            "amount_paid": 0,
            "amount_due": 45_000,
            "currency": "INR",
            "receipt": "rcpt_abc_1",
            "status": "created",
            "attempts": 0,
            "created_at": 1_700_000_000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RazorpayClient::new(gateway_config(server.uri())).unwrap();

    let order = client
        .create_order(45_000, "INR", "rcpt_abc_1", None)
        .await
        .expect("order creation should succeed");

    assert_eq!(order.id, "order_MNO123");
    assert_eq!(order.amount, 45_000);
    assert_eq!(order.currency, "INR");
}

#[tokio::test]
async fn relays_gateway_rejection_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Order amount less than minimum amount allowed"
            }
        })))
        .mount(&server)
        .await;

    let client = RazorpayClient::new(gateway_config(server.uri())).unwrap();

    let err = client
        .create_order(1, "INR", "rcpt_low", None)
        .await
        .expect_err("gateway rejection must surface");

    match err {
        GatewayError::Rejected { code, description } => {
            assert_eq!(code, "BAD_REQUEST_ERROR");
            assert!(description.contains("minimum amount"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn unconfigured_client_refuses_to_call_out() {
    let client = RazorpayClient::new(RazorpayConfig {
        key_id: String::new(),
        key_secret: Secret::new(String::new()),
        webhook_secret: Secret::new(String::new()),
        api_base_url: "http://127.0.0.1:1".to_string(),
    })
    .unwrap();

    let err = client
        .create_order(45_000, "INR", "rcpt_x", None)
        .await
        .expect_err("unconfigured gateway must refuse");
    assert!(matches!(err, GatewayError::NotConfigured));
}

#[test]
fn checkout_signature_scheme_round_trips() {
    let client = RazorpayClient::new(gateway_config("http://unused".to_string())).unwrap();

    let signature = hmac_sha256_hex("rzp_test_secret", "order_MNO123|pay_PQR456").unwrap();
    let valid = client
        .verify_payment_signature(&PaymentVerification {
            razorpay_order_id: "order_MNO123".to_string(),
            razorpay_payment_id: "pay_PQR456".to_string(),
            razorpay_signature: signature,
        })
        .unwrap();
    assert!(valid);

    // Signature signed with the wrong secret must not verify.
    let forged = hmac_sha256_hex("attacker_secret", "order_MNO123|pay_PQR456").unwrap();
    let valid = client
        .verify_payment_signature(&PaymentVerification {
            razorpay_order_id: "order_MNO123".to_string(),
            razorpay_payment_id: "pay_PQR456".to_string(),
            razorpay_signature: forged,
        })
        .unwrap();
    assert!(!valid);
}

#[test]
fn webhook_body_tampering_is_detected() {
    let client = RazorpayClient::new(gateway_config("http://unused".to_string())).unwrap();

    let body = json!({
        "entity": "event",
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": "pay_PQR456",
            "amount": 45_000,
            "currency": "INR",
            "status": "captured",
            "order_id": "order_MNO123"
        }}},
        "created_at": 1_700_000_000
    })
    .to_string();

    let signature = hmac_sha256_hex("whsec_test", &body).unwrap();
    assert!(client.verify_webhook_signature(&body, &signature).unwrap());

    let tampered = body.replace("45000", "1");
    assert!(!client.verify_webhook_signature(&tampered, &signature).unwrap());
}
