use marketplace_service::config::RegistryConfig;
use marketplace_service::services::RegistryClient;
use marketplace_service::services::registry::VerificationError;
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry_config(base_url: String) -> RegistryConfig {
    RegistryConfig {
        base_url,
        api_key: Secret::new("test-api-key".to_string()),
        provider: "operator-registry".to_string(),
        timeout_secs: 2,
    }
}

fn sample_records() -> serde_json::Value {
    json!([
        {
            "pnr_number": "TX 9921-A",
            "passenger_name": "John Doe",
            "bus_operator": "Neeta Travels",
            "source_location": "Mumbai",
            "destination_location": "Pune",
            "departure_date": "2026-09-14",
            "departure_time": "22:30",
            "seat_number": "L5",
            "ticket_price": 450
        },
        {
            "pnr_number": "QW12345",
            "passenger_name": "Asha Patel",
            "bus_operator": "VRL Logistics",
            "source_location": "Bengaluru",
            "destination_location": "Hyderabad",
            "departure_date": "2026-09-20",
            "departure_time": "21:00",
            "seat_number": "U2",
            "ticket_price": 799.5
        }
    ])
}

async fn mock_registry(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/records"))
        .and(header("x-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_records()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn verifies_matching_pnr_and_name() {
    let server = MockServer::start().await;
    mock_registry(&server).await;

    let client = RegistryClient::new(registry_config(server.uri())).unwrap();

    // Raw PNR with separators and lowercase still matches the record.
    let verified = client
        .verify("tx 9921-a", Some("Neeta Travels"), " john doe ")
        .await
        .expect("verification should succeed");

    assert_eq!(verified.pnr, "TX9921A");
    assert_eq!(verified.operator, "Neeta Travels");
    assert_eq!(verified.source_location, "Mumbai");
    assert_eq!(verified.destination_location, "Pune");
    assert_eq!(verified.seat_number, "L5");
    assert_eq!(verified.confidence, 100);
    assert_eq!(verified.provider, "operator-registry");
}

#[tokio::test]
async fn partial_name_matches_by_containment() {
    let server = MockServer::start().await;
    mock_registry(&server).await;

    let client = RegistryClient::new(registry_config(server.uri())).unwrap();

    let verified = client.verify("QW12345", None, "asha").await;
    assert!(verified.is_ok());
}

#[tokio::test]
async fn unknown_pnr_is_not_found() {
    let server = MockServer::start().await;
    mock_registry(&server).await;

    let client = RegistryClient::new(registry_config(server.uri())).unwrap();

    let err = client
        .verify("ZZ99999", None, "John Doe")
        .await
        .expect_err("unknown PNR must not match");
    assert!(matches!(err, VerificationError::NotFound));
}

#[tokio::test]
async fn mismatched_name_is_rejected() {
    let server = MockServer::start().await;
    mock_registry(&server).await;

    let client = RegistryClient::new(registry_config(server.uri())).unwrap();

    let err = client
        .verify("TX9921A", None, "Jane Roe")
        .await
        .expect_err("wrong passenger must not verify");
    assert!(matches!(err, VerificationError::NameMismatch));
}

#[tokio::test]
async fn malformed_pnr_fails_before_any_request() {
    // No mock mounted: a request would fail, proving none is sent.
    let server = MockServer::start().await;
    let client = RegistryClient::new(registry_config(server.uri())).unwrap();

    for raw in ["ab1", "this-pnr-is-way-too-long-to-be-real"] {
        let err = client
            .verify(raw, None, "John Doe")
            .await
            .expect_err("bad format must be rejected");
        assert!(matches!(err, VerificationError::InvalidFormat));
    }
}

#[tokio::test]
async fn registry_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/records"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = RegistryClient::new(registry_config(server.uri())).unwrap();

    let err = client
        .verify("TX9921A", None, "John Doe")
        .await
        .expect_err("upstream error must surface");
    assert!(matches!(err, VerificationError::UpstreamStatus(status) if status.as_u16() == 503));
}

#[tokio::test]
async fn hung_registry_hits_the_client_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/records"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_records())
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    // 2-second client timeout; no retry is attempted.
    let client = RegistryClient::new(registry_config(server.uri())).unwrap();

    let err = client
        .verify("TX9921A", None, "John Doe")
        .await
        .expect_err("hung registry must time out");
    assert!(matches!(err, VerificationError::Upstream(_)));
}
