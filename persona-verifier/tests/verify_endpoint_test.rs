//! Tests for the verification and well-known endpoints

use std::io::Write;

use axum_test::TestServer;
use chrono::Utc;
use serde_json::{json, Value};
use tempfile::{NamedTempFile, TempDir};

use persona_core::discovery::SupportDocument;
use persona_core::jwt::Token;
use persona_core::{Certificate, SecretKey};
use persona_verifier::routes::create_router;
use persona_verifier::{AppState, Config};

/// Stand up a server whose shim table preloads `idp.example`'s document.
/// The returned guards keep the key directory and shim file alive.
fn server_with_idp(idp_key: &SecretKey) -> (TestServer, TempDir, NamedTempFile) {
    let key_dir = TempDir::new().unwrap();

    let doc = SupportDocument::basic(idp_key.public_key(), "/auth", "/provision");
    let mut shim_file = NamedTempFile::new().unwrap();
    write!(shim_file, "{}", serde_json::to_string(&doc).unwrap()).unwrap();

    let config = Config {
        hostname: "verifier.example".to_string(),
        key_dir: key_dir.path().to_str().unwrap().to_string(),
        shim_entries: vec![format!(
            "idp.example|https://idp.example|{}",
            shim_file.path().display()
        )],
        ..Default::default()
    };

    let state = AppState::from_config(&config).unwrap();
    let server = TestServer::new(create_router(state)).expect("Failed to create test server");
    (server, key_dir, shim_file)
}

fn make_bundle(idp_key: &SecretKey, email: &str, aud: &str) -> String {
    let user_key = SecretKey::generate_dsa(128).unwrap();
    let now = Utc::now().timestamp_millis();

    let cert = Certificate::create(
        "idp.example",
        email,
        &user_key.public_key(),
        now,
        now + 3_600_000,
        idp_key,
    )
    .unwrap();
    let assertion = Token::sign(&json!({"aud": aud, "exp": now + 300_000}), &user_key).unwrap();
    format!("{}~{}", cert.encoded(), assertion.encoded())
}

#[tokio::test]
async fn verify_accepts_valid_assertion() {
    let idp_key = SecretKey::generate_dsa(128).unwrap();
    let (server, _keys, _shim) = server_with_idp(&idp_key);

    let bundle = make_bundle(&idp_key, "alice@idp.example", "https://rp.example");

    let response = server
        .post("/verify")
        .form(&[
            ("assertion", bundle.as_str()),
            ("audience", "https://rp.example"),
        ])
        .await;

    let body: Value = response.json();
    assert_eq!(body["status"], "okay", "body: {}", body);
    assert_eq!(body["email"], "alice@idp.example");
    assert_eq!(body["audience"], "https://rp.example");
    assert_eq!(body["issuer"], "idp.example");
    assert!(body["valid-until"].is_i64());
}

#[tokio::test]
async fn verify_rejects_wrong_audience() {
    let idp_key = SecretKey::generate_dsa(128).unwrap();
    let (server, _keys, _shim) = server_with_idp(&idp_key);

    let bundle = make_bundle(&idp_key, "alice@idp.example", "https://rp.example");

    let response = server
        .post("/verify")
        .form(&[
            ("assertion", bundle.as_str()),
            ("audience", "https://other.example"),
        ])
        .await;

    let body: Value = response.json();
    assert_eq!(body["status"], "failure");
    assert!(body["reason"].as_str().is_some_and(|r| !r.is_empty()));
}

#[tokio::test]
async fn verify_rejects_garbage_assertion() {
    let idp_key = SecretKey::generate_dsa(128).unwrap();
    let (server, _keys, _shim) = server_with_idp(&idp_key);

    let response = server
        .post("/verify")
        .form(&[
            ("assertion", "not-a-bundle"),
            ("audience", "https://rp.example"),
        ])
        .await;

    let body: Value = response.json();
    assert_eq!(body["status"], "failure");
}

#[tokio::test]
async fn well_known_publishes_local_key() {
    let idp_key = SecretKey::generate_dsa(128).unwrap();
    let (server, _keys, _shim) = server_with_idp(&idp_key);

    let response = server.get("/.well-known/browserid").await;
    let body: Value = response.json();

    assert_eq!(body["public-key"]["algorithm"], "DS");
    assert_eq!(body["authentication"], "/auth");
    assert_eq!(body["provisioning"], "/provision");
}
