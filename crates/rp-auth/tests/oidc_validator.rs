//! Integration tests for the OIDC response validator against a mock issuer.

mod common;

use common::{ALICE_WEBID, CLIENT_ID, MockIssuer, SERVER_URI, rogue_key, signing_key};
use rp_auth::validator::JwksError;
use rp_auth::{
    CallbackRequest, OidcResponseValidator, OidcValidatorConfig, PendingAuthorization,
    ResponseValidator, RpClient, Session, ValidationError,
};
use serde_json::json;
use url::Url;

fn validator() -> OidcResponseValidator {
    OidcResponseValidator::new(OidcValidatorConfig::default().with_allow_http(true))
        .expect("build validator")
}

fn client(issuer: &MockIssuer) -> RpClient {
    RpClient::new(Url::parse(&issuer.issuer()).unwrap(), CLIENT_ID)
        .with_client_secret("s3cret")
}

fn session(issuer: &MockIssuer) -> Session {
    Session::new().with_pending(
        PendingAuthorization::new(issuer.issuer(), "state-1", "nonce-1")
            .with_code_verifier("verifier-1"),
    )
}

fn request(issuer: &MockIssuer, code: &str) -> CallbackRequest {
    CallbackRequest::new(
        issuer.callback_url(&format!("code={code}&state=state-1")),
        Some(issuer.encoded_issuer()),
        Url::parse(SERVER_URI).unwrap(),
        "sid-1",
    )
}

#[tokio::test]
async fn test_valid_response() {
    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign(&issuer.claims("nonce-1"));
    issuer
        .mount_token("good-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let response = validator()
        .validate_response(&client(&issuer), &request(&issuer, "good-code"), &session(&issuer))
        .await
        .unwrap();

    assert_eq!(response.access_token(), "access-1");
    assert_eq!(response.refresh_token(), Some("refresh-1"));
    assert_eq!(response.claims.sub, "alice");
    assert_eq!(response.claims.string_claim("webid"), Some(ALICE_WEBID));
    assert_eq!(response.issuer, issuer.issuer());
}

#[tokio::test]
async fn test_token_request_carries_pkce_and_redirect() {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, ResponseTemplate};

    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign(&issuer.claims("nonce-1"));

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code_verifier=verifier-1"))
        .and(body_string_contains("client_secret=s3cret"))
        .and(body_string_contains("redirect_uri=https%3A%2F%2Frp.example%2Fapi%2Foidc%2Frp%2F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issuer.token_body(&id_token)))
        .expect(1)
        .mount(&issuer.server)
        .await;

    validator()
        .validate_response(&client(&issuer), &request(&issuer, "pkce-code"), &session(&issuer))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_nonce_mismatch() {
    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign(&issuer.claims("someone-elses-nonce"));
    issuer
        .mount_token("nonce-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let err = validator()
        .validate_response(&client(&issuer), &request(&issuer, "nonce-code"), &session(&issuer))
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::NonceMismatch));
}

#[tokio::test]
async fn test_code_reuse_is_rejected_without_exchange() {
    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign(&issuer.claims("nonce-1"));
    issuer
        .mount_token("once-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let validator = validator();
    let client = client(&issuer);
    let session = session(&issuer);
    let request = request(&issuer, "once-code");

    validator
        .validate_response(&client, &request, &session)
        .await
        .unwrap();

    for _ in 0..2 {
        let err = validator
            .validate_response(&client, &request, &session)
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::CodeReused));
    }
}

#[tokio::test]
async fn test_failed_exchange_burns_code() {
    let issuer = MockIssuer::start().await;
    issuer
        .mount_token(
            "stale-code",
            400,
            json!({ "error": "invalid_grant", "error_description": "Code expired" }),
            1,
        )
        .await;

    let validator = validator();
    let client = client(&issuer);
    let session = session(&issuer);
    let request = request(&issuer, "stale-code");

    let err = validator
        .validate_response(&client, &request, &session)
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::TokenExchangeFailed(ref m) if m.contains("invalid_grant")));

    let err = validator
        .validate_response(&client, &request, &session)
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::CodeReused));
}

#[tokio::test]
async fn test_audience_mismatch() {
    let issuer = MockIssuer::start().await;
    let mut claims = issuer.claims("nonce-1");
    claims["aud"] = json!("another-client");
    let id_token = signing_key().sign(&claims);
    issuer
        .mount_token("aud-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let err = validator()
        .validate_response(&client(&issuer), &request(&issuer, "aud-code"), &session(&issuer))
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::AudienceMismatch));
}

#[tokio::test]
async fn test_issuer_mismatch_in_token() {
    let issuer = MockIssuer::start().await;
    let mut claims = issuer.claims("nonce-1");
    claims["iss"] = json!("https://evil.example");
    let id_token = signing_key().sign(&claims);
    issuer
        .mount_token("iss-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let err = validator()
        .validate_response(&client(&issuer), &request(&issuer, "iss-code"), &session(&issuer))
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::TokenIssuerMismatch));
}

#[tokio::test]
async fn test_expired_token() {
    let issuer = MockIssuer::start().await;
    let mut claims = issuer.claims("nonce-1");
    claims["exp"] = json!(claims["iat"].as_i64().unwrap() - 3600);
    let id_token = signing_key().sign(&claims);
    issuer
        .mount_token("exp-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let err = validator()
        .validate_response(&client(&issuer), &request(&issuer, "exp-code"), &session(&issuer))
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::TokenExpired));
}

#[tokio::test]
async fn test_forged_signature() {
    let issuer = MockIssuer::start().await;
    let id_token = rogue_key().sign(&issuer.claims("nonce-1"));
    issuer
        .mount_token("forged-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let err = validator()
        .validate_response(&client(&issuer), &request(&issuer, "forged-code"), &session(&issuer))
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::InvalidSignature));
}

#[tokio::test]
async fn test_unknown_kid() {
    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign_with_kid(&issuer.claims("nonce-1"), Some("retired"));
    issuer
        .mount_token("kid-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let err = validator()
        .validate_response(&client(&issuer), &request(&issuer, "kid-code"), &session(&issuer))
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::Jwks(JwksError::KeyNotFound(ref kid)) if kid == "retired"));
}

#[tokio::test]
async fn test_token_without_kid_tries_all_keys() {
    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign_with_kid(&issuer.claims("nonce-1"), None);
    issuer
        .mount_token("nokid-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let response = validator()
        .validate_response(&client(&issuer), &request(&issuer, "nokid-code"), &session(&issuer))
        .await
        .unwrap();

    assert_eq!(response.claims.sub, "alice");
}

#[tokio::test]
async fn test_missing_refresh_token() {
    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign(&issuer.claims("nonce-1"));
    let mut body = issuer.token_body(&id_token);
    body.as_object_mut().unwrap().remove("refresh_token");
    issuer.mount_token("norefresh-code", 200, body.clone(), 1).await;
    issuer.mount_token("optional-code", 200, body, 1).await;

    let err = validator()
        .validate_response(
            &client(&issuer),
            &request(&issuer, "norefresh-code"),
            &session(&issuer),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::MissingRefreshToken));

    let lenient = OidcResponseValidator::new(
        OidcValidatorConfig::default()
            .with_allow_http(true)
            .with_require_refresh_token(false),
    )
    .unwrap();
    let response = lenient
        .validate_response(
            &client(&issuer),
            &request(&issuer, "optional-code"),
            &session(&issuer),
        )
        .await
        .unwrap();
    assert!(response.refresh_token().is_none());
}

#[tokio::test]
async fn test_endpoint_overrides_skip_discovery() {
    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign(&issuer.claims("nonce-1"));
    issuer
        .mount_token("override-code", 200, issuer.token_body(&id_token), 1)
        .await;

    let client = client(&issuer)
        .with_token_endpoint(format!("{}/token", issuer.issuer()))
        .with_jwks_uri(format!("{}/jwks", issuer.issuer()));

    validator()
        .validate_response(&client, &request(&issuer, "override-code"), &session(&issuer))
        .await
        .unwrap();

    let requests = issuer.server.received_requests().await.unwrap();
    assert!(
        requests
            .iter()
            .all(|r| r.url.path() != "/.well-known/openid-configuration")
    );
}

#[tokio::test]
async fn test_oversized_token_response() {
    let issuer = MockIssuer::start().await;
    let id_token = signing_key().sign(&issuer.claims("nonce-1"));
    let mut body = issuer.token_body(&id_token);
    body["padding"] = json!("x".repeat(16 * 1024));
    issuer.mount_token("large-code", 200, body, 1).await;

    let validator = OidcResponseValidator::new(
        OidcValidatorConfig::default()
            .with_allow_http(true)
            .with_max_response_size(8 * 1024),
    )
    .unwrap();

    let err = validator
        .validate_response(&client(&issuer), &request(&issuer, "large-code"), &session(&issuer))
        .await
        .unwrap_err();

    assert!(
        matches!(err, ValidationError::TokenExchangeFailed(ref m) if m.contains("maximum size")),
        "unexpected error: {err}"
    );
}
