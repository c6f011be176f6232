//! Shared fixtures: RSA signing keys and a wiremock-backed issuer.

#![allow(dead_code)]

use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};
use time::OffsetDateTime;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "rp-client";
pub const SERVER_URI: &str = "https://rp.example";
pub const PREFIX: &str = "/api/oidc/rp";
pub const ALICE_WEBID: &str = "https://alice.example/profile/card#me";

/// An RSA key pair that signs ID tokens and publishes itself as a JWK.
pub struct TestKey {
    pub kid: String,
    encoding_key: EncodingKey,
    pub jwk: Value,
}

impl TestKey {
    fn generate(kid: &str) -> Self {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate RSA key");
        let public_key = private_key.to_public_key();

        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("encode private key");
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("load encoding key");

        let jwk = json!({
            "kty": "RSA",
            "kid": kid,
            "use": "sig",
            "alg": "RS256",
            "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        });

        Self {
            kid: kid.to_string(),
            encoding_key,
            jwk,
        }
    }

    /// Signs `claims` with a `kid` header.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, claims, &self.encoding_key).expect("sign token")
    }

    /// Signs `claims` with the given `kid` header instead of the key's own.
    pub fn sign_with_kid(&self, claims: &Value, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        jsonwebtoken::encode(&header, claims, &self.encoding_key).expect("sign token")
    }
}

/// The key published by [`MockIssuer`].
pub fn signing_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("key-1"))
}

/// A different key that claims the published key's `kid`.
pub fn rogue_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("key-1"))
}

/// An issuer serving discovery, JWKS and a token endpoint.
pub struct MockIssuer {
    pub server: MockServer,
}

impl MockIssuer {
    /// Starts the issuer with discovery and JWKS mounted.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let issuer = server.uri();

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/authorize"),
                "token_endpoint": format!("{issuer}/token"),
                "jwks_uri": format!("{issuer}/jwks"),
                "id_token_signing_alg_values_supported": ["RS256"],
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "public, max-age=600")
                    .set_body_json(json!({ "keys": [signing_key().jwk.clone()] })),
            )
            .mount(&server)
            .await;

        Self { server }
    }

    /// The issuer identifier, as the issuer states it.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// The issuer identifier as it appears in the callback path.
    pub fn encoded_issuer(&self) -> String {
        utf8_percent_encode(&self.issuer(), NON_ALPHANUMERIC).to_string()
    }

    /// ID token claims that pass validation for `nonce`.
    pub fn claims(&self, nonce: &str) -> Value {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        json!({
            "iss": self.issuer(),
            "sub": "alice",
            "aud": CLIENT_ID,
            "exp": now + 300,
            "iat": now,
            "nonce": nonce,
            "webid": ALICE_WEBID,
        })
    }

    /// A token endpoint response carrying `id_token`.
    pub fn token_body(&self, id_token: &str) -> Value {
        json!({
            "access_token": "access-1",
            "token_type": "DPoP",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "id_token": id_token,
        })
    }

    /// Answers the token request for `code` with `status` and `body`,
    /// expecting exactly `calls` such requests.
    pub async fn mount_token(&self, code: &str, status: u16, body: Value, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(format!("code={code}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// The callback URL the issuer redirects to.
    pub fn callback_url(&self, query: &str) -> Url {
        Url::parse(&format!(
            "{SERVER_URI}{PREFIX}/{}?{query}",
            self.encoded_issuer()
        ))
        .expect("callback url")
    }
}
