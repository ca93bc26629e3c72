// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixed RSA key material for signing ID tokens in tests.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

pub const TEST_KEY_ID: &str = "tether-test-key";

pub const TEST_RSA_PRIVATE_KEY_PEM: &str = include_str!("../testdata/rsa_test_key.pem");

const TEST_RSA_MODULUS: &str = "3KQHHYv7FWsfymYWmGwB6KAlVPKv0KzQaeHY8dkVyFIAWDVJyAgdQUsp4fUydG-Km8KySyx9ghmh2HzTPAmLiKyOFxMp_mvwrgX2kO9NCkfUWpotDqJUgOU877glsPWsLmsZxIw90zGDm28p_ObEF7_FLJaYldvtTokDj78HbGTBEcZb1_svebuIxbHFYwRszNQTpfRjc7L2bWfoDsPkAefg5kgiBmrWe9FdF0W3H07bR2_9NvvOeZp3dMc91BvBSZyKR3k37U5ciSeNxTN9QwiSca7btvNtZh3HO80ylSjlLzeEZ471tjg4_7KCwzzeo2glJWLe6_yf3aPnhIluRw";

/// JWKS document containing the public half of the test key.
pub fn test_jwks() -> Value {
	json!({
		"keys": [{
			"kty": "RSA",
			"kid": TEST_KEY_ID,
			"use": "sig",
			"alg": "RS256",
			"n": TEST_RSA_MODULUS,
			"e": "AQAB"
		}]
	})
}

/// Standard claims valid for the next hour.
pub fn id_token_claims(issuer: &str, audience: &str, sub: &str, email: &str) -> Value {
	let now = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("clock before epoch")
		.as_secs();
	json!({
		"iss": issuer,
		"aud": audience,
		"sub": sub,
		"email": email,
		"email_verified": true,
		"name": "Test User",
		"iat": now,
		"exp": now + 3600
	})
}

/// RS256-sign `claims` with the test key under `kid`.
pub fn sign_test_id_token(claims: &Value, kid: &str) -> String {
	let mut header = Header::new(Algorithm::RS256);
	header.kid = Some(kid.to_string());
	let key = EncodingKey::from_rsa_pem(TEST_RSA_PRIVATE_KEY_PEM.as_bytes())
		.expect("test key must parse");
	encode(&header, claims, &key).expect("test token must sign")
}
