//! Custom test assertions for expressive tests
//!
//! Provides trait-based checks for signed client assertions.

use common::jwt::{
    decode_segment, decode_signature, split_compact, ClientAssertionClaims, JwtHeader,
};
use idp_client::crypto::{Certificate, SigningAlgorithm};

/// Custom assertions for compact client assertions
///
/// # Example
/// ```rust,ignore
/// assertion
///     .assert_alg(SigningAlgorithm::Rs512)
///     .assert_client("client-123")
///     .assert_lifetime_minutes(5)
///     .assert_signed_by(&test_certificate(), SigningAlgorithm::Rs512);
/// ```
pub trait AssertionChecks {
    /// Decoded JOSE header.
    fn header(&self) -> JwtHeader;

    /// Decoded claim set.
    fn claims(&self) -> ClientAssertionClaims;

    /// Assert the header carries exactly `{"alg": <algorithm>}`.
    fn assert_alg(&self, algorithm: SigningAlgorithm) -> &Self;

    /// Assert `iss == sub == client_id`.
    fn assert_client(&self, client_id: &str) -> &Self;

    fn assert_audience(&self, audience: &str) -> &Self;

    /// Assert `exp - iat == minutes * 60`.
    fn assert_lifetime_minutes(&self, minutes: u32) -> &Self;

    /// Assert the signature verifies with `certificate`'s public key.
    fn assert_signed_by(&self, certificate: &Certificate, algorithm: SigningAlgorithm) -> &Self;
}

impl AssertionChecks for str {
    fn header(&self) -> JwtHeader {
        let parts = split_compact(self).expect("assertion must be a compact JWT");
        let raw: serde_json::Value =
            decode_segment(parts.header).expect("header must be base64url JSON");
        let object = raw.as_object().expect("header must be a JSON object");
        assert_eq!(
            object.len(),
            1,
            "header must only carry `alg`, got {raw}"
        );
        decode_segment(parts.header).expect("header must decode")
    }

    fn claims(&self) -> ClientAssertionClaims {
        let parts = split_compact(self).expect("assertion must be a compact JWT");
        decode_segment(parts.claims).expect("claims must be base64url JSON")
    }

    fn assert_alg(&self, algorithm: SigningAlgorithm) -> &Self {
        assert_eq!(self.header().alg, algorithm.as_str());
        self
    }

    fn assert_client(&self, client_id: &str) -> &Self {
        let claims = self.claims();
        assert_eq!(claims.iss, client_id, "iss must be the client id");
        assert_eq!(claims.sub, client_id, "sub must be the client id");
        self
    }

    fn assert_audience(&self, audience: &str) -> &Self {
        assert_eq!(self.claims().aud, audience);
        self
    }

    fn assert_lifetime_minutes(&self, minutes: u32) -> &Self {
        assert_eq!(self.claims().lifetime_secs(), i64::from(minutes) * 60);
        self
    }

    fn assert_signed_by(&self, certificate: &Certificate, algorithm: SigningAlgorithm) -> &Self {
        let parts = split_compact(self).expect("assertion must be a compact JWT");
        let signature = decode_signature(parts.signature).expect("signature must be base64url");
        certificate
            .verify(algorithm, parts.signing_input().as_bytes(), &signature)
            .expect("signature must verify");
        self
    }
}

impl AssertionChecks for String {
    fn header(&self) -> JwtHeader {
        self.as_str().header()
    }

    fn claims(&self) -> ClientAssertionClaims {
        self.as_str().claims()
    }

    fn assert_alg(&self, algorithm: SigningAlgorithm) -> &Self {
        self.as_str().assert_alg(algorithm);
        self
    }

    fn assert_client(&self, client_id: &str) -> &Self {
        self.as_str().assert_client(client_id);
        self
    }

    fn assert_audience(&self, audience: &str) -> &Self {
        self.as_str().assert_audience(audience);
        self
    }

    fn assert_lifetime_minutes(&self, minutes: u32) -> &Self {
        self.as_str().assert_lifetime_minutes(minutes);
        self
    }

    fn assert_signed_by(&self, certificate: &Certificate, algorithm: SigningAlgorithm) -> &Self {
        self.as_str().assert_signed_by(certificate, algorithm);
        self
    }
}

/// Value of `key` in a form-urlencoded body, percent-decoded.
pub fn form_field(body: &str, key: &str) -> Option<String> {
    body.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| percent_decode(v))
    })
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(b) => {
                        out.push(b);
                        i += 2;
                    }
                    Err(_) => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
