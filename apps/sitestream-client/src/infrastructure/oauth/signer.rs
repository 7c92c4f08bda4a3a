//! OAuth1.0a Request Signing
//!
//! Computes HMAC-SHA1 signatures and `Authorization` header values for
//! OAuth1.0a-protected endpoints. Everything here is synchronous and pure
//! apart from nonce/timestamp generation in [`ProtocolParameters::generate`].
//!
//! # Signing Flow
//!
//! 1. Collect the protocol parameters (`oauth_consumer_key`, `oauth_nonce`,
//!    `oauth_signature_method`, `oauth_timestamp`, `oauth_version`, and
//!    `oauth_token` when a token is held) plus the request's form parameters.
//! 2. Build the signature base string:
//!    `METHOD & enc(base_uri) & enc(k1=v1&k2=v2...)` with keys sorted.
//! 3. Sign it with the key `enc(consumer_secret) & enc(token_secret)`.
//! 4. Emit `OAuth k1="v1", k2="v2", ...` from the `oauth_*` parameters.
//!
//! # References
//!
//! - [RFC 5849](https://datatracker.ietf.org/doc/html/rfc5849)

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use sha1::Sha1;

use super::Credentials;
use crate::domain::token::Token;

// =============================================================================
// Constants
// =============================================================================

/// The only supported signature method.
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// Protocol version sent as `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

/// Length of generated nonces.
pub const NONCE_LENGTH: usize = 40;

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

/// Parameters fed into the signature, keyed by raw (unencoded) name.
///
/// A `BTreeMap` keeps keys in byte-lexicographic order, which is the
/// order the signature base string requires.
pub type SignatureParameters = BTreeMap<String, String>;

// =============================================================================
// Primitives
// =============================================================================

/// Percent-encode a string the way OAuth1.0a requires.
///
/// Unreserved characters (`A-Z a-z 0-9 - . _ ~`) are kept, every other
/// byte of the UTF-8 encoding becomes `%XX` with upper-case hex.
#[must_use]
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Build the signature base string.
///
/// The query string and fragment of `uri` are dropped; `params` must
/// already contain every parameter that takes part in the signature.
#[must_use]
pub fn build_signature_base(method: &str, uri: &str, params: &SignatureParameters) -> String {
    let base_uri = uri.split(['?', '#']).next().unwrap_or(uri);

    let parameter_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_uri),
        percent_encode(&parameter_string)
    )
}

/// Sign a base string with HMAC-SHA1 and return the base64 digest.
///
/// `token_secret` may be empty (request-token step); the `&` separator
/// is always present in the key.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(base.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Render an `Authorization` header value.
///
/// Only `oauth_*` entries are emitted; values are written verbatim, so
/// callers pass them already percent-encoded.
#[must_use]
pub fn build_authorization_header(params: &SignatureParameters) -> String {
    let entries = params
        .iter()
        .filter(|(k, _)| k.starts_with("oauth_"))
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {entries}")
}

// =============================================================================
// Protocol Parameters
// =============================================================================

/// Per-request nonce and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolParameters {
    /// Single-use random alphanumeric string.
    pub nonce: String,
    /// Unix time in seconds.
    pub timestamp: u64,
}

impl ProtocolParameters {
    /// Fresh nonce and current time.
    #[must_use]
    pub fn generate() -> Self {
        let nonce = rand::rng()
            .sample_iter(Alphanumeric)
            .take(NONCE_LENGTH)
            .map(char::from)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self { nonce, timestamp }
    }

    /// Fixed values, for reproducing a known signature.
    #[must_use]
    pub fn fixed(nonce: impl Into<String>, timestamp: u64) -> Self {
        Self {
            nonce: nonce.into(),
            timestamp,
        }
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Everything about a request that goes into its signature.
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Target URL.
    pub url: &'a str,
    /// Token held for this request, if any.
    pub token: Option<&'a Token>,
    /// Extra protocol parameters such as `oauth_callback` or `oauth_verifier`.
    pub oauth_extra: &'a [(&'a str, &'a str)],
    /// Form parameters sent in the body.
    pub form: &'a SignatureParameters,
}

/// Produces `Authorization` headers for one set of consumer credentials.
#[derive(Debug, Clone, Copy)]
pub struct Signer<'a> {
    credentials: &'a Credentials,
}

impl<'a> Signer<'a> {
    /// Create a signer bound to the given credentials.
    #[must_use]
    pub const fn new(credentials: &'a Credentials) -> Self {
        Self { credentials }
    }

    /// The `oauth_*` parameters of a request, before signing.
    #[must_use]
    pub fn protocol_parameters(
        &self,
        request: &SignableRequest<'_>,
        protocol: &ProtocolParameters,
    ) -> SignatureParameters {
        let mut params = SignatureParameters::new();
        params.insert(
            "oauth_consumer_key".to_string(),
            self.credentials.consumer_key().to_string(),
        );
        params.insert("oauth_nonce".to_string(), protocol.nonce.clone());
        params.insert(
            "oauth_signature_method".to_string(),
            SIGNATURE_METHOD.to_string(),
        );
        params.insert(
            "oauth_timestamp".to_string(),
            protocol.timestamp.to_string(),
        );
        params.insert("oauth_version".to_string(), OAUTH_VERSION.to_string());
        if let Some(token) = request.token {
            params.insert("oauth_token".to_string(), token.token().to_string());
        }
        for (k, v) in request.oauth_extra {
            params.insert((*k).to_string(), (*v).to_string());
        }
        params
    }

    /// Compute the raw (unencoded) signature of a request.
    #[must_use]
    pub fn signature(&self, request: &SignableRequest<'_>, protocol: &ProtocolParameters) -> String {
        let mut signing_input = self.protocol_parameters(request, protocol);
        signing_input.extend(request.form.iter().map(|(k, v)| (k.clone(), v.clone())));

        let base = build_signature_base(request.method, request.url, &signing_input);
        tracing::trace!(base = %base, "Signature base string");

        sign(
            &base,
            self.credentials.consumer_secret(),
            request.token.map_or("", Token::secret),
        )
    }

    /// Compute the full `Authorization` header value for a request.
    #[must_use]
    pub fn authorization_header(
        &self,
        request: &SignableRequest<'_>,
        protocol: &ProtocolParameters,
    ) -> String {
        let signature = self.signature(request, protocol);

        let mut header_params: SignatureParameters = self
            .protocol_parameters(request, protocol)
            .into_iter()
            .map(|(k, v)| (k, percent_encode(&v)))
            .collect();
        header_params.insert("oauth_signature".to_string(), percent_encode(&signature));

        build_authorization_header(&header_params)
    }
}

/// Encode form parameters as an `application/x-www-form-urlencoded` body.
///
/// Uses the same encoding as the signature so the signed values and the
/// transmitted values are byte-identical.
#[must_use]
pub fn encode_form(form: &SignatureParameters) -> String {
    form.iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::percent_decode_str;
    use proptest::prelude::*;
    use test_case::test_case;

    fn params(pairs: &[(&str, &str)]) -> SignatureParameters {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test_case("abcXYZ019", "abcXYZ019" ; "alphanumerics untouched")]
    #[test_case("-._~", "-._~" ; "unreserved marks untouched")]
    #[test_case("a b", "a%20b" ; "space is percent twenty")]
    #[test_case("a+b", "a%2Bb" ; "plus is escaped")]
    #[test_case("1,2,3", "1%2C2%2C3" ; "commas escaped")]
    #[test_case("Ladies + Gentlemen!", "Ladies%20%2B%20Gentlemen%21" ; "punctuation")]
    #[test_case("☃", "%E2%98%83" ; "multibyte utf8")]
    #[test_case("", "" ; "empty")]
    fn percent_encoding_cases(input: &str, expected: &str) {
        assert_eq!(percent_encode(input), expected);
    }

    #[test]
    fn signature_base_photos_example() {
        let p = params(&[
            ("oauth_consumer_key", "dpf43f3p2l4k3l03"),
            ("oauth_token", "nnch734d00sl2jdk"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1191242096"),
            ("oauth_nonce", "kllo9940pd9333jh"),
            ("oauth_version", "1.0"),
            ("file", "vacation.jpg"),
            ("size", "original"),
        ]);

        let base = build_signature_base("GET", "http://photos.example.net/photos", &p);
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg\
             %26oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh\
             %26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096\
             %26oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );
        assert_eq!(
            sign(&base, "kd94hf93k423kf44", "pfkkdhi9sl3r4s00"),
            "tR3+Ty81lMeYAr/Fid0kMTYa/WM="
        );
    }

    #[test]
    fn signature_base_uppercases_method_and_drops_query() {
        let base = build_signature_base(
            "post",
            "https://example.com/path?x=1#frag",
            &params(&[("a", "b")]),
        );
        assert_eq!(base, "POST&https%3A%2F%2Fexample.com%2Fpath&a%3Db");
    }

    #[test]
    fn signature_base_with_no_parameters() {
        let base = build_signature_base("GET", "https://example.com", &SignatureParameters::new());
        assert_eq!(base, "GET&https%3A%2F%2Fexample.com&");
    }

    #[test]
    fn signature_base_double_encodes_values() {
        let base = build_signature_base(
            "POST",
            "https://example.com",
            &params(&[("follow", "1,2")]),
        );
        assert!(base.ends_with("&follow%3D1%252C2"));
    }

    #[test]
    fn sign_with_empty_token_secret_keeps_separator() {
        let with_empty = sign("base", "consumer", "");
        let key_only = {
            let mut mac = HmacSha1::new_from_slice(b"consumer&").unwrap();
            mac.update(b"base");
            STANDARD.encode(mac.finalize().into_bytes())
        };
        assert_eq!(with_empty, key_only);
    }

    #[test]
    fn sign_is_deterministic_and_input_sensitive() {
        let a = sign("base", "cs", "ts");
        assert_eq!(a, sign("base", "cs", "ts"));
        assert_ne!(a, sign("base2", "cs", "ts"));
        assert_ne!(a, sign("base", "cs2", "ts"));
        assert_ne!(a, sign("base", "cs", "ts2"));
    }

    #[test]
    fn authorization_header_format() {
        let header = build_authorization_header(&params(&[
            ("oauth_nonce", "abc"),
            ("oauth_consumer_key", "key"),
            ("follow", "ignored"),
        ]));
        assert_eq!(header, r#"OAuth oauth_consumer_key="key", oauth_nonce="abc""#);
        assert!(!header.ends_with(", "));
    }

    #[test]
    fn signer_reproduces_published_example() {
        let credentials = Credentials::new(
            "xvz1evFS4wEEPTGEFPHBog",
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
        )
        .unwrap();
        let token = Token::new(
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        );
        let form = params(&[
            ("include_entities", "true"),
            ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
        ]);
        let request = SignableRequest {
            method: "POST",
            url: "https://api.twitter.com/1.1/statuses/update.json",
            token: Some(&token),
            oauth_extra: &[],
            form: &form,
        };
        let protocol =
            ProtocolParameters::fixed("kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg", 1_318_622_958);

        let signer = Signer::new(&credentials);
        assert_eq!(
            signer.signature(&request, &protocol),
            "hCtSmYh+iHYCEqBWrE7C7hYmtUk="
        );

        let header = signer.authorization_header(&request, &protocol);
        assert!(header.starts_with("OAuth "));
        assert!(header.contains(r#"oauth_signature="hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D""#));
        assert!(header.contains(r#"oauth_token="370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb""#));
        assert!(!header.contains("status="));
        assert!(!header.contains("include_entities"));
    }

    #[test]
    fn signer_without_token_omits_oauth_token() {
        let credentials = Credentials::new("key", "secret").unwrap();
        let form = SignatureParameters::new();
        let request = SignableRequest {
            method: "POST",
            url: "https://example.com/oauth/request_token",
            token: None,
            oauth_extra: &[("oauth_callback", "http://localhost/cb?x=1")],
            form: &form,
        };
        let protocol = ProtocolParameters::fixed("nonce", 1);
        let header = Signer::new(&credentials).authorization_header(&request, &protocol);

        assert!(!header.contains("oauth_token="));
        assert!(header.contains(r#"oauth_callback="http%3A%2F%2Flocalhost%2Fcb%3Fx%3D1""#));
        assert!(header.contains(r#"oauth_signature_method="HMAC-SHA1""#));
        assert!(header.contains(r#"oauth_version="1.0""#));
    }

    #[test]
    fn generated_nonces_are_alphanumeric_and_fresh() {
        let a = ProtocolParameters::generate();
        let b = ProtocolParameters::generate();
        assert_eq!(a.nonce.len(), NONCE_LENGTH);
        assert!(a.nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.nonce, b.nonce);
        assert!(a.timestamp > 1_600_000_000);
    }

    #[test]
    fn encode_form_matches_signature_encoding() {
        let form = params(&[("follow", "1,2,3"), ("a b", "c")]);
        assert_eq!(encode_form(&form), "a%20b=c&follow=1%2C2%2C3");
    }

    proptest! {
        #[test]
        fn signature_base_keys_strictly_ascending(
            input in proptest::collection::hash_map("[a-zA-Z_]{1,10}", "[ -~]{0,12}", 0..10)
        ) {
            let p: SignatureParameters = input.into_iter().collect();
            let base = build_signature_base("POST", "https://example.com/x", &p);
            let encoded_params = base.splitn(3, '&').nth(2).unwrap();
            let decoded = percent_decode_str(encoded_params).decode_utf8().unwrap();

            let keys: Vec<String> = if decoded.is_empty() {
                Vec::new()
            } else {
                decoded
                    .split('&')
                    .map(|pair| {
                        let key = pair.split('=').next().unwrap();
                        percent_decode_str(key).decode_utf8().unwrap().into_owned()
                    })
                    .collect()
            };

            prop_assert_eq!(keys.len(), p.len());
            for pair in keys.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }

        #[test]
        fn authorization_header_round_trips(
            input in proptest::collection::btree_map("oauth_[a-z]{1,10}", "[A-Za-z0-9%._~-]{0,16}", 0..8)
        ) {
            let header = build_authorization_header(&input);
            let body = header.strip_prefix("OAuth ").unwrap();

            let parsed: SignatureParameters = if body.is_empty() {
                SignatureParameters::new()
            } else {
                body.split(", ")
                    .map(|entry| {
                        let (k, v) = entry.split_once('=').unwrap();
                        (k.to_string(), v.trim_matches('"').to_string())
                    })
                    .collect()
            };

            prop_assert_eq!(parsed, input);
        }
    }
}
