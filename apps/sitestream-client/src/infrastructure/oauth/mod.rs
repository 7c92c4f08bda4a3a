//! OAuth1.0a Adapters
//!
//! - **Credentials**: consumer key/secret
//! - **Signer**: signature base string, HMAC-SHA1, `Authorization` header
//! - **Token exchange**: request-token / authorize / access-token calls

pub mod credentials;
pub mod signer;
pub mod token_exchange;

pub use credentials::Credentials;
pub use signer::{
    NONCE_LENGTH, OAUTH_VERSION, ProtocolParameters, SIGNATURE_METHOD, SignableRequest,
    SignatureParameters, Signer, build_authorization_header, build_signature_base, encode_form,
    percent_encode, sign,
};
pub use token_exchange::TokenExchange;

use crate::application::ports::TransportError;

/// Errors from signing and the token exchange.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OAuthError {
    /// Consumer credentials are unusable.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The request token is missing its token or secret.
    #[error("invalid request token: token and secret are required")]
    InvalidRequestToken,

    /// The HTTP exchange failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The endpoint answered with a non-2xx status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the provider.
        body: String,
    },

    /// The response did not contain a required field.
    #[error("response missing field: {0}")]
    MissingField(&'static str),
}
