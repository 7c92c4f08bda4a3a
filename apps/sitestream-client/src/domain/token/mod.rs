//! OAuth Token Types
//!
//! Value types handed out by the token exchange and consumed by the
//! signer. Secrets are redacted from `Debug` output so tokens can be
//! logged safely.

use std::fmt;

/// A token/secret pair held for one signing session.
///
/// Used both for the temporary request token and for the long-lived
/// access token once the user has authorized the application.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    token: String,
    secret: String,
}

impl Token {
    /// Create a token pair.
    #[must_use]
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }

    /// The public token value (`oauth_token`).
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The token secret, used as the second half of the signing key.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Whether both halves are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.token.is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token", &self.token)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Temporary credentials returned by the request-token step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    /// Token pair to authorize and later exchange.
    pub token: Token,
    /// Whether the provider accepted the callback URL.
    pub callback_confirmed: bool,
}

/// Long-lived credentials returned by the access-token step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Token pair used to sign stream requests.
    pub token: Token,
    /// Provider user id of the authorizing account.
    pub user_id: String,
    /// Screen name of the authorizing account.
    pub screen_name: String,
}
