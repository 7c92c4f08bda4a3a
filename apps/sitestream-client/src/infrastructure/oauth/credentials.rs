//! Consumer Credentials
//!
//! The application's consumer key and secret, issued by the provider
//! when the application is registered.

use super::OAuthError;

/// OAuth consumer credentials.
///
/// Stores the key and secret every signature is derived from.
/// The `Debug` implementation redacts the secret for safe logging.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    consumer_key: String,
    consumer_secret: String,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Arguments
    ///
    /// * `consumer_key` - Application consumer key
    /// * `consumer_secret` - Application consumer secret
    ///
    /// # Errors
    ///
    /// Returns an error if either key or secret is empty.
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        let consumer_key = consumer_key.into();
        let consumer_secret = consumer_secret.into();

        if consumer_key.is_empty() {
            return Err(OAuthError::InvalidCredentials(
                "consumer key cannot be empty".to_string(),
            ));
        }
        if consumer_secret.is_empty() {
            return Err(OAuthError::InvalidCredentials(
                "consumer secret cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            consumer_key,
            consumer_secret,
        })
    }

    /// Get the consumer key.
    #[must_use]
    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// Get the consumer secret.
    #[must_use]
    pub fn consumer_secret(&self) -> &str {
        &self.consumer_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials(consumer_key={})", self.consumer_key)
    }
}
