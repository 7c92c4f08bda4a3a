//! Client Configuration Settings
//!
//! Configuration types for the site-stream client, loaded from environment variables.

use std::time::Duration;

use crate::domain::token::Token;
use crate::infrastructure::stream::reconnect::DEFAULT_RETRY_INTERVAL;

/// Provider endpoints used by the client.
///
/// Immutable once the client is built; override individual URLs for
/// staging environments or tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Temporary-credential endpoint.
    pub request_token_url: String,
    /// Token-credential endpoint.
    pub access_token_url: String,
    /// Resource-owner authorization page.
    pub authorize_url: String,
    /// Site-stream endpoint.
    pub stream_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            request_token_url: "https://api.twitter.com/oauth/request_token".to_string(),
            access_token_url: "https://api.twitter.com/oauth/access_token".to_string(),
            authorize_url: "https://api.twitter.com/oauth/authorize".to_string(),
            stream_url: "https://sitestream.twitter.com/2b/site.json".to_string(),
        }
    }
}

/// Streaming connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Wait before every reconnection attempt.
    pub retry_interval: Duration,
    /// Capacity of the record delivery channel.
    pub delivery_capacity: usize,
    /// TCP/TLS connect timeout. The stream itself has no read timeout.
    pub connect_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            delivery_capacity: 1024,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Complete client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Consumer key.
    pub consumer_key: String,
    /// Consumer secret.
    pub consumer_secret: String,
    /// Previously obtained access token, if any.
    pub access_token: Option<Token>,
    /// User ids to follow on the site stream.
    pub follow: Vec<u64>,
    /// Callback URL for the request-token call (`oob` for PIN flow).
    pub callback: String,
    /// Provider endpoints.
    pub endpoints: Endpoints,
    /// Streaming connection settings.
    pub stream: StreamSettings,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// a provided value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let consumer_key = required(&lookup, "SITESTREAM_CONSUMER_KEY")?;
        let consumer_secret = required(&lookup, "SITESTREAM_CONSUMER_SECRET")?;

        let access_token = match (
            non_empty(&lookup, "SITESTREAM_ACCESS_TOKEN"),
            non_empty(&lookup, "SITESTREAM_ACCESS_TOKEN_SECRET"),
        ) {
            (Some(token), Some(secret)) => Some(Token::new(token, secret)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar(
                    "SITESTREAM_ACCESS_TOKEN_SECRET".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar(
                    "SITESTREAM_ACCESS_TOKEN".to_string(),
                ));
            }
        };

        let follow = non_empty(&lookup, "SITESTREAM_FOLLOW")
            .map(|raw| parse_follow(&raw))
            .transpose()?
            .unwrap_or_default();

        let callback = non_empty(&lookup, "SITESTREAM_CALLBACK").unwrap_or_else(|| "oob".to_string());

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            request_token_url: non_empty(&lookup, "SITESTREAM_REQUEST_TOKEN_URL")
                .unwrap_or(defaults.request_token_url),
            access_token_url: non_empty(&lookup, "SITESTREAM_ACCESS_TOKEN_URL")
                .unwrap_or(defaults.access_token_url),
            authorize_url: non_empty(&lookup, "SITESTREAM_AUTHORIZE_URL")
                .unwrap_or(defaults.authorize_url),
            stream_url: non_empty(&lookup, "SITESTREAM_STREAM_URL").unwrap_or(defaults.stream_url),
        };

        let stream = StreamSettings {
            retry_interval: parse_duration_millis(
                &lookup,
                "SITESTREAM_RETRY_INTERVAL_MS",
                StreamSettings::default().retry_interval,
            )?,
            delivery_capacity: parse_capacity(
                &lookup,
                "SITESTREAM_DELIVERY_CAPACITY",
                StreamSettings::default().delivery_capacity,
            )?,
            connect_timeout: parse_duration_secs(
                &lookup,
                "SITESTREAM_HTTP_CONNECT_TIMEOUT_SECS",
                StreamSettings::default().connect_timeout,
            )?,
        };

        Ok(Self {
            consumer_key,
            consumer_secret,
            access_token,
            follow,
            callback,
            endpoints,
            stream,
        })
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &self.access_token)
            .field("follow", &self.follow)
            .field("callback", &self.callback)
            .field("endpoints", &self.endpoints)
            .field("stream", &self.stream)
            .finish()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_follow(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "SITESTREAM_FOLLOW".to_string(),
                value: id.to_string(),
            })
        })
        .collect()
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .map(|v| {
            v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            })
        })
        .transpose()
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_u64(lookup, key)?.map_or(default, Duration::from_millis))
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_u64(lookup, key)?.map_or(default, Duration::from_secs))
}

fn parse_capacity<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_u64(lookup, key)? {
        None => Ok(default),
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: "0".to_string(),
        }),
        Some(n) => usize::try_from(n).map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: n.to_string(),
        }),
    }
}
