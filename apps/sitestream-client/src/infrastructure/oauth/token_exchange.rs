//! Token Exchange
//!
//! The one-shot request/response calls of the three-legged OAuth1.0a
//! flow, built on the signer:
//!
//! 1. `request_token`: obtain a temporary token bound to a callback URL
//! 2. `authorize_url`: send the user to approve that token
//! 3. `access_token`: trade the approved token plus verifier for an
//!    access token usable on the streaming endpoint
//!
//! Responses are URL-encoded query strings, e.g.
//! `oauth_token=...&oauth_token_secret=...&oauth_callback_confirmed=true`.

use std::collections::HashMap;

use super::signer::{ProtocolParameters, SignableRequest, SignatureParameters, Signer, percent_encode};
use super::{Credentials, OAuthError};
use crate::application::ports::{HttpTransport, PostRequest};
use crate::domain::token::{AccessToken, RequestToken, Token};
use crate::infrastructure::config::Endpoints;

/// Signed calls against the token endpoints.
pub struct TokenExchange<'a> {
    credentials: &'a Credentials,
    transport: &'a dyn HttpTransport,
    endpoints: &'a Endpoints,
}

impl<'a> TokenExchange<'a> {
    /// Create a token exchange over the given transport.
    #[must_use]
    pub fn new(
        credentials: &'a Credentials,
        transport: &'a dyn HttpTransport,
        endpoints: &'a Endpoints,
    ) -> Self {
        Self {
            credentials,
            transport,
            endpoints,
        }
    }

    /// Obtain a request token for the given callback URL (`oob` for PIN flow).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status, or a
    /// response missing `oauth_token`/`oauth_token_secret`.
    pub async fn request_token(&self, callback: &str) -> Result<RequestToken, OAuthError> {
        let mut fields = self
            .post_signed(
                &self.endpoints.request_token_url,
                None,
                &[("oauth_callback", callback)],
            )
            .await?;

        let token = take_field(&mut fields, "oauth_token")?;
        let secret = take_field(&mut fields, "oauth_token_secret")?;
        let callback_confirmed = fields
            .get("oauth_callback_confirmed")
            .is_some_and(|v| v == "true");

        tracing::debug!(callback_confirmed, "Obtained request token");

        Ok(RequestToken {
            token: Token::new(token, secret),
            callback_confirmed,
        })
    }

    /// URL the user visits to authorize a request token.
    #[must_use]
    pub fn authorize_url(&self, request_token: &RequestToken) -> String {
        format!(
            "{}?oauth_token={}",
            self.endpoints.authorize_url,
            percent_encode(request_token.token.token())
        )
    }

    /// Exchange an authorized request token and its verifier for an access token.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::InvalidRequestToken` without touching the
    /// network when the token or its secret is empty; otherwise the same
    /// errors as [`request_token`](Self::request_token).
    pub async fn access_token(
        &self,
        request_token: &RequestToken,
        verifier: &str,
    ) -> Result<AccessToken, OAuthError> {
        if !request_token.token.is_complete() {
            return Err(OAuthError::InvalidRequestToken);
        }

        let mut fields = self
            .post_signed(
                &self.endpoints.access_token_url,
                Some(&request_token.token),
                &[("oauth_verifier", verifier)],
            )
            .await?;

        let access = AccessToken {
            token: Token::new(
                take_field(&mut fields, "oauth_token")?,
                take_field(&mut fields, "oauth_token_secret")?,
            ),
            user_id: take_field(&mut fields, "user_id")?,
            screen_name: take_field(&mut fields, "screen_name")?,
        };

        tracing::info!(
            user_id = %access.user_id,
            screen_name = %access.screen_name,
            "Obtained access token"
        );

        Ok(access)
    }

    /// POST an empty signed body and parse the query-string response.
    async fn post_signed(
        &self,
        url: &str,
        token: Option<&Token>,
        oauth_extra: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, OAuthError> {
        let form = SignatureParameters::new();
        let request = SignableRequest {
            method: "POST",
            url,
            token,
            oauth_extra,
            form: &form,
        };
        let authorization = Signer::new(self.credentials)
            .authorization_header(&request, &ProtocolParameters::generate());

        let response = self
            .transport
            .post(PostRequest {
                url: url.to_string(),
                headers: vec![("Authorization".to_string(), authorization)],
                body: String::new(),
            })
            .await?;

        let status = response.status;
        let success = response.is_success();
        let body = response.text().await?;

        if !success {
            tracing::warn!(url, status, "Token endpoint rejected request");
            return Err(OAuthError::UnexpectedStatus { status, body });
        }

        Ok(parse_query(&body))
    }
}

/// Parse an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn parse_query(body: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .into_owned()
        .collect()
}

fn take_field(fields: &mut HashMap<String, String>, name: &'static str) -> Result<String, OAuthError> {
    fields.remove(name).ok_or(OAuthError::MissingField(name))
}
