//! One-time-code login endpoints (unauthenticated)

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::client::{AdminClient, RequestOptions};
use super::error::ApiError;

/// Issued after a code has been sent.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpChallenge {
    pub challenge_token: String,
    pub email: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub delivery: String,
    /// Only populated by development backends.
    #[serde(default)]
    pub dev_otp_code: Option<String>,
}

impl OtpChallenge {
    /// Expiry rounded up to whole minutes.
    pub fn expires_in_minutes(&self) -> u64 {
        self.expires_in.div_ceil(60)
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpGrant {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub admin_email: String,
}

impl OtpGrant {
    /// The bearer token: `access_token`, else `token`, trimmed.
    pub fn bearer(&self) -> Result<String, ApiError> {
        [&self.access_token, &self.token]
            .into_iter()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
            .map(String::from)
            .ok_or_else(|| ApiError::validation("Authentication token missing in response"))
    }
}

/// Trim, lowercase and sanity-check an email address.
pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return Err(ApiError::validation("Enter a valid email address."));
    }
    Ok(normalized)
}

/// Ask the backend to send a login code to `email`.
pub async fn request_otp(client: &AdminClient, email: &str) -> Result<OtpChallenge, ApiError> {
    let email = normalize_email(email)?;
    client
        .request(
            "/api/admin/auth/request-otp",
            "",
            &[],
            RequestOptions::new(Method::POST).json(json!({ "email": email })),
            false,
        )
        .await
}

/// Exchange a code for a bearer token.
pub async fn verify_otp(
    client: &AdminClient,
    email: &str,
    otp: &str,
    challenge_token: &str,
) -> Result<OtpGrant, ApiError> {
    if challenge_token.trim().is_empty() {
        return Err(ApiError::validation("Request a code first."));
    }
    let otp = otp.trim();
    if otp.is_empty() {
        return Err(ApiError::validation("Enter the verification code."));
    }
    let email = normalize_email(email)?;
    client
        .request(
            "/api/admin/auth/verify-otp",
            "",
            &[],
            RequestOptions::new(Method::POST).json(json!({
                "email": email,
                "otp": otp,
                "challenge_token": challenge_token,
            })),
            false,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ops@Example.com ").unwrap(), "ops@example.com");
        assert!(matches!(
            normalize_email("not-an-email"),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_bearer_prefers_access_token() {
        let grant: OtpGrant =
            serde_json::from_str(r#"{"access_token":" a ","token":"b"}"#).unwrap();
        assert_eq!(grant.bearer().unwrap(), "a");
        let grant: OtpGrant = serde_json::from_str(r#"{"access_token":"","token":"b"}"#).unwrap();
        assert_eq!(grant.bearer().unwrap(), "b");
        let grant: OtpGrant = serde_json::from_str("{}").unwrap();
        assert!(grant.bearer().is_err());
    }

    #[tokio::test]
    async fn test_verify_requires_challenge_before_network() {
        let client = AdminClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(1));
        let err = verify_otp(&client, "a@x.com", "123456", "").await.unwrap_err();
        assert_eq!(err, ApiError::Validation("Request a code first.".to_string()));
        let err = verify_otp(&client, "a@x.com", "  ", "chal").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Validation("Enter the verification code.".to_string())
        );
    }

    #[tokio::test]
    async fn test_request_otp_sends_normalized_email() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/admin/auth/request-otp")
            .match_body(Matcher::Json(serde_json::json!({ "email": "ops@example.com" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"challenge_token":"c1","email":"ops@example.com","expires_in":300,"delivery":"email"}"#,
            )
            .create_async()
            .await;

        let client = AdminClient::with_timeout(&server.url(), Duration::from_secs(5));
        let challenge = request_otp(&client, " OPS@example.com").await.unwrap();
        assert_eq!(challenge.challenge_token, "c1");
        assert_eq!(challenge.expires_in_minutes(), 5);
        assert!(challenge.dev_otp_code.is_none());
        mock.assert_async().await;
    }
}
