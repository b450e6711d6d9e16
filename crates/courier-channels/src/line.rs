// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LINE Messaging API client: push messages, profile lookups, and webhook
//! signature verification.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use courier_core::{CourierError, Integration};

/// Production LINE API endpoint.
pub const LINE_API_BASE: &str = "https://api.line.me";

/// Typed LINE credentials parsed from an integration's credential map.
///
/// Push delivery only needs the access token; the channel secret is required
/// for webhook signature verification.
#[derive(Debug, Clone)]
pub struct LineCredentials {
    pub channel_access_token: String,
    pub channel_secret: Option<String>,
}

impl LineCredentials {
    pub fn from_integration(integration: &Integration) -> Result<Self, CourierError> {
        let token = integration
            .credential("channelAccessToken")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                CourierError::Config("LINE integration missing channel access token.".into())
            })?
            .to_string();

        Ok(Self {
            channel_access_token: token,
            channel_secret: integration.credential("channelSecret").map(str::to_string),
        })
    }
}

/// A LINE user profile as returned by the profile endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Thin HTTP client for the LINE Messaging API.
#[derive(Clone)]
pub struct LineClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for LineClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LineClient {
    pub fn new() -> Self {
        Self::with_base_url(LINE_API_BASE)
    }

    /// Point the client at a different endpoint (test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Push a single text message to a LINE user. One call, one attempt.
    pub async fn push(
        &self,
        access_token: &str,
        to: &str,
        text: &str,
    ) -> Result<(), CourierError> {
        let response = self
            .http
            .post(format!("{}/v2/bot/message/push", self.base_url))
            .bearer_auth(access_token)
            .json(&serde_json::json!({
                "to": to,
                "messages": [{ "type": "text", "text": text }]
            }))
            .send()
            .await
            .map_err(|e| CourierError::Delivery {
                message: format!("LINE push failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CourierError::delivery(format!(
                "LINE push failed ({status}): {body}"
            )));
        }
        Ok(())
    }

    /// Fetch a LINE user's profile.
    pub async fn profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<LineProfile, CourierError> {
        let response = self
            .http
            .get(format!("{}/v2/bot/profile/{user_id}", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| CourierError::Delivery {
                message: format!("LINE profile fetch failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CourierError::delivery(format!(
                "LINE profile fetch failed ({status}): {body}"
            )));
        }

        response.json().await.map_err(|e| CourierError::Delivery {
            message: format!("LINE profile fetch returned invalid JSON: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

/// Verify a LINE webhook signature: base64(HMAC-SHA256(channel secret, body)).
pub fn verify_signature(channel_secret: &str, raw_body: &[u8], signature: &str) -> bool {
    if signature.is_empty() {
        return false;
    }
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    let expected = BASE64.encode(mac.finalize().into_bytes());
    expected == signature
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::now_iso;
    use courier_core::IntegrationKind;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn line_integration(credentials: serde_json::Value) -> Integration {
        Integration {
            id: "i1".into(),
            owner_id: "admin-1".into(),
            kind: IntegrationKind::Line,
            is_connected: true,
            credentials,
            config: serde_json::json!({}),
            created_at: now_iso(),
        }
    }

    #[test]
    fn credentials_require_access_token() {
        let err = LineCredentials::from_integration(&line_integration(serde_json::json!({})))
            .unwrap_err();
        assert!(err.to_string().contains("channel access token"));

        let creds = LineCredentials::from_integration(&line_integration(serde_json::json!({
            "channelAccessToken": "tok",
            "channelSecret": "sec"
        })))
        .unwrap();
        assert_eq!(creds.channel_access_token, "tok");
        assert_eq!(creds.channel_secret.as_deref(), Some("sec"));
    }

    #[tokio::test]
    async fn push_posts_expected_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(serde_json::json!({
                "to": "Uabc",
                "messages": [{ "type": "text", "text": "title\n\nbody" }]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = LineClient::with_base_url(server.uri());
        client.push("tok", "Uabc", "title\n\nbody").await.unwrap();
    }

    #[tokio::test]
    async fn push_surfaces_status_and_body_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = LineClient::with_base_url(server.uri());
        let err = client.push("tok", "Uabc", "hello").await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("429"), "{text}");
        assert!(text.contains("rate limited"), "{text}");
    }

    #[tokio::test]
    async fn profile_parses_camel_case_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/bot/profile/Uabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "displayName": "Alice",
                "pictureUrl": "https://cdn.example.com/a.png",
                "language": "en"
            })))
            .mount(&server)
            .await;

        let client = LineClient::with_base_url(server.uri());
        let profile = client.profile("tok", "Uabc").await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Alice"));
        assert_eq!(profile.language.as_deref(), Some("en"));
        assert!(profile.status_message.is_none());
    }

    #[test]
    fn signature_verification_accepts_valid_and_rejects_tampered() {
        let secret = "channel-secret";
        let body = br#"{"events":[]}"#;

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = BASE64.encode(mac.finalize().into_bytes());

        assert!(verify_signature(secret, body, &signature));
        assert!(!verify_signature(secret, br#"{"events":[{}]}"#, &signature));
        assert!(!verify_signature("other-secret", body, &signature));
        assert!(!verify_signature(secret, body, ""));
    }
}
