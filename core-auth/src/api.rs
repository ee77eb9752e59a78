//! REST client for the identity provider's API.
//!
//! Every request gets the `Client-Id` header. The bearer credential is passed
//! in per call; the client keeps no mutable default headers, so a request
//! built after sign-out can never carry a stale token.

use crate::error::{AuthError, Result};
use crate::types::{AccessToken, UserProfile};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::config::IdentityProviderConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `{ "data": [...] }` envelope used by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Vec<T>,
}

pub struct ApiClient {
    base_url: String,
    client_id: String,
    http_client: Arc<dyn HttpClient>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            http_client,
        }
    }

    pub fn from_config(config: &IdentityProviderConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self::new(config.api_base_url.clone(), config.client_id.clone(), http_client)
    }

    /// Build a request against `path` relative to the API base URL.
    ///
    /// `Authorization: Bearer <token>` is attached only when `credential` is
    /// given.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        credential: Option<&AccessToken>,
    ) -> HttpRequest {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let request = HttpRequest::new(method, url)
            .header("Client-Id", self.client_id.clone())
            .timeout(REQUEST_TIMEOUT);

        match credential {
            Some(token) => request.bearer_token(token.secret()),
            None => request,
        }
    }

    /// Execute a request, mapping transport failures and non-2xx responses.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(status = status, error = %body, "API request failed");
            return Err(AuthError::Api { status, body });
        }

        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: Option<&AccessToken>,
    ) -> Result<T> {
        let response = self
            .send(self.request(HttpMethod::Get, path, credential))
            .await?;

        response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse {} response: {}", path, e)))
    }

    /// Fetch the profile the token belongs to (`GET /users`, element 0).
    #[instrument(skip(self, credential))]
    pub async fn fetch_current_user(&self, credential: &AccessToken) -> Result<UserProfile> {
        let envelope: DataEnvelope<UserProfile> = self.get_json("users", Some(credential)).await?;

        let profile = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::ProfileUnavailable("the user list is empty".to_string()))?;

        debug!(user_id = %profile.id, "Fetched current user");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait::async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn client_with(http_client: MockHttpClient) -> ApiClient {
        ApiClient::new("https://api.twitch.tv/helix", "abc123", Arc::new(http_client))
    }

    #[test]
    fn test_request_without_credential() {
        let api = client_with(MockHttpClient::new());
        let request = api.request(HttpMethod::Get, "/users", None);

        assert_eq!(request.url, "https://api.twitch.tv/helix/users");
        assert_eq!(request.header_value("Client-Id"), Some("abc123"));
        assert_eq!(request.header_value("Authorization"), None);
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_request_with_credential() {
        let api = ApiClient::new(
            "https://api.twitch.tv/helix/",
            "abc123",
            Arc::new(MockHttpClient::new()),
        );
        let token = AccessToken::new("tok1");
        let request = api.request(HttpMethod::Get, "users/follows", Some(&token));

        assert_eq!(request.url, "https://api.twitch.tv/helix/users/follows");
        assert_eq!(request.header_value("Authorization"), Some("Bearer tok1"));
    }

    #[tokio::test]
    async fn test_fetch_current_user_takes_first_entry() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Get
                    && request.url == "https://api.twitch.tv/helix/users"
                    && request.header_value("Authorization") == Some("Bearer tok1")
                    && request.header_value("Client-Id") == Some("abc123")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"data":[{"id":"1","display_name":"Bob"},{"id":"2","display_name":"Eve"}]}"#,
                ))
            });

        let api = client_with(http_client);
        let profile = api.fetch_current_user(&AccessToken::new("tok1")).await.unwrap();

        assert_eq!(profile.id, "1");
        assert_eq!(profile.display_name, "Bob");
    }

    #[tokio::test]
    async fn test_fetch_current_user_empty_list() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"data":[]}"#)));

        let api = client_with(http_client);
        let result = api.fetch_current_user(&AccessToken::new("tok1")).await;

        assert!(matches!(result, Err(AuthError::ProfileUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fetch_current_user_unauthorized() {
        let mut http_client = MockHttpClient::new();
        http_client.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                401,
                r#"{"error":"Unauthorized","status":401,"message":"Invalid OAuth token"}"#,
            ))
        });

        let api = client_with(http_client);
        let result = api.fetch_current_user(&AccessToken::new("expired")).await;

        match result {
            Err(AuthError::Api { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid OAuth token"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_current_user_network_error() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("Request timed out".to_string())));

        let api = client_with(http_client);
        let result = api.fetch_current_user(&AccessToken::new("tok1")).await;

        assert!(matches!(result, Err(AuthError::Network(ref m)) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_fetch_current_user_malformed_body() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "not json")));

        let api = client_with(http_client);
        let result = api.fetch_current_user(&AccessToken::new("tok1")).await;

        assert!(matches!(result, Err(AuthError::Other(_))));
    }
}
