//! Client for the application's API-key check endpoint.
//!
//! `POST {app_path}/openapi/task/checkApikey` with
//! `{"apikey", "nodeId", "port"}` answers
//!
//! ```json
//! {"_result": 0, "_desc": "", "data": {"apiToken": "...", "result": true}}
//! ```
//!
//! A non-zero `_result` is an exchange error; `data.result == false` is a
//! rejection.

use crate::domain::AuthError;
use crate::ports::TokenExchange;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Path of the key-check endpoint relative to the application root.
pub const CHECK_API_KEY_PATH: &str = "/openapi/task/checkApikey";

#[derive(Debug, Serialize)]
struct CheckApiKeyRequest<'a> {
    apikey: &'a str,
    #[serde(rename = "nodeId")]
    node_id: &'a str,
    port: String,
}

#[derive(Debug, Deserialize)]
struct CheckApiKeyResponse {
    #[serde(rename = "_result")]
    result: i64,
    #[serde(rename = "_desc", default)]
    desc: String,
    #[serde(default)]
    data: Option<CheckApiKeyData>,
}

#[derive(Debug, Deserialize)]
struct CheckApiKeyData {
    #[serde(rename = "apiToken", default)]
    api_token: String,
    #[serde(default)]
    result: bool,
}

/// [`TokenExchange`] backed by the application's HTTP API.
#[derive(Debug, Clone)]
pub struct AuthAgentClient {
    client: Client,
    app_path: String,
}

impl AuthAgentClient {
    pub fn new(app_path: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            app_path: app_path.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.app_path, CHECK_API_KEY_PATH)
    }
}

#[async_trait]
impl TokenExchange for AuthAgentClient {
    async fn exchange(
        &self,
        api_key: &str,
        node_id: &str,
        port: u16,
    ) -> Result<Option<String>, AuthError> {
        let body = CheckApiKeyRequest {
            apikey: api_key,
            node_id,
            port: port.to_string(),
        };

        let response: CheckApiKeyResponse = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        if response.result != 0 {
            return Err(AuthError::Exchange(response.desc));
        }

        match response.data {
            Some(data) if data.result => {
                debug!(node_id = %node_id, port, "api key exchanged");
                Ok(Some(data.api_token))
            }
            _ => Ok(None),
        }
    }
}
