//! Prometheus HTTP API (`/api/v1/*`)

use reqwest::Client;
use serde::Deserialize;

use crate::config::ProviderEntry;
use crate::observability::ports::ProviderError;
use crate::observability::providers::http::ProviderHttpClient;

pub const VENDOR: &str = "prometheus";

/// `{"status":"success","data":[...]}`, or an error with `error`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelValuesResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: ProviderHttpClient,
}

impl PrometheusClient {
    pub fn new(http: ProviderHttpClient) -> Self {
        Self { http }
    }

    pub fn from_entry(client: Client, entry: &ProviderEntry) -> Self {
        Self::new(ProviderHttpClient::from_entry(VENDOR, client, entry))
    }

    pub async fn label_values(&self, label: &str) -> Result<Vec<String>, ProviderError> {
        let path = format!("/api/v1/label/{}/values", label);
        let response: LabelValuesResponse = self.http.get_json(&path, &[]).await?;

        if response.status != "success" {
            return Err(ProviderError::Decode {
                vendor: VENDOR,
                message: response
                    .error
                    .unwrap_or_else(|| format!("response status '{}'", response.status)),
            });
        }
        Ok(response.data)
    }

    pub async fn ready(&self) -> Result<(), ProviderError> {
        self.http.get_ok("/-/ready").await
    }
}
