use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::{AuthConfig, AuthType, ProviderEntry};
use crate::metrics;
use crate::observability::ports::ProviderError;

/// Longest upstream error body echoed back to the caller
const MAX_ERROR_BODY: usize = 512;

/// Credentials attached to every request of a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderAuth {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer {
        token: String,
    },
}

impl ProviderAuth {
    pub fn from_config(auth: &AuthConfig) -> Option<Self> {
        match auth.auth_type {
            AuthType::Basic => Some(Self::Basic {
                username: auth.username.clone()?,
                password: auth.password.clone(),
            }),
            AuthType::Bearer => Some(Self::Bearer {
                token: auth.token.clone()?,
            }),
        }
    }
}

/// HTTP plumbing shared by every vendor client: base address, per-exchange
/// timeout, optional auth, and error mapping into [`ProviderError`].
///
/// Cheap to clone; the inner `reqwest::Client` shares its connection pool.
#[derive(Debug, Clone)]
pub struct ProviderHttpClient {
    vendor: &'static str,
    name: String,
    client: Client,
    base_url: String,
    timeout: Duration,
    auth: Option<ProviderAuth>,
}

impl ProviderHttpClient {
    pub fn new(
        vendor: &'static str,
        name: impl Into<String>,
        client: Client,
        base_url: impl Into<String>,
        timeout: Duration,
        auth: Option<ProviderAuth>,
    ) -> Self {
        Self {
            vendor,
            name: name.into(),
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            auth,
        }
    }

    pub fn from_entry(vendor: &'static str, client: Client, entry: &ProviderEntry) -> Self {
        Self::new(
            vendor,
            entry.name.clone(),
            client,
            entry.url.clone(),
            entry.timeout,
            entry.auth.as_ref().and_then(ProviderAuth::from_config),
        )
    }

    pub fn vendor(&self) -> &'static str {
        self.vendor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.get(&url).timeout(self.timeout);

        match &self.auth {
            Some(ProviderAuth::Basic { username, password }) => {
                req = req.basic_auth(username, password.as_ref());
            }
            Some(ProviderAuth::Bearer { token }) => {
                req = req.bearer_auth(token);
            }
            None => {}
        }

        req
    }

    /// GET `path` and decode a JSON body; non-2xx becomes `Upstream`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self.send(self.request(path).query(query)).await?;
        let response = self.check_status(response).await?;

        let body = response.bytes().await.map_err(|e| self.map_reqwest_error(e))?;
        serde_json::from_slice(&body).map_err(|e| ProviderError::Decode {
            vendor: self.vendor,
            message: e.to_string(),
        })
    }

    /// GET `path` and only check for a 2xx status
    pub async fn get_ok(&self, path: &str) -> Result<(), ProviderError> {
        let response = self.send(self.request(path)).await?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ProviderError> {
        match req.send().await {
            Ok(response) => Ok(response),
            Err(e) => {
                metrics::record_provider_request(self.vendor, &self.name, "transport_error");
                Err(self.map_reqwest_error(e))
            }
        }
    }

    async fn check_status(&self, response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            metrics::record_provider_request(self.vendor, &self.name, "success");
            return Ok(response);
        }

        metrics::record_provider_request(self.vendor, &self.name, "upstream_error");
        let text = response.text().await.unwrap_or_default();
        Err(ProviderError::Upstream {
            vendor: self.vendor,
            status: status.as_u16(),
            message: summarize_error_body(status, &text),
        })
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                vendor: self.vendor,
                message: format!("no response within {:?}", self.timeout),
            }
        } else {
            ProviderError::Transport {
                vendor: self.vendor,
                message: err.to_string(),
            }
        }
    }
}

/// Reduce an upstream error body to one bounded line
fn summarize_error_body(status: StatusCode, body: &str) -> String {
    let line = body
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));

    if line.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &line[..cut])
    } else {
        line.to_string()
    }
}
