use async_trait::async_trait;

use super::client::{PrometheusClient, VENDOR};
use crate::observability::ports::{MetricsClient, ProviderError};

/// [`MetricsClient`] over Prometheus
#[derive(Debug, Clone)]
pub struct PrometheusAdapter {
    client: PrometheusClient,
}

impl PrometheusAdapter {
    pub fn new(client: PrometheusClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsClient for PrometheusAdapter {
    fn provider_type(&self) -> &str {
        VENDOR
    }

    async fn get_metric_names(&self) -> Result<Vec<String>, ProviderError> {
        self.client.label_values("__name__").await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.client.ready().await
    }
}
