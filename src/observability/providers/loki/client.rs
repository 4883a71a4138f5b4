//! Loki HTTP API (`/loki/api/v1/*`) and its wire types

use reqwest::Client;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::ProviderEntry;
use crate::observability::models::Direction;
use crate::observability::ports::ProviderError;
use crate::observability::providers::http::ProviderHttpClient;

pub const VENDOR: &str = "loki";

/// `GET /loki/api/v1/query_range` response
#[derive(Debug, Deserialize)]
pub struct QueryRangeResponse {
    pub status: String,
    pub data: QueryRangeData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRangeData {
    pub result_type: String,
    /// Shape depends on `result_type`; only `streams` is decoded further
    #[serde(default)]
    pub result: serde_json::Value,
}

/// One labelled stream of log lines
#[derive(Debug, Clone, Deserialize)]
pub struct Stream {
    #[serde(default)]
    pub stream: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<StreamValue>,
}

/// `["<ns>", "<line>"]` or `["<ns>", "<line>", {structured metadata}]`
#[derive(Debug, Clone, PartialEq)]
pub struct StreamValue {
    pub timestamp: String,
    pub line: String,
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl<'de> Deserialize<'de> for StreamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TupleVisitor;

        impl<'de> Visitor<'de> for TupleVisitor {
            type Value = StreamValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a [timestamp, line] or [timestamp, line, metadata] array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<StreamValue, A::Error> {
                let timestamp: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let line: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let metadata: Option<BTreeMap<String, serde_json::Value>> =
                    seq.next_element::<Option<_>>()?.flatten();

                // Tolerate anything a newer Loki appends
                while seq.next_element::<de::IgnoredAny>()?.is_some() {}

                Ok(StreamValue {
                    timestamp,
                    line,
                    metadata: metadata.filter(|m| !m.is_empty()),
                })
            }
        }

        deserializer.deserialize_seq(TupleVisitor)
    }
}

/// `GET /loki/api/v1/labels` and `/label/<name>/values` response
#[derive(Debug, Deserialize)]
pub struct LabelsResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<String>,
}

/// Thin typed wrapper over the Loki HTTP API
#[derive(Debug, Clone)]
pub struct LokiClient {
    http: ProviderHttpClient,
}

impl LokiClient {
    pub fn new(http: ProviderHttpClient) -> Self {
        Self { http }
    }

    pub fn from_entry(client: Client, entry: &ProviderEntry) -> Self {
        Self::new(ProviderHttpClient::from_entry(VENDOR, client, entry))
    }

    pub fn name(&self) -> &str {
        self.http.name()
    }

    /// Range query; `start`/`end` are nanoseconds since the epoch
    pub async fn query_range(
        &self,
        query: &str,
        start: i64,
        end: i64,
        limit: usize,
        direction: Direction,
    ) -> Result<Vec<Stream>, ProviderError> {
        let params = [
            ("query", query.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("limit", limit.to_string()),
            ("direction", direction.as_str().to_string()),
        ];

        let response: QueryRangeResponse =
            self.http.get_json("/loki/api/v1/query_range", &params).await?;
        check_status(&response.status)?;

        if response.data.result_type != "streams" {
            return Err(ProviderError::Decode {
                vendor: VENDOR,
                message: format!(
                    "expected a streams result, got '{}'",
                    response.data.result_type
                ),
            });
        }

        if response.data.result.is_null() {
            return Ok(Vec::new());
        }

        serde_json::from_value(response.data.result).map_err(|e| ProviderError::Decode {
            vendor: VENDOR,
            message: e.to_string(),
        })
    }

    pub async fn labels(&self) -> Result<Vec<String>, ProviderError> {
        let response: LabelsResponse = self.http.get_json("/loki/api/v1/labels", &[]).await?;
        check_status(&response.status)?;
        Ok(response.data)
    }

    pub async fn label_values(&self, label: &str) -> Result<Vec<String>, ProviderError> {
        let path = format!("/loki/api/v1/label/{}/values", label);
        let response: LabelsResponse = self.http.get_json(&path, &[]).await?;
        check_status(&response.status)?;
        Ok(response.data)
    }

    pub async fn ready(&self) -> Result<(), ProviderError> {
        self.http.get_ok("/ready").await
    }
}

fn check_status(status: &str) -> Result<(), ProviderError> {
    if status == "success" {
        Ok(())
    } else {
        Err(ProviderError::Decode {
            vendor: VENDOR,
            message: format!("response status '{}'", status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_value_two_and_three_elements() {
        let values: Vec<StreamValue> = serde_json::from_str(
            r#"[["1","a"],["2","b",{"traceID":"abc"}],["3","c",{}],["4","d",null]]"#,
        )
        .unwrap();

        assert_eq!(values.len(), 4);
        assert_eq!(values[0].metadata, None);
        assert_eq!(
            values[1].metadata.as_ref().unwrap()["traceID"],
            serde_json::json!("abc")
        );
        assert_eq!(values[2].metadata, None);
        assert_eq!(values[3].line, "d");
    }

    #[test]
    fn test_stream_value_too_short_is_rejected() {
        assert!(serde_json::from_str::<StreamValue>(r#"["1"]"#).is_err());
    }

    #[test]
    fn test_stream_defaults() {
        let stream: Stream = serde_json::from_str(r#"{"values":[["1","x"]]}"#).unwrap();
        assert!(stream.stream.is_empty());
        assert_eq!(stream.values.len(), 1);
    }
}
