//! Datasource adapter
//!
//! Executes instant queries against a Prometheus-compatible HTTP API and
//! flattens the answer into a [`MeasurementResult`]: one entry per returned
//! series, keyed by its label-set text (`name{label="value", ...}`) with the
//! sample value as text.
//!
//! Clients are obtained per datasource through a [`DatasourceConnector`], so
//! the executor never knows which backend it is talking to.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{instrument, trace};

use crate::check::{Datasource, MeasurementResult};

/// Executes queries against one datasource
#[async_trait]
pub trait DatasourceClient: Send + Sync {
    async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<MeasurementResult>;
}

/// Builds query clients for datasources
pub trait DatasourceConnector: Send + Sync {
    fn connect(&self, datasource: &Datasource) -> Result<Arc<dyn DatasourceClient>>;
}

/// Connector for Prometheus HTTP API endpoints
///
/// Every client it hands out shares one connection pool.
#[derive(Clone)]
pub struct PrometheusConnector {
    client: reqwest::Client,
}

impl PrometheusConnector {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl DatasourceConnector for PrometheusConnector {
    fn connect(&self, datasource: &Datasource) -> Result<Arc<dyn DatasourceClient>> {
        let base = reqwest::Url::parse(&datasource.url)
            .with_context(|| format!("invalid datasource url '{}'", datasource.url))?;
        if base.cannot_be_a_base() {
            bail!("datasource url '{}' cannot be a base url", datasource.url);
        }

        let query_url = format!("{}/api/v1/query", base.as_str().trim_end_matches('/'));

        Ok(Arc::new(PrometheusClient {
            client: self.client.clone(),
            query_url,
        }))
    }
}

/// Instant-query client for a single Prometheus endpoint
pub struct PrometheusClient {
    client: reqwest::Client,
    query_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum QueryData {
    Vector(Vec<InstantSample>),
    Matrix(Vec<RangeSeries>),
    Scalar(SamplePair),
    String(SamplePair),
}

#[derive(Debug, Deserialize)]
struct InstantSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: SamplePair,
}

#[derive(Debug, Deserialize)]
struct RangeSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    values: Vec<SamplePair>,
}

/// `[unix_time, "value"]`
#[derive(Debug, Deserialize)]
struct SamplePair(#[allow(dead_code)] f64, String);

#[async_trait]
impl DatasourceClient for PrometheusClient {
    #[instrument(skip(self), fields(url = %self.query_url))]
    async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<MeasurementResult> {
        trace!("executing instant query");

        let response = self
            .client
            .get(&self.query_url)
            .query(&[("query", query), ("time", &at.timestamp().to_string())])
            .send()
            .await
            .context("failed to send query")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read query response")?;

        let parsed: ApiResponse = serde_json::from_str(&body)
            .with_context(|| format!("invalid query response (HTTP {status})"))?;

        if parsed.status != "success" {
            bail!(
                "query failed: {}",
                parsed.error.unwrap_or_else(|| format!("HTTP {status}"))
            );
        }

        let data = parsed.data.context("query response carries no data")?;
        Ok(flatten(data))
    }
}

fn flatten(data: QueryData) -> MeasurementResult {
    match data {
        QueryData::Vector(samples) => samples
            .into_iter()
            .map(|sample| (label_set_text(&sample.metric), sample.value.1))
            .collect(),
        QueryData::Matrix(series) => series
            .into_iter()
            .filter_map(|s| {
                let last = s.values.into_iter().next_back()?;
                Some((label_set_text(&s.metric), last.1))
            })
            .collect(),
        QueryData::Scalar(pair) | QueryData::String(pair) => {
            MeasurementResult::from([(String::new(), pair.1)])
        }
    }
}

/// Render a label set as `name{a="1", b="2"}`
///
/// The metric name is taken from `__name__`; an unnamed empty set renders
/// as `{}`.
pub fn label_set_text(labels: &BTreeMap<String, String>) -> String {
    let name = labels.get("__name__").map(String::as_str).unwrap_or("");
    let rendered: Vec<String> = labels
        .iter()
        .filter(|(label, _)| label.as_str() != "__name__")
        .map(|(label, value)| format!("{label}={value:?}"))
        .collect();

    if rendered.is_empty() {
        if name.is_empty() {
            return "{}".to_string();
        }
        return name.to_string();
    }

    format!("{}{{{}}}", name, rendered.join(", "))
}
