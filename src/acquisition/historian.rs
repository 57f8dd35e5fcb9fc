//! Historian fetch boundary
//!
//! `HistorianFetch` is the only way analysis code obtains samples. Two
//! implementations ship with the crate:
//!
//! - `TimebaseClient`: HTTP queries against a Timebase historian with a
//!   per-request timeout and exponential backoff on transient failures
//! - `MemoryHistorian`: in-memory series, loadable from a JSON replay file
//!
//! Both return every requested tag; a tag the historian does not know maps
//! to an empty series. Latest-value queries (`fetch_latest`) also keep text
//! readings such as equipment state names and work-order numbers.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{defaults, HistorianConfig};
use crate::types::{AnalysisWindow, FetchError, LatestValue, Sample, TagValue};

/// Series keyed by tag path
pub type TagSeries = HashMap<String, Vec<Sample>>;

/// Latest reading keyed by tag path. Tags without a reading are absent.
pub type LatestValues = HashMap<String, LatestValue>;

/// Capability to fetch tag samples over an absolute window.
#[async_trait]
pub trait HistorianFetch: Send + Sync {
    /// Fetch all `tags` over `window`. Series are chronological.
    async fn fetch(&self, tags: &[String], window: &AnalysisWindow) -> Result<TagSeries, FetchError>;

    /// Convenience wrapper for a single tag.
    async fn fetch_one(&self, tag: &str, window: &AnalysisWindow) -> Result<Vec<Sample>, FetchError> {
        let mut series = self.fetch(&[tag.to_string()], window).await?;
        Ok(series.remove(tag).unwrap_or_default())
    }

    /// Most recent reading of each tag inside `window`.
    ///
    /// The default only sees numeric readings; implementations that can
    /// return text override it.
    async fn fetch_latest(&self, tags: &[String], window: &AnalysisWindow) -> Result<LatestValues, FetchError> {
        let series = self.fetch(tags, window).await?;
        Ok(series
            .into_iter()
            .filter_map(|(tag, samples)| samples.last().map(|s| (tag, LatestValue::from(s))))
            .collect())
    }
}

// ============================================================================
// Timebase wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct TagListResponse {
    #[serde(default)]
    tl: Vec<TagData>,
}

#[derive(Debug, Deserialize)]
struct TagData {
    t: TagHeader,
    #[serde(default)]
    d: Vec<DataPoint>,
}

#[derive(Debug, Deserialize)]
struct TagHeader {
    n: String,
}

#[derive(Debug, Deserialize)]
struct DataPoint {
    t: String,
    #[serde(default)]
    v: Option<serde_json::Value>,
    #[serde(default)]
    q: Option<i32>,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Timestamps without an offset are UTC
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn numeric_value(v: &serde_json::Value) -> Option<f64> {
    TagValue::from_json(v).and_then(|v| v.as_f64())
}

fn parse_response(body: &str) -> Result<TagListResponse, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Decode a `{"tl": [{"t": {"n": ..}, "d": [{"t", "v", "q"}]}]}` body.
///
/// Points without a numeric value are dropped. A point whose timestamp does
/// not parse fails the whole response.
fn decode_response(body: &str, default_quality: i32) -> Result<TagSeries, FetchError> {
    let response = parse_response(body)?;

    let mut series = TagSeries::new();
    for tag in response.tl {
        let mut samples = Vec::with_capacity(tag.d.len());
        for point in tag.d {
            let Some(value) = point.v.as_ref().and_then(numeric_value) else {
                continue;
            };
            let timestamp = parse_timestamp(&point.t).ok_or_else(|| {
                FetchError::Decode(format!("bad timestamp '{}' on {}", point.t, tag.t.n))
            })?;
            samples.push(Sample::with_quality(
                timestamp,
                value,
                point.q.unwrap_or(default_quality),
            ));
        }
        samples.sort_by_key(|s| s.timestamp);
        series.entry(tag.t.n).or_default().extend(samples);
    }
    Ok(series)
}

/// Decode the same body keeping only the newest reading per tag, text included.
fn decode_latest(body: &str, default_quality: i32) -> Result<LatestValues, FetchError> {
    let response = parse_response(body)?;

    let mut latest = LatestValues::new();
    for tag in response.tl {
        for point in tag.d {
            let Some(value) = point.v.as_ref().and_then(TagValue::from_json) else {
                continue;
            };
            let timestamp = parse_timestamp(&point.t).ok_or_else(|| {
                FetchError::Decode(format!("bad timestamp '{}' on {}", point.t, tag.t.n))
            })?;
            let reading = LatestValue {
                timestamp,
                value,
                quality: point.q.unwrap_or(default_quality),
            };
            match latest.get(&tag.t.n) {
                Some(current) if current.timestamp > timestamp => {}
                _ => {
                    latest.insert(tag.t.n.clone(), reading);
                }
            }
        }
    }
    Ok(latest)
}

// ============================================================================
// TimebaseClient
// ============================================================================

/// HTTP client for the Timebase historian REST API.
#[derive(Clone)]
pub struct TimebaseClient {
    http: reqwest::Client,
    config: HistorianConfig,
    default_quality: i32,
}

impl TimebaseClient {
    pub fn new(config: HistorianConfig, default_quality: i32) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(defaults::HISTORIAN_USER_AGENT)
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self {
            http,
            config,
            default_quality,
        })
    }

    fn data_url(&self) -> Result<reqwest::Url, FetchError> {
        let mut url = reqwest::Url::parse(self.config.base_url.trim_end_matches('/'))
            .map_err(|e| FetchError::Http(format!("invalid base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Http("base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "datasets", self.config.dataset.as_str(), "data"]);
        Ok(url)
    }

    /// One HTTP query for a batch of tags. Returns the raw response body.
    async fn query(&self, tags: &[String], window: &AnalysisWindow) -> Result<String, FetchError> {
        let mut params: Vec<(&str, String)> = tags.iter().map(|t| ("tagname", t.clone())).collect();
        params.push(("start", window.start.to_rfc3339()));
        params.push(("end", window.end.to_rfc3339()));

        let resp = self
            .http
            .get(self.data_url()?)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.config.timeout_secs)
                } else {
                    FetchError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| FetchError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(defaults::ERROR_BODY_PREVIEW_CHARS).collect(),
            });
        }

        Ok(body)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let ms = self
            .config
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
            .min(self.config.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Query with retry. Only transient errors are retried.
    async fn query_with_retry(
        &self,
        tags: &[String],
        window: &AnalysisWindow,
    ) -> Result<String, FetchError> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.query(tags, window).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Historian query failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts,
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl HistorianFetch for TimebaseClient {
    async fn fetch(&self, tags: &[String], window: &AnalysisWindow) -> Result<TagSeries, FetchError> {
        // Batches go out together; any batch failing fails the whole fetch
        let bodies = try_join_all(
            tags.chunks(self.config.batch_size.max(1))
                .map(|batch| self.query_with_retry(batch, window)),
        )
        .await?;

        let mut series = TagSeries::new();
        for body in &bodies {
            for (tag, samples) in decode_response(body, self.default_quality)? {
                series.entry(tag).or_default().extend(samples);
            }
        }
        for tag in tags {
            series.entry(tag.clone()).or_default();
        }

        debug!(
            tags = tags.len(),
            points = series.values().map(Vec::len).sum::<usize>(),
            "Historian fetch complete"
        );
        Ok(series)
    }

    async fn fetch_latest(&self, tags: &[String], window: &AnalysisWindow) -> Result<LatestValues, FetchError> {
        let bodies = try_join_all(
            tags.chunks(self.config.batch_size.max(1))
                .map(|batch| self.query_with_retry(batch, window)),
        )
        .await?;

        let mut latest = LatestValues::new();
        for body in &bodies {
            latest.extend(decode_latest(body, self.default_quality)?);
        }
        debug!(tags = tags.len(), found = latest.len(), "Historian latest-value fetch complete");
        Ok(latest)
    }
}

// ============================================================================
// MemoryHistorian
// ============================================================================

/// Replay file entry: `{"<tag>": [{"timestamp", "value", "quality"?}]}`
///
/// A tag whose values are all numeric becomes a sample series; any text
/// value makes it a latest-value-only tag.
type ReplayFile = HashMap<String, Vec<LatestValue>>;

/// In-memory historian for replay and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistorian {
    series: TagSeries,
    /// Text-valued tags (state names, work-order fields)
    text: HashMap<String, Vec<LatestValue>>,
}

impl MemoryHistorian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a tag's series. Samples are kept chronological.
    pub fn insert(&mut self, tag: impl Into<String>, mut samples: Vec<Sample>) {
        samples.sort_by_key(|s| s.timestamp);
        self.series.insert(tag.into(), samples);
    }

    pub fn with_series(mut self, tag: impl Into<String>, samples: Vec<Sample>) -> Self {
        self.insert(tag, samples);
        self
    }

    /// Add (or replace) a text-valued tag. Only `fetch_latest` sees it.
    pub fn insert_text(&mut self, tag: impl Into<String>, mut readings: Vec<LatestValue>) {
        readings.sort_by_key(|r| r.timestamp);
        self.text.insert(tag.into(), readings);
    }

    pub fn with_text(mut self, tag: impl Into<String>, at: DateTime<Utc>, value: &str) -> Self {
        let tag = tag.into();
        let mut readings = self.text.remove(&tag).unwrap_or_default();
        readings.push(LatestValue::new(at, TagValue::Text(value.to_string())));
        self.insert_text(tag, readings);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, FetchError> {
        let file: ReplayFile =
            serde_json::from_str(raw).map_err(|e| FetchError::Decode(e.to_string()))?;
        let mut historian = Self::new();
        for (tag, readings) in file {
            let numeric: Option<Vec<Sample>> = readings
                .iter()
                .map(|r| {
                    r.value
                        .as_f64()
                        .map(|v| Sample::with_quality(r.timestamp, v, r.quality))
                })
                .collect();
            match numeric {
                Some(samples) => historian.insert(tag, samples),
                None => historian.insert_text(tag, readings),
            }
        }
        Ok(historian)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, FetchError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Unavailable(format!("{}: {e}", path.display())))?;
        let historian = Self::from_json_str(&raw)?;
        debug!(
            path = %path.display(),
            tags = historian.series.len() + historian.text.len(),
            "Loaded replay file"
        );
        Ok(historian)
    }
}

#[async_trait]
impl HistorianFetch for MemoryHistorian {
    async fn fetch(&self, tags: &[String], window: &AnalysisWindow) -> Result<TagSeries, FetchError> {
        Ok(tags
            .iter()
            .map(|tag| {
                let samples = self
                    .series
                    .get(tag)
                    .map(|s| {
                        s.iter()
                            .filter(|p| window.contains(p.timestamp))
                            .copied()
                            .collect()
                    })
                    .unwrap_or_default();
                (tag.clone(), samples)
            })
            .collect())
    }

    async fn fetch_latest(&self, tags: &[String], window: &AnalysisWindow) -> Result<LatestValues, FetchError> {
        let mut latest = LatestValues::new();
        for tag in tags {
            let numeric = self
                .series
                .get(tag)
                .and_then(|s| s.iter().rev().find(|p| window.contains(p.timestamp)))
                .map(LatestValue::from);
            let text = self
                .text
                .get(tag)
                .and_then(|r| r.iter().rev().find(|p| window.contains(p.timestamp)))
                .cloned();
            let newest = match (numeric, text) {
                (Some(n), Some(t)) => Some(if t.timestamp >= n.timestamp { t } else { n }),
                (n, t) => n.or(t),
            };
            if let Some(reading) = newest {
                latest.insert(tag.clone(), reading);
            }
        }
        Ok(latest)
    }
}
