use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{GeozonesError, Result};
use crate::observability::metrics::{emit_counter, MetricName};

/// Flat property mapping of one feature
pub type Properties = Map<String, Value>;

/// A decoded geodata feature. Geometry is not kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Stable per-feature identifier (e.g. Natural Earth `NE_ID`)
    pub id: String,
    pub properties: Properties,
}

impl Feature {
    pub fn new(id: impl Into<String>, properties: Properties) -> Self {
        Self {
            id: id.into(),
            properties,
        }
    }

    /// Raw property as text, exact key
    pub fn property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

/// Where an extractor's features come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub url: String,
    pub encoding: Encoding,
}

impl SourceSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            encoding: Encoding::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Yields decoded features for a source
#[async_trait]
pub trait GeodataSource: Send + Sync {
    async fn features(&self, source: &SourceSpec) -> Result<Vec<Feature>>;
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Properties>,
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decode(bytes: Vec<u8>, encoding: Encoding, url: &str) -> Result<String> {
    match encoding {
        Encoding::Utf8 => String::from_utf8(bytes).map_err(|e| GeozonesError::Source {
            url: url.to_string(),
            message: format!("invalid UTF-8: {}", e),
        }),
        Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
    }
}

/// Parse a GeoJSON FeatureCollection.
///
/// The feature id is read from `id_property` when set and present, then from
/// the GeoJSON `id` member, then falls back to the feature index.
pub fn parse_feature_collection(text: &str, id_property: Option<&str>) -> Result<Vec<Feature>> {
    let collection: FeatureCollection = serde_json::from_str(text)?;
    Ok(collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let properties = raw.properties.unwrap_or_default();
            let id = id_property
                .and_then(|key| properties.get(key))
                .and_then(value_as_id)
                .or_else(|| raw.id.as_ref().and_then(value_as_id))
                .unwrap_or_else(|| index.to_string());
            Feature::new(id, properties)
        })
        .collect())
}

/// GeoJSON source reading `http(s)://` URLs, `file://` URLs and local paths
pub struct GeoJsonSource {
    client: reqwest::Client,
    id_property: Option<String>,
}

impl GeoJsonSource {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            id_property: None,
        })
    }

    pub fn with_id_property(mut self, property: &str) -> Self {
        self.id_property = Some(property.to_string());
        self
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Ok(tokio::fs::read(path).await?)
        }
    }

    async fn load(&self, source: &SourceSpec) -> Result<Vec<Feature>> {
        let bytes = self.fetch(&source.url).await?;
        let text = decode(bytes, source.encoding, &source.url)?;
        parse_feature_collection(&text, self.id_property.as_deref())
    }
}

#[async_trait]
impl GeodataSource for GeoJsonSource {
    async fn features(&self, source: &SourceSpec) -> Result<Vec<Feature>> {
        debug!("Fetching features from {}", source.url);
        let result = self.load(source).await;
        match &result {
            Ok(features) => {
                emit_counter(MetricName::SourcesFetchSuccess, 1);
                debug!("Decoded {} features from {}", features.len(), source.url);
            }
            Err(_) => emit_counter(MetricName::SourcesFetchError, 1),
        }
        result
    }
}

/// Features held in memory, keyed by source URL
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    features: HashMap<String, Vec<Feature>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features(mut self, url: &str, features: Vec<Feature>) -> Self {
        self.features.entry(url.to_string()).or_default().extend(features);
        self
    }
}

#[async_trait]
impl GeodataSource for StaticSource {
    async fn features(&self, source: &SourceSpec) -> Result<Vec<Feature>> {
        self.features
            .get(&source.url)
            .cloned()
            .ok_or_else(|| GeozonesError::Source {
                url: source.url.clone(),
                message: "no such source".to_string(),
            })
    }
}
