use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized record produced by a [`crate::pipeline::Normalizer`] and
/// consumed by the processor and sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub url: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub location: Option<Value>,
    pub seller: Option<Value>,
    pub raw: Value,
}

impl Listing {
    /// `id`, `title`, `url`, `currency` non-empty; `price >= 0`.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && !self.title.is_empty()
            && !self.url.is_empty()
            && !self.currency.is_empty()
            && self.price >= 0.0
    }
}
