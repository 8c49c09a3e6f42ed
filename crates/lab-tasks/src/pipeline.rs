use async_trait::async_trait;
use lab_types::Result;
use serde_json::Value;

use crate::listing::Listing;
use crate::task::ProcessorParams;

/// Fetches raw records from an external system. Errors propagate and fail
/// the run (spec.md §4.7: "Source: returns raw records; errors propagate").
#[async_trait]
pub trait Source: Send + Sync {
    fn id(&self) -> &str;
    async fn fetch(&self, params: &Value) -> Result<Vec<Value>>;
}

/// Maps raw records to [`Listing`]s. Items that fail normalization are
/// dropped with a warning, never fatal to the run.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, raw: Vec<Value>) -> Vec<Listing>;
}

/// Side-effecting consumer of the processed listings (notify, store, ...).
/// Failures are logged and do not retry within the same run.
#[async_trait]
pub trait Sink: Send + Sync {
    fn id(&self) -> &str;
    async fn send(&self, listings: &[Listing]) -> Result<()>;
}

/// Filters by `{min_price, max_price, currency}`, sorts ascending by
/// price, and truncates to `top_n`.
pub fn process(listings: Vec<Listing>, params: &ProcessorParams) -> Vec<Listing> {
    let mut filtered: Vec<Listing> = listings
        .into_iter()
        .filter(|l| l.currency == params.currency && l.price >= params.min_price && l.price <= params.max_price)
        .collect();
    filtered.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
    filtered.truncate(params.top_n);
    filtered
}

/// Flexible field-mapping normalizer: pulls `id/title/price/currency/url`
/// out of whatever shape the raw record has, trying a list of candidate
/// field names per target field before giving up on that record.
pub struct FieldMappingNormalizer {
    id_fields: Vec<&'static str>,
    title_fields: Vec<&'static str>,
    price_fields: Vec<&'static str>,
    url_fields: Vec<&'static str>,
    currency_fields: Vec<&'static str>,
}

impl Default for FieldMappingNormalizer {
    fn default() -> Self {
        Self {
            id_fields: vec!["id", "listingId", "listing_id"],
            title_fields: vec!["title", "name", "text", "heading"],
            price_fields: vec!["price", "priceText", "amount", "formatted_amount"],
            url_fields: vec!["url", "link", "listingUrl"],
            currency_fields: vec!["currency"],
        }
    }
}

impl FieldMappingNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_str(item: &Value, fields: &[&str]) -> Option<String> {
        fields.iter().find_map(|f| item.get(*f)).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    fn extract_price(item: &Value, fields: &[&str]) -> Option<f64> {
        fields.iter().find_map(|f| item.get(*f)).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
                cleaned.parse::<f64>().ok()
            }
            _ => None,
        })
    }

    fn extract_images(item: &Value) -> Vec<String> {
        match item.get("images") {
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => vec![],
        }
    }

    fn normalize_one(&self, item: &Value) -> Option<Listing> {
        let id = Self::extract_str(item, &self.id_fields)?;
        let title = Self::extract_str(item, &self.title_fields)?;
        let url = Self::extract_str(item, &self.url_fields)?;
        let price = Self::extract_price(item, &self.price_fields)?;
        let currency = Self::extract_str(item, &self.currency_fields).unwrap_or_else(|| "USD".to_string());

        let listing = Listing {
            id,
            title,
            price,
            currency,
            url,
            images: Self::extract_images(item),
            posted_at: None,
            location: item.get("location").cloned(),
            seller: item.get("seller").cloned(),
            raw: item.clone(),
        };
        listing.is_valid().then_some(listing)
    }
}

impl Normalizer for FieldMappingNormalizer {
    fn normalize(&self, raw: Vec<Value>) -> Vec<Listing> {
        let mut out = Vec::with_capacity(raw.len());
        for item in &raw {
            match self.normalize_one(item) {
                Some(listing) => out.push(listing),
                None => tracing::warn!(item = %item, "dropping item that failed normalization"),
            }
        }
        out
    }
}
