//! Resource Map (MFR) registry models

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Identifier that the registry may send as a JSON number or string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FlexibleId(pub String);

impl<'de> Deserialize<'de> for FlexibleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        value_to_id(&value)
            .map(FlexibleId)
            .ok_or_else(|| serde::de::Error::custom(format!("expected string or number id, got {}", value)))
    }
}

impl std::fmt::Display for FlexibleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a scalar JSON value as an identifier string
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Entry of `GET /collections`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Collection {
    pub id: FlexibleId,
    pub name: String,
}

/// Layer of `GET /collections/{id}/fields.json`
#[derive(Debug, Clone, Deserialize)]
pub struct Layer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<LayerField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerField {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
}

impl LayerField {
    /// The nested hierarchy payload of a `hierarchy` field
    pub fn hierarchy(&self) -> Option<&Value> {
        self.config.as_ref()?.get("hierarchy")
    }

    fn matches(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code) || self.name.as_deref() == Some(code)
    }
}

/// Find the hierarchy document carried by the field with the given code
pub fn find_hierarchy<'a>(layers: &'a [Layer], field_code: &str) -> Option<&'a Value> {
    layers
        .iter()
        .flat_map(|layer| layer.fields.iter())
        .find(|field| field.matches(field_code))
        .and_then(LayerField::hierarchy)
}

/// Site as returned in a collection page or by `GET /sites/{id}.json`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSite {
    pub id: FlexibleId,
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub long: Option<f64>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// One page of `GET /collections/{id}.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePage {
    #[serde(default)]
    pub sites: Vec<RawSite>,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl SitePage {
    /// Error message embedded in an otherwise successful response
    pub fn embedded_error(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref().filter(|url| !url.is_empty())
    }
}

/// Property names used to read facility attributes out of a site
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PropertyKeys {
    pub admin_hierarchy: String,
    pub national_identifier: String,
    pub year_opened: String,
    pub short_name: String,
    pub is_phcu: String,
    pub parent_phcu: String,
    pub phone_number: String,
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            admin_hierarchy: "Admin_health_hierarchy".into(),
            national_identifier: "ethiopian_national_id".into(),
            year_opened: "year_opened".into(),
            short_name: "specific_area_name".into(),
            is_phcu: "is_phcu".into(),
            parent_phcu: "parent_phcu_id".into(),
            phone_number: "phone_number".into(),
        }
    }
}

/// Source-side facility record
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityRecord {
    pub id: String,
    pub name: String,
    /// (latitude, longitude)
    pub coordinates: Option<(f64, f64)>,
    /// References a hierarchy node id
    pub admin_hierarchy_code: String,
    pub national_identifier: String,
    pub year_opened: Option<NaiveDate>,
    pub short_name: Option<String>,
    pub is_phcu: bool,
    pub parent_phcu_id: Option<String>,
    pub phone_number: Option<String>,
}

impl FacilityRecord {
    /// Map a raw registry site onto a facility record.
    ///
    /// A site without a national identifier falls back to its registry id so
    /// it still has a stable destination code.
    pub fn from_site(site: &RawSite, keys: &PropertyKeys) -> Self {
        let props = &site.properties;
        let text = |key: &str| -> Option<String> { props.get(key).and_then(value_to_id) };

        let coordinates = match (site.lat, site.long) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        };

        Self {
            id: site.id.0.clone(),
            name: site.name.trim().to_string(),
            coordinates,
            admin_hierarchy_code: text(&keys.admin_hierarchy).unwrap_or_default(),
            national_identifier: text(&keys.national_identifier)
                .unwrap_or_else(|| site.id.0.clone()),
            year_opened: text(&keys.year_opened).as_deref().and_then(parse_year_opened),
            short_name: text(&keys.short_name),
            is_phcu: props.get(&keys.is_phcu).map(truthy).unwrap_or(false),
            parent_phcu_id: text(&keys.parent_phcu),
            phone_number: text(&keys.phone_number),
        }
    }

    /// A PHCU record without a parent reference is the parent half of a pair
    pub fn is_phcu_parent(&self) -> bool {
        self.is_phcu && self.parent_phcu_id.is_none()
    }

    pub fn is_phcu_child(&self) -> bool {
        self.is_phcu && self.parent_phcu_id.is_some()
    }
}

/// Accepts `YYYY-MM-DD`, ISO timestamps, or a bare year
fn parse_year_opened(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed.get(..10).unwrap_or(trimmed), "%Y-%m-%d") {
        return Some(date);
    }
    trimmed
        .parse::<i32>()
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "y"),
        _ => false,
    }
}
