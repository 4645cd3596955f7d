//! DHIS2 organisation unit models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Maximum length DHIS2 accepts for `shortName`
pub const SHORT_NAME_MAX: usize = 50;

/// Destination-side projection of a hierarchy node or facility
#[derive(Debug, Clone, PartialEq)]
pub struct OrgUnit {
    /// Assigned by the destination; set for updates
    pub id: Option<String>,
    pub name: String,
    pub short_name: String,
    /// Stable cross-system key, used for every existence check
    pub code: String,
    pub opening_date: NaiveDate,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone_number: Option<String>,
    pub parent_id: Option<String>,
}

impl OrgUnit {
    pub fn new(
        name: impl Into<String>,
        short_name: impl Into<String>,
        code: impl Into<String>,
        opening_date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            short_name: short_name.into(),
            code: code.into(),
            opening_date,
            latitude: None,
            longitude: None,
            phone_number: None,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// JSON payload in the shape DHIS2 expects for create and metadata import
    pub fn to_payload(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("name".into(), json!(self.name));
        obj.insert("shortName".into(), json!(self.short_name));
        obj.insert("code".into(), json!(self.code));
        obj.insert(
            "openingDate".into(),
            json!(self.opening_date.format("%Y-%m-%d").to_string()),
        );

        if let Some(id) = &self.id {
            obj.insert("id".into(), json!(id));
        }
        if let Some(parent) = &self.parent_id {
            obj.insert("parent".into(), json!({ "id": parent }));
        }
        if let Some(phone) = &self.phone_number {
            obj.insert("phoneNumber".into(), json!(phone));
        }
        if let (Some(lat), Some(lng)) = (self.latitude, self.longitude) {
            // GeoJSON order is [longitude, latitude]
            obj.insert(
                "geometry".into(),
                json!({ "type": "Point", "coordinates": [lng, lat] }),
            );
        }
        Value::Object(obj)
    }
}

/// Organisation unit as returned by `GET /organisationUnits`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub opening_date: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub parent: Option<IdRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdRef {
    pub id: String,
}

/// Envelope of `GET /organisationUnits`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitList {
    #[serde(default)]
    pub organisation_units: Vec<OrgUnitRecord>,
}

impl From<OrgUnitRecord> for OrgUnit {
    fn from(record: OrgUnitRecord) -> Self {
        let opening_date = record
            .opening_date
            .as_deref()
            .and_then(parse_dhis2_date)
            .unwrap_or_default();
        Self {
            id: Some(record.id),
            short_name: record.short_name.unwrap_or_else(|| record.name.clone()),
            name: record.name,
            code: record.code.unwrap_or_default(),
            opening_date,
            latitude: None,
            longitude: None,
            phone_number: record.phone_number,
            parent_id: record.parent.map(|p| p.id),
        }
    }
}

/// DHIS2 returns dates either as `YYYY-MM-DD` or full ISO timestamps
fn parse_dhis2_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// `importStrategy` of a metadata import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStrategy {
    CreateAndUpdate,
    Update,
}

impl ImportStrategy {
    pub fn as_param(&self) -> &'static str {
        match self {
            ImportStrategy::CreateAndUpdate => "CREATE_AND_UPDATE",
            ImportStrategy::Update => "UPDATE",
        }
    }
}

/// `identifier` mode of a metadata import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierMode {
    Uid,
    Code,
}

impl IdentifierMode {
    pub fn as_param(&self) -> &'static str {
        match self {
            IdentifierMode::Uid => "UID",
            IdentifierMode::Code => "CODE",
        }
    }
}

/// Per-item rejection reported by a bulk import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRejection {
    pub code: Option<String>,
    pub reason: String,
}

/// Outcome of one bulk import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    /// code -> destination id for every accepted item
    pub imported: HashMap<String, String>,
    pub rejections: Vec<ImportRejection>,
    pub created: usize,
    pub updated: usize,
    pub ignored: usize,
}

impl ImportSummary {
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }

    /// Build a summary from a DHIS2 import report.
    ///
    /// Object reports carry the index of the submitted item, which is mapped
    /// back to the submitted code.
    pub fn from_report(report: &Value, submitted: &[OrgUnit]) -> Self {
        // 2.36+ nests the report under "response"
        let report = report.get("response").unwrap_or(report);
        let mut summary = ImportSummary::default();

        if let Some(stats) = report.get("stats") {
            summary.created = stat(stats, "created");
            summary.updated = stat(stats, "updated");
            summary.ignored = stat(stats, "ignored");
        }

        let mut rejected_indexes = Vec::new();
        let type_reports = report
            .get("typeReports")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for type_report in &type_reports {
            let object_reports = type_report
                .get("objectReports")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for object_report in &object_reports {
                let index = object_report
                    .get("index")
                    .and_then(Value::as_u64)
                    .map(|i| i as usize);
                let code = index.and_then(|i| submitted.get(i)).map(|u| u.code.clone());
                let errors = object_report
                    .get("errorReports")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();

                if errors.is_empty() {
                    if let (Some(code), Some(uid)) =
                        (code, object_report.get("uid").and_then(Value::as_str))
                    {
                        summary.imported.insert(code, uid.to_string());
                    }
                    continue;
                }

                if let Some(i) = index {
                    rejected_indexes.push(i);
                }
                for error in errors {
                    let reason = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown import error")
                        .to_string();
                    summary.rejections.push(ImportRejection {
                        code: code.clone(),
                        reason,
                    });
                }
            }
        }

        // Items carrying their own id are accepted unless explicitly rejected
        for (i, unit) in submitted.iter().enumerate() {
            if rejected_indexes.contains(&i) || summary.imported.contains_key(&unit.code) {
                continue;
            }
            if let Some(id) = &unit.id {
                summary.imported.insert(unit.code.clone(), id.clone());
            }
        }

        summary
    }
}

fn stat(stats: &Value, key: &str) -> usize {
    stats.get(key).and_then(Value::as_u64).unwrap_or(0) as usize
}
