use serde::Serialize;

use crate::config::FieldKeys;
use crate::extract::{RawFieldMap, RawRecord};

/// The exported document. Field order is the serialized key order; absent
/// source values serialize as `null` so every key is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputDocument {
    pub id: Option<String>,
    pub name: Option<String>,
    pub dob: Option<String>,
    pub sex: Option<String>,
    pub data: Vec<RealEstateRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealEstateRecord {
    pub id: Option<String>,
    pub parish: Option<String>,
    pub article: Option<String>,
    pub section: Option<String>,
    pub title: Option<String>,
    pub part: Option<String>,
    pub year: Option<String>,
    pub initial_value: Option<f64>,
    pub current_value: Option<f64>,
}

impl From<&RawRecord> for RealEstateRecord {
    fn from(r: &RawRecord) -> Self {
        Self {
            id: r.id.clone(),
            parish: r.location.clone(),
            article: r.article.clone(),
            section: r.section.clone(),
            title: r.article_label.clone(),
            part: r.part.as_deref().map(|p| p.trim().to_string()),
            year: r.year.clone(),
            initial_value: r.initial_value,
            current_value: r.current_value,
        }
    }
}

/// Combine the personal data fields and the real estate listing. Records keep
/// their listing order; nothing is dropped.
pub fn normalize(keys: &FieldKeys, fields: &RawFieldMap, records: &[RawRecord]) -> OutputDocument {
    let field = |key: &str| fields.get(key).map(str::to_string);

    OutputDocument {
        id: field(&keys.nif),
        name: field(&keys.name),
        dob: field(&keys.date_of_birth),
        sex: fields
            .get(&keys.sex)
            .and_then(|s| s.chars().next())
            .map(String::from),
        data: records.iter().map(RealEstateRecord::from).collect(),
    }
}
