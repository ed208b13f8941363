use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::browser::{js_string, PortalPage};
use crate::config::Selectors;
use crate::error::PortalError;

/// One entry of the portal's real estate listing, as held by the page's
/// AngularJS scope. Every field may be absent.
///
/// ```json
/// { "id": "0", "loc": "1 - UTOPIA", "frg": "1", "tipo": "R", "sec": "XX",
///   "art": "0", "arv": "", "frac": "", "qP": " 1/1", "ano": "1900",
///   "vIni": 123.4, "val": 321.0, "cadR": "S", "map": false, "artM": "R-0-XX-" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    #[serde(deserialize_with = "loose_string")]
    pub id: Option<String>,
    /// Parish label, e.g. "1 - UTOPIA".
    #[serde(rename = "loc", deserialize_with = "loose_string")]
    pub location: Option<String>,
    #[serde(rename = "frg", deserialize_with = "loose_string")]
    pub parish_code: Option<String>,
    /// "R" (rústico) or "U" (urbano).
    #[serde(rename = "tipo", deserialize_with = "loose_string")]
    pub kind: Option<String>,
    #[serde(rename = "sec", deserialize_with = "loose_string")]
    pub section: Option<String>,
    #[serde(rename = "art", deserialize_with = "loose_string")]
    pub article: Option<String>,
    #[serde(rename = "arv", deserialize_with = "loose_string")]
    pub building: Option<String>,
    #[serde(rename = "frac", deserialize_with = "loose_string")]
    pub fraction: Option<String>,
    /// Ownership share, e.g. " 1/1".
    #[serde(rename = "qP", deserialize_with = "loose_string")]
    pub part: Option<String>,
    #[serde(rename = "ano", deserialize_with = "loose_string")]
    pub year: Option<String>,
    #[serde(rename = "vIni", deserialize_with = "loose_f64")]
    pub initial_value: Option<f64>,
    #[serde(rename = "val", deserialize_with = "loose_f64")]
    pub current_value: Option<f64>,
    #[serde(rename = "cadR", deserialize_with = "loose_string")]
    pub cadastral: Option<String>,
    #[serde(rename = "map", deserialize_with = "loose_bool")]
    pub mapped: Option<bool>,
    /// Composite article label, e.g. "R-0-XX-".
    #[serde(rename = "artM", deserialize_with = "loose_string")]
    pub article_label: Option<String>,
}

/// Read the real estate collection from the AngularJS scope of the page
/// `page` is currently showing.
pub async fn extract<P: PortalPage + ?Sized>(
    page: &P,
    selectors: &Selectors,
) -> Result<Vec<RawRecord>, PortalError> {
    let raw = page.evaluate(&scope_script(selectors)).await?;
    let records = parse_records(raw)?;
    debug!(count = records.len(), "real estate records read");
    Ok(records)
}

/// Turn the evaluated collection into records. Anything but an array means
/// the listing never rendered.
pub fn parse_records(raw: Value) -> Result<Vec<RawRecord>, PortalError> {
    match raw {
        Value::Array(_) => serde_json::from_value(raw)
            .map_err(|e| PortalError::Browser(format!("unexpected real estate record: {e}"))),
        _ => Err(PortalError::DataFetch {
            context: "real estate",
            message: "real estate listing not available".to_string(),
        }),
    }
}

fn scope_script(selectors: &Selectors) -> String {
    format!(
        r#"(() => {{
    if (typeof angular === "undefined") {{
        return null;
    }}
    const scope = angular.element($({root})).scope();
    return scope ? scope[{collection}] : null;
}})()"#,
        root = js_string(&selectors.record_scope_root),
        collection = js_string(&selectors.record_collection),
    )
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn loose_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => Some(b),
        _ => None,
    })
}
