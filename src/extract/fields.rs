use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::browser::{js_string, PortalPage};
use crate::config::Selectors;
use crate::error::PortalError;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Field label (prefixed with its section header) to trimmed value.
///
/// A label whose value was missing from the page maps to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFieldMap(IndexMap<String, Option<String>>);

impl RawFieldMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawFieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        )
    }
}

/// One `.fieldTitleBold` element as seen by the page snapshot.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TitleNode {
    pub text: String,
    #[serde(default)]
    pub header: bool,
}

#[derive(Debug, Deserialize)]
struct FieldSnapshot {
    error: Option<String>,
    #[serde(default)]
    titles: Vec<TitleNode>,
    #[serde(default)]
    values: Vec<String>,
}

/// Read the label/value list of the page `page` is currently showing.
pub async fn extract<P: PortalPage + ?Sized>(
    page: &P,
    selectors: &Selectors,
) -> Result<RawFieldMap, PortalError> {
    let raw = page.evaluate(&snapshot_script(selectors)).await?;
    let snapshot: FieldSnapshot = serde_json::from_value(raw)
        .map_err(|e| PortalError::Browser(format!("unexpected field list snapshot result: {e}")))?;

    if let Some(message) = snapshot.error {
        return Err(PortalError::DataFetch {
            context: "personal data",
            message: message.trim().to_string(),
        });
    }

    debug!(
        titles = snapshot.titles.len(),
        values = snapshot.values.len(),
        "field list read"
    );
    Ok(assemble_fields(&snapshot.titles, &snapshot.values))
}

/// Pair titles with values in document order.
///
/// A header title sets the prefix for the titles that follow and takes no
/// value. Every other title takes the next value. Titles left without a value
/// are kept with `None`.
pub fn assemble_fields(titles: &[TitleNode], values: &[String]) -> RawFieldMap {
    let mut fields = IndexMap::new();
    let mut prefix = String::new();
    let mut values = values.iter();

    for title in titles {
        let label = clean_label(&title.text);
        if title.header {
            prefix = format!("{label} ");
            continue;
        }
        let value = values.next().map(|v| v.trim().to_string());
        if value.is_none() {
            warn!(label = %label, "field has no matching value");
        }
        fields.insert(format!("{prefix}{label}"), value);
    }

    RawFieldMap(fields)
}

fn clean_label(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn snapshot_script(selectors: &Selectors) -> String {
    format!(
        r#"(() => {{
    const errorBox = document.querySelector({error_box});
    if (errorBox) {{
        return {{ error: errorBox.innerText }};
    }}
    return {{
        error: null,
        titles: Array.from(document.querySelectorAll({title})).map((e) => ({{
            text: e.innerText,
            header: e.classList.contains({header}),
        }})),
        values: Array.from(document.querySelectorAll({value})).map((e) => e.innerText),
    }};
}})()"#,
        error_box = js_string(&selectors.error_box),
        title = js_string(&selectors.field_title),
        header = js_string(&selectors.section_header_class),
        value = js_string(&selectors.field_value),
    )
}

// ── Tests ──
