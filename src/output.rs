use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::nif::Nif;
use crate::record::OutputDocument;

/// `real-estate-<nif>.json`, named after the login NIF.
pub fn file_name(nif: &Nif) -> String {
    format!("real-estate-{nif}.json")
}

/// Serialize with 4-space indentation.
pub fn to_json(doc: &OutputDocument) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    doc.serialize(&mut ser)
        .context("Failed to serialize output document")?;
    Ok(buf)
}

/// Write the document into `dir` in one go. The bytes land in a temporary
/// sibling first and are renamed into place, so a failed write never leaves a
/// partial file under the final name.
pub fn write_document(dir: &Path, nif: &Nif, doc: &OutputDocument) -> Result<PathBuf> {
    let path = dir.join(file_name(nif));
    let tmp = dir.join(format!(".{}.tmp", file_name(nif)));

    let json = to_json(doc)?;
    let written = fs::write(&tmp, json)
        .with_context(|| format!("Failed to write {}", tmp.display()))
        .and_then(|()| {
            fs::rename(&tmp, &path)
                .with_context(|| format!("Failed to move output into {}", path.display()))
        });
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written.map(|()| path)
}
