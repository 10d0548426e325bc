//! `DocumentsBundle` represents a publication-model-agnostic set of
//! documents: closed and open issues, ahead-of-print, provisional
//! documents, errata/retractions (spec §3.2, §4.3).

use errors::KernelError;
use manifest::Timestamp;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{
    json,
    Map,
    Value,
};

use crate::bundle::{
    self,
    BundleManifest,
};

static PUBLICATION_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("static regex is valid"));

pub struct DocumentsBundle {
    manifest: BundleManifest,
}

impl DocumentsBundle {
    pub fn new(id: impl Into<String>, now: impl Fn() -> Timestamp) -> Self {
        Self { manifest: bundle::new(id, now) }
    }

    pub fn from_manifest(manifest: BundleManifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    pub fn into_manifest(self) -> BundleManifest {
        self.manifest
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// Materialises the manifest with metadata history collapsed to its
    /// latest value per field, as returned to callers of
    /// `fetch_documents_bundle` (spec §4.3, `DocumentsBundle.data`).
    pub fn data(&self) -> Value {
        collapse_metadata(&self.manifest)
    }

    pub fn documents(&self) -> &[String] {
        &self.manifest.items
    }

    pub fn add_document(&mut self, id: &str, now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        self.manifest = bundle::add_item(&self.manifest, id, now)?;
        Ok(())
    }

    pub fn insert_document(&mut self, index: i64, id: &str, now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        self.manifest = bundle::insert_item(&self.manifest, index, id, now)?;
        Ok(())
    }

    pub fn remove_document(&mut self, id: &str, now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        self.manifest = bundle::remove_item(&self.manifest, id, now)?;
        Ok(())
    }

    /// Logically `remove_all; add_each(new_list)` (spec §4.3).
    pub fn update_documents(&mut self, new_items: &[String], now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        for id in self.manifest.items.clone() {
            self.manifest = bundle::remove_item(&self.manifest, &id, &now)?;
        }
        for id in new_items {
            self.manifest = bundle::add_item(&self.manifest, id, &now)?;
        }
        Ok(())
    }

    pub fn publication_year(&self) -> Option<String> {
        string_metadata(&self.manifest, "publication_year")
    }

    pub fn set_publication_year(&mut self, value: &str, now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        if !PUBLICATION_YEAR_RE.is_match(value) {
            return Err(KernelError::InvalidMetadata {
                field: "publication_year",
                reason: format!("\"{value}\" does not match ^\\d{{4}}$"),
            });
        }
        self.manifest = bundle::set_metadata(&self.manifest, "publication_year", json!(value), now);
        Ok(())
    }

    pub fn volume(&self) -> Option<String> {
        string_metadata(&self.manifest, "volume")
    }

    pub fn set_volume(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "volume", json!(value), now);
    }

    pub fn number(&self) -> Option<String> {
        string_metadata(&self.manifest, "number")
    }

    pub fn set_number(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "number", json!(value), now);
    }

    pub fn supplement(&self) -> Option<String> {
        string_metadata(&self.manifest, "supplement")
    }

    pub fn set_supplement(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "supplement", json!(value), now);
    }

    pub fn titles(&self) -> Vec<Value> {
        match bundle::get_metadata(&self.manifest, "titles") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_titles(&mut self, titles: Vec<Map<String, Value>>, now: impl Fn() -> Timestamp) {
        let value = Value::Array(titles.into_iter().map(Value::Object).collect());
        self.manifest = bundle::set_metadata(&self.manifest, "titles", value, now);
    }
}

fn string_metadata(manifest: &BundleManifest, name: &str) -> Option<String> {
    bundle::get_metadata(manifest, name).and_then(|v| v.as_str().map(str::to_string))
}

/// Shared by [`DocumentsBundle::data`] and `Journal::data`: collapses a
/// bundle manifest's historied metadata map to its latest value per field
/// and merges components in as plain top-level keys.
pub(crate) fn collapse_metadata(manifest: &BundleManifest) -> Value {
    let mut out = Map::new();
    for (k, v) in &manifest.extra {
        out.insert(k.clone(), v.clone());
    }
    for (k, v) in &manifest.components {
        out.insert(k.clone(), v.clone());
    }
    out.insert("id".to_string(), json!(manifest.id));
    out.insert("created".to_string(), json!(manifest.created.to_string()));
    out.insert("updated".to_string(), json!(manifest.updated.to_string()));
    out.insert("items".to_string(), json!(manifest.items));
    let metadata: Map<String, Value> = manifest
        .metadata
        .iter()
        .filter_map(|(name, history)| history.last().map(|(_, v)| (name.clone(), v.clone())))
        .collect();
    out.insert("metadata".to_string(), Value::Object(metadata));
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use chrono::{
        TimeZone,
        Utc,
    };

    use super::*;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_datetime(Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap())
    }

    #[test]
    fn publication_year_validates_four_digits() {
        let mut bundle = DocumentsBundle::new("b1", || ts(0));
        assert!(bundle.set_publication_year("abcd", || ts(1)).is_err());
        bundle.set_publication_year("2020", || ts(1)).unwrap();
        assert_eq!(bundle.publication_year(), Some("2020".to_string()));
    }

    #[test]
    fn update_documents_replaces_the_whole_list() {
        let mut bundle = DocumentsBundle::new("b1", || ts(0));
        bundle.add_document("doc/1", || ts(1)).unwrap();
        bundle.add_document("doc/2", || ts(2)).unwrap();
        bundle
            .update_documents(&["doc/3".to_string(), "doc/4".to_string()], || ts(3))
            .unwrap();
        assert_eq!(bundle.documents(), ["doc/3".to_string(), "doc/4".to_string()]);
    }
}
