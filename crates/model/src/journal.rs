//! `Journal` represents a scientific periodical composed of
//! `DocumentsBundle` issues plus named single-value components (the
//! ahead-of-print bundle, the provisional flag) (spec §3.2, §4.3).

use errors::KernelError;
use manifest::Timestamp;
use serde_json::{
    json,
    Map,
    Value,
};

use crate::{
    bundle::{
        self,
        BundleManifest,
    },
    documents_bundle::collapse_metadata,
    subject_areas,
};

pub struct Journal {
    manifest: BundleManifest,
}

impl Journal {
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

    pub fn created(&self) -> Timestamp {
        self.manifest.created
    }

    pub fn updated(&self) -> Timestamp {
        self.manifest.updated
    }

    pub fn data(&self) -> Value {
        collapse_metadata(&self.manifest)
    }

    pub fn issues(&self) -> &[String] {
        &self.manifest.items
    }

    pub fn add_issue(&mut self, id: &str, now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        self.manifest = bundle::add_item(&self.manifest, id, now)?;
        Ok(())
    }

    pub fn insert_issue(&mut self, index: i64, id: &str, now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        self.manifest = bundle::insert_item(&self.manifest, index, id, now)?;
        Ok(())
    }

    pub fn remove_issue(&mut self, id: &str, now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        self.manifest = bundle::remove_item(&self.manifest, id, now)?;
        Ok(())
    }

    pub fn update_issues(&mut self, new_items: &[String], now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        for id in self.manifest.items.clone() {
            self.manifest = bundle::remove_item(&self.manifest, &id, &now)?;
        }
        for id in new_items {
            self.manifest = bundle::add_item(&self.manifest, id, &now)?;
        }
        Ok(())
    }

    pub fn provisional(&self) -> Option<String> {
        component_string(&self.manifest, "provisional")
    }

    pub fn set_provisional(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_component(&self.manifest, "provisional", json!(value), now);
    }

    pub fn ahead_of_print_bundle(&self) -> String {
        component_string(&self.manifest, "aop").unwrap_or_default()
    }

    pub fn set_ahead_of_print_bundle(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_component(&self.manifest, "aop", json!(value), now);
    }

    pub fn remove_ahead_of_print_bundle(&mut self) -> Result<(), KernelError> {
        self.manifest = bundle::remove_component(&self.manifest, "aop")?;
        Ok(())
    }

    pub fn mission(&self) -> Vec<Value> {
        match bundle::get_metadata(&self.manifest, "mission") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_mission(&mut self, mission: Vec<Map<String, Value>>, now: impl Fn() -> Timestamp) {
        let value = Value::Array(mission.into_iter().map(Value::Object).collect());
        self.manifest = bundle::set_metadata(&self.manifest, "mission", value, now);
    }

    pub fn title(&self) -> Option<String> {
        string_metadata(&self.manifest, "title")
    }

    pub fn set_title(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "title", json!(value), now);
    }

    pub fn title_iso(&self) -> Option<String> {
        string_metadata(&self.manifest, "title_iso")
    }

    pub fn set_title_iso(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "title_iso", json!(value), now);
    }

    pub fn short_title(&self) -> Option<String> {
        string_metadata(&self.manifest, "short_title")
    }

    pub fn set_short_title(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "short_title", json!(value), now);
    }

    pub fn acronym(&self) -> Option<String> {
        string_metadata(&self.manifest, "acronym")
    }

    pub fn set_acronym(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "acronym", json!(value), now);
    }

    pub fn scielo_issn(&self) -> Option<String> {
        string_metadata(&self.manifest, "scielo_issn")
    }

    pub fn set_scielo_issn(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "scielo_issn", json!(value), now);
    }

    pub fn print_issn(&self) -> Option<String> {
        string_metadata(&self.manifest, "print_issn")
    }

    pub fn set_print_issn(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "print_issn", json!(value), now);
    }

    pub fn electronic_issn(&self) -> Option<String> {
        string_metadata(&self.manifest, "electronic_issn")
    }

    pub fn set_electronic_issn(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "electronic_issn", json!(value), now);
    }

    pub fn status(&self) -> Option<Value> {
        bundle::get_metadata(&self.manifest, "status").cloned()
    }

    pub fn set_status(&mut self, value: Map<String, Value>, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "status", Value::Object(value), now);
    }

    /// The full append log of every status ever set, oldest first (spec
    /// §4.3's typed-accessor "history view").
    pub fn status_history(&self) -> Vec<(Timestamp, Value)> {
        bundle::get_metadata_all(&self.manifest, "status").to_vec()
    }

    pub fn subject_areas(&self) -> Vec<String> {
        match bundle::get_metadata(&self.manifest, "subject_areas") {
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_subject_areas(&mut self, values: &[String], now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        let invalid: Vec<&String> = values.iter().filter(|v| !subject_areas::is_valid(v)).collect();
        if !invalid.is_empty() {
            return Err(KernelError::InvalidMetadata {
                field: "subject_areas",
                reason: format!("{invalid:?} are not valid"),
            });
        }
        let value = Value::Array(values.iter().cloned().map(Value::String).collect());
        self.manifest = bundle::set_metadata(&self.manifest, "subject_areas", value, now);
        Ok(())
    }

    pub fn sponsors(&self) -> Vec<Value> {
        match bundle::get_metadata(&self.manifest, "sponsors") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_sponsors(&mut self, sponsors: Vec<Map<String, Value>>, now: impl Fn() -> Timestamp) {
        let value = Value::Array(sponsors.into_iter().map(Value::Object).collect());
        self.manifest = bundle::set_metadata(&self.manifest, "sponsors", value, now);
    }

    pub fn subject_categories(&self) -> Vec<String> {
        match bundle::get_metadata(&self.manifest, "subject_categories") {
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_subject_categories(&mut self, values: &[String], now: impl Fn() -> Timestamp) {
        let value = Value::Array(values.iter().cloned().map(Value::String).collect());
        self.manifest = bundle::set_metadata(&self.manifest, "subject_categories", value, now);
    }

    pub fn institution_responsible_for(&self) -> Vec<Value> {
        match bundle::get_metadata(&self.manifest, "institution_responsible_for") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_institution_responsible_for(&mut self, values: Vec<Map<String, Value>>, now: impl Fn() -> Timestamp) {
        let value = Value::Array(values.into_iter().map(Value::Object).collect());
        self.manifest = bundle::set_metadata(&self.manifest, "institution_responsible_for", value, now);
    }

    pub fn online_submission_url(&self) -> Option<String> {
        string_metadata(&self.manifest, "online_submission_url")
    }

    pub fn set_online_submission_url(&mut self, value: &str, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "online_submission_url", json!(value), now);
    }

    pub fn next_journal(&self) -> Option<Value> {
        bundle::get_metadata(&self.manifest, "next_journal").cloned()
    }

    pub fn set_next_journal(&mut self, value: Map<String, Value>, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "next_journal", Value::Object(value), now);
    }

    pub fn previous_journal(&self) -> Option<Value> {
        bundle::get_metadata(&self.manifest, "previous_journal").cloned()
    }

    pub fn set_previous_journal(&mut self, value: Map<String, Value>, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "previous_journal", Value::Object(value), now);
    }

    pub fn contact(&self) -> Option<Value> {
        bundle::get_metadata(&self.manifest, "contact").cloned()
    }

    pub fn set_contact(&mut self, value: Map<String, Value>, now: impl Fn() -> Timestamp) {
        self.manifest = bundle::set_metadata(&self.manifest, "contact", Value::Object(value), now);
    }
}

fn string_metadata(manifest: &BundleManifest, name: &str) -> Option<String> {
    bundle::get_metadata(manifest, name).and_then(|v| v.as_str().map(str::to_string))
}

fn component_string(manifest: &BundleManifest, name: &str) -> Option<String> {
    bundle::get_component(manifest, name).and_then(|v| v.as_str().map(str::to_string))
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
    fn subject_areas_rejects_values_outside_the_closed_vocabulary() {
        let mut journal = Journal::new("j1", || ts(0));
        let err = journal.set_subject_areas(&["Not A Real Area".to_string()], || ts(1)).unwrap_err();
        assert!(matches!(err, KernelError::InvalidMetadata { field: "subject_areas", .. }));

        journal.set_subject_areas(&["Engineering".to_string()], || ts(1)).unwrap();
        assert_eq!(journal.subject_areas(), vec!["Engineering".to_string()]);
    }

    #[test]
    fn ahead_of_print_bundle_defaults_to_empty_and_round_trips() {
        let mut journal = Journal::new("j1", || ts(0));
        assert_eq!(journal.ahead_of_print_bundle(), "");
        journal.set_ahead_of_print_bundle("bundle-aop", || ts(1));
        assert_eq!(journal.ahead_of_print_bundle(), "bundle-aop");
        journal.remove_ahead_of_print_bundle().unwrap();
        assert_eq!(journal.ahead_of_print_bundle(), "");
    }

    #[test]
    fn remove_ahead_of_print_bundle_fails_when_absent() {
        let mut journal = Journal::new("j1", || ts(0));
        assert_eq!(
            journal.remove_ahead_of_print_bundle().unwrap_err(),
            KernelError::DoesNotExist { kind: "component", id: "aop".to_string() }
        );
    }

    #[test]
    fn status_history_accumulates_every_value_set() {
        let mut journal = Journal::new("j1", || ts(0));
        journal.set_status(Map::from_iter([("name".to_string(), json!("current"))]), || ts(1));
        journal.set_status(Map::from_iter([("name".to_string(), json!("deceased"))]), || ts(2));
        assert_eq!(journal.status_history().len(), 2);
        assert_eq!(journal.status().unwrap()["name"], json!("deceased"));
    }
}
