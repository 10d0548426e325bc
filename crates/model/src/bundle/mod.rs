//! Pure algebra over [`BundleManifest`], mirroring `manifest::algebra` for
//! the bundle/journal shape (spec §3.2, §4.3). No I/O, no globals; every
//! function takes the current state (and an injected `now`) and returns a
//! new value.

pub mod types;

use std::collections::BTreeMap;

use errors::KernelError;
use manifest::Timestamp;
use serde_json::{
    Map,
    Value,
};

pub use types::BundleManifest;

pub fn new(id: impl Into<String>, now: impl Fn() -> Timestamp) -> BundleManifest {
    let timestamp = now();
    BundleManifest {
        id: id.into(),
        created: timestamp,
        updated: timestamp,
        items: Vec::new(),
        metadata: BTreeMap::new(),
        components: BTreeMap::new(),
        extra: Map::new(),
    }
}

/// Clamps an `insert`-style index the way Python's `list.insert` would:
/// negative indices count from the end, extreme negatives clamp to the
/// head, and any index past the end clamps to the end.
pub fn clamp_index(len: usize, index: i64) -> usize {
    if index < 0 {
        let from_end = len as i64 + index;
        if from_end < 0 {
            0
        } else {
            from_end as usize
        }
    } else {
        (index as usize).min(len)
    }
}

pub fn set_metadata(
    bundle: &BundleManifest,
    name: &str,
    value: Value,
    now: impl Fn() -> Timestamp,
) -> BundleManifest {
    let timestamp = now();
    let mut bundle = bundle.clone();
    bundle.metadata.entry(name.to_string()).or_default().push((timestamp, value));
    bundle.updated = timestamp;
    bundle
}

pub fn get_metadata<'a>(bundle: &'a BundleManifest, name: &str) -> Option<&'a Value> {
    bundle.metadata.get(name).and_then(|history| history.last()).map(|(_, v)| v)
}

pub fn get_metadata_all<'a>(bundle: &'a BundleManifest, name: &str) -> &'a [(Timestamp, Value)] {
    bundle.metadata.get(name).map(Vec::as_slice).unwrap_or(&[])
}

pub fn add_item(
    bundle: &BundleManifest,
    item_id: &str,
    now: impl Fn() -> Timestamp,
) -> Result<BundleManifest, KernelError> {
    if bundle.items.iter().any(|id| id == item_id) {
        return Err(KernelError::AlreadyExists { kind: "item", id: item_id.to_string() });
    }
    let mut bundle = bundle.clone();
    bundle.items.push(item_id.to_string());
    bundle.updated = now();
    Ok(bundle)
}

pub fn insert_item(
    bundle: &BundleManifest,
    index: i64,
    item_id: &str,
    now: impl Fn() -> Timestamp,
) -> Result<BundleManifest, KernelError> {
    if bundle.items.iter().any(|id| id == item_id) {
        return Err(KernelError::AlreadyExists { kind: "item", id: item_id.to_string() });
    }
    let mut bundle = bundle.clone();
    let at = clamp_index(bundle.items.len(), index);
    bundle.items.insert(at, item_id.to_string());
    bundle.updated = now();
    Ok(bundle)
}

pub fn remove_item(
    bundle: &BundleManifest,
    item_id: &str,
    now: impl Fn() -> Timestamp,
) -> Result<BundleManifest, KernelError> {
    let position = bundle
        .items
        .iter()
        .position(|id| id == item_id)
        .ok_or_else(|| KernelError::DoesNotExist { kind: "item", id: item_id.to_string() })?;
    let mut bundle = bundle.clone();
    bundle.items.remove(position);
    bundle.updated = now();
    Ok(bundle)
}

pub fn set_component(
    bundle: &BundleManifest,
    name: &str,
    value: Value,
    now: impl Fn() -> Timestamp,
) -> BundleManifest {
    let mut bundle = bundle.clone();
    bundle.components.insert(name.to_string(), value);
    bundle.updated = now();
    bundle
}

pub fn get_component<'a>(bundle: &'a BundleManifest, name: &str) -> Option<&'a Value> {
    bundle.components.get(name)
}

pub fn remove_component(bundle: &BundleManifest, name: &str) -> Result<BundleManifest, KernelError> {
    if !bundle.components.contains_key(name) {
        return Err(KernelError::DoesNotExist { kind: "component", id: name.to_string() });
    }
    let mut bundle = bundle.clone();
    bundle.components.remove(name);
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use chrono::{
        TimeZone,
        Utc,
    };
    use serde_json::json;

    use super::*;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_datetime(Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap())
    }

    #[test]
    fn clamp_index_matches_python_list_insert_semantics() {
        assert_eq!(clamp_index(0, -10), 0);
        assert_eq!(clamp_index(1, 10), 1);
        assert_eq!(clamp_index(5, -2), 3);
        assert_eq!(clamp_index(5, 2), 2);
    }

    #[test]
    fn insert_and_add_clamp_past_end_and_before_start() {
        let bundle = new("b1", || ts(0));
        let bundle = insert_item(&bundle, -10, "doc/1", || ts(1)).unwrap();
        let bundle = insert_item(&bundle, 10, "doc/3", || ts(2)).unwrap();
        let bundle = add_item(&bundle, "doc/2", || ts(3)).unwrap();
        assert_eq!(bundle.items, vec!["doc/1", "doc/3", "doc/2"]);
    }

    #[test]
    fn add_item_rejects_duplicates() {
        let bundle = new("b1", || ts(0));
        let bundle = add_item(&bundle, "doc/1", || ts(1)).unwrap();
        assert_eq!(
            add_item(&bundle, "doc/1", || ts(2)).unwrap_err(),
            KernelError::AlreadyExists { kind: "item", id: "doc/1".to_string() }
        );
    }

    #[test]
    fn remove_item_rejects_unknown_id() {
        let bundle = new("b1", || ts(0));
        assert_eq!(
            remove_item(&bundle, "doc/1", || ts(1)).unwrap_err(),
            KernelError::DoesNotExist { kind: "item", id: "doc/1".to_string() }
        );
    }

    #[test]
    fn metadata_reads_return_last_value_and_all_returns_full_history() {
        let bundle = new("b1", || ts(0));
        let bundle = set_metadata(&bundle, "volume", json!("1"), || ts(1));
        let bundle = set_metadata(&bundle, "volume", json!("2"), || ts(2));
        assert_eq!(get_metadata(&bundle, "volume"), Some(&json!("2")));
        assert_eq!(get_metadata_all(&bundle, "volume").len(), 2);
        assert_eq!(bundle.updated, ts(2));
    }

    #[test]
    fn component_roundtrip_and_missing_remove() {
        let bundle = new("b1", || ts(0));
        let bundle = set_component(&bundle, "aop", json!("bundle-2"), || ts(1));
        assert_eq!(get_component(&bundle, "aop"), Some(&json!("bundle-2")));
        let bundle = remove_component(&bundle, "aop").unwrap();
        assert_eq!(get_component(&bundle, "aop"), None);
        assert_eq!(remove_component(&bundle, "aop").unwrap_err(), KernelError::DoesNotExist { kind: "component", id: "aop".to_string() });
    }
}
