use std::cell::Cell;

use chrono::{
    TimeZone,
    Utc,
};
use errors::KernelError;
use manifest::{
    add_asset_version,
    add_deleted_version,
    add_rendition_version,
    add_version,
    new_document,
    Timestamp,
    Version,
};

fn ticking_clock() -> impl Fn() -> Timestamp {
    let counter = Cell::new(0i64);
    move || {
        let secs = counter.get();
        counter.set(secs + 1);
        Timestamp::from_datetime(Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap())
    }
}

#[test]
fn minimal_structure_has_an_id_and_no_versions() {
    let manifest = new_document("0034-8910-rsp-48-2-0275");
    assert_eq!(manifest.id, "0034-8910-rsp-48-2-0275");
    assert!(manifest.versions.is_empty());
}

#[test]
fn doc_ids_accept_anything_convertible_to_a_string() {
    let manifest = new_document(String::from("0034-8910-rsp-48-2-0275"));
    assert_eq!(manifest.id, "0034-8910-rsp-48-2-0275");
}

#[test]
fn first_version_is_appended_as_live_with_no_renditions() {
    let clock = ticking_clock();
    let manifest = new_document("doc-1");
    let manifest = add_version(&manifest, "s3://bucket/v1.xml", Vec::new(), &clock);

    assert_eq!(manifest.versions.len(), 1);
    let live = manifest.versions[0].as_live().expect("first version is live");
    assert_eq!(live.data, "s3://bucket/v1.xml");
    assert!(live.renditions.is_empty());
    assert!(live.assets.is_empty());
}

#[test]
fn manifest_versions_are_immutable_under_further_operations() {
    let clock = ticking_clock();
    let v1 = add_version(&new_document("doc-1"), "s3://bucket/v1.xml", vec!["a-1".to_string()], &clock);
    let v2 = add_asset_version(&v1, "a-1", "s3://bucket/a-1-v1.png", &clock).unwrap();

    // v1's own first version entry must not have changed shape after v2 was derived from it.
    assert_eq!(v1.versions.len(), 1);
    assert!(v1.versions[0].as_live().unwrap().assets["a-1"].is_empty());
    assert_eq!(v2.versions.len(), 1);
    assert_eq!(v2.versions[0].as_live().unwrap().assets["a-1"].len(), 1);
}

#[test]
fn add_version_with_assets_mapping_seeds_empty_histories() {
    let clock = ticking_clock();
    let manifest = add_version(
        &new_document("doc-1"),
        "s3://bucket/v1.xml",
        vec!["a-1".to_string(), "a-2".to_string()],
        &clock,
    );

    let live = manifest.versions[0].as_live().unwrap();
    assert_eq!(live.assets.len(), 2);
    assert!(live.assets["a-1"].is_empty());
    assert!(live.assets["a-2"].is_empty());
}

#[test]
fn add_version_with_empty_assets_mapping_is_fine() {
    let clock = ticking_clock();
    let manifest = add_version(&new_document("doc-1"), "s3://bucket/v1.xml", Vec::new(), &clock);
    assert!(manifest.versions[0].as_live().unwrap().assets.is_empty());
}

#[test]
fn additional_data_on_a_version_is_preserved_while_adding_asset_versions() {
    let clock = ticking_clock();
    let manifest = add_version(&new_document("doc-1"), "s3://bucket/v1.xml", vec!["a-1".to_string()], &clock);

    let json = serde_json::to_string(&manifest).unwrap();
    let mut raw: serde_json::Value = serde_json::from_str(&json).unwrap();
    raw["versions"][0]["unknown_future_field"] = serde_json::json!("keep-me");
    let manifest: manifest::Manifest = serde_json::from_value(raw).unwrap();

    let manifest = add_asset_version(&manifest, "a-1", "s3://bucket/a-1-v1.png", &clock).unwrap();

    let live = manifest.versions[0].as_live().unwrap();
    assert_eq!(live.extra.get("unknown_future_field").and_then(|v| v.as_str()), Some("keep-me"));
}

#[test]
fn add_asset_version_for_unknown_asset_fails() {
    let clock = ticking_clock();
    let manifest = add_version(&new_document("doc-1"), "s3://bucket/v1.xml", Vec::new(), &clock);

    let err = add_asset_version(&manifest, "does-not-exist", "s3://bucket/a.png", &clock).unwrap_err();
    assert_eq!(err, KernelError::UnknownAsset { asset_id: "does-not-exist".to_string() });
}

#[test]
fn renditions_accumulate_per_version_not_across_versions() {
    let clock = ticking_clock();
    let manifest = add_version(&new_document("doc-1"), "s3://bucket/v1.xml", Vec::new(), &clock);
    let manifest =
        add_rendition_version(&manifest, "doc.pdf", "s3://bucket/v1.pdf", "application/pdf", "en", 10, &clock)
            .unwrap();
    let manifest = add_version(&manifest, "s3://bucket/v2.xml", Vec::new(), &clock);

    let live = manifest.versions[1].as_live().unwrap();
    assert!(live.renditions.is_empty());
}

#[test]
fn a_deleted_version_is_a_tombstone() {
    let clock = ticking_clock();
    let manifest = add_version(&new_document("doc-1"), "s3://bucket/v1.xml", Vec::new(), &clock);
    let manifest = add_deleted_version(&manifest, &clock);

    assert!(matches!(manifest.versions.last(), Some(Version::Deleted { .. })));
    assert!(matches!(
        add_asset_version(&manifest, "anything", "uri", &clock),
        Err(KernelError::DeletedVersion)
    ));
}

#[test]
fn a_document_can_be_revived_after_deletion_with_a_new_version() {
    let clock = ticking_clock();
    let manifest = add_version(&new_document("doc-1"), "s3://bucket/v1.xml", Vec::new(), &clock);
    let manifest = add_deleted_version(&manifest, &clock);
    let manifest = add_version(&manifest, "s3://bucket/v2.xml", Vec::new(), &clock);

    assert_eq!(manifest.versions.len(), 3);
    assert!(manifest.versions.last().unwrap().as_live().is_some());
}
