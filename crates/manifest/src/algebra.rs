use std::collections::BTreeMap;

use errors::KernelError;

use crate::{
    timestamp::Timestamp,
    types::{
        AssetHistory,
        LiveVersion,
        Manifest,
        Rendition,
        RenditionData,
        Version,
    },
};

/// Creates an empty manifest for `id` with no versions yet.
pub fn new_document(id: impl Into<String>) -> Manifest {
    Manifest { id: id.into(), versions: Vec::new() }
}

fn latest_live(manifest: &Manifest) -> Result<&LiveVersion, KernelError> {
    match manifest.versions.last() {
        Some(Version::Live(v)) => Ok(v),
        Some(Version::Deleted { .. }) => Err(KernelError::DeletedVersion),
        None => Err(KernelError::MissingVersion("document has no versions yet".to_string())),
    }
}

/// Appends a brand new live version carrying `data_uri`, starting with no
/// renditions and an asset map keyed by every id in `assets_collection`.
/// Each id is seeded with an empty history, except where its paired URI is
/// non-empty, in which case a single `(now(), uri)` entry is appended —
/// callers pass a set of bare ids (paired with `""`) or a full
/// id-to-seed-URI mapping (typically the carry-forward URIs a
/// [`crate`]-external caller already resolved) interchangeably. Renditions
/// and assets are per-version state: bumping the document to a new version
/// resets both, and callers repopulate them with
/// [`add_asset_version`]/[`add_rendition_version`] against the new version.
pub fn add_version(
    manifest: &Manifest,
    data_uri: impl Into<String>,
    assets_collection: impl IntoIterator<Item = (String, String)>,
    now: impl Fn() -> Timestamp,
) -> Manifest {
    let timestamp = now();
    let mut assets: BTreeMap<String, AssetHistory> = BTreeMap::new();
    for (id, uri) in assets_collection {
        let history = assets.entry(id).or_default();
        if !uri.is_empty() {
            history.push((timestamp, uri));
        }
    }

    let mut versions = manifest.versions.clone();
    versions.push(Version::Live(LiveVersion {
        data: data_uri.into(),
        timestamp,
        assets,
        renditions: Vec::new(),
        extra: Default::default(),
    }));

    Manifest { id: manifest.id.clone(), versions }
}

/// Appends `uri` to `asset_id`'s upload history on the latest live version.
/// Fails with [`KernelError::UnknownAsset`] if `asset_id` was not part of
/// the asset set seeded by the most recent [`add_version`] call, with
/// [`KernelError::DeletedVersion`] if the document's latest version is a
/// tombstone, and with [`KernelError::MissingVersion`] if it has no
/// versions at all.
pub fn add_asset_version(
    manifest: &Manifest,
    asset_id: &str,
    uri: impl Into<String>,
    now: impl Fn() -> Timestamp,
) -> Result<Manifest, KernelError> {
    let live = latest_live(manifest)?;
    if !live.assets.contains_key(asset_id) {
        return Err(KernelError::UnknownAsset { asset_id: asset_id.to_string() });
    }

    let timestamp = now();
    let mut versions = manifest.versions.clone();
    if let Some(Version::Live(v)) = versions.last_mut() {
        v.assets.get_mut(asset_id).expect("presence checked above").push((timestamp, uri.into()));
    }

    Ok(Manifest { id: manifest.id.clone(), versions })
}

/// Appends a rendition upload to the latest live version. Renditions are
/// identified by the `(filename, mimetype, lang)` triple: a matching
/// rendition gets a new history entry, otherwise a new rendition is
/// created with this as its first entry.
#[allow(clippy::too_many_arguments)]
pub fn add_rendition_version(
    manifest: &Manifest,
    filename: impl Into<String>,
    uri: impl Into<String>,
    mimetype: impl Into<String>,
    lang: impl Into<String>,
    size_bytes: u64,
    now: impl Fn() -> Timestamp,
) -> Result<Manifest, KernelError> {
    latest_live(manifest)?;

    let filename = filename.into();
    let mimetype = mimetype.into();
    let lang = lang.into();
    let data = RenditionData { timestamp: now(), url: uri.into(), size_bytes };

    let mut versions = manifest.versions.clone();
    if let Some(Version::Live(v)) = versions.last_mut() {
        match v.renditions.iter_mut().find(|r| r.filename == filename && r.mimetype == mimetype && r.lang == lang) {
            Some(rendition) => rendition.data.push(data),
            None => v.renditions.push(Rendition { filename, mimetype, lang, data: vec![data] }),
        }
    }

    Ok(Manifest { id: manifest.id.clone(), versions })
}

/// Appends a tombstone version. Once a manifest's latest version is
/// deleted, only a new [`add_version`] call can bring it back to life.
pub fn add_deleted_version(manifest: &Manifest, now: impl Fn() -> Timestamp) -> Manifest {
    let mut versions = manifest.versions.clone();
    versions.push(Version::Deleted { timestamp: now(), extra: Default::default() });
    Manifest { id: manifest.id.clone(), versions }
}
