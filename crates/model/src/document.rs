//! `Document` wraps a [`manifest::Manifest`] with the richer version
//! accessors and the asset-fetching seam the original domain model
//! provides around it (spec §3.1, §4.2).

use std::time::Duration;

use errors::KernelError;
use manifest::{
    algebra,
    parse_query_timestamp,
    Manifest,
    Rendition,
    Timestamp,
    Version,
};
use object_store::{
    rewrite_hrefs,
    AssetRef,
    FetchAssets,
};

/// A version as returned to callers: asset and rendition histories
/// collapsed to their latest entry as of `timestamp`, mirroring the shape
/// `version`/`version_at` hand back in the original implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentVersion {
    Live { data: String, timestamp: Timestamp, assets: Vec<(String, String)>, renditions: Vec<RenditionView> },
    Deleted { timestamp: Timestamp },
}

impl DocumentVersion {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            DocumentVersion::Live { timestamp, .. } => *timestamp,
            DocumentVersion::Deleted { timestamp } => *timestamp,
        }
    }
}

/// `url`/`size_bytes` are `None` when the rendition has no data entry as
/// of the bound being collapsed to — it still appears (spec §4.2:
/// renditions with no qualifying data "collapse to `{}`"), just without a
/// resolved upload.
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionView {
    pub filename: String,
    pub mimetype: String,
    pub lang: String,
    pub url: Option<String>,
    pub size_bytes: Option<u64>,
}

pub struct Document {
    manifest: Manifest,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self { manifest: algebra::new_document(id) }
    }

    pub fn from_manifest(manifest: Manifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    fn latest(&self) -> Option<&Version> {
        self.manifest.versions.last()
    }

    /// Fetches `data_url`'s XML, discovers its asset references and appends
    /// a new live version carrying whatever URI each matching asset id
    /// already resolved to on the previous version ("" for brand new ones).
    /// A no-op re-submission of the current `data_url` is rejected with
    /// [`KernelError::VersionAlreadySet`] before any network call is made.
    pub async fn new_version(
        &mut self,
        data_url: &str,
        fetch_assets: &dyn FetchAssets,
        timeout: Duration,
        now: impl Fn() -> Timestamp,
    ) -> Result<(), KernelError> {
        if let Some(Version::Live(v)) = self.latest() {
            if v.data == data_url {
                return Err(KernelError::VersionAlreadySet);
            }
        }

        let (_, refs) = fetch_assets.fetch_assets(data_url, timeout).await?;
        let carried = self.link_assets(&refs);
        self.manifest = algebra::add_version(&self.manifest, data_url, carried, now);
        Ok(())
    }

    /// Pairs every freshly discovered asset id with whatever URI it already
    /// resolved to on the latest live version, so re-fetching the same
    /// document doesn't blank out previously uploaded assets.
    fn link_assets(&self, refs: &[AssetRef]) -> Vec<(String, String)> {
        let existing = match self.latest() {
            Some(Version::Live(v)) => Some(&v.assets),
            _ => None,
        };
        refs.iter()
            .map(|r| {
                let uri = existing
                    .and_then(|assets| assets.get(&r.asset_id))
                    .and_then(|history| history.last())
                    .map(|(_, uri)| uri.clone())
                    .unwrap_or_default();
                (r.asset_id.clone(), uri)
            })
            .collect()
    }

    pub fn new_asset_version(
        &mut self,
        asset_id: &str,
        data_url: &str,
        now: impl Fn() -> Timestamp,
    ) -> Result<(), KernelError> {
        let live = self.latest_live_or(KernelError::DeletedVersion)?;
        let current = live.assets.get(asset_id).and_then(|h| h.last()).map(|(_, uri)| uri.as_str()).unwrap_or("");
        if current == data_url {
            return Err(KernelError::VersionAlreadySet);
        }
        self.manifest = algebra::add_asset_version(&self.manifest, asset_id, data_url, now)?;
        Ok(())
    }

    pub fn new_rendition_version(
        &mut self,
        filename: &str,
        data_url: &str,
        mimetype: &str,
        lang: &str,
        size_bytes: u64,
        now: impl Fn() -> Timestamp,
    ) -> Result<(), KernelError> {
        let live = self.latest_live_or(KernelError::DeletedVersion)?;
        let unchanged = live.renditions.iter().any(|r| {
            r.filename == filename
                && r.mimetype == mimetype
                && r.lang == lang
                && r.data.last().is_some_and(|d| d.url == data_url && d.size_bytes == size_bytes)
        });
        if unchanged {
            return Err(KernelError::VersionAlreadySet);
        }
        self.manifest =
            algebra::add_rendition_version(&self.manifest, filename, data_url, mimetype, lang, size_bytes, now)?;
        Ok(())
    }

    pub fn new_deleted_version(&mut self, now: impl Fn() -> Timestamp) -> Result<(), KernelError> {
        self.latest_live_or(KernelError::VersionAlreadySet)?;
        self.manifest = algebra::add_deleted_version(&self.manifest, now);
        Ok(())
    }

    fn latest_live_or(&self, err: KernelError) -> Result<&manifest::LiveVersion, KernelError> {
        match self.latest() {
            Some(Version::Live(v)) => Ok(v),
            Some(Version::Deleted { .. }) => Err(err),
            None => Err(KernelError::MissingVersion("document has no versions yet".to_string())),
        }
    }

    /// Resolves `index` the way Python indexing does: negative counts from
    /// the end, `-1` is the latest version.
    pub fn version(&self, index: i64) -> Result<DocumentVersion, KernelError> {
        let len = self.manifest.versions.len() as i64;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return Err(KernelError::MissingVersion(format!("missing version for index: {index}")));
        }
        Ok(collapse_latest(&self.manifest.versions[resolved as usize]))
    }

    /// Finds the version whose timestamp is the greatest one not exceeding
    /// `timestamp`, resolving each asset/rendition to its own latest entry
    /// as of that same bound (spec §9: plain filter-then-max, not a
    /// prefix-scan — ties keep the last matching version in manifest
    /// order).
    pub fn version_at(&self, timestamp: &str) -> Result<DocumentVersion, KernelError> {
        let bound = parse_query_timestamp(timestamp)?;
        let target = self
            .manifest
            .versions
            .iter()
            .filter(|v| v.timestamp() <= bound)
            .max_by_key(|v| v.timestamp())
            .ok_or_else(|| KernelError::MissingVersion(format!("missing version for timestamp: {timestamp}")))?;
        Ok(collapse_at(target, bound))
    }

    /// Materialises the requested version's XML with every asset
    /// `xlink:href` rewritten to that version's resolved URI, fetching the
    /// version's `data` XML fresh from the object store. `version_at`, when
    /// given, takes priority over `version_index` exactly as in
    /// [`Document::version_at`] vs. [`Document::version`].
    pub async fn data(
        &self,
        version_index: i64,
        version_at: Option<&str>,
        fetch_assets: &dyn FetchAssets,
        timeout: Duration,
    ) -> Result<Vec<u8>, KernelError> {
        let version = match version_at {
            Some(ts) => self.version_at(ts)?,
            None => self.version(version_index)?,
        };
        let (data_url, assets) = match version {
            DocumentVersion::Deleted { .. } => return Err(KernelError::DeletedVersion),
            DocumentVersion::Live { data, assets, .. } => (data, assets),
        };

        let (xml, refs) = fetch_assets.fetch_assets(&data_url, timeout).await?;
        let resolved: std::collections::HashMap<&str, &str> =
            assets.iter().map(|(id, uri)| (id.as_str(), uri.as_str())).collect();
        Ok(rewrite_hrefs(&xml, &refs, |asset_id| resolved.get(asset_id).copied().unwrap_or("").to_string()))
    }
}

fn collapse_latest(version: &Version) -> DocumentVersion {
    match version {
        Version::Deleted { timestamp, .. } => DocumentVersion::Deleted { timestamp: *timestamp },
        Version::Live(v) => DocumentVersion::Live {
            data: v.data.clone(),
            timestamp: v.timestamp,
            assets: v
                .assets
                .iter()
                .map(|(id, history)| (id.clone(), history.last().map(|(_, uri)| uri.clone()).unwrap_or_default()))
                .collect(),
            renditions: v.renditions.iter().map(rendition_latest).collect(),
        },
    }
}

fn rendition_latest(r: &Rendition) -> RenditionView {
    let latest = r.data.last();
    RenditionView {
        filename: r.filename.clone(),
        mimetype: r.mimetype.clone(),
        lang: r.lang.clone(),
        url: latest.map(|d| d.url.clone()),
        size_bytes: latest.map(|d| d.size_bytes),
    }
}

fn collapse_at(version: &Version, bound: Timestamp) -> DocumentVersion {
    match version {
        Version::Deleted { timestamp, .. } => DocumentVersion::Deleted { timestamp: *timestamp },
        Version::Live(v) => DocumentVersion::Live {
            data: v.data.clone(),
            timestamp: v.timestamp,
            assets: v
                .assets
                .iter()
                .map(|(id, history)| {
                    let uri = history
                        .iter()
                        .filter(|(ts, _)| *ts <= bound)
                        .max_by_key(|(ts, _)| *ts)
                        .map(|(_, uri)| uri.clone())
                        .unwrap_or_default();
                    (id.clone(), uri)
                })
                .collect(),
            renditions: v.renditions.iter().map(|r| rendition_at(r, bound)).collect(),
        },
    }
}

/// Collapses a rendition to its latest data entry not exceeding `bound`.
/// A rendition with no such entry still appears in the result — its
/// `url`/`size_bytes` are `None`, the collapse-to-`{}` case spec §4.2
/// documents rather than the rendition being dropped outright.
fn rendition_at(r: &Rendition, bound: Timestamp) -> RenditionView {
    let at_bound = r.data.iter().filter(|d| d.timestamp <= bound).max_by_key(|d| d.timestamp);
    RenditionView {
        filename: r.filename.clone(),
        mimetype: r.mimetype.clone(),
        lang: r.lang.clone(),
        url: at_bound.map(|d| d.url.clone()),
        size_bytes: at_bound.map(|d| d.size_bytes),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        sync::Arc,
    };

    use async_trait::async_trait;
    use chrono::{
        TimeZone,
        Utc,
    };
    use object_store::ParsedXml;
    use tokio::sync::Mutex;

    use super::*;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_datetime(Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap())
    }

    fn ticking_clock() -> impl Fn() -> Timestamp {
        let counter = Cell::new(0i64);
        move || {
            let secs = counter.get();
            counter.set(secs + 1);
            ts(secs)
        }
    }

    struct FakeFetcher {
        assets_by_url: std::collections::HashMap<String, Vec<&'static str>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl FetchAssets for FakeFetcher {
        async fn fetch_assets(
            &self,
            url: &str,
            _timeout: Duration,
        ) -> Result<(ParsedXml, Vec<AssetRef>), KernelError> {
            self.calls.lock().await.push(url.to_string());
            let ids = self.assets_by_url.get(url).cloned().unwrap_or_default();
            let xml = format!("<article>{}</article>", ids.iter().map(|id| format!("<graphic xlink:href=\"{id}\"/>")).collect::<String>());
            object_store::enumerate_assets(xml)
        }
    }

    #[tokio::test]
    async fn new_version_rejects_resubmission_of_the_current_data_url() {
        let clock = ticking_clock();
        let fetcher = FakeFetcher {
            assets_by_url: [("s3://v1.xml".to_string(), vec!["gf01"])].into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        let mut document = Document::new("doc-1");
        document.new_version("s3://v1.xml", &fetcher, Duration::from_secs(1), &clock).await.unwrap();

        let err = document.new_version("s3://v1.xml", &fetcher, Duration::from_secs(1), &clock).await.unwrap_err();
        assert_eq!(err, KernelError::VersionAlreadySet);
    }

    #[tokio::test]
    async fn new_version_carries_forward_existing_asset_uris() {
        let clock = ticking_clock();
        let fetcher = FakeFetcher {
            assets_by_url: [
                ("s3://v1.xml".to_string(), vec!["gf01"]),
                ("s3://v2.xml".to_string(), vec!["gf01"]),
            ]
            .into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        let mut document = Document::new("doc-1");
        document.new_version("s3://v1.xml", &fetcher, Duration::from_secs(1), &clock).await.unwrap();
        document.new_asset_version("gf01", "s3://assets/gf01-v1.gif", &clock).unwrap();
        document.new_version("s3://v2.xml", &fetcher, Duration::from_secs(1), &clock).await.unwrap();

        match document.version(-1).unwrap() {
            DocumentVersion::Live { assets, .. } => {
                assert_eq!(assets, vec![("gf01".to_string(), "s3://assets/gf01-v1.gif".to_string())]);
            },
            _ => panic!("expected a live version"),
        }
    }

    #[tokio::test]
    async fn new_asset_version_rejects_unknown_asset_ids() {
        let clock = ticking_clock();
        let fetcher =
            FakeFetcher { assets_by_url: std::collections::HashMap::new(), calls: Arc::new(Mutex::new(Vec::new())) };
        let mut document = Document::new("doc-1");
        document.new_version("s3://v1.xml", &fetcher, Duration::from_secs(1), &clock).await.unwrap();

        let err = document.new_asset_version("missing", "s3://a.png", &clock).unwrap_err();
        assert_eq!(err, KernelError::UnknownAsset { asset_id: "missing".to_string() });
    }

    #[tokio::test]
    async fn version_and_version_at_reject_deleted_documents_in_data() {
        let clock = ticking_clock();
        let fetcher =
            FakeFetcher { assets_by_url: std::collections::HashMap::new(), calls: Arc::new(Mutex::new(Vec::new())) };
        let mut document = Document::new("doc-1");
        document.new_version("s3://v1.xml", &fetcher, Duration::from_secs(1), &clock).await.unwrap();
        document.new_deleted_version(&clock).unwrap();

        assert!(matches!(document.version(-1).unwrap(), DocumentVersion::Deleted { .. }));
        let err = document.data(-1, None, &fetcher, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, KernelError::DeletedVersion);
    }

    #[test]
    fn version_rejects_out_of_range_index() {
        let document = Document::new("doc-1");
        assert!(matches!(document.version(-1), Err(KernelError::MissingVersion(_))));
    }

    #[test]
    fn version_at_picks_the_latest_entry_not_exceeding_the_bound() {
        let clock = ticking_clock();
        let mut manifest = algebra::new_document("doc-1");
        manifest = algebra::add_version(&manifest, "s3://v1.xml", Vec::new(), &clock);
        manifest = algebra::add_version(&manifest, "s3://v2.xml", Vec::new(), &clock);
        let document = Document::from_manifest(manifest);

        match document.version_at("2020-09-13T12:26:40Z").unwrap() {
            DocumentVersion::Live { data, .. } => assert_eq!(data, "s3://v1.xml"),
            _ => panic!("expected a live version"),
        }
    }
}
