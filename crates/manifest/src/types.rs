use std::collections::BTreeMap;

use serde::{
    de::Error as DeError,
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use serde_json::{
    Map,
    Value,
};

use crate::timestamp::Timestamp;

/// Fields present on a serialized version that this crate does not know
/// about. Preserved verbatim across every algebra operation so a manifest
/// written by a newer build round-trips losslessly through an older one.
pub type ExtraFields = Map<String, Value>;

/// One asset's upload history: every `(timestamp, uri)` pair recorded for
/// it, oldest first.
pub type AssetHistory = Vec<(Timestamp, String)>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenditionData {
    pub timestamp: Timestamp,
    pub url: String,
    pub size_bytes: u64,
}

/// A single rendering of a document (a PDF, say) identified by the triple
/// of filename, mimetype and language; `data` is its own upload history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    pub filename: String,
    pub mimetype: String,
    pub lang: String,
    pub data: Vec<RenditionData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveVersion {
    pub data: String,
    pub timestamp: Timestamp,
    pub assets: BTreeMap<String, AssetHistory>,
    pub renditions: Vec<Rendition>,
    pub extra: ExtraFields,
}

/// One entry in a manifest's version history. `Deleted` is a tombstone:
/// once appended, no asset or rendition mutation applies to it, and only a
/// fresh `Live` version can follow.
#[derive(Debug, Clone, PartialEq)]
pub enum Version {
    Live(LiveVersion),
    Deleted { timestamp: Timestamp, extra: ExtraFields },
}

impl Version {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Version::Live(v) => v.timestamp,
            Version::Deleted { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Version::Deleted { .. })
    }

    pub fn as_live(&self) -> Option<&LiveVersion> {
        match self {
            Version::Live(v) => Some(v),
            Version::Deleted { .. } => None,
        }
    }
}

const FIELD_DATA: &str = "data";
const FIELD_TIMESTAMP: &str = "timestamp";
const FIELD_ASSETS: &str = "assets";
const FIELD_RENDITIONS: &str = "renditions";
const FIELD_DELETED: &str = "deleted";

// `Version` distinguishes Live from Deleted by the presence of a
// `"deleted": true` key rather than an explicit tag field, so a manifest
// written before renditions/assets existed, or before this crate existed,
// still deserializes. Unknown keys ride along in `extra` and are written
// back out untouched.
impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = Map::new();
        match self {
            Version::Live(v) => {
                for (k, val) in &v.extra {
                    map.insert(k.clone(), val.clone());
                }
                map.insert(FIELD_DATA.to_string(), Value::String(v.data.clone()));
                map.insert(FIELD_TIMESTAMP.to_string(), Value::String(v.timestamp.to_string()));
                map.insert(
                    FIELD_ASSETS.to_string(),
                    serde_json::to_value(&v.assets).map_err(serde::ser::Error::custom)?,
                );
                map.insert(
                    FIELD_RENDITIONS.to_string(),
                    serde_json::to_value(&v.renditions).map_err(serde::ser::Error::custom)?,
                );
            },
            Version::Deleted { timestamp, extra } => {
                for (k, val) in extra {
                    map.insert(k.clone(), val.clone());
                }
                map.insert(FIELD_DELETED.to_string(), Value::Bool(true));
                map.insert(FIELD_TIMESTAMP.to_string(), Value::String(timestamp.to_string()));
            },
        }
        Value::Object(map).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map = Map::deserialize(deserializer)?;

        let deleted = matches!(map.get(FIELD_DELETED), Some(Value::Bool(true)));

        let timestamp_value = map.remove(FIELD_TIMESTAMP).ok_or_else(|| DeError::missing_field("timestamp"))?;
        let timestamp: Timestamp = serde_json::from_value(timestamp_value).map_err(DeError::custom)?;

        if deleted {
            map.remove(FIELD_DELETED);
            Ok(Version::Deleted { timestamp, extra: map })
        } else {
            let data_value = map.remove(FIELD_DATA).ok_or_else(|| DeError::missing_field("data"))?;
            let data: String = serde_json::from_value(data_value).map_err(DeError::custom)?;

            let assets = match map.remove(FIELD_ASSETS) {
                Some(v) => serde_json::from_value(v).map_err(DeError::custom)?,
                None => BTreeMap::new(),
            };
            let renditions = match map.remove(FIELD_RENDITIONS) {
                Some(v) => serde_json::from_value(v).map_err(DeError::custom)?,
                None => Vec::new(),
            };

            Ok(Version::Live(LiveVersion {
                data,
                timestamp,
                assets,
                renditions,
                extra: map,
            }))
        }
    }
}

/// An append-only version history for a single document id. Every
/// operation in [`crate::algebra`] returns a new `Manifest`; none mutate
/// one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub versions: Vec<Version>,
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
    fn live_version_round_trips_and_preserves_unknown_keys() {
        let mut extra = Map::new();
        extra.insert("legacy_flag".to_string(), Value::Bool(true));

        let version = Version::Live(LiveVersion {
            data: "s3://bucket/v1.xml".to_string(),
            timestamp: ts(0),
            assets: BTreeMap::new(),
            renditions: Vec::new(),
            extra,
        });

        let json = serde_json::to_string(&version).unwrap();
        assert!(json.contains("\"legacy_flag\":true"));

        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
    }

    #[test]
    fn deleted_version_round_trips() {
        let version = Version::Deleted { timestamp: ts(0), extra: Map::new() };
        let json = serde_json::to_string(&version).unwrap();
        assert!(json.contains("\"deleted\":true"));

        let back: Version = serde_json::from_str(&json).unwrap();
        assert!(back.is_deleted());
    }

    #[test]
    fn manifest_round_trips() {
        let manifest = Manifest {
            id: "doc-1".to_string(),
            versions: vec![
                Version::Live(LiveVersion {
                    data: "s3://bucket/v1.xml".to_string(),
                    timestamp: ts(0),
                    assets: BTreeMap::new(),
                    renditions: Vec::new(),
                    extra: Map::new(),
                }),
                Version::Deleted { timestamp: ts(1), extra: Map::new() },
            ],
        };

        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
    }
}
