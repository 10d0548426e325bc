use std::collections::BTreeMap;

use manifest::Timestamp;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};

/// Fields present on a serialized bundle manifest that this crate does not
/// know about, preserved verbatim across every mutation.
pub type ExtraFields = Map<String, Value>;

/// One field's write history: every `(timestamp, value)` pair ever set for
/// it, oldest first. Reads collapse this to the last entry; `all` views
/// return the whole history (spec §3.2).
pub type MetadataHistory = Vec<(Timestamp, Value)>;

/// An ordered, deduplicated collection of child ids (a bundle's documents,
/// or a journal's issues) plus a historied metadata bag and a side-channel
/// of singleton "components" (a journal's `aop`/`provisional`).
///
/// Shared by [`crate::documents_bundle::DocumentsBundle`] and
/// [`crate::journal::Journal`]; both are thin typed-accessor wrappers over
/// this same manifest shape (spec §3.2).
#[derive(Debug, Clone, PartialEq)]
pub struct BundleManifest {
    pub id: String,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub items: Vec<String>,
    pub metadata: BTreeMap<String, MetadataHistory>,
    pub components: BTreeMap<String, Value>,
    pub extra: ExtraFields,
}

const FIELD_ID: &str = "id";
const FIELD_CREATED: &str = "created";
const FIELD_UPDATED: &str = "updated";
const FIELD_ITEMS: &str = "items";
const FIELD_METADATA: &str = "metadata";

impl Serialize for BundleManifest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = Map::new();
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        for (k, v) in &self.components {
            map.insert(k.clone(), v.clone());
        }
        map.insert(FIELD_ID.to_string(), Value::String(self.id.clone()));
        map.insert(FIELD_CREATED.to_string(), Value::String(self.created.to_string()));
        map.insert(FIELD_UPDATED.to_string(), Value::String(self.updated.to_string()));
        map.insert(
            FIELD_ITEMS.to_string(),
            Value::Array(self.items.iter().cloned().map(Value::String).collect()),
        );
        let metadata = self
            .metadata
            .iter()
            .map(|(name, history)| {
                let entries: Vec<Value> =
                    history.iter().map(|(ts, v)| Value::Array(vec![Value::String(ts.to_string()), v.clone()])).collect();
                (name.clone(), Value::Array(entries))
            })
            .collect::<Map<_, _>>();
        map.insert(FIELD_METADATA.to_string(), Value::Object(metadata));
        Value::Object(map).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BundleManifest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as DeError;

        let mut map = Map::deserialize(deserializer)?;

        let id = map
            .remove(FIELD_ID)
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| DeError::missing_field("id"))?;
        let created = match map.remove(FIELD_CREATED) {
            Some(v) => serde_json::from_value(v).map_err(DeError::custom)?,
            None => Timestamp::now(),
        };
        let updated = match map.remove(FIELD_UPDATED) {
            Some(v) => serde_json::from_value(v).map_err(DeError::custom)?,
            None => created,
        };
        let items = match map.remove(FIELD_ITEMS) {
            Some(Value::Array(values)) => {
                values.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
            },
            _ => Vec::new(),
        };
        let metadata = match map.remove(FIELD_METADATA) {
            Some(Value::Object(fields)) => {
                let mut parsed = BTreeMap::new();
                for (name, entries) in fields {
                    let history: MetadataHistory = match entries {
                        Value::Array(pairs) => pairs
                            .into_iter()
                            .filter_map(|pair| match pair {
                                Value::Array(mut tuple) if tuple.len() == 2 => {
                                    let value = tuple.pop().expect("len checked above");
                                    let ts_value = tuple.pop().expect("len checked above");
                                    let ts: Timestamp =
                                        serde_json::from_value(ts_value).map_err(DeError::custom).ok()?;
                                    Some((ts, value))
                                },
                                _ => None,
                            })
                            .collect(),
                        _ => Vec::new(),
                    };
                    parsed.insert(name, history);
                }
                parsed
            },
            _ => BTreeMap::new(),
        };

        // Anything left over is either a journal component (`aop`,
        // `provisional`) or a forward-compatible field this crate doesn't
        // know about yet; both ride along in `components`/`extra` and are
        // written back out untouched. We can't tell them apart just from
        // the wire shape, so known component names are split out by the
        // `journal` module when it reads this value; everything else is
        // just carried in `components` since it costs nothing to keep it
        // there instead of a separate `extra` map at this level.
        let components = map.into_iter().collect();

        Ok(BundleManifest { id, created, updated, items, metadata, components, extra: Map::new() })
    }
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
    fn round_trips_items_metadata_and_components() {
        let mut metadata = BTreeMap::new();
        metadata.insert("publication_year".to_string(), vec![(ts(0), json!("2020"))]);
        let mut components = BTreeMap::new();
        components.insert("aop".to_string(), json!("bundle-1"));

        let manifest = BundleManifest {
            id: "journal-1".to_string(),
            created: ts(0),
            updated: ts(1),
            items: vec!["issue-1".to_string()],
            metadata,
            components,
            extra: Map::new(),
        };

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["aop"], json!("bundle-1"));

        let back: BundleManifest = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, manifest.id);
        assert_eq!(back.items, manifest.items);
        assert_eq!(back.components.get("aop"), Some(&json!("bundle-1")));
        assert_eq!(back.metadata["publication_year"], manifest.metadata["publication_year"]);
    }
}
