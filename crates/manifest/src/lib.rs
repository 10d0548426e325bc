//! Pure, deterministic algebra over document manifests.
//!
//! No I/O, no globals: every function here takes the current state and a
//! `now` producer and returns a brand new, immutable value. Callers own the
//! decision of when "now" is and how persistence happens; this crate only
//! knows how to grow an append-only version history one step at a time.

pub mod algebra;
pub mod timestamp;
pub mod types;

pub use algebra::{
    add_asset_version,
    add_deleted_version,
    add_rendition_version,
    add_version,
    new_document,
};
pub use timestamp::{
    parse_query_timestamp,
    Timestamp,
};
pub use types::{
    ExtraFields,
    LiveVersion,
    Manifest,
    Rendition,
    RenditionData,
    Version,
};
