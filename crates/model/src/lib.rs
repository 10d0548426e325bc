//! Domain model for the content repository: documents, documents bundles
//! (issues) and journals, built as thin typed-accessor wrappers over the
//! pure algebra in [`manifest`] and [`bundle`] (spec §3).

pub mod bundle;
pub mod document;
pub mod documents_bundle;
pub mod journal;
pub mod subject_areas;

pub use document::{
    Document,
    DocumentVersion,
    RenditionView,
};
pub use documents_bundle::DocumentsBundle;
pub use journal::Journal;
