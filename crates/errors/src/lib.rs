//! Shared error taxonomy for the content store.
//!
//! Every domain error is either retryable (the caller may repeat the exact
//! same request without further action) or non-retryable (repeating it
//! produces the same failure). `KernelError` is the single error type used
//! across `manifest`, `model` and `storage` so command handlers and the
//! HTTP surface only need to classify one enum.

use http::StatusCode;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Attempted to register an entity whose id is already in use.
    #[error("cannot add {kind} with id \"{id}\": the id is already in use")]
    AlreadyExists { kind: &'static str, id: String },

    /// Attempted to fetch/update an entity that isn't known to the store.
    #[error("cannot fetch {kind} with id \"{id}\": {kind} does not exist")]
    DoesNotExist { kind: &'static str, id: String },

    /// The requested mutation is identical to the current latest version.
    /// Treated as a retryable, idempotent no-op at the HTTP boundary.
    #[error("could not add version: the version is equal to the latest one")]
    VersionAlreadySet,

    /// The document's latest version is a tombstone; no further version or
    /// asset/rendition mutation is allowed except a fresh `new_version`.
    #[error("cannot add version: the document is deleted")]
    DeletedVersion,

    /// Referenced an asset id absent from the latest version's asset map.
    #[error("cannot add version for \"{asset_id}\": unknown asset_id")]
    UnknownAsset { asset_id: String },

    /// `version()`/`version_at()` index or timestamp has no match.
    #[error("missing version: {0}")]
    MissingVersion(String),

    /// A timestamp string failed the `^\d{{4}}-\d{{2}}-\d{{2}}...` pattern.
    #[error("invalid format for timestamp \"{0}\"")]
    InvalidTimestamp(String),

    /// A metadata field failed its constrained-value validation
    /// (`subject_areas`, `publication_year`, ...).
    #[error("invalid value for \"{field}\": {reason}")]
    InvalidMetadata { field: &'static str, reason: String },

    /// Transient failure from a downstream collaborator (object store,
    /// database). Safe to retry as-is.
    #[error("retryable error: {0}")]
    Retryable(String),

    /// Permanent failure from a downstream collaborator. Retrying with the
    /// same input will not help.
    #[error("non-retryable error: {0}")]
    Terminal(String),
}

impl KernelError {
    /// True for errors where repeating the exact same request is the
    /// correct recovery strategy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KernelError::VersionAlreadySet | KernelError::Retryable(_))
    }

    /// HTTP status this error should be surfaced as at the API boundary.
    pub fn http_status(&self) -> StatusCode {
        match self {
            KernelError::VersionAlreadySet => StatusCode::NO_CONTENT,
            KernelError::DoesNotExist { .. }
            | KernelError::DeletedVersion
            | KernelError::MissingVersion(_) => StatusCode::NOT_FOUND,
            KernelError::AlreadyExists { .. } => StatusCode::CONFLICT,
            KernelError::UnknownAsset { .. }
            | KernelError::InvalidTimestamp(_)
            | KernelError::InvalidMetadata { .. } => StatusCode::BAD_REQUEST,
            KernelError::Retryable(_) => StatusCode::SERVICE_UNAVAILABLE,
            KernelError::Terminal(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
