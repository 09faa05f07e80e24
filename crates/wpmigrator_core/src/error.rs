use std::path::PathBuf;

use thiserror::Error;

use crate::record::EntityKind;

pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("request for `{collection}` failed: {detail}")]
    Transport { collection: String, detail: String },

    #[error("malformed response for `{collection}`: {detail}")]
    MalformedResponse { collection: String, detail: String },

    #[error("{kind} id={id} already exists")]
    DuplicateId { kind: EntityKind, id: i64 },

    #[error("{kind} id={id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("path={} already exists", .path.display())]
    PathExists { path: PathBuf },

    #[error("record is missing field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` is invalid: {detail}")]
    InvalidField { field: String, detail: String },

    #[error("markdown conversion failed: {0}")]
    Markdown(String),

    #[error("front matter YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrateError {
    pub(crate) fn transport(collection: &str, detail: impl Into<String>) -> Self {
        Self::Transport {
            collection: collection.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn malformed(collection: &str, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            collection: collection.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid_field(field: &str, detail: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            detail: detail.into(),
        }
    }
}
