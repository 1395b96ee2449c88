use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cases::CasesError;
use crate::compose::ComposeError;
use crate::extract::ExtractError;
use crate::persist::PersistError;
use crate::template::TemplateError;
use crate::FetchError;

/// Failure of a single page. Recorded in the report; the run goes on.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("{0}")]
    Compose(#[from] ComposeError),
    #[error("write failed: {0}")]
    Persist(#[from] PersistError),
}

/// Failure that stops a command before it can produce its report.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Cases(#[from] CasesError),
    #[error("blog listing unavailable: {0}")]
    Fetch(#[from] FetchError),
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MigrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MigrationError::Io {
            path: path.into(),
            source,
        }
    }
}
