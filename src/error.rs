use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub type MoveResult<T> = std::result::Result<T, MoveError>;

/// Fatal failures of a relocation run.
///
/// "No match" and "ambiguous match" are not errors; they come back as
/// [`crate::catalog::Resolution`] variants.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("cannot read manifest directory {path}")]
    ManifestDirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read manifest {path}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest {path} could not be parsed and cannot be rewritten")]
    ManifestUnreadable { path: PathBuf },

    #[error("cannot write manifest {path}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("main application {identity:?} is not installed (no manifest found)")]
    MainApplicationMissing { identity: String },

    #[error("destination {destination} is inside the install directory {source_dir}")]
    DestinationInsideSource {
        destination: PathBuf,
        source_dir: PathBuf,
    },

    #[error("cannot resolve destination {path}")]
    DestinationUnresolved {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("install directory {} does not exist", install_label(path))]
    SourceInstallMissing { path: PathBuf },

    #[error("destination file {path} already exists")]
    DestinationCollision { path: PathBuf },

    #[error("walk {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("copy {from} -> {to}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("delete {path}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn install_label(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        "(no InstallLocation in manifest)".to_string()
    } else {
        path.display().to_string()
    }
}

impl MoveError {
    pub fn copy(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        MoveError::Copy {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}
