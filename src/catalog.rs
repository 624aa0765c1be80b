use crate::{
    error::{MoveError, MoveResult},
    manifest::{self, ApplicationRecord},
};
use std::{fs, path::Path};
use tracing::{debug, warn};

/// All manifests found in the launcher's manifest directory.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<ApplicationRecord>,
}

/// Outcome of looking up a partial display name.
#[derive(Debug, PartialEq)]
pub enum Resolution<'a> {
    NotFound,
    Found(&'a ApplicationRecord),
    MultipleFound(Vec<&'a ApplicationRecord>),
}

impl Catalog {
    pub fn load(manifest_dir: &Path) -> MoveResult<Self> {
        let unavailable = |source| MoveError::ManifestDirectoryUnavailable {
            path: manifest_dir.to_path_buf(),
            source,
        };

        let mut records = Vec::new();
        for entry in fs::read_dir(manifest_dir).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            let path = entry.path();
            if !is_manifest_file(&path) {
                continue;
            }
            match manifest::load_record(&path) {
                Ok(record) => {
                    debug!(
                        manifest = %path.display(),
                        app = %record.identity,
                        name = %record.display_name,
                        "loaded manifest"
                    );
                    records.push(record);
                }
                Err(err) => warn!(manifest = %path.display(), error = %err, "skipping manifest"),
            }
        }

        debug!(count = records.len(), dir = %manifest_dir.display(), "catalog built");
        Ok(Self { records })
    }

    #[cfg(test)]
    pub fn from_records(records: Vec<ApplicationRecord>) -> Self {
        Self { records }
    }

    #[cfg(test)]
    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Case-insensitive substring match on display names.
    ///
    /// Hits are counted per group: a game and its own DLC matching the same
    /// name are one candidate, represented by the main application when it
    /// matched. Ambiguity between groups is returned to the caller, never
    /// resolved here.
    pub fn resolve(&self, partial_name: &str) -> Resolution<'_> {
        let needle = partial_name.to_lowercase();
        let mut matches: Vec<&ApplicationRecord> = Vec::new();
        for record in &self.records {
            if !record.display_name.to_lowercase().contains(&needle) {
                continue;
            }
            let same_group = matches.iter_mut().find(|existing| {
                existing.main_application_identity == record.main_application_identity
            });
            match same_group {
                Some(existing) => {
                    if record.is_main_application() && !existing.is_main_application() {
                        *existing = record;
                    }
                }
                None => matches.push(record),
            }
        }

        match matches.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(matches.remove(0)),
            _ => Resolution::MultipleFound(matches),
        }
    }

    /// Every record whose main application is `main_identity`, the main
    /// application itself included.
    pub fn group(&self, main_identity: &str) -> Vec<&ApplicationRecord> {
        self.records
            .iter()
            .filter(|record| record.main_application_identity == main_identity)
            .collect()
    }
}

fn is_manifest_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(manifest::MANIFEST_EXTENSION))
}
