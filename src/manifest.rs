use crate::error::{MoveError, MoveResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

pub const MANIFEST_EXTENSION: &str = "item";

const APP_NAME: &str = "AppName";
const DISPLAY_NAME: &str = "DisplayName";
const MAIN_GAME_APP_NAME: &str = "MainGameAppName";
const INSTALL_LOCATION: &str = "InstallLocation";
const MANDATORY_APP_FOLDER_NAME: &str = "MandatoryAppFolderName";
const MANIFEST_LOCATION: &str = "ManifestLocation";
const STAGING_LOCATION: &str = "StagingLocation";

/// Fields rewritten when a record moves to a new install root.
pub const LOCATION_FIELDS: [&str; 3] = [MANIFEST_LOCATION, INSTALL_LOCATION, STAGING_LOCATION];

const REQUIRED_FIELDS: [&str; 5] = [
    APP_NAME,
    DISPLAY_NAME,
    MAIN_GAME_APP_NAME,
    INSTALL_LOCATION,
    MANDATORY_APP_FOLDER_NAME,
];

/// One installed application, backed by a single `.item` manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRecord {
    pub identity: String,
    pub display_name: String,
    pub main_application_identity: String,
    pub manifest_path: PathBuf,
    pub install_location: String,
    pub mandatory_folder_name: String,
    /// Full manifest contents; `None` when the file was not a JSON object.
    pub document: Option<Map<String, Value>>,
}

impl ApplicationRecord {
    pub fn from_document(manifest_path: PathBuf, document: Map<String, Value>) -> Self {
        let field = |key: &str| {
            document
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            identity: field(APP_NAME),
            display_name: field(DISPLAY_NAME),
            main_application_identity: field(MAIN_GAME_APP_NAME),
            install_location: field(INSTALL_LOCATION),
            mandatory_folder_name: field(MANDATORY_APP_FOLDER_NAME),
            manifest_path,
            document: Some(document),
        }
    }

    fn degraded(manifest_path: PathBuf) -> Self {
        Self {
            identity: String::new(),
            display_name: String::new(),
            main_application_identity: String::new(),
            manifest_path,
            install_location: String::new(),
            mandatory_folder_name: String::new(),
            document: None,
        }
    }

    pub fn is_main_application(&self) -> bool {
        self.identity == self.main_application_identity
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let Some(document) = self.document.as_ref() else {
            return REQUIRED_FIELDS.to_vec();
        };
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|key| document.get(*key).and_then(Value::as_str).is_none())
            .collect()
    }
}

/// Reads one manifest. Only an unreadable file is an error; malformed
/// content yields a record whose missing fields are empty.
pub fn load_record(path: &Path) -> MoveResult<ApplicationRecord> {
    let raw = fs::read(path).map_err(|source| MoveError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_record(path, &raw))
}

pub fn parse_record(path: &Path, raw: &[u8]) -> ApplicationRecord {
    let record = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(document)) => {
            ApplicationRecord::from_document(path.to_path_buf(), document)
        }
        Ok(_) => {
            warn!(
                manifest = %path.display(),
                "manifest is not a JSON object; ignoring its fields"
            );
            return ApplicationRecord::degraded(path.to_path_buf());
        }
        Err(err) => {
            warn!(
                manifest = %path.display(),
                error = %err,
                "manifest could not be parsed; ignoring its fields"
            );
            return ApplicationRecord::degraded(path.to_path_buf());
        }
    };

    let missing = record.missing_fields();
    if !missing.is_empty() {
        warn!(
            manifest = %path.display(),
            missing = ?missing,
            "manifest is missing fields; they read as empty"
        );
    }
    record
}

/// Install directory every group member moves under: the destination root
/// joined with the main application's mandatory folder name.
pub fn destination_path(destination_root: &Path, main: &ApplicationRecord) -> PathBuf {
    destination_root.join(&main.mandatory_folder_name)
}

/// Replaces `old_root` with `new_root` in every location field. Each field
/// is matched against `old_root` as given, never against a value already
/// rewritten in this pass. Returns how many fields changed.
pub fn rewrite_location_fields(
    document: &mut Map<String, Value>,
    old_root: &str,
    new_root: &str,
) -> usize {
    if old_root.is_empty() {
        return 0;
    }

    let mut changed = 0;
    for key in LOCATION_FIELDS {
        let Some(Value::String(current)) = document.get_mut(key) else {
            continue;
        };
        if current.contains(old_root) {
            *current = current.replace(old_root, new_root);
            changed += 1;
        }
    }
    changed
}

/// Points a record's manifest at `destination` and writes it back in place.
pub fn relocate_record(record: &ApplicationRecord, destination: &Path) -> MoveResult<usize> {
    let Some(document) = record.document.as_ref() else {
        return Err(MoveError::ManifestUnreadable {
            path: record.manifest_path.clone(),
        });
    };

    let mut document = document.clone();
    let new_root = destination.to_string_lossy();
    let changed = rewrite_location_fields(&mut document, &record.install_location, &new_root);
    debug!(
        manifest = %record.manifest_path.display(),
        from = %record.install_location,
        to = %new_root,
        changed,
        "rewriting manifest locations"
    );

    write_manifest(&record.manifest_path, &document)?;
    Ok(changed)
}

pub fn write_manifest(path: &Path, document: &Map<String, Value>) -> MoveResult<()> {
    let raw = manifest_json(document).map_err(|source| MoveError::ManifestWrite {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &raw).map_err(|source| MoveError::ManifestWrite {
        path: path.to_path_buf(),
        source,
    })
}

// The launcher writes its manifests tab-indented.
fn manifest_json(document: &Map<String, Value>) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut raw, formatter);
    document.serialize(&mut ser)?;
    raw.push(b'\n');
    Ok(raw)
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "manifest path has no file name")
    })?;
    let mut temp_name = OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    let temp_path = parent.join(temp_name);

    fs::write(&temp_path, contents)?;
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    Ok(())
}
