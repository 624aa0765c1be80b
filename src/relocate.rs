use crate::{
    catalog::Catalog,
    error::{MoveError, MoveResult},
    manifest::{self, ApplicationRecord},
};
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct RelocateOptions {
    pub destination_root: PathBuf,
    pub skip_delete: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub identity: String,
    pub display_name: String,
    pub is_main: bool,
}

impl GroupMember {
    fn from_record(record: &ApplicationRecord) -> Self {
        Self {
            identity: record.identity.clone(),
            display_name: record.display_name.clone(),
            is_main: record.is_main_application(),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        if self.is_main {
            "Main game"
        } else {
            "DLC"
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelocationReport {
    pub members: Vec<GroupMember>,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// `None` on a dry run.
    pub copy: Option<CopyReport>,
    pub source_deleted: bool,
}

/// Moves `matched`'s whole group to `options.destination_root`.
///
/// Manifests of every member are rewritten first, then the main install
/// tree is copied, and only a completed copy is followed by deleting the
/// source. A failure after the manifest pass leaves the manifests pointing at
/// the destination.
pub fn relocate_group(
    catalog: &Catalog,
    matched: &ApplicationRecord,
    options: &RelocateOptions,
) -> MoveResult<RelocationReport> {
    let group = catalog.group(&matched.main_application_identity);
    let main = group
        .iter()
        .copied()
        .find(|record| record.is_main_application())
        .ok_or_else(|| MoveError::MainApplicationMissing {
            identity: matched.main_application_identity.clone(),
        })?;

    if main.install_location.is_empty() {
        return Err(MoveError::SourceInstallMissing {
            path: PathBuf::new(),
        });
    }
    let source = normalize(Path::new(&main.install_location));
    let destination_root = absolute_root(&options.destination_root)?;
    let destination = manifest::destination_path(&destination_root, main);
    if is_inside(&destination_root, &main.mandatory_folder_name, &source) {
        return Err(MoveError::DestinationInsideSource {
            destination,
            source_dir: source,
        });
    }

    let members = group
        .iter()
        .map(|record| GroupMember::from_record(record))
        .collect();
    let mut report = RelocationReport {
        members,
        source,
        destination,
        copy: None,
        source_deleted: false,
    };

    if options.dry_run {
        info!(
            from = %report.source.display(),
            to = %report.destination.display(),
            manifests = group.len(),
            "dry run; nothing changed"
        );
        return Ok(report);
    }

    info!(count = group.len(), "rewriting manifests");
    for record in &group {
        manifest::relocate_record(record, &report.destination)?;
    }

    info!(
        from = %report.source.display(),
        to = %report.destination.display(),
        "copying install directory"
    );
    let copied = copy_tree(&report.source, &report.destination)?;
    info!(
        files = copied.files,
        dirs = copied.dirs,
        bytes = copied.bytes,
        "copy complete"
    );
    report.copy = Some(copied);

    if options.skip_delete {
        info!(path = %report.source.display(), "keeping original install directory");
    } else {
        info!(path = %report.source.display(), "removing original install directory");
        remove_tree(&report.source)?;
        report.source_deleted = true;
    }

    Ok(report)
}

/// Anchors a relative root at the working directory and drops `.`/`..`
/// components, so manifests only ever receive absolute paths.
fn absolute_root(root: &Path) -> MoveResult<PathBuf> {
    let absolute =
        std::path::absolute(root).map_err(|source| MoveError::DestinationUnresolved {
            path: root.to_path_buf(),
            source,
        })?;
    Ok(normalize(&absolute))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

// Checked lexically and, where the paths exist, through symlinks too.
fn is_inside(destination_root: &Path, folder: &str, source: &Path) -> bool {
    if destination_root.join(folder).starts_with(source) {
        return true;
    }
    let (Ok(root), Ok(source)) = (fs::canonicalize(destination_root), fs::canonicalize(source))
    else {
        return false;
    };
    root.join(folder).starts_with(source)
}

/// Copies `source` into `dest`, creating directories as needed. Existing
/// directories are merged into; an existing file aborts the copy.
pub fn copy_tree(source: &Path, dest: &Path) -> MoveResult<CopyReport> {
    if !source.is_dir() {
        return Err(MoveError::SourceInstallMissing {
            path: source.to_path_buf(),
        });
    }

    let mut report = CopyReport::default();
    fs::create_dir_all(dest).map_err(|err| MoveError::copy(source, dest, err))?;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|err| MoveError::Walk {
            path: err.path().unwrap_or(source).to_path_buf(),
            source: err,
        })?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let dest_path = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .map_err(|err| MoveError::copy(entry.path(), &dest_path, err))?;
            report.dirs += 1;
            continue;
        }

        if entry.file_type().is_symlink() {
            copy_symlink(entry.path(), &dest_path)?;
            report.files += 1;
            continue;
        }

        let bytes = copy_file(entry.path(), &dest_path)?;
        debug!(file = %rel.display(), bytes, "copied");
        report.files += 1;
        report.bytes += bytes;
    }

    Ok(report)
}

fn copy_error(source: &Path, dest: &Path, err: io::Error) -> MoveError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        MoveError::DestinationCollision {
            path: dest.to_path_buf(),
        }
    } else {
        MoveError::copy(source, dest, err)
    }
}

// `create_new` refuses to open an existing destination, so a collision can
// never overwrite data.
fn copy_file(source: &Path, dest: &Path) -> MoveResult<u64> {
    let mut reader = fs::File::open(source).map_err(|err| MoveError::copy(source, dest, err))?;
    let permissions = reader
        .metadata()
        .map_err(|err| MoveError::copy(source, dest, err))?
        .permissions();
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|err| copy_error(source, dest, err))?;
    let bytes =
        io::copy(&mut reader, &mut writer).map_err(|err| MoveError::copy(source, dest, err))?;
    writer
        .set_permissions(permissions)
        .map_err(|err| MoveError::copy(source, dest, err))?;
    Ok(bytes)
}

#[cfg(unix)]
fn copy_symlink(source: &Path, dest: &Path) -> MoveResult<()> {
    let target = fs::read_link(source).map_err(|err| MoveError::copy(source, dest, err))?;
    std::os::unix::fs::symlink(&target, dest).map_err(|err| copy_error(source, dest, err))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, dest: &Path) -> MoveResult<()> {
    copy_file(source, dest).map(|_| ())
}

pub fn remove_tree(path: &Path) -> MoveResult<()> {
    fs::remove_dir_all(path).map_err(|source| MoveError::Delete {
        path: path.to_path_buf(),
        source,
    })
}
