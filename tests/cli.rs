use serde_json::json;
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};
use tempfile::TempDir;

struct Launcher {
    temp: TempDir,
}

impl Launcher {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("Manifests")).unwrap();
        fs::write(temp.path().join("config.json"), "{}").unwrap();
        Self { temp }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn manifest_dir(&self) -> PathBuf {
        self.root().join("Manifests")
    }

    fn install(&self, file: &str, app: &str, name: &str, main: &str, folder: &str) -> PathBuf {
        let install = self.root().join("Games").join(folder);
        fs::create_dir_all(install.join("Content")).unwrap();
        fs::write(install.join("Content").join(format!("{app}.pak")), app).unwrap();
        let location = install.to_string_lossy().to_string();
        let manifest = json!({
            "FormatVersion": 0,
            "AppName": app,
            "DisplayName": name,
            "InstallLocation": location,
            "ManifestLocation": format!("{location}/.egstore"),
            "StagingLocation": format!("{location}/.egstore/bps"),
            "MandatoryAppFolderName": folder,
            "MainGameAppName": main,
            "InstallSize": 2048
        });
        fs::write(
            self.manifest_dir().join(file),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
        install
    }

    fn run(&self, args: &[&str]) -> Output {
        self.run_in(self.root(), args)
    }

    fn run_in(&self, cwd: &Path, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_egs-mover"))
            .current_dir(cwd)
            .args(args)
            .arg("--manifest-dir")
            .arg(self.manifest_dir())
            .arg("--config")
            .arg(self.root().join("config.json"))
            .env_remove("RUST_LOG")
            .env_remove("EGS_MOVER_MANIFEST_DIR")
            .output()
            .unwrap()
    }

    fn field(&self, file: &str, key: &str) -> String {
        let raw = fs::read_to_string(self.manifest_dir().join(file)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value[key].as_str().unwrap().to_string()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn moves_game_and_dlc() {
    let launcher = Launcher::new();
    let source = launcher.install("A.item", "hyperion", "Hyperion", "hyperion", "Hyperion");
    launcher.install("B.item", "hyperion_exp", "Hyperion: Expansion", "hyperion", "Hyperion");
    launcher.install("C.item", "warden", "Warden", "warden", "Warden");
    let new_root = launcher.root().join("Fast");

    let output = launcher.run(&["HYPER", new_root.to_str().unwrap()]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("Main game: Hyperion"), "{text}");
    assert!(text.contains("DLC: Hyperion: Expansion"), "{text}");

    let destination = new_root.join("Hyperion");
    assert!(!source.exists());
    assert!(destination.join("Content/hyperion.pak").is_file());
    assert!(destination.join("Content/hyperion_exp.pak").is_file());
    let expected = destination.to_string_lossy().to_string();
    assert_eq!(launcher.field("A.item", "InstallLocation"), expected);
    assert_eq!(launcher.field("B.item", "InstallLocation"), expected);
    assert_eq!(
        launcher.field("B.item", "StagingLocation"),
        format!("{expected}/.egstore/bps")
    );
    assert!(launcher.root().join("Games/Warden").is_dir());
}

#[test]
fn skip_delete_keeps_source() {
    let launcher = Launcher::new();
    let source = launcher.install("A.item", "hyperion", "Hyperion", "hyperion", "Hyperion");
    let new_root = launcher.root().join("Fast");

    let output = launcher.run(&["hyperion", new_root.to_str().unwrap(), "--skip-delete"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(source.join("Content/hyperion.pak").is_file());
    assert!(new_root.join("Hyperion/Content/hyperion.pak").is_file());
}

#[test]
fn unknown_name_exits_with_not_found() {
    let launcher = Launcher::new();
    launcher.install("A.item", "hyperion", "Hyperion", "hyperion", "Hyperion");

    let output = launcher.run(&["portal", "/unused"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("portal"));
}

#[test]
fn ambiguous_name_lists_candidates() {
    let launcher = Launcher::new();
    let warden = launcher.install("A.item", "warden", "Star Warden", "warden", "StarWarden");
    launcher.install("B.item", "ww0", "World War Zero", "ww0", "WorldWarZero");
    let before = fs::read(launcher.manifest_dir().join("A.item")).unwrap();

    let output = launcher.run(&["war", "/unused"]);

    assert_eq!(output.status.code(), Some(3));
    let text = stdout(&output);
    assert!(text.contains("Star Warden"), "{text}");
    assert!(text.contains("World War Zero"), "{text}");
    assert!(warden.is_dir());
    assert_eq!(fs::read(launcher.manifest_dir().join("A.item")).unwrap(), before);
}

#[test]
fn unreadable_manifest_directory_is_fatal() {
    let launcher = Launcher::new();
    fs::remove_dir_all(launcher.manifest_dir()).unwrap();

    let output = launcher.run(&["hyperion", "/unused"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("manifest directory"), "{stderr}");
}

#[test]
fn dry_run_touches_nothing() {
    let launcher = Launcher::new();
    let source = launcher.install("A.item", "hyperion", "Hyperion", "hyperion", "Hyperion");
    let before = fs::read(launcher.manifest_dir().join("A.item")).unwrap();
    let new_root = launcher.root().join("Fast");

    let output = launcher.run(&["hyperion", new_root.to_str().unwrap(), "--dry-run"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Would move"));
    assert!(source.is_dir());
    assert!(!new_root.exists());
    assert_eq!(fs::read(launcher.manifest_dir().join("A.item")).unwrap(), before);
}

#[test]
fn relative_destination_is_written_as_absolute_path() {
    let launcher = Launcher::new();
    launcher.install("A.item", "hyperion", "Hyperion", "hyperion", "Hyperion");

    let output = launcher.run_in(launcher.root(), &["hyperion", "Fast"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(launcher.root().join("Fast/Hyperion/Content/hyperion.pak").is_file());
    for key in ["InstallLocation", "ManifestLocation", "StagingLocation"] {
        let value = launcher.field("A.item", key);
        assert!(Path::new(&value).is_absolute(), "{key} = {value}");
        assert!(value.contains("Fast"), "{key} = {value}");
    }
}

#[test]
fn working_directory_inside_install_is_rejected() {
    let launcher = Launcher::new();
    let source = launcher.install("A.item", "hyperion", "Hyperion", "hyperion", "Hyperion");
    let before = fs::read(launcher.manifest_dir().join("A.item")).unwrap();

    let output = launcher.run_in(&source, &["hyperion", "."]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("inside the install directory"), "{stderr}");
    assert_eq!(fs::read(launcher.manifest_dir().join("A.item")).unwrap(), before);
    assert!(!source.join("Hyperion").exists());
    assert!(source.join("Content/hyperion.pak").is_file());
}
