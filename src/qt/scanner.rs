use ignore::WalkBuilder;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::model::installation::Installation;

static VERSION_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+\.)+").expect("valid version directory regex"));

/// Version directories look like `6.5.0`, `5.15.2`, `6.`.
pub fn matches_version_pattern(name: &str) -> bool {
    VERSION_DIR_RE.is_match(name)
}

/// Finds `<root>/<version>/<kit>` directories that carry `bin/<marker_file>`.
///
/// Results keep directory-listing order. A missing root yields an empty list.
pub fn find_installations(root: &Path, marker_file: &str) -> Vec<Installation> {
    if root.as_os_str().is_empty() || !root.is_dir() {
        tracing::debug!("scan root {} does not exist", root.display());
        return Vec::new();
    }

    let mut installations = Vec::new();

    for (version_dir, version_name) in child_dirs(root) {
        if !matches_version_pattern(&version_name) {
            continue;
        }

        for (kit_dir, kit_name) in child_dirs(&version_dir) {
            if kit_name.eq_ignore_ascii_case("src") {
                continue;
            }

            if has_marker(&kit_dir, marker_file) {
                installations.push(Installation::new(kit_dir));
            }
        }
    }

    tracing::info!(
        "found {} Qt installation(s) under {}",
        installations.len(),
        root.display()
    );
    installations
}

/// Recursively collects files under `start` whose extension is `extension`.
/// Ignore files are not consulted.
pub fn find_files_with_extension(start: &Path, extension: &str) -> Vec<PathBuf> {
    if !start.is_dir() {
        tracing::debug!("not a directory: {}", start.display());
        return Vec::new();
    }

    WalkBuilder::new(start)
        .standard_filters(false)
        .build()
        .flatten()
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            let matches = entry
                .path()
                .extension()
                .is_some_and(|ext| ext == extension);
            (metadata.is_file() && matches).then(|| entry.path().to_path_buf())
        })
        .collect()
}

/// Immediate subdirectories of `dir`, symlinks followed, hidden entries kept.
fn child_dirs(dir: &Path) -> Vec<(PathBuf, String)> {
    WalkBuilder::new(dir)
        .max_depth(Some(1))
        .standard_filters(false)
        .follow_links(true)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("cannot list {}: {err}", dir.display());
                None
            }
        })
        .filter_map(|entry| {
            if entry.depth() == 0 {
                return None;
            }

            let metadata = entry.metadata().ok()?;
            if !metadata.is_dir() {
                return None;
            }

            let name = entry.file_name().to_str()?.to_string();
            Some((entry.path().to_path_buf(), name))
        })
        .collect()
}

fn has_marker(kit_dir: &Path, marker_file: &str) -> bool {
    let marker = kit_dir.join("bin").join(marker_file);
    match fs::metadata(&marker) {
        Ok(_) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            tracing::warn!("cannot check {}: {err}", marker.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn paths(installations: &[Installation]) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = installations.iter().map(|i| i.path().to_path_buf()).collect();
        out.sort();
        out
    }

    #[test]
    fn version_pattern_requires_leading_digits_and_dot() {
        assert!(matches_version_pattern("6.5.0"));
        assert!(matches_version_pattern("5.15.2"));
        assert!(matches_version_pattern("6."));
        assert!(!matches_version_pattern("Tools"));
        assert!(!matches_version_pattern("v6.5.0"));
        assert!(!matches_version_pattern("6"));
        assert!(!matches_version_pattern(".6"));
    }

    #[test]
    fn finds_kit_with_marker_and_skips_src() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("6.5.0/gcc_64/bin/qt.conf"));
        touch(&root.path().join("6.5.0/src/qtbase/CMakeLists.txt"));

        let found = find_installations(root.path(), "qt.conf");
        assert_eq!(paths(&found), vec![root.path().join("6.5.0/gcc_64")]);
    }

    #[test]
    fn src_is_excluded_in_any_case_even_with_marker() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("6.5.0/src/bin/qt.conf"));
        touch(&root.path().join("6.5.0/SRC/bin/qt.conf"));
        touch(&root.path().join("6.5.0/Src/bin/qt.conf"));

        assert!(find_installations(root.path(), "qt.conf").is_empty());
    }

    #[test]
    fn non_version_directories_are_not_descended() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Tools/gcc_64/bin/qt.conf"));
        touch(&root.path().join("Docs/gcc_64/bin/qt.conf"));
        touch(&root.path().join("latest/gcc_64/bin/qt.conf"));

        assert!(find_installations(root.path(), "qt.conf").is_empty());
    }

    #[test]
    fn kits_without_marker_and_plain_files_are_skipped() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("6.5.0/gcc_64/bin/qmake"));
        touch(&root.path().join("6.5.0/sdktool.ini"));
        touch(&root.path().join("6.5.0.txt"));
        touch(&root.path().join("6.6.1/wasm_singlethread/bin/qt.conf"));

        let found = find_installations(root.path(), "qt.conf");
        assert_eq!(
            paths(&found),
            vec![root.path().join("6.6.1/wasm_singlethread")]
        );
    }

    #[test]
    fn several_versions_and_kits_are_all_reported() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("6.5.0/gcc_64/bin/qt.conf"));
        touch(&root.path().join("6.5.0/android_arm64_v8a/bin/qt.conf"));
        touch(&root.path().join("5.15.2/gcc_64/bin/qt.conf"));

        let found = find_installations(root.path(), "qt.conf");
        assert_eq!(found.len(), 3);
        let version_of = |kit: &str| {
            found
                .iter()
                .filter(|i| i.kit() == kit)
                .map(|i| i.version().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(version_of("android_arm64_v8a"), vec!["6.5.0".to_string()]);
    }

    #[test]
    fn missing_root_is_empty_not_error() {
        let root = TempDir::new().unwrap();
        assert!(find_installations(&root.path().join("nope"), "qt.conf").is_empty());
        assert!(find_installations(Path::new(""), "qt.conf").is_empty());
    }

    #[test]
    fn custom_marker_file_is_honoured() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("6.5.0/gcc_64/bin/qt.conf"));
        touch(&root.path().join("6.5.0/msvc/bin/target_qt.conf"));

        let found = find_installations(root.path(), "target_qt.conf");
        assert_eq!(paths(&found), vec![root.path().join("6.5.0/msvc")]);
    }

    #[test]
    fn ui_files_are_collected_recursively() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("mainwindow.ui"));
        touch(&dir.path().join("forms/dialog.ui"));
        touch(&dir.path().join("forms/dialog.cpp"));
        touch(&dir.path().join("forms/ui"));

        let mut found = find_files_with_extension(dir.path(), "ui");
        found.sort();
        assert_eq!(
            found,
            vec![
                dir.path().join("forms/dialog.ui"),
                dir.path().join("mainwindow.ui")
            ]
        );
    }

    #[test]
    fn ui_search_includes_gitignored_forms() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".gitignore"), "build/\n").unwrap();
        fs::write(dir.path().join(".ignore"), "*.ui\n").unwrap();
        touch(&dir.path().join("build/generated.ui"));
        touch(&dir.path().join("main.ui"));

        let mut found = find_files_with_extension(dir.path(), "ui");
        found.sort();

        assert_eq!(
            found,
            vec![dir.path().join("build/generated.ui"), dir.path().join("main.ui")]
        );
    }

    #[test]
    fn ui_search_on_a_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ui");
        touch(&file);
        assert!(find_files_with_extension(&file, "ui").is_empty());
    }
}
