use std::fmt;
use std::path::{Path, PathBuf};

/// One verified Qt deployment: `<root>/<version>/<kit>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Installation {
    path: PathBuf,
}

impl Installation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.path.join("bin")
    }

    /// Compiler/ABI directory name, e.g. `gcc_64`.
    pub fn kit(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Name of the version directory above the kit, e.g. `6.5.0`.
    pub fn version(&self) -> &str {
        self.path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// The registered root two levels above the kit directory.
    pub fn qt_root(&self) -> PathBuf {
        self.path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.path.clone())
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.qt_root().join("Tools")
    }

    /// Stable kit identifier derived from the path, starting at the `Qt`
    /// component when there is one: `/opt/Qt/6.5.0/gcc_64` → `Qt-6.5.0-gcc_64`.
    pub fn kit_name(&self) -> String {
        let text = self.path.to_string_lossy();
        let parts: Vec<&str> = text
            .split(['/', '\\', ':'])
            .filter(|part| !part.is_empty())
            .collect();
        let start = parts
            .iter()
            .position(|part| part.eq_ignore_ascii_case("qt"))
            .unwrap_or(0);
        parts[start..].join("-")
    }

    /// The marker file still exists under `bin/`.
    pub fn is_valid(&self, marker_file: &str) -> bool {
        self.bin_dir().join(marker_file).is_file()
    }
}

impl fmt::Display for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for Installation {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}
