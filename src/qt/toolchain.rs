//! Auxiliary build tools that ship next to a Qt installation, and the PATH
//! string that makes them usable together.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::model::installation::Installation;
use crate::platform::Platform;
use crate::qt::probe::{dir_if_exists, existing, first_existing, on_search_path};

/// Placeholder the consumer substitutes with the inherited search path.
pub const INHERITED_PATH: &str = "${env:PATH}";

pub const TOOLCHAIN_FILE_NAME: &str = "qt.toolchain.cmake";

const MINGW_PREFIX: &str = "mingw";

static MINGW_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mingw(\d+)_\d+").expect("valid mingw version regex"));

/// Finds the build tools bundled with a Qt root.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    platform: Platform,
    vs_install_dir: Option<PathBuf>,
}

impl ToolLocator {
    /// Picks up `VS2022INSTALLDIR` from the environment.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            vs_install_dir: std::env::var_os("VS2022INSTALLDIR").map(PathBuf::from),
        }
    }

    pub fn with_vs_install_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.vs_install_dir = dir;
        self
    }

    /// Ninja from `Tools/Ninja`, then the copies bundled with Visual Studio.
    ///
    /// When none exists the Qt-bundled candidate is returned anyway so the
    /// caller can still put its directory on the search path.
    pub fn locate_ninja(&self, qt_root: &Path) -> PathBuf {
        let ninja = self.platform.ninja_exe_name();
        let bundled = qt_root.join("Tools").join("Ninja").join(&ninja);

        let mut candidates = vec![bundled.clone()];
        if let Some(vs) = &self.vs_install_dir {
            candidates.push(
                vs.join("Common7")
                    .join("IDE")
                    .join("CommonExtensions")
                    .join("Microsoft")
                    .join("CMake")
                    .join("Ninja")
                    .join(&ninja),
            );
            candidates.push(
                vs.join("MSBuild")
                    .join("Google")
                    .join("Android")
                    .join("bin")
                    .join(&ninja),
            );
        }

        first_existing(&candidates).unwrap_or(bundled)
    }

    /// jom, the parallel make replacement shipped with Qt Creator.
    pub fn locate_jom(&self, qt_root: &Path) -> Option<PathBuf> {
        existing(
            qt_root
                .join("Tools")
                .join("QtCreator")
                .join("bin")
                .join("jom")
                .join(self.platform.jom_exe_name()),
        )
    }

    pub fn locate_cmake_dir(&self, qt_root: &Path) -> PathBuf {
        qt_root.join("Tools").join("CMake_64").join("bin")
    }

    pub fn locate_qmake(&self, installation: &Installation) -> Option<PathBuf> {
        let bin = installation.bin_dir();
        first_existing([bin.join(self.platform.qmake_exe_name()), bin.join("qmake")])
            .or_else(|| on_search_path(&self.platform.qmake_exe_name()))
            .or_else(|| on_search_path("qmake"))
    }

    pub fn compose(&self, installation: &Installation) -> QtEnvironment {
        let qt_root = installation.qt_root();
        let mingw_bin = if installation.kit().starts_with(MINGW_PREFIX) {
            locate_mingw_bin_dir(&installation.tools_dir())
        } else {
            None
        };

        QtEnvironment {
            jom: self.locate_jom(&qt_root),
            mingw_bin,
            installation: installation.path().to_path_buf(),
            ninja: self.locate_ninja(&qt_root),
            cmake_dir: self.locate_cmake_dir(&qt_root),
            delimiter: self.platform.path_delimiter(),
        }
    }
}

/// Tool locations derived for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QtEnvironment {
    pub jom: Option<PathBuf>,
    pub mingw_bin: Option<PathBuf>,
    pub installation: PathBuf,
    pub ninja: PathBuf,
    pub cmake_dir: PathBuf,
    delimiter: char,
}

impl QtEnvironment {
    /// Search path entries in priority order.
    pub fn entries(&self) -> Vec<String> {
        let mut entries = Vec::new();

        if let Some(dir) = self.jom.as_deref().and_then(Path::parent) {
            entries.push(dir.display().to_string());
        }
        if let Some(mingw) = &self.mingw_bin {
            entries.push(mingw.display().to_string());
        }
        entries.push(self.installation.display().to_string());
        entries.push(self.installation.join("bin").display().to_string());
        entries.push(INHERITED_PATH.to_string());
        if let Some(ninja_dir) = self.ninja.parent() {
            entries.push(ninja_dir.display().to_string());
        }
        entries.push(self.cmake_dir.display().to_string());

        entries
    }

    pub fn path_string(&self) -> String {
        self.entries().join(&self.delimiter.to_string())
    }

    /// `path_string` with the placeholder replaced by `inherited`.
    pub fn expanded(&self, inherited: &str) -> String {
        self.path_string().replace(INHERITED_PATH, inherited)
    }
}

/// `mingw81_64` → 81; unparseable names rank as 0.
pub fn mingw_version(dir_name: &str) -> u32 {
    MINGW_VERSION_RE
        .captures(dir_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// The `bin` directory of the newest `Tools/mingw*` toolchain.
pub fn locate_mingw_bin_dir(tools_dir: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(tools_dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!("cannot list {}: {err}", tools_dir.display());
            return None;
        }
    };

    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            if !name.to_lowercase().starts_with(MINGW_PREFIX) {
                return None;
            }
            let bin = dir_if_exists(entry.path().join("bin"))?;
            Some((mingw_version(&name), bin))
        })
        .max_by_key(|(version, _)| *version)
        .map(|(_, bin)| bin)
}

/// `lib/cmake/{Qt6,Qt5,Qt}/qt.toolchain.cmake`, first match.
pub fn locate_toolchain_file(installation: &Installation) -> Option<PathBuf> {
    let cmake = installation.path().join("lib").join("cmake");
    first_existing(
        ["Qt6", "Qt5", "Qt"]
            .into_iter()
            .map(|major| cmake.join(major).join(TOOLCHAIN_FILE_NAME)),
    )
}
