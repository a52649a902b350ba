//! Registering Qt roots, scanning them and choosing the default installation.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::thread;

use crate::error::QtError;
use crate::model::config::expand_tilde;
use crate::model::installation::Installation;
use crate::model::settings::{Settings, SettingsStore};
use crate::model::state::FlowState;
use crate::qt::scanner::find_installations;

/// Non-blocking, user-facing signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoInstallationsFound,
    NoRootSelected,
    InstallationsFound(usize),
    DefaultSelected(PathBuf),
    ToolNotInstalled(String),
    LaunchFailed(PathBuf),
    WrongFileType { expected: String },
    PathDoesNotExist(PathBuf),
    NoKitSelected,
}

impl Notice {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Notice::NoRootSelected
                | Notice::ToolNotInstalled(_)
                | Notice::LaunchFailed(_)
                | Notice::WrongFileType { .. }
                | Notice::NoKitSelected
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoInstallationsFound => {
                write!(f, "Found no Qt environments in the specified installation.")
            }
            Notice::NoRootSelected => write!(f, "No Qt root folder selected"),
            Notice::InstallationsFound(count) => write!(f, "Found {count} Qt installation(s)."),
            Notice::DefaultSelected(path) => {
                write!(f, "Default Qt installation: {}", path.display())
            }
            Notice::ToolNotInstalled(tool) => write!(f, "{tool} is not installed on your system"),
            Notice::LaunchFailed(exe) => write!(f, "Could not start {}", exe.display()),
            Notice::WrongFileType { expected } => {
                write!(f, "This command can only be used with .{expected} files")
            }
            Notice::PathDoesNotExist(path) => write!(f, "Path does not exist: {}", path.display()),
            Notice::NoKitSelected => write!(f, "No build kit selected"),
        }
    }
}

/// The user-interaction side of the flow.
pub trait Prompt {
    fn pick_root(&mut self) -> Option<PathBuf>;
    fn pick_installation(&mut self, choices: &[Installation]) -> Option<Installation>;
    fn notify(&mut self, notice: Notice);
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub marker_file: String,
    pub dedupe: bool,
}

pub struct RegistrationFlow<S: SettingsStore, P: Prompt> {
    store: S,
    prompt: P,
    options: ScanOptions,
    state: FlowState,
}

impl<S: SettingsStore, P: Prompt> RegistrationFlow<S, P> {
    pub fn new(store: S, prompt: P, options: ScanOptions) -> Result<Self, QtError> {
        let state = if store.load()?.qt_folders.is_empty() {
            FlowState::Unconfigured
        } else {
            FlowState::Configured
        };

        Ok(Self {
            store,
            prompt,
            options,
            state,
        })
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn settings(&self) -> Result<Settings, QtError> {
        self.store.load()
    }

    pub fn prompt_mut(&mut self) -> &mut P {
        &mut self.prompt
    }

    pub fn notify(&mut self, notice: Notice) {
        self.prompt.notify(notice);
    }

    pub fn installations(&self) -> Result<Vec<Installation>, QtError> {
        Ok(self
            .store
            .load()?
            .qt_installations
            .into_iter()
            .map(Installation::new)
            .collect())
    }

    /// Adds `root` (or one picked by the user) and re-scans every root.
    ///
    /// Returns the number of installations found.
    pub fn register(&mut self, root: Option<PathBuf>) -> Result<usize, QtError> {
        self.register_root(root, true)
    }

    /// Re-scans the registered roots.
    pub fn rescan(&mut self) -> Result<usize, QtError> {
        let roots = self.store.load()?.qt_folders;
        if roots.is_empty() {
            self.state = FlowState::Unconfigured;
            return Err(QtError::NotConfigured);
        }
        self.scan_roots(roots, true)
    }

    /// Chooses the default installation: automatic for a single one,
    /// otherwise the user picks.
    pub fn select_default(&mut self) -> Result<Option<Installation>, QtError> {
        let mut installations = self.installations()?;

        if installations.is_empty() {
            self.register_root(None, false)?;
            installations = self.installations()?;
        }

        let selected = match installations.len() {
            0 => return Ok(None),
            1 => installations.pop(),
            _ => self.prompt.pick_installation(&installations),
        };

        if let Some(installation) = &selected {
            let mut settings = self.store.load()?;
            settings.selected_qt_path = Some(installation.path().to_path_buf());
            self.store.save(&settings)?;
            tracing::info!("default Qt installation set to {installation}");
            self.prompt
                .notify(Notice::DefaultSelected(installation.path().to_path_buf()));
        }

        Ok(selected)
    }

    /// The selected installation, re-validated; re-runs selection when it is
    /// unset or no longer on disk.
    pub fn selected_installation(&mut self) -> Result<Installation, QtError> {
        let mut settings = self.store.load()?;

        if let Some(path) = settings.selected_qt_path.clone() {
            let installation = Installation::new(path.clone());
            if installation.is_valid(&self.options.marker_file) {
                return Ok(installation);
            }

            tracing::warn!("selected Qt installation is gone: {}", path.display());
            self.prompt.notify(Notice::PathDoesNotExist(path));
            settings.selected_qt_path = None;
            self.store.save(&settings)?;
        }

        self.select_default()?
            .ok_or(QtError::NoInstallationSelected)
    }

    fn register_root(&mut self, root: Option<PathBuf>, select_after: bool) -> Result<usize, QtError> {
        let root = root
            .or_else(|| self.prompt.pick_root())
            .ok_or(QtError::NotConfigured)?;
        let root = expand_tilde(&root);

        let mut roots = self.store.load()?.qt_folders;
        if !roots.contains(&root) {
            roots.push(root);
        }

        self.scan_roots(roots, select_after)
    }

    fn scan_roots(&mut self, roots: Vec<PathBuf>, select_after: bool) -> Result<usize, QtError> {
        self.state = FlowState::Scanning;

        for root in roots.iter().filter(|root| !root.exists()) {
            self.prompt.notify(Notice::PathDoesNotExist(root.clone()));
        }

        let mut found = scan_all(&roots, &self.options.marker_file);
        if self.options.dedupe {
            found = dedupe(found);
        }

        self.state = FlowState::Configured;

        if found.is_empty() {
            tracing::info!("found no Qt installations under {} root(s)", roots.len());
            self.prompt.notify(Notice::NoInstallationsFound);
            return Ok(0);
        }

        let count = found.len();
        self.prompt.notify(Notice::InstallationsFound(count));

        let mut settings = self.store.load()?;
        let installations: Vec<PathBuf> = found
            .iter()
            .map(|installation| installation.path().to_path_buf())
            .collect();
        let changed = settings.qt_installations != installations;
        settings.qt_folders = roots;
        settings.qt_installations = installations;
        self.store.save(&settings)?;

        if changed && select_after && settings.ask_for_default_path {
            self.select_default()?;
        }

        Ok(count)
    }
}

/// Scans each root on its own thread; results keep root order.
fn scan_all(roots: &[PathBuf], marker_file: &str) -> Vec<Installation> {
    thread::scope(|scope| {
        let handles: Vec<_> = roots
            .iter()
            .map(|root| scope.spawn(move || find_installations(root, marker_file)))
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    tracing::warn!("scanner thread panicked");
                    Vec::new()
                })
            })
            .collect()
    })
}

/// Drops installations whose canonical path was already seen.
fn dedupe(installations: Vec<Installation>) -> Vec<Installation> {
    let mut seen = HashSet::new();
    installations
        .into_iter()
        .filter(|installation| {
            let key = fs::canonicalize(installation.path())
                .unwrap_or_else(|_| installation.path().to_path_buf());
            seen.insert(key)
        })
        .collect()
}
