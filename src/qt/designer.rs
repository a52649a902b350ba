//! Qt Designer: locating the executable and keeping one instance per document.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use crate::error::QtError;
use crate::model::installation::Installation;
use crate::platform::Platform;
use crate::qt::host_bins::query_host_bins;
use crate::qt::probe::{existing, on_search_path};
use crate::qt::toolchain::ToolLocator;

pub const DESIGNER_TOOL: &str = "Qt Designer";

/// Resolves the designer executable for an installation.
#[derive(Debug, Clone)]
pub struct DesignerLocator {
    platform: Platform,
    tools: ToolLocator,
    system_path: PathBuf,
    query_timeout: Option<Duration>,
}

impl DesignerLocator {
    pub fn new(platform: Platform, system_path: PathBuf, query_timeout: Option<Duration>) -> Self {
        Self {
            platform,
            tools: ToolLocator::new(platform),
            system_path,
            query_timeout,
        }
    }

    /// Where the installation itself ships the designer binary.
    pub fn bundled_path(&self, installation: &Installation) -> PathBuf {
        let bin = installation.bin_dir();
        match self.platform {
            Platform::MacOs => bin
                .join("Designer.app")
                .join("Contents")
                .join("MacOS")
                .join(self.platform.designer_exe_name()),
            _ => bin.join(self.platform.designer_exe_name()),
        }
    }

    /// Installation `bin`, then the host tools directory reported by qmake,
    /// then the system-wide copy, then the search path.
    pub async fn locate(&self, installation: Option<&Installation>) -> Option<PathBuf> {
        if let Some(installation) = installation {
            if let Some(found) = existing(self.bundled_path(installation)) {
                return Some(found);
            }

            if let Some(found) = self.locate_in_host_bins(installation).await {
                return Some(found);
            }
        }

        if self.platform != Platform::Windows {
            if let Some(found) = existing(&self.system_path) {
                return Some(found);
            }
        }

        on_search_path(&self.platform.designer_exe_name())
    }

    async fn locate_in_host_bins(&self, installation: &Installation) -> Option<PathBuf> {
        let qmake = self.tools.locate_qmake(installation)?;
        match query_host_bins(&qmake, self.query_timeout).await {
            Ok(host_bins) if !host_bins.is_empty() => {
                existing(Path::new(&host_bins).join(self.platform.designer_exe_name()))
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("cannot query host bins of {installation}: {err}");
                None
            }
        }
    }
}

/// A launched external tool.
pub trait ToolProcess {
    /// Not exited and not killed.
    fn is_running(&mut self) -> bool;
}

impl ToolProcess for Child {
    fn is_running(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }
}

/// Starts the designer for one document.
pub trait Spawner {
    type Process: ToolProcess;

    fn spawn(&mut self, exe: &Path, document: &Path) -> io::Result<Self::Process>;
}

/// Spawns with null stdio so the tool outlives the session.
#[derive(Debug, Default)]
pub struct DetachedSpawner;

impl Spawner for DetachedSpawner {
    type Process = Child;

    fn spawn(&mut self, exe: &Path, document: &Path) -> io::Result<Child> {
        Command::new(exe)
            .arg(document)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched(PathBuf),
    AlreadyOpen,
}

/// Registry of designer processes keyed by document path.
pub struct DesignerLauncher<S: Spawner = DetachedSpawner> {
    spawner: S,
    extension: String,
    opened: HashMap<PathBuf, S::Process>,
    /// Handles of closed documents whose process has not exited yet.
    released: Vec<S::Process>,
}

impl<S: Spawner> DesignerLauncher<S> {
    pub fn new(spawner: S, extension: impl Into<String>) -> Self {
        Self {
            spawner,
            extension: extension.into(),
            opened: HashMap::new(),
            released: Vec::new(),
        }
    }

    pub fn accepts(&self, document: &Path) -> bool {
        document
            .extension()
            .is_some_and(|ext| ext == self.extension.as_str())
    }

    /// A live process is registered for `document`.
    pub fn is_open(&mut self, document: &Path) -> bool {
        self.opened
            .get_mut(document)
            .is_some_and(|process| process.is_running())
    }

    /// Opens `document` unless a live instance already has it.
    ///
    /// `resolve` is only awaited when a new process is needed.
    pub async fn open<F>(&mut self, document: &Path, resolve: F) -> Result<LaunchOutcome, QtError>
    where
        F: Future<Output = Option<PathBuf>>,
    {
        if !self.accepts(document) {
            return Err(QtError::WrongFileType {
                path: document.to_path_buf(),
                expected: self.extension.clone(),
            });
        }

        self.reap();

        if self.is_open(document) {
            tracing::debug!("designer already open for {}", document.display());
            return Ok(LaunchOutcome::AlreadyOpen);
        }

        let exe = resolve
            .await
            .ok_or_else(|| QtError::ToolNotInstalled(DESIGNER_TOOL.to_string()))?;

        let process = match self.spawner.spawn(&exe, document) {
            Ok(process) => process,
            Err(source) => {
                tracing::warn!("cannot start {}: {source}", exe.display());
                return Err(QtError::LaunchFailed { exe, source });
            }
        };
        tracing::info!("launched {} for {}", exe.display(), document.display());
        self.opened.insert(document.to_path_buf(), process);
        Ok(LaunchOutcome::Launched(exe))
    }

    /// Forgets the handle for `document`; the process keeps running.
    ///
    /// The handle is polled on later calls until the process exits, so it
    /// gets reaped.
    pub fn close(&mut self, document: &Path) -> bool {
        self.reap();
        match self.opened.remove(document) {
            Some(mut process) => {
                if process.is_running() {
                    self.released.push(process);
                }
                true
            }
            None => false,
        }
    }

    /// Drops released handles whose process has exited.
    pub fn reap(&mut self) {
        self.released.retain_mut(|process| process.is_running());
    }

    /// Closed documents whose designer is still running.
    pub fn released_count(&self) -> usize {
        self.released.len()
    }

    pub fn open_count(&self) -> usize {
        self.opened.len()
    }
}
