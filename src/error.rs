use std::path::PathBuf;

use thiserror::Error;

use crate::flow::Notice;

#[derive(Error, Debug)]
pub enum QtError {
    #[error("no Qt root folder is registered")]
    NotConfigured,

    #[error("no build kit selected")]
    NoKitSelected,

    #[error("no default Qt installation selected")]
    NoInstallationSelected,

    #[error("{0} is not installed on your system")]
    ToolNotInstalled(String),

    #[error("cannot start {}: {source}", exe.display())]
    LaunchFailed {
        exe: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("this command can only be used with .{expected} files: {}", path.display())]
    WrongFileType { path: PathBuf, expected: String },

    #[error("host tools query failed: {0}")]
    HostQuery(String),

    #[error("host tools query timed out after {0} ms")]
    HostQueryTimeout(u64),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("cannot read settings {}: {source}", path.display())]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot write settings: {0}")]
    SettingsWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QtError {
    /// User-facing signal for conditions the user is expected to act on.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            QtError::NotConfigured => Some(Notice::NoRootSelected),
            QtError::NoKitSelected => Some(Notice::NoKitSelected),
            QtError::ToolNotInstalled(tool) => Some(Notice::ToolNotInstalled(tool.clone())),
            QtError::LaunchFailed { exe, .. } => Some(Notice::LaunchFailed(exe.clone())),
            QtError::WrongFileType { expected, .. } => Some(Notice::WrongFileType {
                expected: expected.clone(),
            }),
            _ => None,
        }
    }
}
