use crate::error::QtError;

/// Host platform families with distinct Qt on-disk layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    /// Linux and the other Unix-likes share one layout.
    Unix,
}

impl Platform {
    pub fn current() -> Result<Self, QtError> {
        if cfg!(windows) {
            Ok(Platform::Windows)
        } else if cfg!(target_os = "macos") {
            Ok(Platform::MacOs)
        } else if cfg!(unix) {
            Ok(Platform::Unix)
        } else {
            Err(QtError::UnsupportedPlatform(
                std::env::consts::OS.to_string(),
            ))
        }
    }

    pub fn exe_suffix(self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            _ => "",
        }
    }

    pub fn exe_name(self, stem: &str) -> String {
        format!("{stem}{}", self.exe_suffix())
    }

    /// Separator for PATH-like lists.
    pub fn path_delimiter(self) -> char {
        match self {
            Platform::Windows => ';',
            _ => ':',
        }
    }

    pub fn designer_exe_name(self) -> String {
        match self {
            Platform::MacOs => "Designer".to_string(),
            _ => self.exe_name("designer"),
        }
    }

    pub fn qmake_exe_name(self) -> String {
        self.exe_name("qmake")
    }

    pub fn ninja_exe_name(self) -> String {
        self.exe_name("ninja")
    }

    pub fn jom_exe_name(self) -> String {
        self.exe_name("jom")
    }
}
