use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::QtError;
use crate::flow::{Notice, Prompt, RegistrationFlow, ScanOptions};
use crate::model::config::{AppConfig, expand_tilde};
use crate::model::installation::Installation;
use crate::model::settings::SettingsStore;
use crate::model::state::FlowState;
use crate::msg::{Command, Msg};
use crate::platform::Platform;
use crate::qt::designer::{DesignerLauncher, DesignerLocator, LaunchOutcome, Spawner};
use crate::qt::host_bins::query_host_bins;
use crate::qt::kits::{find_by_kit_name, kits_json};
use crate::qt::scanner::find_files_with_extension;
use crate::qt::toolchain::{ToolLocator, locate_toolchain_file};

const HELP: &[&str] = &[
    "commands:",
    "  open <file.ui>     open a form in Qt Designer (alias: o)",
    "  close <file.ui>    forget the designer instance of a form (alias: c)",
    "  register [dir]     add a Qt root folder and scan it",
    "  rescan             scan the registered roots again (alias: scan)",
    "  select             choose the default Qt installation",
    "  list               show discovered installations (alias: ls)",
    "  env                print the PATH addition of the default installation",
    "  quit               leave the session (alias: q)",
];

/// One session: the registration flow plus the designer instances it launched.
pub struct App<S: SettingsStore, P: Prompt, Sp: Spawner> {
    pub config: AppConfig,
    flow: RegistrationFlow<S, P>,
    launcher: DesignerLauncher<Sp>,
    designer: DesignerLocator,
    tools: ToolLocator,
    out: Box<dyn Write>,
    pub should_quit: bool,
}

impl<S: SettingsStore, P: Prompt, Sp: Spawner> App<S, P, Sp> {
    pub fn new(
        config: AppConfig,
        store: S,
        prompt: P,
        spawner: Sp,
        platform: Platform,
    ) -> Result<Self, QtError> {
        let options = ScanOptions {
            marker_file: config.scan.marker_file.clone(),
            dedupe: config.scan.dedupe,
        };
        let flow = RegistrationFlow::new(store, prompt, options)?;
        let launcher = DesignerLauncher::new(spawner, config.designer.extension.clone());
        let designer = DesignerLocator::new(
            platform,
            config.designer.system_path.clone(),
            query_timeout(&config),
        );

        Ok(Self {
            flow,
            launcher,
            designer,
            tools: ToolLocator::new(platform),
            out: Box::new(std::io::stdout()),
            should_quit: false,
            config,
        })
    }

    #[cfg(test)]
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn state(&self) -> FlowState {
        self.flow.state()
    }

    /// Registered roots, for the watcher.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.flow
            .settings()
            .map(|settings| settings.qt_folders)
            .unwrap_or_default()
    }

    // ── Update ───────────────────────────────────────────────────

    pub async fn update(&mut self, msg: Msg) -> anyhow::Result<()> {
        match msg {
            Msg::Input(line) => self.handle_command(Command::parse(&line)).await?,
            Msg::RootChanged(path) => {
                tracing::debug!("root changed: {}", path.display());
                let result = self.rescan().map(|_| ());
                self.settle(result)?;
            }
            Msg::InputClosed | Msg::Quit => {
                tracing::info!(
                    "leaving session, {} designer instance(s) stay open",
                    self.launcher.open_count() + self.launcher.released_count()
                );
                self.should_quit = true;
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) -> anyhow::Result<()> {
        let result = match command {
            Command::Open(path) => self.open_document(&path).await.map(|_| ()),
            Command::Close(path) => {
                self.close_document(&path);
                Ok(())
            }
            Command::Register(root) => self.register(root).map(|_| ()),
            Command::Rescan => self.rescan().map(|_| ()),
            Command::Select => self.select().map(|_| ()),
            Command::List => self.list(),
            Command::Env => self.env(None, false),
            Command::Help => {
                for line in HELP {
                    writeln!(self.out, "{line}")?;
                }
                Ok(())
            }
            Command::Quit => {
                self.should_quit = true;
                Ok(())
            }
            Command::Empty => Ok(()),
            Command::Unknown(input) => {
                writeln!(self.out, "unknown command: {input} (try help)")?;
                Ok(())
            }
        };

        self.settle(result)
    }

    /// Turns user-facing failures into notices; anything else is fatal.
    fn settle(&mut self, result: Result<(), QtError>) -> anyhow::Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                if self.report(&err) {
                    Ok(())
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Surfaces `err` to the user. Returns false for errors with no notice.
    pub fn report(&mut self, err: &QtError) -> bool {
        match err.notice() {
            Some(notice) => {
                self.flow.notify(notice);
                true
            }
            None => match err {
                QtError::HostQuery(_)
                | QtError::HostQueryTimeout(_)
                | QtError::NoInstallationSelected => {
                    tracing::warn!("{err}");
                    let _ = writeln!(self.out, "warning: {err}");
                    true
                }
                _ => false,
            },
        }
    }

    // ── Operations ───────────────────────────────────────────────

    pub fn register(&mut self, root: Option<PathBuf>) -> Result<usize, QtError> {
        self.flow.register(root)
    }

    pub fn rescan(&mut self) -> Result<usize, QtError> {
        self.flow.rescan()
    }

    pub fn select(&mut self) -> Result<Option<Installation>, QtError> {
        self.flow.select_default()
    }

    pub fn list(&mut self) -> Result<(), QtError> {
        let settings = self.flow.settings()?;
        if settings.qt_installations.is_empty() {
            self.flow.notify(Notice::NoInstallationsFound);
            return Ok(());
        }

        for path in &settings.qt_installations {
            let mark = if settings.selected_qt_path.as_ref() == Some(path) {
                '*'
            } else {
                ' '
            };
            let installation = Installation::new(path.clone());
            writeln!(
                self.out,
                "{mark} {:<28} {}",
                installation.kit_name(),
                installation
            )?;
        }
        Ok(())
    }

    /// The installation behind `kit`, or the selected one.
    fn kit_installation(&mut self, kit: Option<&str>) -> Result<Installation, QtError> {
        match kit {
            Some(name) => {
                let installations = self.flow.installations()?;
                find_by_kit_name(&installations, name)
                    .cloned()
                    .ok_or(QtError::NoKitSelected)
            }
            None => {
                if self.flow.settings()?.selected_qt_path.is_none() {
                    return Err(QtError::NoKitSelected);
                }
                self.flow.selected_installation()
            }
        }
    }

    pub fn env(&mut self, kit: Option<&str>, expand: bool) -> Result<(), QtError> {
        let installation = self.kit_installation(kit)?;
        let environment = self.tools.compose(&installation);
        let line = if expand {
            environment.expanded(&std::env::var("PATH").unwrap_or_default())
        } else {
            environment.path_string()
        };
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    pub fn kits(&mut self, output: Option<&Path>) -> Result<(), QtError> {
        let installations = self.flow.installations()?;
        if installations.is_empty() && !self.roots().is_empty() {
            self.flow.notify(Notice::NoInstallationsFound);
            return Ok(());
        }

        let json = kits_json(&installations, &self.tools)?;
        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, json)?;
                tracing::info!("wrote kits to {}", path.display());
            }
            None => writeln!(self.out, "{json}")?,
        }
        Ok(())
    }

    pub fn toolchain(&mut self) -> Result<(), QtError> {
        let installation = self.flow.selected_installation()?;
        let file = locate_toolchain_file(&installation)
            .ok_or_else(|| QtError::ToolNotInstalled("qt.toolchain.cmake".to_string()))?;
        writeln!(self.out, "{}", file.display())?;
        Ok(())
    }

    pub async fn host_bins(&mut self) -> Result<(), QtError> {
        let installation = self.flow.selected_installation()?;
        let qmake = self
            .tools
            .locate_qmake(&installation)
            .ok_or_else(|| QtError::ToolNotInstalled("qmake".to_string()))?;
        let host_bins = query_host_bins(&qmake, query_timeout(&self.config)).await?;
        writeln!(self.out, "{host_bins}")?;
        Ok(())
    }

    pub fn ui_files(&mut self, dir: &Path) -> Result<(), QtError> {
        let dir = expand_tilde(dir);
        for file in find_files_with_extension(&dir, &self.config.designer.extension) {
            writeln!(self.out, "{}", file.display())?;
        }
        Ok(())
    }

    /// Opens `document` in the designer unless an instance already has it.
    pub async fn open_document(&mut self, document: &Path) -> Result<LaunchOutcome, QtError> {
        let document = absolute(&expand_tilde(document));
        let flow = &mut self.flow;
        let designer = &self.designer;

        let resolve = async {
            let installation = match flow.selected_installation() {
                Ok(installation) => Some(installation),
                Err(err) => {
                    tracing::warn!("no Qt installation for designer lookup: {err}");
                    None
                }
            };
            designer.locate(installation.as_ref()).await
        };

        let outcome = self.launcher.open(&document, resolve).await?;
        if let LaunchOutcome::Launched(exe) = &outcome {
            writeln!(self.out, "opened {} with {}", document.display(), exe.display())?;
        }
        Ok(outcome)
    }

    pub fn close_document(&mut self, document: &Path) {
        let document = absolute(&expand_tilde(document));
        if self.launcher.close(&document) {
            tracing::debug!("forgot designer instance for {}", document.display());
        }
    }
}

fn query_timeout(config: &AppConfig) -> Option<Duration> {
    config.query.timeout_ms.map(Duration::from_millis)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::testing::ScriptedPrompt;
    use crate::model::settings::MemorySettingsStore;
    use crate::qt::designer::testing::FakeSpawner;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    struct Fixture {
        root: TempDir,
        app: App<MemorySettingsStore, ScriptedPrompt, FakeSpawner>,
        spawner: FakeSpawner,
        out: Captured,
    }

    fn fixture(kits: &[&str]) -> Fixture {
        let root = TempDir::new().unwrap();
        for kit in kits {
            let installation = root.path().join(kit);
            touch(&installation.join("bin/qt.conf"));
            touch(&installation.join("bin/designer"));
        }

        let config = AppConfig::from_layers("").unwrap();
        let spawner = FakeSpawner::default();
        let out = Captured::default();
        let app = App::new(
            config,
            MemorySettingsStore::default(),
            ScriptedPrompt::default(),
            spawner.clone(),
            Platform::Unix,
        )
        .unwrap()
        .with_output(Box::new(out.clone()));

        Fixture {
            root,
            app,
            spawner,
            out,
        }
    }

    fn input(line: &str) -> Msg {
        Msg::Input(line.to_string())
    }

    #[tokio::test]
    async fn opening_a_form_twice_spawns_once() {
        let mut fx = fixture(&["6.5.0/gcc_64"]);
        let root = fx.root.path().display().to_string();
        fx.app.update(input(&format!("register {root}"))).await.unwrap();

        let form = fx.root.path().join("forms/main.ui");
        let open = format!("open {}", form.display());
        fx.app.update(input(&open)).await.unwrap();
        fx.app.update(input(&open)).await.unwrap();

        let spawned = fx.spawner.spawned.borrow();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].0, fx.root.path().join("6.5.0/gcc_64/bin/designer"));
        assert_eq!(spawned[0].1, form);
    }

    #[tokio::test]
    async fn designer_that_cannot_start_keeps_the_session_alive() {
        let mut fx = fixture(&["6.5.0/gcc_64"]);
        let root = fx.root.path().to_path_buf();
        fx.app.register(Some(root.clone())).unwrap();
        fx.spawner.refuse.set(true);

        let form = root.join("forms/main.ui");
        fx.app
            .update(input(&format!("open {}", form.display())))
            .await
            .unwrap();

        assert!(!fx.app.should_quit);
        assert_eq!(
            fx.app.flow.prompt_mut().notices.last(),
            Some(&Notice::LaunchFailed(root.join("6.5.0/gcc_64/bin/designer")))
        );

        fx.spawner.refuse.set(false);
        let outcome = fx.app.open_document(&form).await.unwrap();
        assert!(matches!(outcome, LaunchOutcome::Launched(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_executable_designer_is_a_notice() {
        use crate::qt::designer::DetachedSpawner;

        let root = TempDir::new().unwrap();
        let installation = root.path().join("6.5.0/gcc_64");
        touch(&installation.join("bin/qt.conf"));
        touch(&installation.join("bin/designer"));

        let mut app = App::new(
            AppConfig::from_layers("").unwrap(),
            MemorySettingsStore::default(),
            ScriptedPrompt::default(),
            DetachedSpawner,
            Platform::Unix,
        )
        .unwrap()
        .with_output(Box::new(Captured::default()));
        app.register(Some(root.path().to_path_buf())).unwrap();

        let open = format!("open {}", root.path().join("a.ui").display());
        app.update(input(&open)).await.unwrap();

        assert_eq!(
            app.flow.prompt_mut().notices.last(),
            Some(&Notice::LaunchFailed(installation.join("bin/designer")))
        );
    }

    #[tokio::test]
    async fn wrong_file_type_is_a_notice_not_a_failure() {
        let mut fx = fixture(&["6.5.0/gcc_64"]);

        fx.app.update(input("open main.cpp")).await.unwrap();

        assert!(fx.spawner.spawned.borrow().is_empty());
        assert_eq!(
            fx.app.flow.prompt_mut().notices,
            vec![Notice::WrongFileType {
                expected: "ui".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn closing_allows_a_new_instance() {
        let mut fx = fixture(&["6.5.0/gcc_64"]);
        let root = fx.root.path().to_path_buf();
        fx.app.register(Some(root.clone())).unwrap();

        let form = root.join("dialog.ui");
        fx.app.open_document(&form).await.unwrap();
        fx.app.close_document(&form);
        let outcome = fx.app.open_document(&form).await.unwrap();

        assert!(matches!(outcome, LaunchOutcome::Launched(_)));
        assert_eq!(fx.spawner.spawned.borrow().len(), 2);
    }

    #[tokio::test]
    async fn root_change_rescans() {
        let mut fx = fixture(&["6.5.0/gcc_64"]);
        let root = fx.root.path().to_path_buf();
        fx.app.register(Some(root.clone())).unwrap();
        touch(&root.join("6.6.1/gcc_64/bin/qt.conf"));

        fx.app.update(Msg::RootChanged(root.join("6.6.1"))).await.unwrap();

        let installations = fx.app.flow.installations().unwrap();
        assert_eq!(installations.len(), 2);
        assert_eq!(fx.app.state(), FlowState::Configured);
    }

    #[tokio::test]
    async fn list_marks_the_default() {
        let mut fx = fixture(&["6.5.0/gcc_64"]);
        fx.app.register(Some(fx.root.path().to_path_buf())).unwrap();

        fx.app.update(input("list")).await.unwrap();

        let text = fx.out.text();
        assert!(text.starts_with("* "), "{text}");
        assert!(text.contains("6.5.0-gcc_64"));
    }

    #[tokio::test]
    async fn env_without_selection_reports_no_kit() {
        let mut fx = fixture(&[]);

        fx.app.update(input("env")).await.unwrap();

        assert_eq!(fx.app.flow.prompt_mut().notices, vec![Notice::NoKitSelected]);
    }

    #[tokio::test]
    async fn env_by_kit_name() {
        let mut fx = fixture(&["6.5.0/gcc_64"]);
        let root = fx.root.path().to_path_buf();
        fx.app.register(Some(root.clone())).unwrap();
        let kit = Installation::new(root.join("6.5.0/gcc_64")).kit_name();

        fx.app.env(Some(&kit), false).unwrap();

        let text = fx.out.text();
        assert!(text.contains("${env:PATH}"));
        assert!(text.contains(&root.join("6.5.0/gcc_64/bin").display().to_string()));
        assert!(matches!(
            fx.app.env(Some("Qt-0.0.0-none"), false),
            Err(QtError::NoKitSelected)
        ));
    }

    #[tokio::test]
    async fn kits_are_written_to_file() {
        let mut fx = fixture(&["6.5.0/gcc_64", "6.6.1/gcc_64"]);
        fx.app.update(input("register")).await.unwrap();
        // no root given and none scripted: nothing registered
        assert_eq!(fx.app.state(), FlowState::Unconfigured);
        assert_eq!(fx.app.flow.prompt_mut().notices, vec![Notice::NoRootSelected]);

        let root = fx.root.path().to_path_buf();
        fx.app.register(Some(root.clone())).unwrap();
        let output = root.join("out/cmake-kits.json");
        fx.app.kits(Some(&output)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ui_files_are_listed() {
        let mut fx = fixture(&[]);
        let forms = fx.root.path().join("project");
        touch(&forms.join("a.ui"));
        touch(&forms.join("b.cpp"));

        fx.app.ui_files(&forms).unwrap();

        assert_eq!(fx.out.text().trim(), forms.join("a.ui").display().to_string());
    }

    #[tokio::test]
    async fn quit_and_end_of_input_stop_the_session() {
        let mut fx = fixture(&[]);
        fx.app.update(input("help")).await.unwrap();
        assert!(!fx.app.should_quit);
        assert!(fx.out.text().contains("commands:"));

        fx.app.update(Msg::InputClosed).await.unwrap();
        assert!(fx.app.should_quit);
    }
}
