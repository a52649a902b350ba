use dialoguer::{Input, Select};
use std::path::PathBuf;

use crate::flow::{Notice, Prompt};
use crate::model::installation::Installation;

/// Interactive prompt on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn pick_root(&mut self) -> Option<PathBuf> {
        let answer: String = Input::new()
            .with_prompt("Select the Qt installation path")
            .allow_empty(true)
            .interact_text()
            .ok()?;

        let answer = answer.trim();
        (!answer.is_empty()).then(|| PathBuf::from(answer))
    }

    fn pick_installation(&mut self, choices: &[Installation]) -> Option<Installation> {
        let labels: Vec<String> = choices.iter().map(ToString::to_string).collect();
        let index = Select::new()
            .with_prompt("Select a default Qt installation")
            .items(&labels)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()?;

        choices.get(index).cloned()
    }

    fn notify(&mut self, notice: Notice) {
        if notice.is_warning() {
            tracing::warn!("{notice}");
            eprintln!("warning: {notice}");
        } else {
            tracing::info!("{notice}");
            println!("{notice}");
        }
    }
}
