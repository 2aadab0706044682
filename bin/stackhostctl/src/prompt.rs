//! ---
//! sh_section: "05-operator-interface"
//! sh_subsection: "binary"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Terminal prompts backed by dialoguer."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use stackhost_common::{InstallerError, Prompt, Prompter, Result};

/// Interactive prompter for an attended terminal session.
pub(crate) struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub(crate) fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, prompt: &Prompt) -> Result<String> {
        let answer = match prompt {
            // Empty answers are returned as-is; validation loops live in the caller.
            Prompt::Text { message } => Input::<String>::with_theme(&self.theme)
                .with_prompt(message)
                .allow_empty(true)
                .interact_text(),
            Prompt::Secret { message } => Password::with_theme(&self.theme)
                .with_prompt(message)
                .allow_empty_password(true)
                .interact(),
            Prompt::Confirm { message, default } => Confirm::with_theme(&self.theme)
                .with_prompt(message)
                .default(*default)
                .interact()
                .map(|yes| if yes { "y" } else { "n" }.to_owned()),
        };
        answer.map_err(|err| InstallerError::Prompt(err.to_string()))
    }
}
