//! ---
//! sh_section: "01-core-functionality"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Pluggable operator input."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use tracing::warn;

use crate::error::{InstallerError, Result};

/// A question put to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text { message: String },
    /// Input is masked while typed.
    Secret { message: String },
    /// Answered with `"y"` or `"n"`.
    Confirm { message: String, default: bool },
}

impl Prompt {
    pub fn text(message: impl Into<String>) -> Self {
        Self::Text {
            message: message.into(),
        }
    }

    pub fn secret(message: impl Into<String>) -> Self {
        Self::Secret {
            message: message.into(),
        }
    }

    pub fn confirm(message: impl Into<String>, default: bool) -> Self {
        Self::Confirm {
            message: message.into(),
            default,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Text { message } | Self::Secret { message } | Self::Confirm { message, .. } => {
                message
            }
        }
    }
}

/// Source of operator answers.
pub trait Prompter {
    fn ask(&mut self, prompt: &Prompt) -> Result<String>;
}

impl<P: Prompter + ?Sized> Prompter for &mut P {
    fn ask(&mut self, prompt: &Prompt) -> Result<String> {
        (**self).ask(prompt)
    }
}

/// Ask a yes/no question, re-asking on unrecognised answers.
pub fn confirm(prompter: &mut dyn Prompter, message: &str, default: bool) -> Result<bool> {
    let prompt = Prompt::confirm(message, default);
    loop {
        let answer = prompter.ask(&prompt)?;
        match answer.trim().to_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" | "true" => return Ok(true),
            "n" | "no" | "false" => return Ok(false),
            other => warn!(answer = %other, "please answer 'y' or 'n'"),
        }
    }
}

/// Ask until `validate` accepts the trimmed answer. There is no retry limit.
pub fn ask_until<F>(prompter: &mut dyn Prompter, prompt: &Prompt, mut validate: F) -> Result<String>
where
    F: FnMut(&str) -> std::result::Result<(), String>,
{
    loop {
        let answer = prompter.ask(prompt)?;
        let answer = answer.trim();
        match validate(answer) {
            Ok(()) => return Ok(answer.to_owned()),
            Err(reason) => warn!("{reason}"),
        }
    }
}

/// Ask until a non-empty answer is given.
pub fn ask_non_empty(prompter: &mut dyn Prompter, prompt: &Prompt) -> Result<String> {
    ask_until(prompter, prompt, |answer| {
        if answer.is_empty() {
            Err("input cannot be empty".to_owned())
        } else {
            Ok(())
        }
    })
}

/// Prompter for unattended runs: fails on any question.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn ask(&mut self, prompt: &Prompt) -> Result<String> {
        Err(InstallerError::Prompt(format!(
            "input required but running non-interactively: {}",
            prompt.message()
        )))
    }
}
