//! ---
//! sh_section: "05-operator-interface"
//! sh_subsection: "binary"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Operator-facing message styling."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use colored::Colorize;

pub(crate) struct Theme;

impl Theme {
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_their_text() {
        colored::control::set_override(false);
        assert_eq!(Theme::error("Error: boom"), "✗ Error: boom");
        assert_eq!(Theme::success("install finished"), "✓ install finished");
        assert_eq!(Theme::dimmed("hint: run install"), "hint: run install");
    }
}
