//! ---
//! sh_section: "04-configuration"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Environment file loading, upserts, and atomic persistence."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
//! Line-oriented `KEY=VALUE` environment files.
//!
//! The file is held in memory as its original lines plus an ordered index of
//! the keys it defines. Comments, blank lines, and anything that does not
//! parse as a setting are kept verbatim, so an upsert only ever touches the
//! line of the key being written (or appends one line). A key defined more
//! than once resolves to its last definition, matching compose's loader.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use stackhost_common::{InstallerError, Result};
use tempfile::NamedTempFile;
use tracing::debug;

/// What an upsert did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

/// How the environment file came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Existing,
    SeededFromTemplate,
}

/// In-memory environment file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    lines: Vec<String>,
    index: IndexMap<String, usize>,
    trailing_newline: bool,
}

impl EnvFile {
    /// Parse file contents. The last definition of a key wins.
    pub fn parse(content: &str) -> Self {
        let lines: Vec<String> = content.split_terminator('\n').map(str::to_owned).collect();
        let mut index = IndexMap::new();
        for (position, line) in lines.iter().enumerate() {
            if let Some((key, _)) = split_setting(line) {
                index.insert(key.to_owned(), position);
            }
        }
        Self {
            lines,
            index,
            trailing_newline: content.ends_with('\n'),
        }
    }

    /// Read and parse the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| {
            InstallerError::io(format!("unable to read {}", path.display()), err)
        })?;
        Ok(Self::parse(&content))
    }

    /// Current value of `key`, if defined.
    pub fn get(&self, key: &str) -> Option<&str> {
        let position = *self.index.get(key)?;
        split_setting(&self.lines[position]).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Replace the value of `key` in place, or append `KEY=VALUE` when absent.
    /// An in-place rewrite keeps the line's CRLF ending.
    pub fn upsert(&mut self, key: &str, value: &str) -> Result<Upsert> {
        validate_key(key)?;
        if value.contains('\n') || value.contains('\r') {
            return Err(InstallerError::Config(format!(
                "value for {key} must be a single line"
            )));
        }
        match self.index.get(key) {
            Some(&position) => {
                let current = &self.lines[position];
                let ending = if current.ends_with('\r') { "\r" } else { "" };
                let line = format!("{key}={value}{ending}");
                if *current == line {
                    return Ok(Upsert::Unchanged);
                }
                self.lines[position] = line;
                Ok(Upsert::Updated)
            }
            None => {
                self.index.insert(key.to_owned(), self.lines.len());
                self.lines.push(format!("{key}={value}"));
                self.trailing_newline = true;
                Ok(Upsert::Inserted)
            }
        }
    }

    /// Serialise back to text.
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Write to `path` through a temporary file in the same directory and
    /// rename it into place. Existing permissions are carried over.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let context = || format!("unable to write {}", path.display());
        let mut staged =
            NamedTempFile::new_in(&parent).map_err(|err| InstallerError::io(context(), err))?;
        staged
            .write_all(self.render().as_bytes())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|err| InstallerError::io(context(), err))?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(staged.path(), meta.permissions())
                .map_err(|err| InstallerError::io(context(), err))?;
        }
        staged
            .persist(path)
            .map_err(|err| InstallerError::io(context(), err.error))?;
        debug!(path = %path.display(), keys = self.index.len(), "environment file persisted");
        Ok(())
    }
}

/// Make sure `env_path` exists, copying `template` into place when it does not.
pub fn ensure_env_file(env_path: &Path, template: &Path) -> Result<Provenance> {
    if env_path.exists() {
        return Ok(Provenance::Existing);
    }
    if !template.exists() {
        return Err(InstallerError::TemplateMissing(template.to_path_buf()));
    }
    fs::copy(template, env_path).map_err(|err| {
        InstallerError::io(
            format!(
                "unable to seed {} from {}",
                env_path.display(),
                template.display()
            ),
            err,
        )
    })?;
    debug!(env = %env_path.display(), template = %template.display(), "environment file seeded");
    Ok(Provenance::SeededFromTemplate)
}

fn split_setting(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    if validate_key(key).is_err() {
        return None;
    }
    Some((key, value.strip_suffix('\r').unwrap_or(value)))
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with(|ch: char| ch.is_ascii_digit())
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(InstallerError::Config(format!(
            "'{key}' is not a valid setting name"
        )))
    }
}
