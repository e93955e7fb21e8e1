//! Override table.
//!
//! Overrides replace generated text for a whole class (`ClassName`) or a
//! single member (`ClassName.member`), and may add a header block. The file
//! format is line oriented:
//!
//! ```text
//! header
//! from mymodule import helper
//!
//! override Element.owner: relation_one[Element]
//! Element.owner = derivedunion("owner", Element, upper=1)
//! ```
//!
//! `header` starts the header block. `override <Key>[: <type>]` starts an
//! override block; the optional type text is what a member override
//! declares inside its class body. Every other line belongs to the block
//! above it. Lines before the first directive are ignored.

use crate::error::OverrideError;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
struct OverrideEntry {
    /// Type text declared after the key, if any.
    type_text: Option<String>,
    /// Replacement text, prefixed with a comment naming its source line.
    text: String,
}

/// Lookup table of overrides keyed by `Class` or `Class.member`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    header: Option<String>,
    entries: HashMap<String, OverrideEntry>,
}

enum Block {
    Header(Vec<String>),
    Override {
        key: String,
        type_text: Option<String>,
        line: usize,
        lines: Vec<String>,
    },
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse an override file.
    pub fn load(path: &Path) -> Result<Self, OverrideError> {
        let content = std::fs::read_to_string(path).map_err(|e| OverrideError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parse override file content.
    pub fn parse(content: &str) -> Result<Self, OverrideError> {
        let mut overrides = Self::new();
        let mut current: Option<Block> = None;

        for (index, line) in content.lines().enumerate() {
            let number = index + 1;

            if line.trim_end() == "header" {
                overrides.close(current.take())?;
                current = Some(Block::Header(Vec::new()));
            } else if let Some(rest) = line.strip_prefix("override ") {
                overrides.close(current.take())?;
                let (key, type_text) = match rest.split_once(':') {
                    Some((key, ty)) => (key.trim(), Some(ty.trim()).filter(|t| !t.is_empty())),
                    None => (rest.trim(), None),
                };
                if key.is_empty() {
                    return Err(OverrideError::MissingKey { line: number });
                }
                current = Some(Block::Override {
                    key: key.to_string(),
                    type_text: type_text.map(str::to_string),
                    line: number,
                    lines: vec![format!("# {}: {}", number, line.trim_end())],
                });
            } else {
                match current.as_mut() {
                    Some(Block::Header(lines)) | Some(Block::Override { lines, .. }) => {
                        lines.push(line.to_string())
                    }
                    None => {}
                }
            }
        }

        overrides.close(current)?;
        Ok(overrides)
    }

    fn close(&mut self, block: Option<Block>) -> Result<(), OverrideError> {
        match block {
            None => Ok(()),
            Some(Block::Header(lines)) => {
                let text = join_trimmed(&lines);
                if !text.is_empty() {
                    self.header = Some(match self.header.take() {
                        Some(existing) => format!("{}\n{}", existing, text),
                        None => text,
                    });
                }
                Ok(())
            }
            Some(Block::Override {
                key,
                type_text,
                line,
                lines,
            }) => {
                if self.entries.contains_key(&key) {
                    return Err(OverrideError::Duplicate { key, line });
                }
                self.entries.insert(
                    key,
                    OverrideEntry {
                        type_text,
                        text: join_trimmed(&lines),
                    },
                );
                Ok(())
            }
        }
    }

    /// Register an override programmatically.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        type_text: Option<&str>,
        text: impl Into<String>,
    ) {
        self.entries.insert(
            key.into(),
            OverrideEntry {
                type_text: type_text.map(str::to_string),
                text: text.into(),
            },
        );
    }

    pub fn set_header(&mut self, header: impl Into<String>) {
        self.header = Some(header.into());
    }

    /// Header text to emit after the fixed preamble.
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn has_override(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Replacement text for a key.
    pub fn get_override(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.text.as_str())
    }

    /// Declared type text for a member override.
    pub fn get_type(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|e| e.type_text.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Join lines, dropping trailing blank lines.
fn join_trimmed(lines: &[String]) -> String {
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}
