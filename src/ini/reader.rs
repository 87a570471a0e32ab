// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Minimal INI reader used to check what the writer produced.
//!
//! Grammar: `[section]` headers, `key=value` lines split at the first `=`
//! (key trimmed, value kept verbatim), `#` or `;` comment lines and blank
//! lines.  Anything else is rejected with its line number.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IniError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self, IniError> {
        let mut sections: Vec<IniSection> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_start();
            if line.trim_end().is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .trim_end()
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| malformed(line_no, "bad section header"))?;
                sections.push(IniSection {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| malformed(line_no, "expected key=value"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(malformed(line_no, "empty key"));
            }
            let section = sections
                .last_mut()
                .ok_or_else(|| malformed(line_no, "key outside of any section"))?;
            if section.get(key).is_some() {
                return Err(malformed(
                    line_no,
                    &format!("duplicate key '{key}' in [{}]", section.name),
                ));
            }
            section.entries.push((key.to_string(), value.to_string()));
        }

        Ok(Self { sections })
    }

    /// First section with the given name.
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }
}

fn malformed(line: usize, reason: &str) -> IniError {
    IniError::Malformed {
        line,
        reason: reason.to_string(),
    }
}
