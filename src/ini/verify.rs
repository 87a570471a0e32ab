// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use crate::ini::reader::{IniDocument, IniError};
use crate::ini::writer::RenderedIni;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("written file is not valid INI: {0}")]
    Parse(#[from] IniError),
    #[error("section [{0}] is missing from the written file")]
    MissingSection(String),
    #[error("written file has {found} sections, expected {expected}")]
    SectionCount { expected: usize, found: usize },
    #[error("[{section}] {key} does not round-trip: wrote {expected:?}, read back {found:?}")]
    Mismatch {
        section: String,
        key: &'static str,
        expected: String,
        found: Option<String>,
    },
}

/// Re-read `text` and confirm it holds exactly the rendered sections, each
/// carrying the `desc` and `args` the writer produced.
pub fn verify_round_trip(rendered: &RenderedIni, text: &str) -> Result<(), VerifyError> {
    let doc = IniDocument::parse(text)?;
    if doc.sections().len() != rendered.sections.len() {
        return Err(VerifyError::SectionCount {
            expected: rendered.sections.len(),
            found: doc.sections().len(),
        });
    }

    for expected in &rendered.sections {
        let section = doc
            .section(&expected.name)
            .ok_or_else(|| VerifyError::MissingSection(expected.name.clone()))?;
        for (key, value) in [("desc", &expected.desc), ("args", &expected.args)] {
            let found = section.get(key);
            if found != Some(value.as_str()) {
                return Err(VerifyError::Mismatch {
                    section: expected.name.clone(),
                    key,
                    expected: value.clone(),
                    found: found.map(str::to_string),
                });
            }
        }
    }
    Ok(())
}
