// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Build a [`StrategyTable`] from the text of a strategies shell script.
//!
//! Two policies exist because the scripts in the wild are not formatted
//! consistently.  `Direct` reads every arm of the case table inside the
//! table function.  `Names` reads the list of expected names from the
//! enumeration function and then looks each one up among the case arms.
//! `Auto` runs `Direct` and only falls back to `Names` when the first pass
//! finds nothing; the caller is always told which policy produced the table.

use crate::strategies::scanner::{self, CaseArm, ScanError};
use crate::strategies::table::StrategyTable;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

pub const DEFAULT_TABLE_FUNCTION: &str = "get_tcp_strategy_options";
pub const DEFAULT_LIST_FUNCTION: &str = "list_tcp_strategies";
pub const DEFAULT_PLACEHOLDER: &str = "filter";

static CASE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bcase\s+(?:"[^"\n]*"|'[^'\n]*'|[^\s;]+)\s+in\b"#).expect("valid regex")
});
static CONTINUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\r?\n\s*").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("could not find {what}")]
    NotFound { what: String },
    #[error("case statement in {function}() starting on line {line} is not terminated by esac")]
    Unterminated { function: String, line: usize },
    #[error("invalid function name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPolicy {
    Auto,
    Direct,
    Names,
}

impl ExtractionPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "direct" => Some(Self::Direct),
            "names" => Some(Self::Names),
            _ => None,
        }
    }
}

impl fmt::Display for ExtractionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Direct => "direct",
            Self::Names => "names",
        };
        f.write_str(name)
    }
}

/// Names of the shell functions to look for and the placeholder to strip.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub table_function: String,
    pub list_function: String,
    pub placeholder: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            table_function: DEFAULT_TABLE_FUNCTION.to_string(),
            list_function: DEFAULT_LIST_FUNCTION.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

/// Result of one extraction pass.  `policy` is the policy that actually
/// produced `table` (never `Auto`); `warnings` are non-fatal misses.
#[derive(Debug)]
pub struct Extraction {
    pub table: StrategyTable,
    pub policy: ExtractionPolicy,
    pub warnings: Vec<String>,
}

pub fn extract(
    content: &str,
    policy: ExtractionPolicy,
    config: &ExtractorConfig,
) -> Result<Extraction, ExtractError> {
    match policy {
        ExtractionPolicy::Direct => extract_direct(content, config),
        ExtractionPolicy::Names => extract_by_names(content, config),
        ExtractionPolicy::Auto => extract_auto(content, config),
    }
}

fn extract_auto(content: &str, config: &ExtractorConfig) -> Result<Extraction, ExtractError> {
    match extract_direct(content, config) {
        Ok(direct) if !direct.table.is_empty() => Ok(direct),
        Ok(mut direct) => match extract_by_names(content, config) {
            Ok(mut names) => {
                let mut warnings = vec![format!(
                    "{}() yielded no strategies; using the name list from {}()",
                    config.table_function, config.list_function
                )];
                warnings.append(&mut direct.warnings);
                warnings.append(&mut names.warnings);
                names.warnings = warnings;
                Ok(names)
            }
            Err(err) => {
                direct.warnings.push(format!("name list fallback failed: {err}"));
                Ok(direct)
            }
        },
        Err(direct_err) => match extract_by_names(content, config) {
            Ok(mut names) => {
                names.warnings.insert(
                    0,
                    format!(
                        "{direct_err}; using the name list from {}()",
                        config.list_function
                    ),
                );
                Ok(names)
            }
            Err(_) => Err(direct_err),
        },
    }
}

/// Read every arm of the table function's case statement.  Arms without an
/// output statement, or whose arguments are empty once the placeholder is
/// gone, produce no entry.
fn extract_direct(content: &str, config: &ExtractorConfig) -> Result<Extraction, ExtractError> {
    let function = &config.table_function;
    let body = find_function(content, function)?;
    let header = CASE_HEADER
        .find(&content[body.clone()])
        .ok_or_else(|| ExtractError::NotFound {
            what: format!("case statement in {function}()"),
        })?;
    let arms = scanner::parse_case_arms(content, body.start + header.end())
        .map_err(|err| unterminated(content, function, err))?;

    let mut table = StrategyTable::new();
    let mut warnings = Vec::new();

    for arm in &arms {
        let Some(raw) = scanner::echo_argument(arm.body) else {
            continue;
        };
        let args = clean_arguments(raw, &config.placeholder);
        if args.is_empty() {
            continue;
        }
        for label in arm.labels.iter().filter(|l| is_strategy_name(l)) {
            if !table.insert(label.as_str(), args.as_str()) {
                warnings.push(format!("duplicate arm for strategy '{label}' ignored"));
            }
        }
    }

    Ok(Extraction {
        table,
        policy: ExtractionPolicy::Direct,
        warnings,
    })
}

/// Read the expected names from the list function, then look up each arm.
/// A name whose arm is missing is kept with empty arguments.
fn extract_by_names(content: &str, config: &ExtractorConfig) -> Result<Extraction, ExtractError> {
    let names = list_names(content, &config.list_function)?;
    let mut warnings = Vec::new();
    let arms = collect_arms(content, &mut warnings);
    let mut table = StrategyTable::new();

    for name in names {
        if !is_strategy_name(&name) {
            warnings.push(format!(
                "ignoring '{name}' in {}(): not a strategy name",
                config.list_function
            ));
            continue;
        }
        let args = match arms.get(name.as_str()) {
            Some(body) => match scanner::echo_argument(body) {
                Some(raw) => clean_arguments(raw, &config.placeholder),
                None => {
                    warnings.push(format!("no echo in the arm for strategy '{name}'"));
                    String::new()
                }
            },
            None => {
                warnings.push(format!("could not find args for strategy '{name}'"));
                String::new()
            }
        };
        if !table.insert(name.as_str(), args) {
            warnings.push(format!("strategy '{name}' listed twice"));
        }
    }

    Ok(Extraction {
        table,
        policy: ExtractionPolicy::Names,
        warnings,
    })
}

/// Names echoed by the enumeration function, in listed order.
fn list_names(content: &str, function: &str) -> Result<Vec<String>, ExtractError> {
    let body = find_function(content, function)?;
    let raw = scanner::echo_argument(&content[body]).ok_or_else(|| ExtractError::NotFound {
        what: format!("strategy list in {function}()"),
    })?;

    Ok(raw
        .split_whitespace()
        .filter(|token| *token != "\\")
        .map(str::to_string)
        .collect())
}

/// Every labelled arm of every case statement in the source.  The first arm
/// seen for a label wins, matching how the shell dispatches.
fn collect_arms<'a>(content: &'a str, warnings: &mut Vec<String>) -> HashMap<String, &'a str> {
    let mut arms = HashMap::new();
    let mut pos = 0;

    while let Some(header) = CASE_HEADER.find_at(content, pos) {
        pos = header.end();
        match scanner::parse_case_arms(content, header.end()) {
            Ok(found) => register_arms(&mut arms, found),
            Err(ScanError::Unterminated { start }) => warnings.push(format!(
                "skipping unterminated case statement on line {}",
                line_of(content, start)
            )),
        }
    }
    arms
}

fn register_arms<'a>(arms: &mut HashMap<String, &'a str>, found: Vec<CaseArm<'a>>) {
    for arm in found {
        for label in arm.labels {
            arms.entry(label).or_insert(arm.body);
        }
    }
}

/// Byte range of the named function's body, between its braces.  A body
/// that never closes runs to the end of the source.
fn find_function(content: &str, function: &str) -> Result<Range<usize>, ExtractError> {
    let name = regex::escape(function);
    let pattern = format!(
        r"(?m)(?:^|[\s;])(?:function\s+{name}\s*(?:\(\s*\))?|{name}\s*\(\s*\))\s*\{{"
    );
    let re = Regex::new(&pattern)?;
    let start = re
        .find(content)
        .map(|m| m.end())
        .ok_or_else(|| ExtractError::NotFound {
            what: format!("{function}() in the source"),
        })?;
    let end = scanner::block_end(content, start).unwrap_or(content.len());
    Ok(start..end)
}

/// Strip the placeholder, then normalise whitespace.
pub fn clean_arguments(raw: &str, placeholder: &str) -> String {
    normalize_whitespace(&strip_placeholder(raw, placeholder))
}

/// Turn line continuations into single spaces, collapse whitespace runs and
/// trim.  Applying it twice gives the same result as applying it once.
pub fn normalize_whitespace(text: &str) -> String {
    let joined = CONTINUATION.replace_all(text, " ");
    WHITESPACE.replace_all(&joined, " ").trim().to_string()
}

/// Remove `$name` and `${name}` references.  `$name_suffix` is a different
/// variable and is left alone.
fn strip_placeholder(raw: &str, name: &str) -> String {
    if name.is_empty() {
        return raw.to_string();
    }
    let braced = format!("${{{name}}}");
    let bare = format!("${name}");
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if let Some(after) = tail.strip_prefix(braced.as_str()) {
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix(bare.as_str())
            && !after.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
        {
            rest = after;
            continue;
        }
        out.push('$');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

fn is_strategy_name(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn unterminated(content: &str, function: &str, err: ScanError) -> ExtractError {
    let ScanError::Unterminated { start } = err;
    ExtractError::Unterminated {
        function: function.to_string(),
        line: line_of(content, start),
    }
}

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset.min(content.len())].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"#!/bin/sh
filter="--filter-tcp=443"

list_tcp_strategies() {
    echo "syndata_multisplit_tls_google_700 multisplit_seqovl missing_one"
}

get_tcp_strategy_options() {
    local strategy_name="$1"
    case "$strategy_name" in
        syndata_multisplit_tls_google_700)
            echo "$filter \
--lua-desync=syndata:blob=tls_google \
--lua-desync=multisplit:pos=700"
            ;;
        multisplit_seqovl)
            echo "$filter --lua-desync=multisplit:seqovl=1"
            ;;
        placeholder_only)
            echo "$filter"
            ;;
        *)
            echo ""
            ;;
    esac
}
"#;

    fn config() -> ExtractorConfig {
        ExtractorConfig::default()
    }

    #[test]
    fn direct_scan_reads_every_non_empty_arm() {
        let extraction = extract(SCRIPT, ExtractionPolicy::Direct, &config()).unwrap();
        assert_eq!(extraction.policy, ExtractionPolicy::Direct);
        let table = extraction.table;
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("syndata_multisplit_tls_google_700"),
            Some("--lua-desync=syndata:blob=tls_google --lua-desync=multisplit:pos=700")
        );
        assert_eq!(
            table.get("multisplit_seqovl"),
            Some("--lua-desync=multisplit:seqovl=1")
        );
        assert!(!table.contains("placeholder_only"));
        assert!(!table.contains("*"));
    }

    #[test]
    fn continuation_example_collapses_to_one_line() {
        let src = "get_tcp_strategy_options() {\n    case \"$strategy_name\" in\n        foo_bar)\n            echo \"$filter --opt=1 \\\n--opt=2\"\n            ;;\n    esac\n}\n";
        let table = extract(src, ExtractionPolicy::Direct, &config())
            .unwrap()
            .table;
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("foo_bar"), Some("--opt=1 --opt=2"));
    }

    #[test]
    fn direct_scan_does_not_depend_on_indentation() {
        let src = "get_tcp_strategy_options()\n{\ncase $1 in\na) echo \"$filter --a\";;\n  b)   echo \"--b\"   ;;\n\t\tc|d)\necho \"${filter} --cd\"\n;;\nesac\n}\n";
        let table = extract(src, ExtractionPolicy::Direct, &config())
            .unwrap()
            .table;
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(table.get("d"), Some("--cd"));
    }

    #[test]
    fn name_first_keeps_missing_arms_with_empty_args() {
        let extraction = extract(SCRIPT, ExtractionPolicy::Names, &config()).unwrap();
        assert_eq!(extraction.policy, ExtractionPolicy::Names);
        let table = &extraction.table;
        let names: Vec<&str> = table.names().collect();
        assert_eq!(
            names,
            vec![
                "syndata_multisplit_tls_google_700",
                "multisplit_seqovl",
                "missing_one"
            ]
        );
        assert_eq!(table.get("missing_one"), Some(""));
        assert!(
            extraction
                .warnings
                .iter()
                .any(|w| w.contains("missing_one")),
            "a warning should name the missing arm: {:?}",
            extraction.warnings
        );
    }

    #[test]
    fn name_list_survives_braces_inside_the_echo() {
        let src = "list_tcp_strategies() {\n    echo \"alpha ${EXTRA} beta gamma\"\n}\n";
        let extraction = extract(src, ExtractionPolicy::Names, &config()).unwrap();
        let names: Vec<&str> = extraction.table.names().collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert!(
            extraction.warnings.iter().any(|w| w.contains("${EXTRA}")),
            "{:?}",
            extraction.warnings
        );
    }

    #[test]
    fn name_list_with_non_ascii_text_does_not_panic() {
        let src = "list_tcp_strategies() {\n    echo \"alpha \u{e9}}\"\n}\n";
        let extraction = extract(src, ExtractionPolicy::Names, &config()).unwrap();
        let names: Vec<&str> = extraction.table.names().collect();
        assert_eq!(names, vec!["alpha"]);
    }

    #[test]
    fn unterminated_name_list_is_not_found() {
        let src = "list_tcp_strategies() {\n    echo \"alpha \u{e9}";
        let err = extract(src, ExtractionPolicy::Names, &config()).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { .. }));
    }

    #[test]
    fn case_search_stays_inside_the_table_function() {
        let src = "get_tcp_strategy_options() {\n    echo nothing\n}\n\nother() {\n    case \"$1\" in\n        wrong) echo \"--wrong\" ;;\n    esac\n}\n";
        let err = extract(src, ExtractionPolicy::Direct, &config()).unwrap_err();
        match err {
            ExtractError::NotFound { what } => {
                assert_eq!(what, format!("case statement in {DEFAULT_TABLE_FUNCTION}()"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unquoted_echo_arguments_are_kept() {
        let src = "get_tcp_strategy_options() {\n case $1 in\n  a) echo --opt=1 --opt=2 ;;\n  b) echo -n $filter --b ;;\n esac\n}\n";
        let table = extract(src, ExtractionPolicy::Direct, &config())
            .unwrap()
            .table;
        assert_eq!(table.get("a"), Some("--opt=1 --opt=2"));
        assert_eq!(table.get("b"), Some("--b"));
    }

    #[test]
    fn auto_falls_back_to_name_list() {
        let src = "list_tcp_strategies() {\n    echo \"one two\"\n}\n\nrun() {\n    case \"$1\" in\n        one) echo \"$filter --one\" ;;\n    esac\n}\n";
        let extraction = extract(src, ExtractionPolicy::Auto, &config()).unwrap();
        assert_eq!(extraction.policy, ExtractionPolicy::Names);
        assert_eq!(extraction.table.get("one"), Some("--one"));
        assert_eq!(extraction.table.get("two"), Some(""));
        assert!(extraction.warnings[0].contains(DEFAULT_TABLE_FUNCTION));
    }

    #[test]
    fn auto_prefers_direct_scan() {
        let extraction = extract(SCRIPT, ExtractionPolicy::Auto, &config()).unwrap();
        assert_eq!(extraction.policy, ExtractionPolicy::Direct);
        assert!(!extraction.table.contains("missing_one"));
    }

    #[test]
    fn missing_anchor_is_not_found() {
        let err = extract("", ExtractionPolicy::Direct, &config()).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { .. }));
        let err = extract("", ExtractionPolicy::Auto, &config()).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { .. }));
    }

    #[test]
    fn unterminated_table_reports_its_line() {
        let src = "get_tcp_strategy_options() {\n    case \"$1\" in\n        a) echo \"--a\" ;;\n}\n";
        let err = extract(src, ExtractionPolicy::Direct, &config()).unwrap_err();
        match err {
            ExtractError::Unterminated { function, line } => {
                assert_eq!(function, DEFAULT_TABLE_FUNCTION);
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_arms_keep_the_first() {
        let src = "get_tcp_strategy_options() {\n case $1 in\n  a) echo \"--first\" ;;\n  a) echo \"--second\" ;;\n esac\n}\n";
        let extraction = extract(src, ExtractionPolicy::Direct, &config()).unwrap();
        assert_eq!(extraction.table.get("a"), Some("--first"));
        assert_eq!(extraction.warnings.len(), 1);
    }

    #[test]
    fn whitespace_normalisation_is_idempotent() {
        let samples = [
            "  --a \\\n   --b\t\t--c  ",
            "--x=1 \\\r\n--y=2",
            "",
            "already normal",
        ];
        for sample in samples {
            let once = normalize_whitespace(sample);
            assert_eq!(normalize_whitespace(&once), once);
        }
    }

    #[test]
    fn placeholder_stripping_respects_variable_names() {
        assert_eq!(
            clean_arguments("$filter ${filter} $filter_extra --x", "filter"),
            "$filter_extra --x"
        );
        assert_eq!(clean_arguments("$other --y", "other"), "--y");
        assert_eq!(clean_arguments("cost$ --z", "filter"), "cost$ --z");
    }
}
