// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Human-readable descriptions derived from strategy names.

use std::fmt;

/// Abbreviation expansions applied in order after underscores become spaces.
/// Later rules see the output of earlier ones.
const EXPANSIONS: &[(&str, &str)] = &[
    ("syndata", "SYN data"),
    ("multisplit", "multi-split"),
    ("multidisorder", "multi-disorder"),
    ("tls google", "TLS Google pattern"),
    ("tls max", "TLS Max.ru pattern"),
    ("seqovl", "sequence overlap"),
    ("midsld", "mid-SLD position"),
    ("sniext", "SNI extension"),
    ("autottl", "auto TTL"),
    ("badseq", "bad sequence"),
    ("md5sig", "MD5 signature"),
    ("tcpack", "TCP ACK manipulation"),
    ("fakedsplit", "fake+split"),
    ("fakeddisorder", "fake+disorder"),
    ("datanoack", "data without ACK"),
    ("ipfrag", "IP fragmentation"),
    ("udplen", "UDP length"),
    ("wssize", "window size"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescribePolicy {
    /// Expand known abbreviations, capitalise the first character.
    #[default]
    Expanded,
    /// Capitalise the first word, keep the rest as written.
    Simple,
}

impl DescribePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "expanded" => Some(Self::Expanded),
            "simple" => Some(Self::Simple),
            _ => None,
        }
    }

    pub fn describe(self, name: &str) -> String {
        match self {
            Self::Expanded => describe_expanded(name),
            Self::Simple => describe_simple(name),
        }
    }
}

impl fmt::Display for DescribePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Expanded => "expanded",
            Self::Simple => "simple",
        })
    }
}

pub fn describe_expanded(name: &str) -> String {
    let mut desc = name.replace('_', " ");
    for (pattern, replacement) in EXPANSIONS {
        if desc.contains(pattern) {
            desc = desc.replace(pattern, replacement);
        }
    }
    upper_first(&desc)
}

pub fn describe_simple(name: &str) -> String {
    name.split('_')
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                capitalise(word)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn upper_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-case the first character and lower-case the remainder.
fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
