// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Render a [`StrategyTable`] as INI text and write it to disk.
//!
//! The document always opens with a comment banner and the `[disabled]`
//! section, followed by `[default]` when one resolves, followed by the
//! remaining strategies either grouped by name prefix or in source order.

use crate::strategies::{DescribePolicy, StrategyTable};
use anyhow::{Context, Result};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Strategy used for `[default]` when none is requested explicitly.
pub const WELL_KNOWN_DEFAULT: &str = "syndata_multisplit_tls_google_700";

pub const DISABLED_SECTION: &str = "disabled";
pub const DEFAULT_SECTION: &str = "default";
const LINE_TERMINATOR: &str = "\n";

/// Prefix groups in output order.  A name belongs to the group whose prefix
/// equals it or prefixes it up to an underscore; the longest prefix wins.
const GROUPS: &[(&str, &str)] = &[
    ("syndata", "SYNDATA STRATEGIES"),
    ("seqovl", "SEQUENCE OVERLAP STRATEGIES"),
    ("multisplit", "MULTISPLIT STRATEGIES"),
    ("multidisorder", "MULTIDISORDER STRATEGIES"),
    ("fake", "FAKE PACKET STRATEGIES"),
    ("tls", "TLS-SPECIFIC STRATEGIES"),
    ("dis", "DISORDER STRATEGIES"),
    ("general", "GENERAL STRATEGIES"),
    ("censorliber", "CENSORLIBER STRATEGIES"),
];
const OTHER_TITLE: &str = "OTHER STRATEGIES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Grouped,
    Flat,
}

impl Layout {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "grouped" => Some(Self::Grouped),
            "flat" => Some(Self::Flat),
            _ => None,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grouped => "grouped",
            Self::Flat => "flat",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions<'a> {
    /// Explicitly requested default strategy.
    pub default: Option<&'a str>,
    pub layout: Layout,
    pub describe: DescribePolicy,
    /// File name quoted in the banner.
    pub source_name: &'a str,
}

/// One `[name]` block with its two keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub desc: String,
    pub args: String,
}

/// The rendered document plus the sections it contains, in output order.
#[derive(Debug)]
pub struct RenderedIni {
    pub text: String,
    pub sections: Vec<Section>,
    pub default: Option<String>,
    pub warnings: Vec<String>,
}

/// Pick the strategy for `[default]`: the explicit request when present in
/// the table, otherwise the well-known name, otherwise the first entry.
pub fn resolve_default<'a>(
    table: &'a StrategyTable,
    explicit: Option<&str>,
    warnings: &mut Vec<String>,
) -> Option<&'a str> {
    if let Some(name) = explicit {
        let found = table.names().find(|n| *n == name);
        if found.is_none() {
            warnings.push(format!(
                "requested default strategy '{name}' not found; no [default] section written"
            ));
        }
        return found;
    }
    if table.contains(WELL_KNOWN_DEFAULT) {
        return table.names().find(|n| *n == WELL_KNOWN_DEFAULT);
    }
    table.first_name()
}

pub fn render(table: &StrategyTable, opts: &RenderOptions<'_>) -> RenderedIni {
    let mut warnings = Vec::new();
    let mut lines = banner(opts.source_name);
    let mut sections = Vec::new();

    push_section(
        &mut lines,
        &mut sections,
        Section {
            name: DISABLED_SECTION.to_string(),
            desc: "TCP bypass disabled".to_string(),
            args: String::new(),
        },
    );

    let default = resolve_default(table, opts.default, &mut warnings);
    if let Some(name) = default {
        push_section(
            &mut lines,
            &mut sections,
            Section {
                name: DEFAULT_SECTION.to_string(),
                desc: format!("Default TCP bypass strategy ({name})"),
                args: table.get(name).unwrap_or_default().to_string(),
            },
        );
    }

    let mut remaining = Vec::new();
    for (name, args) in table.iter() {
        if Some(name) == default {
            continue;
        }
        if name == DISABLED_SECTION || name == DEFAULT_SECTION {
            warnings.push(format!(
                "strategy '{name}' clashes with a reserved section and was skipped"
            ));
            continue;
        }
        remaining.push((name, args));
    }

    match opts.layout {
        Layout::Flat => {
            for (name, args) in remaining {
                push_strategy(&mut lines, &mut sections, name, args, opts.describe);
            }
        }
        Layout::Grouped => {
            let mut buckets: Vec<Vec<(&str, &str)>> = vec![Vec::new(); GROUPS.len() + 1];
            for (name, args) in remaining {
                let slot = group_of(name).unwrap_or(GROUPS.len());
                buckets[slot].push((name, args));
            }
            for (slot, mut bucket) in buckets.into_iter().enumerate() {
                if bucket.is_empty() {
                    continue;
                }
                let title = GROUPS.get(slot).map_or(OTHER_TITLE, |(_, title)| *title);
                lines.push(format!("# ==================== {title} ===================="));
                lines.push(String::new());
                bucket.sort_by(|a, b| a.0.cmp(b.0));
                for (name, args) in bucket {
                    push_strategy(&mut lines, &mut sections, name, args, opts.describe);
                }
            }
        }
    }

    RenderedIni {
        text: lines.join(LINE_TERMINATOR),
        sections,
        default: default.map(str::to_string),
        warnings,
    }
}

/// Write `text` next to `path` and rename it into place so readers never
/// observe a half-written file.
pub fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create a temporary file in {}", dir.display()))?;
    tmp.write_all(text.as_bytes())
        .with_context(|| format!("failed to write {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to flush {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

fn banner(source_name: &str) -> Vec<String> {
    let mut lines: Vec<String> = [
        "# ===============================",
        "# TCP Strategies for nfqws2",
        "# ===============================",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect();
    lines.push(format!("# Auto-generated from {source_name}"));
    lines.extend(
        [
            "# Each section [strategy_name] contains:",
            "# - desc: Description of strategy",
            "# - args: Lua desync arguments (WITHOUT --filter-tcp, --hostlist - they come from categories)",
            "#",
            "# Usage: These strategies are applied to TCP/TLS traffic",
            "# Filter arguments (--filter-tcp, --hostlist, --ipset) are added by categories.txt",
            "",
        ]
        .iter()
        .map(|line| line.to_string()),
    );
    lines
}

fn group_of(name: &str) -> Option<usize> {
    GROUPS
        .iter()
        .enumerate()
        .filter(|(_, (prefix, _))| {
            name == *prefix
                || name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('_'))
        })
        .max_by_key(|(_, (prefix, _))| prefix.len())
        .map(|(slot, _)| slot)
}

fn push_strategy(
    lines: &mut Vec<String>,
    sections: &mut Vec<Section>,
    name: &str,
    args: &str,
    describe: DescribePolicy,
) {
    push_section(
        lines,
        sections,
        Section {
            name: name.to_string(),
            desc: describe.describe(name),
            args: args.to_string(),
        },
    );
}

fn push_section(lines: &mut Vec<String>, sections: &mut Vec<Section>, section: Section) {
    lines.push(format!("[{}]", section.name));
    lines.push(format!("desc={}", section.desc));
    lines.push(format!("args={}", section.args));
    lines.push(String::new());
    sections.push(section);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str)]) -> StrategyTable {
        let mut table = StrategyTable::new();
        for (name, args) in entries {
            table.insert(*name, *args);
        }
        table
    }

    fn options(layout: Layout) -> RenderOptions<'static> {
        RenderOptions {
            default: None,
            layout,
            describe: DescribePolicy::Expanded,
            source_name: "strategies.sh",
        }
    }

    fn section_names(rendered: &RenderedIni) -> Vec<&str> {
        rendered.sections.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn disabled_section_is_always_first() {
        let rendered = render(&StrategyTable::new(), &options(Layout::Grouped));
        assert_eq!(section_names(&rendered), vec![DISABLED_SECTION]);
        assert!(rendered.text.contains("[disabled]\ndesc=TCP bypass disabled\nargs=\n"));
        assert!(rendered.default.is_none());
    }

    #[test]
    fn well_known_default_is_preferred_and_not_repeated() {
        let t = table(&[
            ("fake_one", "--fake"),
            (WELL_KNOWN_DEFAULT, "--syn --split"),
        ]);
        let rendered = render(&t, &options(Layout::Grouped));
        assert_eq!(rendered.default.as_deref(), Some(WELL_KNOWN_DEFAULT));
        let default = &rendered.sections[1];
        assert_eq!(default.name, DEFAULT_SECTION);
        assert_eq!(default.args, "--syn --split");
        assert_eq!(
            default.desc,
            format!("Default TCP bypass strategy ({WELL_KNOWN_DEFAULT})")
        );
        assert!(!rendered.text.contains(&format!("[{WELL_KNOWN_DEFAULT}]")));
    }

    #[test]
    fn first_entry_is_the_fallback_default() {
        let t = table(&[("zzz", "--z"), ("aaa", "--a")]);
        let rendered = render(&t, &options(Layout::Flat));
        assert_eq!(rendered.default.as_deref(), Some("zzz"));
        assert_eq!(section_names(&rendered), vec!["disabled", "default", "aaa"]);
    }

    #[test]
    fn explicit_default_must_exist() {
        let t = table(&[("one", "--1")]);
        let mut opts = options(Layout::Flat);
        opts.default = Some("nope");
        let rendered = render(&t, &opts);
        assert!(rendered.default.is_none());
        assert_eq!(section_names(&rendered), vec!["disabled", "one"]);
        assert_eq!(rendered.warnings.len(), 1);
    }

    #[test]
    fn grouped_layout_sorts_within_groups_and_uses_longest_prefix() {
        let t = table(&[
            ("default_pick", "--d"),
            ("tls_b", "--tb"),
            ("fakedsplit_x", "--fs"),
            ("tls_a", "--ta"),
            ("disorder_x", "--dx"),
            ("dis_x", "--dis"),
            ("syndata", "--s"),
        ]);
        let rendered = render(&t, &options(Layout::Grouped));
        assert_eq!(
            section_names(&rendered),
            vec![
                "disabled",
                "default",
                "syndata",
                "tls_a",
                "tls_b",
                "dis_x",
                "disorder_x",
                "fakedsplit_x"
            ]
        );
        let syn = rendered.text.find("SYNDATA STRATEGIES").unwrap();
        let tls = rendered.text.find("TLS-SPECIFIC STRATEGIES").unwrap();
        let dis = rendered.text.find("DISORDER STRATEGIES").unwrap();
        let other = rendered.text.find("OTHER STRATEGIES").unwrap();
        assert!(syn < tls && tls < dis && dis < other);
        assert!(!rendered.text.contains("FAKE PACKET STRATEGIES"));
    }

    #[test]
    fn flat_layout_keeps_source_order_without_banners() {
        let t = table(&[("b", "--b"), ("c", "--c"), ("a", "--a")]);
        let rendered = render(&t, &options(Layout::Flat));
        assert_eq!(section_names(&rendered), vec!["disabled", "default", "c", "a"]);
        assert!(!rendered.text.contains("STRATEGIES ===="));
    }

    #[test]
    fn reserved_names_are_skipped() {
        let t = table(&[("first", "--f"), ("disabled", "--x")]);
        let rendered = render(&t, &options(Layout::Flat));
        assert_eq!(section_names(&rendered), vec!["disabled", "default"]);
        assert_eq!(rendered.sections[0].args, "");
        assert_eq!(rendered.warnings.len(), 1);
    }

    #[test]
    fn entries_render_as_three_lines_and_a_blank() {
        let t = table(&[("a", "--a"), ("foo_bar", "--opt=1 --opt=2")]);
        let mut opts = options(Layout::Flat);
        opts.describe = DescribePolicy::Simple;
        let rendered = render(&t, &opts);
        assert!(rendered.text.ends_with("[foo_bar]\ndesc=Foo bar\nargs=--opt=1 --opt=2\n"));
        assert!(rendered.text.starts_with("# ===============================\n"));
        assert!(rendered.text.contains("# Auto-generated from strategies.sh\n"));
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.ini");
        std::fs::write(&path, "old contents that are longer").unwrap();
        write_atomic(&path, "[disabled]\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[disabled]\n");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary file should be renamed away");
    }
}
