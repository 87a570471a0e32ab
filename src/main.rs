// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

/// strategies2ini command-line entry point.
///
/// The binary reads a strategies shell script, pulls the strategy table out
/// of its case statement and writes the same data as an INI file.  This
/// file only wires user input into the modules under `src/strategies` and
/// `src/ini`; the conversion itself lives in `convert.rs`.
mod colours;
mod convert;
mod ini;
mod strategies;

use anyhow::{Result, anyhow};
use atty::Stream;
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use convert::{ConvertContext, ConvertOptions, convert};
use ini::Layout;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use strategies::extractor::{DEFAULT_LIST_FUNCTION, DEFAULT_PLACEHOLDER, DEFAULT_TABLE_FUNCTION};
use strategies::{DescribePolicy, ExtractionPolicy, ExtractorConfig};

/// Build-time version information.  CI may bake in a release tag via
/// `STRATEGIES2INI_VERSION`; otherwise the Cargo package version is used.
const VERSION: &str = match option_env!("STRATEGIES2INI_VERSION") {
    Some(tag) => tag,
    None => env!("CARGO_PKG_VERSION"),
};

fn branch() -> &'static str {
    option_env!("STRATEGIES2INI_BRANCH").unwrap_or("main")
}

/// Short Git commit injected by `build.rs`, or a recognisable placeholder.
fn sha() -> &'static str {
    option_env!("STRATEGIES2INI_COMMIT").unwrap_or("0000000")
}

fn rust_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Human-friendly version banner including branch and commit.
fn version_string() -> String {
    format!(
        "strategies2ini {VERSION} (branch:{}, commit:{}) [rust:{}]",
        branch(),
        sha(),
        rust_version()
    )
}

/// Cached version string with a 'static lifetime for clap metadata.
fn version_str() -> &'static str {
    static VERSION_STR: OnceLock<String> = OnceLock::new();
    VERSION_STR.get_or_init(version_string).as_str()
}

/// Conventional `main` that defers to `run` so the exit status is decided
/// in one place.
fn main() {
    std::process::exit(match run() {
        Ok(code) => code,
        Err(err) => {
            let colours = colours::palette();
            eprintln!("{}error:{} {err:#}", colours.error, colours.reset);
            1
        }
    });
}

fn run() -> Result<i32> {
    let matches = match build_cli().try_get_matches() {
        Ok(m) => m,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                return Ok(0);
            }
            _ => err.exit(),
        },
    };

    let opts = CliOptions::from_matches(&matches)?;

    if opts.show_version {
        println!("{}", version_string());
        return Ok(0);
    }

    match opts.colour {
        Some(false) => colours::disable_colours(),
        Some(true) => {}
        None => {
            if !atty::is(Stream::Stdout) || !atty::is(Stream::Stderr) {
                colours::disable_colours();
            }
        }
    }

    let convert_opts = opts.into_convert_options()?;
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let mut ctx = ConvertContext {
        out: &mut stdout,
        err_out: &mut stderr,
    };
    convert(&convert_opts, &mut ctx)?;
    Ok(0)
}

/// Construct the `clap` command.  Both paths are required; every other
/// option has a default that reproduces the stock strategies script layout.
fn build_cli() -> Command {
    Command::new("strategies2ini")
        .about("Convert the TCP strategy case table of a shell script into an INI file")
        .disable_version_flag(true)
        .version(version_str())
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .value_parser(clap::value_parser!(PathBuf))
                .required_unless_present("version")
                .help("Shell script containing the strategy case table"),
        )
        .arg(
            Arg::new("output")
                .value_name("OUTPUT")
                .value_parser(clap::value_parser!(PathBuf))
                .required_unless_present("version")
                .help("INI file to write (replaced atomically)"),
        )
        .arg(
            Arg::new("policy")
                .long("policy")
                .value_name("POLICY")
                .value_parser(["auto", "direct", "names"])
                .default_value("auto")
                .help("Extraction policy: scan the case table, read the name list, or try both"),
        )
        .arg(
            Arg::new("describe")
                .long("describe")
                .value_name("STYLE")
                .value_parser(["expanded", "simple"])
                .default_value("expanded")
                .help("Description style for each strategy"),
        )
        .arg(
            Arg::new("layout")
                .long("layout")
                .value_name("LAYOUT")
                .value_parser(["grouped", "flat"])
                .default_value("grouped")
                .help("Group strategies by prefix or keep source order"),
        )
        .arg(
            Arg::new("default")
                .long("default")
                .value_name("NAME")
                .help("Strategy to emit as [default]"),
        )
        .arg(
            Arg::new("table-function")
                .long("table-function")
                .value_name("NAME")
                .default_value(DEFAULT_TABLE_FUNCTION)
                .help("Shell function holding the case table"),
        )
        .arg(
            Arg::new("list-function")
                .long("list-function")
                .value_name("NAME")
                .default_value(DEFAULT_LIST_FUNCTION)
                .help("Shell function echoing the strategy names"),
        )
        .arg(
            Arg::new("placeholder")
                .long("placeholder")
                .value_name("VAR")
                .default_value(DEFAULT_PLACEHOLDER)
                .help("Variable stripped from argument strings (empty to keep everything)"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print the INI document to stdout instead of writing OUTPUT"),
        )
        .arg(
            Arg::new("colour")
                .long("colour")
                .num_args(0..=1)
                .value_name("yes|no")
                .require_equals(false)
                .default_missing_value("true")
                .help("Force coloured diagnostics"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print version information and exit"),
        )
}

/// Structured view of the CLI flags so the conversion gets typed input.
struct CliOptions {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    policy: ExtractionPolicy,
    describe: DescribePolicy,
    layout: Layout,
    default: Option<String>,
    table_function: String,
    list_function: String,
    placeholder: String,
    dry_run: bool,
    colour: Option<bool>,
    show_version: bool,
}

impl CliOptions {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let choice = |name: &str| -> String {
            matches
                .get_one::<String>(name)
                .cloned()
                .unwrap_or_default()
        };

        let policy = ExtractionPolicy::parse(&choice("policy"))
            .ok_or_else(|| anyhow!("invalid value for --policy"))?;
        let describe = DescribePolicy::parse(&choice("describe"))
            .ok_or_else(|| anyhow!("invalid value for --describe"))?;
        let layout =
            Layout::parse(&choice("layout")).ok_or_else(|| anyhow!("invalid value for --layout"))?;

        let placeholder = choice("placeholder");
        if !placeholder.is_empty() {
            parse_identifier(&placeholder, "placeholder")?;
        }

        Ok(Self {
            input: matches.get_one::<PathBuf>("input").cloned(),
            output: matches.get_one::<PathBuf>("output").cloned(),
            policy,
            describe,
            layout,
            default: matches.get_one::<String>("default").cloned(),
            table_function: parse_identifier(&choice("table-function"), "table-function")?,
            list_function: parse_identifier(&choice("list-function"), "list-function")?,
            placeholder,
            dry_run: matches.get_flag("dry-run"),
            colour: parse_colour(matches.get_one::<String>("colour"))?,
            show_version: matches.get_flag("version"),
        })
    }

    fn into_convert_options(self) -> Result<ConvertOptions> {
        let input = self.input.ok_or_else(|| anyhow!("INPUT path is required"))?;
        let output = self
            .output
            .ok_or_else(|| anyhow!("OUTPUT path is required"))?;
        Ok(ConvertOptions {
            input,
            output,
            policy: self.policy,
            extractor: ExtractorConfig {
                table_function: self.table_function,
                list_function: self.list_function,
                placeholder: self.placeholder,
            },
            describe: self.describe,
            layout: self.layout,
            default: self.default,
            dry_run: self.dry_run,
        })
    }
}

/// Shell function and variable names: a letter or underscore followed by
/// letters, digits or underscores.
fn parse_identifier(value: &str, flag: &str) -> Result<String> {
    let mut chars = value.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(value.to_string())
    } else {
        Err(anyhow!("invalid value for --{flag}: {value:?} is not a shell identifier"))
    }
}

/// Interpret command-line colour overrides, keeping support for
/// human-friendly words like “yes” and “no”.
fn parse_colour(value: Option<&String>) -> Result<Option<bool>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(Some(true)),
            "false" | "no" => Ok(Some(false)),
            other => Err(anyhow!("invalid value for --colour: {other}")),
        },
    }
}
