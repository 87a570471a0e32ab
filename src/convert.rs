// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! One conversion run: read the script, extract, render, write, verify.

use crate::colours::palette;
use crate::ini::{self, Layout, RenderOptions, VerifyError};
use crate::strategies::{self, DescribePolicy, ExtractionPolicy, ExtractorConfig};
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{} not found", .0.display())]
    InputMissing(PathBuf),
    #[error("No strategies found")]
    ExtractionEmpty,
    #[error(transparent)]
    RoundTrip(#[from] VerifyError),
}

/// Everything a run needs, already validated by the CLI layer.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub policy: ExtractionPolicy,
    pub extractor: ExtractorConfig,
    pub describe: DescribePolicy,
    pub layout: Layout,
    pub default: Option<String>,
    pub dry_run: bool,
}

/// Output streams for a run; progress goes to `out`, diagnostics to `err_out`.
pub struct ConvertContext<'a> {
    pub out: &'a mut dyn Write,
    pub err_out: &'a mut dyn Write,
}

pub fn convert(opts: &ConvertOptions, ctx: &mut ConvertContext<'_>) -> Result<()> {
    let colours = palette();

    progress(
        ctx,
        opts,
        &format!(
            "Reading: {}{}{}",
            colours.path,
            opts.input.display(),
            colours.reset
        ),
    )?;
    if !opts.input.exists() {
        return Err(ConvertError::InputMissing(opts.input.clone()).into());
    }
    let content = fs::read_to_string(&opts.input)
        .with_context(|| format!("failed to read {}", opts.input.display()))?;

    progress(ctx, opts, "Parsing strategies...")?;
    let extraction = match strategies::extract(&content, opts.policy, &opts.extractor) {
        Ok(extraction) => extraction,
        Err(err) => {
            warn(ctx, &err.to_string())?;
            return Err(ConvertError::ExtractionEmpty.into());
        }
    };
    for message in &extraction.warnings {
        warn(ctx, message)?;
    }
    if extraction.table.is_empty() {
        return Err(ConvertError::ExtractionEmpty.into());
    }

    let table = &extraction.table;
    progress(
        ctx,
        opts,
        &format!(
            "Found {}{}{} TCP strategies ({} policy)",
            colours.count,
            table.len(),
            colours.reset,
            extraction.policy
        ),
    )?;

    let source_name = opts
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| opts.input.display().to_string());
    let rendered = ini::render(
        table,
        &RenderOptions {
            default: opts.default.as_deref(),
            layout: opts.layout,
            describe: opts.describe,
            source_name: &source_name,
        },
    );
    for message in &rendered.warnings {
        warn(ctx, message)?;
    }
    if let Some(name) = &rendered.default {
        progress(ctx, opts, &format!("Default strategy: {name}"))?;
    }

    if opts.dry_run {
        ini::verify_round_trip(&rendered, &rendered.text).map_err(ConvertError::from)?;
        ctx.out.write_all(rendered.text.as_bytes())?;
        ctx.out.flush()?;
    } else {
        ini::write_atomic(&opts.output, &rendered.text)?;
        let written = fs::read_to_string(&opts.output)
            .with_context(|| format!("failed to re-read {}", opts.output.display()))?;
        ini::verify_round_trip(&rendered, &written).map_err(ConvertError::from)?;
        progress(
            ctx,
            opts,
            &format!(
                "Written {}{}{} strategies to {}{}{}",
                colours.count,
                table.len(),
                colours.reset,
                colours.path,
                opts.output.display(),
                colours.reset
            ),
        )?;
        progress(ctx, opts, "Done!")?;
    }

    Ok(())
}

/// Progress lines are skipped in dry-run mode, where stdout carries the INI text.
fn progress(ctx: &mut ConvertContext<'_>, opts: &ConvertOptions, line: &str) -> io::Result<()> {
    if opts.dry_run {
        return Ok(());
    }
    writeln!(ctx.out, "{line}")
}

fn warn(ctx: &mut ConvertContext<'_>, message: &str) -> io::Result<()> {
    let colours = palette();
    writeln!(ctx.err_out, "{}warning:{} {message}", colours.warning, colours.reset)
}
