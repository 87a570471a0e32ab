// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use std::sync::atomic::{AtomicBool, Ordering};

/// ANSI colour palette for diagnostics. The fields hold the SGR sequences for each role.
#[derive(Clone, Copy)]
pub struct ColourPalette {
    pub reset: &'static str,
    pub warning: &'static str,
    pub error: &'static str,
    pub path: &'static str,
    pub count: &'static str,
}

const COLOURED: ColourPalette = ColourPalette {
    reset: "\u{001b}[0m",
    warning: "\u{001b}[33m",
    error: "\u{001b}[31m",
    path: "\u{001b}[95m",
    count: "\u{001b}[38;5;81m",
};

const PLAIN: ColourPalette = ColourPalette {
    reset: "",
    warning: "",
    error: "",
    path: "",
    count: "",
};

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Return the current colour palette, respecting the global enable/disable flag.
pub fn palette() -> ColourPalette {
    if ENABLED.load(Ordering::Relaxed) {
        COLOURED
    } else {
        PLAIN
    }
}

/// Disable ANSI colour output globally (used when piping or when explicitly requested).
pub fn disable_colours() {
    ENABLED.store(false, Ordering::Relaxed);
}
