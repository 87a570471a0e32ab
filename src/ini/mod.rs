// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

pub mod reader;
pub mod verify;
pub mod writer;

pub use verify::{VerifyError, verify_round_trip};
pub use writer::{Layout, RenderOptions, render, write_atomic};
