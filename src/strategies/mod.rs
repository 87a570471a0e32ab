// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

pub mod describe;
pub mod extractor;
pub mod scanner;
pub mod table;

pub use describe::DescribePolicy;
pub use extractor::{ExtractionPolicy, ExtractorConfig, extract};
pub use table::StrategyTable;
