// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Terminal helpers shared by the CLI commands

pub mod progress;
pub mod style;

pub use progress::{points_bar, spinner};
pub use style::{format_args_list, format_value, print_section, print_status, Status};
