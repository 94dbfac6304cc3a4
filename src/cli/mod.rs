//! Command-line surface: commands, prompts and the console reporter

pub mod commands;
pub mod report;
