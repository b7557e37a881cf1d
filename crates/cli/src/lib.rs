// m204-cli: command-line console for the M204 to COBOL migration backend.

pub mod archive;
pub mod cache;
pub mod client;
pub mod commands;
pub mod config;
pub mod exit_code;
pub mod output;
pub mod poll;
pub mod preflight;
