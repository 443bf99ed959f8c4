use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{preview::PREVIEW_ROW_LIMIT, session::DEFAULT_TRAINING_COUNT};

#[derive(Debug, Parser)]
#[command(author, version, about = "Merge contact spreadsheets keyed by phone number", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show how every column of every input maps onto the standard fields
    Inspect(InspectArgs),
    /// Learn column patterns from the training files and save them
    Learn(LearnArgs),
    /// Merge inputs on phone number, resolve conflicts and export the result
    Merge(MergeArgs),
}

/// Inputs plus everything that decides their column mappings.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Input files (.xlsx, .xls, .xlsm, .xlsb, .ods, .csv, .tsv) in upload order
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Number of leading files whose mappings are treated as confirmed training data
    #[arg(long = "training-count", default_value_t = DEFAULT_TRAINING_COUNT, value_parser = parse_training_count)]
    pub training_count: usize,
    /// YAML file of manual column mappings applied before learning
    #[arg(long = "mappings")]
    pub mappings: Option<PathBuf>,
    /// Previously saved pattern table to seed learning with
    #[arg(long = "patterns")]
    pub patterns: Option<PathBuf>,
    /// CSV delimiter for delimited inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Learn from the training files and auto-map the rest before printing
    #[arg(long)]
    pub learn: bool,
}

#[derive(Debug, Args)]
pub struct LearnArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Destination YAML file for the learned pattern table
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Learn from the training files and auto-map the rest before merging
    #[arg(long)]
    pub learn: bool,
    /// Save the pattern table after learning
    #[arg(long = "save-patterns")]
    pub save_patterns: Option<PathBuf>,
    /// Resolve conflicts automatically while merging
    #[arg(long = "auto-resolve")]
    pub auto_resolve: bool,
    /// Apply heuristics to unresolved conflicts, then re-merge with auto-resolve on
    #[arg(long = "smart-resolve")]
    pub smart_resolve: bool,
    /// Manual decisions of the form `INDEX=existing` or `INDEX=new`
    #[arg(long = "resolve", value_parser = parse_decision, action = clap::ArgAction::Append)]
    pub resolve: Vec<ConflictDecision>,
    /// Output file (.xlsx, .csv or .tsv); defaults to merged_data_<date>.xlsx
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Directory for the default output file name
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Add the source file name as the last output column
    #[arg(long = "include-source")]
    pub include_source: bool,
    /// Write a CSV report of every conflict
    #[arg(long = "conflicts")]
    pub conflicts: Option<PathBuf>,
    /// Write a JSON report of rows, conflicts, statistics and taught rules
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
    /// Print the merged preview, statistics and conflicts to stdout
    #[arg(long)]
    pub preview: bool,
    /// Maximum merged rows shown in the preview
    #[arg(long = "preview-rows", default_value_t = PREVIEW_ROW_LIMIT)]
    pub preview_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictDecision {
    pub index: usize,
    pub use_existing: bool,
}

pub fn parse_decision(value: &str) -> Result<ConflictDecision, String> {
    let (index, side) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected INDEX=existing|new, got '{value}'"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("Invalid conflict index '{}'", index.trim()))?;
    let use_existing = match side.trim().to_ascii_lowercase().as_str() {
        "existing" | "old" => true,
        "new" => false,
        other => return Err(format!("Unknown side '{other}' (use existing or new)")),
    };
    Ok(ConflictDecision {
        index,
        use_existing,
    })
}

pub fn parse_training_count(value: &str) -> Result<usize, String> {
    let count = value
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("Invalid training count '{value}'"))?;
    if count == 0 {
        Err("Training count must be at least 1".to_string())
    } else {
        Ok(count)
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() || !first.is_ascii() {
                return Err("Delimiter must be a single ASCII character".to_string());
            }
            Ok(first as u8)
        }
    }
}
