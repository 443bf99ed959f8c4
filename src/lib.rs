pub mod cli;
pub mod error;
pub mod export;
pub mod field;
pub mod io_utils;
pub mod learner;
pub mod merge;
pub mod overrides;
pub mod preview;
pub mod resolver;
pub mod session;
pub mod sheet;
pub mod source;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, SourceArgs},
    export::MergeReport,
    learner::PatternTable,
    overrides::MappingOverrides,
    session::Session,
    source::IntakeOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_merge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect(args) => handle_inspect(&args),
        Commands::Learn(args) => handle_learn(&args),
        Commands::Merge(args) => handle_merge(&args),
    }
}

/// Loads the inputs, applies manual overrides and seeds saved patterns.
fn prepare_session(args: &SourceArgs) -> Result<Session> {
    let options = IntakeOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    let mut files = source::load_sources(&args.inputs, &options)?;
    let total_rows = files.iter().map(|f| f.rows.len()).sum::<usize>();
    info!(
        "Loaded {} file(s) with {} row(s); training on the first {}",
        files.len(),
        total_rows,
        args.training_count.min(files.len())
    );

    if let Some(path) = &args.mappings {
        let overrides = MappingOverrides::load(path)
            .with_context(|| format!("Loading mappings from {path:?}"))?;
        let applied = overrides
            .apply(&mut files)
            .with_context(|| format!("Applying mappings from {path:?}"))?;
        debug!("Applied {applied} manual mapping(s)");
    }

    let mut session = Session::new(files, args.training_count)?;
    if let Some(path) = &args.patterns {
        let table = PatternTable::load(path)
            .with_context(|| format!("Loading patterns from {path:?}"))?;
        info!("Seeded {} pattern(s) from {:?}", table.len(), path);
        session.load_patterns(&table);
    }
    Ok(session)
}

fn handle_inspect(args: &cli::InspectArgs) -> Result<()> {
    let mut session = prepare_session(&args.sources)?;
    if args.learn {
        let learned = session.learn_from_mappings();
        info!("Pattern table holds {learned} pattern(s)");
    }
    for source in session.files() {
        info!(
            "{}: {} of {} column(s) mapped",
            source.name,
            source.mapping().mapped_count(),
            source.columns.len()
        );
    }
    print!(
        "{}",
        preview::render_mappings(session.files(), session.training_count())
    );
    Ok(())
}

fn handle_learn(args: &cli::LearnArgs) -> Result<()> {
    let mut session = prepare_session(&args.sources)?;
    let learned = session.learn_from_mappings();
    session
        .patterns()
        .save(&args.output)
        .with_context(|| format!("Writing patterns to {:?}", args.output))?;
    info!("Saved {} pattern(s) to {:?}", learned, args.output);
    Ok(())
}

fn handle_merge(args: &cli::MergeArgs) -> Result<()> {
    let mut session = prepare_session(&args.sources)?;

    if args.learn {
        let learned = session.learn_from_mappings();
        info!("Pattern table holds {learned} pattern(s)");
    }
    if let Some(path) = &args.save_patterns {
        session
            .patterns()
            .save(path)
            .with_context(|| format!("Writing patterns to {path:?}"))?;
    }
    if args.auto_resolve {
        session.set_auto_resolve(true);
    }
    if args.smart_resolve {
        let resolved = session.apply_smart_resolution();
        info!("Heuristics settled {resolved} previously unresolved conflict(s)");
    }
    for decision in &args.resolve {
        session
            .resolve_conflict(decision.index, decision.use_existing)
            .with_context(|| format!("Resolving conflict {}", decision.index))?;
    }

    let outcome = session.outcome();
    if args.preview {
        print!(
            "{}",
            preview::render_merge(
                outcome,
                session.stats(),
                session.auto_resolve_enabled(),
                args.preview_rows
            )
        );
    }

    let today = chrono::Local::now().date_naive();
    let output = export::resolve_output_path(
        args.output.as_deref(),
        args.output_dir.as_deref(),
        today,
    );
    export::write_merged(&output, &outcome.rows, args.include_source)
        .with_context(|| format!("Exporting merged rows to {output:?}"))?;
    if let Some(path) = &args.conflicts {
        export::write_conflicts(path, &outcome.conflicts)
            .with_context(|| format!("Exporting conflicts to {path:?}"))?;
    }
    if let Some(path) = &args.report {
        let report = MergeReport {
            auto_resolve: session.auto_resolve_enabled(),
            rows: &outcome.rows,
            conflicts: &outcome.conflicts,
            stats: session.stats(),
            taught_rules: session.taught_rules(),
        };
        export::write_report(path, &report)
            .with_context(|| format!("Writing report to {path:?}"))?;
    }

    info!(
        "Merge complete: {} row(s), {} conflict(s), {} unresolved",
        outcome.rows.len(),
        outcome.conflicts.len(),
        outcome.unresolved_count()
    );
    Ok(())
}
