#![allow(missing_docs)]

use std::{
    fs::File,
    io::{self, BufReader, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use serde_json::{json, Map, Value};
use serif_maxent::{
    model::model_path, MaxEntEvent, MaxEntModel, StopCriterion, SymbolTable, TrainMode,
    TrainOptions,
};

mod reader;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model from training vectors and write `<OUTPUT>.maxent`.
    Train(TrainArgs),
    /// Print outcome probabilities for events using a trained model.
    Score(ScoreArgs),
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// Training vectors, one `<count> <outcome> <predicate>*` line per event.
    input: PathBuf,
    /// Prefix of the model file to write.
    #[clap(short, long)]
    output: PathBuf,
    /// Outcomes in model order, defaults to the order of first appearance.
    #[clap(long, value_delimiter = ',')]
    outcomes: Vec<String>,
    #[clap(short, long, default_value = "GIS")]
    mode: TrainMode,
    #[clap(short, long, default_value = "PROBS_CONVERGE")]
    stop_criterion: StopCriterion,
    #[clap(long, default_value = "0")]
    percent_held_out: u32,
    /// Variance of the Gaussian prior for IIS_GAUSSIAN.
    #[clap(long, default_value = "1.0")]
    variance: f64,
    /// Features activated per IIS_FEATURE_SELECTION round.
    #[clap(long, default_value = "1")]
    features_to_add: usize,
    /// Features seen fewer times are pruned before training.
    #[clap(short, long, default_value = "1")]
    pruning_cutoff: u64,
    /// Convergence threshold of the stop criterion.
    #[clap(short, long, default_value = "0.0001")]
    threshold: f64,
    /// Add zero count prior features for the empty predicate.
    #[clap(long)]
    prior_features: bool,
    /// Write the aggregated training events to stderr before training.
    #[clap(long)]
    dump_events: bool,
    #[clap(long)]
    jsonl_output: bool,
}

#[derive(clap::Args, Debug)]
struct ScoreArgs {
    /// Prefix of the model file to read.
    model: PathBuf,
    /// Events, one `<label> <predicate>*` line per event.
    events: PathBuf,
    /// Write the score computation of every outcome to stderr.
    #[clap(long)]
    explain: bool,
    #[clap(long)]
    jsonl_output: bool,
}

fn train(args: TrainArgs) -> color_eyre::Result<()> {
    let mut symbols = SymbolTable::new();
    let input = File::open(&args.input)
        .wrap_err_with(|| format!("opening {}", args.input.display()))?;
    let vectors = reader::read_training_vectors(BufReader::new(input), &mut symbols)?;

    let outcomes = if args.outcomes.is_empty() {
        reader::collect_outcomes(&vectors)
    } else {
        args.outcomes
            .iter()
            .map(|name| symbols.intern(name))
            .collect()
    };
    if outcomes.is_empty() {
        bail!("{} contains no training vectors", args.input.display());
    }
    log::info!(
        "read {} training vectors with {} outcomes",
        vectors.len(),
        outcomes.len()
    );

    let options = TrainOptions {
        mode: args.mode,
        stop_criterion: args.stop_criterion,
        percent_held_out: args.percent_held_out,
        variance: args.variance,
        n_features_to_add: args.features_to_add,
    };
    let mut model = MaxEntModel::new(&outcomes, options)?;
    if args.prior_features {
        model.add_prior_features()?;
    }
    for vector in vectors {
        let event = MaxEntEvent::with_predicates(vector.outcome, vector.predicates);
        model.add_event(&event, vector.count)?;
    }

    if args.dump_events {
        if let Some(events) = model.observed_events() {
            events.dump(&mut io::stderr().lock(), &symbols)?;
        }
    }

    let report = model.derive_model(args.pruning_cutoff, args.threshold)?;
    model.save(&args.output, &symbols)?;

    if args.jsonl_output {
        println!(
            "{}",
            serde_json::to_string(&json!({
                "model": model_path(&args.output).display().to_string(),
                "constant_c": report.constant_c,
                "features": report.n_features,
                "active_features": report.n_active_features,
                "contexts": report.n_contexts,
                "rounds": report.rounds,
                "iterations": report.iterations,
                "held_out_likelihood": report.held_out_likelihood,
                "training_likelihood": report.training_likelihood,
            }))?
        );
    }

    Ok(())
}

fn score(args: ScoreArgs) -> color_eyre::Result<()> {
    let mut symbols = SymbolTable::new();
    let model = MaxEntModel::load(&args.model, &mut symbols)
        .wrap_err_with(|| format!("loading {}", model_path(&args.model).display()))?;
    let input = File::open(&args.events)
        .wrap_err_with(|| format!("opening {}", args.events.display()))?;
    let events = reader::read_events(BufReader::new(input), &mut symbols)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut explain_out = io::stderr().lock();

    for event in events {
        let probabilities = model.probabilities(&event.predicates);
        let best = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(index, _)| symbols.name(model.outcomes()[index]))
            .unwrap_or_default();

        if args.explain {
            let mut scored = MaxEntEvent::with_predicates(event.label, event.predicates);
            for &outcome in model.outcomes() {
                scored.set_outcome(outcome);
                model.score_and_debug(&scored, &mut explain_out, &symbols)?;
            }
        }

        if args.jsonl_output {
            let mut by_outcome = Map::new();
            for (&outcome, &probability) in model.outcomes().iter().zip(probabilities.iter()) {
                by_outcome.insert(symbols.name(outcome).to_owned(), Value::from(probability));
            }
            writeln!(
                out,
                "{}",
                serde_json::to_string(&json!({
                    "line": event.line,
                    "label": symbols.name(event.label),
                    "best": best,
                    "probabilities": by_outcome,
                }))?
            )?;
        } else {
            write!(out, "{} {} {best}", event.line, symbols.name(event.label))?;
            for (&outcome, probability) in model.outcomes().iter().zip(probabilities.iter()) {
                write!(out, " {}={probability:.6}", symbols.name(outcome))?;
            }
            writeln!(out)?;
        }
    }

    Ok(())
}

fn main() -> color_eyre::Result<()> {
    let args = Args::parse();

    color_eyre::install()?;
    serif_logger::setup();

    match args.command {
        Command::Train(args) => train(args),
        Command::Score(args) => score(args),
    }
}
