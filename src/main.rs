use anyhow::{Context, Result};
use clap::Parser;
use escrutar::cli::{Cli, Command, DetectArgs, ParseOpts, TrainArgs};
use escrutar::counter::FreqCounter;
use escrutar::json_output::JsonOutput;
use escrutar::model::VocabularyModel;
use escrutar::pipeline::{LogFeature, PipelineConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Parse the `--features` list into feature families
fn parse_features(features: &[String]) -> Result<Vec<LogFeature>> {
    features
        .iter()
        .map(|f| f.parse::<LogFeature>().map_err(anyhow::Error::msg))
        .collect()
}

/// Assemble a pipeline configuration from shared CLI options
fn pipeline_config(parse: &ParseOpts, features: Vec<LogFeature>) -> PipelineConfig {
    PipelineConfig::new()
        .with_strict_args(parse.strict)
        .with_excluded_events(parse.exclude.iter().cloned())
        .with_features(features)
}

/// Run every log through the pipeline, then materialize all matrices
///
/// Accumulation over the whole batch completes before materialization, so
/// training-mode vocabulary growth cannot skew matrix extents across files.
fn process_logs(
    config: &PipelineConfig,
    counter: &mut FreqCounter,
    logs: &[PathBuf],
    training: bool,
) -> Result<JsonOutput> {
    let pipeline = config.build_pipeline();

    let mut summaries = Vec::with_capacity(logs.len());
    for path in logs {
        let events = pipeline
            .events(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let summary = counter
            .accumulate(events, training)
            .with_context(|| format!("failed to process {}", path.display()))?;
        summaries.push(summary);
    }

    let mut output = JsonOutput::new(counter);
    for (path, matrix) in logs.iter().zip(counter.count_freq(summaries)) {
        output.add_matrix(path.display().to_string(), &matrix?);
    }
    Ok(output)
}

/// Write the matrices document to a file or stdout
fn write_output(output: &JsonOutput, path: Option<&PathBuf>) -> Result<()> {
    let json = output.to_json()?;
    match path {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    let features = parse_features(&args.features)?;
    let config = pipeline_config(&args.parse, features);
    let mut counter = FreqCounter::new(config.build_generators()?);

    let output = process_logs(&config, &mut counter, &args.logs, true)?;
    write_output(&output, args.output.as_ref())?;

    VocabularyModel::from_counter(&counter)
        .save(&args.model)
        .with_context(|| format!("failed to write model {}", args.model.display()))?;
    Ok(())
}

fn run_detect(args: DetectArgs) -> Result<()> {
    let model = VocabularyModel::load(&args.model)
        .with_context(|| format!("failed to load model {}", args.model.display()))?;
    let features = parse_features(&model.feature_generators)?;
    let config = pipeline_config(&args.parse, features);
    let mut counter = model.into_counter(config.build_generators()?)?;

    let output = process_logs(&config, &mut counter, &args.logs, false)?;
    write_output(&output, args.output.as_ref())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    match args.command {
        Command::Train(train) => run_train(train),
        Command::Detect(detect) => run_detect(detect),
    }
}
