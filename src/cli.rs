//! CLI argument parsing for Escrutar

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "escrutar")]
#[command(version)]
#[command(about = "Sysdig trace log feature extraction for anomaly detection", long_about = None)]
pub struct Cli {
    /// Enable debug tracing to stderr
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process logs with a growing vocabulary and write a model
    Train(TrainArgs),
    /// Process logs against a frozen vocabulary from a trained model
    Detect(DetectArgs),
}

/// Parsing options shared by both commands
#[derive(Args, Debug)]
pub struct ParseOpts {
    /// Fail on unparseable argument remainders instead of discarding them
    #[arg(long)]
    pub strict: bool,

    /// Event types to drop (repeatable)
    #[arg(long = "exclude", value_name = "EVENT", default_values = ["switch"])]
    pub exclude: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Log files to process, in order
    #[arg(required = true, value_name = "LOG")]
    pub logs: Vec<PathBuf>,

    /// Where to write the trained vocabulary model
    #[arg(short, long, value_name = "FILE")]
    pub model: PathBuf,

    /// Where to write the matrices JSON (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Feature families to enable (comma separated: option-arg, fd)
    #[arg(
        long,
        value_name = "FEATURES",
        value_delimiter = ',',
        default_value = "option-arg,fd"
    )]
    pub features: Vec<String>,

    #[command(flatten)]
    pub parse: ParseOpts,
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Log files to process, in order
    #[arg(required = true, value_name = "LOG")]
    pub logs: Vec<PathBuf>,

    /// Trained vocabulary model from a previous `train` run
    #[arg(short, long, value_name = "FILE")]
    pub model: PathBuf,

    /// Where to write the matrices JSON (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub parse: ParseOpts,
}
