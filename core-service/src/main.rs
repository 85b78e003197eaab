//! Severe Injury Risk Predictor - Command Line Entry Point

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crash_risk_core::constants;
use crash_risk_core::logic::codes::CodeTableView;
use crash_risk_core::logic::config::ExplainSwitch;
use crash_risk_core::{Decision, DecisionThreshold, FormInput, Predictor};

#[derive(Debug, Parser)]
#[command(
    name = "crash-risk",
    version,
    about = "Severe injury risk from crash-report fields",
    long_about = "Scores one crash record with the fitted severe-injury model.\n\n\
        Commands:\n  \
        predict  Score a record and print the JSON report\n  \
        decide   Relabel a stored probability against a threshold\n  \
        codes    Print the code dictionaries"
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score a record and print the JSON report
    Predict(PredictArgs),
    /// Relabel a probability without re-scoring
    Decide(DecideArgs),
    /// Print every code dictionary
    Codes,
}

#[derive(Debug, Args)]
struct PredictArgs {
    /// JSON form input (`-` for stdin); omitted fields take their defaults
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Decision threshold in [0.01, 0.99]
    #[arg(short, long, default_value_t = constants::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Model file (defaults to CRASH_RISK_MODEL_PATH or the bundled model)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Number of contributions to keep
    #[arg(long)]
    top_n: Option<usize>,

    /// Skip the local explanation
    #[arg(long)]
    no_explain: bool,
}

#[derive(Debug, Args)]
struct DecideArgs {
    #[arg(short, long)]
    probability: f64,

    #[arg(short, long, default_value_t = constants::DEFAULT_THRESHOLD)]
    threshold: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match cli.command {
        Command::Predict(args) => predict(args),
        Command::Decide(args) => decide(args),
        Command::Codes => codes(),
    }
}

fn read_input(path: Option<&PathBuf>) -> Result<FormInput> {
    let Some(path) = path else {
        return Ok(FormInput::default());
    };

    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input {}", path.display()))?
    };

    parse_input(&text)
}

/// Partial JSON; omitted fields take their defaults
fn parse_input(text: &str) -> Result<FormInput> {
    serde_json::from_str(text).context("Invalid form input JSON")
}

fn predict(args: PredictArgs) -> Result<()> {
    let threshold = DecisionThreshold::new(args.threshold)?;
    let input = read_input(args.input.as_ref())?;

    if args.no_explain {
        ExplainSwitch::set(false);
    }

    let model_path = args
        .model
        .unwrap_or_else(|| PathBuf::from(constants::get_model_path()));
    let mut predictor = Predictor::from_path(&model_path)
        .with_context(|| format!("Cannot start without a model (tried {})", model_path.display()))?;
    if let Some(n) = args.top_n {
        predictor = predictor.with_top_n(n);
    }

    let report = predictor.predict(&input, threshold)?;
    if let Some(warning) = &report.confidence.warning {
        eprintln!("warning: {}", warning);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn decide(args: DecideArgs) -> Result<()> {
    let decision = relabel(args.probability, args.threshold)?;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn relabel(probability: f64, threshold: f64) -> Result<Decision> {
    if !(0.0..=1.0).contains(&probability) {
        anyhow::bail!("Probability {} outside [0, 1]", probability);
    }
    Ok(Decision::new(probability, DecisionThreshold::new(threshold)?))
}

fn codes() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&CodeTableView::all())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crash_risk_core::RiskLabel;
    use std::io::Write;

    #[test]
    fn test_partial_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"AGE_IM": 64, "REST_USE": 7}}"#).unwrap();

        let input = read_input(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(input.age_im, 64);
        assert_eq!(input.rest_use, 7);
        assert_eq!(input.hour_acc, FormInput::default().hour_acc);
        assert_eq!(read_input(None).unwrap(), FormInput::default());
    }

    #[test]
    fn test_out_of_range_json_is_rejected_before_scoring() {
        let input = parse_input(r#"{"AGE_IM": 500, "SEX_IM": 42}"#).unwrap();
        let err = input.validate().unwrap_err();
        assert_eq!(err.field_names(), vec!["AGE_IM", "SEX_IM"]);

        assert!(parse_input("not json").is_err());
    }

    #[test]
    fn test_relabel_bounds() {
        assert_eq!(relabel(0.25, 0.25).unwrap().label, RiskLabel::High);
        assert_eq!(relabel(0.2499, 0.25).unwrap().label, RiskLabel::Low);
        assert!(relabel(1.2, 0.25).is_err());
        assert!(relabel(-0.1, 0.25).is_err());
        assert!(relabel(0.5, 1.0).is_err());
    }

    #[test]
    fn test_predict_flags_parse() {
        let cli = Cli::try_parse_from([
            "crash-risk", "predict", "--input", "-", "--top-n", "5", "--no-explain", "-t", "0.4",
        ])
        .unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.input, Some(PathBuf::from("-")));
        assert_eq!(args.top_n, Some(5));
        assert!(args.no_explain);
        assert_eq!(args.threshold, 0.4);
    }

    #[test]
    fn test_codes_serialize_every_table() {
        let json = serde_json::to_value(CodeTableView::all()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 12);
        assert_eq!(json[0]["column"], "SEX_IM");
        assert_eq!(json[0]["entries"][0]["label"], "Male");
    }
}
