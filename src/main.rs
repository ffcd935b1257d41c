use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phishscore::artifact::ModelArtifact;
use phishscore::classifier::ClassifierKind;
use phishscore::config::Config;
use phishscore::dataset::load_labeled_csv;
use phishscore::domain::Allowlist;
use phishscore::evaluate::evaluate;
use phishscore::predict::{predict_batch, predict_csv};
use phishscore::train::train;

/// URL phishing classifier.
#[derive(Debug, Parser)]
#[command(name = "phishscore", version, about = "URL phishing classifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a model from a labeled CSV (`url`, `label` columns) and save
    /// the artifact.
    Train(TrainArgs),
    /// Evaluate a saved artifact against a labeled holdout CSV.
    Evaluate(EvaluateArgs),
    /// Score a single URL or a CSV batch with a saved artifact.
    Predict(PredictArgs),
}

#[derive(Debug, Parser)]
struct TrainArgs {
    /// Labeled training CSV.
    #[arg(long)]
    data: PathBuf,

    /// Optional validation CSV, scored after fitting.
    #[arg(long)]
    val: Option<PathBuf>,

    /// Classifier to use.
    #[arg(long, default_value = "logreg")]
    clf: String,

    /// Where to write the model artifact.
    #[arg(long)]
    model: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EvaluateArgs {
    /// Labeled holdout CSV.
    #[arg(long)]
    data: PathBuf,

    /// Model artifact to evaluate.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Decision threshold.
    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Debug, Parser)]
struct PredictArgs {
    /// Single URL to score.
    url: Option<String>,

    /// CSV batch input (requires a `url` column).
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Output CSV path for batch mode; prints a preview when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Model artifact to score with.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Decision threshold.
    #[arg(long)]
    threshold: Option<f64>,

    /// Allowlist file of trusted domains (one per line).
    #[arg(long)]
    allowlist: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phishscore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => run_train(args, &config),
        Command::Evaluate(args) => run_evaluate(args, &config),
        Command::Predict(args) => run_predict(args, &config),
    }
}

fn run_train(args: TrainArgs, config: &Config) -> anyhow::Result<()> {
    let kind: ClassifierKind = args.clf.parse()?;
    let model_path = args.model.unwrap_or_else(|| config.model_path.clone());

    let rows = load_labeled_csv(&args.data)?;
    info!("Training with {} ...", kind);
    let (artifact, report) = train(&rows, kind)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(val_path) = args.val {
        let val_rows = load_labeled_csv(&val_path)?;
        let eval = evaluate(&artifact, &val_rows, config.threshold)?;
        println!("Validation accuracy: {:.4}", eval.accuracy);
        println!("{eval}");
    }

    artifact.save(&model_path)?;
    println!("Model saved to {}", model_path.display());
    Ok(())
}

fn run_evaluate(args: EvaluateArgs, config: &Config) -> anyhow::Result<()> {
    let model_path = args.model.unwrap_or_else(|| config.model_path.clone());
    let threshold = args.threshold.unwrap_or(config.threshold);

    let artifact = ModelArtifact::load(&model_path)?;
    let rows = load_labeled_csv(&args.data)?;
    let eval = evaluate(&artifact, &rows, threshold)?;
    println!("{eval}");
    Ok(())
}

fn run_predict(args: PredictArgs, config: &Config) -> anyhow::Result<()> {
    let model_path = args.model.unwrap_or_else(|| config.model_path.clone());
    let threshold = args.threshold.unwrap_or(config.threshold);
    let allowlist_path = args.allowlist.or_else(|| config.allowlist_path.clone());

    let artifact = ModelArtifact::load(&model_path)?;
    let allowlist = Allowlist::load(allowlist_path.as_deref())?;

    if let Some(csv_path) = args.csv {
        predict_csv(
            &artifact,
            &csv_path,
            args.out.as_deref(),
            threshold,
            &allowlist,
        )?;
        return Ok(());
    }

    let Some(url) = args.url else {
        return Err(phishscore::error::invalid_input("provide a URL or --csv <path>").into());
    };

    let records = predict_batch(&artifact, &[url], threshold, &allowlist)?;
    let record = &records[0];
    if record.overridden {
        println!("Prediction: Benign (allowlist: {})", record.domain);
    } else {
        let verdict = if record.predicted_label == 1 {
            "Phishing"
        } else {
            "Benign"
        };
        println!(
            "Prediction: {} (prob={:.4}, threshold={:.2})",
            verdict, record.probability, threshold
        );
    }
    Ok(())
}
