use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use aviation_features::pipeline::select::parse_timestamp;
use aviation_features::utils::logging::{
    create_spinner, create_stage_progress_bar, finish_progress_bar,
};
use aviation_features::{
    DEFAULT_TEST_FRACTION, FeatureTable, Pipeline, PipelineConfig, RegressionMetrics,
    TrainingSet, read_table,
};
use chrono::DateTime;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "aviation-features",
    version,
    about = "Preprocess aviation incident records into model-ready Parquet tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the preprocessing pipeline and write the feature, label and mapping tables
    Preprocess(PreprocessArgs),
    /// Print one row of a feature table as JSON
    Lookup(LookupArgs),
    /// Assemble the training set from written tables and log its statistics
    TrainingSummary(SummaryArgs),
}

#[derive(Args, Debug, Clone)]
struct PreprocessArgs {
    /// Raw incident CSV
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Encode with the mappings of a previous run
    #[arg(long = "reuse-mappings")]
    reuse_mappings: bool,

    /// Field delimiter of the input
    #[arg(long = "delimiter")]
    delimiter: Option<char>,
}

#[derive(Args, Debug, Clone)]
struct LookupArgs {
    /// Feature table written by `preprocess`
    #[arg(long = "features")]
    features: PathBuf,

    /// Event identifier to look up
    #[arg(long = "id")]
    id: String,
}

#[derive(Args, Debug, Clone)]
struct SummaryArgs {
    /// Output directory of a `preprocess` run
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Share of rows held out for testing
    #[arg(long = "test-fraction", default_value_t = DEFAULT_TEST_FRACTION)]
    test_fraction: f64,

    /// Seed of the train/test shuffle
    #[arg(long = "seed", default_value_t = 42)]
    seed: u64,

    /// Hold out incidents with an event timestamp after this date or time
    #[arg(long = "cutoff")]
    cutoff: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Preprocess(args) => run_preprocess(args),
        Command::Lookup(args) => run_lookup(&args),
        Command::TrainingSummary(args) => run_training_summary(&args),
    }
}

/// Defaults, then the JSON file, then the environment
fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config
        .with_env_overrides()
        .context("Invalid configuration from environment")
}

fn run_preprocess(args: PreprocessArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(delimiter) = args.delimiter {
        config
            .set_delimiter(delimiter)
            .context("Invalid --delimiter")?;
    }
    config.reuse_mappings |= args.reuse_mappings;

    info!(
        "Preprocessing {} into {}",
        config.input.display(),
        config.output_dir.display()
    );

    let pb = create_stage_progress_bar(aviation_features::pipeline::STAGE_COUNT);
    let pipeline = Pipeline::new(config)
        .context("Invalid pipeline configuration")?
        .with_progress(pb.clone());

    let output = match pipeline.run() {
        Ok(output) => output,
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e).context("Preprocessing failed, no output was written");
        }
    };
    finish_progress_bar(&pb, Some("done"));

    info!("Feature table: {}", output.features_path.display());
    info!("Label table: {}", output.labels_path.display());
    info!("Mapping tables: {}", output.mapping_paths.len());
    info!(
        "Filled {} missing values, {} incidents with undefined ratio",
        output.imputation.total_filled(),
        output.label_summary.undefined
    );
    for (column, count) in &output.unseen {
        warn!("{count} unseen values in {column} were encoded as -1");
    }
    Ok(())
}

fn run_lookup(args: &LookupArgs) -> Result<()> {
    let spinner = create_spinner(Some("Loading feature table"));
    let table = FeatureTable::open(&args.features)
        .with_context(|| format!("Failed to open {}", args.features.display()))?;
    finish_progress_bar(&spinner, None);

    match table.get(&args.id)? {
        Some(row) => {
            println!("{}", serde_json::to_string_pretty(&row)?);
            Ok(())
        }
        None => bail!("No incident with Event_Id '{}'", args.id),
    }
}

fn run_training_summary(args: &SummaryArgs) -> Result<()> {
    let start = Instant::now();
    let mut config = load_config(args.config.as_ref())?;
    if let Some(output) = &args.output {
        config.output_dir.clone_from(output);
    }

    let cutoff = match &args.cutoff {
        Some(text) => {
            let micros = parse_timestamp(text)
                .with_context(|| format!("Unrecognised --cutoff '{text}'"))?;
            let cutoff = DateTime::from_timestamp_micros(micros)
                .with_context(|| format!("--cutoff '{text}' is out of range"))?;
            Some(cutoff)
        }
        None => None,
    };

    let spinner = create_spinner(Some("Assembling training set"));
    let features = read_table(&config.features_path())
        .with_context(|| format!("Failed to read {}", config.features_path().display()))?;
    let labels = read_table(&config.labels_path())
        .with_context(|| format!("Failed to read {}", config.labels_path().display()))?;
    let set = TrainingSet::assemble_until(&features, &labels, cutoff)?;
    finish_progress_bar(&spinner, None);

    info!(
        "{} of {} incidents have a defined fatality ratio",
        set.len(),
        labels.num_rows()
    );
    if let Some((mean, min, max)) = set.target_stats() {
        info!("Fatality ratio: mean {mean:.4}, min {min:.4}, max {max:.4}");
    }
    if let Some(cutoff) = cutoff {
        info!(
            "{} incidents after {} held out as unseen data",
            set.held_out.len(),
            cutoff.to_rfc3339()
        );
    }
    info!("Model inputs: {}", set.feature_names.join(", "));

    if set.len() < 2 {
        warn!("Too few labelled incidents to split");
        return Ok(());
    }

    let (train, test) = set.train_test_split(args.test_fraction, args.seed)?;
    info!(
        "Split with seed {}: {} training rows, {} test rows",
        args.seed,
        train.len(),
        test.len()
    );

    // Mean-of-training-targets baseline
    if let Some((train_mean, _, _)) = train.target_stats() {
        let predicted = vec![train_mean; test.len()];
        let metrics = RegressionMetrics::compute(&predicted, &test.targets)?;
        info!(
            "Baseline on test rows: MSE {:.5}, RMSE {:.5}, MAE {:.5}, R2 {}",
            metrics.mse,
            metrics.rmse,
            metrics.mae,
            metrics
                .r2
                .map_or_else(|| "undefined".to_string(), |r2| format!("{r2:.4}"))
        );
    }

    info!("Training summary finished in {:?}", start.elapsed());
    Ok(())
}
