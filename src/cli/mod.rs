//! Command-line interface for training, prediction and data inspection.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::inference::PredictPipeline;
use crate::pipeline::TrainingPipeline;
use crate::schema::{AccidentRecord, FeatureSchema};
use crate::training::TrainingReport;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "accident-severity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and serve accident severity classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search every model family and persist the best one
    Train(TrainArgs),

    /// Predict severity with the persisted artifacts
    Predict(PredictArgs),

    /// Show data information
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Options shared by commands that read or write artifacts
#[derive(Args, Debug, Clone, Default)]
pub struct ArtifactArgs {
    /// Artifact directory (overrides SEVERITY_ARTIFACT_DIR)
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Training CSV file
    #[arg(long)]
    pub train: PathBuf,

    /// Held-out test CSV file
    #[arg(long)]
    pub test: PathBuf,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Minimum held-out accuracy for the winning model
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Number of stratified cross-validation folds
    #[arg(long)]
    pub cv_folds: Option<usize>,

    /// Random seed for every stochastic model
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads for grid search
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Per-candidate search budget in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Keep the preprocessor when no model is accepted
    #[arg(long)]
    pub keep_preprocessor: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PredictArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// CSV file of records to score (instead of the field flags)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub weather: Option<String>,
    #[arg(long)]
    pub road_condition: Option<String>,
    #[arg(long)]
    pub time_of_day: Option<String>,
    #[arg(long)]
    pub traffic: Option<String>,
    #[arg(long)]
    pub accident_type: Option<String>,
    #[arg(long)]
    pub vehicle_type: Option<String>,
    #[arg(long)]
    pub accident_reason: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Print predictions as JSON
    #[arg(long)]
    pub json: bool,
}

impl PredictArgs {
    /// The single record described by the field flags, if any flag is set
    pub fn record(&self) -> Option<AccidentRecord> {
        let record = AccidentRecord {
            weather: self.weather.clone(),
            road_condition: self.road_condition.clone(),
            time_of_day: self.time_of_day.clone(),
            traffic: self.traffic.clone(),
            accident_type: self.accident_type.clone(),
            vehicle_type: self.vehicle_type.clone(),
            accident_reason: self.accident_reason.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        };
        (record != AccidentRecord::default()).then_some(record)
    }
}

/// Environment configuration with command-line overrides applied
pub fn resolve_config(artifacts: &ArtifactArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(dir) = &artifacts.artifacts {
        config.artifact_dir = dir.clone();
    }
    Ok(config)
}

fn train_config(args: &TrainArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = resolve_config(&args.artifacts)?;
    if let Some(threshold) = args.threshold {
        config = config.with_acceptance_threshold(threshold);
    }
    if let Some(folds) = args.cv_folds {
        config = config.with_cv_folds(folds);
    }
    if let Some(seed) = args.seed {
        config = config.with_random_state(seed);
    }
    if let Some(jobs) = args.jobs {
        config = config.with_n_jobs(jobs);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_candidate_timeout(Duration::from_secs(secs));
    }
    config = config.with_rollback_on_rejection(!args.keep_preprocessor);
    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    let config = train_config(args)?;
    let pipeline = TrainingPipeline::new(config);

    if args.json {
        let report = pipeline.run(&args.train, &args.test)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    section("Train");
    println!("  {:<16} {}", muted("Train"), args.train.display());
    println!("  {:<16} {}", muted("Test"), args.test.display());
    println!("  {:<16} {}", muted("Artifacts"), pipeline.config().artifact_dir.display());
    println!("  {:<16} {}", muted("Candidates"), pipeline.candidates().len());
    println!();

    step_run("Searching model families");
    let start = Instant::now();
    let report = pipeline.run(&args.train, &args.test)?;
    step_done(&format!("{:.1}s", start.elapsed().as_secs_f64()));

    print_candidates(&report);
    print_summary(&report);
    println!("{}", report.classification_report);
    Ok(())
}

fn print_candidates(report: &TrainingReport) {
    section("Candidates");
    println!(
        "  {:<24} {:>8} {:>8} {:>8}",
        muted("Model"),
        muted("CV"),
        muted("Test"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(52)));
    for c in &report.candidates {
        let name = if c.name == report.best_model {
            format!("{:<24}", c.name).green().bold()
        } else {
            format!("{:<24}", c.name).normal()
        };
        println!(
            "  {} {:>8.4} {:>8.4} {:>7.1}s",
            name, c.cv_score, c.test_accuracy, c.elapsed_secs
        );
    }
    for name in &report.skipped {
        println!("  {:<24} {}", name, "timed out".yellow());
    }
}

fn print_summary(report: &TrainingReport) {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Best Model".white().bold()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Model    ", &report.best_model));
    line_box(&kv("Accuracy ", &format!("{:.4}", report.accuracy)));
    line_box(&kv("Saved to ", &report.model_path.display().to_string()));
    line_box_empty();
    line_box_bottom();
    println!();
}

pub fn cmd_predict(args: &PredictArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args.artifacts)?;
    let pipeline = PredictPipeline::load(&config)?;

    let labels = match (&args.input, args.record()) {
        (Some(path), _) => {
            let df = DataLoader::new().load_csv(path)?;
            pipeline.predict_frame(&df)?
        }
        (None, Some(record)) => pipeline.predict(&[record])?,
        (None, None) => anyhow::bail!("Provide --input <csv> or at least one feature flag"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&labels)?);
        return Ok(());
    }

    section("Predict");
    println!("  {:<16} {}", muted("Model"), pipeline.model_name());
    println!("  {:<16} {}", muted("Classes"), pipeline.classes().join(", "));
    println!();
    if labels.len() == 1 {
        println!("  {:<16} {}", muted("Severity"), labels[0].white().bold());
    } else {
        for (i, label) in labels.iter().enumerate() {
            println!("  {:>6}  {}", dim(&i.to_string()), label);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let info = DataLoader::new().get_file_info(data_path)?;

    println!("  {:<12} {}", muted("File"), info.path);
    println!("  {:<12} {}", muted("Rows"), info.n_rows);
    println!("  {:<12} {}", muted("Columns"), info.n_cols);
    println!("  {:<12} {:.2} MB", muted("Size"), info.file_size as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in &info.columns {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name,
            col.dtype.truecolor(140, 140, 140),
            col.null_count,
            col.n_unique.unwrap_or(0)
        );
    }

    let schema = FeatureSchema::accident();
    let missing: Vec<&str> = schema
        .feature_columns()
        .into_iter()
        .chain(std::iter::once(schema.target.as_str()))
        .filter(|c| info.column(c).is_none())
        .collect();
    println!();
    if missing.is_empty() {
        println!("  {} {}", ok("✓"), "all accident columns present");
    } else {
        println!("  {} missing: {}", "!".yellow(), missing.join(", "));
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train() {
        let cli = Cli::try_parse_from([
            "accident-severity", "train", "--train", "a.csv", "--test", "b.csv",
            "--threshold", "0.7", "--cv-folds", "3", "--timeout-secs", "60", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.train, PathBuf::from("a.csv"));
                assert_eq!(args.threshold, Some(0.7));
                assert_eq!(args.cv_folds, Some(3));
                assert!(args.json);
                assert!(!args.keep_preprocessor);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_predict_record_from_flags() {
        let cli = Cli::try_parse_from([
            "accident-severity", "predict", "--weather", "Rainy", "--latitude", "-33.9", "--longitude", "151.2",
        ])
        .unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };
        let record = args.record().unwrap();
        assert_eq!(record.weather.as_deref(), Some("Rainy"));
        assert_eq!(record.latitude, Some(-33.9));
        assert!(record.traffic.is_none());

        assert!(PredictArgs::default().record().is_none());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }
}
