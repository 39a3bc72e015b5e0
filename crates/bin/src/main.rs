//! Orientation CLI binary.
//!
//! Trains the sector model, predicts for student records and manages the
//! store of enrolled students.

mod store;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use orientation::{ArtifactKind, OrientationService, ServiceConfig, StudentIntake};
use orientation_data::{
    FeatureKind, FeatureSchema, FeatureValue, LabeledStudent, StudentRecord, StudentStore,
};
use orientation_model::FittedPipeline;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "orientation")]
#[command(about = "Orientation: predicts a professional activity sector from a baccalaureate record", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Training dataset CSV (overrides ORIENTATION_DATASET)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Model artifact JSON (overrides ORIENTATION_ARTIFACT)
    #[arg(long, global = true)]
    artifact: Option<PathBuf>,

    /// Sector answered when no prediction can be made
    #[arg(long, global = true)]
    fallback: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the model and print its evaluation
    Train {
        /// Number of trees
        #[arg(long)]
        trees: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Share of each class held out for evaluation
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Write the trained model to the artifact path
        #[arg(long)]
        save: bool,
    },

    /// Predict the sector of a JSON student record (file or stdin)
    Predict {
        /// JSON file; reads stdin when absent
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Validate, predict and store a JSON student record
    Enroll {
        /// JSON file; reads stdin when absent
        #[arg(long)]
        input: Option<PathBuf>,

        /// Student database (defaults to the platform data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show feature importance of the model
    Importance {
        /// Number of features to show
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Inspect enrolled students
    Students {
        #[command(subcommand)]
        action: StudentsCommand,

        /// Student database (defaults to the platform data directory)
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },

    /// List the input features
    Schema,
}

#[derive(Subcommand)]
enum StudentsCommand {
    /// List students
    List {
        /// Students to skip
        #[arg(long, default_value = "0")]
        skip: usize,

        /// Maximum number of students
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Show one student
    Get {
        /// Student identifier
        id: i64,
    },

    /// Write every student as a training CSV
    Export {
        /// Output file; writes stdout when absent
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = cli.format;
    match cli.command {
        Commands::Train {
            trees,
            seed,
            test_fraction,
            save,
        } => {
            let mut config = build_config(&cli.dataset, &cli.artifact, &cli.fallback)?;
            if let Some(trees) = trees {
                config.training.forest.n_trees = trees;
            }
            if let Some(seed) = seed {
                config.training.forest.seed = seed;
            }
            if let Some(fraction) = test_fraction {
                config.training.test_fraction = fraction;
            }
            config.persist_artifact |= save;
            train(config, format)?;
        }
        Commands::Predict { input } => {
            let config = build_config(&cli.dataset, &cli.artifact, &cli.fallback)?;
            predict(config, input.as_deref(), format)?;
        }
        Commands::Enroll { input, db } => {
            let config = build_config(&cli.dataset, &cli.artifact, &cli.fallback)?;
            enroll(config, input.as_deref(), db.as_deref(), format)?;
        }
        Commands::Importance { top } => {
            let config = build_config(&cli.dataset, &cli.artifact, &cli.fallback)?;
            importance(config, top, format)?;
        }
        Commands::Students { action, db } => {
            students(action, db.as_deref(), format)?;
        }
        Commands::Schema => show_schema(format)?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(level));
}

fn build_config(
    dataset: &Option<PathBuf>,
    artifact: &Option<PathBuf>,
    fallback: &Option<String>,
) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let mut config = ServiceConfig::from_env()?;
    if let Some(path) = dataset {
        config.dataset_path = path.clone();
    }
    if let Some(path) = artifact {
        config.artifact_path = Some(path.clone());
    }
    if let Some(label) = fallback {
        config.fallback_sector = label.clone();
    }
    debug!("Configuration: {:?}", config);
    Ok(config)
}

fn spinner(message: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}

/// Publish a model, showing a spinner while it loads or trains.
fn warm_up(service: &OrientationService) -> Result<ArtifactKind, Box<dyn std::error::Error>> {
    let pb = spinner("Loading model...")?;
    let kind = service.warm_up();
    match kind {
        ArtifactKind::Fitted => pb.finish_with_message("Model ready"),
        _ => pb.finish_with_message(format!(
            "No model available; answering {}",
            service.fallback()
        )),
    }
    Ok(kind)
}

fn read_input(input: Option<&Path>) -> Result<String, Box<dyn std::error::Error>> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    Ok(text)
}

fn train(config: ServiceConfig, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = config.dataset_path.clone();
    let service = OrientationService::new(config)?;

    let pb = spinner(&format!("Training on {}...", dataset.display()))?;
    if let Err(e) = service.retrain() {
        pb.finish_with_message("Failed!");
        return Err(format!("Training failed ({}): {}", e.kind(), e).into());
    }
    pb.finish_with_message("Training complete");

    let pipeline = service
        .pipeline()
        .ok_or("training finished without a published model")?;
    print_training_summary(&pipeline, service.config(), format)
}

fn print_training_summary(
    pipeline: &FittedPipeline,
    config: &ServiceConfig,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let importance = pipeline.feature_importance();

    if format == Format::Json {
        let output = json!({
            "trained_at": pipeline.trained_at().to_rfc3339(),
            "classes": pipeline.classes(),
            "train_rows": pipeline.n_train(),
            "config": pipeline.config(),
            "report": pipeline.report(),
            "feature_importance": importance,
            "artifact": config.artifact_path.as_ref().filter(|_| config.persist_artifact),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("\nORIENTATION MODEL");
    println!("═════════════════\n");
    println!("  Trained at:   {}", pipeline.trained_at().to_rfc3339());
    println!("  Train rows:   {}", pipeline.n_train());
    println!("  Trees:        {}", pipeline.config().forest.n_trees);
    println!("  Classes:      {}", pipeline.classes().join(", "));
    if config.persist_artifact
        && let Some(path) = &config.artifact_path
    {
        println!("  Artifact:     {}", path.display());
    }
    println!();

    match pipeline.report() {
        Some(report) => println!("{}", report),
        None => println!("  (no evaluation rows)\n"),
    }

    println!("Top features:");
    for (name, weight) in importance.top(10) {
        println!("  {:28} {:6.2}%", name, weight * 100.0);
    }
    Ok(())
}

fn predict(
    config: ServiceConfig,
    input: Option<&Path>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = read_input(input)?;
    let values: BTreeMap<String, Option<FeatureValue>> = serde_json::from_str(&text)?;

    let service = OrientationService::new(config)?;
    let kind = warm_up(&service)?;
    let sector = service.predict_values(values);

    if format == Format::Json {
        let output = json!({
            "Secteur_Activite": sector,
            "model": kind,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Predicted sector: {}", sector);
    }
    Ok(())
}

fn enroll(
    config: ServiceConfig,
    input: Option<&Path>,
    db: Option<&Path>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = read_input(input)?;
    let record: StudentRecord = serde_json::from_str(&text)?;

    let service = Arc::new(OrientationService::new(config)?);
    warm_up(&service)?;
    let intake = StudentIntake::new(service, store::open_store(db)?);
    let student = intake.enroll(record)?;

    print_student(&student, format)
}

fn importance(
    config: ServiceConfig,
    top: usize,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = OrientationService::new(config)?;
    warm_up(&service)?;
    let importance = service.get_feature_importance();

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&importance)?);
        return Ok(());
    }

    if importance.is_empty() {
        println!("No fitted model available.");
        return Ok(());
    }
    println!("Feature importance:");
    for (i, (name, weight)) in importance.top(top).iter().enumerate() {
        println!("  {:2}. {:28} {:6.2}%", i + 1, name, weight * 100.0);
    }
    Ok(())
}

fn students(
    action: StudentsCommand,
    db: Option<&Path>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = store::open_store(db)?;

    match action {
        StudentsCommand::List { skip, limit } => {
            let page = store.list(skip, limit)?;
            if format == Format::Json {
                let output = json!({
                    "total": store.count()?,
                    "students": page,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{:>6}  {:10}  {:>10}  {:>10}  Secteur_Activite", "id", "Serie_Bac", "Note_Maths", "Points_BAC");
                for student in &page {
                    println!(
                        "{:>6}  {:10}  {:>10}  {:>10}  {}",
                        student.id.unwrap_or_default(),
                        student.record.serie_bac.as_deref().unwrap_or("-"),
                        display_number(student.record.note_maths),
                        display_number(student.record.points_bac),
                        student.sector
                    );
                }
                println!("\n{} of {} students", page.len(), store.count()?);
            }
        }
        StudentsCommand::Get { id } => {
            let student = store.require(id)?;
            print_student(&student, format)?;
        }
        StudentsCommand::Export { output } => {
            let count = match output {
                Some(path) => store.export_csv(std::fs::File::create(&path)?)?,
                None => store.export_csv(std::io::stdout().lock())?,
            };
            eprintln!("Exported {} students", count);
        }
    }
    Ok(())
}

fn display_number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
}

fn print_student(
    student: &LabeledStudent,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(student)?);
        return Ok(());
    }

    if let Some(id) = student.id {
        println!("Student #{}", id);
    }
    println!("  {:28} {}", LabeledStudent::sector_column(), student.sector);
    for name in StudentRecord::FIELD_NAMES {
        if let Some(value) = student.record.value(name) {
            println!("  {:28} {}", name, value);
        }
    }
    Ok(())
}

fn show_schema(format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let schema = FeatureSchema::canonical();

    if format == Format::Json {
        let features: Vec<_> = schema
            .features()
            .iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "kind": spec.kind,
                    "description": spec.description,
                })
            })
            .collect();
        let output = json!({
            "features": features,
            "target": schema.target(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Input features ({}):", schema.len());
    for spec in schema.features() {
        let kind = match spec.kind {
            FeatureKind::Numeric => "numeric",
            FeatureKind::Categorical => "categorical",
        };
        println!("  {:28} {:12} {}", spec.name, kind, spec.description);
    }
    println!("\nTarget: {}", schema.target());
    Ok(())
}
