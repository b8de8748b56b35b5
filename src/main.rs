use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod batch;
mod classifier;
mod db;
mod features;
mod models;
mod policy;
mod report;
mod risk;
mod store;

use classifier::DropoutClassifier;
use db::PgStore;
use policy::RiskPolicy;
use risk::RiskScorer;
use store::DataStore;

#[derive(Parser)]
#[command(name = "eduguard-early-warning")]
#[command(about = "Dropout risk scoring engine for the EduGuard early warning system", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import attendance rows from a CSV file
    ImportAttendance {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import academic records from a CSV file
    ImportAcademics {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Recompute and persist risk for one student or the whole roster
    UpdateRiskScores {
        #[arg(long)]
        student_id: Option<Uuid>,
        /// Risk policy JSON; defaults apply when omitted
        #[arg(long)]
        policy: Option<PathBuf>,
        /// Classifier artifact JSON; rule-based scoring stands alone when
        /// missing
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Generate a markdown risk report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Train the dropout classifier offline and write its artifact
    TrainModel {
        /// Labeled history CSV; a synthetic set is generated when omitted
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Risk policy JSON; must match the policy used at scoring time so
        /// the factor features share a scale
        #[arg(long)]
        policy: Option<PathBuf>,
        #[arg(long, default_value = "model.json")]
        out: PathBuf,
        #[arg(long, default_value_t = 2000)]
        synthetic_rows: usize,
        #[arg(long, default_value_t = 300)]
        epochs: usize,
        #[arg(long, default_value_t = 0.5)]
        learning_rate: f64,
    },
}

async fn connect() -> anyhow::Result<PgStore> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(PgStore::new(pool))
}

fn load_policy(path: Option<&PathBuf>) -> anyhow::Result<RiskPolicy> {
    match path {
        Some(path) => RiskPolicy::from_file(path)
            .with_context(|| format!("failed to load risk policy from {}", path.display())),
        None => Ok(RiskPolicy::default()),
    }
}

fn load_classifier(path: Option<&PathBuf>) -> Option<DropoutClassifier> {
    let path = path?;
    match DropoutClassifier::load(path) {
        Ok(model) => {
            log::info!(
                "classifier loaded from {} (holdout accuracy {:.2})",
                path.display(),
                model.accuracy()
            );
            Some(model)
        }
        Err(err) => {
            // Never user-facing: the rule-based score stands alone.
            log::warn!("{err}; continuing with rule-based scoring only");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let store = connect().await?;
            store.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = connect().await?;
            store.seed().await?;
            println!("Seed data inserted.");
        }
        Commands::ImportAttendance { csv } => {
            let store = connect().await?;
            let inserted = store.import_attendance_csv(&csv).await?;
            println!("Inserted {inserted} attendance rows from {}.", csv.display());
        }
        Commands::ImportAcademics { csv } => {
            let store = connect().await?;
            let inserted = store.import_academics_csv(&csv).await?;
            println!("Inserted {inserted} academic rows from {}.", csv.display());
        }
        Commands::UpdateRiskScores {
            student_id,
            policy,
            model,
        } => {
            let store = connect().await?;
            let scorer = RiskScorer::new(load_policy(policy.as_ref())?);
            let classifier = load_classifier(model.as_ref());

            let outcome =
                batch::update_risk_scores(&store, &scorer, classifier.as_ref(), student_id)
                    .await?;

            println!(
                "Updated {} students ({} alerts recorded).",
                outcome.updated_count, outcome.alerts_sent
            );
            if !outcome.fully_succeeded() {
                // Best-effort batch: failures are a warning, not an error.
                println!("Warning: {} students failed:", outcome.failed_count);
                for error in &outcome.errors {
                    println!("- {error}");
                }
            }
        }
        Commands::Report { out } => {
            let store = connect().await?;
            let assessments = store.all_assessments().await?;
            let alerts = store.recent_alerts(10).await?;
            let report = report::build_report(&assessments, &alerts);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::TrainModel {
            csv,
            policy,
            out,
            synthetic_rows,
            epochs,
            learning_rate,
        } => {
            let policy = load_policy(policy.as_ref())?;
            let rows = match csv {
                Some(path) => classifier::rows_from_labeled_csv(&path, &policy)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    log::info!("no labeled CSV given, generating {synthetic_rows} synthetic rows");
                    classifier::synthetic_training_rows(synthetic_rows, &policy)
                }
            };

            let artifact = DropoutClassifier::train(&rows, epochs, learning_rate)?;
            std::fs::write(&out, serde_json::to_string_pretty(&artifact)?)?;
            println!(
                "Model trained on {} rows (holdout accuracy {:.2}), written to {}.",
                rows.len(),
                artifact.accuracy,
                out.display()
            );
        }
    }

    Ok(())
}
