//! Gene curation engine - bootstrap binary
//!
//! Resolves the root folder, opens (and migrates) the database, optionally
//! creates the first application admin, and can score an evidence file
//! without touching the database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gcur_common::config::{resolve_root_folder, TomlConfig};
use gcur_common::events::EventBus;
use gcur_engine::scoring::{score_evidence, EvidenceEntry, ScoringConfig};
use gcur_engine::CurationService;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for gcur-engine
#[derive(Parser, Debug)]
#[command(name = "gcur-engine")]
#[command(about = "Gene-disease curation engine")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "GCUR_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Path to gcur.toml (defaults to the platform config location)
    #[arg(short, long, env = "GCUR_CONFIG")]
    config: Option<PathBuf>,

    /// Default scoring configuration (TOML or JSON)
    #[arg(long, env = "GCUR_SCORING_CONFIG")]
    scoring_config: Option<PathBuf>,

    /// Create the first application admin with this username
    #[arg(long)]
    bootstrap_admin: Option<String>,

    /// Score a JSON array of evidence entries and print the result
    #[arg(long)]
    preview: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match &args.config {
        Some(path) => TomlConfig::load(path).context("Failed to load config file")?,
        None => TomlConfig::load_or_default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let scoring = match args.scoring_config.as_ref().or(toml_config.scoring_config.as_ref()) {
        Some(path) => {
            info!("Loading scoring configuration from {}", path.display());
            ScoringConfig::load(path).context("Failed to load scoring configuration")?
        }
        None => ScoringConfig::default(),
    };

    if let Some(path) = &args.preview {
        return preview(path, &scoring);
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    let db_path = toml_config.database_path(&root_folder);
    info!("Root folder: {}", root_folder.display());
    info!("Database: {}", db_path.display());

    let pool = gcur_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    let service = CurationService::with_scoring(pool, EventBus::default(), scoring);

    if let Some(username) = &args.bootstrap_admin {
        match service.bootstrap_admin(username).await {
            Ok(user) => info!("Created application admin '{}' ({})", user.username, user.id),
            Err(e) => warn!("Bootstrap skipped: {}", e),
        }
    }

    let version = gcur_common::db::migrations::get_schema_version(service.pool())
        .await
        .context("Failed to read schema version")?;
    info!("Curation store ready (schema version {})", version);
    Ok(())
}

/// Side-effect free scoring of an evidence file
fn preview(path: &Path, scoring: &ScoringConfig) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let entries: Vec<EvidenceEntry> =
        serde_json::from_str(&text).context("Evidence file is not a JSON array of entries")?;

    let output = match score_evidence(&entries, scoring) {
        Ok(result) => serde_json::to_string_pretty(&result)?,
        Err(e) => {
            warn!("Evidence set is incomplete: {}", e);
            serde_json::to_string_pretty(&e)?
        }
    };
    println!("{}", output);
    Ok(())
}
