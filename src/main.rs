use anyhow::Context;
use clap::Parser;
use image::ImageReader;
use std::path::{Path, PathBuf};
#[cfg(feature = "rten")]
use std::sync::Arc;

use leafcheck::config::{self, Profile};
use leafcheck::report;
use leafcheck::{Cascade, CascadeSession, DiseaseOutputMode, ModelRole, ModelSlot};

#[derive(Parser)]
#[command(name = "leafcheck")]
#[command(about = "Screen a leaf photo and classify potato leaf disease")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Built-in deployment profile
    #[arg(long, value_enum, default_value_t = Profile::Lenient)]
    profile: Profile,

    /// TOML configuration file (overrides --profile)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Guard acceptance threshold for the potato class
    #[arg(long)]
    threshold: Option<f32>,

    /// Override how disease model output is interpreted
    #[arg(long, value_enum)]
    disease_output: Option<DiseaseOutputMode>,

    /// Guard model file (.rten)
    #[arg(long, value_name = "FILE")]
    guard_model: Option<PathBuf>,

    /// Disease model file (.rten)
    #[arg(long, value_name = "FILE")]
    disease_model: Option<PathBuf>,

    /// Print the decision as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save intermediate images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let directive = if verbose { "leafcheck=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_slot(role: ModelRole, path: Option<&PathBuf>) -> anyhow::Result<ModelSlot> {
    match path {
        Some(path) => load_model(role, path),
        None => Ok(ModelSlot::empty(role)),
    }
}

#[cfg(feature = "rten")]
fn load_model(role: ModelRole, path: &Path) -> anyhow::Result<ModelSlot> {
    let scorer = leafcheck::backend::rten::RtenScorer::load(path)?;
    Ok(ModelSlot::ready(role, Arc::new(scorer)))
}

#[cfg(not(feature = "rten"))]
fn load_model(role: ModelRole, path: &Path) -> anyhow::Result<ModelSlot> {
    anyhow::bail!(
        "cannot load {} model {}: built without the `rten` feature",
        role,
        path.display()
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let mut cascade_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => args.profile.config(),
    };
    if let Some(threshold) = args.threshold {
        cascade_config.potato_threshold = threshold;
    }
    if let Some(mode) = args.disease_output {
        cascade_config.disease_output = mode;
    }
    cascade_config.validate()?;

    let img = ImageReader::open(&args.image_path)
        .with_context(|| format!("Failed to open image: {}", args.image_path.display()))?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    tracing::info!(width = img.width(), height = img.height(), "image loaded");

    let guard = load_slot(ModelRole::Guard, args.guard_model.as_ref())?;
    let disease = load_slot(ModelRole::Disease, args.disease_model.as_ref())?;

    let mut cascade = Cascade::new(cascade_config.clone(), guard, disease);
    if let Some(debug_dir) = args.debug_out {
        cascade = cascade.with_debug(debug_dir)?;
    }

    let session = CascadeSession::new(cascade);

    let decision = match session.classify(img).await {
        Ok(Some(decision)) => decision,
        Ok(None) => anyhow::bail!("classification was superseded"),
        Err(failure) => {
            if let Some(vegetation) = &failure.vegetation {
                eprintln!(
                    "Color filter before failure: mean RGB {:.1}, {:.1}, {:.1} (ratio {:.2})",
                    vegetation.means[0], vegetation.means[1], vegetation.means[2], vegetation.green_ratio
                );
            }
            if let Some(guard) = &failure.guard {
                eprintln!("Guard scores before failure: {:?}", guard.scores().as_slice());
            }
            return Err(failure.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print!("{}", report::render(&decision, &cascade_config).to_text());
    }

    Ok(())
}
