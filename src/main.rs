use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use neurolex::config::Config;
use neurolex::decode::{decode_map, encode_text};
use neurolex::model::TopicModel;
use neurolex::volume::MapInput;

/// Neurolex: cross-modal decoding between brain maps and text.
///
/// Decodes unthresholded activation maps into weighted term lists, and
/// encodes free text back into activation maps, through a pre-trained
/// topic model.
#[derive(Parser)]
#[command(name = "neurolex", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a spatial map into term weights
    Decode {
        /// Path to the query map (serialized volume JSON)
        image: PathBuf,

        /// Path to the trained topic model (overrides NEUROLEX_MODEL_PATH)
        #[arg(long)]
        model: Option<PathBuf>,

        /// How many top terms to show (default: 15)
        #[arg(long, default_value = "15")]
        top: usize,

        /// Emit the full term table as JSON instead of a ranked list
        #[arg(long)]
        json: bool,
    },

    /// Encode text into a spatial map
    Encode {
        /// The text to encode (multiple arguments are joined with spaces)
        text: Vec<String>,

        /// Path to the trained topic model (overrides NEUROLEX_MODEL_PATH)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Write the encoded volume to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("neurolex=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            image,
            model,
            top,
            json,
        } => {
            let model = load_model(model)?;
            let input = MapInput::from(image);
            let (table, topic_weights) = decode_map(&model, &input, None, 1.0)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                table.display(top);
                println!(
                    "  {} {} topics contributed non-zero weight",
                    "~".dimmed(),
                    topic_weights.iter().filter(|&&w| w != 0.0).count()
                );
            }
        }

        Commands::Encode { text, model, out } => {
            if text.is_empty() {
                anyhow::bail!("Nothing to encode; pass some text");
            }
            let model = load_model(model)?;
            let joined = text.join(" ");
            let (img, topic_weights) = encode_text(&model, &joined, out.as_deref(), None, 1.0)?;

            let active = img.data().iter().filter(|&&v| v != 0.0).count();
            println!(
                "Encoded {} term-bearing topics into a {:?} volume ({active} non-zero voxels)",
                topic_weights.iter().filter(|&&w| w != 0.0).count(),
                img.shape(),
            );
            if let Some(path) = out {
                println!("Wrote encoded volume to {}", path.display().to_string().bold());
            }
        }
    }

    Ok(())
}

fn load_model(override_path: Option<PathBuf>) -> Result<TopicModel> {
    let path = match override_path {
        Some(path) => path,
        None => {
            let config = Config::load()?;
            config.require_model()?;
            config.model_path
        }
    };
    let model = TopicModel::load(&path)?;
    info!(
        topics = model.n_topics(),
        terms = model.vocabulary().len(),
        voxels = model.n_voxels(),
        "Topic model loaded"
    );
    Ok(model)
}
