use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use portfolio_images::infrastructure::storage;
use portfolio_images::services::entity::EntityClient;
use portfolio_images::{CropTool, EntityKind, ImageConfig, ImageEditorSession, ImageSource};
use serde_json::Map;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

#[derive(Parser)]
#[command(name = "portfolio-images", version, about = "Crop, upload and clean up featured images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop an image and write the JPEG to disk
    Crop {
        /// Local file, data URL or http(s) URL of an uploaded image
        input: String,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        crop: CropArgs,
    },
    /// Crop and upload an image, printing the stored URL
    Upload {
        /// Local file, data URL or http(s) URL of an uploaded image
        input: String,
        #[command(flatten)]
        crop: CropArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Remove the featured image of an entity and delete it from storage
    Remove {
        #[arg(long, value_enum)]
        entity: Kind,
        #[arg(long)]
        id: String,
        /// Image the entity currently references
        #[arg(long)]
        current: String,
    },
    /// Delete an uploaded image by URL
    Delete { url: String },
}

#[derive(Args)]
struct CropArgs {
    /// Crop box in viewport pixels: x y width height
    #[arg(long, num_args = 4, value_names = ["X", "Y", "WIDTH", "HEIGHT"])]
    select: Option<Vec<f64>>,
    /// Viewport zoom between 1.0 and 3.0
    #[arg(long)]
    zoom: Option<f64>,
    /// Quarter turns, positive clockwise
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    rotate: i32,
}

impl CropArgs {
    fn apply(&self, tool: &mut CropTool) {
        for _ in 0..self.rotate.rem_euclid(4) {
            tool.rotate_right();
        }
        if let Some(zoom) = self.zoom {
            tool.set_zoom(zoom);
        }
        if let Some([x, y, width, height]) = self.select.as_deref() {
            tool.select(*x, *y, *width, *height);
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Article,
    Product,
    About,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Article => EntityKind::Article,
            Kind::Product => EntityKind::Product,
            Kind::About => EntityKind::About,
        }
    }
}

#[derive(Args)]
struct TargetArgs {
    /// Entity to save the image against
    #[arg(long, value_enum, requires = "id")]
    entity: Option<Kind>,
    /// Entity id (slug for articles)
    #[arg(long, requires = "entity")]
    id: Option<String>,
    /// Image the entity currently references
    #[arg(long)]
    current: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_images=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ImageConfig::from_env();
    config.validate().context("invalid image configuration")?;

    info!(
        "🖼️  Crop Config: Aspect={}:{}, Quality={}, Max Size={}KB",
        config.aspect_width,
        config.aspect_height,
        config.jpeg_quality,
        config.max_upload_bytes / 1024
    );

    match cli.command {
        Command::Crop {
            input,
            output,
            crop,
        } => {
            let store = storage::setup_storage(&config, storage::http_client()?);
            let session = ImageEditorSession::new(config, store);
            let mut tool = open_tool(&session, &input).await?;
            crop.apply(&mut tool);
            let blob = tool.confirm_crop()?;
            tokio::fs::write(&output, &blob.data)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "{} ({}x{}, {} bytes)",
                output.display(),
                blob.width,
                blob.height,
                blob.len()
            );
        }
        Command::Upload {
            input,
            crop,
            target,
        } => {
            let client = storage::http_client()?;
            let store = storage::setup_storage(&config, client.clone());
            let entities = storage::setup_entity_client(&config, client);

            let mut session = ImageEditorSession::new(config, store);
            let mut warnings = session.subscribe_warnings();
            if let Some(current) = &target.current {
                session.load(current.clone());
            }

            let mut tool = open_tool(&session, &input).await?;
            crop.apply(&mut tool);
            let image = session.upload_crop(&tool).await?;
            tool.cancel();

            let saved = match (target.entity, target.id.as_deref()) {
                (Some(kind), Some(id)) => save(&entities, kind, id, &mut session).await,
                _ => Ok(()),
            };
            if let Err(e) = saved {
                // Do not leave the fresh upload behind
                session.abandon().await;
                drain_warnings(&mut warnings);
                return Err(e);
            }
            drain_warnings(&mut warnings);
            println!("{}", image.url);
        }
        Command::Remove {
            entity,
            id,
            current,
        } => {
            if current.is_empty() {
                bail!("--current must name the image to remove");
            }
            let client = storage::http_client()?;
            let store = storage::setup_storage(&config, client.clone());
            let entities = storage::setup_entity_client(&config, client);

            let mut session = ImageEditorSession::new(config, store);
            let mut warnings = session.subscribe_warnings();
            session.load(current);
            session.remove().await;
            save(&entities, entity, &id, &mut session).await?;
            drain_warnings(&mut warnings);
        }
        Command::Delete { url } => {
            let store = storage::setup_storage(&config, storage::http_client()?);
            portfolio_images::ImageStore::delete(store.as_ref(), &url).await?;
            println!("deleted {}", url);
        }
    }

    Ok(())
}

/// Existing paths are captured from disk; anything else must be a data URL
/// or an http(s) URL of an uploaded image
async fn open_tool(session: &ImageEditorSession, input: &str) -> anyhow::Result<CropTool> {
    if Path::new(input).exists() {
        return Ok(session.capture(input).await?);
    }
    let source: ImageSource = input.parse()?;
    Ok(session.open(&source).await?)
}

async fn save(
    entities: &EntityClient,
    kind: Kind,
    id: &str,
    session: &mut ImageEditorSession,
) -> anyhow::Result<()> {
    entities
        .update(kind.into(), id, Map::new(), session.tracker_mut())
        .await?;
    Ok(())
}

fn drain_warnings(warnings: &mut UnboundedReceiver<portfolio_images::CleanupWarning>) {
    while let Ok(warning) = warnings.try_recv() {
        warn!("⚠️  Could not delete {}: {}", warning.url, warning.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_requires_entity_target() {
        assert!(
            Cli::try_parse_from(["portfolio-images", "remove", "--current", "http://s/a.jpg"])
                .is_err()
        );

        let cli = Cli::try_parse_from([
            "portfolio-images",
            "remove",
            "--entity",
            "product",
            "--id",
            "7",
            "--current",
            "http://s/a.jpg",
        ])
        .unwrap();
        match cli.command {
            Command::Remove { id, current, .. } => {
                assert_eq!(id, "7");
                assert_eq!(current, "http://s/a.jpg");
            }
            _ => panic!("expected remove"),
        }
    }

    #[test]
    fn test_upload_target_is_optional() {
        let cli = Cli::try_parse_from(["portfolio-images", "upload", "photo.png"]).unwrap();
        assert!(matches!(cli.command, Command::Upload { .. }));

        // --entity without --id is incomplete
        assert!(
            Cli::try_parse_from(["portfolio-images", "upload", "photo.png", "--entity", "about"])
                .is_err()
        );
    }
}
