use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use collagekit::client::wait;
use collagekit::rendering::GridDocument;
use collagekit::{ClientConfig, CollageTemplate, PositionIdBase, Slot, ThumbnailSize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "collagekit", version, about = "Photo-collage editor client")]
struct Cli {
    /// Base URL of the collage backend
    #[arg(long, env = "COLLAGE_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Request timeout in milliseconds (0 = none)
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,

    /// Thumbnail edge length in pixels
    #[arg(long, default_value_t = 50)]
    thumbnail: u32,

    /// Number positions from 1 instead of 0
    #[arg(long)]
    one_based_ids: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the uploaded images and download them
    Images,
    /// Pull a component's grid into a slot array and print it as JSON
    Sync {
        #[arg(long)]
        component: String,
        /// Number of cells in the grid
        #[arg(long)]
        cells: usize,
        /// Also produce thumbnails
        #[arg(long)]
        scale: bool,
        /// Keep polling every N milliseconds
        #[arg(long)]
        poll_ms: Option<u64>,
        /// Stop after this many polls (with --poll-ms)
        #[arg(long, default_value_t = 1)]
        rounds: u32,
    },
    /// Extract the layout from grid markup and submit it
    Positions {
        #[arg(long)]
        component: String,
        /// HTML file containing the .grid-container
        #[arg(long)]
        grid: PathBuf,
        /// JSON file with the slot array (defaults to the markup's images)
        #[arg(long)]
        slots: Option<PathBuf>,
        #[arg(long)]
        prompt: Option<String>,
        /// Print the positions without sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove every image from a component's collage
    Clear {
        #[arg(long)]
        component: String,
    },
    /// Change the backend's image selection mode
    Mode { new_mode: String },
    /// Ask for a new selection around a slot
    Select {
        #[arg(long)]
        component: String,
        #[arg(long)]
        target_id: u32,
    },
    /// Rasterize grid markup to a PNG with editing chrome hidden
    Export {
        #[arg(long)]
        grid: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = collagekit::rendering::DEFAULT_SCALE)]
        scale: f32,
    },
    /// List the collage shape templates
    Templates,
}

fn slots_from_markup(doc: &GridDocument) -> Vec<Slot> {
    use collagekit::rendering::layout::ElementKind;
    doc.cells()
        .into_iter()
        .map(|cell| {
            let src = doc
                .element(cell)
                .children
                .iter()
                .find(|&&c| doc.element(c).kind == ElementKind::Image)
                .and_then(|&c| doc.element(c).src.clone());
            let file_name = src
                .as_deref()
                .and_then(|s| s.rsplit('/').next())
                .map(|s| s.to_string());
            Slot { src, file_name, scaled_src: None }
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = ClientConfig {
        api_url: cli.api_url.clone(),
        timeout_ms: cli.timeout_ms,
        thumbnail: ThumbnailSize::square(cli.thumbnail),
        position_id_base: if cli.one_based_ids { PositionIdBase::One } else { PositionIdBase::Zero },
        ..Default::default()
    };
    let mut client = collagekit::new_client(config).context("failed to set up backend client")?;

    match cli.command {
        Command::Templates => {
            for t in CollageTemplate::all() {
                println!("{}\t{}", t, t.asset_path());
            }
        }
        Command::Images => {
            let n = client.refresh_gallery()?;
            for (url, blob) in client.state().photo_urls().iter().zip(client.state().photo_blobs()) {
                println!("{}\t{} bytes", url, blob.len());
            }
            log::info!("{} images", n);
        }
        Command::Sync { component, cells, scale, poll_ms, rounds } => {
            let mut slots = vec![Slot::empty(); cells];
            let rounds = if poll_ms.is_some() { rounds.max(1) } else { 1 };
            for round in 0..rounds {
                if round > 0 {
                    wait(poll_ms.unwrap_or(0));
                }
                let report = if scale {
                    client.update_collage_items(&component, &mut slots)?
                } else {
                    client.sync_grid(&component, &mut slots)?
                };
                if !report.is_complete() {
                    log::warn!("{} thumbnails failed", report.scale_failures.len());
                }
            }
            println!("{}", serde_json::to_string_pretty(&slots)?);
        }
        Command::Positions { component, grid, slots, prompt, dry_run } => {
            let html = std::fs::read_to_string(&grid).with_context(|| format!("reading {}", grid.display()))?;
            let doc = GridDocument::parse(&html)?;
            let slots: Vec<Slot> = match slots {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str(&raw).context("slot file is not a JSON slot array")?
                }
                None => slots_from_markup(&doc),
            };
            let positions = if dry_run {
                client.extract_positions(&doc, &slots)
            } else {
                client.submit_layout(&doc, &slots, &component, prompt.as_deref())?
            };
            println!("{}", serde_json::to_string_pretty(&positions)?);
        }
        Command::Clear { component } => client.clear_collage(&component)?,
        Command::Mode { new_mode } => {
            let answer = client.update_selection_mode(&new_mode)?;
            println!("{}", answer);
        }
        Command::Select { component, target_id } => {
            let answer = client.new_selection(&component, target_id)?;
            println!("{}", answer);
        }
        Command::Export { grid, out, scale } => {
            let html = std::fs::read_to_string(&grid).with_context(|| format!("reading {}", grid.display()))?;
            let mut doc = GridDocument::parse(&html)?;
            let blob = client.export_collage(&mut doc, scale)?;
            if blob.is_empty() {
                bail!("rasterizer produced no data");
            }
            std::fs::write(&out, &blob.bytes).with_context(|| format!("writing {}", out.display()))?;
            log::info!("wrote {} ({} bytes, sha256 {})", out.display(), blob.len(), blob.sha256_hex());
        }
    }

    client.close();
    Ok(())
}
