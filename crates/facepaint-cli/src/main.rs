use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facepaint_core::{presets, Category, LandmarkSet, LayerPatch, LayerSettings, Preset};
use facepaint_hw::{CameraBackend, V4l2Backend};
use std::path::{Path, PathBuf};

#[zbus::proxy(
    interface = "org.facepaint.Studio1",
    default_service = "org.facepaint.Studio1",
    default_path = "/org/facepaint/Studio1"
)]
trait Studio {
    fn start_camera(&self, device: &str) -> zbus::Result<String>;
    fn stop_camera(&self) -> zbus::Result<()>;
    fn toggle(&self, category_name: &str) -> zbus::Result<bool>;
    fn set_color(&self, category_name: &str, color: &str) -> zbus::Result<()>;
    fn set_intensity(&self, category_name: &str, intensity: u8) -> zbus::Result<()>;
    fn set_params(&self, category_name: &str, patch_json: &str) -> zbus::Result<()>;
    fn apply_preset(&self, name: &str) -> zbus::Result<()>;
    fn apply_preset_json(&self, preset_json: &str) -> zbus::Result<()>;
    fn clear_all(&self) -> zbus::Result<()>;
    fn capture_now(&self) -> zbus::Result<bool>;
    fn save_composite(&self, path: &str) -> zbus::Result<()>;
    fn status(&self) -> zbus::Result<String>;
    fn settings(&self) -> zbus::Result<String>;
    fn last_result(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "facepaint", about = "Facepaint virtual makeup studio CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the camera and start the live preview
    Start {
        /// Device path or name (defaults to the configured or front-facing camera)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Stop the camera and release the device
    Stop,
    /// Turn a makeup category on or off
    Toggle { category: Category },
    /// Set a category's color (e.g. "#DC143C")
    Color { category: Category, color: String },
    /// Set a category's intensity (0-100)
    Intensity {
        category: Category,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        value: u8,
    },
    /// Set eyeliner thickness in pixels
    Thickness { category: Category, value: u8 },
    /// Apply a built-in preset, or a custom one from a JSON file
    Preset {
        /// Built-in preset name (natural, glamorous, professional, evening)
        name: Option<String>,
        #[arg(short, long, conflicts_with = "name")]
        file: Option<PathBuf>,
    },
    /// Disable every category
    Clear,
    /// Request an analysis or transformation capture now
    Capture,
    /// Show daemon status
    Status,
    /// Show the current layer settings
    Settings,
    /// Show the most recent capture result
    Result,
    /// Save the current composite on the daemon's host
    Snapshot {
        #[arg(short, long)]
        out: PathBuf,
    },
    /// List built-in presets and shade palettes (offline)
    Presets,
    /// List camera devices (offline, bypasses the daemon)
    Devices,
    /// Composite one still image offline
    Render {
        /// Input image
        #[arg(long)]
        frame: PathBuf,
        /// JSON array of normalized [x, y] points (null for missing slots)
        #[arg(long)]
        landmarks: PathBuf,
        /// LayerSettings JSON file
        #[arg(long, conflicts_with = "preset")]
        settings: Option<PathBuf>,
        /// Built-in preset applied over the defaults
        #[arg(long)]
        preset: Option<String>,
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Some(result) = run_offline(&cli.command) {
        return result;
    }
    let connection = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    let studio = StudioProxy::new(&connection)
        .await
        .context("facepaintd is not reachable; is the daemon running?")?;
    run_remote(&studio, cli.command).await
}

/// Run a command that needs no daemon. `None` when it does.
fn run_offline(command: &Commands) -> Option<Result<()>> {
    let result = match command {
        Commands::Presets => list_presets(),
        Commands::Devices => list_devices(),
        Commands::Render {
            frame,
            landmarks,
            settings,
            preset,
            out,
        } => render_offline(frame, landmarks, settings.as_deref(), preset.as_deref(), out),
        _ => return None,
    };
    Some(result)
}

async fn run_remote(studio: &StudioProxy<'_>, command: Commands) -> Result<()> {
    match command {
        Commands::Start { device } => {
            let status = studio.start_camera(device.as_deref().unwrap_or("")).await?;
            print_json(&status)?;
        }
        Commands::Stop => {
            studio.stop_camera().await?;
            println!("camera stopped");
        }
        Commands::Toggle { category } => {
            let enabled = studio.toggle(category.name()).await?;
            println!("{category}: {}", if enabled { "on" } else { "off" });
        }
        Commands::Color { category, color } => {
            studio.set_color(category.name(), &color).await?;
            println!("{category}: color {color}");
        }
        Commands::Intensity { category, value } => {
            studio.set_intensity(category.name(), value).await?;
            println!("{category}: intensity {value}");
        }
        Commands::Thickness { category, value } => {
            let patch = LayerPatch {
                thickness: Some(value),
                ..Default::default()
            };
            studio
                .set_params(category.name(), &serde_json::to_string(&patch)?)
                .await?;
            println!("{category}: thickness {value}");
        }
        Commands::Preset { name, file } => match (name, file) {
            (_, Some(path)) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let preset: Preset = serde_json::from_str(&json)
                    .with_context(|| format!("invalid preset in {}", path.display()))?;
                studio.apply_preset_json(&serde_json::to_string(&preset)?).await?;
                println!("applied preset from {}", path.display());
            }
            (Some(name), None) => {
                studio.apply_preset(&name).await?;
                println!("applied preset {name}");
            }
            (None, None) => bail!("give a preset name or --file"),
        },
        Commands::Clear => {
            studio.clear_all().await?;
            println!("all layers cleared");
        }
        Commands::Capture => {
            if studio.capture_now().await? {
                println!("capture submitted");
            } else {
                println!("capture already in flight or no frame yet");
            }
        }
        Commands::Status => print_json(&studio.status().await?)?,
        Commands::Settings => print_json(&studio.settings().await?)?,
        Commands::Result => print_json(&studio.last_result().await?)?,
        Commands::Snapshot { out } => {
            // The daemon resolves paths against its own working directory.
            let path = if out.is_absolute() {
                out
            } else {
                std::env::current_dir()?.join(out)
            };
            studio.save_composite(&path.to_string_lossy()).await?;
            println!("composite saved to {}", path.display());
        }
        Commands::Presets | Commands::Devices | Commands::Render { .. } => {
            bail!("this command runs without the daemon")
        }
    }
    Ok(())
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw).context("daemon returned invalid JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn list_presets() -> Result<()> {
    for name in presets::PRESET_NAMES {
        let Some(preset) = presets::builtin(name) else {
            continue;
        };
        let layers: Vec<String> = preset
            .layers
            .iter()
            .map(|(category, patch)| match (patch.intensity, patch.color) {
                (Some(i), Some(c)) => format!("{category} {i}% {c}"),
                (Some(i), None) => format!("{category} {i}%"),
                _ => category.to_string(),
            })
            .collect();
        println!("{name}: {}", layers.join(", "));
    }

    println!();
    for category in Category::ALL {
        let shades = presets::palette(category);
        if shades.is_empty() {
            continue;
        }
        println!("{category}:");
        for (name, color) in shades {
            println!("  {color}  {name}");
        }
    }
    Ok(())
}

fn list_devices() -> Result<()> {
    let devices = V4l2Backend.list_devices();
    if devices.is_empty() {
        println!("No camera devices found");
        return Ok(());
    }
    for d in devices {
        println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }
    Ok(())
}

/// Settings for an offline render: a settings file, or a preset over the defaults.
fn resolve_settings(settings: Option<&Path>, preset: Option<&str>) -> Result<LayerSettings> {
    if let Some(path) = settings {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return serde_json::from_str(&json)
            .with_context(|| format!("invalid settings in {}", path.display()));
    }
    let mut resolved = LayerSettings::default();
    if let Some(name) = preset {
        let preset = presets::builtin(name).with_context(|| format!("unknown preset: {name}"))?;
        resolved.apply_preset(&preset)?;
    }
    Ok(resolved)
}

fn render_offline(
    frame: &Path,
    landmarks: &Path,
    settings: Option<&Path>,
    preset: Option<&str>,
    out: &Path,
) -> Result<()> {
    let image = image::open(frame)
        .with_context(|| format!("failed to open {}", frame.display()))?
        .to_rgb8();
    let json = std::fs::read_to_string(landmarks)
        .with_context(|| format!("failed to read {}", landmarks.display()))?;
    let landmarks: LandmarkSet = serde_json::from_str(&json).context("invalid landmarks JSON")?;
    let settings = resolve_settings(settings, preset)?;

    let mut surface = image::RgbImage::new(0, 0);
    let painted = facepaint_core::render(&mut surface, &image, &landmarks, &settings);
    surface
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;

    println!(
        "{}x{} frame, {} layer(s) painted -> {}",
        image.width(),
        image.height(),
        painted,
        out.display()
    );
    Ok(())
}
