//! Seer
//!
//! Places material-tagged detections from video frames onto a
//! reconstructed room mesh and writes the consolidated object list.
//!
//! Inputs:
//! - a surface mesh (`.ply` or `.obj`)
//! - camera poses (COLMAP text model directory or JSON table)
//! - detector replies (frame-keyed JSON file or a directory of per-frame files)

mod output;

use clap::Parser;
use output::SceneDocument;
use seer_data::{load_detections, load_mesh, load_poses};
use seer_locate::{
    BoxPolicy, FrameInput, LocateConfig, LocateError, MergeRadius, MeshIntersector, PoseTable,
    run_batch,
};
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

/// Seer - object localization on reconstructed meshes
#[derive(Parser, Debug)]
#[command(name = "seer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Surface mesh (PLY or OBJ)
    #[arg(long)]
    mesh: PathBuf,

    /// COLMAP text model directory or JSON pose table
    #[arg(long)]
    poses: PathBuf,

    /// Detector output file or directory
    #[arg(long)]
    detections: PathBuf,

    /// Output JSON path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Merge radius in world units
    #[arg(long, conflicts_with = "merge_fraction")]
    merge_radius: Option<f64>,

    /// Merge radius as a fraction of the mesh bounding-box diagonal
    #[arg(long)]
    merge_fraction: Option<f64>,

    /// Drop detections with box corners outside [0, 1] instead of clamping
    #[arg(long)]
    reject_out_of_range: bool,

    /// Treat hits farther than this from the camera as misses
    #[arg(long)]
    max_ray_distance: Option<f64>,

    /// Process on the calling thread only
    #[arg(long)]
    sequential: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    fn locate_config(&self) -> Result<LocateConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => LocateConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => LocateConfig::default(),
        };
        if let Some(radius) = self.merge_radius {
            config.merge_radius = MergeRadius::Absolute(radius);
        }
        if let Some(fraction) = self.merge_fraction {
            config.merge_radius = MergeRadius::SceneFraction(fraction);
        }
        if self.reject_out_of_range {
            config.box_policy = BoxPolicy::Reject;
        }
        if self.max_ray_distance.is_some() {
            config.max_ray_distance = self.max_ray_distance;
        }
        if self.sequential {
            config.parallel = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

/// Load and validate mesh, poses and detector output.
fn load_inputs(
    args: &Args,
    config: &LocateConfig,
) -> Result<(MeshIntersector, PoseTable, Vec<FrameInput>), LocateError> {
    let mesh = load_mesh(&args.mesh)?;
    let intersector = MeshIntersector::build(&mesh)?;
    let poses = PoseTable::from_records(load_poses(&args.poses)?);
    let frames = load_detections(&args.detections)?
        .iter()
        .map(|frame| FrameInput::from_records(frame, config.box_policy))
        .collect();
    Ok((intersector, poses, frames))
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = args.locate_config()?;
    info!("Configuration: {:?}", config);

    let (intersector, poses, frames) = load_inputs(&args, &config)?;
    let output = run_batch(&intersector, &poses, &frames, &config)?;
    let json = serde_json::to_string_pretty(&SceneDocument::new(&output))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(
                "Wrote {} objects to {}",
                output.scene.objects.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}
