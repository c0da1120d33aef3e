//! facealign CLI — align generated face images onto template geometry.
//!
//! Landmark inference runtimes live outside this binary; the `align`
//! subcommand consumes a keypoints sidecar JSON produced by whatever
//! detector tooling ran the models, replays it through keyed backends, and
//! drives the full fallback chain.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use facealign::backend::{KeyedFivePoint, KeyedMesh, StaticFivePoint, StaticMesh};
use facealign::{
    estimate_similarity_lmeds, warp_into_canvas, AlignOptions, BackendToggles, DetectorTag,
    FaceAligner, FaceMeshModel, FallbackDetector, FiveKeypoints, FivePointModel, LandmarkSet,
    PrimaryDetector, SecondaryDetector, SimilarityTransform,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "facealign")]
#[command(about = "Align a generated face image onto the geometry of its template")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full alignment pipeline from a keypoints sidecar.
    Align(CliAlignArgs),

    /// Fit the similarity transform from two stored landmark sets.
    Estimate(CliEstimateArgs),

    /// Apply a stored similarity transform to an image.
    Warp(CliWarpArgs),
}

#[derive(Debug, Clone, Args)]
struct CliAlignArgs {
    /// Path to the generated image.
    #[arg(long)]
    generated: PathBuf,

    /// Path to the template image (canvas size source).
    #[arg(long)]
    template: PathBuf,

    /// Path to write the aligned image.
    #[arg(long)]
    out: PathBuf,

    /// Keypoints sidecar JSON with per-image five-point and/or mesh entries.
    #[arg(long)]
    keypoints: PathBuf,

    /// Skip the five-point backend.
    #[arg(long)]
    no_primary: bool,

    /// Skip the dense-mesh backend.
    #[arg(long)]
    no_secondary: bool,

    /// Path to write the alignment result (JSON).
    #[arg(long)]
    result_json: Option<PathBuf>,
}

/// Detector output stored alongside the images, keyed by role.
///
/// `five_points` feeds the primary backend (pixel coordinates), `mesh` the
/// secondary one (normalized coordinates); either section may be absent.
#[derive(Debug, Clone, serde::Deserialize)]
struct KeypointsSidecar {
    five_points: Option<RolePair<FiveKeypoints>>,
    mesh: Option<RolePair<Vec<[f64; 2]>>>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RolePair<T> {
    template: T,
    generated: T,
}

#[derive(Debug, Clone, Args)]
struct CliEstimateArgs {
    /// Landmark set JSON for the generated image (source frame).
    #[arg(long)]
    generated_landmarks: PathBuf,

    /// Landmark set JSON for the template image (target frame).
    #[arg(long)]
    template_landmarks: PathBuf,

    /// Path to write the fitted transform (JSON).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliWarpArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the warped image.
    #[arg(long)]
    out: PathBuf,

    /// Transform JSON ({"a": .., "b": .., "tx": .., "ty": ..}).
    #[arg(long)]
    transform: PathBuf,

    /// Canvas width in pixels.
    #[arg(long)]
    width: u32,

    /// Canvas height in pixels.
    #[arg(long)]
    height: u32,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Align(args) => run_align(&args),
        Commands::Estimate(args) => run_estimate(&args),
        Commands::Warp(args) => run_warp(&args),
    }
}

fn load_landmarks(path: &Path) -> CliResult<LandmarkSet> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("failed to read {}: {}", path.display(), e).into() })?;
    let lm: LandmarkSet = serde_json::from_str(&raw)
        .map_err(|e| -> CliError { format!("invalid landmark JSON {}: {}", path.display(), e).into() })?;
    if !lm.is_finite() {
        return Err(format!("{}: non-finite landmark coordinates", path.display()).into());
    }
    Ok(lm)
}

fn load_landmark_pair(
    template_path: &Path,
    generated_path: &Path,
) -> CliResult<(LandmarkSet, LandmarkSet, DetectorTag)> {
    let template = load_landmarks(template_path)?;
    let generated = load_landmarks(generated_path)?;
    if template.method != generated.method {
        return Err(format!(
            "landmark sets come from different backends ({} vs {}); \
             a consistent pair is required",
            template.method, generated.method
        )
        .into());
    }
    let method = template.method;
    Ok((template, generated, method))
}

fn open_rgb(path: &Path) -> CliResult<image::RgbImage> {
    let img = image::open(path)
        .map_err(|e| -> CliError { format!("failed to open {}: {}", path.display(), e).into() })?;
    Ok(img.to_rgb8())
}

// ── align ──────────────────────────────────────────────────────────────

fn load_sidecar(path: &Path) -> CliResult<KeypointsSidecar> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("failed to read {}: {}", path.display(), e).into() })?;
    let sidecar: KeypointsSidecar = serde_json::from_str(&raw)
        .map_err(|e| -> CliError { format!("invalid keypoints JSON {}: {}", path.display(), e).into() })?;
    if sidecar.five_points.is_none() && sidecar.mesh.is_none() {
        return Err(format!("{}: no five_points or mesh entries", path.display()).into());
    }
    Ok(sidecar)
}

/// Build an aligner whose backends replay the sidecar entries, keyed by the
/// decoded rasters. A backend with no sidecar section reports unavailable
/// and the fallback chain skips past it.
fn build_aligner(
    sidecar: KeypointsSidecar,
    template: &image::RgbImage,
    generated: &image::RgbImage,
) -> FaceAligner {
    let primary: Box<dyn FivePointModel> = match sidecar.five_points {
        Some(pair) => Box::new(KeyedFivePoint::new(vec![
            (template.clone(), pair.template),
            (generated.clone(), pair.generated),
        ])),
        None => Box::new(StaticFivePoint::unavailable()),
    };
    let secondary: Box<dyn FaceMeshModel> = match sidecar.mesh {
        Some(pair) => Box::new(KeyedMesh::new(vec![
            (template.clone(), pair.template),
            (generated.clone(), pair.generated),
        ])),
        None => Box::new(StaticMesh::unavailable()),
    };
    FaceAligner::new(FallbackDetector::new(
        PrimaryDetector::new(primary),
        SecondaryDetector::new(secondary),
    ))
}

fn run_align(args: &CliAlignArgs) -> CliResult<()> {
    let sidecar = load_sidecar(&args.keypoints)?;
    let template = open_rgb(&args.template)?;
    let generated = open_rgb(&args.generated)?;
    tracing::info!("template canvas: {}x{}", template.width(), template.height());

    let aligner = build_aligner(sidecar, &template, &generated);
    let options = AlignOptions {
        toggles: BackendToggles {
            use_primary: !args.no_primary,
            use_secondary: !args.no_secondary,
        },
    };
    let result = aligner.align(&args.generated, &args.template, &args.out, &options);

    if let Some(result_path) = &args.result_json {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(result_path, &json)?;
        tracing::info!("result written to {}", result_path.display());
    }

    match result.error {
        None => Ok(()),
        Some(kind) => Err(format!("alignment failed: {}", kind).into()),
    }
}

// ── estimate ───────────────────────────────────────────────────────────

fn run_estimate(args: &CliEstimateArgs) -> CliResult<()> {
    let (template_lm, generated_lm, method) =
        load_landmark_pair(&args.template_landmarks, &args.generated_landmarks)?;

    let transform = estimate_similarity_lmeds(&generated_lm.triplet(), &template_lm.triplet())
        .map_err(|e| -> CliError { format!("estimation failed: {}", e).into() })?;

    println!("backend:   {}", method);
    println!("scale:     {:.6}", transform.scale());
    println!("rotation:  {:.4} deg", transform.rotation_deg());
    println!(
        "matrix:    [[{:.6}, {:.6}, {:.6}], [{:.6}, {:.6}, {:.6}]]",
        transform.a, -transform.b, transform.tx, transform.b, transform.a, transform.ty,
    );

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&transform)?;
        std::fs::write(out, &json)?;
        tracing::info!("transform written to {}", out.display());
    }
    Ok(())
}

// ── warp ───────────────────────────────────────────────────────────────

fn run_warp(args: &CliWarpArgs) -> CliResult<()> {
    let raw = std::fs::read_to_string(&args.transform).map_err(|e| -> CliError {
        format!("failed to read {}: {}", args.transform.display(), e).into()
    })?;
    let transform: SimilarityTransform = serde_json::from_str(&raw).map_err(|e| -> CliError {
        format!("invalid transform JSON {}: {}", args.transform.display(), e).into()
    })?;

    let img = open_rgb(&args.image)?;
    let canvas = warp_into_canvas(&img, &transform, args.width, args.height)
        .map_err(|e| -> CliError { format!("warp failed: {}", e).into() })?;

    canvas.save(&args.out).map_err(|e| -> CliError {
        format!("failed to write {}: {}", args.out.display(), e).into()
    })?;
    tracing::info!(
        "warped image written to {} ({}x{})",
        args.out.display(),
        args.width,
        args.height
    );
    Ok(())
}
