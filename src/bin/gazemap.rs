use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gazemap", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the four attention-layer PNGs for a document image.
    Render(RenderArgs),
    /// Print the content fingerprint of a document.
    Fingerprint(FingerprintArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input document image (PNG/JPEG).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Annotation JSON ({"points": [...], "regions": [...]}).
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Output directory for raw/heatmap/regions/combined PNGs.
    #[arg(long)]
    out_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct FingerprintArgs {
    /// Input document.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Fingerprint(args) => cmd_fingerprint(args),
    }
}

fn read_annotations(path: Option<&Path>) -> anyhow::Result<gazemap::AnnotationSet> {
    let Some(path) = path else {
        return Ok(gazemap::AnnotationSet::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read annotations '{}'", path.display()))?;
    Ok(gazemap::annotations_from_json(&text)?)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let image_bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let annotations = read_annotations(args.annotations.as_deref())?;

    let (set, dims) =
        gazemap::render_layer_set(&image_bytes, &annotations.points, &annotations.regions)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create '{}'", args.out_dir.display()))?;

    for kind in gazemap::LayerKind::ALL {
        let png = gazemap::encode::encode_png(set.get(kind))?;
        let out = args.out_dir.join(format!("{kind}.png"));
        std::fs::write(&out, &png).with_context(|| format!("write '{}'", out.display()))?;
        println!("{} ({}x{}, {} bytes)", out.display(), dims.width, dims.height, png.len());
    }
    Ok(())
}

fn cmd_fingerprint(args: FingerprintArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read '{}'", args.in_path.display()))?;
    println!("{}", gazemap::fingerprint_bytes(&bytes));
    Ok(())
}
