use aquamark::error::AquamarkError;
use aquamark::fonts::FontCache;
use aquamark::loader::{load_background, load_logo};
use aquamark::preview::PreviewCompositor;
use aquamark::scheduler::{
    render_snapshot, ExportEvent, ExportJob, ExportScheduler, StyleSnapshot,
};
use aquamark::style::{FontFamily, ImageStyle, TextStyle, TileMode, WatermarkStyle};
use clap::Parser;
use std::path::PathBuf;

/// Aquamark - apply a styled text or image watermark to a background image
#[derive(Parser, Debug)]
#[command(name = "aquamark")]
#[command(version, about, long_about = None)]
struct Args {
    /// Background image file
    #[arg(short, long)]
    input: PathBuf,

    /// Output file path (format from extension, PNG by default)
    #[arg(short, long)]
    output: PathBuf,

    /// YAML style file; overrides the individual style flags
    #[arg(long)]
    style: Option<PathBuf>,

    /// Logo image file (image watermark instead of text)
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Watermark text
    #[arg(long, default_value = "Text")]
    text: String,

    /// Font family (arial, courier-new, times-new-roman, calibri, david,
    /// segoe-ui, dejavu-serif, modern-no20)
    #[arg(long, default_value = "arial")]
    font: String,

    /// Text color as #RGB or #RRGGBB
    #[arg(long, default_value = "#000000")]
    color: String,

    /// Size scalar (0.2 - 8.0)
    #[arg(long, default_value_t = 1.0)]
    size: f64,

    /// Opacity percentage (1 - 100)
    #[arg(long, default_value_t = 100)]
    opacity: u8,

    /// Rotation in degrees (-180 - 180, positive = counter-clockwise)
    #[arg(long, default_value_t = 0)]
    rotation: i32,

    /// Tile mode (single, square, diamond)
    #[arg(long, default_value = "single")]
    tile: String,

    /// Gap between tiles in pixels (0 - 200)
    #[arg(long, default_value_t = 50)]
    gap: u32,

    /// Preview viewport as WxH; placement happens in this space
    #[arg(long, default_value = "1280x720")]
    viewport: String,

    /// Watermark anchor in preview coordinates as X,Y (default: center)
    #[arg(long)]
    anchor: Option<String>,
}

fn parse_pair(raw: &str, sep: char, what: &str) -> Result<(i64, i64), AquamarkError> {
    let mut parts = raw.splitn(2, sep);
    let first = parts.next().unwrap_or_default().trim();
    let second = parts.next().unwrap_or_default().trim();

    match (first.parse(), second.parse()) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        _ => Err(AquamarkError::Input(format!(
            "{} must be of the form A{}B, got '{}'",
            what, sep, raw
        ))),
    }
}

fn parse_font(raw: &str) -> Result<FontFamily, AquamarkError> {
    match raw {
        "arial" => Ok(FontFamily::Arial),
        "courier-new" => Ok(FontFamily::CourierNew),
        "times-new-roman" => Ok(FontFamily::TimesNewRoman),
        "calibri" => Ok(FontFamily::Calibri),
        "david" => Ok(FontFamily::David),
        "segoe-ui" => Ok(FontFamily::SegoeUi),
        "dejavu-serif" => Ok(FontFamily::DejaVuSerif),
        "modern-no20" => Ok(FontFamily::ModernNo20),
        other => Err(AquamarkError::Input(format!(
            "unknown font family '{}'",
            other
        ))),
    }
}

fn parse_tile(raw: &str) -> Result<TileMode, AquamarkError> {
    match raw {
        "single" => Ok(TileMode::Single),
        "square" => Ok(TileMode::Square),
        "diamond" => Ok(TileMode::Diamond),
        other => Err(AquamarkError::Input(format!("unknown tile mode '{}'", other))),
    }
}

fn build_style(args: &Args) -> Result<WatermarkStyle, AquamarkError> {
    if let Some(style_path) = &args.style {
        let raw = std::fs::read_to_string(style_path)
            .map_err(|e| AquamarkError::Input(format!("{}: {}", style_path.display(), e)))?;
        return serde_yaml::from_str(&raw)
            .map_err(|e| AquamarkError::Input(format!("{}: {}", style_path.display(), e)));
    }

    let tile = parse_tile(&args.tile)?;

    if let Some(logo) = &args.logo {
        return Ok(WatermarkStyle::Image(ImageStyle {
            source: logo.clone(),
            size: args.size,
            opacity: args.opacity,
            rotation: args.rotation,
            tile,
            tile_gap: args.gap,
        }));
    }

    Ok(WatermarkStyle::Text(TextStyle {
        text: args.text.clone(),
        font: parse_font(&args.font)?,
        color: args.color.clone(),
        size: args.size,
        opacity: args.opacity,
        rotation: args.rotation,
        tile,
        tile_gap: args.gap,
    }))
}

fn run(args: Args) -> Result<(), AquamarkError> {
    let (viewport_w, viewport_h) = parse_pair(&args.viewport, 'x', "viewport")?;
    if viewport_w <= 0 || viewport_h <= 0 {
        return Err(AquamarkError::Input(format!(
            "viewport dimensions must be positive, got '{}'",
            args.viewport
        )));
    }

    let background = load_background(&args.input, viewport_w as u32, viewport_h as u32)?;

    let style = build_style(&args)?;
    style.validate()?;

    let logo = match &style {
        WatermarkStyle::Image(image_style) => Some(load_logo(&image_style.source)?),
        WatermarkStyle::Text(_) => None,
    };

    let snapshot = StyleSnapshot {
        style,
        logo,
        viewport: (background.fitted.width, background.fitted.height),
    };

    let mut fonts = FontCache::new();
    let raster = render_snapshot(&snapshot, &mut fonts)?;

    let mut preview = PreviewCompositor::new(background.preview, background.fitted.ratio);
    preview.set_watermark(raster);

    if let Some(anchor) = &args.anchor {
        let (x, y) = parse_pair(anchor, ',', "anchor")?;
        let current = preview.anchor();
        preview.translate(x as i32 - current.x, y as i32 - current.y);
    }

    let watermark = preview
        .watermark()
        .cloned()
        .ok_or_else(|| AquamarkError::Render("no watermark to export".to_string()))?;

    // Export runs on its own worker; this thread just follows progress
    let (exporter, events) = ExportScheduler::spawn();
    exporter.begin(ExportJob {
        background: background.original,
        watermark,
        anchor: preview.anchor(),
        ratio: preview.ratio(),
        output: args.output.clone(),
    })?;

    loop {
        match events.recv() {
            Ok(ExportEvent::Started(path)) => {
                tracing::info!(output = %path.display(), "export started");
            }
            Ok(ExportEvent::Finished(path)) => {
                tracing::info!(output = %path.display(), "export finished");
                return Ok(());
            }
            Ok(ExportEvent::Failed { output, reason }) => {
                return Err(AquamarkError::Export(format!(
                    "{}: {}",
                    output.display(),
                    reason
                )));
            }
            Err(_) => {
                return Err(AquamarkError::Export(
                    "export worker stopped unexpectedly".to_string(),
                ));
            }
        }
    }
}

fn main() {
    // Initialize logging subsystem
    aquamark::logging::init_subscriber().expect("Failed to initialize logging subsystem");

    // Parse command-line arguments
    let args = Args::parse();

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        "starting watermark composition"
    );

    if let Err(e) = run(args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
