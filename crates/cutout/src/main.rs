//! cutout: run the crop and border nodes on image files.
//!
//! `crop` drives the full interactive handshake with a scripted UI that
//! answers the preview with a fixed outline, so the same node, session
//! store and callback handlers a host would use run end to end.
//! `border` runs the mask border node. `nodes` prints the node registry.
//!
//! # Usage
//!
//! ```text
//! cutout crop photo.png --points '[{"x":10,"y":10},{"x":90,"y":15},{"x":50,"y":80}]' -o out.png
//! cutout border photo.png mask.png --width 12 --color black -o out.png
//! cutout nodes
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cutout_host::{
    APPLY_ROUTE, ApplyRequest, ChannelError, CropHandlers, CropState, HostConfig,
    IrregularCropNode, PreviewMessage, SessionId, SessionStore, UiChannel, mask_border,
};
use cutout_pipeline::{
    BorderColor, BorderParams, CropMode, CropParams, Dimensions, FillPolicy, Frame, ImageBatch,
    Mask, MaskBatch, Point,
};

/// Irregular-region cropping and mask borders for image files.
#[derive(Parser)]
#[command(name = "cutout", version)]
struct Cli {
    /// Log node lifecycle and session traffic.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cut an image along a polygon, through the interactive node.
    Crop(CropArgs),
    /// Surround a masked object with a solid ring.
    Border(BorderArgs),
    /// Print the node registry as JSON.
    Nodes,
}

#[derive(Args)]
struct CropArgs {
    /// Input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Outline as a JSON array of `{"x", "y"}` points, or `@file` to read
    /// it from a file.
    #[arg(long)]
    points: String,

    /// Size of the canvas the outline was drawn on, as `WIDTHxHEIGHT`.
    /// Defaults to the image size.
    #[arg(long, value_parser = parse_dimensions)]
    canvas: Option<Dimensions>,

    /// Drawing tool reported to the UI.
    #[arg(long, value_enum, default_value_t = Mode::Polygon)]
    mode: Mode,

    /// Background outside the selection.
    #[arg(long, value_enum, default_value_t = Fill::Transparent)]
    fill: Fill,

    /// Edge smoothing radius (0-20).
    #[arg(long, default_value_t = 0)]
    smooth: u32,

    /// Keep the full image instead of trimming to the selection.
    #[arg(long)]
    no_auto_crop: bool,

    /// Padding around the trimmed selection (0-100).
    #[arg(long, default_value_t = 10)]
    padding: u32,

    /// Seconds to wait for the outline before passing the image through.
    #[arg(long, default_value_t = 60.0)]
    timeout: f64,

    /// Output image (PNG).
    #[arg(long, short)]
    output: PathBuf,

    /// Also write the selection mask (grayscale PNG).
    #[arg(long)]
    mask_output: Option<PathBuf>,
}

#[derive(Args)]
struct BorderArgs {
    /// Input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Mask image; its luminance is the mask.
    mask: PathBuf,

    /// Ring width in pixels (0-200).
    #[arg(long, default_value_t = 20)]
    width: u32,

    /// Ring color.
    #[arg(long, value_enum, default_value_t = Color::White)]
    color: Color,

    /// Keep the full image instead of trimming to object plus ring.
    #[arg(long)]
    no_auto_crop: bool,

    /// Padding around the trimmed region (0-100).
    #[arg(long, default_value_t = 10)]
    padding: u32,

    /// Output image (PNG).
    #[arg(long, short)]
    output: PathBuf,
}

/// Drawing tool selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Freehand stroke.
    FreeDraw,
    /// Click-to-place vertices.
    Polygon,
}

/// Background fill selection.
#[derive(Clone, Copy, ValueEnum)]
enum Fill {
    /// Mask becomes alpha.
    Transparent,
    /// Blend to black.
    Black,
    /// Blend to white.
    White,
    /// Blend to a 9x9 local average.
    Blur,
}

/// Border color selection.
#[derive(Clone, Copy, ValueEnum)]
enum Color {
    /// Pure white.
    White,
    /// Pure black.
    Black,
    /// Mid gray.
    Gray,
}

fn parse_dimensions(s: &str) -> Result<Dimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("{v:?}: {e}"));
    Ok(Dimensions::new(parse(w)?, parse(h)?))
}

/// Answers every preview with the same outline from a background thread,
/// the way a browser posts back to the host's apply route.
struct ReplayUi {
    handlers: CropHandlers,
    points: Vec<Point>,
    canvas: Option<Dimensions>,
    image: Dimensions,
}

impl UiChannel for ReplayUi {
    fn publish(&self, event: &str, payload: serde_json::Value) -> Result<(), ChannelError> {
        let preview: PreviewMessage =
            serde_json::from_value(payload).map_err(|e| ChannelError {
                event: event.to_owned(),
                reason: e.to_string(),
            })?;
        tracing::debug!(
            session_id = %preview.session_id,
            mode = preview.crop_mode.as_str(),
            fill = %preview.background_fill,
            preview_bytes = preview.encoded_preview_image.len(),
            "preview received"
        );

        let canvas = self.canvas.unwrap_or(self.image);
        let request = ApplyRequest {
            session_id: preview.session_id,
            path_points: self.points.clone(),
            image_width: canvas.width,
            image_height: canvas.height,
        };
        let body = serde_json::to_string(&request).map_err(|e| ChannelError {
            event: event.to_owned(),
            reason: e.to_string(),
        })?;

        let handlers = self.handlers.clone();
        thread::spawn(move || {
            let response = handlers.dispatch(APPLY_ROUTE, &body);
            tracing::debug!(%response, "apply answered");
        });
        Ok(())
    }
}

fn load_batch(path: &Path) -> Result<ImageBatch, Box<dyn Error>> {
    let decoded = image::open(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    Ok(ImageBatch::single(Frame::from_dynamic(&decoded)))
}

fn load_mask(path: &Path) -> Result<Mask, Box<dyn Error>> {
    let decoded = image::open(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    Ok(decoded.to_luma32f())
}

fn load_points(arg: &str) -> Result<Vec<Point>, Box<dyn Error>> {
    let json = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}"))?,
        None => arg.to_owned(),
    };
    Ok(serde_json::from_str(&json)?)
}

fn save_frame(frame: &Frame, path: &Path) -> Result<(), Box<dyn Error>> {
    let dynamic = frame.to_dynamic();
    let result = if frame.channels() == 4 {
        dynamic.to_rgba8().save(path)
    } else {
        dynamic.to_rgb8().save(path)
    };
    result.map_err(|e| format!("writing {}: {e}", path.display()))?;
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn save_mask(mask: &Mask, path: &Path) -> Result<(), Box<dyn Error>> {
    let gray = image::GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        image::Luma([(mask.get_pixel(x, y).0[0].clamp(0.0, 1.0) * 255.0).round() as u8])
    });
    gray.save(path).map_err(|e| format!("writing {}: {e}", path.display()))?;
    Ok(())
}

fn run_crop(args: &CropArgs) -> Result<(), Box<dyn Error>> {
    let batch = load_batch(&args.image)?;
    let points = load_points(&args.points)?;

    // The outline is drawn on the image itself unless `--canvas` says
    // otherwise, so the image's own size is always an acceptable canvas.
    let config = HostConfig {
        wait_timeout: Duration::try_from_secs_f64(args.timeout)?,
        oversize_pixels: HostConfig::DEFAULT_OVERSIZE_PIXELS.max(batch.dimensions().area()),
        ..HostConfig::default()
    };
    let store = Arc::new(SessionStore::new(config.session_ttl));
    let ui = ReplayUi {
        handlers: CropHandlers::new(Arc::clone(&store), config.clone()),
        points,
        canvas: args.canvas,
        image: batch.dimensions(),
    };
    let node = IrregularCropNode::new(store, ui, config);

    let params = CropParams {
        crop_mode: match args.mode {
            Mode::FreeDraw => CropMode::FreeDraw,
            Mode::Polygon => CropMode::Polygon,
        },
        background_fill: match args.fill {
            Fill::Transparent => FillPolicy::Transparent,
            Fill::Black => FillPolicy::Black,
            Fill::White => FillPolicy::White,
            Fill::Blur => FillPolicy::Blur,
        },
        edge_smooth: args.smooth,
        auto_crop: !args.no_auto_crop,
        crop_padding: args.padding,
    };

    let input = batch.dimensions();
    let output = node.execute(SessionId::from("cli"), batch, params);
    if output.state != CropState::Completed {
        eprintln!("warning: crop ended as {:?}; writing the input unchanged", output.state);
    }

    let frame = output
        .image
        .frames()
        .first()
        .ok_or("node returned no frames")?;
    save_frame(frame, &args.output)?;
    if let Some(ref mask_path) = args.mask_output {
        save_mask(output.mask.for_item(0), mask_path)?;
    }

    eprintln!(
        "{input} -> {} ({} channels), wrote {}",
        output.image.dimensions(),
        output.image.channels(),
        args.output.display()
    );
    Ok(())
}

fn run_border(args: &BorderArgs) -> Result<(), Box<dyn Error>> {
    let batch = load_batch(&args.image)?;
    let mask = MaskBatch::single(load_mask(&args.mask)?);
    let params = BorderParams {
        border_width: args.width,
        border_color: match args.color {
            Color::White => BorderColor::White,
            Color::Black => BorderColor::Black,
            Color::Gray => BorderColor::Gray,
        },
        auto_crop: !args.no_auto_crop,
        crop_padding: args.padding,
    };

    let output = mask_border(&batch, &mask, &params)?;
    let frame = output.frames().first().ok_or("border node returned no frames")?;
    save_frame(frame, &args.output)?;

    eprintln!(
        "{} -> {}, wrote {}",
        batch.dimensions(),
        output.dimensions(),
        args.output.display()
    );
    Ok(())
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    match &cli.command {
        Command::Crop(args) => run_crop(args),
        Command::Border(args) => run_border(args),
        Command::Nodes => {
            println!("{}", serde_json::to_string_pretty(cutout_host::NODES)?);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canvas_dimensions() {
        assert_eq!(parse_dimensions("640x480"), Ok(Dimensions::new(640, 480)));
        assert_eq!(parse_dimensions("8X4"), Ok(Dimensions::new(8, 4)));
        assert!(parse_dimensions("640").is_err());
        assert!(parse_dimensions("ax4").is_err());
    }

    #[test]
    fn inline_points_parse() {
        let points =
            load_points(r#"[{"x":1,"y":2},{"x":3,"y":4},{"x":5,"y":6}]"#).unwrap_or_default();
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], Point::new(5.0, 6.0));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
