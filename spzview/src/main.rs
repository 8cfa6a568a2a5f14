use clap::{ArgGroup, Parser};
use spzview_lib::common::DEFAULT_FRACTIONAL_BITS;
use spzview_lib::{
    compress, pack_for_gpu, CameraConfig, DecompressOptions, Drawable, FrameInput, FrameOutcome,
    GaussianCloud, GaussianPoint, RenderBackend, RenderError, SpzError, SurfaceSize, Viewer,
};
use std::error::Error;
use std::fs;
use std::process;
use std::str::FromStr;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "SPZ Viewer",
    version = "1.0",
    author = "Denis Avvakumov",
    about = "Loads SPZ splat files and replays touch gestures against a headless renderer"
)]
#[command(group(
    ArgGroup::new("source").required(true).args(&["input", "synthesize"])
))]
struct Cli {
    #[arg(
        short = 'i',
        long = "input",
        value_name = "INPUT",
        help = "Path to the .spz file to load."
    )]
    input: Option<String>,

    #[arg(
        short = 's',
        long = "synthesize",
        value_name = "POINTS",
        help = "Generate a synthetic cloud with this many points instead of reading a file."
    )]
    synthesize: Option<usize>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "OUTPUT",
        requires = "synthesize",
        help = "Write the synthesized .spz file here."
    )]
    output: Option<String>,

    #[arg(
        short = 'm',
        long = "max-output",
        value_name = "BYTES",
        help = "Fail instead of inflating more than this many bytes."
    )]
    max_output: Option<usize>,

    #[arg(
        long = "sensitivity",
        value_name = "RADIANS",
        default_value = "0.005",
        help = "Orbit radians per pixel of pan."
    )]
    sensitivity: f32,

    #[arg(
        short = 'r',
        long = "radius",
        value_name = "RADIUS",
        default_value = "10.0",
        help = "Initial orbit radius."
    )]
    radius: f32,

    #[arg(
        short = 'g',
        long = "gesture",
        value_name = "GESTURE",
        help = "Gesture to replay before rendering: 'begin X Y', 'pan X Y', 'end' or 'pinch S'. Repeatable."
    )]
    gestures: Vec<Gesture>,

    #[arg(
        short = 'f',
        long = "frames",
        value_name = "FRAMES",
        default_value = "1",
        help = "Number of frames to render."
    )]
    frames: u32,

    #[arg(long = "width", default_value = "1280", help = "Surface width.")]
    width: u32,

    #[arg(long = "height", default_value = "720", help = "Surface height.")]
    height: u32,

    #[arg(
        short = 'a',
        long = "async",
        default_value = "false",
        help = "Enable asynchronous decompression mode."
    )]
    async_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Begin(f32, f32),
    Pan(f32, f32),
    End,
    Pinch(f32),
}

impl FromStr for Gesture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let kind = parts.next().ok_or("empty gesture")?;
        let mut num = |name: &str| -> Result<f32, String> {
            parts
                .next()
                .ok_or_else(|| format!("'{}' needs {}", kind, name))?
                .parse::<f32>()
                .map_err(|e| format!("bad {} in '{}': {}", name, s, e))
        };
        let gesture = match kind {
            "begin" => Gesture::Begin(num("x")?, num("y")?),
            "pan" => Gesture::Pan(num("x")?, num("y")?),
            "pinch" => Gesture::Pinch(num("scale")?),
            "end" => Gesture::End,
            other => return Err(format!("unknown gesture '{}'", other)),
        };
        Ok(gesture)
    }
}

/// Renderer stand-in that logs what a GPU backend would receive.
#[derive(Debug, Default)]
struct HeadlessBackend {
    frames: u32,
}

impl RenderBackend for HeadlessBackend {
    fn init(&mut self, size: SurfaceSize) -> Result<(), RenderError> {
        log::info!("Headless surface {}x{}", size.width, size.height);
        Ok(())
    }

    fn resize(&mut self, size: SurfaceSize) {
        log::info!("Swapchain resized to {}x{}", size.width, size.height);
    }

    fn draw(&mut self, _drawable: &Drawable<'_>, frame: &FrameInput<'_>) {
        self.frames += 1;
        let cam = frame.camera;
        log::debug!(
            "Frame {}: {} splats, yaw {:.3} pitch {:.3} zoom {:.3}",
            self.frames,
            frame.points.num_points,
            cam.yaw,
            cam.pitch,
            cam.zoom
        );
    }

    fn teardown(&mut self) {
        log::info!("Headless renderer released after {} frames", self.frames);
    }
}

fn synthetic_cloud(num_points: usize) -> GaussianCloud {
    let points = (0..num_points)
        .map(|i| {
            let t = i as f32 / num_points.max(1) as f32 * std::f32::consts::TAU;
            let half = t * 0.5;
            GaussianPoint {
                position: [t.cos() * 2.0, (t * 3.0).sin() * 0.5, t.sin() * 2.0],
                scale: [-4.0, -4.0, -4.5],
                rotation: [0.0, half.sin(), 0.0, half.cos()],
                color: [0.5 + 0.5 * t.cos(), 0.5, 0.5 + 0.5 * t.sin(), 0.9],
            }
        })
        .collect();
    GaussianCloud {
        num_points,
        sh_degree: 0,
        antialiased: false,
        points,
        sh: Vec::new(),
    }
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let compressed = match (&cli.input, cli.synthesize) {
        (Some(path), _) => fs::read(path).unwrap_or_else(|e| {
            log::error!("Error reading input file {}: {}", path, e);
            process::exit(1);
        }),
        (None, Some(n)) => {
            let spz = compress(&synthetic_cloud(n), DEFAULT_FRACTIONAL_BITS, 6)?;
            if let Some(out) = &cli.output {
                fs::write(out, &spz).map_err(SpzError::IoError)?;
                log::info!("Wrote synthetic SPZ with {} points to '{}'", n, out);
            }
            spz
        }
        (None, None) => unreachable!("clap requires a source"),
    };

    let camera_config = CameraConfig {
        sensitivity: cli.sensitivity,
        base_radius: cli.radius,
        ..Default::default()
    };
    let mut options = DecompressOptions::default();
    if let Some(limit) = cli.max_output {
        options = options.with_max_output(limit);
    }
    let viewer = Viewer::new(HeadlessBackend::default(), camera_config, options);

    let start = Instant::now();
    let loaded = if cli.async_mode {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        rt.block_on(viewer.load_spz_async(&compressed))
    } else {
        viewer.load_spz(&compressed)
    };
    let cloud = loaded.unwrap_or_else(|e| {
        log::error!("Failed to load SPZ data: {}", e);
        process::exit(1);
    });
    log::info!(
        "Decoded {} splats from {} bytes in {} ms",
        cloud.num_points,
        compressed.len(),
        start.elapsed().as_millis()
    );

    if let Some(gpu) = pack_for_gpu(&cloud) {
        log::info!(
            "GPU buffer: {} bytes, bounds min {:?} max {:?}",
            gpu.as_bytes().len(),
            gpu.bounds.min,
            gpu.bounds.max
        );
    }

    for gesture in &cli.gestures {
        match *gesture {
            Gesture::Begin(x, y) => viewer.on_pan_begin(x, y),
            Gesture::Pan(x, y) => viewer.on_pan_change(x, y),
            Gesture::End => viewer.on_pan_end(),
            Gesture::Pinch(s) => viewer.on_pinch_change(s),
        }
    }

    viewer.init_renderer(cli.width, cli.height)?;
    let mut surface = 0u8;
    let drawable = Drawable::new(&mut surface);
    let drawn = (0..cli.frames)
        .filter(|_| viewer.render_frame(&drawable) == FrameOutcome::Drawn)
        .count();
    viewer.teardown_renderer();

    let cam = viewer.camera().snapshot();
    println!(
        "Rendered {} frame(s): yaw {:.4}, pitch {:.4}, radius {:.3}",
        drawn,
        cam.yaw,
        cam.pitch,
        cam.radius(&camera_config)
    );

    Ok(())
}
