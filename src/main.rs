//! Frame Sink CLI
//!
//! Drives the mock capture pipeline and writes every captured frame through
//! a [`FileSink`].

use clap::{Parser, ValueEnum};
use frame_sink::{
    capture::{Camera, FileConfig, MockCamera, PixelFormat},
    metrics::{MetricsRegistry, MetricsSnapshot},
    sink::{default_stream_names, FileSink, FrameSink},
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Mono8,
    Yuyv,
    Nv12,
    Xy10,
}

impl From<FormatArg> for PixelFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Mono8 => PixelFormat::Mono8,
            FormatArg::Yuyv => PixelFormat::Yuyv,
            FormatArg::Nv12 => PixelFormat::Nv12,
            FormatArg::Xy10 => PixelFormat::Xy10,
        }
    }
}

/// Capture frames from a mock camera and write them to files.
#[derive(Debug, Parser)]
#[command(name = "frame-sink", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output filename pattern; `#` becomes `<stream>-<sequence>`
    #[arg(short = 'o', long)]
    pattern: Option<String>,

    /// Number of requests to capture
    #[arg(short = 'n', long)]
    frames: Option<u32>,

    /// Number of streams to configure
    #[arg(short, long)]
    streams: Option<u32>,

    /// Pixel format of every stream
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Capture until interrupted
    #[arg(long)]
    continuous: bool,

    /// Serve metrics on this port (requires the `metrics` feature)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Print metrics in Prometheus text format when done
    #[arg(long)]
    print_metrics: bool,
}

fn load_config(args: &Args) -> FileConfig {
    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    if let Some(pattern) = &args.pattern {
        config.sink.pattern = pattern.clone();
    }
    if let Some(frames) = args.frames {
        config.output.frame_count = frames;
    }
    if let Some(streams) = args.streams {
        config.capture.streams = streams;
    }
    if let Some(format) = args.format {
        config.capture.pixel_format = format.into();
    }
    if let Some(port) = args.metrics_port {
        config.output.metrics_port = port;
    }
    config.output.continuous |= args.continuous;
    config
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(
    port: u16,
) -> Option<Arc<tokio::sync::RwLock<frame_sink::metrics::MetricsState>>> {
    use frame_sink::metrics::{MetricsServer, MetricsServerConfig};

    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Metrics server disabled: {}", e);
            return None;
        }
    };
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
    let state = server.state();

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });

    Some(state)
}

fn main() {
    // Diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args);

    info!(
        "Frame Sink v{} session started at {}",
        frame_sink::VERSION,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let mut camera = MockCamera::new();
    if let Err(e) = camera.open(&config.capture) {
        eprintln!("Failed to open camera: {}", e);
        std::process::exit(1);
    }

    let streams = camera.configurations();
    let camera_id = config.capture.camera_id();
    let names = default_stream_names(&camera_id, streams.iter().map(|(id, _)| *id));
    let mut sink = FileSink::from_config(camera_id, names, &config.sink);

    if let Err(e) = sink.configure(&streams) {
        error!("Failed to configure sink: {}", e);
        std::process::exit(1);
    }

    // A buffer that cannot be mapped can never be written.
    for (stream, _) in &streams {
        for buffer in camera.buffers(*stream) {
            if let Err(e) = sink.map_buffer(buffer) {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };

    #[cfg(feature = "metrics")]
    let served = match config.output.metrics_port {
        0 => None,
        port => spawn_metrics_server(port),
    };
    #[cfg(not(feature = "metrics"))]
    if config.output.metrics_port != 0 {
        warn!("Built without the `metrics` feature, not serving metrics");
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    let frame_interval = Duration::from_micros(1_000_000 / u64::from(config.capture.fps));
    info!(
        pattern = sink.pattern().template(),
        append = sink.pattern().is_append(),
        "Capturing..."
    );

    let mut captured = 0u32;
    while running.load(Ordering::SeqCst)
        && (config.output.continuous || captured < config.output.frame_count)
    {
        captured = captured.saturating_add(1);
        let request = match camera.capture() {
            Ok(request) => request,
            Err(e) => {
                warn!("Frame capture failed: {}", e);
                if config.output.continuous {
                    std::thread::sleep(frame_interval);
                }
                continue;
            }
        };

        sink.process_request(&request);

        let snapshot = MetricsSnapshot::from_sink(&sink);
        registry.update(&snapshot);
        #[cfg(feature = "metrics")]
        if let Some(state) = &served {
            state.blocking_write().update(&snapshot);
        }

        if config.output.continuous {
            std::thread::sleep(frame_interval);
        }
    }

    camera.close();

    let stats = sink.stats();
    info!(
        "Processed {} requests: {} frames written ({} bytes), {} open errors, {} write errors",
        stats.requests,
        stats.frames_written,
        stats.bytes_written,
        stats.open_errors,
        stats.write_errors
    );
    if stats.dng_frames + stats.dng_errors > 0 {
        info!(
            "DNG: {} written, {} failed",
            stats.dng_frames, stats.dng_errors
        );
    }

    if args.print_metrics {
        match registry.encode() {
            Ok(output) => print!("{}", output),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }
}
