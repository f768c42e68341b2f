use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cursortrail_core::TrailConfig;
use cursortrail_platform::{run_frames, FramePacer, Result, ScreenRect};

/// Fading cursor trail drawn on a transparent, click-through overlay.
#[derive(Parser, Debug)]
#[command(name = "cursortrail", version, about, long_about = None)]
struct Args {
    /// Sprite size in pixels
    #[arg(long, allow_negative_numbers = true)]
    size: Option<f32>,

    /// Trail texture path
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Initial life of each particle
    #[arg(long, allow_negative_numbers = true)]
    fade_time: Option<f32>,

    /// Life lost per frame, in (0, 1]
    #[arg(long, allow_negative_numbers = true)]
    fade_rate: Option<f32>,

    /// Interpolation interval in pixels; lower means a denser trail
    #[arg(long, allow_negative_numbers = true)]
    density: Option<f32>,

    /// Maximum number of particles (1-10000)
    #[arg(long, allow_negative_numbers = true)]
    particles: Option<i64>,

    /// Config file to load; a missing file means defaults
    #[arg(long, default_value = "cursortrail.conf")]
    config: PathBuf,

    /// Write the effective configuration to this file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Front end to run
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    backend: Backend,

    /// Window width when the screen size cannot be queried
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Window height when the screen size cannot be queried
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Layered overlay on Windows, window elsewhere
    Auto,
    /// Windows layered-window overlay
    Overlay,
    /// Portable transparent window
    Window,
}

impl Backend {
    fn resolve(self) -> Self {
        match self {
            Backend::Auto if cfg!(windows) => Backend::Overlay,
            Backend::Auto => Backend::Window,
            Backend::Overlay if !cfg!(windows) => {
                warn!("overlay backend needs Windows; using window backend");
                Backend::Window
            }
            other => other,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Init logging
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    info!("CursorTrail starting");
    match run(&args) {
        Ok(()) => {
            info!("CursorTrail stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("CursorTrail error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args);
    info!("Effective configuration:\n{}", config.summary());

    if let Some(path) = &args.save_config {
        if let Err(err) = config.save(path) {
            warn!("Failed to save config: {err}");
        }
    }

    let mut pacer = FramePacer::default();
    match args.backend.resolve() {
        Backend::Overlay => run_overlay(config, &mut pacer),
        _ => {
            let rect = window_rect(args);
            let mut driver = cursortrail_desktop::DesktopWindow::new(config, rect)?;
            run_frames(&mut driver, &mut pacer)
        }
    }
}

/// File values first, then command-line overrides, then one validation pass.
fn build_config(args: &Args) -> TrailConfig {
    let mut config = TrailConfig::load_or_default(&args.config);
    if let Some(size) = args.size {
        config.sprite_size = size;
    }
    if let Some(texture) = &args.texture {
        config.texture_path = texture.clone();
    }
    if let Some(fade_time) = args.fade_time {
        config.fade_time = fade_time;
    }
    if let Some(fade_rate) = args.fade_rate {
        config.fade_rate = fade_rate;
    }
    if let Some(density) = args.density {
        config.spawn_frequency = density;
    }
    if let Some(particles) = args.particles {
        if let Err(warning) = config.set_max_particles(particles) {
            warn!("{warning}");
        }
    }
    for warning in config.validate() {
        warn!("{warning}");
    }
    config
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        fn run_overlay(config: TrailConfig, pacer: &mut FramePacer) -> Result<()> {
            let mut driver = cursortrail_win::WinOverlay::new(config)?;
            run_frames(&mut driver, pacer)
        }

        fn window_rect(_args: &Args) -> ScreenRect {
            cursortrail_win::primary_screen_rect()
        }
    } else {
        fn run_overlay(_config: TrailConfig, _pacer: &mut FramePacer) -> Result<()> {
            Err("overlay backend is only available on Windows".into())
        }

        fn window_rect(args: &Args) -> ScreenRect {
            ScreenRect::new(0, 0, args.width.max(1), args.height.max(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["cursortrail", "--config", "no-such-dir/cursortrail.conf"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = parse(&[]);
        assert_eq!(args.backend, Backend::Auto);
        assert_eq!(build_config(&args), TrailConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "--size",
            "20",
            "--texture",
            "spark.png",
            "--fade-time",
            "2",
            "--fade-rate",
            "0.1",
            "--density",
            "3",
            "--particles",
            "100",
        ]);
        let config = build_config(&args);
        assert_eq!(config.sprite_size, 20.0);
        assert_eq!(config.texture_path, PathBuf::from("spark.png"));
        assert_eq!(config.fade_time, 2.0);
        assert_eq!(config.fade_rate, 0.1);
        assert_eq!(config.spawn_frequency, 3.0);
        assert_eq!(config.max_particles, 100);
    }

    #[test]
    fn test_invalid_flags_fall_back_to_defaults() {
        let args = parse(&["--fade-rate", "5", "--particles", "0"]);
        let config = build_config(&args);
        assert_eq!(config, TrailConfig::default());
    }

    #[test]
    fn test_negative_values_warn_instead_of_failing_to_parse() {
        let args = parse(&["--particles", "-5", "--fade-rate", "-0.5"]);
        assert_eq!(args.particles, Some(-5));
        assert_eq!(args.fade_rate, Some(-0.5));
        assert_eq!(build_config(&args), TrailConfig::default());
    }

    #[test]
    fn test_oversized_particle_count_falls_back() {
        let args = parse(&["--particles", "5000000000"]);
        assert_eq!(build_config(&args).max_particles, 2048);
    }

    #[test]
    fn test_backend_resolution() {
        let resolved = Backend::Auto.resolve();
        if cfg!(windows) {
            assert_eq!(resolved, Backend::Overlay);
        } else {
            assert_eq!(resolved, Backend::Window);
            assert_eq!(Backend::Overlay.resolve(), Backend::Window);
        }
        assert_eq!(Backend::Window.resolve(), Backend::Window);
    }

    #[test]
    fn test_backend_flag_parses() {
        assert_eq!(parse(&["--backend", "window"]).backend, Backend::Window);
        assert!(Args::try_parse_from(["cursortrail", "--backend", "opengl"]).is_err());
    }
}
