use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use poorlaroid::ansi::{cursor_home, to_ansi, to_plain_text};
use poorlaroid::config::{load_config, Config};
use poorlaroid::console::{Console, ConsoleAction, ConsoleHost};
use poorlaroid::export::capture_session;
use poorlaroid::frame_source::{
    spawn_frame_pump, system_cameras, CameraInfo, FramePump, SourceSpec, DEFAULT_SOURCE_HEIGHT,
    DEFAULT_SOURCE_WIDTH,
};
use poorlaroid::render_worker::spawn_render_worker;
use poorlaroid::session::{FrameOutcome, Session, SessionHandle};
use poorlaroid::shaders::ShaderBank;

const FRAME_WAIT: Duration = Duration::from_millis(50);
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Parser)]
#[command(name = "poorlaroid")]
#[command(about = "Render camera and video frames as colored character art")]
#[command(version)]
struct Cli {
    /// YAML config file; CLI flags override its values.
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a few passes from a source and print the result.
    Render {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long = "passes", default_value_t = 1)]
        passes: u32,
        /// Print glyphs only, without color escapes.
        #[arg(long = "plain", default_value_t = false)]
        plain: bool,
        /// Also save the final canvas as a BMP.
        #[arg(long = "export", default_value_t = false)]
        export: bool,
    },
    /// Render continuously, reading console commands from stdin.
    Live {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// List the available shaders in cycle order.
    Shaders {
        #[arg(long = "json", default_value_t = false)]
        json: bool,
    },
    /// Validate a config file.
    Check { path: PathBuf },
}

#[derive(Debug, Args)]
struct SessionArgs {
    /// Frame source: ffmpeg:<input>, v4l2:<device>, image:<path> or pattern:<name>.
    #[arg(long = "source")]
    source: String,
    #[arg(long = "shader")]
    shader: Option<String>,
    /// Grid size as COLSxROWS.
    #[arg(long = "size")]
    size: Option<String>,
    /// Decoded frame size as WIDTHxHEIGHT.
    #[arg(long = "frame-size")]
    frame_size: Option<String>,
    #[arg(long = "flip", default_value_t = false)]
    flip: bool,
    #[arg(long = "fps")]
    fps: Option<u32>,
    #[arg(long = "export-dir")]
    export_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ShaderListing {
    index: usize,
    name: &'static str,
    calibrated: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            session,
            passes,
            plain,
            export,
        } => run_render(cli.config.as_deref(), &session, passes, plain, export),
        Commands::Live { session } => run_live(cli.config.as_deref(), &session),
        Commands::Shaders { json } => run_shaders(json),
        Commands::Check { path } => run_check(&path),
    }
}

fn run_check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", config_path.display()))?;

    println!(
        "OK: {} ({}x{} grid, shader {}, {} fps, flip {})",
        config_path.display(),
        config.grid.columns,
        config.grid.rows,
        config.shader,
        config.fps,
        if config.flip { "on" } else { "off" }
    );
    match config.export_dir() {
        Ok(dir) => println!("Export: {}", dir.display()),
        Err(error) => println!("Export: unavailable ({error})"),
    }
    Ok(())
}

fn run_shaders(json: bool) -> Result<()> {
    let bank = ShaderBank::standard();
    let listings = bank
        .names()
        .into_iter()
        .enumerate()
        .map(|(index, name)| ShaderListing {
            index,
            name,
            calibrated: bank
                .get(name)
                .is_some_and(|shader| shader.calibration().is_some()),
        })
        .collect::<Vec<_>>();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&listings).context("failed to encode shader list")?
        );
    } else {
        for listing in &listings {
            println!("[{}] {}", listing.index, listing.name);
        }
    }
    Ok(())
}

fn run_render(
    config_path: Option<&Path>,
    args: &SessionArgs,
    passes: u32,
    plain: bool,
    export: bool,
) -> Result<()> {
    if passes == 0 {
        bail!("--passes must be > 0");
    }
    let config = resolve_config(config_path, args)?;
    let session = build_session(&config)?;
    let spec = SourceSpec::parse(&args.source)?;
    let (frame_width, frame_height) = frame_size(args)?;
    let mut source = spec.open(frame_width, frame_height)?;
    if let Some(name) = source.device_name() {
        session.set_flip_from_device(name);
    }
    if args.flip {
        session.set_flip(true);
    }

    let mut rendered = 0;
    for _ in 0..passes {
        let Some(frame) = source
            .next_frame()
            .with_context(|| format!("failed reading from {}", source.label()))?
        else {
            break;
        };
        match session.deliver_frame(&frame) {
            FrameOutcome::Rendered => rendered += 1,
            FrameOutcome::Failed(error) => {
                bail!("cannot render {}: {error}", source.label())
            }
            outcome => warn!("pass not completed: {outcome:?}"),
        }
    }
    if rendered == 0 {
        bail!("{} produced no frames", source.label());
    }

    let grid = session.snapshot_grid();
    let text = if plain {
        to_plain_text(&grid)
    } else {
        to_ansi(&grid)
    };
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .context("failed writing to stdout")?;
    stdout.flush().context("failed flushing stdout")?;

    if export {
        let path = capture_session(
            &session,
            &config.export_dir()?,
            config.export.cell.width,
            config.export.cell.height,
        )?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

struct LiveHost {
    session: SessionHandle,
    export_dir: PathBuf,
    cell_width: u32,
    cell_height: u32,
}

impl ConsoleHost for LiveHost {
    fn cameras(&self) -> Vec<CameraInfo> {
        system_cameras()
    }

    fn capture(&mut self) -> Result<PathBuf> {
        capture_session(
            &self.session,
            &self.export_dir,
            self.cell_width,
            self.cell_height,
        )
    }
}

fn run_live(config_path: Option<&Path>, args: &SessionArgs) -> Result<()> {
    let config = resolve_config(config_path, args)?;
    let session = build_session(&config)?;
    let (frame_width, frame_height) = frame_size(args)?;
    let spec = SourceSpec::parse(&args.source)?;
    let mut pump = spawn_frame_pump(spec.open(frame_width, frame_height)?, config.fps)?;
    if let Some(name) = pump.device_name() {
        session.set_flip_from_device(name);
    }
    if args.flip {
        session.set_flip(true);
    }

    let commands = spawn_stdin_reader()?;
    let mut console = Console::new(session.clone());
    let mut host = LiveHost {
        session: session.clone(),
        export_dir: config.export_dir()?,
        cell_width: config.export.cell.width,
        cell_height: config.export.cell.height,
    };

    let mut stdout = io::stdout();
    write_screen(&mut stdout, CLEAR_SCREEN)?;
    let mut renderer = spawn_render_worker(session.clone(), |grid| {
        let screen = format!("{}{}", cursor_home(), to_ansi(grid));
        write_screen(&mut io::stdout(), &screen)
    })?;
    info!("live from {} at {} fps", pump.label(), config.fps);

    'session: loop {
        match pump.recv_timeout(FRAME_WAIT) {
            Ok(Some(frame)) => {
                if let Err(error) = renderer.submit(frame) {
                    warn!("{error:#}");
                    break;
                }
            }
            Ok(None) => {}
            Err(closed) => {
                info!("{}: {closed}", pump.label());
                break;
            }
        }

        while let Ok(line) = commands.try_recv() {
            let reply = console.handle_line(&line, &mut host);
            eprint!("{}", reply.render());
            match reply.action {
                ConsoleAction::None => {}
                ConsoleAction::ClearScreen => write_screen(&mut stdout, CLEAR_SCREEN)?,
                ConsoleAction::SwitchCamera(camera) => {
                    // No passes while one camera is released and the next opens.
                    session.suspend();
                    match switch_camera(&camera, frame_width, frame_height, config.fps) {
                        Ok(next) => {
                            let previous = std::mem::replace(&mut pump, next);
                            if let Err(error) = previous.finish() {
                                warn!("previous source stopped with error: {error:#}");
                            }
                        }
                        Err(error) => warn!("cannot open {}: {error:#}", camera.device.display()),
                    }
                    session.resume();
                }
                ConsoleAction::Exit => break 'session,
            }
        }
    }

    session.suspend();
    let stats = pump.finish()?;
    let render_stats = renderer.finish()?;
    let counters = session.counters();
    eprintln!(
        "{} passes rendered, {} cancelled, {} frames dropped",
        counters.completed,
        counters.cancelled,
        stats.dropped + render_stats.dropped
    );
    Ok(())
}

fn switch_camera(camera: &CameraInfo, width: u32, height: u32, fps: u32) -> Result<FramePump> {
    let spec = SourceSpec::V4l2 {
        device: camera.device.clone(),
    };
    spawn_frame_pump(spec.open(width, height)?, fps)
}

fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>> {
    let (sender, receiver) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("poorlaroid-console".to_owned())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn console reader thread")?;
    Ok(receiver)
}

fn write_screen(stdout: &mut io::Stdout, text: &str) -> Result<()> {
    let mut lock = stdout.lock();
    lock.write_all(text.as_bytes())
        .context("failed writing to stdout")?;
    lock.flush().context("failed flushing stdout")
}

fn resolve_config(config_path: Option<&Path>, args: &SessionArgs) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    if let Some(shader) = &args.shader {
        config.shader = shader.clone();
    }
    if let Some(size) = &args.size {
        let (columns, rows) = parse_size(size, "--size")?;
        config.grid.columns = columns as usize;
        config.grid.rows = rows as usize;
    }
    if args.flip {
        config.flip = true;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(dir) = &args.export_dir {
        config.export.dir = Some(dir.to_string_lossy().into_owned());
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_session(config: &Config) -> Result<SessionHandle> {
    let session = SessionHandle::new(Session::new(
        config.grid.columns,
        config.grid.rows,
        ShaderBank::standard(),
    ));
    session.select_shader(&config.shader)?;
    session.set_flip(config.flip);
    Ok(session)
}

fn frame_size(args: &SessionArgs) -> Result<(u32, u32)> {
    match &args.frame_size {
        Some(raw) => parse_size(raw, "--frame-size"),
        None => Ok((DEFAULT_SOURCE_WIDTH, DEFAULT_SOURCE_HEIGHT)),
    }
}

fn parse_size(raw: &str, flag: &str) -> Result<(u32, u32)> {
    let value = raw.trim();
    let (width_raw, height_raw) = value
        .split_once('x')
        .or_else(|| value.split_once('X'))
        .ok_or_else(|| anyhow!("invalid {} '{}': expected WIDTHxHEIGHT", flag, raw))?;
    let width = width_raw
        .trim()
        .parse::<u32>()
        .with_context(|| format!("invalid {} '{}': width must be an integer", flag, raw))?;
    let height = height_raw
        .trim()
        .parse::<u32>()
        .with_context(|| format!("invalid {} '{}': height must be an integer", flag, raw))?;
    if width == 0 || height == 0 {
        bail!("invalid {} '{}': both dimensions must be > 0", flag, raw);
    }
    Ok((width, height))
}
