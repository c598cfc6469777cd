//! Where frames come from: ffmpeg-decoded files and streams, V4L2 cameras,
//! still images and built-in test patterns, plus a pump thread that paces a
//! source and hands frames to the renderer over a bounded channel.

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use image::imageops::FilterType;
use log::{debug, info};

use crate::color::Rgb;
use crate::pixel_buffer::PixelBuffer;

pub const DEFAULT_SOURCE_WIDTH: u32 = 320;
pub const DEFAULT_SOURCE_HEIGHT: u32 = 240;

const SYSFS_VIDEO4LINUX: &str = "/sys/class/video4linux";
const DECODER_QUEUE_DEPTH: usize = 4;
const PUMP_QUEUE_DEPTH: usize = 2;

pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<PixelBuffer>>;

    fn label(&self) -> String;

    /// Human-readable camera name, when the source is a camera that has one.
    fn device_name(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Gradient,
    Bars,
    Noise,
}

impl PatternKind {
    pub const ALL: [PatternKind; 3] = [Self::Gradient, Self::Bars, Self::Noise];

    pub fn name(self) -> &'static str {
        match self {
            Self::Gradient => "gradient",
            Self::Bars => "bars",
            Self::Noise => "noise",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(raw.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Ffmpeg { input: String },
    V4l2 { device: PathBuf },
    Image { path: PathBuf },
    Pattern(PatternKind),
}

impl SourceSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw.trim();
        if let Some(input) = value.strip_prefix("ffmpeg:") {
            let input = input.trim();
            if input.is_empty() {
                bail!("invalid --source '{}': missing ffmpeg input", raw);
            }
            return Ok(Self::Ffmpeg {
                input: input.to_owned(),
            });
        }

        if let Some(device) = value.strip_prefix("v4l2:") {
            let device = device.trim();
            if device.is_empty() {
                bail!("invalid --source '{}': missing v4l2 device", raw);
            }
            return Ok(Self::V4l2 {
                device: PathBuf::from(device),
            });
        }

        if let Some(path) = value.strip_prefix("image:") {
            let path = path.trim();
            if path.is_empty() {
                bail!("invalid --source '{}': missing image path", raw);
            }
            return Ok(Self::Image {
                path: PathBuf::from(path),
            });
        }

        if let Some(name) = value.strip_prefix("pattern:") {
            return PatternKind::parse(name).map(Self::Pattern).ok_or_else(|| {
                anyhow!(
                    "invalid --source '{}': unknown pattern '{}' (expected gradient, bars or noise)",
                    raw,
                    name.trim()
                )
            });
        }

        bail!(
            "invalid --source '{}': expected 'ffmpeg:<input>', 'v4l2:<device>', 'image:<path>', or 'pattern:<name>'",
            raw
        )
    }

    pub fn display_label(&self) -> String {
        match self {
            Self::Ffmpeg { input } => format!("ffmpeg:{input}"),
            Self::V4l2 { device } => format!("v4l2:{}", device.display()),
            Self::Image { path } => format!("image:{}", path.display()),
            Self::Pattern(kind) => format!("pattern:{}", kind.name()),
        }
    }

    /// Opens the source producing `width`x`height` frames.
    pub fn open(&self, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
        let source: Box<dyn FrameSource> = match self {
            Self::Ffmpeg { input } => Box::new(FfmpegSource::spawn(
                FfmpegInput::Url(input.clone()),
                width,
                height,
            )?),
            Self::V4l2 { device } => Box::new(FfmpegSource::spawn(
                FfmpegInput::V4l2(device.clone()),
                width,
                height,
            )?),
            Self::Image { path } => Box::new(ImageSource::open(path, width, height)?),
            Self::Pattern(kind) => Box::new(PatternSource::new(*kind, width, height)),
        };
        info!("opened frame source {}", source.label());
        Ok(source)
    }
}

#[derive(Debug, Clone)]
enum FfmpegInput {
    Url(String),
    V4l2(PathBuf),
}

/// ffmpeg decoding to packed `rgb24` at a fixed size, read on a worker
/// thread into a small bounded queue.
pub struct FfmpegSource {
    receiver: mpsc::Receiver<Vec<u8>>,
    worker: Option<JoinHandle<Result<()>>>,
    child: Child,
    width: u32,
    height: u32,
    label: String,
    device_name: Option<String>,
}

impl FfmpegSource {
    fn spawn(input: FfmpegInput, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("ffmpeg output size must be non-zero, got {width}x{height}");
        }
        let size = format!("{}x{}", width, height);
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(DECODER_QUEUE_DEPTH);

        let mut command = Command::new("ffmpeg");
        command.arg("-hide_banner").arg("-loglevel").arg("error");
        let (label, device_name) = match &input {
            FfmpegInput::Url(url) => {
                command.arg("-i").arg(url);
                (format!("ffmpeg:{url}"), None)
            }
            FfmpegInput::V4l2(device) => {
                command.arg("-f").arg("v4l2").arg("-i").arg(device);
                (
                    format!("v4l2:{}", device.display()),
                    v4l2_device_name(Path::new(SYSFS_VIDEO4LINUX), device),
                )
            }
        };
        let mut child = command
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(size)
            .arg("-sws_flags")
            .arg("area")
            .arg("-")
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to spawn ffmpeg decoder for {label}"))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to capture ffmpeg stdout"))?;
        let frame_size = width as usize * height as usize * 3;

        let worker = thread::Builder::new()
            .name("poorlaroid-ffmpeg-decoder".to_owned())
            .spawn(move || {
                loop {
                    let mut buffer = vec![0u8; frame_size];
                    match stdout.read_exact(&mut buffer) {
                        Ok(()) => {
                            if sender.send(buffer).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                        Err(e) => return Err(anyhow!("failed to read from ffmpeg: {e}")),
                    }
                }
                Ok(())
            })
            .context("failed to spawn ffmpeg reader thread")?;

        Ok(Self {
            receiver,
            worker: Some(worker),
            child,
            width,
            height,
            label,
            device_name,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<PixelBuffer>> {
        match self.receiver.recv() {
            Ok(bytes) => Ok(Some(PixelBuffer::from_rgb24(
                self.width as usize,
                self.height as usize,
                bytes,
            )?)),
            Err(_) => {
                // The reader hung up: surface its error, if it had one.
                match self.worker.take() {
                    Some(handle) => match handle.join() {
                        Ok(result) => result.map(|()| None),
                        Err(_) => Err(anyhow!("ffmpeg reader thread panicked")),
                    },
                    None => Ok(None),
                }
            }
        }
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // The reader exits on its own once the receiver is gone.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// One still image, scaled once and repeated forever.
pub struct ImageSource {
    frame: PixelBuffer,
    label: String,
}

impl ImageSource {
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        let decoded = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?
            .to_rgb8();
        let scaled = if width > 0 && height > 0 && decoded.dimensions() != (width, height) {
            image::imageops::resize(&decoded, width, height, FilterType::Triangle)
        } else {
            decoded
        };
        Ok(Self {
            frame: PixelBuffer::from(scaled),
            label: format!("image:{}", path.display()),
        })
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self) -> Result<Option<PixelBuffer>> {
        Ok(Some(self.frame.clone()))
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

/// Deterministic synthetic frames; the same tick always yields the same
/// pixels.
#[derive(Debug, Clone)]
pub struct PatternSource {
    kind: PatternKind,
    width: usize,
    height: usize,
    tick: u64,
}

impl PatternSource {
    pub fn new(kind: PatternKind, width: u32, height: u32) -> Self {
        Self {
            kind,
            width: width.max(1) as usize,
            height: height.max(1) as usize,
            tick: 0,
        }
    }

    pub fn frame_at(&self, tick: u64) -> PixelBuffer {
        let (width, height) = (self.width, self.height);
        match self.kind {
            PatternKind::Gradient => {
                let drift = (tick * 8 % 256) as u8;
                PixelBuffer::from_fn(width, height, |x, y| {
                    Rgb::new(
                        (x * 255 / (width - 1).max(1)) as u8,
                        (y * 255 / (height - 1).max(1)) as u8,
                        drift,
                    )
                })
            }
            PatternKind::Bars => {
                const BARS: [Rgb; 8] = [
                    Rgb::WHITE,
                    Rgb::new(255, 255, 0),
                    Rgb::new(0, 255, 255),
                    Rgb::new(0, 255, 0),
                    Rgb::new(255, 0, 255),
                    Rgb::new(255, 0, 0),
                    Rgb::new(0, 0, 255),
                    Rgb::BLACK,
                ];
                let shift = tick as usize % BARS.len();
                PixelBuffer::from_fn(width, height, |x, _| {
                    BARS[(x * BARS.len() / width + shift) % BARS.len()]
                })
            }
            PatternKind::Noise => {
                let mut state = tick.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
                PixelBuffer::from_fn(width, height, |_, _| {
                    // xorshift64
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    Rgb::gray((state >> 56) as u8)
                })
            }
        }
    }
}

impl FrameSource for PatternSource {
    fn next_frame(&mut self) -> Result<Option<PixelBuffer>> {
        let frame = self.frame_at(self.tick);
        self.tick += 1;
        Ok(Some(frame))
    }

    fn label(&self) -> String {
        format!("pattern:{}", self.kind.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub device: PathBuf,
    pub name: String,
}

/// V4L2 capture nodes under `sysfs_root`, sorted by device path.
pub fn list_cameras(sysfs_root: &Path) -> Vec<CameraInfo> {
    let Ok(entries) = fs::read_dir(sysfs_root) else {
        return Vec::new();
    };
    let mut cameras = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let node = entry.file_name().to_string_lossy().into_owned();
            let name = fs::read_to_string(entry.path().join("name")).ok()?;
            Some(CameraInfo {
                device: Path::new("/dev").join(&node),
                name: name.trim().to_owned(),
            })
        })
        .collect::<Vec<_>>();
    cameras.sort_by(|a, b| a.device.cmp(&b.device));
    cameras
}

pub fn system_cameras() -> Vec<CameraInfo> {
    list_cameras(Path::new(SYSFS_VIDEO4LINUX))
}

fn v4l2_device_name(sysfs_root: &Path, device: &Path) -> Option<String> {
    let node = device.file_name()?;
    let name = fs::read_to_string(sysfs_root.join(node).join("name")).ok()?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_owned())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// A frame source running on its own thread at a fixed rate.
pub struct FramePump {
    receiver: mpsc::Receiver<PixelBuffer>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<PumpStats>>>,
    label: String,
    device_name: Option<String>,
}

/// Starts pulling frames from `source` at `fps`. Frames the consumer is not
/// ready for are dropped rather than queued.
pub fn spawn_frame_pump(mut source: Box<dyn FrameSource>, fps: u32) -> Result<FramePump> {
    if fps == 0 {
        bail!("frame pump fps must be > 0");
    }
    let interval = Duration::from_secs_f64(1.0 / f64::from(fps));
    let (sender, receiver) = mpsc::sync_channel::<PixelBuffer>(PUMP_QUEUE_DEPTH);
    let stop = Arc::new(AtomicBool::new(false));
    let label = source.label();
    let device_name = source.device_name().map(str::to_owned);

    let worker_stop = Arc::clone(&stop);
    let worker = thread::Builder::new()
        .name("poorlaroid-frame-pump".to_owned())
        .spawn(move || {
            let mut stats = PumpStats::default();
            let mut deadline = Instant::now();
            while !worker_stop.load(Ordering::Acquire) {
                let Some(frame) = source.next_frame()? else {
                    break;
                };
                match sender.try_send(frame) {
                    Ok(()) => stats.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        stats.dropped += 1;
                        debug!("renderer busy, dropped frame {}", stats.dropped);
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
                deadline += interval;
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                } else {
                    deadline = now;
                }
            }
            Ok(stats)
        })
        .context("failed to spawn frame pump thread")?;

    Ok(FramePump {
        receiver,
        stop,
        worker: Some(worker),
        label,
        device_name,
    })
}

impl FramePump {
    /// Waits up to `timeout` for a frame. `Ok(None)` means nothing arrived in
    /// time; an error means the source ended.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<PixelBuffer>, PumpClosed> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PumpClosed),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn finish(mut self) -> Result<PumpStats> {
        self.stop.store(true, Ordering::Release);
        match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(anyhow!("frame pump thread panicked")),
            },
            None => Ok(PumpStats::default()),
        }
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// The pump's source is exhausted or its thread has stopped.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("frame source ended")]
pub struct PumpClosed;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::{
        list_cameras, spawn_frame_pump, v4l2_device_name, FrameSource, PatternKind,
        PatternSource, SourceSpec,
    };
    use crate::color::Rgb;

    #[test]
    fn parse_recognizes_every_prefix() {
        assert_eq!(
            SourceSpec::parse(" ffmpeg:clip.mp4 ").expect("ffmpeg spec"),
            SourceSpec::Ffmpeg {
                input: "clip.mp4".to_owned()
            }
        );
        assert_eq!(
            SourceSpec::parse("v4l2:/dev/video2").expect("v4l2 spec"),
            SourceSpec::V4l2 {
                device: PathBuf::from("/dev/video2")
            }
        );
        assert_eq!(
            SourceSpec::parse("image:still.png").expect("image spec"),
            SourceSpec::Image {
                path: PathBuf::from("still.png")
            }
        );
        assert_eq!(
            SourceSpec::parse("pattern:BARS").expect("pattern spec"),
            SourceSpec::Pattern(PatternKind::Bars)
        );
    }

    #[test]
    fn parse_rejects_missing_payloads_and_unknown_kinds() {
        for raw in ["ffmpeg:", "v4l2: ", "image:", "pattern:plasma", "webcam"] {
            let error = SourceSpec::parse(raw).expect_err("spec should be rejected");
            assert!(error.to_string().contains("invalid --source"), "{error}");
        }
    }

    #[test]
    fn labels_round_trip_through_parse() {
        let spec = SourceSpec::parse("pattern:noise").expect("pattern spec");
        assert_eq!(spec.display_label(), "pattern:noise");
        assert_eq!(SourceSpec::parse(&spec.display_label()).expect("reparse"), spec);
    }

    #[test]
    fn patterns_are_deterministic() {
        for kind in PatternKind::ALL {
            let a = PatternSource::new(kind, 32, 24);
            let b = PatternSource::new(kind, 32, 24);
            assert_eq!(a.frame_at(7), b.frame_at(7));
        }
    }

    #[test]
    fn gradient_spans_full_range() {
        let mut source = PatternSource::new(PatternKind::Gradient, 16, 16);
        let frame = source.next_frame().expect("pattern frame").expect("frame");
        assert_eq!(frame.get(0, 0), Some(Rgb::new(0, 0, 0)));
        assert_eq!(frame.get(15, 15), Some(Rgb::new(255, 255, 0)));
        assert_eq!(source.label(), "pattern:gradient");
    }

    #[test]
    fn camera_names_come_from_sysfs() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let root = temp.path();
        for (node, name) in [("video2", "Rear Camera\n"), ("video0", "Front Camera\n")] {
            fs::create_dir_all(root.join(node)).expect("node dir");
            fs::write(root.join(node).join("name"), name).expect("name file");
        }
        fs::create_dir_all(root.join("video9")).expect("nameless node");

        let cameras = list_cameras(root);
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].device, Path::new("/dev/video0"));
        assert_eq!(cameras[0].name, "Front Camera");
        assert_eq!(
            v4l2_device_name(root, Path::new("/dev/video2")).as_deref(),
            Some("Rear Camera")
        );
        assert_eq!(v4l2_device_name(root, Path::new("/dev/video9")), None);
    }

    #[test]
    fn image_source_scales_to_requested_size() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("still.png");
        image::RgbImage::from_pixel(10, 10, image::Rgb([10, 20, 30]))
            .save(&path)
            .expect("write png");
        let spec = SourceSpec::parse(&format!("image:{}", path.display())).expect("image spec");
        let mut source = spec.open(40, 30).expect("open image");
        let frame = source.next_frame().expect("read").expect("frame");
        assert_eq!((frame.width(), frame.height()), (40, 30));
        assert_eq!(frame.get(20, 15), Some(Rgb::new(10, 20, 30)));
    }

    #[test]
    fn pump_delivers_frames_until_finished() {
        let source = Box::new(PatternSource::new(PatternKind::Bars, 8, 8));
        let pump = spawn_frame_pump(source, 200).expect("pump should start");
        assert_eq!(pump.label(), "pattern:bars");
        let frame = pump
            .recv_timeout(Duration::from_secs(2))
            .expect("pump open")
            .expect("frame within timeout");
        assert_eq!(frame.width(), 8);
        let stats = pump.finish().expect("pump should stop cleanly");
        assert!(stats.delivered >= 1);
    }

    #[test]
    fn zero_fps_is_rejected() {
        let source = Box::new(PatternSource::new(PatternKind::Noise, 4, 4));
        assert!(spawn_frame_pump(source, 0).is_err());
    }
}
