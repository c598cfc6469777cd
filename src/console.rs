//! Line-oriented command console for a live session.
//!
//! Replies are short upper-case status lines; malformed input is answered,
//! never fatal, and never touches the canvas.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Result;
use log::{debug, warn};
use regex::Regex;

use crate::frame_source::CameraInfo;
use crate::session::SessionHandle;

fn cam_pattern() -> &'static Regex {
    static CAM_RE: OnceLock<Regex> = OnceLock::new();
    CAM_RE.get_or_init(|| Regex::new(r"(?i)^cam(?:\s+(\S*))?$").expect("cam regex should compile"))
}

fn shader_pattern() -> &'static Regex {
    static SHADER_RE: OnceLock<Regex> = OnceLock::new();
    SHADER_RE.get_or_init(|| {
        Regex::new(r"(?i)^shader(?:\s+(\w+))?$").expect("shader regex should compile")
    })
}

pub const COMMANDS: [&str; 10] = [
    "help", "shaders", "shader", "cycle", "flip", "cams", "cam", "capture", "clear", "exit",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Shaders,
    Shader(Option<String>),
    Cycle,
    Flip,
    Cams,
    /// `None` when no index was given, `Some(Err(raw))` when it was not a
    /// number.
    Cam(Option<Result<usize, String>>),
    Capture,
    Clear,
    Exit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "help" => return Command::Help,
        "shaders" => return Command::Shaders,
        "cycle" => return Command::Cycle,
        "flip" => return Command::Flip,
        "cams" => return Command::Cams,
        "capture" => return Command::Capture,
        "clear" => return Command::Clear,
        "exit" | "quit" => return Command::Exit,
        _ => {}
    }

    if let Some(captures) = cam_pattern().captures(line) {
        let index = captures
            .get(1)
            .map(|raw| raw.as_str())
            .filter(|raw| !raw.is_empty())
            .map(|raw| raw.parse::<usize>().map_err(|_| raw.to_owned()));
        return Command::Cam(index);
    }
    if let Some(captures) = shader_pattern().captures(line) {
        return Command::Shader(captures.get(1).map(|name| name.as_str().to_owned()));
    }
    Command::Unknown(line.to_owned())
}

/// What the live loop has to do besides printing the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    None,
    ClearScreen,
    SwitchCamera(CameraInfo),
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub action: ConsoleAction,
}

impl Reply {
    fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            action: ConsoleAction::None,
        }
    }

    fn action(action: ConsoleAction) -> Self {
        Self {
            lines: Vec::new(),
            action,
        }
    }

    /// Reply lines as printed, each behind a prompt marker.
    pub fn render(&self) -> String {
        self.lines.iter().map(|line| format!("> {line}\n")).collect()
    }
}

/// Hooks the console needs from whatever hosts the session.
pub trait ConsoleHost {
    fn cameras(&self) -> Vec<CameraInfo>;

    /// Rasterizes the current canvas and writes it out.
    fn capture(&mut self) -> Result<PathBuf>;
}

pub struct Console {
    session: SessionHandle,
}

impl Console {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    pub fn handle_line(&mut self, line: &str, host: &mut dyn ConsoleHost) -> Reply {
        let command = parse_command(line);
        debug!("console command: {command:?}");
        self.execute(command, host)
    }

    pub fn execute(&mut self, command: Command, host: &mut dyn ConsoleHost) -> Reply {
        match command {
            Command::Help => {
                let mut lines = vec!["RECOGNIZED COMMANDS:".to_owned()];
                lines.extend(COMMANDS.iter().map(|name| (*name).to_owned()));
                Reply::lines(lines)
            }
            Command::Shaders => {
                let active = self.session.active_shader();
                let mut lines = vec!["AVAILABLE SHADERS:".to_owned()];
                lines.extend(self.session.shader_names().iter().map(|name| {
                    let marker = if Some(*name) == active { "*" } else { " " };
                    format!("{marker} {name}")
                }));
                Reply::lines(lines)
            }
            Command::Shader(None) => Reply::lines(["PLEASE NAME A SHADER"]),
            Command::Shader(Some(name)) => match self.session.select_shader(&name) {
                Ok(_) => Reply::lines(["SHADER APPLIED"]),
                Err(_) => Reply::lines(["SHADER UNAVAILABLE"]),
            },
            Command::Cycle => match self.session.cycle_shader() {
                Some(name) => Reply::lines([format!("SHADER APPLIED: {}", name.to_uppercase())]),
                None => Reply::lines(["SHADER UNAVAILABLE"]),
            },
            Command::Flip => {
                self.session.toggle_flip();
                Reply::lines(["FLIP WAS FLIPPED"])
            }
            Command::Cams => {
                let cameras = host.cameras();
                let mut lines = vec!["AVAILABLE CAMERAS:".to_owned()];
                lines.extend(
                    cameras
                        .iter()
                        .enumerate()
                        .map(|(index, camera)| format!("[{index}] {}", camera.name)),
                );
                Reply::lines(lines)
            }
            Command::Cam(None) | Command::Cam(Some(Err(_))) => {
                Reply::lines(["PLEASE SPECIFY A NUMBER"])
            }
            Command::Cam(Some(Ok(index))) => match host.cameras().into_iter().nth(index) {
                Some(camera) => {
                    self.session.set_flip_from_device(&camera.name);
                    Reply {
                        lines: vec![format!("CAMERA SELECTED: {}", camera.name)],
                        action: ConsoleAction::SwitchCamera(camera),
                    }
                }
                None => Reply::lines(["CAMERA UNAVAILABLE"]),
            },
            Command::Capture => match host.capture() {
                Ok(path) => Reply::lines([format!("CAPTURE SAVED: {}", path.display())]),
                Err(error) => {
                    warn!("capture failed: {error:#}");
                    Reply::lines(["CAPTURE FAILED"])
                }
            },
            Command::Clear => Reply::action(ConsoleAction::ClearScreen),
            Command::Exit => Reply::action(ConsoleAction::Exit),
            Command::Unknown(_) => Reply::lines(["QUERY NOT RECOGNIZED"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use anyhow::{bail, Result};

    use super::{parse_command, Command, Console, ConsoleAction, ConsoleHost};
    use crate::frame_source::CameraInfo;
    use crate::session::{Session, SessionHandle};
    use crate::shaders::ShaderBank;

    struct FakeHost {
        cameras: Vec<CameraInfo>,
        fail_capture: bool,
        captures: usize,
    }

    impl FakeHost {
        fn new() -> Self {
            Self {
                cameras: vec![
                    CameraInfo {
                        device: PathBuf::from("/dev/video0"),
                        name: "Front Camera".to_owned(),
                    },
                    CameraInfo {
                        device: PathBuf::from("/dev/video1"),
                        name: "Rear Camera".to_owned(),
                    },
                ],
                fail_capture: false,
                captures: 0,
            }
        }
    }

    impl ConsoleHost for FakeHost {
        fn cameras(&self) -> Vec<CameraInfo> {
            self.cameras.clone()
        }

        fn capture(&mut self) -> Result<PathBuf> {
            if self.fail_capture {
                bail!("disk full");
            }
            self.captures += 1;
            Ok(PathBuf::from("/tmp/poorlaroid240101_00_00_00.bmp"))
        }
    }

    fn console() -> (Console, SessionHandle) {
        let session = SessionHandle::new(Session::new(4, 4, ShaderBank::standard()));
        (Console::new(session.clone()), session)
    }

    #[test]
    fn parses_commands_and_arguments() {
        assert_eq!(parse_command("  HELP "), Command::Help);
        assert_eq!(parse_command("cam 2"), Command::Cam(Some(Ok(2))));
        assert_eq!(parse_command("cam"), Command::Cam(None));
        assert_eq!(
            parse_command("cam two"),
            Command::Cam(Some(Err("two".to_owned())))
        );
        assert_eq!(
            parse_command("shader Noire"),
            Command::Shader(Some("Noire".to_owned()))
        );
        assert_eq!(parse_command("shader"), Command::Shader(None));
        assert_eq!(
            parse_command("make coffee"),
            Command::Unknown("make coffee".to_owned())
        );
    }

    #[test]
    fn shader_commands_report_outcome() {
        let (mut console, session) = console();
        let mut host = FakeHost::new();
        let reply = console.handle_line("shader typewriter", &mut host);
        assert_eq!(reply.lines, vec!["SHADER APPLIED"]);
        assert_eq!(session.active_shader(), Some("Typewriter"));

        let reply = console.handle_line("shader sepia", &mut host);
        assert_eq!(reply.lines, vec!["SHADER UNAVAILABLE"]);
        assert_eq!(session.active_shader(), Some("Typewriter"));

        let reply = console.handle_line("cycle", &mut host);
        assert_eq!(reply.lines, vec!["SHADER APPLIED: CAMSOLE"]);
    }

    #[test]
    fn flip_toggles_session() {
        let (mut console, session) = console();
        let reply = console.handle_line("flip", &mut FakeHost::new());
        assert_eq!(reply.render(), "> FLIP WAS FLIPPED\n");
        assert!(session.flip());
    }

    #[test]
    fn camera_selection_validates_index_and_sets_flip() {
        let (mut console, session) = console();
        let mut host = FakeHost::new();
        assert_eq!(
            console.handle_line("cam", &mut host).lines,
            vec!["PLEASE SPECIFY A NUMBER"]
        );
        assert_eq!(
            console.handle_line("cam 7", &mut host).lines,
            vec!["CAMERA UNAVAILABLE"]
        );

        let reply = console.handle_line("cam 0", &mut host);
        assert_eq!(reply.lines, vec!["CAMERA SELECTED: Front Camera"]);
        match reply.action {
            ConsoleAction::SwitchCamera(camera) => {
                assert_eq!(camera.device, Path::new("/dev/video0"))
            }
            other => panic!("expected camera switch, got {other:?}"),
        }
        assert!(session.flip());

        console.handle_line("cam 1", &mut host);
        assert!(!session.flip());
    }

    #[test]
    fn cams_lists_devices_with_indices() {
        let (mut console, _) = console();
        let reply = console.handle_line("cams", &mut FakeHost::new());
        assert_eq!(
            reply.lines,
            vec!["AVAILABLE CAMERAS:", "[0] Front Camera", "[1] Rear Camera"]
        );
    }

    #[test]
    fn capture_reports_path_or_failure() {
        let (mut console, _) = console();
        let mut host = FakeHost::new();
        let reply = console.handle_line("capture", &mut host);
        assert!(reply.lines[0].starts_with("CAPTURE SAVED: "));
        assert_eq!(host.captures, 1);

        host.fail_capture = true;
        assert_eq!(
            console.handle_line("capture", &mut host).lines,
            vec!["CAPTURE FAILED"]
        );
    }

    #[test]
    fn unknown_input_changes_nothing() {
        let (mut console, session) = console();
        let before = session.snapshot_grid();
        let reply = console.handle_line("rm -rf /", &mut FakeHost::new());
        assert_eq!(reply.lines, vec!["QUERY NOT RECOGNIZED"]);
        assert_eq!(reply.action, ConsoleAction::None);
        assert_eq!(session.snapshot_grid(), before);
    }

    #[test]
    fn exit_and_clear_are_actions() {
        let (mut console, _) = console();
        let mut host = FakeHost::new();
        assert_eq!(console.handle_line("exit", &mut host).action, ConsoleAction::Exit);
        assert_eq!(
            console.handle_line("clear", &mut host).action,
            ConsoleAction::ClearScreen
        );
    }
}
