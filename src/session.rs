//! Display-session state: the grid, the shader bank, the flip flag and the
//! live/capture mode, plus the thread-safe handle that frame sources and the
//! command console share.
//!
//! Passes are serialized by the session lock. The token of the pass in
//! flight lives in its own slot so that a shader swap or a capture can cancel
//! it without waiting for that lock. While such a control operation waits for
//! the lock, newly delivered frames yield to it instead of starting a pass.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::cell_grid::CellGrid;
use crate::error::{RenderError, SessionError};
use crate::pixel_buffer::PixelBuffer;
use crate::render_loop::{render_pass, CancelToken};
use crate::shaders::ShaderBank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Every delivered frame is rendered.
    Live,
    /// A capture is being taken; frames are dropped until it ends.
    Capture,
    /// The frame source has been released; frames are dropped.
    Suspended,
}

/// What happened to one delivered frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    Cancelled,
    Skipped(SessionMode),
    /// Dropped because a shader swap or capture was waiting for the session.
    Yielded,
    Failed(RenderError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCounters {
    pub completed: u64,
    pub cancelled: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Flip setting implied by a camera's name: front cameras mirror, rear
/// cameras do not, anything else has no opinion.
pub fn flip_for_device_name(name: &str) -> Option<bool> {
    let lowered = name.to_ascii_lowercase();
    if lowered.contains("front") {
        Some(true)
    } else if lowered.contains("rear") {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug)]
pub struct Session {
    grid: CellGrid,
    shaders: ShaderBank,
    flip: bool,
    mode: SessionMode,
    counters: PassCounters,
    last_degenerate: Option<(usize, usize)>,
}

impl Session {
    pub fn new(columns: usize, rows: usize, shaders: ShaderBank) -> Self {
        Self {
            grid: CellGrid::new(columns, rows),
            shaders,
            flip: false,
            mode: SessionMode::Live,
            counters: PassCounters::default(),
            last_degenerate: None,
        }
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn shaders(&self) -> &ShaderBank {
        &self.shaders
    }

    pub fn flip(&self) -> bool {
        self.flip
    }

    pub fn set_flip(&mut self, flip: bool) {
        self.flip = flip;
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn counters(&self) -> PassCounters {
        self.counters
    }

    /// Runs one pass over `frame` unless the session is not live.
    pub fn render_frame(&mut self, frame: &PixelBuffer, cancel: &CancelToken) -> FrameOutcome {
        if self.mode != SessionMode::Live {
            self.counters.skipped += 1;
            return FrameOutcome::Skipped(self.mode);
        }
        let Some(shader) = self.shaders.active_mut() else {
            self.counters.skipped += 1;
            return FrameOutcome::Skipped(self.mode);
        };

        match render_pass(frame, &mut self.grid, shader, self.flip, cancel) {
            Ok(()) => {
                self.counters.completed += 1;
                self.last_degenerate = None;
                FrameOutcome::Rendered
            }
            Err(RenderError::Cancelled) => {
                debug!("render pass cancelled");
                self.counters.cancelled += 1;
                FrameOutcome::Cancelled
            }
            Err(error) => {
                let dims = (frame.width(), frame.height());
                if self.last_degenerate != Some(dims) {
                    warn!("skipping frame: {error}");
                    self.last_degenerate = Some(dims);
                }
                self.counters.failed += 1;
                FrameOutcome::Failed(error)
            }
        }
    }

    /// Activates the next shader and clears the canvas.
    pub fn cycle_shader(&mut self) -> Option<&'static str> {
        let name = self.shaders.cycle()?;
        self.grid.clear();
        info!("shader: {name}");
        Some(name)
    }

    /// Activates the named shader and clears the canvas; an unknown name
    /// leaves both untouched.
    pub fn select_shader(&mut self, name: &str) -> Result<&'static str, SessionError> {
        let selected = self.shaders.select(name)?;
        self.grid.clear();
        info!("shader: {selected}");
        Ok(selected)
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }
}

/// Cloneable, thread-safe access to a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<Session>>,
    in_flight: Arc<Mutex<Option<CancelToken>>>,
    waiting: Arc<AtomicUsize>,
    shader_names: Arc<[&'static str]>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        let shader_names = session.shaders().names().into();
        Self {
            session: Arc::new(Mutex::new(session)),
            in_flight: Arc::new(Mutex::new(None)),
            waiting: Arc::new(AtomicUsize::new(0)),
            shader_names,
        }
    }

    /// Renders `frame` with a fresh cancellation token. Blocks while another
    /// pass holds the session.
    pub fn deliver_frame(&self, frame: &PixelBuffer) -> FrameOutcome {
        let mut session = self.lock_session();
        let token = CancelToken::new();
        *self.lock_in_flight() = Some(token.clone());
        // The token is published first: a claimant that arrives after this
        // check finds it and cancels, one that arrived before is seen here.
        let outcome = if self.waiting.load(Ordering::SeqCst) > 0 {
            session.counters.skipped += 1;
            FrameOutcome::Yielded
        } else {
            session.render_frame(frame, &token)
        };
        *self.lock_in_flight() = None;
        outcome
    }

    /// Cancels the pass in flight, if any.
    pub fn cancel_in_flight(&self) -> bool {
        match self.lock_in_flight().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cycle_shader(&self) -> Option<&'static str> {
        self.claim_session().cycle_shader()
    }

    pub fn select_shader(&self, name: &str) -> Result<&'static str, SessionError> {
        // An unknown name must not cancel the running pass.
        let wanted = name.trim();
        if !self
            .shader_names
            .iter()
            .any(|known| known.eq_ignore_ascii_case(wanted))
        {
            return Err(SessionError::UnknownShaderName(name.trim().to_owned()));
        }
        self.claim_session().select_shader(name)
    }

    pub fn active_shader(&self) -> Option<&'static str> {
        self.lock_session().shaders().active_name()
    }

    pub fn shader_names(&self) -> &[&'static str] {
        &self.shader_names
    }

    pub fn flip(&self) -> bool {
        self.lock_session().flip()
    }

    pub fn set_flip(&self, flip: bool) {
        self.lock_session().set_flip(flip);
    }

    /// Inverts the flip flag and returns the new value.
    pub fn toggle_flip(&self) -> bool {
        let mut session = self.lock_session();
        let flip = !session.flip();
        session.set_flip(flip);
        flip
    }

    /// Applies the flip implied by `device_name`, if it implies one.
    pub fn set_flip_from_device(&self, device_name: &str) -> bool {
        let mut session = self.lock_session();
        if let Some(flip) = flip_for_device_name(device_name) {
            debug!("flip {flip} from device name '{device_name}'");
            session.set_flip(flip);
        }
        session.flip()
    }

    pub fn mode(&self) -> SessionMode {
        self.lock_session().mode()
    }

    /// Stops live rendering and returns the grid as it stands.
    pub fn begin_capture(&self) -> Result<CellGrid, SessionError> {
        let mut session = self.claim_session();
        if session.mode == SessionMode::Suspended {
            return Err(SessionError::Suspended);
        }
        session.mode = SessionMode::Capture;
        Ok(session.grid.clone())
    }

    pub fn end_capture(&self) {
        let mut session = self.lock_session();
        if session.mode == SessionMode::Capture {
            session.mode = SessionMode::Live;
        }
    }

    pub fn suspend(&self) {
        self.claim_session().mode = SessionMode::Suspended;
    }

    /// Returns a suspended session to live rendering.
    pub fn resume(&self) {
        let mut session = self.lock_session();
        if session.mode == SessionMode::Suspended {
            session.mode = SessionMode::Live;
        }
    }

    pub fn clear(&self) {
        self.claim_session().clear();
    }

    pub fn snapshot_grid(&self) -> CellGrid {
        self.lock_session().grid().clone()
    }

    pub fn counters(&self) -> PassCounters {
        self.lock_session().counters()
    }

    /// Session lock for a control operation: cancels the pass in flight and
    /// makes new frames yield until the lock is taken.
    fn claim_session(&self) -> MutexGuard<'_, Session> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        self.cancel_in_flight();
        let session = self.lock_session();
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        session
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
