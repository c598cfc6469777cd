//! Render thread for live sessions.
//!
//! Frames reach the thread through a one-slot channel, so whoever feeds it
//! (and reads console commands) never waits on a pass and can cancel the one
//! in flight through its own [`SessionHandle`].

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use log::debug;

use crate::cell_grid::CellGrid;
use crate::pixel_buffer::PixelBuffer;
use crate::session::{FrameOutcome, SessionHandle};

const RENDER_QUEUE_DEPTH: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rendered: u64,
    pub interrupted: u64,
    /// Frames refused because the queue was full.
    pub dropped: u64,
}

#[derive(Debug)]
pub struct RenderWorker {
    sender: Option<SyncSender<PixelBuffer>>,
    worker: Option<JoinHandle<Result<RenderStats>>>,
    dropped: u64,
}

/// Starts the render thread. `on_rendered` sees the grid after every
/// completed pass; an error from it stops the thread.
pub fn spawn_render_worker<F>(session: SessionHandle, mut on_rendered: F) -> Result<RenderWorker>
where
    F: FnMut(&CellGrid) -> Result<()> + Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel::<PixelBuffer>(RENDER_QUEUE_DEPTH);
    let worker = thread::Builder::new()
        .name("poorlaroid-render".to_owned())
        .spawn(move || {
            let mut stats = RenderStats::default();
            for frame in receiver {
                match session.deliver_frame(&frame) {
                    FrameOutcome::Rendered => {
                        stats.rendered += 1;
                        on_rendered(&session.snapshot_grid())?;
                    }
                    outcome => {
                        stats.interrupted += 1;
                        debug!("frame not rendered: {outcome:?}");
                    }
                }
            }
            Ok(stats)
        })
        .context("failed to spawn render thread")?;

    Ok(RenderWorker {
        sender: Some(sender),
        worker: Some(worker),
        dropped: 0,
    })
}

impl RenderWorker {
    /// Queues `frame` unless a frame is already waiting. Returns whether it
    /// was queued; an error means the render thread has stopped.
    pub fn submit(&mut self, frame: PixelBuffer) -> Result<bool> {
        let Some(sender) = &self.sender else {
            return Err(anyhow!("render thread already finished"));
        };
        match sender.try_send(frame) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("render thread stopped")),
        }
    }

    /// Lets queued frames drain, then joins the thread.
    pub fn finish(mut self) -> Result<RenderStats> {
        drop(self.sender.take());
        let mut stats = match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result?,
                Err(_) => return Err(anyhow!("render thread panicked")),
            },
            None => RenderStats::default(),
        };
        stats.dropped = self.dropped;
        Ok(stats)
    }
}
