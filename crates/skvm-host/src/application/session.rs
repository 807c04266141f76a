//! The session state machine coordinating serial, input, and video.
//!
//! ```text
//!          connect                       middle button
//! Idle ───────────▶ Connecting ──▶ Active ─────────────▶ Suspended
//!  ▲                    │            │  ▲                    │
//!  │      reset         │ failure    │  └───── resume ───────┘
//!  ├──────────────── Error ◀─────────┘
//!  └────────────────────────────── disconnect (from anywhere open)
//! ```
//!
//! Opening is all-or-nothing: if the capture device fails after the serial
//! port opened, the port is closed again before the session lands in
//! `Error`.  There is no silent auto-retry on any path; every transition is
//! published on a watch channel so the shell can follow along.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use skvm_core::domain::report::MouseMode;
use skvm_core::protocol::ack::{AckOutcome, AckTracker};
use skvm_core::protocol::codec::{encode, FrameDecoder};
use skvm_core::protocol::frame::{ChipInfo, CommandCode, FrameKind, SerialCommand};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::forward_input::{ForwardOutcome, InputForwarder, InputTranslator};
use crate::infrastructure::input_capture::{InputSource, RawInputEvent};
use crate::infrastructure::serial::{SerialTransport, TransportError};
use crate::infrastructure::storage::config::AppConfig;
use crate::infrastructure::video::pipeline::{VideoEvents, VideoPipeline};
use crate::infrastructure::video::{FrameSource, VideoEvent};

/// Error type for session operations.  The failing collaborator is always
/// named so the shell can tell the user which cable to check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("serial transport failed: {0}")]
    Serial(String),
    #[error("video capture failed: {0}")]
    Capture(String),
    #[error("input capture failed: {0}")]
    Input(String),
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("cannot {action} in the {state} state")]
    InvalidState {
        action: &'static str,
        state: String,
    },
}

/// Session lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No devices open.
    Idle,
    /// Devices are being opened under the connect timeout.
    Connecting,
    /// Input is forwarded and video flows.
    Active,
    /// Devices stay open but forwarding is stopped (user pressed the exit
    /// button); `resume` re-enters `Active`.
    Suspended,
    /// A collaborator failed; `reset` tears down whatever is still open.
    Error(SessionError),
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Error(_) => "error",
        }
    }
}

/// One published state change.
#[derive(Debug, Clone)]
pub struct SessionNotice {
    /// Identifies the connection attempt; regenerated on every `connect`.
    pub session_id: Uuid,
    pub state: SessionState,
}

/// The commands sent to the chip right after the port opens.
///
/// The mode frame puts the chip's mouse interface into absolute mode; the
/// `GetInfo` probe confirms the chip is alive and tells us whether the
/// target has enumerated its USB side.
fn init_commands(mode: MouseMode) -> Vec<SerialCommand> {
    let mut cmds = Vec::new();
    if mode == MouseMode::Absolute {
        cmds.push(SerialCommand::new(CommandCode::ConfigQuery, vec![0x01, 0x00]));
    }
    cmds.push(SerialCommand::get_info());
    cmds
}

/// Coordinates the serial transport, input forwarder, and video pipeline.
pub struct SessionController {
    config: AppConfig,
    session_id: Uuid,
    state_tx: watch::Sender<SessionNotice>,
    ack: Arc<Mutex<AckTracker>>,
    transport: Option<Arc<dyn SerialTransport>>,
    pipeline: Option<VideoPipeline>,
    forwarder: Option<InputForwarder>,
    events: Option<mpsc::Receiver<RawInputEvent>>,
    decode_task: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Creates an idle controller and the state-change subscription.
    pub fn new(config: AppConfig) -> (Self, watch::Receiver<SessionNotice>) {
        let session_id = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(SessionNotice {
            session_id,
            state: SessionState::Idle,
        });
        (
            Self {
                config,
                session_id,
                state_tx,
                ack: Arc::new(Mutex::new(AckTracker::new())),
                transport: None,
                pipeline: None,
                forwarder: None,
                events: None,
                decode_task: None,
            },
            state_rx,
        )
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().state.clone()
    }

    /// Subscription to the video event stream, once connected.  Frames are
    /// latest-wins; geometry announcements always precede their frames.
    pub fn video_events(&self) -> Option<VideoEvents> {
        self.pipeline.as_ref().map(|p| p.subscribe())
    }

    fn publish(&self, state: SessionState) {
        info!(session = %self.session_id, "session state: {}", state.name());
        let _ = self.state_tx.send(SessionNotice {
            session_id: self.session_id,
            state,
        });
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidState {
            action,
            state: self.state().name().to_string(),
        }
    }

    /// Opens both collaborators and enters `Active`.
    ///
    /// `open_transport` runs on a blocking thread (serial opens block); the
    /// frame source is opened inside the video pipeline.  The whole opening
    /// phase is bounded by the configured connect timeout.  Partial success
    /// is rolled back: a capture failure closes the already-open port.
    pub async fn connect<F>(
        &mut self,
        open_transport: F,
        frame_source: Box<dyn FrameSource>,
        input: &dyn InputSource,
    ) -> Result<(), SessionError>
    where
        F: FnOnce() -> Result<Arc<dyn SerialTransport>, TransportError> + Send + 'static,
    {
        if self.state() != SessionState::Idle {
            return Err(self.invalid("connect"));
        }
        self.session_id = Uuid::new_v4();
        self.publish(SessionState::Connecting);

        // Claim the event stream before touching any device so an input
        // failure needs no rollback.
        let events = match input.start() {
            Ok(events) => events,
            Err(e) => {
                let e = SessionError::Input(e.to_string());
                self.publish(SessionState::Error(e.clone()));
                return Err(e);
            }
        };

        let connect_timeout = Duration::from_millis(self.config.host.connect_timeout_ms);
        let poll_timeout = Duration::from_millis(self.config.video.poll_timeout_ms);

        let opened = tokio::time::timeout(connect_timeout, async move {
            let transport = tokio::task::spawn_blocking(open_transport)
                .await
                .map_err(|e| SessionError::Serial(format!("open task failed: {e}")))?
                .map_err(|e| SessionError::Serial(e.to_string()))?;

            let pipeline =
                tokio::task::spawn_blocking(move || VideoPipeline::start(frame_source, poll_timeout))
                    .await
                    .map_err(|e| SessionError::Capture(format!("open task failed: {e}")))
                    .and_then(|r| r.map_err(|e| SessionError::Capture(e.to_string())));

            match pipeline {
                Ok(pipeline) => Ok((transport, pipeline)),
                Err(e) => {
                    // Half-open rollback: never leave the port claimed when
                    // the session cannot start.
                    transport.shutdown();
                    Err(e)
                }
            }
        })
        .await;

        let (transport, pipeline) = match opened {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                self.publish(SessionState::Error(e.clone()));
                return Err(e);
            }
            Err(_) => {
                let e = SessionError::ConnectTimeout(connect_timeout);
                self.publish(SessionState::Error(e.clone()));
                return Err(e);
            }
        };

        let format = pipeline.negotiated_format();
        info!(
            "video negotiated: {}x{} @ {} fps",
            format.width, format.height, format.frame_rate
        );

        self.spawn_decode_task(&transport);
        self.send_init(&transport).await;

        let translator = InputTranslator::new(
            self.config.input.key_space,
            self.config.input.mouse_mode,
            self.config.input.capture_width,
            self.config.input.capture_height,
        );
        self.forwarder = Some(InputForwarder::new(
            translator,
            Arc::clone(&transport),
            Arc::clone(&self.ack),
        ));
        self.events = Some(events);
        self.transport = Some(transport);
        self.pipeline = Some(pipeline);

        self.publish(SessionState::Active);
        Ok(())
    }

    /// Runs the active session until it leaves `Active`, returning the new
    /// state.  Call again after `resume`.
    pub async fn run_active(&mut self) -> SessionState {
        if self.state() != SessionState::Active {
            return self.state();
        }
        let (Some(mut forwarder), Some(mut events)) = (self.forwarder.take(), self.events.take())
        else {
            // Connected state always has both; treat as broken session.
            let e = SessionError::Serial("session lost its forwarder".into());
            self.teardown().await;
            self.publish(SessionState::Error(e.clone()));
            return SessionState::Error(e);
        };
        let Some(mut video) = self.pipeline.as_ref().map(|p| p.subscribe()) else {
            self.forwarder = Some(forwarder);
            self.events = Some(events);
            let e = SessionError::Capture("session lost its video pipeline".into());
            self.teardown().await;
            self.publish(SessionState::Error(e.clone()));
            return SessionState::Error(e);
        };

        let next = tokio::select! {
            outcome = forwarder.run(&mut events) => {
                self.forwarder = Some(forwarder);
                self.events = Some(events);
                match outcome {
                    ForwardOutcome::ExitRequested => SessionState::Suspended,
                    ForwardOutcome::SourceClosed => {
                        info!("input source closed; disconnecting");
                        self.teardown().await;
                        SessionState::Idle
                    }
                    ForwardOutcome::Transport(e) => {
                        let e = SessionError::Serial(e.to_string());
                        self.teardown().await;
                        SessionState::Error(e)
                    }
                }
            }
            failure = watch_capture_failure(&mut video) => {
                self.forwarder = Some(forwarder);
                self.events = Some(events);
                let e = SessionError::Capture(failure);
                self.teardown().await;
                SessionState::Error(e)
            }
        };
        self.publish(next.clone());
        next
    }

    /// Re-enters `Active` from `Suspended`.  The devices never closed, so
    /// this is purely a state change; forwarding resumes on the next
    /// `run_active`.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.state() != SessionState::Suspended {
            return Err(self.invalid("resume"));
        }
        self.publish(SessionState::Active);
        Ok(())
    }

    /// Closes both collaborators and returns to `Idle`.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Active | SessionState::Suspended => {
                // Best effort: leave the target without held keys.
                if let Some(forwarder) = self.forwarder.as_mut() {
                    if let Err(e) = forwarder.flush_release().await {
                        warn!("release-all on disconnect failed: {e}");
                    }
                }
                self.teardown().await;
                self.publish(SessionState::Idle);
                Ok(())
            }
            _ => Err(self.invalid("disconnect")),
        }
    }

    /// Tears down anything still open after a failure and returns to `Idle`.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state(), SessionState::Error(_)) {
            return Err(self.invalid("reset"));
        }
        self.teardown().await;
        self.publish(SessionState::Idle);
        Ok(())
    }

    async fn teardown(&mut self) {
        if let Some(task) = self.decode_task.take() {
            task.abort();
        }
        if let Some(transport) = self.transport.take() {
            transport.shutdown();
        }
        if let Some(pipeline) = self.pipeline.take() {
            // Joining the pull thread blocks; keep it off the runtime.
            let _ = tokio::task::spawn_blocking(move || pipeline.shutdown()).await;
        }
        self.forwarder = None;
        self.events = None;
        if let Ok(mut ack) = self.ack.lock() {
            ack.clear();
        }
    }

    /// Sends the connect-time init frames.  Failures are logged, not fatal:
    /// a chip that ignores configuration still forwards reports.
    async fn send_init(&self, transport: &Arc<dyn SerialTransport>) {
        for cmd in init_commands(self.config.input.mouse_mode) {
            if let Ok(mut ack) = self.ack.lock() {
                ack.record(cmd.code);
            }
            if let Err(e) = transport.send(encode(&cmd)).await {
                warn!("device init frame {:?} failed: {e}", cmd.code);
            }
        }
    }

    /// Spawns the task that decodes inbound chunks and resolves acks.
    fn spawn_decode_task(&mut self, transport: &Arc<dyn SerialTransport>) {
        let mut inbound = match transport.subscribe() {
            Ok(rx) => rx,
            Err(e) => {
                warn!("inbound stream unavailable: {e}");
                return;
            }
        };
        let ack = Arc::clone(&self.ack);
        let session = self.session_id;
        self.decode_task = Some(tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            while let Some(chunk) = inbound.recv().await {
                decoder.extend(&chunk);
                loop {
                    match decoder.next_frame() {
                        Ok(Some(frame)) => handle_inbound(&ack, session, &frame),
                        Ok(None) => break,
                        Err(e) => debug!("framing noise: {e}"),
                    }
                }
            }
            debug!("inbound stream closed");
        }));
    }
}

fn handle_inbound(ack: &Arc<Mutex<AckTracker>>, session: Uuid, frame: &SerialCommand) {
    let outcome = match ack.lock() {
        Ok(mut tracker) => tracker.resolve(frame),
        Err(_) => return,
    };
    match outcome {
        AckOutcome::Acknowledged { sequence } => {
            debug!(session = %session, sequence, code = ?frame.code, "frame acknowledged");
            if frame.code == CommandCode::GetInfo && frame.kind == FrameKind::Response {
                if let Some(info) = ChipInfo::parse(&frame.payload) {
                    info!(
                        "chip {} usb_enumerated={} caps_lock={}",
                        info.version, info.usb_enumerated, info.caps_lock
                    );
                }
            }
        }
        AckOutcome::Rejected { sequence, status } => {
            warn!(session = %session, sequence, code = ?frame.code, "chip rejected frame: {status:?}");
        }
        AckOutcome::Unsolicited => {
            debug!(session = %session, code = ?frame.code, "unsolicited frame ignored");
        }
    }
}

/// Waits until the capture pipeline reports failure, returning the message.
/// A stopped pipeline counts as a failure too.
async fn watch_capture_failure(events: &mut VideoEvents) -> String {
    loop {
        match events.next().await {
            Some(VideoEvent::Failed(e)) => return e.to_string(),
            Some(_) => continue,
            None => return "capture pipeline stopped".to_string(),
        }
    }
}
