use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::video::debug_log;

/// Lifecycle of one viewing session. `Disposed` is reachable from anywhere;
/// everything else advances left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Ready,
    Playing,
    Ended,
    Disposed,
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback initialization failed: {0}")]
    InitFailed(String),
    #[error("no playable source")]
    NoSource,
}

/// What the lifecycle asks of the application after digesting an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The pre-buffer step resolved; the presentation surface now exists.
    SurfaceReady,
    /// Natural end-of-stream; navigate back to browsing. Fires at most once
    /// per session.
    ReturnToBrowsing,
    /// The pre-buffer step rejected; the session is already disposed.
    InitFailed(String),
}

/// The underlying media pipeline. `prepare` is the blocking pre-buffer step
/// and runs on a worker thread; the rest are issued from the worker loop in
/// response to controller commands.
pub trait MediaPipeline: Send {
    fn prepare(&mut self) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek_to_start(&mut self) -> Result<()>;
    /// Polls for natural end-of-stream. Returns true once the stream ended.
    fn poll_ended(&mut self) -> bool;
    fn shutdown(&mut self);
}

pub type PipelineFactory = Box<dyn Fn(&str) -> Result<Box<dyn MediaPipeline>> + Send>;

/// The visual binding for a prepared stream. Created exactly once, on the
/// Initializing -> Ready transition, and reused across redraws so the
/// player never flickers or restarts from a re-render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub source_url: String,
}

/// Pure session state machine. Thread-free so the transition rules — and in
/// particular the dispose-while-initializing race — are testable directly.
pub struct PlaybackSession {
    source_url: String,
    state: SessionState,
    autoplay: bool,
    surface: Option<Surface>,
    return_emitted: bool,
}

/// What dispose needs from the pipeline, given the state it left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeAction {
    /// Was presenting: pause, rewind to the start, then release.
    PauseAndReset,
    /// Never presented: just release.
    ReleaseOnly,
    /// Second call; nothing left to do.
    AlreadyDisposed,
}

impl PlaybackSession {
    pub fn new(source_url: String) -> Self {
        Self {
            source_url,
            state: SessionState::Initializing,
            autoplay: true,
            surface: None,
            return_emitted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Digests the pre-buffer outcome. A success that lands after disposal
    /// must not attach a surface; that is the race this machine exists for.
    pub fn on_initialized(&mut self, outcome: Result<(), String>) -> Option<LifecycleEvent> {
        if self.state != SessionState::Initializing {
            debug_log(format!(
                "ignoring init result for {} in state {:?}",
                self.source_url, self.state
            ));
            return None;
        }
        match outcome {
            Ok(()) => {
                self.state = SessionState::Ready;
                self.surface = Some(Surface {
                    source_url: self.source_url.clone(),
                });
                if self.autoplay {
                    self.state = SessionState::Playing;
                }
                Some(LifecycleEvent::SurfaceReady)
            }
            Err(message) => {
                self.state = SessionState::Disposed;
                Some(LifecycleEvent::InitFailed(message))
            }
        }
    }

    /// Digests a natural end-of-stream signal. Duplicate deliveries are
    /// absorbed; the return-to-browsing request fires once.
    pub fn on_ended(&mut self) -> Option<LifecycleEvent> {
        if self.state != SessionState::Playing {
            return None;
        }
        self.state = SessionState::Ended;
        if self.return_emitted {
            return None;
        }
        self.return_emitted = true;
        Some(LifecycleEvent::ReturnToBrowsing)
    }

    pub fn dispose(&mut self) -> DisposeAction {
        let action = match self.state {
            SessionState::Disposed => DisposeAction::AlreadyDisposed,
            SessionState::Playing | SessionState::Ready => DisposeAction::PauseAndReset,
            SessionState::Idle | SessionState::Initializing | SessionState::Ended => {
                DisposeAction::ReleaseOnly
            }
        };
        self.state = SessionState::Disposed;
        self.surface = None;
        action
    }
}

enum WorkerCommand {
    Play,
    Dispose { reset: bool },
}

enum WorkerEvent {
    Initialized { result: Result<(), String> },
    Ended,
}

struct SessionHandle {
    machine: PlaybackSession,
    cmd_tx: Sender<WorkerCommand>,
    event_rx: Receiver<WorkerEvent>,
}

/// Owns the single live playback session and the worker thread behind it.
/// Events are polled from the UI loop; commands flow the other way.
pub struct Controller {
    factory: PipelineFactory,
    session: Option<SessionHandle>,
}

impl Controller {
    pub fn new(factory: PipelineFactory) -> Self {
        Self {
            factory,
            session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, |session| session.machine.state())
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.session
            .as_ref()
            .and_then(|session| session.machine.surface())
    }

    pub fn source_url(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|session| session.machine.source_url())
    }

    /// Starts a fresh session for `url`, disposing any live one first so a
    /// single stream plays at a time. The pipeline pre-buffers on a worker
    /// thread; nothing is presented until that resolves.
    pub fn start(&mut self, url: &str) -> Result<(), PlaybackError> {
        if url.trim().is_empty() {
            return Err(PlaybackError::NoSource);
        }
        self.dispose();

        let mut pipeline = (self.factory)(url)
            .map_err(|err| PlaybackError::InitFailed(format!("{err:#}")))?;

        let (cmd_tx, cmd_rx) = unbounded::<WorkerCommand>();
        let (event_tx, event_rx) = unbounded::<WorkerEvent>();

        debug_log(format!("starting playback session for {url}"));
        thread::spawn(move || {
            run_worker(pipeline.as_mut(), &cmd_rx, &event_tx);
            pipeline.shutdown();
        });

        self.session = Some(SessionHandle {
            machine: PlaybackSession::new(url.to_string()),
            cmd_tx,
            event_rx,
        });
        Ok(())
    }

    /// Drains worker events into lifecycle transitions. Call once per UI
    /// tick; returns the requests the application must act on.
    pub fn poll(&mut self) -> Vec<LifecycleEvent> {
        let mut emitted = Vec::new();
        let Some(session) = self.session.as_mut() else {
            return emitted;
        };

        loop {
            match session.event_rx.try_recv() {
                Ok(WorkerEvent::Initialized { result }) => {
                    if let Some(event) = session.machine.on_initialized(result) {
                        if event == LifecycleEvent::SurfaceReady {
                            let _ = session.cmd_tx.send(WorkerCommand::Play);
                        }
                        emitted.push(event);
                    }
                }
                Ok(WorkerEvent::Ended) => {
                    if let Some(event) = session.machine.on_ended() {
                        emitted.push(event);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        emitted
    }

    /// Tears the live session down. Idempotent; the worker receives the
    /// dispose exactly once and stale events from it are never redelivered
    /// because the channel is dropped with the handle.
    pub fn dispose(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        match session.machine.dispose() {
            DisposeAction::AlreadyDisposed => {}
            DisposeAction::PauseAndReset => {
                let _ = session.cmd_tx.send(WorkerCommand::Dispose { reset: true });
            }
            DisposeAction::ReleaseOnly => {
                let _ = session.cmd_tx.send(WorkerCommand::Dispose { reset: false });
            }
        }
        debug_log("playback session disposed");
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.dispose();
    }
}

const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Worker loop: blocking pre-buffer, then serve commands while watching for
/// end-of-stream. A dispose that raced the pre-buffer wins — the pipeline
/// is released without ever reporting ready.
fn run_worker(
    pipeline: &mut dyn MediaPipeline,
    cmd_rx: &Receiver<WorkerCommand>,
    event_tx: &Sender<WorkerEvent>,
) {
    let prepared = pipeline.prepare().map_err(|err| format!("{err:#}"));

    // A dispose issued while prepare was still running takes precedence
    // over reporting the (now moot) outcome.
    if let Ok(WorkerCommand::Dispose { .. }) = cmd_rx.try_recv() {
        debug_log("pre-buffer resolved after dispose; releasing pipeline");
        return;
    }

    let failed = prepared.is_err();
    let _ = event_tx.send(WorkerEvent::Initialized { result: prepared });
    if failed {
        return;
    }

    let mut ended_sent = false;
    loop {
        match cmd_rx.recv_timeout(WORKER_POLL_INTERVAL) {
            Ok(WorkerCommand::Play) => {
                if let Err(err) = pipeline.play() {
                    debug_log(format!("pipeline play failed: {err:#}"));
                }
            }
            Ok(WorkerCommand::Dispose { reset }) => {
                if reset {
                    if let Err(err) = pipeline.pause() {
                        debug_log(format!("pipeline pause failed: {err:#}"));
                    }
                    if let Err(err) = pipeline.seek_to_start() {
                        debug_log(format!("pipeline seek failed: {err:#}"));
                    }
                }
                return;
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if !ended_sent && pipeline.poll_ended() {
                    ended_sent = true;
                    let _ = event_tx.send(WorkerEvent::Ended);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Recorder {
        fn push(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|entry| **entry == call)
                .count()
        }
    }

    struct FakePipeline {
        recorder: Recorder,
        prepare_gate: Option<Receiver<()>>,
        prepare_error: Option<String>,
        ended: Arc<AtomicBool>,
    }

    impl FakePipeline {
        fn instant(recorder: Recorder) -> Self {
            Self {
                recorder,
                prepare_gate: None,
                prepare_error: None,
                ended: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl MediaPipeline for FakePipeline {
        fn prepare(&mut self) -> Result<()> {
            if let Some(gate) = &self.prepare_gate {
                let _ = gate.recv();
            }
            self.recorder.push("prepare");
            match &self.prepare_error {
                Some(message) => Err(anyhow::anyhow!(message.clone())),
                None => Ok(()),
            }
        }

        fn play(&mut self) -> Result<()> {
            self.recorder.push("play");
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            self.recorder.push("pause");
            Ok(())
        }

        fn seek_to_start(&mut self) -> Result<()> {
            self.recorder.push("seek_to_start");
            Ok(())
        }

        fn poll_ended(&mut self) -> bool {
            self.ended.load(Ordering::SeqCst)
        }

        fn shutdown(&mut self) {
            self.recorder.push("shutdown");
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting on worker");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn drain_until(controller: &mut Controller, wanted: &LifecycleEvent) -> Vec<LifecycleEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        loop {
            seen.extend(controller.poll());
            if seen.contains(wanted) {
                return seen;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {wanted:?}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    // State-machine rules, exercised without threads.

    #[test]
    fn init_success_attaches_surface_and_autoplays() {
        let mut session = PlaybackSession::new("https://x/video.mp4".into());
        let event = session.on_initialized(Ok(()));
        assert_eq!(event, Some(LifecycleEvent::SurfaceReady));
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(
            session.surface().map(|surface| surface.source_url.as_str()),
            Some("https://x/video.mp4")
        );
    }

    #[test]
    fn init_failure_disposes_and_reports() {
        let mut session = PlaybackSession::new("https://x/video.mp4".into());
        let event = session.on_initialized(Err("403".into()));
        assert_eq!(event, Some(LifecycleEvent::InitFailed("403".into())));
        assert_eq!(session.state(), SessionState::Disposed);
        assert!(session.surface().is_none());
    }

    #[test]
    fn late_init_after_dispose_attaches_nothing() {
        let mut session = PlaybackSession::new("https://x/video.mp4".into());
        assert_eq!(session.dispose(), DisposeAction::ReleaseOnly);
        assert_eq!(session.on_initialized(Ok(())), None);
        assert_eq!(session.state(), SessionState::Disposed);
        assert!(session.surface().is_none());
    }

    #[test]
    fn ended_emits_return_exactly_once() {
        let mut session = PlaybackSession::new("https://x/video.mp4".into());
        session.on_initialized(Ok(()));
        assert_eq!(session.on_ended(), Some(LifecycleEvent::ReturnToBrowsing));
        assert_eq!(session.on_ended(), None);
        assert_eq!(session.state(), SessionState::Ended);
    }

    #[test]
    fn ended_before_playing_is_ignored() {
        let mut session = PlaybackSession::new("https://x/video.mp4".into());
        assert_eq!(session.on_ended(), None);
        assert_eq!(session.state(), SessionState::Initializing);
    }

    #[test]
    fn dispose_twice_acts_once() {
        let mut session = PlaybackSession::new("https://x/video.mp4".into());
        session.on_initialized(Ok(()));
        assert_eq!(session.dispose(), DisposeAction::PauseAndReset);
        assert_eq!(session.dispose(), DisposeAction::AlreadyDisposed);
    }

    // Controller + worker integration with a scripted pipeline.

    #[test]
    fn controller_runs_prepare_then_autoplays() {
        let recorder = Recorder::default();
        let factory_recorder = recorder.clone();
        let mut controller = Controller::new(Box::new(move |_url| {
            Ok(Box::new(FakePipeline::instant(factory_recorder.clone())) as Box<dyn MediaPipeline>)
        }));

        controller.start("https://x/video.mp4").unwrap();
        assert_eq!(controller.state(), SessionState::Initializing);
        assert!(controller.surface().is_none());

        let events = drain_until(&mut controller, &LifecycleEvent::SurfaceReady);
        assert_eq!(events, vec![LifecycleEvent::SurfaceReady]);
        assert_eq!(controller.state(), SessionState::Playing);
        assert!(controller.surface().is_some());

        wait_for(|| recorder.count("play") == 1);
    }

    #[test]
    fn controller_rejects_blank_url() {
        let mut controller = Controller::new(Box::new(|_url| {
            Ok(Box::new(FakePipeline::instant(Recorder::default())) as Box<dyn MediaPipeline>)
        }));
        assert!(matches!(
            controller.start("   "),
            Err(PlaybackError::NoSource)
        ));
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn dispose_before_prebuffer_resolves_attaches_no_surface() {
        let recorder = Recorder::default();
        let (gate_tx, gate_rx) = unbounded::<()>();
        let factory_recorder = recorder.clone();
        let gate = Mutex::new(Some(gate_rx));
        let mut controller = Controller::new(Box::new(move |_url| {
            let mut pipeline = FakePipeline::instant(factory_recorder.clone());
            pipeline.prepare_gate = gate.lock().unwrap().take();
            Ok(Box::new(pipeline) as Box<dyn MediaPipeline>)
        }));

        controller.start("https://x/video.mp4").unwrap();
        controller.dispose();
        assert_eq!(controller.state(), SessionState::Idle);

        // Release the pre-buffer only now; the worker must clean up quietly.
        gate_tx.send(()).unwrap();
        wait_for(|| recorder.count("shutdown") == 1);
        assert!(controller.poll().is_empty());
        assert!(controller.surface().is_none());
        assert_eq!(recorder.count("play"), 0);
        assert_eq!(recorder.count("pause"), 0);
    }

    #[test]
    fn init_failure_surfaces_and_disposes() {
        let recorder = Recorder::default();
        let factory_recorder = recorder.clone();
        let mut controller = Controller::new(Box::new(move |_url| {
            let mut pipeline = FakePipeline::instant(factory_recorder.clone());
            pipeline.prepare_error = Some("connection refused".into());
            Ok(Box::new(pipeline) as Box<dyn MediaPipeline>)
        }));

        controller.start("https://x/video.mp4").unwrap();
        let events = drain_until(
            &mut controller,
            &LifecycleEvent::InitFailed("connection refused".into()),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(controller.state(), SessionState::Disposed);
        assert!(controller.surface().is_none());
        wait_for(|| recorder.count("shutdown") == 1);
    }

    #[test]
    fn ended_stream_requests_return_once() {
        let recorder = Recorder::default();
        let ended = Arc::new(AtomicBool::new(false));
        let factory_recorder = recorder.clone();
        let factory_ended = ended.clone();
        let mut controller = Controller::new(Box::new(move |_url| {
            let mut pipeline = FakePipeline::instant(factory_recorder.clone());
            pipeline.ended = factory_ended.clone();
            Ok(Box::new(pipeline) as Box<dyn MediaPipeline>)
        }));

        controller.start("https://x/video.mp4").unwrap();
        drain_until(&mut controller, &LifecycleEvent::SurfaceReady);

        ended.store(true, Ordering::SeqCst);
        let events = drain_until(&mut controller, &LifecycleEvent::ReturnToBrowsing);
        let returns = events
            .iter()
            .filter(|event| **event == LifecycleEvent::ReturnToBrowsing)
            .count();
        assert_eq!(returns, 1);
        assert_eq!(controller.state(), SessionState::Ended);
    }

    #[test]
    fn starting_while_live_disposes_previous_session() {
        let recorder = Recorder::default();
        let factory_recorder = recorder.clone();
        let mut controller = Controller::new(Box::new(move |_url| {
            Ok(Box::new(FakePipeline::instant(factory_recorder.clone())) as Box<dyn MediaPipeline>)
        }));

        controller.start("https://x/first.mp4").unwrap();
        drain_until(&mut controller, &LifecycleEvent::SurfaceReady);

        controller.start("https://x/second.mp4").unwrap();
        assert_eq!(controller.source_url(), Some("https://x/second.mp4"));
        // First worker paused, rewound, and released its pipeline.
        wait_for(|| recorder.count("pause") == 1);
        wait_for(|| recorder.count("seek_to_start") == 1);
        wait_for(|| recorder.count("shutdown") >= 1);
    }

    #[test]
    fn dispose_twice_sends_one_pause() {
        let recorder = Recorder::default();
        let factory_recorder = recorder.clone();
        let mut controller = Controller::new(Box::new(move |_url| {
            Ok(Box::new(FakePipeline::instant(factory_recorder.clone())) as Box<dyn MediaPipeline>)
        }));

        controller.start("https://x/video.mp4").unwrap();
        drain_until(&mut controller, &LifecycleEvent::SurfaceReady);

        controller.dispose();
        controller.dispose();
        wait_for(|| recorder.count("shutdown") == 1);
        assert_eq!(recorder.count("pause"), 1);
        assert_eq!(recorder.count("seek_to_start"), 1);
    }
}
