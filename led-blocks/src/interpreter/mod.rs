//! Async preview of a program on a simulated panel.
//!
//! A [`Previewer`] owns at most one run at a time. Each run is a spawned task
//! walking the program tree; stopping cancels its token, which wakes any
//! pending wait immediately.

mod eval;
mod run;
mod sink;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::RunError;
use crate::ir::{Document, Program};

pub use eval::{Value, Variables, evaluate, evaluate_expression};
pub use run::RANDOM_COLOR;
pub use sink::{GpioBank, PanelSink};

use run::Machine;

/// Color every run starts with
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// Palette the `RANDOM` color picks from
pub const RANDOM_PALETTE: [&str; 7] = [
    "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF", "#FFFFFF",
];

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Pause between stopping an active run and starting the next one
    pub settle: Duration,
    pub default_color: String,
    pub palette: Vec<String>,
    /// Fixed seed for `random_range` and `RANDOM`; entropy when absent
    pub seed: Option<u64>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            default_color: DEFAULT_COLOR.to_string(),
            palette: RANDOM_PALETTE.iter().map(|color| color.to_string()).collect(),
            seed: None,
        }
    }
}

/// Wall clock of one run, frozen when the run stops
#[derive(Debug)]
struct RunClock {
    started: Instant,
    frozen: Mutex<Option<Duration>>,
}

impl RunClock {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            frozen: Mutex::new(None),
        }
    }

    fn elapsed(&self) -> Duration {
        let frozen = self.frozen.lock().unwrap_or_else(PoisonError::into_inner);
        frozen.unwrap_or_else(|| self.started.elapsed())
    }

    fn freeze(&self) {
        let mut frozen = self.frozen.lock().unwrap_or_else(PoisonError::into_inner);
        if frozen.is_none() {
            *frozen = Some(self.started.elapsed());
        }
    }
}

/// Токен и часы текущего запуска
#[derive(Debug, Clone)]
struct Session {
    token: CancellationToken,
    clock: Arc<RunClock>,
}

impl Session {
    fn stop(&self) {
        self.token.cancel();
        self.clock.freeze();
    }

    fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }
}

/// Status line of the preview panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running { elapsed: Duration },
    Stopped { elapsed: Duration },
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Running { elapsed } | Self::Stopped { elapsed } => *elapsed,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_running() { "Running" } else { "Stopped" };
        write!(f, "{state} {}", format_elapsed(self.elapsed()))
    }
}

/// `MM:SS`, minutes keep counting past 99
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Outcome of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Statements executed, loop iterations counted each time
    pub executed: usize,
    pub elapsed: Duration,
    /// True when `stop` ended the run before the program did
    pub cancelled: bool,
}

/// Handle to a spawned run
#[derive(Debug)]
pub struct RunHandle {
    session: Session,
    task: JoinHandle<RunReport>,
}

impl RunHandle {
    pub fn stop(&self) {
        self.session.stop();
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub async fn finished(self) -> Result<RunReport, RunError> {
        Ok(self.task.await?)
    }
}

pub struct Previewer {
    sink: Arc<dyn PanelSink>,
    gpio: Arc<GpioBank>,
    config: PreviewConfig,
    current: Mutex<Option<Session>>,
}

impl Previewer {
    pub fn new(sink: Arc<dyn PanelSink>, gpio: Arc<GpioBank>, config: PreviewConfig) -> Self {
        Self {
            sink,
            gpio,
            config,
            current: Mutex::new(None),
        }
    }

    pub fn gpio(&self) -> &Arc<GpioBank> {
        &self.gpio
    }

    /// Starts a run of `program`, stopping the active one first.
    ///
    /// Variables start empty, the color is reset and the display cleared
    /// before the first block executes. The run stops by itself when the
    /// program ends.
    pub async fn start(&self, program: Program) -> RunHandle {
        if self.stop_active() {
            sleep(self.config.settle).await;
        }

        self.sink.set_color(&self.config.default_color);
        self.sink.clear();

        let session = Session {
            token: CancellationToken::new(),
            clock: Arc::new(RunClock::start()),
        };
        *self.lock_current() = Some(session.clone());

        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut machine = Machine::new(
            Arc::clone(&self.sink),
            Arc::clone(&self.gpio),
            session.token.clone(),
            self.config.palette.clone(),
            rng,
        );

        info!(nodes = program.node_count(), "preview started");
        let task_session = session.clone();
        let task = tokio::spawn(async move {
            machine.execute_chain(program.actions().head()).await;

            let cancelled = !task_session.is_running();
            task_session.stop();
            let report = RunReport {
                executed: machine.executed(),
                elapsed: task_session.clock.elapsed(),
                cancelled,
            };
            info!(
                executed = report.executed,
                cancelled,
                elapsed = %format_elapsed(report.elapsed),
                "preview finished"
            );
            report
        });

        RunHandle { session, task }
    }

    /// Starts the program in `document`; the no-program sentinel starts nothing
    pub async fn start_document(&self, document: Document) -> Option<RunHandle> {
        match document {
            Document::Program(program) => Some(self.start(program).await),
            Document::NoProgram { error } => {
                info!(reason = error.as_str(), "nothing to preview");
                None
            }
        }
    }

    /// Stops the active run. GPIO state is left as it is.
    pub fn stop(&self) {
        if self.stop_active() {
            info!("preview stopped");
        }
    }

    pub fn status(&self) -> RunStatus {
        match self.lock_current().as_ref() {
            Some(session) if session.is_running() => RunStatus::Running {
                elapsed: session.clock.elapsed(),
            },
            Some(session) => RunStatus::Stopped {
                elapsed: session.clock.elapsed(),
            },
            None => RunStatus::Stopped {
                elapsed: Duration::ZERO,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    /// Returns true when a run was active
    fn stop_active(&self) -> bool {
        match self.lock_current().as_ref() {
            Some(session) if session.is_running() => {
                session.stop();
                true
            }
            _ => false,
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Chain, Node, NodeKind, Operand};

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Calls {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }

        fn push(&self, call: String) {
            self.0.lock().unwrap().push(call);
        }
    }

    impl PanelSink for Calls {
        fn clear(&self) {
            self.push("clear".to_string());
        }
        fn display_image(&self, filename: &str) {
            self.push(format!("image {filename}"));
        }
        fn animation_frames(&self, folder: &str) -> usize {
            if folder == "spin" { 4 } else { 0 }
        }
        fn show_animation_frame(&self, folder: &str, index: usize) {
            self.push(format!("frame {folder} {index}"));
        }
        fn set_color(&self, color: &str) {
            self.push(format!("color {color}"));
        }
        fn set_gpio_indicator(&self, pin: u8, high: bool) {
            self.push(format!("gpio {pin} {high}"));
        }
    }

    fn previewer(calls: &Arc<Calls>) -> Previewer {
        let config = PreviewConfig { seed: Some(3), ..PreviewConfig::default() };
        Previewer::new(calls.clone(), Arc::new(GpioBank::new()), config)
    }

    fn program(nodes: Vec<Node>) -> Program {
        Program::from_actions(nodes.into_iter().collect::<Chain>())
    }

    #[test]
    fn elapsed_is_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00");
        assert_eq!(format_elapsed(Duration::from_millis(65_900)), "01:05");
        let status = RunStatus::Stopped { elapsed: Duration::from_secs(600) };
        assert_eq!(status.to_string(), "Stopped 10:00");
    }

    #[tokio::test(start_paused = true)]
    async fn run_resets_panel_then_executes() {
        let calls = Arc::new(Calls::default());
        let previewer = previewer(&calls);
        let handle = previewer
            .start(program(vec![
                Node::new(NodeKind::DisplayImage { filename: "a.raw".to_string() }),
                Node::new(NodeKind::Wait { time: Some(Operand::Number(1500)) }),
                Node::new(NodeKind::Gpio { pin: 3, state: crate::ir::PinState::High }),
            ]))
            .await;
        let report = handle.finished().await.unwrap();

        assert_eq!(
            calls.take(),
            ["color #FFFFFF", "clear", "image a.raw", "gpio 3 true"]
        );
        assert_eq!(report.executed, 3);
        assert!(!report.cancelled);
        assert_eq!(report.elapsed.as_secs(), 1);
        assert!(previewer.gpio().read(3));
        assert_eq!(previewer.status(), RunStatus::Stopped { elapsed: report.elapsed });
    }

    #[tokio::test(start_paused = true)]
    async fn animation_cycles_frames_for_its_duration() {
        let calls = Arc::new(Calls::default());
        let previewer = previewer(&calls);
        let handle = previewer
            .start(program(vec![
                Node::new(NodeKind::PlayAnimation { folder: "spin".to_string(), play_for: 1000 }),
                Node::new(NodeKind::PlayAnimation { folder: "missing".to_string(), play_for: 1000 }),
            ]))
            .await;
        let report = handle.finished().await.unwrap();

        let frames: Vec<_> = calls.take().into_iter().filter(|call| call.starts_with("frame")).collect();
        assert_eq!(
            frames,
            ["frame spin 0", "frame spin 1", "frame spin 2", "frame spin 3"]
        );
        // Отсутствующая анимация не ждёт
        assert!(report.elapsed >= Duration::from_millis(1000));
        assert!(report.elapsed < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wakes_a_pending_wait() {
        let calls = Arc::new(Calls::default());
        let previewer = previewer(&calls);
        let handle = previewer
            .start(program(vec![
                Node::new(NodeKind::Wait { time: Some(Operand::Number(60_000)) }),
                Node::new(NodeKind::DisplayImage { filename: "late.raw".to_string() }),
            ]))
            .await;
        sleep(Duration::from_millis(250)).await;
        assert!(previewer.is_running());
        previewer.stop();

        let report = handle.finished().await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.executed, 1);
        assert!(!calls.take().contains(&"image late.raw".to_string()));
        assert_eq!(format_elapsed(previewer.status().elapsed()), "00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_stops_the_previous_run() {
        let calls = Arc::new(Calls::default());
        let previewer = previewer(&calls);
        let forever = program(vec![Node::new(NodeKind::Forever {
            loop_body: Chain::new(Node::new(NodeKind::Wait { time: Some(Operand::Number(10)) })),
        })]);
        let first = previewer.start(forever.clone()).await;
        sleep(Duration::from_millis(55)).await;

        let second = previewer.start(program(Vec::new())).await;
        assert!(!first.is_running());
        assert!(first.finished().await.unwrap().cancelled);
        assert!(!second.finished().await.unwrap().cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn sentinel_document_starts_nothing() {
        let calls = Arc::new(Calls::default());
        let previewer = previewer(&calls);
        assert!(previewer.start_document(Document::no_start_block()).await.is_none());
        assert!(calls.take().is_empty());
        assert!(!previewer.is_running());
    }
}
