#![forbid(unsafe_code)]

//! Elm-style runtime for the control panel.
//!
//! The program runtime owns the model and serializes every state change
//! through [`Model::update`]. Side effects are returned as [`Cmd`] values:
//! background tasks run on worker threads and post their result back as a
//! message, and one-shot timers are kept in a deadline heap that the loop
//! services between messages.
//!
//! # Example
//!
//! ```ignore
//! use xrp_runtime::program::{Cmd, Model, Program};
//! use std::time::Duration;
//!
//! struct Poller { polls: u32 }
//!
//! enum Msg { Poll, Polled(u32) }
//!
//! impl Model for Poller {
//!     type Message = Msg;
//!     type View = u32;
//!
//!     fn init(&mut self) -> Cmd<Msg> {
//!         Cmd::msg(Msg::Poll)
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Cmd<Msg> {
//!         match msg {
//!             Msg::Poll => Cmd::task(|| Msg::Polled(fetch())),
//!             Msg::Polled(_) => {
//!                 self.polls += 1;
//!                 Cmd::after(Duration::from_secs(1), Msg::Poll)
//!             }
//!         }
//!     }
//!
//!     fn view(&self) -> u32 {
//!         self.polls
//!     }
//! }
//! ```
//!
//! # Shutdown
//!
//! `Cmd::Quit` stops the loop. Pending timers are dropped, and results of
//! tasks still in flight are discarded: they are sent into a channel whose
//! receiver no longer exists.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

/// The Model trait defines session state and behavior.
pub trait Model: Sized {
    /// The message type for this model.
    type Message: Send + 'static;

    /// Snapshot produced by [`view`](Self::view).
    type View;

    /// Initialize the model with startup commands.
    ///
    /// Called once when the program starts.
    fn init(&mut self) -> Cmd<Self::Message> {
        Cmd::none()
    }

    /// Update the model in response to a message.
    ///
    /// This is the only place state changes. Returns commands for any side
    /// effects that should be executed.
    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;

    /// Project the current state for display.
    fn view(&self) -> Self::View;
}

/// Scheduling metadata for background tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    /// Optional task name for thread naming and logs.
    pub name: Option<String>,
}

impl TaskSpec {
    /// A spec with a diagnostic name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Commands represent side effects to be executed by the runtime.
pub enum Cmd<M> {
    /// No operation.
    None,
    /// Stop the program.
    Quit,
    /// Execute multiple commands as a batch (currently sequential).
    Batch(Vec<Cmd<M>>),
    /// Execute commands sequentially.
    Sequence(Vec<Cmd<M>>),
    /// Send a message to the model.
    Msg(M),
    /// Deliver a message once the duration has elapsed.
    After(Duration, M),
    /// Emit a log line through `tracing`.
    Log(String),
    /// Execute a blocking operation on a background thread.
    ///
    /// The return value is sent back as a message to the model.
    Task(TaskSpec, Box<dyn FnOnce() -> M + Send>),
}

impl<M> Default for Cmd<M> {
    fn default() -> Self {
        Self::None
    }
}

impl<M: fmt::Debug> fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Quit => write!(f, "Quit"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Sequence(cmds) => f.debug_tuple("Sequence").field(cmds).finish(),
            Self::Msg(m) => f.debug_tuple("Msg").field(m).finish(),
            Self::After(d, m) => f.debug_tuple("After").field(d).field(m).finish(),
            Self::Log(s) => f.debug_tuple("Log").field(s).finish(),
            Self::Task(spec, _) => f.debug_struct("Task").field("spec", spec).finish(),
        }
    }
}

impl<M> Cmd<M> {
    /// Create a no-op command.
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    /// Create a quit command.
    #[inline]
    pub fn quit() -> Self {
        Self::Quit
    }

    /// Create a message command.
    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    /// Create a log command.
    #[inline]
    pub fn log(msg: impl Into<String>) -> Self {
        Self::Log(msg.into())
    }

    /// Create a one-shot timer command.
    #[inline]
    pub fn after(delay: Duration, m: M) -> Self {
        Self::After(delay, m)
    }

    /// Create a batch of commands.
    pub fn batch(mut cmds: Vec<Self>) -> Self {
        match cmds.len() {
            0 => Self::None,
            1 => cmds.pop().unwrap_or_default(),
            _ => Self::Batch(cmds),
        }
    }

    /// Create a sequence of commands.
    pub fn sequence(mut cmds: Vec<Self>) -> Self {
        match cmds.len() {
            0 => Self::None,
            1 => cmds.pop().unwrap_or_default(),
            _ => Self::Sequence(cmds),
        }
    }

    /// Create a background task command.
    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::default(), Box::new(f))
    }

    /// Create a named background task command.
    pub fn task_named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::named(name), Box::new(f))
    }

    /// Whether this is the no-op command.
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Return a stable name for tracing.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Quit => "Quit",
            Self::Batch(_) => "Batch",
            Self::Sequence(_) => "Sequence",
            Self::Msg(_) => "Msg",
            Self::After(..) => "After",
            Self::Log(_) => "Log",
            Self::Task(..) => "Task",
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the threaded [`Program`].
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    /// Prefix for worker thread names.
    /// Default: "xrp-task"
    pub task_thread_name: String,
    /// How long shutdown waits for in-flight tasks before detaching them.
    /// Default: 250ms
    pub shutdown_grace: Duration,
    /// Return from `run` once no message, timer, or task is outstanding.
    /// Default: false
    pub exit_when_idle: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            task_thread_name: "xrp-task".to_string(),
            shutdown_grace: Duration::from_millis(250),
            exit_when_idle: false,
        }
    }
}

impl ProgramConfig {
    #[must_use]
    pub fn with_task_thread_name(mut self, name: impl Into<String>) -> Self {
        self.task_thread_name = name.into();
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn with_exit_when_idle(mut self, exit: bool) -> Self {
        self.exit_when_idle = exit;
        self
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

struct Timer<M> {
    deadline: Instant,
    seq: u64,
    msg: M,
}

impl<M> PartialEq for Timer<M> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<M> Eq for Timer<M> {}

impl<M> PartialOrd for Timer<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for Timer<M> {
    // Reversed so the max-heap pops the earliest deadline first, FIFO on ties.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// Sends messages into a running [`Program`] from other threads.
pub struct ProgramHandle<M> {
    tx: Sender<M>,
}

impl<M> Clone for ProgramHandle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> ProgramHandle<M> {
    /// Queue a message. Returns `false` once the program has shut down.
    pub fn send(&self, msg: M) -> bool {
        self.tx.send(msg).is_ok()
    }
}

/// Threaded runner for a [`Model`].
pub struct Program<M: Model> {
    model: M,
    config: ProgramConfig,
    tx: Sender<M::Message>,
    rx: Receiver<M::Message>,
    timers: BinaryHeap<Timer<M::Message>>,
    timer_seq: u64,
    tasks: Vec<JoinHandle<()>>,
    running: bool,
}

impl<M: Model> Program<M> {
    /// Create a program with default configuration.
    pub fn new(model: M) -> Self {
        Self::with_config(model, ProgramConfig::default())
    }

    /// Create a program with explicit configuration.
    pub fn with_config(model: M, config: ProgramConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            model,
            config,
            tx,
            rx,
            timers: BinaryHeap::new(),
            timer_seq: 0,
            tasks: Vec::new(),
            running: true,
        }
    }

    /// A handle for injecting messages (user input) from other threads.
    pub fn handle(&self) -> ProgramHandle<M::Message> {
        ProgramHandle {
            tx: self.tx.clone(),
        }
    }

    /// Get a reference to the model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run until `Cmd::Quit` (or idle, when configured) and return the model.
    ///
    /// # Errors
    ///
    /// Fails only when a worker thread cannot be spawned.
    pub fn run(mut self) -> io::Result<M> {
        info!("program started");
        let cmd = self.model.init();
        self.execute(cmd)?;

        while self.running {
            self.fire_due_timers()?;
            if !self.running {
                break;
            }

            let msg = match self.timers.peek().map(|t| t.deadline) {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match self.rx.recv_timeout(wait) {
                        Ok(msg) => msg,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => {
                    let idle = self.reap_tasks() == 0;
                    match self.rx.try_recv() {
                        Ok(msg) => msg,
                        Err(TryRecvError::Empty) if idle && self.config.exit_when_idle => {
                            debug!("program idle, exiting");
                            break;
                        }
                        Err(TryRecvError::Empty) => match self.rx.recv() {
                            Ok(msg) => msg,
                            Err(_) => break,
                        },
                        Err(TryRecvError::Disconnected) => break,
                    }
                }
            };
            self.dispatch(msg)?;
        }

        self.shutdown();
        Ok(self.model)
    }

    fn dispatch(&mut self, msg: M::Message) -> io::Result<()> {
        let cmd = self.model.update(msg);
        self.execute(cmd)
    }

    fn execute(&mut self, cmd: Cmd<M::Message>) -> io::Result<()> {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => {
                debug!("quit requested");
                self.running = false;
            }
            Cmd::Msg(m) => self.dispatch(m)?,
            Cmd::Batch(cmds) | Cmd::Sequence(cmds) => {
                for c in cmds {
                    self.execute(c)?;
                    if !self.running {
                        break;
                    }
                }
            }
            Cmd::After(delay, msg) => {
                self.timer_seq += 1;
                trace!(delay_ms = delay.as_millis() as u64, seq = self.timer_seq, "timer scheduled");
                self.timers.push(Timer {
                    deadline: Instant::now() + delay,
                    seq: self.timer_seq,
                    msg,
                });
            }
            Cmd::Log(text) => info!(target: "xrp_runtime::log", "{text}"),
            Cmd::Task(spec, f) => self.spawn_task(spec, f)?,
        }
        Ok(())
    }

    fn spawn_task(
        &mut self,
        spec: TaskSpec,
        f: Box<dyn FnOnce() -> M::Message + Send>,
    ) -> io::Result<()> {
        let name = spec.name.unwrap_or_else(|| "task".to_string());
        let thread_name = format!("{}:{name}", self.config.task_thread_name);
        let tx = self.tx.clone();
        trace!(task = %name, "task spawned");
        let handle = thread::Builder::new().name(thread_name).spawn(move || {
            let msg = f();
            if tx.send(msg).is_err() {
                trace!(task = %name, "task result discarded after shutdown");
            }
        })?;
        self.tasks.push(handle);
        Ok(())
    }

    fn fire_due_timers(&mut self) -> io::Result<()> {
        while self.running {
            let due = self
                .timers
                .peek()
                .is_some_and(|t| t.deadline <= Instant::now());
            if !due {
                break;
            }
            if let Some(timer) = self.timers.pop() {
                self.dispatch(timer.msg)?;
            }
        }
        Ok(())
    }

    /// Forget finished worker threads and return how many are still running.
    fn reap_tasks(&mut self) -> usize {
        self.tasks.retain(|h| !h.is_finished());
        self.tasks.len()
    }

    fn shutdown(&mut self) {
        let dropped = self.timers.len();
        self.timers.clear();

        let deadline = Instant::now() + self.config.shutdown_grace;
        while self.reap_tasks() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let detached = self.tasks.len();
        self.tasks.clear();
        info!(dropped_timers = dropped, detached_tasks = detached, "program stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Msg {
        Mark(&'static str),
        Stop,
        Value(u32),
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<Msg>,
        quit_after: usize,
        startup: Vec<Cmd<Msg>>,
    }

    impl Model for Recorder {
        type Message = Msg;
        type View = usize;

        fn init(&mut self) -> Cmd<Msg> {
            Cmd::batch(std::mem::take(&mut self.startup))
        }

        fn update(&mut self, msg: Msg) -> Cmd<Msg> {
            let stop = msg == Msg::Stop;
            self.seen.push(msg);
            if stop || self.seen.len() == self.quit_after {
                Cmd::quit()
            } else {
                Cmd::none()
            }
        }

        fn view(&self) -> usize {
            self.seen.len()
        }
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let model = Recorder {
            quit_after: 2,
            startup: vec![
                Cmd::after(Duration::from_millis(30), Msg::Mark("late")),
                Cmd::after(Duration::from_millis(5), Msg::Mark("early")),
            ],
            ..Recorder::default()
        };

        let model = Program::new(model).run().unwrap();

        assert_eq!(model.seen, vec![Msg::Mark("early"), Msg::Mark("late")]);
    }

    #[test]
    fn task_result_is_dispatched() {
        let model = Recorder {
            quit_after: 1,
            startup: vec![Cmd::task_named("compute", || Msg::Value(42))],
            ..Recorder::default()
        };

        let model = Program::new(model).run().unwrap();

        assert_eq!(model.seen, vec![Msg::Value(42)]);
    }

    #[test]
    fn quit_drops_pending_timers() {
        let model = Recorder {
            startup: vec![
                Cmd::after(Duration::from_secs(60), Msg::Mark("never")),
                Cmd::msg(Msg::Stop),
            ],
            ..Recorder::default()
        };

        let started = Instant::now();
        let model = Program::new(model).run().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(model.seen, vec![Msg::Stop]);
    }

    #[test]
    fn exits_when_idle_if_configured() {
        let model = Recorder {
            startup: vec![Cmd::msg(Msg::Mark("only"))],
            ..Recorder::default()
        };
        let config = ProgramConfig::default().with_exit_when_idle(true);

        let model = Program::with_config(model, config).run().unwrap();

        assert_eq!(model.view(), 1);
    }

    #[test]
    fn handle_injects_messages() {
        let model = Recorder::default();
        let program = Program::new(model);
        let handle = program.handle();

        assert!(handle.send(Msg::Mark("input")));
        assert!(handle.send(Msg::Stop));
        let model = program.run().unwrap();

        assert_eq!(model.seen, vec![Msg::Mark("input"), Msg::Stop]);
    }

    #[test]
    fn batch_collapses_trivial_cases() {
        assert!(Cmd::<Msg>::batch(vec![]).is_none());
        assert_eq!(Cmd::batch(vec![Cmd::<Msg>::quit()]).type_name(), "Quit");
        assert_eq!(
            Cmd::sequence(vec![Cmd::<Msg>::none(), Cmd::quit()]).type_name(),
            "Sequence"
        );
    }
}
