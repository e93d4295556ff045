#![forbid(unsafe_code)]

//! Deterministic program simulator for testing.
//!
//! `ProgramSimulator` runs a [`Model`] without threads or wall-clock waits.
//! Tasks execute inline, and `Cmd::After` timers are queued on a virtual
//! timeline that only moves when the test calls [`advance`](ProgramSimulator::advance).
//! The simulator moves its [`ManualClock`] to each timer's deadline before
//! dispatching it, so a model reading the same clock observes consistent time.
//!
//! # Example
//!
//! ```ignore
//! use xrp_runtime::{ManualClock, ProgramSimulator};
//!
//! let clock = ManualClock::new(1_700_000_000.0);
//! let mut sim = ProgramSimulator::with_clock(Poller::new(clock.clone()), clock);
//! sim.init();
//! sim.advance(Duration::from_secs(3));
//! assert_eq!(sim.model().polls, 3);
//! ```

use std::time::Duration;

use crate::clock::ManualClock;
use crate::program::{Cmd, Model};

/// Record of a command that was executed during simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum CmdRecord {
    /// No-op command.
    None,
    /// Quit command.
    Quit,
    /// Message sent to model (not stored, just noted).
    Msg,
    /// Batch of commands.
    Batch(usize),
    /// Sequence of commands.
    Sequence(usize),
    /// Timer scheduled.
    After(Duration),
    /// Log message emitted.
    Log(String),
    /// Background task executed synchronously.
    Task(Option<String>),
}

struct VirtualTimer<M> {
    due: Duration,
    seq: u64,
    msg: M,
}

/// Deterministic simulator for [`Model`] testing.
pub struct ProgramSimulator<M: Model> {
    /// The application model.
    model: M,
    /// Clock advanced alongside the virtual timeline.
    clock: ManualClock,
    /// Virtual time since the simulator was created.
    elapsed: Duration,
    /// Pending timers, unordered; the earliest is selected on each step.
    timers: Vec<VirtualTimer<M::Message>>,
    timer_seq: u64,
    /// Record of all executed commands.
    command_log: Vec<CmdRecord>,
    /// Whether the simulated program is still running.
    running: bool,
    /// Log messages emitted via `Cmd::Log`.
    logs: Vec<String>,
}

impl<M: Model> ProgramSimulator<M> {
    /// Create a new simulator with a private clock.
    ///
    /// The model is not initialized until [`init`](Self::init) is called.
    pub fn new(model: M) -> Self {
        Self::with_clock(model, ManualClock::default())
    }

    /// Create a simulator that advances the given clock.
    pub fn with_clock(model: M, clock: ManualClock) -> Self {
        Self {
            model,
            clock,
            elapsed: Duration::ZERO,
            timers: Vec::new(),
            timer_seq: 0,
            command_log: Vec::new(),
            running: true,
            logs: Vec::new(),
        }
    }

    /// Initialize the model by calling `Model::init()` and executing returned commands.
    pub fn init(&mut self) {
        let cmd = self.model.init();
        self.execute_cmd(cmd);
    }

    /// Send a specific message to the model.
    pub fn send(&mut self, msg: M::Message) {
        if !self.running {
            return;
        }
        let cmd = self.model.update(msg);
        self.execute_cmd(cmd);
    }

    /// Move virtual time forward, firing every timer that comes due.
    ///
    /// Timers scheduled while advancing fire in the same call if their
    /// deadline falls inside the window.
    pub fn advance(&mut self, by: Duration) {
        let target = self.elapsed + by;
        while self.running {
            let Some(index) = self.next_timer_index(target) else {
                break;
            };
            let timer = self.timers.swap_remove(index);
            self.move_to(timer.due);
            let cmd = self.model.update(timer.msg);
            self.execute_cmd(cmd);
        }
        if !self.running {
            self.timers.clear();
        }
        self.move_to(target);
    }

    /// Virtual time elapsed so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of timers waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Project the model.
    pub fn view(&self) -> M::View {
        self.model.view()
    }

    /// Get a reference to the model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get a mutable reference to the model.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// The clock this simulator advances.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Check if the simulated program is still running.
    ///
    /// Returns `false` after a `Cmd::Quit` has been executed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get all log messages emitted via `Cmd::Log`.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Get the command execution log.
    pub fn command_log(&self) -> &[CmdRecord] {
        &self.command_log
    }

    /// Clear the command log.
    pub fn clear_command_log(&mut self) {
        self.command_log.clear();
    }

    fn next_timer_index(&self, target: Duration) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)
    }

    fn move_to(&mut self, at: Duration) {
        if at > self.elapsed {
            self.clock.advance(at - self.elapsed);
            self.elapsed = at;
        }
    }

    /// Execute a command without threads.
    ///
    /// Cmd::Msg and Cmd::Task recurse through update; Cmd::After queues on
    /// the virtual timeline; Cmd::Log records the text.
    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => {
                self.command_log.push(CmdRecord::None);
            }
            Cmd::Quit => {
                self.running = false;
                self.command_log.push(CmdRecord::Quit);
            }
            Cmd::Msg(m) => {
                self.command_log.push(CmdRecord::Msg);
                let cmd = self.model.update(m);
                self.execute_cmd(cmd);
            }
            Cmd::Batch(cmds) => {
                self.command_log.push(CmdRecord::Batch(cmds.len()));
                self.execute_all(cmds);
            }
            Cmd::Sequence(cmds) => {
                self.command_log.push(CmdRecord::Sequence(cmds.len()));
                self.execute_all(cmds);
            }
            Cmd::After(delay, msg) => {
                self.command_log.push(CmdRecord::After(delay));
                self.timer_seq += 1;
                self.timers.push(VirtualTimer {
                    due: self.elapsed + delay,
                    seq: self.timer_seq,
                    msg,
                });
            }
            Cmd::Log(text) => {
                self.command_log.push(CmdRecord::Log(text.clone()));
                self.logs.push(text);
            }
            Cmd::Task(spec, f) => {
                self.command_log.push(CmdRecord::Task(spec.name));
                let msg = f();
                let cmd = self.model.update(msg);
                self.execute_cmd(cmd);
            }
        }
    }

    fn execute_all(&mut self, cmds: Vec<Cmd<M::Message>>) {
        for c in cmds {
            self.execute_cmd(c);
            if !self.running {
                break;
            }
        }
    }
}
