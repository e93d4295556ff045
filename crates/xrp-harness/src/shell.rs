#![forbid(unsafe_code)]

//! Host shell that records what the panel asked of it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use xrp_panel::shell::{HostShell, ModalHandle, ModalRequest};

/// One interaction with the shell.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    Shown { id: u64, request: ModalRequest },
    Closed(u64),
    Navigated(String),
}

#[derive(Debug, Default)]
struct ShellLog {
    events: Vec<ShellEvent>,
    next_id: u64,
}

/// Records modals and navigations. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingShell {
    log: Arc<Mutex<ShellLog>>,
}

impl RecordingShell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ShellLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every interaction, in order.
    #[must_use]
    pub fn events(&self) -> Vec<ShellEvent> {
        self.lock().events.clone()
    }

    /// Requests of modals shown so far.
    #[must_use]
    pub fn shown(&self) -> Vec<ModalRequest> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ShellEvent::Shown { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Modals shown and not yet closed.
    #[must_use]
    pub fn open_modals(&self) -> Vec<ModalRequest> {
        let log = self.lock();
        log.events
            .iter()
            .filter_map(|e| match e {
                ShellEvent::Shown { id, request }
                    if !log.events.contains(&ShellEvent::Closed(*id)) =>
                {
                    Some(request.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ShellEvent::Navigated(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }
}

impl HostShell for RecordingShell {
    fn show_modal(&self, request: ModalRequest) -> ModalHandle {
        let id = {
            let mut log = self.lock();
            log.next_id += 1;
            let id = log.next_id;
            log.events.push(ShellEvent::Shown { id, request });
            id
        };
        let log = Arc::clone(&self.log);
        ModalHandle::new(id, move || {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .events
                .push(ShellEvent::Closed(id));
        })
    }

    fn navigate_external(&self, url: &str) {
        self.lock().events.push(ShellEvent::Navigated(url.to_string()));
    }
}
