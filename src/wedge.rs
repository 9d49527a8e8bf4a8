//! Scanner-gun keystroke classification.
//!
//! A wedge scanner types its payload as ordinary keystrokes, far faster
//! than a person and usually terminated by Enter. The classifier watches
//! the global keystroke stream and separates those bursts from human
//! typing using timing alone.
//!
//! The decision logic is a synchronous state machine with an injected
//! clock, so every timing rule is testable without sleeping; a thin tokio
//! driver owns the real timer and feeds it wall-clock instants.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Inter-key gap below which input is likely machine-generated. Human
/// typists rarely sustain gaps this short even in bursts.
pub const MACHINE_INTERKEY: Duration = Duration::from_millis(50);

/// Quiet period after which an unterminated buffer is finalized. Covers
/// scanners configured without a terminator suffix.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_millis(500);

// Emission floors: terminated buffers must exceed 3 characters, timed-out
// buffers must exceed 10 (a short unterminated burst is almost always
// stray typing, not a code).
const TERMINATOR_MIN_LEN: usize = 3;
const TIMEOUT_MIN_LEN: usize = 10;

/// One keystroke as seen by the classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: WedgeKey,
    /// True when the keystroke targeted an editable form field. Such
    /// events never reach the buffer: ordinary typing into settings
    /// fields must not corrupt a code in progress or misfire one.
    pub editable_target: bool,
}

impl KeyEvent {
    pub fn ch(c: char) -> Self {
        Self { key: WedgeKey::Char(c), editable_target: false }
    }

    pub fn enter() -> Self {
        Self { key: WedgeKey::Enter, editable_target: false }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WedgeKey {
    Char(char),
    /// The terminator.
    Enter,
}

/// Buffer + last-key-time state machine. A buffer is finalized by the
/// terminator or by the inactivity timeout, never both: whichever fires
/// first clears it, and the next keystroke always starts from empty.
pub struct WedgeClassifier {
    buffer: String,
    last_key_at: Option<Instant>,
    machine_speed: bool,
}

impl Default for WedgeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WedgeClassifier {
    pub fn new() -> Self {
        Self { buffer: String::new(), last_key_at: None, machine_speed: false }
    }

    /// Feed one keystroke at time `now`. Returns a completed code when
    /// this keystroke finalized one.
    pub fn on_key(&mut self, event: KeyEvent, now: Instant) -> Option<String> {
        if event.editable_target {
            trace!("keystroke into editable field, excluded");
            return None;
        }

        // A stale buffer the driver's timer has not collected yet is
        // finalized before the new keystroke is processed, so the two
        // finalization paths can never both claim it.
        let mut emitted = self.expire_if_idle(now);

        match event.key {
            WedgeKey::Char(c) => {
                if self.buffer.is_empty()
                    && self
                        .last_key_at
                        .is_some_and(|t| now.duration_since(t) < MACHINE_INTERKEY)
                {
                    // Informational only; emission rules do not depend on it.
                    self.machine_speed = true;
                    trace!("inter-key gap below machine threshold");
                }
                self.buffer.push(c);
                self.last_key_at = Some(now);
            }
            WedgeKey::Enter => {
                self.last_key_at = Some(now);
                let code = std::mem::take(&mut self.buffer);
                self.machine_speed = false;
                if code.len() > TERMINATOR_MIN_LEN {
                    debug!(len = code.len(), "terminated buffer emitted");
                    emitted = emitted.or(Some(code));
                } else if !code.is_empty() {
                    trace!(len = code.len(), "short terminated buffer discarded");
                }
            }
        }
        emitted
    }

    /// Inactivity check at time `now`; the tokio driver calls this when
    /// the timeout elapses. Returns a completed code when the idle buffer
    /// was long enough to emit.
    pub fn on_timeout(&mut self, now: Instant) -> Option<String> {
        self.expire_if_idle(now)
    }

    /// Explicit reset: drop any buffered input without emitting.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.machine_speed = false;
    }

    /// Whether the current buffer started at machine speed.
    pub fn machine_speed(&self) -> bool {
        self.machine_speed
    }

    /// When the current buffer will be finalized if nothing else arrives.
    pub fn deadline(&self) -> Option<Instant> {
        if self.buffer.is_empty() {
            None
        } else {
            self.last_key_at.map(|t| t + INACTIVITY_TIMEOUT)
        }
    }

    fn expire_if_idle(&mut self, now: Instant) -> Option<String> {
        let last = self.last_key_at?;
        if self.buffer.is_empty() || now.duration_since(last) < INACTIVITY_TIMEOUT {
            return None;
        }
        let code = std::mem::take(&mut self.buffer);
        self.machine_speed = false;
        if code.len() > TIMEOUT_MIN_LEN {
            debug!(len = code.len(), "idle buffer emitted");
            Some(code)
        } else {
            trace!(len = code.len(), "idle buffer discarded");
            None
        }
    }
}

/// Handle to a running classifier task. Dropping the handle (or the key
/// sender) shuts the task down.
pub struct WedgeHandle {
    keys: mpsc::Sender<KeyEvent>,
    task: JoinHandle<()>,
}

impl WedgeHandle {
    /// Forward one keystroke. Returns `false` when the task has stopped.
    pub async fn key(&self, event: KeyEvent) -> bool {
        self.keys.send(event).await.is_ok()
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Spawn the classifier driver: keystrokes in, completed codes out.
pub fn spawn_wedge(codes: mpsc::Sender<String>) -> WedgeHandle {
    let (keys, mut rx) = mpsc::channel::<KeyEvent>(64);
    let task = tokio::spawn(async move {
        let mut classifier = WedgeClassifier::new();
        loop {
            let deadline = classifier.deadline();
            let emitted = tokio::select! {
                ev = rx.recv() => match ev {
                    Some(ev) => classifier.on_key(ev, tokio::time::Instant::now().into_std()),
                    None => break,
                },
                () = idle_until(deadline) => {
                    classifier.on_timeout(tokio::time::Instant::now().into_std())
                }
            };
            if let Some(code) = emitted {
                if codes.send(code).await.is_err() {
                    break;
                }
            }
        }
        info!("keystroke classifier stopped");
    });
    WedgeHandle { keys, task }
}

async fn idle_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}
