//! A fixed team of scoped worker threads.
//!
//! Every member runs the same body on its own payload. Members synchronize
//! through a shared reusable barrier, and [`Member::single`] runs a closure
//! on exactly one of them while the rest wait. Failures inside the body are
//! collected in [`Failures`] rather than unwinding, so every member still
//! reaches every barrier.

use crate::error::{OperatorError, ScanError};
use parking_lot::{Condvar, Mutex};
use std::{
    any::Any,
    io,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Barrier,
    },
    thread,
};
use tracing::{trace, warn};

/// One participant of a running team.
pub struct Member<'t> {
    id: usize,
    size: usize,
    barrier: &'t Barrier,
}

impl Member<'_> {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Blocks until every member has arrived. All writes made before the
    /// barrier are visible to every member after it.
    pub fn barrier(&self) {
        self.barrier.wait();
    }

    /// Barrier, then `f` on one arbitrary member, then another barrier.
    /// Returns `f`'s result on the member that ran it.
    pub fn single<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let result = if self.barrier.wait().is_leader() {
            Some(f())
        } else {
            None
        };
        self.barrier.wait();
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Closed,
    Open,
    Aborted,
}

/// Holds spawned members back until the whole team exists, so a failed
/// spawn never leaves the others stuck on a barrier sized for the full team.
struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Closed),
            changed: Condvar::new(),
        }
    }

    fn release(&self, state: GateState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }

    /// Waits for the gate to be released. `true` if the team may run.
    fn pass(&self) -> bool {
        let mut state = self.state.lock();
        while *state == GateState::Closed {
            self.changed.wait(&mut state);
        }
        *state == GateState::Open
    }
}

/// Spawns one member per payload, runs `body` on each and joins them all.
///
/// Either every member runs or none does: if a thread cannot be spawned the
/// ones already started are released without running `body` and the spawn
/// error is returned.
pub fn run<P, F>(payloads: Vec<P>, body: F) -> Result<(), ScanError>
where
    P: Send,
    F: Fn(&Member<'_>, P) + Sync,
{
    run_with(
        payloads,
        |id| Ok(thread::Builder::new().name(format!("par-scan-{id}"))),
        body,
    )
}

/// [`run`] with the thread builder for each member supplied by `builder`.
/// An error from `builder` counts as a failed spawn of that member.
pub(crate) fn run_with<P, B, F>(payloads: Vec<P>, builder: B, body: F) -> Result<(), ScanError>
where
    P: Send,
    B: Fn(usize) -> io::Result<thread::Builder>,
    F: Fn(&Member<'_>, P) + Sync,
{
    let size = payloads.len();
    if size == 0 {
        return Ok(());
    }

    let barrier = Barrier::new(size);
    let gate = Gate::new();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(size);

        for (id, payload) in payloads.into_iter().enumerate() {
            let member = Member {
                id,
                size,
                barrier: &barrier,
            };
            let gate = &gate;
            let body = &body;

            let spawned = builder(id).and_then(|spawner| {
                spawner.spawn_scoped(scope, move || {
                    if gate.pass() {
                        trace!(worker = member.id, "member started");
                        body(&member, payload);
                    }
                })
            });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    warn!(worker = id, error = %source, "could not spawn team member");
                    gate.release(GateState::Aborted);
                    return Err(ScanError::Spawn { worker: id, source });
                }
            }
        }

        gate.release(GateState::Open);

        let mut result = Ok(());
        for (id, handle) in handles.into_iter().enumerate() {
            if let Err(panic) = handle.join() {
                if result.is_ok() {
                    result = Err(ScanError::OperatorPanicked {
                        worker: Some(id),
                        message: panic_message(panic.as_ref()),
                    });
                }
            }
        }
        result
    })
}

/// The first failure raised by any member, or by the calling thread.
#[derive(Default)]
pub struct Failures {
    first: Mutex<Option<ScanError>>,
    raised: AtomicBool,
}

impl Failures {
    pub fn any(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub fn record(&self, error: ScanError) {
        warn!(%error, "scan failure recorded");
        let mut first = self.first.lock();
        if first.is_none() {
            *first = Some(error);
        }
        self.raised.store(true, Ordering::Release);
    }

    /// Runs `f` for `worker`, recording its error or panic instead of
    /// propagating it. Once anything has failed, `f` is skipped.
    pub fn guard<R>(
        &self,
        worker: Option<usize>,
        f: impl FnOnce() -> Result<R, OperatorError>,
    ) -> Option<R> {
        if self.any() {
            return None;
        }

        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(source)) => {
                self.record(ScanError::Operator { worker, source });
                None
            }
            Err(panic) => {
                self.record(ScanError::OperatorPanicked {
                    worker,
                    message: panic_message(panic.as_ref()),
                });
                None
            }
        }
    }

    pub fn into_result(self) -> Result<(), ScanError> {
        match self.first.into_inner() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
