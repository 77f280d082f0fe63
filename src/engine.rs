//! The event loop tying reducer, scheduler and collaborators together.
//!
//! # Overview
//!
//! A single consumer thread owns the only mutation path: it receives
//! events, applies them through the reducer, lets the scheduler claim the
//! next hashing batch, publishes the new snapshot, and executes the
//! transition's effects. Walkers run as one thread per root; hashing and
//! removal run on a bounded rayon pool. All background work reports back
//! as events, never by holding a lock across a state transition.
//!
//! # Generations
//!
//! Background completions carry the generation they were produced for. A
//! `Clear` bumps the generation and trips the cancel flag of the outgoing
//! one, so walkers stop early and any digest that still arrives for a
//! discarded state is silently dropped instead of leaking into the fresh
//! index. User events are never generation-gated: they are applied in
//! arrival order regardless of intervening clears.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use crate::actions::FileRemover;
use crate::config::EngineConfig;
use crate::reducer::{self, Effect, Event, ReduceError};
use crate::scanner::{self, Walker};
use crate::scheduler;
use crate::state::State;
use crate::view;

/// Fatal engine failures. Recoverable I/O problems never surface here;
/// they flow through the index as per-path events.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The reducer rejected an event: an integration bug, fail fast.
    #[error("reducer contract violation: {0}")]
    Contract(#[from] ReduceError),

    /// The hashing pool could not be created.
    #[error("failed to build hashing pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug)]
enum Msg {
    Apply(Event),
    WalkDone(std::path::PathBuf),
    Shutdown,
}

/// A queued message. `generation` is set only for messages produced by
/// background workers; user-dispatched events carry `None` and are never
/// dropped as stale.
#[derive(Debug)]
struct Envelope {
    generation: Option<u64>,
    msg: Msg,
}

/// State shared between the loop and its handles.
struct Shared {
    snapshot: Mutex<Arc<State>>,
    generation: AtomicU64,
    idle: Mutex<bool>,
    idle_cv: Condvar,
}

impl Shared {
    fn snapshot(&self) -> Arc<State> {
        self.snapshot.lock().expect("snapshot mutex poisoned").clone()
    }

    fn publish(&self, state: Arc<State>) {
        *self.snapshot.lock().expect("snapshot mutex poisoned") = state;
    }

    fn set_idle(&self, idle: bool) {
        let mut guard = self.idle.lock().expect("idle mutex poisoned");
        *guard = idle;
        if idle {
            self.idle_cv.notify_all();
        }
    }
}

/// Cheap, cloneable entry point for feeding events and reading snapshots.
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<Envelope>,
    shared: Arc<Shared>,
}

impl EngineHandle {
    /// Queue one event for the reducer. Events are applied in arrival
    /// order by the single consumer loop, even across a `Clear`.
    pub fn dispatch(&self, event: Event) {
        self.shared.set_idle(false);
        let envelope = Envelope {
            generation: None,
            msg: Msg::Apply(event),
        };
        if self.tx.send(envelope).is_err() {
            log::debug!("event dropped: engine already shut down");
        }
    }

    /// The current state snapshot. Immutable; later events supersede it
    /// without invalidating it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<State> {
        self.shared.snapshot()
    }

    /// Block until no walks, hashes or removals are in flight and the
    /// hashing frontier is empty.
    pub fn wait_idle(&self) {
        let guard = self.shared.idle.lock().expect("idle mutex poisoned");
        let _guard = self
            .shared
            .idle_cv
            .wait_while(guard, |idle| !*idle)
            .expect("idle mutex poisoned");
    }

    /// Like [`wait_idle`](Self::wait_idle) with a deadline. Returns
    /// whether the engine went idle in time.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let guard = self.shared.idle.lock().expect("idle mutex poisoned");
        let (guard, result) = self
            .shared
            .idle_cv
            .wait_timeout_while(guard, timeout, |idle| !*idle)
            .expect("idle mutex poisoned");
        drop(guard);
        !result.timed_out()
    }

    /// Ask the loop to exit once it drains messages up to this point.
    pub fn shutdown(&self) {
        let envelope = Envelope {
            generation: None,
            msg: Msg::Shutdown,
        };
        let _ = self.tx.send(envelope);
    }
}

/// The indexing engine. Construct it, grab a handle, then hand the engine
/// itself to a thread running [`Engine::run`].
pub struct Engine {
    config: EngineConfig,
    remover: Arc<dyn FileRemover>,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    shared: Arc<Shared>,
}

impl Engine {
    /// Create an engine with the given configuration and removal
    /// collaborator.
    #[must_use]
    pub fn new(config: EngineConfig, remover: Arc<dyn FileRemover>) -> Self {
        let (tx, rx) = unbounded();
        let shared = Arc::new(Shared {
            snapshot: Mutex::new(Arc::new(State::default())),
            generation: AtomicU64::new(0),
            idle: Mutex::new(true),
            idle_cv: Condvar::new(),
        });
        Self {
            config: config.sanitized(),
            remover,
            tx,
            rx,
            shared,
        }
    }

    /// A handle for dispatching events and reading snapshots.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.tx.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Run the event loop until [`EngineHandle::shutdown`] is called.
    ///
    /// Waiters blocked in [`EngineHandle::wait_idle`] are woken when the
    /// loop exits, whether it shut down cleanly or failed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Contract`] if an event violates the
    /// reducer's contract; this indicates a bug, not a runtime condition.
    pub fn run(self) -> Result<(), EngineError> {
        let result = self.run_loop();
        self.shared.set_idle(true);
        result
    }

    fn run_loop(&self) -> Result<(), EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency)
            .thread_name(|i| format!("dupescan-hash-{i}"))
            .build()?;

        // Bookkeeping for the current generation only.
        let mut walks_in_flight = 0usize;
        let mut removals_in_flight = 0usize;
        let mut cancel = Arc::new(AtomicBool::new(false));

        while let Ok(envelope) = self.rx.recv() {
            let generation = self.shared.generation.load(Ordering::SeqCst);
            match envelope.msg {
                Msg::Shutdown => break,
                _ if envelope.generation.is_some_and(|g| g != generation) => {
                    log::trace!("dropping stale background message");
                }
                Msg::WalkDone(root) => {
                    walks_in_flight = walks_in_flight.saturating_sub(1);
                    log::debug!("walk finished: {}", root.display());
                }
                Msg::Apply(event) => {
                    if matches!(event, Event::FileRemoved(_) | Event::RemoveFailed { .. }) {
                        removals_in_flight = removals_in_flight.saturating_sub(1);
                    }

                    let current = self.shared.snapshot();
                    let transition = reducer::apply(&current, event)?;
                    if let Some(refusal) = &transition.refusal {
                        log::info!("{refusal}");
                    }

                    let mut state = transition.state;
                    let mut effects = transition.effects;

                    // Let the scheduler claim the next batch against the
                    // fresh state before anything is dispatched.
                    let batch = scheduler::next_batch(&state, &self.config);
                    if !batch.is_empty() {
                        let scheduled = reducer::apply(&state, Event::HashingScheduled(batch))?;
                        state = scheduled.state;
                        effects.extend(scheduled.effects);
                    }

                    let snapshot = Arc::new(state);
                    self.shared.publish(snapshot.clone());

                    for effect in effects {
                        self.perform(
                            effect,
                            &snapshot,
                            &pool,
                            &mut walks_in_flight,
                            &mut removals_in_flight,
                            &mut cancel,
                        );
                    }
                }
            }

            self.update_idle(walks_in_flight, removals_in_flight);
        }
        Ok(())
    }

    fn perform(
        &self,
        effect: Effect,
        snapshot: &Arc<State>,
        pool: &rayon::ThreadPool,
        walks_in_flight: &mut usize,
        removals_in_flight: &mut usize,
        cancel: &mut Arc<AtomicBool>,
    ) {
        let generation = Some(self.shared.generation.load(Ordering::SeqCst));
        match effect {
            Effect::Scan(root) => {
                let tx = self.tx.clone();
                let flag = cancel.clone();
                let spawned = thread::Builder::new()
                    .name("dupescan-walk".to_string())
                    .spawn(move || {
                        let walker = Walker::new(&root).with_cancel_flag(flag);
                        for (path, size) in walker.walk() {
                            let sent = tx.send(Envelope {
                                generation,
                                msg: Msg::Apply(Event::FileDiscovered { path, size }),
                            });
                            if sent.is_err() {
                                return;
                            }
                        }
                        let _ = tx.send(Envelope {
                            generation,
                            msg: Msg::WalkDone(root),
                        });
                    });
                match spawned {
                    Ok(_) => *walks_in_flight += 1,
                    Err(e) => log::error!("failed to spawn walker thread: {e}"),
                }
            }
            Effect::Hash(path) => {
                let Some(size) = snapshot.discovered.get(&path).copied() else {
                    log::warn!("hash requested for untracked path: {}", path.display());
                    return;
                };
                let tx = self.tx.clone();
                let flag = cancel.clone();
                pool.spawn(move || {
                    if flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let parent = path.parent().map(Path::to_path_buf);
                    let event = match scanner::digest_file(&path) {
                        Ok(digest) => Event::HashComputed {
                            path,
                            size,
                            digest,
                            parent,
                        },
                        Err(e) => {
                            let message = e.to_string();
                            Event::HashFailed { path, message }
                        }
                    };
                    let _ = tx.send(Envelope {
                        generation,
                        msg: Msg::Apply(event),
                    });
                });
            }
            Effect::Remove(path) => {
                *removals_in_flight += 1;
                let tx = self.tx.clone();
                let remover = self.remover.clone();
                pool.spawn(move || {
                    let event = match remover.remove(&path) {
                        Ok(()) => Event::FileRemoved(path),
                        Err(e) => {
                            let message = e.to_string();
                            Event::RemoveFailed { path, message }
                        }
                    };
                    let _ = tx.send(Envelope {
                        generation,
                        msg: Msg::Apply(event),
                    });
                });
            }
            Effect::CancelBackground => {
                cancel.store(true, Ordering::SeqCst);
                *cancel = Arc::new(AtomicBool::new(false));
                self.shared.generation.fetch_add(1, Ordering::SeqCst);
                *walks_in_flight = 0;
                *removals_in_flight = 0;
                log::debug!("cleared: previous generation cancelled");
            }
        }
    }

    /// Recompute quiescence after each processed message.
    fn update_idle(&self, walks_in_flight: usize, removals_in_flight: usize) {
        let snapshot = self.shared.snapshot();
        let quiescent = walks_in_flight == 0
            && removals_in_flight == 0
            && snapshot.hashing.is_empty()
            && self.rx.is_empty()
            && view::files_needing_hash(&snapshot, self.config.max_groups).is_empty();
        self.shared.set_idle(quiescent);
    }
}
