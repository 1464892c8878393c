//! Frame scheduling: drives the per-frame encode pipeline either serially
//! on the calling thread or across a fixed ring of `rayon` worker threads.
//!
//! The parallel scheduler keeps one persistent worker per ring slot (MDCT
//! scratch space and filter/window state are expensive to rebuild per
//! frame) and hands each worker its next frame's raw samples over an
//! `mpsc` channel, collecting the packed frame back over a second channel.
//! A small `AtomicU8` state machine tracks each worker's phase so the
//! scheduler can tell a hung worker from an idle one and so shutdown can
//! wait for every in-flight frame to drain before joining the thread pool.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::error::{EncoderError, Result};

/// Worker lifecycle phase, polled by the scheduler between frame handoffs.
#[derive(Debug)]
#[repr(u8)]
enum WorkerState {
    /// Waiting for its next input frame.
    Start = 0,
    /// Actively encoding a frame.
    Work = 1,
    /// Told to shut down; draining in-flight work.
    End = 2,
    /// Hit an unrecoverable error; no further frames will be accepted.
    Abort = 3,
}

impl From<u8> for WorkerState {
    fn from(v: u8) -> Self {
        match v {
            0 => WorkerState::Start,
            1 => WorkerState::Work,
            2 => WorkerState::End,
            _ => WorkerState::Abort,
        }
    }
}

/// One raw input frame's channel-interleaved samples, handed to a worker.
pub type RawFrame = Vec<Vec<f32>>;

/// A worker's packed output: the bytes of one encoded A/52 frame.
pub type PackedFrame = Vec<u8>;

/// A function that encodes one raw frame into a packed frame, given a
/// per-worker scratch context `ctx`. The scheduler constructs one `Ctx` per
/// ring slot via `ctx_factory` and reuses it across every frame that slot
/// handles, so state (MDCT plans, filter history, carry buffer) persists
/// the way it does for a serial encoder.
pub trait FrameEncoder<Ctx>: Fn(&mut Ctx, RawFrame) -> Result<PackedFrame> + Send + Sync {}
impl<Ctx, F: Fn(&mut Ctx, RawFrame) -> Result<PackedFrame> + Send + Sync> FrameEncoder<Ctx> for F {}

/// Single-threaded driver: calls the encode function directly on the
/// caller's thread, in order. Used when `parallel` is disabled or the
/// caller only ever has one frame in flight.
pub struct SerialScheduler<Ctx> {
    ctx: Ctx,
}

impl<Ctx> SerialScheduler<Ctx> {
    pub fn new(ctx: Ctx) -> Self {
        Self { ctx }
    }

    pub fn encode_frame<F>(&mut self, encode: &F, frame: RawFrame) -> Result<PackedFrame>
    where
        F: FrameEncoder<Ctx>,
    {
        encode(&mut self.ctx, frame)
    }
}

struct WorkerSlot {
    input_tx: Sender<Option<RawFrame>>,
    output_rx: Receiver<Result<PackedFrame>>,
    state: Arc<AtomicU8>,
}

/// Fixed-size ring of persistent `rayon` worker threads. Frames are
/// dispatched round-robin; output is collected in submission order, so a
/// caller sees the same per-stream frame sequence a serial scheduler would
/// produce, just encoded with worker-level parallelism across frames.
pub struct ParallelScheduler {
    slots: Vec<WorkerSlot>,
    next_slot: usize,
    pending: Vec<usize>,
}

impl ParallelScheduler {
    /// Spawns `ring_size` persistent workers, each built from `ctx_factory`
    /// and driven by `encode`.
    pub fn new<Ctx, F>(ring_size: usize, ctx_factory: impl Fn() -> Ctx, encode: F) -> Self
    where
        Ctx: Send + 'static,
        F: FrameEncoder<Ctx> + Clone + 'static,
    {
        let mut slots = Vec::with_capacity(ring_size);
        for _ in 0..ring_size {
            let (input_tx, input_rx) = mpsc::channel::<Option<RawFrame>>();
            let (output_tx, output_rx) = mpsc::channel::<Result<PackedFrame>>();
            let state = Arc::new(AtomicU8::new(WorkerState::Start as u8));
            let worker_state = Arc::clone(&state);
            let mut ctx = ctx_factory();
            let encode = encode.clone();

            rayon::spawn(move || {
                for maybe_frame in input_rx {
                    match maybe_frame {
                        Some(frame) => {
                            worker_state.store(WorkerState::Work as u8, Ordering::SeqCst);
                            let result = encode(&mut ctx, frame);
                            if result.is_err() {
                                worker_state.store(WorkerState::Abort as u8, Ordering::SeqCst);
                            } else {
                                worker_state.store(WorkerState::Start as u8, Ordering::SeqCst);
                            }
                            if output_tx.send(result).is_err() {
                                break;
                            }
                        }
                        None => {
                            worker_state.store(WorkerState::End as u8, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            });

            slots.push(WorkerSlot { input_tx, output_rx, state });
        }

        Self { slots, next_slot: 0, pending: Vec::new() }
    }

    /// Submits a frame to the next slot in round-robin order. Does not
    /// block for the result; call [`ParallelScheduler::collect_next`] in
    /// the same order to retrieve packed frames as they complete.
    pub fn submit(&mut self, frame: RawFrame) -> std::result::Result<(), EncoderError> {
        let slot = self.next_slot;
        self.next_slot = (self.next_slot + 1) % self.slots.len();
        self.slots[slot]
            .input_tx
            .send(Some(frame))
            .map_err(|_| EncoderError::scheduler_failed("worker channel closed"))?;
        self.pending.push(slot);
        Ok(())
    }

    /// Blocks for the next submitted frame's packed output, in submission order.
    pub fn collect_next(&mut self) -> Result<PackedFrame> {
        let slot = self.pending.remove(0);
        self.slots[slot]
            .output_rx
            .recv()
            .map_err(|_| EncoderError::scheduler_failed("worker channel closed before reply"))?
    }

    /// Whether any worker has recorded an unrecoverable error.
    pub fn has_aborted(&self) -> bool {
        self.slots
            .iter()
            .any(|s| matches!(WorkerState::from(s.state.load(Ordering::SeqCst)), WorkerState::Abort))
    }

    /// Signals every worker to shut down once its input queue drains.
    pub fn shutdown(self) {
        for slot in &self.slots {
            let _ = slot.input_tx.send(None);
        }
    }
}
