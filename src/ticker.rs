//! Phase-ordered tick scheduler.
//!
//! Every frame the host calls [`Ticker::update`] (or [`Ticker::advance`] with
//! an explicit delta) and registered callbacks run in ascending phase order:
//! input latching, then pre-physics writes, then the physics step, then
//! post-physics synchronization, with diagnostics last. Ordering is the
//! concurrency model here; callbacks never run while another is in flight,
//! and registration is only possible between frames because `update` holds
//! the scheduler mutably.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Named execution slots, invoked in ascending order.
///
/// `Input` = 0, `PrePhysics` = 1, `Physics` = 2, `PostPhysics` = 3,
/// `Diagnostics` = 999. `Order` is an escape hatch for callers that need a
/// slot between the named ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickPhase {
    Input,
    PrePhysics,
    Physics,
    PostPhysics,
    Diagnostics,
    Order(u16),
}

impl TickPhase {
    pub fn order(self) -> u16 {
        match self {
            TickPhase::Input => 0,
            TickPhase::PrePhysics => 1,
            TickPhase::Physics => 2,
            TickPhase::PostPhysics => 3,
            TickPhase::Diagnostics => 999,
            TickPhase::Order(order) => order,
        }
    }
}

/// Timing snapshot handed to every callback of one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    /// Scheduler invocation count, starting at 1 for the first frame.
    pub tick: u64,
    /// Wall-clock seconds since the previous frame, clamped.
    pub delta: f32,
    /// Accumulated wall-clock seconds.
    pub elapsed: f32,
    /// `delta` multiplied by the global time scale.
    pub delta_scaled: f32,
    /// Accumulated scaled seconds.
    pub elapsed_scaled: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitId(u64);

struct Sub<C> {
    id: SubId,
    order: u16,
    seq: u64,
    callback: Box<dyn FnMut(&mut C, &Frame)>,
}

struct Waiter<C> {
    id: WaitId,
    remaining: u32,
    cancelled: bool,
    callback: Option<Box<dyn FnOnce(&mut C, &Frame)>>,
}

pub struct Ticker<C> {
    subs: Vec<Sub<C>>,
    waiters: Vec<Waiter<C>>,
    next_id: u64,
    tick: u64,
    last: Option<Instant>,
    elapsed: f32,
    elapsed_scaled: f32,
    time_scale: f32,
    max_delta: f32,
}

impl<C> Ticker<C> {
    /// Both knobs arrive from user-editable configuration; negative values
    /// are floored to zero.
    pub fn new(max_delta: f32, time_scale: f32) -> Self {
        Self {
            subs: Vec::new(),
            waiters: Vec::new(),
            next_id: 0,
            tick: 0,
            last: None,
            elapsed: 0.0,
            elapsed_scaled: 0.0,
            time_scale: time_scale.max(0.0),
            max_delta: max_delta.max(0.0),
        }
    }

    /// Register a per-frame callback. Equal phases run in registration order.
    pub fn on_tick(
        &mut self,
        phase: TickPhase,
        callback: impl FnMut(&mut C, &Frame) + 'static,
    ) -> SubId {
        let id = SubId(self.next_id);
        let seq = self.next_id;
        self.next_id += 1;
        self.subs.push(Sub {
            id,
            order: phase.order(),
            seq,
            callback: Box::new(callback),
        });
        self.subs.sort_by_key(|s| (s.order, s.seq));
        id
    }

    pub fn unsubscribe(&mut self, id: SubId) {
        self.subs.retain(|s| s.id != id);
    }

    /// One-shot callback firing after `frames` scheduler invocations, before
    /// that frame's phase callbacks. `wait(1, ..)` fires on the next frame.
    pub fn wait(
        &mut self,
        frames: u32,
        callback: impl FnOnce(&mut C, &Frame) + 'static,
    ) -> WaitId {
        let id = WaitId(self.next_id);
        self.next_id += 1;
        self.waiters.push(Waiter {
            id,
            remaining: frames.max(1),
            cancelled: false,
            callback: Some(Box::new(callback)),
        });
        id
    }

    /// Flag a pending one-shot as dead. The flag is checked immediately
    /// before firing.
    pub fn cancel_wait(&mut self, id: WaitId) {
        if let Some(waiter) = self.waiters.iter_mut().find(|w| w.id == id) {
            waiter.cancelled = true;
        }
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn set_max_delta(&mut self, max_delta: f32) {
        self.max_delta = max_delta.max(0.0);
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Run one frame from a wall-clock timestamp.
    pub fn update(&mut self, ctx: &mut C, now: Instant) {
        let delta = match self.last {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.last = Some(now);
        self.advance(ctx, delta);
    }

    /// Run one frame with an explicit delta in seconds.
    pub fn advance(&mut self, ctx: &mut C, delta: f32) {
        let delta = delta.clamp(0.0, self.max_delta);
        self.tick += 1;
        self.elapsed += delta;
        let delta_scaled = delta * self.time_scale;
        self.elapsed_scaled += delta_scaled;
        let frame = Frame {
            tick: self.tick,
            delta,
            elapsed: self.elapsed,
            delta_scaled,
            elapsed_scaled: self.elapsed_scaled,
        };

        // Expired one-shots fire before the phase callbacks
        for waiter in &mut self.waiters {
            waiter.remaining -= 1;
        }
        let (due, pending): (Vec<_>, Vec<_>) =
            self.waiters.drain(..).partition(|w| w.remaining == 0);
        self.waiters = pending;
        for waiter in due {
            if waiter.cancelled {
                continue;
            }
            if let Some(callback) = waiter.callback {
                let result = catch_unwind(AssertUnwindSafe(|| callback(&mut *ctx, &frame)));
                if let Err(payload) = result {
                    tracing::error!("delayed callback panicked: {}", panic_message(&payload));
                }
            }
        }

        for sub in &mut self.subs {
            let result = catch_unwind(AssertUnwindSafe(|| (sub.callback)(&mut *ctx, &frame)));
            if let Err(payload) = result {
                tracing::error!(
                    order = sub.order,
                    "tick callback panicked: {}",
                    panic_message(&payload)
                );
            }
        }
    }
}

impl<C> Default for Ticker<C> {
    fn default() -> Self {
        Self::new(1.0 / 15.0, 1.0)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
