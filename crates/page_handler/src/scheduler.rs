use core::time::Duration;
use log::trace;
use std::time::Instant;
use tokio::sync::oneshot;

/// Resolves with the frame number once the requested frame has been painted.
pub type FrameTicket = oneshot::Receiver<u64>;

/// Frame scheduler standing in for the host's "next rendering opportunity".
///
/// Callers park on a [`FrameTicket`]; `run_frame` paints a frame and wakes
/// every ticket handed out before it. Frames are throttled to at most one per
/// `budget`: a paint attempt inside the current budget window is deferred and
/// counted, and the parked tickets stay parked until a later attempt.
pub struct FrameScheduler {
    /// The minimum time interval between painted frames.
    budget: Duration,
    /// Timestamp of the most recent frame start that was allowed.
    last_frame_start: Option<Instant>,
    /// Number of paint attempts deferred due to frame budget limits (spillover).
    deferred_count: u64,
    /// Number of frames painted so far.
    frame_count: u64,
    waiters: Vec<oneshot::Sender<u64>>,
}

impl FrameScheduler {
    #[must_use]
    pub const fn new(budget: Duration) -> Self {
        Self {
            budget,
            last_frame_start: None,
            deferred_count: 0,
            frame_count: 0,
            waiters: Vec::new(),
        }
    }

    /// Checks if a new frame budget window has started, opening it if so.
    #[must_use]
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last_frame_start {
            None => {
                self.last_frame_start = Some(now);
                true
            }
            Some(start) => {
                if now.duration_since(start) >= self.budget {
                    self.last_frame_start = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Increments the count of deferred paint attempts.
    pub const fn incr_deferred(&mut self) {
        self.deferred_count = self.deferred_count.saturating_add(1);
    }

    /// Returns the total number of deferred paint attempts since creation.
    #[must_use]
    pub const fn deferred(&self) -> u64 {
        self.deferred_count
    }

    /// Number of frames painted so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frame_count
    }

    /// Tickets still waiting for a frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.waiters.iter().filter(|waiter| !waiter.is_closed()).count()
    }

    /// Request a callback slot in the next painted frame.
    pub fn next_frame(&mut self) -> FrameTicket {
        let (sender, receiver) = oneshot::channel();
        self.waiters.push(sender);
        receiver
    }

    /// Paint a frame if the budget allows, waking every parked ticket.
    ///
    /// Returns the number of tickets woken, or `None` when the attempt was
    /// deferred.
    pub fn run_frame(&mut self) -> Option<usize> {
        if !self.allow() {
            self.incr_deferred();
            trace!("frame deferred ({} pending)", self.waiters.len());
            return None;
        }
        self.frame_count = self.frame_count.saturating_add(1);
        let frame = self.frame_count;
        let woken = self
            .waiters
            .drain(..)
            .filter_map(|waiter| waiter.send(frame).ok())
            .count();
        trace!("painted frame {frame}, woke {woken} callbacks");
        Some(woken)
    }
}
