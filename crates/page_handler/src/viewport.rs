//! Viewport geometry and intersection observers.
//!
//! Observers are plain registrations here; `IntersectionRegistry::measure`
//! compares every observed target's layout box with the viewport and sends
//! each observer a batch of entries for targets that were just observed or
//! whose intersecting state flipped.

use anyhow::{Error, anyhow};
use html::NodeKey;
use log::{debug, trace};
use std::collections::HashMap;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Overlap of two rectangles, `None` when they are disjoint.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right >= left && bottom >= top).then(|| Self::new(left, top, right - left, bottom - top))
    }

    /// Point containment, edges inclusive.
    #[must_use]
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

/// Scrolled window onto the laid-out page.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub scroll_x: f32,
    pub scroll_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self {
            scroll_x: 0.0,
            scroll_y: 0.0,
            width,
            height,
        }
    }

    /// The visible region in page coordinates.
    #[must_use]
    pub const fn rect(&self) -> Rect {
        Rect::new(self.scroll_x, self.scroll_y, self.width, self.height)
    }
}

/// Fraction of `target` visible inside `viewport`.
///
/// A zero-area target counts as fully visible when it lies inside the viewport.
#[must_use]
pub fn intersection_ratio(target: &Rect, viewport: &Rect) -> f32 {
    let area = target.area();
    if area <= 0.0 {
        return if viewport.contains_point(target.x, target.y) {
            1.0
        } else {
            0.0
        };
    }
    target
        .intersection(viewport)
        .map_or(0.0, |overlap| (overlap.area() / area).clamp(0.0, 1.0))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntersectionEntry {
    pub target: NodeKey,
    pub ratio: f32,
    pub is_intersecting: bool,
}

struct Observer {
    threshold: f32,
    /// Observed targets in observation order, with the last reported state.
    targets: Vec<(NodeKey, Option<bool>)>,
    sender: UnboundedSender<Vec<IntersectionEntry>>,
}

#[derive(Default)]
pub struct IntersectionRegistry {
    observers: HashMap<ObserverId, Observer>,
    next_id: u64,
}

impl IntersectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an observer; entry batches arrive on the returned receiver.
    pub fn create(&mut self, threshold: f32) -> (ObserverId, UnboundedReceiver<Vec<IntersectionEntry>>) {
        let id = ObserverId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let (sender, receiver) = unbounded_channel();
        self.observers.insert(
            id,
            Observer {
                threshold: threshold.clamp(0.0, 1.0),
                targets: Vec::new(),
                sender,
            },
        );
        debug!("intersection observer {id:?} created (threshold {threshold})");
        (id, receiver)
    }

    /// Start observing `target`. Observing an already observed target is a no-op.
    ///
    /// # Errors
    /// Returns an error if the observer was disconnected.
    pub fn observe(&mut self, id: ObserverId, target: NodeKey) -> Result<(), Error> {
        let observer = self
            .observers
            .get_mut(&id)
            .ok_or_else(|| anyhow!("intersection observer {id:?} is disconnected"))?;
        if !observer.targets.iter().any(|(node, _)| *node == target) {
            observer.targets.push((target, None));
        }
        Ok(())
    }

    /// Stop observing `target`; returns whether it was observed.
    pub fn unobserve(&mut self, id: ObserverId, target: NodeKey) -> bool {
        let Some(observer) = self.observers.get_mut(&id) else {
            return false;
        };
        let before = observer.targets.len();
        observer.targets.retain(|(node, _)| *node != target);
        let removed = observer.targets.len() != before;
        if removed {
            trace!("observer {id:?} unobserved {target}");
        }
        removed
    }

    /// Drop an observer and all its targets. Its receiver sees the channel close.
    pub fn disconnect(&mut self, id: ObserverId) {
        if self.observers.remove(&id).is_some() {
            debug!("intersection observer {id:?} disconnected");
        }
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn observed_targets(&self, id: ObserverId) -> Vec<NodeKey> {
        self.observers
            .get(&id)
            .map(|observer| observer.targets.iter().map(|(node, _)| *node).collect())
            .unwrap_or_default()
    }

    /// Measure every observed target and queue entry batches.
    ///
    /// Targets without a layout box are never intersecting.
    /// Observers whose receiver was dropped are removed. Returns the number of
    /// entries queued.
    pub fn measure(&mut self, viewport: Rect, boxes: &HashMap<NodeKey, Rect>) -> usize {
        let mut queued = 0;
        self.observers.retain(|id, observer| {
            if observer.sender.is_closed() {
                debug!("intersection observer {id:?} dropped by its owner");
                return false;
            }
            let threshold = observer.threshold;
            let mut batch = Vec::new();
            for (target, last) in &mut observer.targets {
                let ratio = boxes
                    .get(target)
                    .map_or(0.0, |bounds| intersection_ratio(bounds, &viewport));
                let is_intersecting = ratio > 0.0 && ratio >= threshold;
                if *last != Some(is_intersecting) {
                    *last = Some(is_intersecting);
                    batch.push(IntersectionEntry {
                        target: *target,
                        ratio,
                        is_intersecting,
                    });
                }
            }
            if batch.is_empty() {
                return true;
            }
            queued += batch.len();
            observer.sender.send(batch).is_ok()
        });
        queued
    }
}
