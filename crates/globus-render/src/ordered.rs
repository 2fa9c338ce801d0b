//! Deferred renderables drained back-to-front by eye distance.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::DVec2;

use crate::{DrawContext, RenderError};

/// A draw request deferred until the frame's ordered-rendering phase.
///
/// Implementors own everything they need to draw for the frame; the queue drops
/// them once polled and drawn.
pub trait OrderedRenderable: Any {
    /// Distance from the eye used to composite back-to-front.
    fn distance_from_eye(&self) -> f64;

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError>;

    /// Draw in unique pick colors and resolve what lies under `pick_point`.
    fn pick(&self, dc: &mut DrawContext, pick_point: Option<DVec2>) -> Result<(), RenderError>;

    /// Access to the concrete type, used by renderers that batch runs of
    /// their own items.
    fn as_any(&self) -> &dyn Any;
}

/// Result of offering an optional renderable to a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueOutcome {
    Queued,
    /// Nothing was offered; the call was a no-op.
    Ignored,
}

struct Entry {
    renderable: Box<dyn OrderedRenderable>,
    distance: f64,
    sequence: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// Farther entries rank higher; among equal distances, earlier insertions
    /// rank higher.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Max-heap of ordered renderables keyed on `(distance, insertion sequence)`.
#[derive(Default)]
pub struct OrderedQueue {
    heap: BinaryHeap<Entry>,
    next_sequence: u64,
}

impl OrderedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue with the renderable's own eye distance.
    pub fn push(&mut self, renderable: Box<dyn OrderedRenderable>) {
        let distance = renderable.distance_from_eye();
        self.push_with_distance(renderable, distance);
    }

    /// Queue ahead of every finite-distance item so it is drawn beneath them.
    pub fn push_behind(&mut self, renderable: Box<dyn OrderedRenderable>) {
        self.push_with_distance(renderable, f64::INFINITY);
    }

    fn push_with_distance(&mut self, renderable: Box<dyn OrderedRenderable>, distance: f64) {
        // NaN distances would poison the ordering; treat them as coincident with the eye.
        let distance = if distance.is_nan() { 0.0 } else { distance };
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Entry {
            renderable,
            distance,
            sequence,
        });
    }

    pub fn peek(&self) -> Option<&dyn OrderedRenderable> {
        self.heap.peek().map(|e| e.renderable.as_ref())
    }

    pub fn poll(&mut self) -> Option<Box<dyn OrderedRenderable>> {
        self.heap.pop().map(|e| e.renderable)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_sequence = 0;
    }
}
