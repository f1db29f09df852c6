use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::{Easing, TidyConfig};
use crate::graph::BoxGraph;
use crate::model::BoxId;
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slide {
    from_left: f32,
    to_left: f32,
    start: Duration,
}

/// Horizontal slides in flight, advanced by the host with a monotonic clock.
/// Starting a slide for a box that is already moving replaces the old one.
#[derive(Debug, Clone)]
pub struct Animator {
    duration: Duration,
    easing: Easing,
    active: BTreeMap<BoxId, Slide>,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new(&TidyConfig::default())
    }
}

impl Animator {
    pub fn new(config: &TidyConfig) -> Self {
        Self {
            duration: Duration::from_millis(config.duration_ms),
            easing: config.easing,
            active: BTreeMap::new(),
        }
    }

    pub fn start(&mut self, id: BoxId, from_left: f32, to_left: f32, now: Duration) {
        if self.active.contains_key(&id) {
            tracing::debug!(%id, to_left, "superseding slide");
        }
        self.active.insert(
            id,
            Slide {
                from_left,
                to_left,
                start: now,
            },
        );
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active(&self) -> usize {
        self.active.len()
    }

    /// Target left edge of a box still in motion.
    pub fn target(&self, id: &BoxId) -> Option<f32> {
        self.active.get(id).map(|slide| slide.to_left)
    }

    /// Move every animated box to its position at `now` and reroute its
    /// connectors. Returns the number of slides still running.
    pub fn tick<S: Surface + ?Sized>(
        &mut self,
        now: Duration,
        graph: &mut BoxGraph,
        surface: &mut S,
    ) -> usize {
        let mut finished = Vec::new();
        for (id, slide) in &self.active {
            let progress = self.progress(slide, now);
            let eased = self.easing.apply(progress);
            let left = slide.from_left + (slide.to_left - slide.from_left) * eased;
            if let Some(rect) = surface.rect(id) {
                surface.set_position(id, left, rect.top);
                graph.recompute_connectors(surface, id);
            }
            if progress >= 1.0 {
                finished.push(id.clone());
            }
        }
        for id in finished {
            self.active.remove(&id);
        }
        self.active.len()
    }

    /// Jump every slide to its end position.
    pub fn settle<S: Surface + ?Sized>(&mut self, graph: &mut BoxGraph, surface: &mut S) {
        for (id, slide) in std::mem::take(&mut self.active) {
            if let Some(rect) = surface.rect(&id) {
                surface.set_position(&id, slide.to_left, rect.top);
                graph.recompute_connectors(surface, &id);
            }
        }
    }

    fn progress(&self, slide: &Slide, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(slide.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}
