use serde::{Deserialize, Serialize};

use crate::model::{BoxId, Rect};

/// The five fixed orthogonal shapes a connector can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteTemplate {
    /// Child to the right, above or only slightly below: pivot between the
    /// boxes, lift over both, land on the child's top.
    RightDetour,
    /// Child to the right and far below: down, across, down.
    RightDrop,
    LeftDetour,
    LeftDrop,
    /// Anchors vertically aligned.
    Straight,
}

/// Orthogonal polyline of one connector. The arrowhead sits on the last
/// segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub template: RouteTemplate,
    pub points: Vec<(f32, f32)>,
}

impl Route {
    pub fn new(template: RouteTemplate, points: Vec<(f32, f32)>) -> Self {
        Self { template, points }
    }

    pub fn start(&self) -> Option<(f32, f32)> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<(f32, f32)> {
        self.points.last().copied()
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    pub fn arrow_segment(&self) -> Option<((f32, f32), (f32, f32))> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        Some((self.points[n - 2], self.points[n - 1]))
    }

    pub fn length(&self) -> f32 {
        self.points
            .windows(2)
            .map(|w| (w[1].0 - w[0].0).abs() + (w[1].1 - w[0].1).abs())
            .sum()
    }

    pub fn is_orthogonal(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| w[0].0 == w[1].0 || w[0].1 == w[1].1)
    }

    pub fn bounds(&self) -> Option<Rect> {
        let (first, rest) = self.points.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for (x, y) in rest {
            min.0 = min.0.min(*x);
            min.1 = min.1.min(*y);
            max.0 = max.0.max(*x);
            max.1 = max.1.max(*y);
        }
        Some(Rect::new(min.0, min.1, max.0 - min.0, max.1 - min.1))
    }
}

/// A candidate rectangle used for collision testing before a displacement is
/// committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualBox {
    pub id: BoxId,
    pub rect: Rect,
}

/// Move `target` horizontally so that it clears `reference`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Displacement {
    pub target: BoxId,
    pub reference: BoxId,
    pub from_left: f32,
    pub new_left: f32,
}

impl Displacement {
    pub fn delta(&self) -> f32 {
        self.new_left - self.from_left
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TidyPlan {
    /// At most one instruction per box, in the order they were committed.
    pub displacements: Vec<Displacement>,
    /// Number of BFS layers processed, the inserted boxes included.
    pub layers: usize,
    /// Number of distinct boxes whose rectangle was tested.
    pub touched: usize,
}

impl TidyPlan {
    pub fn is_empty(&self) -> bool {
        self.displacements.is_empty()
    }

    pub fn displacement_for(&self, id: &BoxId) -> Option<&Displacement> {
        self.displacements.iter().find(|d| &d.target == id)
    }
}
