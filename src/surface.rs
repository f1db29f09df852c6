use std::collections::BTreeMap;

use crate::graph::Connector;
use crate::model::{BoxId, ConnectorId, Rect};

/// The rendering surface the engine reads geometry from and writes positions
/// to. The engine issues no other geometry queries.
pub trait Surface {
    fn rect(&self, id: &BoxId) -> Option<Rect>;

    fn set_position(&mut self, id: &BoxId, left: f32, top: f32);

    /// Put a newly created box on the surface.
    fn place(&mut self, id: &BoxId, rect: Rect);

    /// Called after a box was unregistered from the graph.
    fn discard(&mut self, _id: &BoxId) {}

    /// Called after a connector's route was recomputed.
    fn redraw_connector(&mut self, _connector: &Connector) {}

    /// Called after a connector was dropped from the graph.
    fn remove_connector(&mut self, _id: ConnectorId) {}
}

/// In-memory surface holding one rectangle per box plus a copy of every drawn
/// connector route.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    rects: BTreeMap<BoxId, Rect>,
    drawn: BTreeMap<ConnectorId, Vec<(f32, f32)>>,
    redraws: usize,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<BoxId>, rect: Rect) {
        self.rects.insert(id.into(), rect);
    }

    pub fn remove(&mut self, id: &BoxId) -> Option<Rect> {
        self.rects.remove(id)
    }

    pub fn rects(&self) -> impl Iterator<Item = (&BoxId, &Rect)> {
        self.rects.iter()
    }

    pub fn drawn_route(&self, id: ConnectorId) -> Option<&[(f32, f32)]> {
        self.drawn.get(&id).map(Vec::as_slice)
    }

    pub fn drawn_count(&self) -> usize {
        self.drawn.len()
    }

    /// Total number of connector redraw requests received.
    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Bounding box of every rectangle on the canvas.
    pub fn bounds(&self) -> Option<Rect> {
        self.rects.values().copied().reduce(|acc, rect| acc.union(&rect))
    }
}

impl Surface for Canvas {
    fn rect(&self, id: &BoxId) -> Option<Rect> {
        self.rects.get(id).copied()
    }

    fn set_position(&mut self, id: &BoxId, left: f32, top: f32) {
        if let Some(rect) = self.rects.get_mut(id) {
            rect.left = left;
            rect.top = top;
        }
    }

    fn place(&mut self, id: &BoxId, rect: Rect) {
        self.rects.insert(id.clone(), rect);
    }

    fn discard(&mut self, id: &BoxId) {
        self.rects.remove(id);
    }

    fn redraw_connector(&mut self, connector: &Connector) {
        self.redraws += 1;
        self.drawn
            .insert(connector.id, connector.route.points.clone());
    }

    fn remove_connector(&mut self, id: ConnectorId) {
        self.drawn.remove(&id);
    }
}
