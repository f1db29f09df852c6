use crate::error::{GraphError, GraphResult};
use crate::graph::BoxGraph;
use crate::model::BoxId;
use crate::surface::Surface;

/// One pointer gesture on a box. Created at pointer-down, dropped at
/// pointer-up; the input layer feeds it every pointer-move frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragSession {
    #[default]
    Idle,
    DraggingSingle {
        box_id: BoxId,
        /// Pointer position relative to the box's top-left corner.
        grab_offset: (f32, f32),
    },
    DraggingSubtree {
        box_id: BoxId,
        grab_offset: (f32, f32),
        /// Every distinct descendant with its offset from the dragged box.
        members: Vec<(BoxId, (f32, f32))>,
    },
}

impl DragSession {
    /// Pointer-down on `id`. With `subtree` set, every box below it follows.
    pub fn begin<S: Surface + ?Sized>(
        graph: &BoxGraph,
        surface: &S,
        id: &BoxId,
        pointer: (f32, f32),
        subtree: bool,
    ) -> GraphResult<Self> {
        graph.get_box(id)?;
        let rect = surface
            .rect(id)
            .ok_or_else(|| GraphError::MissingGeometry(id.clone()))?;
        let grab_offset = (pointer.0 - rect.left, pointer.1 - rect.top);

        if !subtree {
            return Ok(DragSession::DraggingSingle {
                box_id: id.clone(),
                grab_offset,
            });
        }

        let mut members: Vec<(BoxId, (f32, f32))> = Vec::new();
        for member in graph.get_subtree(id)?.into_iter().skip(1) {
            if &member == id || members.iter().any(|(seen, _)| seen == &member) {
                continue;
            }
            if let Some(member_rect) = surface.rect(&member) {
                let offset = (member_rect.left - rect.left, member_rect.top - rect.top);
                members.push((member, offset));
            }
        }
        tracing::debug!(%id, members = members.len(), "subtree drag started");
        Ok(DragSession::DraggingSubtree {
            box_id: id.clone(),
            grab_offset,
            members,
        })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, DragSession::Idle)
    }

    pub fn box_id(&self) -> Option<&BoxId> {
        match self {
            DragSession::Idle => None,
            DragSession::DraggingSingle { box_id, .. }
            | DragSession::DraggingSubtree { box_id, .. } => Some(box_id),
        }
    }

    /// Move the dragged boxes under the pointer and reroute their connectors.
    /// Returns how many boxes moved.
    pub fn pointer_moved<S: Surface + ?Sized>(
        &self,
        graph: &mut BoxGraph,
        surface: &mut S,
        pointer: (f32, f32),
    ) -> usize {
        match self {
            DragSession::Idle => 0,
            DragSession::DraggingSingle { box_id, grab_offset } => {
                let (left, top) = (pointer.0 - grab_offset.0, pointer.1 - grab_offset.1);
                surface.set_position(box_id, left, top);
                graph.recompute_connectors(surface, box_id);
                1
            }
            DragSession::DraggingSubtree {
                box_id,
                grab_offset,
                members,
            } => {
                let (left, top) = (pointer.0 - grab_offset.0, pointer.1 - grab_offset.1);
                surface.set_position(box_id, left, top);
                for (member, (dx, dy)) in members {
                    surface.set_position(member, left + dx, top + dy);
                }
                graph.recompute_connectors(surface, box_id);
                for (member, _) in members {
                    graph.recompute_connectors(surface, member);
                }
                members.len() + 1
            }
        }
    }

    /// Pointer-up. Returns the box that was being dragged.
    pub fn end(&mut self) -> Option<BoxId> {
        match std::mem::take(self) {
            DragSession::Idle => None,
            DragSession::DraggingSingle { box_id, .. }
            | DragSession::DraggingSubtree { box_id, .. } => Some(box_id),
        }
    }
}
