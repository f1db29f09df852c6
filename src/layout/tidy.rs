use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::config::TidyConfig;
use crate::error::{GraphError, GraphResult};
use crate::graph::BoxGraph;
use crate::model::{BoxId, Rect};
use crate::surface::Surface;

use super::animation::Animator;
use super::types::{Displacement, TidyPlan, VirtualBox};

/// Collision-driven tidy pass run after a cluster of boxes is inserted.
#[derive(Debug, Clone, Default)]
pub struct TidyEngine {
    config: TidyConfig,
}

impl TidyEngine {
    pub fn new(config: TidyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TidyConfig {
        &self.config
    }

    /// Compute the displacements needed to clear the area around `inserted`.
    /// Nothing is moved; the plan only reads rectangles from the surface.
    pub fn plan<S: Surface + ?Sized>(
        &self,
        graph: &BoxGraph,
        surface: &S,
        inserted: &[BoxId],
    ) -> GraphResult<TidyPlan> {
        let mut frontier = Vec::with_capacity(inserted.len());
        for id in inserted {
            graph.get_box(id)?;
            let rect = surface
                .rect(id)
                .ok_or_else(|| GraphError::MissingGeometry(id.clone()))?;
            frontier.push(VirtualBox {
                id: id.clone(),
                rect,
            });
        }

        let mut visited: HashSet<BoxId> = inserted.iter().cloned().collect();
        let mut touched: HashSet<BoxId> = HashSet::new();
        let mut plan = TidyPlan::default();

        while !frontier.is_empty() {
            plan.layers += 1;

            // Within a layer the last virtual box to hit a target wins, but
            // the target keeps its first-seen slot.
            let mut layer: Vec<Displacement> = Vec::new();
            let mut slot: HashMap<BoxId, usize> = HashMap::new();
            for virtual_box in &frontier {
                for (collider, rect) in colliders(graph, surface, virtual_box, &mut touched) {
                    let displacement =
                        push_clear(virtual_box, collider.clone(), &rect, self.config.margin);
                    match slot.get(&collider) {
                        Some(&index) => layer[index] = displacement,
                        None => {
                            slot.insert(collider, layer.len());
                            layer.push(displacement);
                        }
                    }
                }
            }

            let mut next = Vec::new();
            for displacement in layer {
                if !visited.insert(displacement.target.clone()) {
                    continue;
                }
                if let Some(rect) = surface.rect(&displacement.target) {
                    next.push(VirtualBox {
                        id: displacement.target.clone(),
                        rect: rect.with_left(displacement.new_left),
                    });
                }
                plan.displacements.push(displacement);
            }
            frontier = next;
        }

        plan.touched = touched.len();
        tracing::debug!(
            inserted = inserted.len(),
            displaced = plan.displacements.len(),
            layers = plan.layers,
            touched = plan.touched,
            "tidy plan computed"
        );
        Ok(plan)
    }

    /// Schedule one slide per displacement, starting from the box's current
    /// left edge.
    pub fn apply<S: Surface + ?Sized>(
        &self,
        plan: &TidyPlan,
        animator: &mut Animator,
        surface: &S,
        now: Duration,
    ) {
        for displacement in &plan.displacements {
            let from_left = surface
                .rect(&displacement.target)
                .map(|rect| rect.left)
                .unwrap_or(displacement.from_left);
            animator.start(displacement.target.clone(), from_left, displacement.new_left, now);
        }
    }
}

/// Breadth-first walk of the undirected neighbourhood of `virtual_box`,
/// returning every box whose current rectangle overlaps it.
fn colliders<S: Surface + ?Sized>(
    graph: &BoxGraph,
    surface: &S,
    virtual_box: &VirtualBox,
    touched: &mut HashSet<BoxId>,
) -> Vec<(BoxId, Rect)> {
    let mut hits = Vec::new();
    let mut queued: HashSet<BoxId> = HashSet::from([virtual_box.id.clone()]);
    let mut queue: VecDeque<BoxId> = VecDeque::new();
    for neighbor in graph.neighbors(&virtual_box.id) {
        if queued.insert(neighbor.clone()) {
            queue.push_back(neighbor);
        }
    }

    while let Some(current) = queue.pop_front() {
        if let Some(rect) = surface.rect(&current) {
            touched.insert(current.clone());
            if virtual_box.rect.intersects(&rect) {
                hits.push((current.clone(), rect));
            }
        }
        for neighbor in graph.neighbors(&current) {
            if queued.insert(neighbor.clone()) {
                queue.push_back(neighbor);
            }
        }
    }
    hits
}

/// Push `collider` out of the virtual box's horizontal span, away from it.
fn push_clear(
    virtual_box: &VirtualBox,
    target: BoxId,
    collider: &Rect,
    margin: f32,
) -> Displacement {
    let new_left = if virtual_box.rect.left < collider.left {
        virtual_box.rect.right() + margin
    } else {
        virtual_box.rect.left - margin
    };
    Displacement {
        target,
        reference: virtual_box.id.clone(),
        from_left: collider.left,
        new_left,
    }
}

/// Translate every box under the children of `root`, each distinct box once,
/// and reroute its connectors. Returns the moved ids in traversal order.
pub fn shift_subtrees<S: Surface + ?Sized>(
    graph: &mut BoxGraph,
    surface: &mut S,
    root: &BoxId,
    dx: f32,
    dy: f32,
) -> GraphResult<Vec<BoxId>> {
    graph.get_box(root)?;
    let children: Vec<BoxId> = graph
        .get_children(root)
        .iter()
        .map(|link| link.box_id.clone())
        .collect();

    let mut seen = HashSet::new();
    let mut moved = Vec::new();
    for child in children {
        for id in graph.get_subtree(&child)? {
            if seen.insert(id.clone()) {
                moved.push(id);
            }
        }
    }

    for id in &moved {
        if let Some(rect) = surface.rect(id) {
            surface.set_position(id, rect.left + dx, rect.top + dy);
        }
    }
    for id in &moved {
        graph.recompute_connectors(surface, id);
    }
    if !moved.is_empty() {
        tracing::debug!(%root, dx, dy, moved = moved.len(), "shifted subtrees");
    }
    Ok(moved)
}
