use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;
use crate::error::{GraphError, GraphResult};
use crate::layout::routing::{child_anchor_point, route};
use crate::layout::Route;
use crate::model::{BoxId, BoxNode, ConnectorId, Rect};
use crate::surface::Surface;

/// Where inside the parent box a connector starts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Anchor {
    /// Middle of the parent's bottom edge.
    #[default]
    BottomCenter,
    /// A call-site span, relative to the parent's top-left corner. The arrow
    /// leaves from the span's right edge at half its height.
    CallSite { reference: String, span: Rect },
}

impl Anchor {
    pub fn call_site(reference: impl Into<String>, span: Rect) -> Self {
        Anchor::CallSite {
            reference: reference.into(),
            span,
        }
    }

    pub fn resolve(&self, parent: &Rect) -> (f32, f32) {
        match self {
            Anchor::BottomCenter => (parent.center_x(), parent.bottom()),
            Anchor::CallSite { span, .. } => (
                parent.left + span.right(),
                parent.top + span.top + span.height / 2.0,
            ),
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Anchor::BottomCenter => None,
            Anchor::CallSite { reference, .. } => Some(reference),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    pub box_id: BoxId,
    pub connector_id: ConnectorId,
}

/// Routed arrow geometry of one edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub parent: BoxId,
    pub child: BoxId,
    pub anchor: Anchor,
    pub route: Route,
    /// Bumped on every recompute.
    pub revision: u64,
}

/// Arena of boxes and directed edges keyed by stable ids. The relation is a
/// DAG: a box may have several parents, never a path back to itself.
#[derive(Debug, Clone, Default)]
pub struct BoxGraph {
    boxes: BTreeMap<BoxId, BoxNode>,
    connectors: BTreeMap<ConnectorId, Connector>,
    children: HashMap<BoxId, Vec<Link>>,
    parents: HashMap<BoxId, Vec<Link>>,
    next_connector: u64,
    router: RouterConfig,
}

impl BoxGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_router(router: RouterConfig) -> Self {
        Self {
            router,
            ..Self::default()
        }
    }

    pub fn router(&self) -> &RouterConfig {
        &self.router
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn contains(&self, id: &BoxId) -> bool {
        self.boxes.contains_key(id)
    }

    pub fn boxes(&self) -> impl Iterator<Item = &BoxNode> {
        self.boxes.values()
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.values()
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.get(&id)
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.len()
    }

    pub fn add_box(&mut self, node: BoxNode) -> GraphResult<()> {
        if self.boxes.contains_key(&node.id) {
            return Err(GraphError::IdConflict(node.id));
        }
        tracing::debug!(id = %node.id, kind = node.kind.as_str(), "box registered");
        self.boxes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn get_box(&self, id: &BoxId) -> GraphResult<&BoxNode> {
        self.boxes
            .get(id)
            .ok_or_else(|| GraphError::NotFound(id.clone()))
    }

    /// Create an edge and its connector, routed from the current rectangles.
    pub fn connect<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        parent: &BoxId,
        child: &BoxId,
        anchor: Anchor,
    ) -> GraphResult<ConnectorId> {
        self.get_box(parent)?;
        self.get_box(child)?;
        if parent == child || self.reaches(child, parent) {
            return Err(GraphError::WouldCycle {
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        let route = self
            .compute_route(&*surface, parent, child, &anchor)
            .map_err(GraphError::MissingGeometry)?;

        let id = ConnectorId(self.next_connector);
        self.next_connector += 1;
        self.children.entry(parent.clone()).or_default().push(Link {
            box_id: child.clone(),
            connector_id: id,
        });
        self.parents.entry(child.clone()).or_default().push(Link {
            box_id: parent.clone(),
            connector_id: id,
        });
        let connector = Connector {
            id,
            parent: parent.clone(),
            child: child.clone(),
            anchor,
            route,
            revision: 0,
        };
        surface.redraw_connector(&connector);
        self.connectors.insert(id, connector);
        tracing::debug!(%parent, %child, connector = %id, "connected");
        Ok(id)
    }

    /// Remove every edge from `parent` to `child`, returning the dropped
    /// connector ids.
    pub fn remove_connection<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        parent: &BoxId,
        child: &BoxId,
    ) -> GraphResult<Vec<ConnectorId>> {
        self.get_box(parent)?;
        self.get_box(child)?;
        let ids: Vec<ConnectorId> = self
            .get_children(parent)
            .iter()
            .filter(|link| &link.box_id == child)
            .map(|link| link.connector_id)
            .collect();
        if ids.is_empty() {
            return Err(GraphError::EdgeNotFound {
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        for id in &ids {
            self.drop_connector(surface, *id);
        }
        tracing::debug!(%parent, %child, removed = ids.len(), "connection removed");
        Ok(ids)
    }

    /// Remove a single edge by its connector id.
    pub fn disconnect<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        id: ConnectorId,
    ) -> Option<Connector> {
        self.drop_connector(surface, id)
    }

    /// Unregister a box together with every edge touching it.
    pub fn remove_box<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        id: &BoxId,
    ) -> GraphResult<BoxNode> {
        self.get_box(id)?;
        let incident: Vec<ConnectorId> = self
            .get_children(id)
            .iter()
            .chain(self.get_parents(id))
            .map(|link| link.connector_id)
            .collect();
        for connector in incident {
            self.drop_connector(surface, connector);
        }
        self.children.remove(id);
        self.parents.remove(id);
        surface.discard(id);
        tracing::debug!(%id, "box removed");
        self.boxes
            .remove(id)
            .ok_or_else(|| GraphError::NotFound(id.clone()))
    }

    pub fn get_parents(&self, id: &BoxId) -> &[Link] {
        self.parents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_children(&self, id: &BoxId) -> &[Link] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parents first, then children; the undirected neighbourhood.
    pub fn neighbors(&self, id: &BoxId) -> Vec<BoxId> {
        self.get_parents(id)
            .iter()
            .chain(self.get_children(id))
            .map(|link| link.box_id.clone())
            .collect()
    }

    /// Depth-first preorder over child edges, root first. A box reachable by
    /// several paths appears once per path.
    pub fn get_subtree(&self, id: &BoxId) -> GraphResult<Vec<BoxId>> {
        self.get_box(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            for link in self.get_children(&current).iter().rev() {
                stack.push(link.box_id.clone());
            }
            out.push(current);
        }
        Ok(out)
    }

    /// Other children of every parent of `id`, each listed once.
    pub fn get_siblings(&self, id: &BoxId) -> GraphResult<Vec<BoxId>> {
        self.get_box(id)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for parent in self.get_parents(id) {
            for link in self.get_children(&parent.box_id) {
                if &link.box_id != id && seen.insert(link.box_id.clone()) {
                    out.push(link.box_id.clone());
                }
            }
        }
        Ok(out)
    }

    /// Re-route every connector touching `moved` and ask the surface to redraw
    /// it. Edges whose endpoints have no geometry are skipped.
    pub fn recompute_connectors<S: Surface + ?Sized>(&mut self, surface: &mut S, moved: &BoxId) {
        let incident: Vec<ConnectorId> = self
            .get_children(moved)
            .iter()
            .chain(self.get_parents(moved))
            .map(|link| link.connector_id)
            .collect();

        for id in incident {
            let Some(connector) = self.connectors.get(&id) else {
                continue;
            };
            let route = match self.compute_route(
                &*surface,
                &connector.parent,
                &connector.child,
                &connector.anchor,
            ) {
                Ok(route) => route,
                Err(missing) => {
                    tracing::warn!(
                        connector = %id,
                        box_id = %missing,
                        "skipping connector without geometry"
                    );
                    continue;
                }
            };
            if let Some(connector) = self.connectors.get_mut(&id) {
                connector.route = route;
                connector.revision += 1;
                surface.redraw_connector(connector);
            }
        }
    }

    /// Recompute every connector in the graph.
    pub fn recompute_all<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        let ids: Vec<BoxId> = self.boxes.keys().cloned().collect();
        for id in ids {
            // Each edge is reached from its parent only.
            let outgoing: Vec<ConnectorId> = self
                .get_children(&id)
                .iter()
                .map(|link| link.connector_id)
                .collect();
            for connector_id in outgoing {
                self.recompute_one(surface, connector_id);
            }
        }
    }

    fn recompute_one<S: Surface + ?Sized>(&mut self, surface: &mut S, id: ConnectorId) {
        let Some(connector) = self.connectors.get(&id) else {
            return;
        };
        let Ok(route) = self.compute_route(
            &*surface,
            &connector.parent,
            &connector.child,
            &connector.anchor,
        ) else {
            return;
        };
        if let Some(connector) = self.connectors.get_mut(&id) {
            connector.route = route;
            connector.revision += 1;
            surface.redraw_connector(connector);
        }
    }

    fn compute_route<S: Surface + ?Sized>(
        &self,
        surface: &S,
        parent: &BoxId,
        child: &BoxId,
        anchor: &Anchor,
    ) -> Result<Route, BoxId> {
        let parent_rect = surface.rect(parent).ok_or_else(|| parent.clone())?;
        let child_rect = surface.rect(child).ok_or_else(|| child.clone())?;
        let header = self
            .boxes
            .get(child)
            .map(|node| node.header_height)
            .unwrap_or(0.0);
        Ok(route(
            anchor.resolve(&parent_rect),
            child_anchor_point(&child_rect, header),
            &parent_rect,
            &child_rect,
            &self.router,
        ))
    }

    fn drop_connector<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        id: ConnectorId,
    ) -> Option<Connector> {
        let connector = self.connectors.remove(&id)?;
        if let Some(links) = self.children.get_mut(&connector.parent) {
            links.retain(|link| link.connector_id != id);
        }
        if let Some(links) = self.parents.get_mut(&connector.child) {
            links.retain(|link| link.connector_id != id);
        }
        surface.remove_connector(id);
        Some(connector)
    }

    /// True when `to` is reachable from `from` over child edges.
    fn reaches(&self, from: &BoxId, to: &BoxId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for link in self.get_children(current) {
                stack.push(&link.box_id);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoxKind;
    use crate::surface::Canvas;

    fn id(s: &str) -> BoxId {
        BoxId::from(s)
    }

    fn graph_with(ids: &[&str]) -> (BoxGraph, Canvas) {
        let mut graph = BoxGraph::new();
        let mut canvas = Canvas::new();
        for (idx, name) in ids.iter().enumerate() {
            graph
                .add_box(BoxNode::new(*name, BoxKind::FunctionBox))
                .expect("fresh id");
            canvas.insert(*name, Rect::new(idx as f32 * 300.0, idx as f32 * 200.0, 200.0, 100.0));
        }
        (graph, canvas)
    }

    #[test]
    fn add_box_rejects_duplicates() {
        let (mut graph, _) = graph_with(&["a"]);
        let err = graph
            .add_box(BoxNode::new("a", BoxKind::CodeRegion))
            .unwrap_err();
        assert_eq!(err, GraphError::IdConflict(id("a")));
        assert_eq!(graph.get_box(&id("a")).unwrap().kind, BoxKind::FunctionBox);
    }

    #[test]
    fn get_box_reports_unknown_ids() {
        let (graph, _) = graph_with(&[]);
        assert_eq!(graph.get_box(&id("x")), Err(GraphError::NotFound(id("x"))));
    }

    #[test]
    fn connect_requires_registered_endpoints() {
        let (mut graph, mut canvas) = graph_with(&["p"]);
        let err = graph
            .connect(&mut canvas, &id("p"), &id("c"), Anchor::BottomCenter)
            .unwrap_err();
        assert_eq!(err, GraphError::NotFound(id("c")));
        assert!(graph.get_children(&id("p")).is_empty());
    }

    #[test]
    fn connect_requires_geometry() {
        let (mut graph, mut canvas) = graph_with(&["p"]);
        graph.add_box(BoxNode::new("c", BoxKind::CodeRegion)).unwrap();
        let err = graph
            .connect(&mut canvas, &id("p"), &id("c"), Anchor::BottomCenter)
            .unwrap_err();
        assert_eq!(err, GraphError::MissingGeometry(id("c")));
    }

    #[test]
    fn connect_then_remove_leaves_nothing_behind() {
        let (mut graph, mut canvas) = graph_with(&["p", "c"]);
        let connector = graph
            .connect(&mut canvas, &id("p"), &id("c"), Anchor::BottomCenter)
            .unwrap();
        assert_eq!(graph.get_children(&id("p"))[0].box_id, id("c"));
        assert_eq!(graph.get_parents(&id("c"))[0].connector_id, connector);
        assert!(canvas.drawn_route(connector).is_some());

        let removed = graph
            .remove_connection(&mut canvas, &id("p"), &id("c"))
            .unwrap();
        assert_eq!(removed, vec![connector]);
        assert!(graph.get_children(&id("p")).is_empty());
        assert!(graph.get_parents(&id("c")).is_empty());
        assert!(graph.connector(connector).is_none());
        assert!(canvas.drawn_route(connector).is_none());
    }

    #[test]
    fn remove_missing_connection_fails() {
        let (mut graph, mut canvas) = graph_with(&["p", "c"]);
        let err = graph
            .remove_connection(&mut canvas, &id("p"), &id("c"))
            .unwrap_err();
        assert!(matches!(err, GraphError::EdgeNotFound { .. }));
    }

    #[test]
    fn connect_rejects_cycles() {
        let (mut graph, mut canvas) = graph_with(&["a", "b", "c"]);
        graph.connect(&mut canvas, &id("a"), &id("b"), Anchor::BottomCenter).unwrap();
        graph.connect(&mut canvas, &id("b"), &id("c"), Anchor::BottomCenter).unwrap();
        let err = graph
            .connect(&mut canvas, &id("c"), &id("a"), Anchor::BottomCenter)
            .unwrap_err();
        assert!(matches!(err, GraphError::WouldCycle { .. }));
        assert!(matches!(
            graph.connect(&mut canvas, &id("a"), &id("a"), Anchor::BottomCenter),
            Err(GraphError::WouldCycle { .. })
        ));
    }

    #[test]
    fn subtree_keeps_one_entry_per_path() {
        // a -> b -> d, a -> c -> d: d is a shared call target.
        let (mut graph, mut canvas) = graph_with(&["a", "b", "c", "d"]);
        for (p, c) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")] {
            graph.connect(&mut canvas, &id(p), &id(c), Anchor::BottomCenter).unwrap();
        }
        let subtree = graph.get_subtree(&id("a")).unwrap();
        assert_eq!(subtree, vec![id("a"), id("b"), id("d"), id("c"), id("d")]);
        assert_eq!(graph.get_subtree(&id("d")).unwrap(), vec![id("d")]);
    }

    #[test]
    fn siblings_union_over_all_parents() {
        let (mut graph, mut canvas) = graph_with(&["p1", "p2", "x", "y", "z"]);
        for (p, c) in [("p1", "x"), ("p1", "y"), ("p2", "x"), ("p2", "y"), ("p2", "z")] {
            graph.connect(&mut canvas, &id(p), &id(c), Anchor::BottomCenter).unwrap();
        }
        assert_eq!(graph.get_siblings(&id("x")).unwrap(), vec![id("y"), id("z")]);
        assert!(graph.get_siblings(&id("p1")).unwrap().is_empty());
    }

    #[test]
    fn recompute_follows_moved_box() {
        let (mut graph, mut canvas) = graph_with(&["p", "c"]);
        let connector = graph
            .connect(&mut canvas, &id("p"), &id("c"), Anchor::BottomCenter)
            .unwrap();
        let before = graph.connector(connector).unwrap().route.clone();
        canvas.set_position(&id("c"), 900.0, 900.0);
        graph.recompute_connectors(&mut canvas, &id("c"));
        let after = graph.connector(connector).unwrap();
        assert_ne!(after.route, before);
        assert_eq!(after.revision, 1);
        assert_eq!(after.route.end(), Some((995.0, 900.0)));
        assert_eq!(canvas.drawn_route(connector), Some(after.route.points.as_slice()));
    }

    #[test]
    fn recompute_skips_edges_without_geometry() {
        let (mut graph, mut canvas) = graph_with(&["p", "c"]);
        let connector = graph
            .connect(&mut canvas, &id("p"), &id("c"), Anchor::BottomCenter)
            .unwrap();
        canvas.remove(&id("c"));
        graph.recompute_connectors(&mut canvas, &id("p"));
        assert_eq!(graph.connector(connector).unwrap().revision, 0);
    }

    #[test]
    fn call_site_anchor_leaves_from_span_right_edge() {
        let anchor = Anchor::call_site("ref-1", Rect::new(10.0, 40.0, 60.0, 20.0));
        let parent = Rect::new(100.0, 100.0, 300.0, 200.0);
        assert_eq!(anchor.resolve(&parent), (170.0, 150.0));
        assert_eq!(anchor.reference(), Some("ref-1"));
    }

    #[test]
    fn remove_box_drops_incident_edges() {
        let (mut graph, mut canvas) = graph_with(&["a", "b", "c"]);
        graph.connect(&mut canvas, &id("a"), &id("b"), Anchor::BottomCenter).unwrap();
        graph.connect(&mut canvas, &id("b"), &id("c"), Anchor::BottomCenter).unwrap();
        graph.remove_box(&mut canvas, &id("b")).unwrap();
        assert!(!graph.contains(&id("b")));
        assert!(graph.get_children(&id("a")).is_empty());
        assert!(graph.get_parents(&id("c")).is_empty());
        assert_eq!(graph.connector_count(), 0);
        assert!(canvas.rect(&id("b")).is_none());
    }
}
