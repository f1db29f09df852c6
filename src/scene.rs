use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::graph::Anchor;
use crate::model::{BoxId, BoxKind, BoxNode, CodeRegion, Rect};
use crate::session::{MemoryIndex, Session};
use crate::surface::Canvas;

/// A saved arrangement of boxes, as read by the CLI and the test fixtures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub boxes: Vec<SceneBox>,
    #[serde(default)]
    pub edges: Vec<SceneEdge>,
    /// Inline code index used to expand references.
    #[serde(default)]
    pub index: MemoryIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneBox {
    pub id: BoxId,
    pub kind: BoxKind,
    pub rect: Rect,
    #[serde(default)]
    pub header_height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<CodeRegion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEdge {
    pub parent: BoxId,
    pub child: BoxId,
    #[serde(default)]
    pub anchor: Anchor,
}

pub fn load_scene(path: &Path) -> anyhow::Result<Scene> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading scene {}", path.display()))?;
    parse_scene(&contents).with_context(|| format!("parsing scene {}", path.display()))
}

/// Parse a scene from JSON, falling back to JSON5 for hand-written files.
pub fn parse_scene(contents: &str) -> anyhow::Result<Scene> {
    match serde_json::from_str(contents) {
        Ok(scene) => Ok(scene),
        Err(err) => json5::from_str(contents).map_err(|_| anyhow::Error::new(err)),
    }
}

impl Scene {
    /// Register every box and edge with a fresh session over a [`Canvas`].
    pub fn into_session(
        self,
        config: LayoutConfig,
    ) -> anyhow::Result<(Session<Canvas>, MemoryIndex)> {
        let mut session = Session::new(Canvas::new(), config);
        for scene_box in self.boxes {
            let node =
                BoxNode::new(scene_box.id, scene_box.kind).with_header(scene_box.header_height);
            let id = node.id.clone();
            session
                .add_box(node, scene_box.rect, scene_box.region)
                .with_context(|| format!("adding box {id}"))?;
        }
        for edge in self.edges {
            session
                .connect(&edge.parent, &edge.child, edge.anchor)
                .with_context(|| format!("connecting {} -> {}", edge.parent, edge.child))?;
        }
        tracing::debug!(
            boxes = session.graph().len(),
            connectors = session.graph().connector_count(),
            "scene loaded"
        );
        Ok((session, self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;

    const SCENE: &str = r#"{
        "boxes": [
            { "id": "main", "kind": "functionBox", "rect": { "left": 0, "top": 0, "width": 200, "height": 80 }, "headerHeight": 24 },
            { "id": "body", "kind": "codeRegion", "rect": { "left": 0, "top": 150, "width": 300, "height": 200 },
              "region": { "text": "a();\nb();", "start": { "line": 4, "character": 0 } } }
        ],
        "edges": [ { "parent": "main", "child": "body" } ]
    }"#;

    #[test]
    fn json_scene_builds_a_session() {
        let scene = parse_scene(SCENE).unwrap();
        let (session, index) = scene.into_session(LayoutConfig::default()).unwrap();
        assert_eq!(session.graph().len(), 2);
        assert_eq!(session.graph().connector_count(), 1);
        assert_eq!(session.graph().get_box(&BoxId::from("main")).unwrap().header_height, 24.0);
        assert_eq!(session.region(&BoxId::from("body")).unwrap().order, 1);
        assert!(index.functions.is_empty());
    }

    #[test]
    fn json5_scene_is_accepted() {
        let scene = parse_scene(
            "{ boxes: [ { id: 'a', kind: 'searchPanel', rect: { left: 1, top: 2, width: 3, height: 4 } } ], }",
        )
        .unwrap();
        assert_eq!(scene.boxes[0].rect, Rect::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn call_site_anchor_is_read_from_edges() {
        let edge: SceneEdge = serde_json::from_str(
            r#"{ "parent": "a", "child": "b",
                 "anchor": { "type": "callSite", "reference": "r", "span": { "left": 1, "top": 2, "width": 3, "height": 4 } } }"#,
        )
        .unwrap();
        assert_eq!(edge.anchor.reference(), Some("r"));
    }

    #[test]
    fn dangling_edge_is_reported() {
        let mut scene = parse_scene(SCENE).unwrap();
        scene.edges.push(SceneEdge {
            parent: BoxId::from("main"),
            child: BoxId::from("ghost"),
            anchor: Anchor::BottomCenter,
        });
        let err = scene.into_session(LayoutConfig::default()).err().unwrap();
        assert_eq!(
            err.downcast_ref::<GraphError>(),
            Some(&GraphError::NotFound(BoxId::from("ghost")))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_scene("boxes: [").is_err());
    }
}
