use crate::graph::Anchor;
use crate::layout::RouteTemplate;
use crate::session::Session;
use crate::surface::Surface;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub boxes: Vec<BoxDump>,
    pub connectors: Vec<ConnectorDump>,
    pub expanded: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BoxDump {
    pub id: String,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub header_height: f32,
    pub region: Option<RegionDump>,
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RegionDump {
    pub first_line: u32,
    pub last_line: u32,
    pub order: u32,
    pub highlighted: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectorDump {
    pub id: String,
    pub parent: String,
    pub child: String,
    pub call_site: Option<String>,
    pub template: RouteTemplate,
    pub points: Vec<[f32; 2]>,
    pub revision: u64,
}

impl LayoutDump {
    pub fn from_session<S: Surface>(session: &Session<S>) -> Self {
        let graph = session.graph();
        let surface = session.surface();

        let boxes = graph
            .boxes()
            .filter_map(|node| {
                let rect = surface.rect(&node.id)?;
                let region = session.region(&node.id).map(|region| RegionDump {
                    first_line: region.first_line(),
                    last_line: region.last_line(),
                    order: region.order,
                    highlighted: region.highlighted_references.iter().cloned().collect(),
                });
                Some(BoxDump {
                    id: node.id.to_string(),
                    kind: node.kind.as_str().to_string(),
                    x: rect.left,
                    y: rect.top,
                    width: rect.width,
                    height: rect.height,
                    header_height: node.header_height,
                    region,
                    parents: graph
                        .get_parents(&node.id)
                        .iter()
                        .map(|link| link.box_id.to_string())
                        .collect(),
                    children: graph
                        .get_children(&node.id)
                        .iter()
                        .map(|link| link.box_id.to_string())
                        .collect(),
                })
            })
            .collect();

        let connectors = graph
            .connectors()
            .map(|connector| ConnectorDump {
                id: connector.id.to_string(),
                parent: connector.parent.to_string(),
                child: connector.child.to_string(),
                call_site: match &connector.anchor {
                    Anchor::BottomCenter => None,
                    Anchor::CallSite { reference, .. } => Some(reference.clone()),
                },
                template: connector.route.template,
                points: connector.route.points.iter().map(|p| [p.0, p.1]).collect(),
                revision: connector.revision,
            })
            .collect();

        LayoutDump {
            boxes,
            connectors,
            expanded: session.context().expanded().map(str::to_string).collect(),
        }
    }
}

pub fn write_layout_dump<S: Surface>(
    path: Option<&Path>,
    session: &Session<S>,
) -> anyhow::Result<()> {
    let dump = LayoutDump::from_session(session);
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = std::io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &dump)?;
            println!();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::model::{BoxId, BoxKind, BoxNode, CodeRegion, Location, Rect};
    use crate::surface::Canvas;

    #[test]
    fn dump_lists_boxes_and_connectors() {
        let mut session = Session::new(Canvas::new(), LayoutConfig::default());
        session
            .add_box(
                BoxNode::new("a", BoxKind::FunctionBox),
                Rect::new(0.0, 0.0, 100.0, 50.0),
                Some(CodeRegion::new("x\ny", Location::new(3, 0))),
            )
            .unwrap();
        session
            .add_box(
                BoxNode::new("b", BoxKind::FunctionBox),
                Rect::new(0.0, 300.0, 100.0, 50.0),
                None,
            )
            .unwrap();
        session
            .connect(&BoxId::from("a"), &BoxId::from("b"), Anchor::BottomCenter)
            .unwrap();

        let dump = LayoutDump::from_session(&session);
        assert_eq!(dump.boxes.len(), 2);
        let a = dump.boxes.iter().find(|b| b.id == "a").unwrap();
        let region = a.region.as_ref().unwrap();
        assert_eq!((region.first_line, region.last_line), (3, 4));
        assert_eq!(a.children, vec!["b".to_string()]);
        assert_eq!(dump.connectors.len(), 1);
        assert_eq!(dump.connectors[0].id, "connector-0");
        assert_eq!(dump.connectors[0].call_site, None);

        let json = serde_json::to_string(&dump).unwrap();
        assert!(json.contains("\"parent\":\"a\""));
    }
}
