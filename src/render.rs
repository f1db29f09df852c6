use crate::config::{CodeBoxConfig, RenderConfig};
use crate::model::Rect;
use crate::session::Session;
use crate::split::call_site_span;
use crate::surface::Surface;
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

/// Static SVG snapshot of a session: every box with its code, every connector
/// with its arrowhead.
pub fn render_svg<S: Surface>(
    session: &Session<S>,
    theme: &Theme,
    render: &RenderConfig,
    code_box: &CodeBoxConfig,
) -> String {
    let graph = session.graph();
    let surface = session.surface();

    let mut bounds: Option<Rect> = None;
    for node in graph.boxes() {
        if let Some(rect) = surface.rect(&node.id) {
            bounds = Some(bounds.map_or(rect, |acc| acc.union(&rect)));
        }
    }
    for connector in graph.connectors() {
        if let Some(route) = connector.route.bounds() {
            bounds = Some(bounds.map_or(route, |acc| acc.union(&route)));
        }
    }
    let view = bounds.unwrap_or(Rect::new(0.0, 0.0, render.width, render.height));
    let min_x = view.left - render.padding;
    let min_y = view.top - render.padding;
    let width = (view.width + 2.0 * render.padding).max(200.0);
    let height = (view.height + 2.0 * render.padding).max(200.0);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"{min_x:.2} {min_y:.2} {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect x=\"{min_x:.2}\" y=\"{min_y:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        render.background
    ));
    svg.push_str("<defs>");
    svg.push_str(&format!(
        "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.line_color
    ));
    svg.push_str("</defs>");

    for node in graph.boxes() {
        let Some(rect) = surface.rect(&node.id) else {
            continue;
        };
        svg.push_str(&format!(
            "<rect id=\"{}\" class=\"{}\" x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"/>",
            escape_xml(node.id.as_str()),
            node.kind.as_str(),
            rect.left,
            rect.top,
            rect.width,
            rect.height,
            theme.fill_for(node.kind),
            theme.border_color
        ));
        if node.header_height > 0.0 {
            svg.push_str(&format!(
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
                rect.left, rect.top, rect.width, node.header_height, theme.header_fill
            ));
        }

        match session.region(&node.id) {
            Some(region) => {
                for reference in &region.function_references {
                    if !region.highlighted_references.contains(&reference.hash) {
                        continue;
                    }
                    let span = call_site_span(region, reference, node.header_height, code_box);
                    svg.push_str(&format!(
                        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-dasharray=\"3 2\"/>",
                        rect.left + span.left,
                        rect.top + span.top,
                        span.width,
                        span.height,
                        theme.line_color
                    ));
                }
                let x = rect.left + code_box.padding_x;
                let y = rect.top + node.header_height + code_box.padding_y;
                svg.push_str(&code_text_svg(x, y, &region.text, theme, code_box));
            }
            None => {
                let label = format!("{} {}", node.kind.as_str(), node.id);
                svg.push_str(&format!(
                    "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                    rect.left + code_box.padding_x,
                    rect.top + node.header_height.max(code_box.line_height),
                    theme.font_family,
                    theme.font_size,
                    theme.muted_text_color,
                    escape_xml(&label)
                ));
            }
        }
    }

    for connector in graph.connectors() {
        svg.push_str(&format!(
            "<path id=\"{}\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\" marker-end=\"url(#arrow)\" />",
            connector.id,
            points_to_path(&connector.route.points),
            theme.line_color
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

fn code_text_svg(x: f32, y: f32, code: &str, theme: &Theme, config: &CodeBoxConfig) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "<text x=\"{x:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" xml:space=\"preserve\">",
        y + theme.font_size,
        theme.font_family,
        theme.font_size,
        theme.text_color
    ));
    for (idx, line) in code.split('\n').enumerate() {
        let dy = if idx == 0 { 0.0 } else { config.line_height };
        text.push_str(&format!(
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(&line.replace('\t', "    "))
        ));
    }
    text.push_str("</text>");
    text
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(
    svg: &str,
    output: &Path,
    render_cfg: &RenderConfig,
    theme: &Theme,
) -> Result<()> {
    let mut opt = usvg::Options::default();
    if let Some(family) = theme.font_family.split(',').next() {
        opt.font_family = family.trim().trim_matches('"').to_string();
    }
    opt.fontdb_mut().load_system_fonts();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| {
            anyhow::anyhow!("invalid render size {}x{}", render_cfg.width, render_cfg.height)
        })?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::graph::Anchor;
    use crate::model::{BoxId, BoxKind, BoxNode, CodeRegion, Location};
    use crate::surface::Canvas;

    fn session() -> Session<Canvas> {
        let mut session = Session::new(Canvas::new(), LayoutConfig::default());
        session
            .add_box(
                BoxNode::new("main", BoxKind::FunctionBox).with_header(24.0),
                Rect::new(0.0, 0.0, 200.0, 80.0),
                None,
            )
            .unwrap();
        session
            .add_box(
                BoxNode::new("body", BoxKind::CodeRegion),
                Rect::new(300.0, 200.0, 200.0, 80.0),
                Some(CodeRegion::new("if a < b {\n\tgo();\n}", Location::new(0, 0))),
            )
            .unwrap();
        session
            .connect(&BoxId::from("main"), &BoxId::from("body"), Anchor::BottomCenter)
            .unwrap();
        session
    }

    #[test]
    fn render_svg_basic() {
        let session = session();
        let theme = Theme::dark();
        let svg = render_svg(&session, &theme, &RenderConfig::default(), &CodeBoxConfig::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("if a &lt; b {"));
        assert!(svg.contains("    go();"));
        assert!(svg.contains("marker-end=\"url(#arrow)\""));
        assert!(svg.contains("id=\"connector-0\""));
        assert!(svg.contains(&theme.code_region_fill));
    }

    #[test]
    fn view_box_covers_negative_coordinates() {
        let mut session = session();
        session
            .add_box(
                BoxNode::new("left", BoxKind::SearchPanel),
                Rect::new(-500.0, -100.0, 100.0, 50.0),
                None,
            )
            .unwrap();
        let svg = render_svg(
            &session,
            &Theme::light(),
            &RenderConfig::default(),
            &CodeBoxConfig::default(),
        );
        assert!(svg.contains("viewBox=\"-540.00 -140.00"));
    }

    #[test]
    fn path_uses_move_then_lines() {
        assert_eq!(points_to_path(&[(0.0, 0.0), (0.0, 5.5)]), "M 0.00 0.00 L 0.00 5.50");
        assert_eq!(points_to_path(&[]), "");
    }
}
