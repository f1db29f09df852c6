use crate::config::{CodeBoxConfig, SplitConfig};
use crate::error::{GraphError, GraphResult};
use crate::graph::{Anchor, BoxGraph};
use crate::model::{BoxId, BoxNode, CodeRegion, ConnectorId, Location, Rect, SymbolNode};
use crate::surface::Surface;

/// Cut `region` after `cut_line`. Lines up to and including the cut go to the
/// first half, the rest to the second; every node collection follows the
/// same rule by start line.
///
/// Returns `None` unless both halves would be non-empty, i.e. the cut must lie
/// on a line of the region other than its last one.
pub fn partition(region: &CodeRegion, cut_line: u32) -> Option<(CodeRegion, CodeRegion)> {
    if cut_line < region.first_line() || cut_line >= region.last_line() {
        return None;
    }
    let keep = (cut_line - region.first_line() + 1) as usize;
    let lines: Vec<&str> = region.text.split('\n').collect();

    let (first_refs, second_refs) = split_nodes(&region.function_references, cut_line);
    let (first_defs, second_defs) = split_nodes(&region.variable_definitions, cut_line);
    let (first_vars, second_vars) = split_nodes(&region.variable_references, cut_line);
    let (first_nested, second_nested) = split_nodes(&region.nested_function_definitions, cut_line);

    let first = CodeRegion {
        text: lines[..keep].join("\n"),
        start: region.start,
        function_references: first_refs,
        variable_definitions: first_defs,
        variable_references: first_vars,
        nested_function_definitions: first_nested,
        highlighted_references: region.highlighted_references.clone(),
        order: region.order,
    };
    let second = CodeRegion {
        text: lines[keep..].join("\n"),
        start: Location::new(cut_line + 1, region.start.character),
        function_references: second_refs,
        variable_definitions: second_defs,
        variable_references: second_vars,
        nested_function_definitions: second_nested,
        highlighted_references: region.highlighted_references.clone(),
        order: region.order + 1,
    };
    Some((first, second))
}

/// [`partition`], reporting an unusable cut. A cut on the last line is
/// [`GraphError::EmptySplit`]; anything outside the region is
/// [`GraphError::InvalidSplit`].
pub fn check_cut(
    host: &BoxId,
    region: &CodeRegion,
    cut_line: u32,
) -> GraphResult<(CodeRegion, CodeRegion)> {
    if cut_line == region.last_line() {
        return Err(GraphError::EmptySplit {
            host: host.clone(),
            line: cut_line,
        });
    }
    partition(region, cut_line).ok_or_else(|| GraphError::InvalidSplit {
        host: host.clone(),
        line: cut_line,
        first_line: region.first_line(),
        last_line: region.last_line(),
    })
}

/// Span of a call expression inside a region box, relative to the box's
/// top-left corner.
pub fn call_site_span(
    region: &CodeRegion,
    node: &SymbolNode,
    header: f32,
    config: &CodeBoxConfig,
) -> Rect {
    let row = node.start_line().saturating_sub(region.first_line());
    let start = node.range.start.character;
    let columns = if node.range.end.line == node.range.start.line {
        node.range.end.character.saturating_sub(start).max(1)
    } else {
        1
    };
    Rect::new(
        config.padding_x + start as f32 * config.char_width,
        header + config.padding_y + row as f32 * config.line_height,
        columns as f32 * config.char_width,
        config.line_height,
    )
}

/// Re-measure a child edge's call site against the second half. Spans of
/// references the host region does not list drop the rows that went to the
/// first half.
fn rebase_anchor(
    anchor: &Anchor,
    host_region: &CodeRegion,
    second_region: &CodeRegion,
    header: f32,
    code_box: &CodeBoxConfig,
) -> Anchor {
    let Anchor::CallSite { reference, span } = anchor else {
        return anchor.clone();
    };
    let span = match host_region.function_reference(reference) {
        Some(node) => call_site_span(second_region, node, header, code_box),
        None => {
            let rows = second_region.first_line() - host_region.first_line();
            let top = (span.top - rows as f32 * code_box.line_height).max(header);
            Rect::new(span.left, top, span.width, span.height)
        }
    };
    Anchor::call_site(reference.clone(), span)
}

fn split_nodes(nodes: &[SymbolNode], cut_line: u32) -> (Vec<SymbolNode>, Vec<SymbolNode>) {
    nodes
        .iter()
        .cloned()
        .partition(|node| node.start_line() <= cut_line)
}

/// Where the two halves of a split host go: the first to the right of the
/// host at its top, the second shifted left by half the host's width and
/// down to its vertical middle.
pub fn split_placement(
    host: &Rect,
    first_size: (f32, f32),
    second_size: (f32, f32),
) -> (Rect, Rect) {
    let first = Rect::new(host.right(), host.top, first_size.0, first_size.1);
    let second = Rect::new(
        host.left - host.width / 2.0,
        host.bottom() - host.height / 2.0,
        second_size.0,
        second_size.1,
    );
    (first, second)
}

/// One split: the host box and region, the cut line and the two new boxes
/// with their rectangles. `code_box` measures call sites in the halves.
#[derive(Debug, Clone)]
pub struct SplitRequest<'a> {
    pub host: &'a BoxId,
    pub region: &'a CodeRegion,
    pub cut_line: u32,
    pub first: (BoxNode, Rect),
    pub second: (BoxNode, Rect),
    pub code_box: &'a CodeBoxConfig,
}

#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub first: BoxId,
    pub second: BoxId,
    pub first_region: CodeRegion,
    pub second_region: CodeRegion,
    /// The host, no longer part of the graph.
    pub retired: BoxNode,
    /// Edge between the halves, when linking is enabled.
    pub link: Option<ConnectorId>,
    /// Number of host edges redirected to the halves.
    pub rewired: usize,
}

/// Replace `host` by two boxes holding the halves of its region. Parent edges
/// move to the first half with their anchors. Child edges move to the second
/// half, their call sites re-measured in its region. All checks run before
/// the graph or the surface is touched.
pub fn split<S: Surface + ?Sized>(
    graph: &mut BoxGraph,
    surface: &mut S,
    request: SplitRequest<'_>,
    config: &SplitConfig,
) -> GraphResult<SplitOutcome> {
    let SplitRequest {
        host,
        region,
        cut_line,
        first: (first_node, first_rect),
        second: (second_node, second_rect),
        code_box,
    } = request;

    graph.get_box(host)?;
    let (first_region, second_region) = check_cut(host, region, cut_line)?;
    if graph.contains(&first_node.id) {
        return Err(GraphError::IdConflict(first_node.id));
    }
    if graph.contains(&second_node.id) || second_node.id == first_node.id {
        return Err(GraphError::IdConflict(second_node.id));
    }

    let parent_edges = incoming(graph, host);
    let child_edges = outgoing(graph, host);
    for (other, _) in parent_edges.iter().chain(&child_edges) {
        if surface.rect(other).is_none() {
            return Err(GraphError::MissingGeometry(other.clone()));
        }
    }

    let retired = graph.remove_box(surface, host)?;
    let first = first_node.id.clone();
    let second = second_node.id.clone();
    let second_header = second_node.header_height;
    graph.add_box(first_node)?;
    graph.add_box(second_node)?;
    surface.place(&first, first_rect);
    surface.place(&second, second_rect);

    for (parent, anchor) in &parent_edges {
        graph.connect(surface, parent, &first, anchor.clone())?;
    }
    let link = if config.link_regions {
        Some(graph.connect(surface, &first, &second, Anchor::BottomCenter)?)
    } else {
        None
    };
    for (child, anchor) in &child_edges {
        let anchor = rebase_anchor(anchor, region, &second_region, second_header, code_box);
        graph.connect(surface, &second, child, anchor)?;
    }

    tracing::info!(
        %host,
        cut_line,
        %first,
        %second,
        first_lines = first_region.line_count(),
        second_lines = second_region.line_count(),
        "split code region"
    );
    Ok(SplitOutcome {
        first,
        second,
        first_region,
        second_region,
        retired,
        link,
        rewired: parent_edges.len() + child_edges.len(),
    })
}

fn incoming(graph: &BoxGraph, id: &BoxId) -> Vec<(BoxId, Anchor)> {
    graph
        .get_parents(id)
        .iter()
        .filter_map(|link| {
            let connector = graph.connector(link.connector_id)?;
            Some((link.box_id.clone(), connector.anchor.clone()))
        })
        .collect()
}

fn outgoing(graph: &BoxGraph, id: &BoxId) -> Vec<(BoxId, Anchor)> {
    graph
        .get_children(id)
        .iter()
        .filter_map(|link| {
            let connector = graph.connector(link.connector_id)?;
            Some((link.box_id.clone(), connector.anchor.clone()))
        })
        .collect()
}
