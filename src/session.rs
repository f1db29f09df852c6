use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{CodeBoxConfig, LayoutConfig};
use crate::drag::DragSession;
use crate::error::{GraphError, GraphResult};
use crate::graph::{Anchor, BoxGraph};
use crate::layout::{Animator, TidyEngine, TidyPlan, shift_subtrees};
use crate::model::{BoxId, BoxKind, BoxNode, CodeRegion, ConnectorId, Rect, SourceRange};
use crate::split::{
    SplitOutcome, SplitRequest, call_site_span, check_cut, split, split_placement,
};
use crate::surface::Surface;
use crate::text_metrics::code_box_size;
use crate::theme::Theme;

/// Source of one function, scoped the way the code index serves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSource {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub range: SourceRange,
    pub region: CodeRegion,
}

/// What a function reference points at: the called function and the range of
/// the call expression in the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTarget {
    pub function: String,
    pub call_range: SourceRange,
}

/// Lookup side of the code index. A `None` means no box gets created.
pub trait CodeIndex {
    fn function(&self, key: &str) -> Option<FunctionSource>;

    fn reference(&self, hash: &str) -> Option<ReferenceTarget>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryIndex {
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionSource>,
    #[serde(default)]
    pub references: BTreeMap<String, ReferenceTarget>,
}

impl CodeIndex for MemoryIndex {
    fn function(&self, key: &str) -> Option<FunctionSource> {
        self.functions.get(key).cloned()
    }

    fn reference(&self, hash: &str) -> Option<ReferenceTarget> {
        self.references.get(hash).cloned()
    }
}

/// Creates box identities and reports how large a new box showing `text`
/// will be.
pub trait BoxBuilder {
    fn build(&mut self, kind: BoxKind, text: &str) -> (BoxNode, (f32, f32));
}

/// Builder minting random UUID ids and sizing boxes from text metrics.
#[derive(Debug, Clone)]
pub struct MeasuredBuilder {
    config: CodeBoxConfig,
    font_family: String,
    font_size: f32,
}

impl MeasuredBuilder {
    pub fn new(config: &CodeBoxConfig, theme: &Theme) -> Self {
        Self {
            config: config.clone(),
            font_family: theme.font_family.clone(),
            font_size: theme.font_size,
        }
    }
}

impl BoxBuilder for MeasuredBuilder {
    fn build(&mut self, kind: BoxKind, text: &str) -> (BoxNode, (f32, f32)) {
        let header = kind == BoxKind::FunctionBox;
        let size = code_box_size(text, header, &self.config, &self.font_family, self.font_size);
        let mut node = BoxNode::new(Uuid::new_v4().to_string(), kind);
        if header {
            node = node.with_header(self.config.header_height);
        }
        (node, size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableStyle {
    pub background: String,
    pub text: String,
}

const DEFAULT_PALETTE: [&str; 8] = [
    "#FFD166", "#06D6A0", "#EF476F", "#118AB2", "#F78C6B", "#B388EB", "#83D483", "#0CB0A9",
];

/// Per-visualization state shared by every component of one session:
/// highlight colours in use, per-variable styles, cursor flags and the
/// references already expanded. Dropped with the session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    palette: Vec<String>,
    chosen_colors: BTreeSet<String>,
    variable_styles: HashMap<String, VariableStyle>,
    expanded: BTreeSet<String>,
    pub cursor_inside_box: bool,
    pub cursor_inside_highlight_box: bool,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::with_palette(DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect())
    }
}

impl SessionContext {
    pub fn with_palette(palette: Vec<String>) -> Self {
        Self {
            palette,
            chosen_colors: BTreeSet::new(),
            variable_styles: HashMap::new(),
            expanded: BTreeSet::new(),
            cursor_inside_box: false,
            cursor_inside_highlight_box: false,
        }
    }

    /// Palette colours not yet used by a highlighted variable.
    pub fn free_colors(&self) -> impl Iterator<Item = &str> {
        self.palette
            .iter()
            .filter(|color| !self.chosen_colors.contains(*color))
            .map(String::as_str)
    }

    /// Highlight a variable definition with `background`, or the first free
    /// palette colour. Returns `None` when no colour is left.
    pub fn highlight_variable(
        &mut self,
        hash: &str,
        background: Option<&str>,
    ) -> Option<&VariableStyle> {
        self.clear_variable(hash);
        let background = match background {
            Some(color) => color.to_string(),
            None => self.free_colors().next()?.to_string(),
        };
        self.chosen_colors.insert(background.clone());
        let style = VariableStyle {
            text: contrast_text(&background).to_string(),
            background,
        };
        self.variable_styles.insert(hash.to_string(), style);
        self.variable_styles.get(hash)
    }

    pub fn clear_variable(&mut self, hash: &str) -> Option<VariableStyle> {
        let style = self.variable_styles.remove(hash)?;
        self.chosen_colors.remove(&style.background);
        Some(style)
    }

    pub fn variable_style(&self, hash: &str) -> Option<&VariableStyle> {
        self.variable_styles.get(hash)
    }

    /// Record an expanded reference; false if it was already expanded.
    pub fn mark_expanded(&mut self, reference: &str) -> bool {
        self.expanded.insert(reference.to_string())
    }

    pub fn is_expanded(&self, reference: &str) -> bool {
        self.expanded.contains(reference)
    }

    pub fn expanded(&self) -> impl Iterator<Item = &str> {
        self.expanded.iter().map(String::as_str)
    }
}

/// Black or white, whichever reads better on `background` (`#RRGGBB`).
fn contrast_text(background: &str) -> &'static str {
    let hex = background.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
            .map(|value| value as f32 / 255.0)
    };
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) if 0.299 * r + 0.587 * g + 0.114 * b < 0.6 => "#FFFFFF",
        _ => "#000000",
    }
}

/// Result of expanding one function reference.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub function_box: BoxId,
    pub function_name: String,
    pub connector: ConnectorId,
    /// Present when the host region was split at the call.
    pub split: Option<SplitOutcome>,
    pub plan: TidyPlan,
}

/// One caller in a call-hierarchy chain: the calling function and the
/// references inside it that lead to the box below it in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerStep {
    pub function: String,
    pub references: Vec<String>,
}

impl CallerStep {
    pub fn new(function: impl Into<String>, references: &[&str]) -> Self {
        Self {
            function: function.into(),
            references: references.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Result of opening a caller chain.
#[derive(Debug, Clone)]
pub struct CallerExpansion {
    /// Caller boxes, nearest caller first.
    pub boxes: Vec<BoxId>,
    pub connectors: Vec<ConnectorId>,
    pub plan: TidyPlan,
}

/// One visualization session: the graph, its surface, the code shown in each
/// region box and the interaction state around them.
pub struct Session<S: Surface> {
    graph: BoxGraph,
    surface: S,
    context: SessionContext,
    regions: HashMap<BoxId, CodeRegion>,
    /// Split halves mapped to the region box they were first cut from.
    slices: HashMap<BoxId, BoxId>,
    config: LayoutConfig,
    tidy_engine: TidyEngine,
    animator: Animator,
    drag: DragSession,
}

impl<S: Surface> Session<S> {
    pub fn new(surface: S, config: LayoutConfig) -> Self {
        Self {
            graph: BoxGraph::with_router(config.router.clone()),
            surface,
            context: SessionContext::default(),
            regions: HashMap::new(),
            slices: HashMap::new(),
            tidy_engine: TidyEngine::new(config.tidy.clone()),
            animator: Animator::new(&config.tidy),
            drag: DragSession::Idle,
            config,
        }
    }

    pub fn graph(&self) -> &BoxGraph {
        &self.graph
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    pub fn region(&self, id: &BoxId) -> Option<&CodeRegion> {
        self.regions.get(id)
    }

    pub fn regions(&self) -> impl Iterator<Item = (&BoxId, &CodeRegion)> {
        self.regions.iter()
    }

    /// Region boxes cut from the same region as `id`, `id` included, by
    /// ascending `order`.
    pub fn slices_of(&self, id: &BoxId) -> Vec<(BoxId, u32)> {
        let family = self.slices.get(id).unwrap_or(id);
        let mut slices: Vec<(BoxId, u32)> = self
            .regions
            .iter()
            .filter(|(other, _)| self.slices.get(*other).unwrap_or(*other) == family)
            .map(|(other, region)| (other.clone(), region.order))
            .collect();
        slices.sort_by_key(|(_, order)| *order);
        slices
    }

    pub fn into_parts(self) -> (BoxGraph, S) {
        (self.graph, self.surface)
    }

    pub fn add_box(
        &mut self,
        node: BoxNode,
        rect: Rect,
        region: Option<CodeRegion>,
    ) -> GraphResult<()> {
        let id = node.id.clone();
        self.graph.add_box(node)?;
        self.surface.place(&id, rect);
        if let Some(region) = region {
            self.regions.insert(id, region);
        }
        Ok(())
    }

    pub fn remove_box(&mut self, id: &BoxId) -> GraphResult<BoxNode> {
        let node = self.graph.remove_box(&mut self.surface, id)?;
        self.regions.remove(id);
        self.slices.remove(id);
        Ok(node)
    }

    pub fn connect(
        &mut self,
        parent: &BoxId,
        child: &BoxId,
        anchor: Anchor,
    ) -> GraphResult<ConnectorId> {
        self.graph.connect(&mut self.surface, parent, child, anchor)
    }

    pub fn remove_connection(
        &mut self,
        parent: &BoxId,
        child: &BoxId,
    ) -> GraphResult<Vec<ConnectorId>> {
        self.graph.remove_connection(&mut self.surface, parent, child)
    }

    /// Split a region box after `cut_line`, place both halves around the
    /// host and carry the host's descendants along with the second half.
    /// Later slices of the same region move one place down in `order`.
    pub fn split_box<B: BoxBuilder + ?Sized>(
        &mut self,
        builder: &mut B,
        host: &BoxId,
        cut_line: u32,
    ) -> GraphResult<SplitOutcome> {
        let kind = self.graph.get_box(host)?.kind;
        let region = self
            .regions
            .get(host)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(host.clone()))?;
        let host_rect = self
            .surface
            .rect(host)
            .ok_or_else(|| GraphError::MissingGeometry(host.clone()))?;
        let (first_region, second_region) = check_cut(host, &region, cut_line)?;

        let (first_node, first_size) = builder.build(kind, &first_region.text);
        let (second_node, second_size) = builder.build(kind, &second_region.text);
        let (first_rect, second_rect) = split_placement(&host_rect, first_size, second_size);

        let outcome = split(
            &mut self.graph,
            &mut self.surface,
            SplitRequest {
                host,
                region: &region,
                cut_line,
                first: (first_node, first_rect),
                second: (second_node, second_rect),
                code_box: &self.config.code_box,
            },
            &self.config.split,
        )?;
        let family = self.slices.remove(host).unwrap_or_else(|| host.clone());
        self.regions.remove(host);
        for (id, slice) in &mut self.regions {
            if self.slices.get(id) == Some(&family) && slice.order > region.order {
                slice.order += 1;
            }
        }
        self.regions
            .insert(outcome.first.clone(), outcome.first_region.clone());
        self.regions
            .insert(outcome.second.clone(), outcome.second_region.clone());
        self.slices.insert(outcome.first.clone(), family.clone());
        self.slices.insert(outcome.second.clone(), family);

        shift_subtrees(
            &mut self.graph,
            &mut self.surface,
            &outcome.second,
            second_rect.left - host_rect.left,
            second_rect.top - host_rect.top,
        )?;
        Ok(outcome)
    }

    /// Open the function behind `reference` in `host` as a new box wired to
    /// the call site, then tidy the neighbourhood. Misses in the code index
    /// and references that are already open yield `Ok(None)`.
    pub fn expand_reference<I, B>(
        &mut self,
        index: &I,
        builder: &mut B,
        host: &BoxId,
        reference: &str,
        now: Duration,
    ) -> GraphResult<Option<Expansion>>
    where
        I: CodeIndex + ?Sized,
        B: BoxBuilder + ?Sized,
    {
        self.graph.get_box(host)?;
        let region = self
            .regions
            .get(host)
            .ok_or_else(|| GraphError::NotFound(host.clone()))?;
        let Some(call_node) = region.function_reference(reference).cloned() else {
            tracing::warn!(%host, reference, "no such function reference in region");
            return Ok(None);
        };
        let last_line = region.last_line();

        if self.context.is_expanded(reference) {
            tracing::debug!(reference, "reference already expanded");
            return Ok(None);
        }
        let Some(target) = index.reference(reference) else {
            tracing::warn!(reference, "code index has no target for reference");
            return Ok(None);
        };
        let Some(function) = index.function(&target.function) else {
            tracing::warn!(function = %target.function, "code index has no source for function");
            return Ok(None);
        };

        let cut_line = target.call_range.end.line;
        let split_outcome = if self.config.split.split_on_expand && cut_line < last_line {
            Some(self.split_box(builder, host, cut_line)?)
        } else {
            None
        };
        let anchor_box = split_outcome
            .as_ref()
            .map(|outcome| outcome.first.clone())
            .unwrap_or_else(|| host.clone());

        let anchor_rect = self
            .surface
            .rect(&anchor_box)
            .ok_or_else(|| GraphError::MissingGeometry(anchor_box.clone()))?;
        let header = self.graph.get_box(&anchor_box)?.header_height;
        let span = match self.regions.get(&anchor_box) {
            Some(region) => call_site_span(region, &call_node, header, &self.config.code_box),
            None => Rect::new(0.0, header, anchor_rect.width, self.config.code_box.line_height),
        };

        let offset_x = self.config.split.expansion_offset_x;
        let offset_y = self.config.split.expansion_offset_y;
        let (left, top) = if split_outcome.is_some() {
            (anchor_rect.left + offset_x, anchor_rect.bottom() + offset_y)
        } else {
            (anchor_rect.right() + offset_x, anchor_rect.top + span.bottom() + offset_y)
        };

        let (function_node, (width, height)) =
            builder.build(BoxKind::FunctionBox, &function.region.text);
        let function_box = function_node.id.clone();
        self.add_box(
            function_node,
            Rect::new(left, top, width, height),
            Some(function.region),
        )?;
        let connector =
            self.connect(&anchor_box, &function_box, Anchor::call_site(reference, span))?;
        if let Some(region) = self.regions.get_mut(&anchor_box) {
            region.highlighted_references.insert(reference.to_string());
        }
        self.context.mark_expanded(reference);

        let mut inserted = Vec::new();
        if let Some(outcome) = &split_outcome {
            inserted.push(outcome.first.clone());
            inserted.push(outcome.second.clone());
        }
        inserted.push(function_box.clone());
        let plan = self.tidy(&inserted, now)?;

        tracing::info!(
            %host,
            reference,
            function = %function.name,
            %function_box,
            split = split_outcome.is_some(),
            displaced = plan.displacements.len(),
            "expanded reference"
        );
        Ok(Some(Expansion {
            function_box,
            function_name: function.name,
            connector,
            split: split_outcome,
            plan,
        }))
    }

    /// Open a chain of callers above `anchor`, nearest caller first. Each
    /// caller box goes up and to the left of the box it calls and gets one
    /// edge per listed call site; a caller with none of its references in
    /// its region gets a single bottom-centre edge. The chain stops at the
    /// first function the code index does not know.
    pub fn expand_callers<I, B>(
        &mut self,
        index: &I,
        builder: &mut B,
        anchor: &BoxId,
        chain: &[CallerStep],
        now: Duration,
    ) -> GraphResult<CallerExpansion>
    where
        I: CodeIndex + ?Sized,
        B: BoxBuilder + ?Sized,
    {
        self.graph.get_box(anchor)?;
        let mut callee = anchor.clone();
        let mut boxes = Vec::new();
        let mut connectors = Vec::new();

        for step in chain {
            let Some(function) = index.function(&step.function) else {
                tracing::warn!(function = %step.function, "code index has no source for caller");
                break;
            };
            let callee_rect = self
                .surface
                .rect(&callee)
                .ok_or_else(|| GraphError::MissingGeometry(callee.clone()))?;
            let (node, (width, height)) =
                builder.build(BoxKind::FunctionBox, &function.region.text);
            let caller = node.id.clone();
            let header = node.header_height;

            let mut region = function.region;
            let mut anchors = Vec::new();
            for reference in &step.references {
                match region.function_reference(reference) {
                    Some(call) => {
                        let span = call_site_span(&region, call, header, &self.config.code_box);
                        anchors.push(Anchor::call_site(reference.as_str(), span));
                    }
                    None => tracing::warn!(%caller, reference, "caller does not list reference"),
                }
            }
            if anchors.is_empty() {
                anchors.push(Anchor::BottomCenter);
            }
            region
                .highlighted_references
                .extend(step.references.iter().cloned());

            let rect = Rect::new(
                callee_rect.left - self.config.split.caller_offset_x - width,
                callee_rect.top - self.config.split.caller_offset_y,
                width,
                height,
            );
            self.add_box(node, rect, Some(region))?;
            for site in anchors {
                if let Some(reference) = site.reference() {
                    self.context.mark_expanded(reference);
                }
                connectors.push(self.connect(&caller, &callee, site)?);
            }
            boxes.push(caller.clone());
            callee = caller;
        }

        let plan = if boxes.is_empty() {
            TidyPlan::default()
        } else {
            self.tidy(&boxes, now)?
        };
        tracing::info!(
            %anchor,
            callers = boxes.len(),
            edges = connectors.len(),
            "expanded callers"
        );
        Ok(CallerExpansion {
            boxes,
            connectors,
            plan,
        })
    }

    /// Plan a tidy pass around `inserted` and start its slides at `now`.
    pub fn tidy(&mut self, inserted: &[BoxId], now: Duration) -> GraphResult<TidyPlan> {
        let plan = self.tidy_engine.plan(&self.graph, &self.surface, inserted)?;
        self.tidy_engine
            .apply(&plan, &mut self.animator, &self.surface, now);
        Ok(plan)
    }

    pub fn tick(&mut self, now: Duration) -> usize {
        self.animator.tick(now, &mut self.graph, &mut self.surface)
    }

    pub fn settle(&mut self) {
        self.animator.settle(&mut self.graph, &mut self.surface);
    }

    pub fn begin_drag(
        &mut self,
        id: &BoxId,
        pointer: (f32, f32),
        subtree: bool,
    ) -> GraphResult<()> {
        self.drag = DragSession::begin(&self.graph, &self.surface, id, pointer, subtree)?;
        Ok(())
    }

    pub fn pointer_moved(&mut self, pointer: (f32, f32)) -> usize {
        self.drag
            .pointer_moved(&mut self.graph, &mut self.surface, pointer)
    }

    pub fn end_drag(&mut self) -> Option<BoxId> {
        self.drag.end()
    }
}
