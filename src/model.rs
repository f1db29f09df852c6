use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque box identity. Ids are minted by whoever builds the box; the graph
/// never assigns them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxId(pub String);

impl BoxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BoxId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(pub u64);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connector-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoxKind {
    FunctionBox,
    CodeRegion,
    FunctionMetadata,
    FileName,
    CallHierarchyPanel,
    SearchPanel,
}

impl BoxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BoxKind::FunctionBox => "function-box",
            BoxKind::CodeRegion => "code-region",
            BoxKind::FunctionMetadata => "function-metadata",
            BoxKind::FileName => "file-name",
            BoxKind::CallHierarchyPanel => "call-hierarchy-panel",
            BoxKind::SearchPanel => "search-panel",
        }
    }
}

/// Identity and relation-relevant metadata of one box. Content and position
/// live with the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxNode {
    pub id: BoxId,
    pub kind: BoxKind,
    /// Offset of the incoming arrow's landing point below the box top.
    #[serde(default)]
    pub header_height: f32,
}

impl BoxNode {
    pub fn new(id: impl Into<BoxId>, kind: BoxKind) -> Self {
        Self {
            id: id.into(),
            kind,
            header_height: 0.0,
        }
    }

    pub fn with_header(mut self, header_height: f32) -> Self {
        self.header_height = header_height;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.left + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.top + self.height / 2.0
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right()
            && self.right() > other.left
            && self.top < other.bottom()
            && self.bottom() > other.top
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.width, self.height)
    }

    pub fn with_left(&self, left: f32) -> Rect {
        Rect::new(left, self.top, self.width, self.height)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }
}

/// Zero-based position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub character: u32,
}

impl Location {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: Location,
    pub end: Location,
}

impl SourceRange {
    pub const fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    pub fn lines(start_line: u32, end_line: u32) -> Self {
        Self::new(Location::new(start_line, 0), Location::new(end_line, 0))
    }
}

/// A symbol scoped to one function, as supplied by the code index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolNode {
    pub hash: String,
    pub range: SourceRange,
    /// For function references: the definition the call resolves to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl SymbolNode {
    pub fn new(hash: impl Into<String>, range: SourceRange) -> Self {
        Self {
            hash: hash.into(),
            range,
            definition: None,
        }
    }

    pub fn start_line(&self) -> u32 {
        self.range.start.line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRegion {
    pub text: String,
    pub start: Location,
    #[serde(default)]
    pub function_references: Vec<SymbolNode>,
    #[serde(default)]
    pub variable_definitions: Vec<SymbolNode>,
    #[serde(default)]
    pub variable_references: Vec<SymbolNode>,
    #[serde(default)]
    pub nested_function_definitions: Vec<SymbolNode>,
    /// Function references already expanded from this region.
    #[serde(default)]
    pub highlighted_references: BTreeSet<String>,
    /// Position of this region among the slices of the same function.
    #[serde(default = "default_order")]
    pub order: u32,
}

fn default_order() -> u32 {
    1
}

impl CodeRegion {
    pub fn new(text: impl Into<String>, start: Location) -> Self {
        Self {
            text: text.into(),
            start,
            order: default_order(),
            ..Default::default()
        }
    }

    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    pub fn first_line(&self) -> u32 {
        self.start.line
    }

    pub fn last_line(&self) -> u32 {
        self.start.line + self.line_count().saturating_sub(1) as u32
    }

    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.first_line() && line <= self.last_line()
    }

    pub fn function_reference(&self, hash: &str) -> Option<&SymbolNode> {
        self.function_references.iter().find(|node| node.hash == hash)
    }

    pub fn node_count(&self) -> usize {
        self.function_references.len()
            + self.variable_definitions.len()
            + self.variable_references.len()
            + self.nested_function_definitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(9.0, 9.0, 5.0, 5.0)));
    }

    #[test]
    fn region_line_range_follows_text() {
        let region = CodeRegion::new("a\nb\nc", Location::new(10, 4));
        assert_eq!(region.line_count(), 3);
        assert_eq!(region.last_line(), 12);
        assert!(region.contains_line(10));
        assert!(!region.contains_line(13));
    }
}
