use serde::{Deserialize, Serialize};

use crate::model::BoxKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub line_color: String,
    pub text_color: String,
    pub muted_text_color: String,
    pub function_box_fill: String,
    pub code_region_fill: String,
    pub panel_fill: String,
    pub header_fill: String,
    pub border_color: String,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            font_family: "Menlo, Consolas, \"DejaVu Sans Mono\", monospace".to_string(),
            font_size: 13.0,
            background: "#1E1E1E".to_string(),
            line_color: "#FFFFFF".to_string(),
            text_color: "#D4D4D4".to_string(),
            muted_text_color: "#858585".to_string(),
            function_box_fill: "#252526".to_string(),
            code_region_fill: "#2D2D30".to_string(),
            panel_fill: "#333842".to_string(),
            header_fill: "#3C3C3C".to_string(),
            border_color: "#5A5A5A".to_string(),
        }
    }

    pub fn light() -> Self {
        Self {
            font_family: "Menlo, Consolas, \"DejaVu Sans Mono\", monospace".to_string(),
            font_size: 13.0,
            background: "#FFFFFF".to_string(),
            line_color: "#333333".to_string(),
            text_color: "#1C2430".to_string(),
            muted_text_color: "#7A8AA6".to_string(),
            function_box_fill: "#F8FAFF".to_string(),
            code_region_fill: "#F3F3F3".to_string(),
            panel_fill: "#EEF2F8".to_string(),
            header_fill: "#E4E8F0".to_string(),
            border_color: "#C7D2E5".to_string(),
        }
    }

    pub fn fill_for(&self, kind: BoxKind) -> &str {
        match kind {
            BoxKind::FunctionBox | BoxKind::FunctionMetadata | BoxKind::FileName => {
                &self.function_box_fill
            }
            BoxKind::CodeRegion => &self.code_region_fill,
            BoxKind::CallHierarchyPanel | BoxKind::SearchPanel => &self.panel_fill,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}
