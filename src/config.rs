use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Below this vertical gap a right-hand child is reached by detouring
    /// over the top instead of dropping straight down.
    pub vertical_gap_threshold: f32,
    /// How far above the higher anchor the detour row is lifted.
    pub rise: f32,
    /// Gap kept between the detour row and the lifted anchor row.
    pub clearance: f32,
    /// Horizontal offset of the landing column from the child's midpoint.
    pub arrow_inset: f32,
    /// Anchors closer than this horizontally are treated as aligned.
    pub align_tolerance: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            vertical_gap_threshold: 100.0,
            rise: 100.0,
            clearance: 3.0,
            arrow_inset: 5.0,
            align_tolerance: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    Linear,
    EaseOutCubic,
    EaseInOutCubic,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TidyConfig {
    /// Horizontal gap left between a displaced box and the box that pushed it.
    pub margin: f32,
    pub duration_ms: u64,
    pub easing: Easing,
}

impl Default for TidyConfig {
    fn default() -> Self {
        Self {
            margin: 100.0,
            duration_ms: 200,
            easing: Easing::Linear,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Connect the two halves of a split with an explicit edge.
    pub link_regions: bool,
    /// Split the host region at the call when a reference is expanded.
    /// Without it the new box is attached beside the host.
    pub split_on_expand: bool,
    /// Offset of an expanded function box from the bottom-left corner of the
    /// first half.
    pub expansion_offset_x: f32,
    pub expansion_offset_y: f32,
    /// Gap between a caller box's right edge and the box it calls, and how
    /// far above that box the caller starts.
    pub caller_offset_x: f32,
    pub caller_offset_y: f32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            link_regions: true,
            split_on_expand: true,
            expansion_offset_x: 100.0,
            expansion_offset_y: 100.0,
            caller_offset_x: 100.0,
            caller_offset_y: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBoxConfig {
    pub char_width: f32,
    pub line_height: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    /// Height of the file-name strip on top of function boxes.
    pub header_height: f32,
    pub min_width: f32,
    pub max_width: f32,
    /// Measure text with installed font faces instead of `char_width`.
    pub font_metrics: bool,
}

impl Default for CodeBoxConfig {
    fn default() -> Self {
        Self {
            char_width: 8.4,
            line_height: 18.0,
            padding_x: 16.0,
            padding_y: 12.0,
            header_height: 24.0,
            min_width: 160.0,
            max_width: 720.0,
            font_metrics: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub router: RouterConfig,
    pub tidy: TidyConfig,
    pub split: SplitConfig,
    pub code_box: CodeBoxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            padding: 40.0,
            background: "#1E1E1E".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::dark();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    line_color: Option<String>,
    text_color: Option<String>,
    function_box_fill: Option<String>,
    code_region_fill: Option<String>,
    panel_fill: Option<String>,
    border_color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouterConfigFile {
    vertical_gap_threshold: Option<f32>,
    rise: Option<f32>,
    clearance: Option<f32>,
    arrow_inset: Option<f32>,
    align_tolerance: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TidyConfigFile {
    margin: Option<f32>,
    duration_ms: Option<u64>,
    easing: Option<Easing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitConfigFile {
    link_regions: Option<bool>,
    split_on_expand: Option<bool>,
    expansion_offset_x: Option<f32>,
    expansion_offset_y: Option<f32>,
    caller_offset_x: Option<f32>,
    caller_offset_y: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeBoxConfigFile {
    char_width: Option<f32>,
    line_height: Option<f32>,
    padding_x: Option<f32>,
    padding_y: Option<f32>,
    header_height: Option<f32>,
    min_width: Option<f32>,
    max_width: Option<f32>,
    font_metrics: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    router: Option<RouterConfigFile>,
    tidy: Option<TidyConfigFile>,
    split: Option<SplitConfigFile>,
    code_box: Option<CodeBoxConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(err) => json5::from_str(contents).map_err(|_| err)?,
    };

    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "light" {
            config.theme = Theme::light();
        } else if theme_name == "dark" || theme_name == "default" {
            config.theme = Theme::dark();
        }
        config.render.background = config.theme.background.clone();
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.background {
            config.render.background = v.clone();
            config.theme.background = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.function_box_fill {
            config.theme.function_box_fill = v;
        }
        if let Some(v) = vars.code_region_fill {
            config.theme.code_region_fill = v;
        }
        if let Some(v) = vars.panel_fill {
            config.theme.panel_fill = v;
        }
        if let Some(v) = vars.border_color {
            config.theme.border_color = v;
        }
    }

    if let Some(router) = parsed.router {
        let target = &mut config.layout.router;
        if let Some(v) = router.vertical_gap_threshold {
            target.vertical_gap_threshold = v;
        }
        if let Some(v) = router.rise {
            target.rise = v;
        }
        if let Some(v) = router.clearance {
            target.clearance = v;
        }
        if let Some(v) = router.arrow_inset {
            target.arrow_inset = v;
        }
        if let Some(v) = router.align_tolerance {
            target.align_tolerance = v.max(0.0);
        }
    }

    if let Some(tidy) = parsed.tidy {
        let target = &mut config.layout.tidy;
        if let Some(v) = tidy.margin {
            target.margin = v;
        }
        if let Some(v) = tidy.duration_ms {
            target.duration_ms = v;
        }
        if let Some(v) = tidy.easing {
            target.easing = v;
        }
    }

    if let Some(split) = parsed.split {
        let target = &mut config.layout.split;
        if let Some(v) = split.link_regions {
            target.link_regions = v;
        }
        if let Some(v) = split.split_on_expand {
            target.split_on_expand = v;
        }
        if let Some(v) = split.expansion_offset_x {
            target.expansion_offset_x = v;
        }
        if let Some(v) = split.expansion_offset_y {
            target.expansion_offset_y = v;
        }
        if let Some(v) = split.caller_offset_x {
            target.caller_offset_x = v;
        }
        if let Some(v) = split.caller_offset_y {
            target.caller_offset_y = v;
        }
    }

    if let Some(code_box) = parsed.code_box {
        let target = &mut config.layout.code_box;
        if let Some(v) = code_box.char_width {
            target.char_width = v;
        }
        if let Some(v) = code_box.line_height {
            target.line_height = v;
        }
        if let Some(v) = code_box.padding_x {
            target.padding_x = v;
        }
        if let Some(v) = code_box.padding_y {
            target.padding_y = v;
        }
        if let Some(v) = code_box.header_height {
            target.header_height = v;
        }
        if let Some(v) = code_box.min_width {
            target.min_width = v;
        }
        if let Some(v) = code_box.max_width {
            target.max_width = v;
        }
        if let Some(v) = code_box.font_metrics {
            target.font_metrics = v;
        }
    }

    Ok(config)
}
