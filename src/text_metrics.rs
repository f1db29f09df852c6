use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

use crate::config::CodeBoxConfig;

static FONT_METRICS: Lazy<Mutex<FontMetrics>> = Lazy::new(|| Mutex::new(FontMetrics::new()));

/// Width of `text` set in the first installed face of `font_family`, or `None`
/// when no such face is available. Tabs count as four spaces.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = FONT_METRICS.lock().ok()?;
    let advances = guard.advances(font_family)?;
    Some(advances.width(&text.replace('\t', "    "), font_size))
}

/// Monospace estimate used when font metrics are off or unavailable.
pub fn estimate_text_width(text: &str, char_width: f32) -> f32 {
    let columns: usize = text
        .chars()
        .map(|ch| if ch == '\t' { 4 } else { 1 })
        .sum();
    columns as f32 * char_width
}

/// Size of a box showing `text`, one source line per row, plus an optional
/// header strip.
pub fn code_box_size(
    text: &str,
    header: bool,
    config: &CodeBoxConfig,
    font_family: &str,
    font_size: f32,
) -> (f32, f32) {
    let mut widest = 0.0f32;
    let mut rows = 0usize;
    for line in text.split('\n') {
        rows += 1;
        let measured = if config.font_metrics {
            measure_text_width(line, font_size, font_family)
        } else {
            None
        };
        let width = measured.unwrap_or_else(|| estimate_text_width(line, config.char_width));
        widest = widest.max(width);
    }

    let width = (widest + 2.0 * config.padding_x).clamp(config.min_width, config.max_width);
    let header_height = if header { config.header_height } else { 0.0 };
    let height = header_height + rows as f32 * config.line_height + 2.0 * config.padding_y;
    (width, height)
}

struct FontMetrics {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<Advances>>,
}

impl FontMetrics {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn advances(&mut self, font_family: &str) -> Option<&Advances> {
        let key = font_family.trim().to_string();
        if !self.faces.contains_key(&key) {
            let loaded = self.load(&key);
            if loaded.is_none() {
                tracing::debug!(family = %key, "no installed face, using estimates");
            }
            self.faces.insert(key.clone(), loaded);
        }
        self.faces.get(&key).and_then(Option::as_ref)
    }

    fn load(&mut self, font_family: &str) -> Option<Advances> {
        let names: Vec<&str> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|name| !name.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "monospace" | "ui-monospace" => Family::Monospace,
                "sans-serif" | "system-ui" => Family::SansSerif,
                "serif" => Family::Serif,
                _ => Family::Name(name),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::Monospace);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let id = self.db.query(&Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        })?;
        self.db
            .with_face_data(id, |data, index| {
                Face::parse(data, index).ok().map(|face| Advances::from_face(&face))
            })
            .flatten()
    }
}

/// Horizontal advances of the printable ASCII range, in font units.
struct Advances {
    units_per_em: f32,
    ascii: [u16; 128],
    fallback: u16,
}

impl Advances {
    fn from_face(face: &Face<'_>) -> Self {
        let mut ascii = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        let fallback = match ascii[b'M' as usize] {
            0 => face.units_per_em() / 2,
            advance => advance,
        };
        Self {
            units_per_em: face.units_per_em().max(1) as f32,
            ascii,
            fallback,
        }
    }

    fn width(&self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em;
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| {
                let advance = if ch.is_ascii() { self.ascii[ch as usize] } else { 0 };
                if advance == 0 { self.fallback } else { advance }
            })
            .map(|advance| advance as f32 * scale)
            .sum()
    }
}
