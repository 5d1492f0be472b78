//! Colour normalisation and the five-tier annotation palette.

use lazy_static::lazy_static;
use regex::Regex;
use ssview_protocol::{LegendEntry, Tier};
use svg::Document;
use svg::node::element::{Rectangle, Text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

lazy_static! {
    static ref RGB_FUNCTION: Regex = Regex::new(
        r"(?i)^rgba?\(\s*([0-9.]+)(%?)\s*,\s*([0-9.]+)(%?)\s*,\s*([0-9.]+)(%?)\s*(?:,\s*[0-9.]+%?\s*)?\)$"
    )
    .expect("valid rgb() pattern");
}

const LEGEND_ROW_HEIGHT: f32 = 18.0;
const LEGEND_SWATCH: f32 = 12.0;
const LEGEND_WIDTH: f32 = 220.0;

/// Palette colour of each tier, as drawn by the image service.
pub fn tier_colour(tier: Tier) -> Rgb {
    match tier {
        Tier::SignificantPair => Rgb(0x00, 0xff, 0x00),
        Tier::Conserved97 => Rgb(0xd9, 0x00, 0x00),
        Tier::Conserved90 => Rgb(0x00, 0x00, 0x00),
        Tier::Conserved75 => Rgb(0x80, 0x80, 0x80),
        Tier::Conserved50 => Rgb(0xff, 0xff, 0xff),
    }
}

pub fn tier_for(colour: Rgb) -> Option<Tier> {
    Tier::ALL.into_iter().find(|&t| tier_colour(t) == colour)
}

/// Parses the colour forms found in fill/stroke values. `none` and
/// paint-server references yield `None`.
pub fn parse_colour(raw: &str) -> Option<Rgb> {
    let value = raw.trim().trim_end_matches("!important").trim();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(caps) = RGB_FUNCTION.captures(value) {
        let channel = |n: usize, pct: usize| -> Option<u8> {
            let number: f64 = caps.get(n)?.as_str().parse().ok()?;
            let scaled = if caps.get(pct).is_some_and(|m| m.as_str() == "%") {
                number * 2.55
            } else {
                number
            };
            Some(scaled.round().clamp(0.0, 255.0) as u8)
        };
        return Some(Rgb(channel(1, 2)?, channel(3, 4)?, channel(5, 6)?));
    }
    named_colour(value)
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let digit = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut it = hex.chars().map(|c| digit(&c.to_string()).map(|d| d * 17));
            Some(Rgb(it.next()??, it.next()??, it.next()??))
        }
        6 => Some(Rgb(
            digit(hex.get(0..2)?)?,
            digit(hex.get(2..4)?)?,
            digit(hex.get(4..6)?)?,
        )),
        _ => None,
    }
}

fn named_colour(name: &str) -> Option<Rgb> {
    match name.to_ascii_lowercase().as_str() {
        "black" => Some(Rgb(0, 0, 0)),
        "white" => Some(Rgb(255, 255, 255)),
        "red" => Some(Rgb(255, 0, 0)),
        "lime" => Some(Rgb(0, 255, 0)),
        "green" => Some(Rgb(0, 128, 0)),
        "blue" => Some(Rgb(0, 0, 255)),
        "grey" | "gray" => Some(Rgb(128, 128, 128)),
        "silver" => Some(Rgb(192, 192, 192)),
        _ => None,
    }
}

pub fn legend_entries() -> Vec<LegendEntry> {
    Tier::ALL
        .into_iter()
        .map(|tier| LegendEntry {
            tier,
            colour: tier_colour(tier).hex(),
            label: tier.label().to_string(),
        })
        .collect()
}

/// Standalone legend strip, one swatch per tier.
pub fn legend_svg() -> String {
    let entries = legend_entries();
    let height = LEGEND_ROW_HEIGHT * entries.len() as f32 + 4.0;
    let mut doc = Document::new()
        .set("viewBox", (0, 0, LEGEND_WIDTH, height))
        .set("width", LEGEND_WIDTH)
        .set("height", height);
    for (i, entry) in entries.iter().enumerate() {
        let y = 2.0 + i as f32 * LEGEND_ROW_HEIGHT;
        doc = doc
            .add(
                Rectangle::new()
                    .set("x", 2)
                    .set("y", y)
                    .set("width", LEGEND_SWATCH)
                    .set("height", LEGEND_SWATCH)
                    .set("fill", entry.colour.as_str())
                    .set("stroke", "#333333")
                    .set("stroke-width", 0.5),
            )
            .add(
                Text::new(entry.label.clone())
                    .set("x", LEGEND_SWATCH + 8.0)
                    .set("y", y + LEGEND_SWATCH - 2.0)
                    .set("font-family", "sans-serif")
                    .set("font-size", 11),
            );
    }
    doc.to_string()
}
