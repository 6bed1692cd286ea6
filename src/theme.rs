//! Fixed chart styling.
//!
//! [`Theme::LIGHT`] is the renderer-agnostic description attached to every
//! chart spec. [`ResolvedTheme`] turns its colour strings into concrete
//! `plotters` colours for drawing.

use plotters::style::RGBColor;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextStyle {
    pub family: &'static str,
    pub color: &'static str,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: &'static str,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Margin {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// Styling applied to every chart. Not user-configurable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Theme {
    pub name: &'static str,
    pub background: &'static str,
    pub font_family: &'static str,
    pub title: TextStyle,
    pub axis_text: TextStyle,
    pub legend_title: TextStyle,
    pub legend_text: TextStyle,
    /// Gridlines, drawn on both axes
    pub grid: LineStyle,
    pub axis_line: LineStyle,
    pub margin: Margin,
}

const FONT_FAMILY: &str = "sans-serif";
const HEADING_COLOR: &str = "#262730";
const TEXT_COLOR: &str = "#2A3F5F";
const GRID_COLOR: &str = "#E0E0E0";

impl Theme {
    pub const LIGHT: Theme = Theme {
        name: "light",
        background: "#FFFFFF",
        font_family: FONT_FAMILY,
        title: TextStyle {
            family: FONT_FAMILY,
            color: HEADING_COLOR,
            size: 17.0,
        },
        axis_text: TextStyle {
            family: FONT_FAMILY,
            color: TEXT_COLOR,
            size: 12.0,
        },
        legend_title: TextStyle {
            family: FONT_FAMILY,
            color: HEADING_COLOR,
            size: 12.0,
        },
        legend_text: TextStyle {
            family: FONT_FAMILY,
            color: TEXT_COLOR,
            size: 11.0,
        },
        grid: LineStyle {
            color: GRID_COLOR,
            width: 1.0,
        },
        axis_line: LineStyle {
            color: GRID_COLOR,
            width: 1.0,
        },
        margin: Margin {
            top: 50,
            right: 50,
            bottom: 50,
            left: 50,
        },
    };
}

// === Resolved Types ===

/// Fully resolved text style ready for rendering
#[derive(Debug, Clone)]
pub struct ResolvedText {
    pub family: String,
    pub color: RGBColor,
    pub size: f64,
}

/// Fully resolved line style ready for rendering
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    pub color: RGBColor,
    pub width: f64,
}

#[derive(Debug, Clone)]
pub struct ResolvedTheme {
    pub background: RGBColor,
    pub title: ResolvedText,
    pub axis_text: ResolvedText,
    pub legend_title: ResolvedText,
    pub legend_text: ResolvedText,
    pub grid: ResolvedLine,
    pub axis_line: ResolvedLine,
    pub margin: Margin,
}

impl ResolvedTheme {
    pub fn resolve(theme: &Theme) -> Self {
        ResolvedTheme {
            background: parse_color(theme.background).unwrap_or(RGBColor(255, 255, 255)),
            title: resolve_text(&theme.title),
            axis_text: resolve_text(&theme.axis_text),
            legend_title: resolve_text(&theme.legend_title),
            legend_text: resolve_text(&theme.legend_text),
            grid: resolve_line(&theme.grid),
            axis_line: resolve_line(&theme.axis_line),
            margin: theme.margin,
        }
    }
}

fn resolve_text(style: &TextStyle) -> ResolvedText {
    ResolvedText {
        family: style.family.to_string(),
        color: parse_color(style.color).unwrap_or(RGBColor(0, 0, 0)),
        size: style.size,
    }
}

fn resolve_line(style: &LineStyle) -> ResolvedLine {
    ResolvedLine {
        color: parse_color(style.color).unwrap_or(RGBColor(0, 0, 0)),
        width: style.width,
    }
}

// === Color Parsing ===

/// Parse a `#RRGGBB` or `#RGB` colour string
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let hex = color_str.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    match hex.len() {
        6 => Some(RGBColor(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Some(RGBColor(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => None,
    }
}
