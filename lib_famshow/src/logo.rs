use std::collections::{HashMap, HashSet};

use log::{debug, trace};
use svg::{
    Document,
    node::element::{Group, Line, Rectangle, Text},
};

use crate::error::{Error, Result};


const COLUMN_WIDTH: f64 = 24.0;
const BIT_HEIGHT: f64 = 48.0;
const MARGIN_LEFT: f64 = 48.0;
const MARGIN_RIGHT: f64 = 12.0;
const MARGIN_TOP: f64 = 12.0;
const MARGIN_BOTTOM: f64 = 36.0;
const LABEL_FONT_SIZE: f64 = 10.0;

/// Glyphs are drawn at this size and then stretched to their box.
const GLYPH_FONT_SIZE: f64 = 100.0;
/// Cap height of a bold sans-serif capital relative to the font size.
const GLYPH_CAP_HEIGHT: f64 = 0.72;
/// Advance width of a bold sans-serif capital relative to the font size.
const GLYPH_ADVANCE: f64 = 0.68;

const DEFAULT_COLOR: &str = "black";

/// Residue symbols in profile column order, together with their colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoStyle {
    symbols: Vec<char>,
    colors: HashMap<char, String>,
}

/// Per-position residue heights of a profile, in bits.
///
/// Each position holds one height per symbol of the [`LogoStyle`] it is rendered with.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidueHeights {
    positions: Vec<Vec<f64>>,
}

impl LogoStyle {
    pub fn new(
        symbols: impl IntoIterator<Item = char>,
        colors: HashMap<char, String>,
    ) -> Result<Self> {
        let symbols: Vec<_> = symbols.into_iter().collect();
        if symbols.is_empty() {
            return Err(Error::EmptyAlphabet);
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = symbols.iter().find(|symbol| !seen.insert(**symbol)) {
            return Err(Error::DuplicateSymbol(*duplicate));
        }

        Ok(Self { symbols, colors })
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// The color of a residue, black if the color map does not name one.
    pub fn color(&self, symbol: char) -> &str {
        self.colors
            .get(&symbol)
            .map(String::as_str)
            .unwrap_or(DEFAULT_COLOR)
    }
}

impl ResidueHeights {
    pub fn new(positions: Vec<Vec<f64>>) -> Self {
        Self { positions }
    }

    /// Parses the residue height table printed by `hmmlogo`.
    ///
    /// Data lines have the form `<position>: <h_1> ... <h_k> ...` with positions counting up from one.
    /// Only the first `alphabet_size` values of a line are read.
    /// Text before the first data line is skipped, and the first non-data line after it ends the table.
    pub fn parse(input: &str, alphabet_size: usize) -> Result<Self> {
        let mut positions = Vec::new();

        for (index, line) in input.lines().enumerate() {
            let line_number = index + 1;
            let entry = line.trim().split_once(':').and_then(|(position, values)| {
                position
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .map(|position| (position, values))
            });

            let Some((position, values)) = entry else {
                if positions.is_empty() {
                    trace!("Skipping line {line_number}: {line:?}");
                    continue;
                } else {
                    break;
                }
            };

            if position != positions.len() + 1 {
                return Err(Error::MalformedHeights {
                    line: line_number,
                    reason: format!(
                        "expected position {}, but found {position}",
                        positions.len() + 1
                    ),
                });
            }

            let heights = values
                .split_whitespace()
                .take(alphabet_size)
                .map(|value| match value.parse::<f64>() {
                    Ok(height) if height.is_finite() => Ok(height),
                    Ok(_) => Err(Error::MalformedHeights {
                        line: line_number,
                        reason: format!("{value:?} is not a finite height"),
                    }),
                    Err(error) => Err(Error::MalformedHeights {
                        line: line_number,
                        reason: format!("{value:?} is not a number: {error}"),
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            if heights.len() != alphabet_size {
                return Err(Error::MalformedHeights {
                    line: line_number,
                    reason: format!(
                        "expected {alphabet_size} heights, but found {}",
                        heights.len()
                    ),
                });
            }

            positions.push(heights);
        }

        if positions.is_empty() {
            return Err(Error::MalformedHeights {
                line: input.lines().count(),
                reason: "no residue heights found".to_string(),
            });
        }

        Ok(Self { positions })
    }

    pub fn positions(&self) -> &[Vec<f64>] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The tallest stack of positive heights over all positions.
    pub fn max_stack_height(&self) -> f64 {
        self.positions
            .iter()
            .map(|heights| heights.iter().filter(|height| **height > 0.0).sum::<f64>())
            .fold(0.0, f64::max)
    }
}

/// Renders a sequence logo as an SVG document.
///
/// Every position is one column in which residues are stacked with the tallest on top.
/// Residues with a height of zero or less are left out.
pub fn render_logo_svg(heights: &ResidueHeights, style: &LogoStyle) -> String {
    let max_height = heights.max_stack_height().max(1.0);
    let plot_width = heights.len() as f64 * COLUMN_WIDTH;
    let plot_height = max_height * BIT_HEIGHT;
    let width = MARGIN_LEFT + plot_width + MARGIN_RIGHT;
    let height = MARGIN_TOP + plot_height + MARGIN_BOTTOM;
    let baseline = MARGIN_TOP + plot_height;
    debug!(
        "Rendering logo with {} positions and a maximum stack of {max_height:.3} bits",
        heights.len()
    );

    let mut glyphs = Group::new();
    for (index, column) in heights.positions().iter().enumerate() {
        let center = MARGIN_LEFT + (index as f64 + 0.5) * COLUMN_WIDTH;

        let mut stack: Vec<_> = style
            .symbols()
            .iter()
            .zip(column)
            .filter(|(_, height)| **height > 0.0)
            .collect();
        stack.sort_by(|(_, a), (_, b)| a.total_cmp(b));

        let mut bottom = baseline;
        for (symbol, residue_height) in stack {
            let glyph_height = residue_height * BIT_HEIGHT;
            glyphs = glyphs.add(
                Text::new(symbol.to_string())
                    .set("class", "residue")
                    .set("x", 0)
                    .set("y", 0)
                    .set("font-family", "sans-serif")
                    .set("font-weight", "bold")
                    .set("font-size", GLYPH_FONT_SIZE)
                    .set("text-anchor", "middle")
                    .set("fill", style.color(*symbol))
                    .set(
                        "transform",
                        format!(
                            "translate({center} {bottom}) scale({} {})",
                            COLUMN_WIDTH / (GLYPH_FONT_SIZE * GLYPH_ADVANCE),
                            glyph_height / (GLYPH_FONT_SIZE * GLYPH_CAP_HEIGHT),
                        ),
                    ),
            );
            bottom -= glyph_height;
        }
    }

    Document::new()
        .set("viewBox", (0, 0, width, height))
        .set("width", width)
        .set("height", height)
        .add(
            Rectangle::new()
                .set("width", width)
                .set("height", height)
                .set("fill", "white"),
        )
        .add(axes(heights.len(), max_height, baseline))
        .add(glyphs)
        .to_string()
}

fn axes(positions: usize, max_height: f64, baseline: f64) -> Group {
    let right = MARGIN_LEFT + positions as f64 * COLUMN_WIDTH;
    let mut group = Group::new()
        .set("stroke", "black")
        .set("font-family", "sans-serif")
        .set("font-size", LABEL_FONT_SIZE)
        .add(axis_line(MARGIN_LEFT, baseline, right, baseline))
        .add(axis_line(MARGIN_LEFT, baseline, MARGIN_LEFT, MARGIN_TOP));

    for bit in 0..=max_height.floor() as usize {
        let y = baseline - bit as f64 * BIT_HEIGHT;
        group = group
            .add(axis_line(MARGIN_LEFT - 4.0, y, MARGIN_LEFT, y))
            .add(
                Text::new(bit.to_string())
                    .set("x", MARGIN_LEFT - 6.0)
                    .set("y", y + LABEL_FONT_SIZE / 3.0)
                    .set("text-anchor", "end")
                    .set("stroke", "none"),
            );
    }

    group = group.add(
        Text::new("bits")
            .set("x", 0)
            .set("y", 0)
            .set("text-anchor", "middle")
            .set("stroke", "none")
            .set(
                "transform",
                format!(
                    "translate({} {}) rotate(-90)",
                    LABEL_FONT_SIZE * 1.5,
                    (MARGIN_TOP + baseline) / 2.0
                ),
            ),
    );

    let label_step = if positions > 60 { 10 } else { 1 };
    for position in (1..=positions).filter(|position| *position == 1 || position % label_step == 0)
    {
        let x = MARGIN_LEFT + (position as f64 - 0.5) * COLUMN_WIDTH;
        group = group.add(
            Text::new(position.to_string())
                .set("x", x)
                .set("y", baseline + 2.0 * LABEL_FONT_SIZE)
                .set("text-anchor", "middle")
                .set("stroke", "none"),
        );
    }

    group
}

fn axis_line(x1: f64, y1: f64, x2: f64, y2: f64) -> Line {
    Line::new()
        .set("x1", x1)
        .set("y1", y1)
        .set("x2", x2)
        .set("y2", y2)
}
