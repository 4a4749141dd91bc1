//! Bit-grid construction
//!
//! Normalizes a layout's ranges into a gap-free slot list, assigns colors,
//! and renders the MSB-left grid rows. Constant slots render one cell per
//! bit carrying that bit of the constant; every other slot is merged into a
//! single colspan cell per row.

use super::{escape, format_constant};
use gpidl_synth::EncodingRange;

const PASTEL_PALETTE: [&str; 16] = [
    "#D7EAF8", "#F8D4C1", "#E5F1C8", "#F6D7EC", "#DCD9F6", "#FCE6B8", "#D2F0E6", "#F9D7D7",
    "#D9F2F2", "#F5E0C8", "#E3F2D6", "#EADCF6", "#D8E7FA", "#F3E3EE", "#E8F5D2", "#D6EDF7",
];
const CONST_PALETTE: [&str; 4] = ["#E3E7EC", "#D6DCE3", "#CCD2DA", "#EDF0F4"];
const RESERVED_PALETTE: [&str; 4] = ["#F1F2F4", "#E6E8EC", "#DDE1E6", "#F6F7F9"];
const GAP_PALETTE: [&str; 3] = ["#ECECEC", "#E2E2E2", "#D7D7D7"];
const FALLBACK_COLOR: &str = "#D0D0D0";

/// One contiguous run of bits in a normalized layout: either a real range
/// or a gap filling a hole the table left uncovered.
pub(super) enum Slot<'a> {
    Range(&'a EncodingRange),
    Gap { start: u32, length: u32 },
}

impl Slot<'_> {
    pub(super) fn start(&self) -> u32 {
        match self {
            Slot::Range(range) => range.start(),
            Slot::Gap { start, .. } => *start,
        }
    }

    pub(super) fn length(&self) -> u32 {
        match self {
            Slot::Range(range) => range.length(),
            Slot::Gap { length, .. } => *length,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Slot::Range(range) => range.type_name(),
            Slot::Gap { .. } => "gap",
        }
    }

    fn constant(&self) -> Option<u64> {
        match self {
            Slot::Range(range) => range.constant(),
            Slot::Gap { .. } => None,
        }
    }

    /// Short text shown inside grid cells and the legend.
    pub(super) fn label(&self) -> String {
        match self {
            Slot::Range(range) => match range {
                EncodingRange::Constant { length, constant, .. } => {
                    if *length <= 6 {
                        constant.to_string()
                    } else {
                        "const".to_string()
                    }
                }
                EncodingRange::Reserved { .. } => "reserved".to_string(),
                _ => range.name().unwrap_or("range").to_string(),
            },
            Slot::Gap { .. } => "gap".to_string(),
        }
    }

    /// Hover text: type, bit span, length, and the variant fields.
    fn title(&self) -> String {
        let start = self.start();
        let length = self.length();
        let end = if length > 0 { start + length - 1 } else { start };
        let mut parts = vec![
            self.type_name().to_string(),
            format!("[{end}:{start}]"),
            format!("len={length}"),
        ];
        if let Slot::Range(range) = self {
            if let Some(name) = range.name() {
                parts.push(format!("name={name}"));
            }
            if let Some(oprnd) = range.oprnd_idx() {
                parts.push(format!("oprnd={oprnd}"));
            }
            if let Some(constant) = range.constant() {
                parts.push(format!("const={}", format_constant(constant, length)));
            }
        }
        parts.join(" ")
    }
}

/// A normalized layout ready to render: slots cover `[0, bit_width)` without
/// holes, each with a color; overlaps are reported, not repaired.
pub(super) struct Grid<'a> {
    pub(super) slots: Vec<Slot<'a>>,
    pub(super) colors: Vec<&'static str>,
    pub(super) warnings: Vec<String>,
    bit_width: u32,
}

impl<'a> Grid<'a> {
    pub(super) fn build(ranges: &'a [EncodingRange], bit_width: u32) -> Self {
        let (slots, warnings) = normalize(ranges, bit_width);
        let colors = assign_colors(&slots);
        Grid {
            slots,
            colors,
            warnings,
            bit_width,
        }
    }

    /// The grid itself: one table per row of `row_bits` bits, MSB leftmost.
    pub(super) fn render_table(&self, row_bits: usize) -> String {
        if self.bit_width == 0 {
            return "<div class='note'>no bit ranges</div>".to_string();
        }
        let row_bits = row_bits.max(1) as u32;
        let bit_map = self.bit_map();
        let mut parts = vec!["<div class=\"bitgrid-wrap\">".to_string()];

        let mut high = self.bit_width - 1;
        loop {
            let low = high.saturating_sub(row_bits - 1);
            let row_len = high - low + 1;
            let colgroup: String = std::iter::once("<colgroup>")
                .chain(std::iter::repeat("<col>").take(row_len as usize))
                .chain(std::iter::once("</colgroup>"))
                .collect();
            parts.push(format!("<table class=\"bitgrid\">{colgroup}"));
            let scale: String = (low..=high)
                .rev()
                .map(|bit| format!("<th class=\"scale\">{bit}</th>"))
                .collect();
            parts.push(format!("<tr>{scale}</tr>"));

            let mut cells = String::new();
            let mut bit = high;
            loop {
                let slot_idx = bit_map[bit as usize];
                let slot = &self.slots[slot_idx];
                let color = self.colors[slot_idx];
                if slot.type_name() == "constant" {
                    let constant = slot.constant().unwrap_or(0);
                    let offset = bit - slot.start();
                    let value = (constant >> offset) & 1;
                    let title = escape(&slot.title());
                    cells.push_str(&format!(
                        "<td class=\"bitcell\" style=\"background-color: {color};\" \
                         title=\"{title}\">{value}</td>"
                    ));
                    if bit == low {
                        break;
                    }
                    bit -= 1;
                    continue;
                }
                // extend the cell over every bit of the same slot in this row
                let mut span = 1u32;
                while bit >= low + span && bit_map[(bit - span) as usize] == slot_idx {
                    span += 1;
                }
                let label = slot.label();
                let mut label_html = escape(&label);
                if span == 1 && label.len() > 3 {
                    label_html = format!("<span class=\"vlabel\">{label_html}</span>");
                }
                let mut classes = vec!["bitcell".to_string(), format!("type-{}", slot.type_name())];
                if span > 1 {
                    classes.push("span".to_string());
                }
                if slot.type_name() == "oprnd_flag" {
                    classes.push("flag".to_string());
                }
                let title = escape(&slot.title());
                cells.push_str(&format!(
                    "<td class=\"{}\" colspan=\"{span}\" style=\"background-color: {color};\" \
                     title=\"{title}\">{label_html}</td>",
                    classes.join(" ")
                ));
                if bit < low + span {
                    break;
                }
                bit -= span;
            }
            parts.push(format!("<tr>{cells}</tr>"));
            parts.push("</table>".to_string());

            if low == 0 {
                break;
            }
            high = low - 1;
        }
        parts.push("</div>".to_string());
        parts.concat()
    }

    /// Legend entries, deduplicated by label and color, MSB side first.
    pub(super) fn render_legend(&self) -> String {
        let mut items = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for (slot, color) in self.slots.iter().zip(&self.colors).rev() {
            if let Slot::Gap { .. } = slot {
                continue;
            }
            let label = slot.label();
            if !seen.insert((label.clone(), *color)) {
                continue;
            }
            items.push(format!(
                "<span class=\"legend-item\"><span class=\"swatch\" \
                 style=\"background:{color}\"></span>{}</span>",
                escape(&label)
            ));
        }
        if items.is_empty() {
            return String::new();
        }
        format!("<div class=\"legend\">{}</div>", items.concat())
    }

    /// Slot index owning each bit. Overlapping ranges resolve to the later
    /// slot, matching the order they were appended in.
    fn bit_map(&self) -> Vec<usize> {
        let mut map = vec![0usize; self.bit_width as usize];
        for (idx, slot) in self.slots.iter().enumerate() {
            for offset in 0..slot.length() {
                let bit = slot.start() + offset;
                if bit < self.bit_width {
                    map[bit as usize] = idx;
                }
            }
        }
        map
    }
}

/// Sort ranges by start and fill holes with gap slots. An overlap leaves
/// both ranges in place and records a warning.
fn normalize(ranges: &[EncodingRange], bit_width: u32) -> (Vec<Slot<'_>>, Vec<String>) {
    let mut sorted: Vec<&EncodingRange> = ranges.iter().collect();
    sorted.sort_by_key(|r| r.start());

    let mut slots = Vec::new();
    let mut warnings = Vec::new();
    let mut cursor = 0u32;
    for range in sorted {
        let start = range.start();
        if start > cursor {
            slots.push(Slot::Gap {
                start: cursor,
                length: start - cursor,
            });
        } else if start < cursor {
            warnings.push(format!("overlap at bit {start}"));
        }
        slots.push(Slot::Range(range));
        cursor = cursor.max(range.end());
    }
    if cursor < bit_width {
        slots.push(Slot::Gap {
            start: cursor,
            length: bit_width - cursor,
        });
    }
    (slots, warnings)
}

/// One color per slot. Each slot type cycles its own palette; a color never
/// repeats between adjacent slots when the palette allows.
fn assign_colors(slots: &[Slot<'_>]) -> Vec<&'static str> {
    let mut colors = Vec::with_capacity(slots.len());
    let mut prev: Option<&'static str> = None;
    let mut main_idx = 0;
    let mut const_idx = 0;
    let mut reserved_idx = 0;
    let mut gap_idx = 0;
    for slot in slots {
        let color = match slot.type_name() {
            "constant" => next_color(&CONST_PALETTE, &mut const_idx, prev),
            "reserved" => next_color(&RESERVED_PALETTE, &mut reserved_idx, prev),
            "gap" => next_color(&GAP_PALETTE, &mut gap_idx, prev),
            _ => next_color(&PASTEL_PALETTE, &mut main_idx, prev),
        };
        colors.push(color);
        prev = Some(color);
    }
    colors
}

fn next_color(
    palette: &[&'static str],
    index: &mut usize,
    avoid: Option<&'static str>,
) -> &'static str {
    if palette.is_empty() {
        return FALLBACK_COLOR;
    }
    let mut color = palette[*index % palette.len()];
    if avoid == Some(color) && palette.len() > 1 {
        *index += 1;
        color = palette[*index % palette.len()];
    }
    *index += 1;
    color
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operand(start: u32, length: u32, name: &str) -> EncodingRange {
        EncodingRange::Operand {
            start,
            length,
            name: name.to_string(),
        }
    }

    #[test]
    fn normalize_fills_holes_with_gaps() {
        let ranges = vec![operand(4, 4, "a")];
        let (slots, warnings) = normalize(&ranges, 16);
        assert!(warnings.is_empty());
        let shape: Vec<(&str, u32, u32)> = slots
            .iter()
            .map(|s| (s.type_name(), s.start(), s.length()))
            .collect();
        assert_eq!(
            shape,
            vec![("gap", 0, 4), ("operand", 4, 4), ("gap", 8, 8)]
        );
    }

    #[test]
    fn normalize_reports_overlaps() {
        let ranges = vec![operand(0, 4, "a"), operand(2, 4, "b")];
        let (slots, warnings) = normalize(&ranges, 8);
        assert_eq!(warnings, vec!["overlap at bit 2"]);
        assert_eq!(slots.len(), 3); // a, b, trailing gap
    }

    #[test]
    fn grid_emits_per_bit_constant_values() {
        let ranges = vec![EncodingRange::Constant {
            start: 0,
            length: 3,
            constant: 0b101,
        }];
        let grid = Grid::build(&ranges, 3);
        let html = grid.render_table(64);
        // MSB-left: bits 2,1,0 of 0b101
        let cells: Vec<&str> = html.matches(">1</td>").collect();
        assert_eq!(cells.len(), 2);
        assert!(html.contains(">0</td>"));
    }

    #[test]
    fn wide_layouts_split_into_rows() {
        let ranges = vec![operand(0, 128, "payload")];
        let grid = Grid::build(&ranges, 128);
        let html = grid.render_table(64);
        assert_eq!(html.matches("<table class=\"bitgrid\">").count(), 2);
        assert!(html.contains("<th class=\"scale\">127</th>"));
        assert!(html.contains("<th class=\"scale\">0</th>"));
    }

    #[test]
    fn legend_skips_gaps_and_duplicates() {
        let ranges = vec![operand(4, 4, "a")];
        let grid = Grid::build(&ranges, 16);
        let legend = grid.render_legend();
        assert!(legend.contains(">a</span>"));
        assert!(!legend.contains("gap"));
    }

    #[test]
    fn adjacent_slots_never_share_a_color() {
        let ranges: Vec<EncodingRange> = (0..8).map(|i| operand(i * 2, 2, "x")).collect();
        let grid = Grid::build(&ranges, 16);
        for pair in grid.colors.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }
}
