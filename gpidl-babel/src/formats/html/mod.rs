//! HTML bit-grid pages
//!
//! One index page plus one page per instruction. Each leaf encoding renders
//! as an MSB-left bit grid, a legend, and a ranges table. File names are
//! sanitized instruction names, deduplicated with numeric suffixes so two
//! instructions can never claim the same page.

mod grid;

use crate::error::FormatError;
use crate::format::{Format, RenderOptions, RenderedPage};
use grid::Grid;
use gpidl_synth::{Encoding, EncodingTable};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

const CSS: &str = include_str!("style.css");

pub struct HtmlFormat;

impl Format for HtmlFormat {
    fn name(&self) -> &str {
        "html"
    }

    fn description(&self) -> &str {
        "Browsable per-instruction bit-grid pages"
    }

    fn serialize(
        &self,
        table: &EncodingTable,
        options: &RenderOptions,
    ) -> Result<Vec<RenderedPage>, FormatError> {
        let groups = group_by_instruction(table);
        let mut names: Vec<&str> = groups.keys().copied().collect();
        names.sort_unstable();
        let files = allocate_filenames(&names);

        let mut pages = Vec::with_capacity(groups.len() + 1);
        pages.push(RenderedPage::new(
            "index.html",
            index_page(table, &groups, &files, options),
        ));

        let index_href = format!(
            "{}index.html",
            "../".repeat(options.instructions_dir.split('/').count())
        );
        for (instruction, items) in &groups {
            let mut items = items.clone();
            items.sort_by_key(|(key, _)| *key);
            let path = format!("{}/{}.html", options.instructions_dir, files[*instruction]);
            pages.push(RenderedPage::new(
                path,
                instruction_page(instruction, &items, &index_href, options),
            ));
        }
        Ok(pages)
    }
}

type Groups<'a> = IndexMap<&'a str, Vec<(&'a str, &'a Encoding)>>;

fn group_by_instruction(table: &EncodingTable) -> Groups<'_> {
    let mut groups: Groups = IndexMap::new();
    for (key, encoding) in &table.encodings {
        groups
            .entry(encoding.instruction.as_str())
            .or_default()
            .push((key.as_str(), encoding));
    }
    groups
}

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid filename pattern"));

fn safe_filename(name: &str) -> String {
    UNSAFE_CHARS
        .replace_all(name, "_")
        .trim_matches('_')
        .to_string()
}

/// Collision-free file base names, allocated in the given order.
fn allocate_filenames<'a>(names: &[&'a str]) -> IndexMap<&'a str, String> {
    let mut mapping = IndexMap::new();
    let mut used: IndexMap<String, &str> = IndexMap::new();
    for &name in names {
        let base = match safe_filename(name) {
            s if s.is_empty() => "inst".to_string(),
            s => s,
        };
        let mut candidate = base.clone();
        let mut idx = 1;
        while used.get(&candidate).is_some_and(|owner| *owner != name) {
            idx += 1;
            candidate = format!("{base}_{idx}");
        }
        used.insert(candidate.clone(), name);
        mapping.insert(name, candidate);
    }
    mapping
}

pub(super) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `5 (0x5)` style constant display, hex width matching the field width.
pub(super) fn format_constant(value: u64, length: u32) -> String {
    let hex_width = ((length + 3) / 4).max(1) as usize;
    format!("{value} (0x{value:0hex_width$X})")
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{CSS}</style></head><body>{body}</body></html>",
        escape(title)
    )
}

fn index_page(
    table: &EncodingTable,
    groups: &Groups<'_>,
    files: &IndexMap<&str, String>,
    options: &RenderOptions,
) -> String {
    let stats = &table.meta.statistics;
    let summary = [
        format!("encodings: {}", table.encodings.len()),
        format!("instructions: {}", groups.len()),
        format!("version: {}", table.meta.encoding_version),
        format!("opcode bits: inst={}", stats.instruction_bits),
        format!("form bits: {:?}", stats.form_level_bits),
    ]
    .join(" | ");

    let mut names: Vec<&str> = groups.keys().copied().collect();
    names.sort_unstable();
    let items: String = names
        .iter()
        .map(|name| {
            let href = format!("{}/{}.html", options.instructions_dir, files[*name]);
            format!(
                "<li><a href=\"{}\">{}</a> <span class=\"mono\">({})</span></li>",
                escape(&href),
                escape(name),
                groups[*name].len()
            )
        })
        .collect();

    let body = format!(
        "<header><h1>{}</h1></header>\
         <div class=\"summary\">{summary}</div>\
         <ul class=\"inst-list\">{items}</ul>\
         <div class=\"note\">Counts in parentheses are number of forms per instruction.</div>",
        escape(&options.title)
    );
    html_page(&options.title, &body)
}

fn instruction_page(
    instruction: &str,
    items: &[(&str, &Encoding)],
    index_href: &str,
    options: &RenderOptions,
) -> String {
    let mut parts = vec![format!(
        "<header><h1>{}</h1><a href=\"{}\">index</a></header>\
         <div class=\"summary\">{} forms; bit 0 is LSB (rightmost cell); \
         each row shows up to {} bits.</div>",
        escape(instruction),
        escape(index_href),
        items.len(),
        options.bits_per_row
    )];

    for (key, encoding) in items {
        let form_str = if encoding.form_path.is_empty() {
            "(none)".to_string()
        } else {
            encoding.form_path.join(".")
        };
        let bit_width = encoding.ranges.iter().map(|r| r.end()).max().unwrap_or(0);
        let grid = Grid::build(&encoding.ranges, bit_width);

        parts.push("<section class=\"encoding\">".to_string());
        parts.push(format!("<h2>{}</h2>", escape(key)));
        parts.push(format!(
            "<div class=\"encoding-meta\">form_path: \
             <span class=\"mono\">{}</span> | width: {bit_width} bits</div>",
            escape(&form_str)
        ));
        parts.push(grid.render_table(options.bits_per_row));
        parts.push(grid.render_legend());
        if !grid.warnings.is_empty() {
            parts.push(format!(
                "<div class=\"note\">warnings: {}</div>",
                grid.warnings.join(", ")
            ));
        }
        parts.push(ranges_table(encoding));
        parts.push("</section>".to_string());
    }
    html_page(instruction, &parts.concat())
}

fn ranges_table(encoding: &Encoding) -> String {
    let mut sorted: Vec<_> = encoding.ranges.iter().collect();
    sorted.sort_by_key(|r| r.start());

    let rows: String = if sorted.is_empty() {
        "<tr><td colspan=\"6\">(no ranges)</td></tr>".to_string()
    } else {
        sorted
            .iter()
            .map(|range| {
                let start = range.start();
                let length = range.length();
                let end = if length > 0 { start + length - 1 } else { start };
                let constant = range
                    .constant()
                    .map(|c| format_constant(c, length))
                    .unwrap_or_default();
                format!(
                    "<tr><td class=\"mono\">[{end}:{start}]</td><td class=\"mono\">{length}</td>\
                     <td>{}</td><td>{}</td><td class=\"mono\">{}</td><td>{}</td></tr>",
                    escape(range.type_name()),
                    escape(range.name().unwrap_or("")),
                    escape(&constant),
                    escape(range.oprnd_idx().unwrap_or(""))
                )
            })
            .collect()
    };

    format!(
        "<table class=\"ranges\"><tr><th>bits</th><th>len</th><th>type</th>\
         <th>name</th><th>constant</th><th>oprnd_idx</th></tr>{rows}</table>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpidl_synth::table::{EncodingRange, Meta, Statistics};

    fn sample_table() -> EncodingTable {
        let mut encodings = IndexMap::new();
        encodings.insert(
            "FADD.r_r".to_string(),
            Encoding {
                instruction: "FADD".to_string(),
                form_path: vec!["r_r".to_string()],
                ranges: vec![
                    EncodingRange::Constant {
                        start: 0,
                        length: 1,
                        constant: 0,
                    },
                    EncodingRange::Operand {
                        start: 1,
                        length: 8,
                        name: "d".to_string(),
                    },
                    EncodingRange::OprndFlag {
                        start: 9,
                        length: 1,
                        name: "neg".to_string(),
                        oprnd_idx: "d".to_string(),
                    },
                    EncodingRange::Reserved {
                        start: 10,
                        length: 118,
                    },
                ],
            },
        );
        encodings.insert(
            "LD.E/U8".to_string(),
            Encoding {
                instruction: "LD".to_string(),
                form_path: vec!["E/U8".to_string()],
                ranges: vec![EncodingRange::Constant {
                    start: 0,
                    length: 1,
                    constant: 1,
                }],
            },
        );
        EncodingTable {
            meta: Meta {
                encoding_version: 1,
                statistics: Statistics {
                    instruction_count: 2,
                    instruction_bits: 1,
                    form_level_counts: vec![2],
                    form_level_bits: vec![1],
                },
            },
            encodings,
        }
    }

    #[test]
    fn produces_an_index_and_one_page_per_instruction() {
        let pages = HtmlFormat
            .serialize(&sample_table(), &RenderOptions::default())
            .unwrap();
        let paths: Vec<&str> = pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "index.html",
                "instructions/FADD.html",
                "instructions/LD.html"
            ]
        );
    }

    #[test]
    fn index_links_every_instruction() {
        let pages = HtmlFormat
            .serialize(&sample_table(), &RenderOptions::default())
            .unwrap();
        let index = &pages[0].contents;
        assert!(index.contains("href=\"instructions/FADD.html\""));
        assert!(index.contains("encodings: 2"));
        assert!(index.contains("version: 1"));
    }

    #[test]
    fn instruction_page_contains_grid_and_ranges_table() {
        let pages = HtmlFormat
            .serialize(&sample_table(), &RenderOptions::default())
            .unwrap();
        let fadd = &pages[1].contents;
        assert!(fadd.contains("<table class=\"bitgrid\">"));
        assert!(fadd.contains("<table class=\"ranges\">"));
        assert!(fadd.contains("FADD.r_r"));
        assert!(fadd.contains("href=\"../index.html\""));
        assert!(fadd.contains("oprnd=d"));
    }

    #[test]
    fn filenames_are_sanitized_and_deduplicated() {
        let files = allocate_filenames(&["LD/E", "LD_E", "??"]);
        assert_eq!(files["LD/E"], "LD_E");
        assert_eq!(files["LD_E"], "LD_E_2");
        assert_eq!(files["??"], "inst");
    }

    #[test]
    fn escaping_covers_markup_characters() {
        assert_eq!(escape("a<b&\"c\""), "a&lt;b&amp;&quot;c&quot;");
    }

    #[test]
    fn constants_show_decimal_and_hex() {
        assert_eq!(format_constant(5, 3), "5 (0x5)");
        assert_eq!(format_constant(255, 8), "255 (0xFF)");
        assert_eq!(format_constant(0, 0), "0 (0x0)");
    }
}
