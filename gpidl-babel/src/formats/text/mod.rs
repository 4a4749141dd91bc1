//! Plain-text ranges listing
//!
//! A single page listing every encoding with its fields, aligned for
//! terminal reading. The layout is stable, so tests can assert on it.

use crate::error::FormatError;
use crate::format::{Format, RenderOptions, RenderedPage};
use gpidl_synth::EncodingTable;

pub struct TextFormat;

impl Format for TextFormat {
    fn name(&self) -> &str {
        "text"
    }

    fn description(&self) -> &str {
        "Fixed-width ranges listing for terminal inspection"
    }

    fn serialize(
        &self,
        table: &EncodingTable,
        _options: &RenderOptions,
    ) -> Result<Vec<RenderedPage>, FormatError> {
        let stats = &table.meta.statistics;
        let mut out = String::new();
        out.push_str(&format!(
            "encoding version {} | {} instructions | {} encodings\n",
            table.meta.encoding_version,
            stats.instruction_count,
            table.encodings.len()
        ));
        out.push_str(&format!(
            "instruction bits: {} | form level bits: {:?}\n",
            stats.instruction_bits, stats.form_level_bits
        ));

        for (key, encoding) in &table.encodings {
            out.push('\n');
            out.push_str(key);
            out.push('\n');
            for range in &encoding.ranges {
                let start = range.start();
                let length = range.length();
                let end = if length > 0 { start + length - 1 } else { start };
                let mut detail = range.name().unwrap_or("").to_string();
                if let Some(constant) = range.constant() {
                    detail = format!("= {constant}");
                }
                if let Some(oprnd) = range.oprnd_idx() {
                    detail.push_str(&format!(" (oprnd {oprnd})"));
                }
                let line = format!(
                    "  [{end:>3}:{start:>3}] {:<10} {:>3} {}",
                    range.type_name(),
                    length,
                    detail
                );
                out.push_str(line.trim_end());
                out.push('\n');
            }
        }
        Ok(vec![RenderedPage::new("encodings.txt", out)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpidl_synth::table::{Encoding, EncodingRange, Meta, Statistics};
    use indexmap::IndexMap;

    #[test]
    fn lists_every_range_on_its_own_line() {
        let mut encodings = IndexMap::new();
        encodings.insert(
            "NOP.only".to_string(),
            Encoding {
                instruction: "NOP".to_string(),
                form_path: vec!["only".to_string()],
                ranges: vec![
                    EncodingRange::Constant {
                        start: 0,
                        length: 2,
                        constant: 3,
                    },
                    EncodingRange::Reserved {
                        start: 2,
                        length: 126,
                    },
                ],
            },
        );
        let table = EncodingTable {
            meta: Meta {
                encoding_version: 1,
                statistics: Statistics {
                    instruction_count: 1,
                    instruction_bits: 0,
                    form_level_counts: vec![1],
                    form_level_bits: vec![0],
                },
            },
            encodings,
        };

        let pages = TextFormat
            .serialize(&table, &RenderOptions::default())
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "encodings.txt");
        insta::assert_snapshot!(pages[0].contents, @r#"
        encoding version 1 | 1 instructions | 1 encodings
        instruction bits: 0 | form level bits: [0]

        NOP.only
          [  1:  0] constant     2 = 3
          [127:  2] reserved   126
        "#);
    }
}
