#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Loader for the plain-text circuit template format.
//!
//! A template file is split into sections by lines starting with `===`. A
//! header mentioning `template` switches to grid rows made of two-digit tile
//! tokens (tile id, then data index); a header mentioning `truth table`
//! switches to rows of the form `<input bits> = <output bits>`. Blank lines
//! and lines starting with `#` are ignored.

use std::{fs, path::Path};

use anyhow::{Context, Result as AnyResult};
use thiserror::Error;
use tilelogic_core::{Template, TemplateError, TileGrid, TileKind, Truth};

const SECTION_MARKER: &str = "===";
const COMMENT_MARKER: char = '#';
const TRUTH_SEPARATOR: char = '=';

/// Errors that can occur while parsing template text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A grid token was not exactly two decimal digits.
    #[error("line {line}: tile token `{token}` must be two digits")]
    InvalidToken {
        /// One-based line number.
        line: usize,
        /// Offending token.
        token: String,
    },
    /// A grid token named a tile id with no tile kind.
    #[error("line {line}: unknown tile id {id}")]
    UnknownTile {
        /// One-based line number.
        line: usize,
        /// Unrecognised tile id.
        id: u8,
    },
    /// A truth-table row did not contain exactly one `=`.
    #[error("line {line}: truth row must contain exactly one `=` (found {found})")]
    Separator {
        /// One-based line number.
        line: usize,
        /// Number of separators found.
        found: usize,
    },
    /// The parsed grid and truth table are inconsistent.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    None,
    Template,
    TruthTable,
}

/// Parses template text into a validated [`Template`].
pub fn parse(text: &str) -> Result<Template, ParseError> {
    let mut section = Section::None;
    let mut rows: Vec<Vec<(TileKind, u8)>> = Vec::new();
    let mut truths: Vec<Truth> = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }

        if line.starts_with(SECTION_MARKER) {
            let header = line.to_lowercase();
            if header.contains("template") {
                section = Section::Template;
            } else if header.contains("truth table") {
                section = Section::TruthTable;
            }
            continue;
        }

        match section {
            Section::Template => rows.push(parse_grid_row(line_number, line)?),
            Section::TruthTable => truths.push(parse_truth_row(line_number, line)?),
            Section::None => {
                log::warn!("skipping line {line_number} outside any section: {line}");
            }
        }
    }

    let grid = TileGrid::from_rows(rows)?;
    Ok(Template::new(grid, truths)?)
}

/// Reads and parses the template stored at `path`.
pub fn load(path: impl AsRef<Path>) -> AnyResult<Template> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read template at {}", path.display()))?;
    parse(&text).with_context(|| format!("failed to parse template at {}", path.display()))
}

fn parse_grid_row(line: usize, text: &str) -> Result<Vec<(TileKind, u8)>, ParseError> {
    text.split_whitespace()
        .map(|token| parse_tile_token(line, token))
        .collect()
}

fn parse_tile_token(line: usize, token: &str) -> Result<(TileKind, u8), ParseError> {
    let invalid = || ParseError::InvalidToken {
        line,
        token: token.to_owned(),
    };

    let mut chars = token.chars();
    let (Some(kind), Some(data), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(invalid());
    };
    let id = kind.to_digit(10).ok_or_else(invalid)?;
    let data = data.to_digit(10).ok_or_else(invalid)?;
    let id = u8::try_from(id).map_err(|_| invalid())?;
    let data = u8::try_from(data).map_err(|_| invalid())?;

    let kind = TileKind::from_id(id).ok_or(ParseError::UnknownTile { line, id })?;
    Ok((kind, data))
}

fn parse_truth_row(line: usize, text: &str) -> Result<Truth, ParseError> {
    let found = text.matches(TRUTH_SEPARATOR).count();
    let Some((inputs, outputs)) = text.split_once(TRUTH_SEPARATOR).filter(|_| found == 1) else {
        return Err(ParseError::Separator { line, found });
    };

    Ok(Truth::new(parse_bits(inputs), parse_bits(outputs)))
}

fn parse_bits(text: &str) -> Vec<bool> {
    text.split_whitespace().map(|bit| bit != "0").collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilelogic_core::CellCoord;

    const INVERTER: &str = "\
# input, wire, block, inverter, wire, output
=== Template ===
40 10 60 20 10 50
00 60 00 00 60 00

=== Truth Table ===
1 = 0
0 = 1
";

    #[test]
    fn parses_grid_and_truth_table() {
        let template = parse(INVERTER).expect("valid template");

        assert_eq!(template.grid().columns(), 6);
        assert_eq!(template.grid().rows(), 2);
        assert_eq!(
            template
                .grid()
                .tile(CellCoord::new(3, 0))
                .map(|tile| tile.kind()),
            Some(TileKind::Inverter)
        );
        assert_eq!(
            template.truths(),
            &[
                Truth::new(vec![true], vec![false]),
                Truth::new(vec![false], vec![true]),
            ]
        );
    }

    #[test]
    fn data_digit_is_the_last_token_character() {
        let template = parse("=== template\n43 17\n").expect("valid template");
        let tiles: Vec<_> = template
            .grid()
            .iter()
            .map(|tile| (tile.kind(), tile.data()))
            .collect();

        assert_eq!(tiles, vec![(TileKind::Input, 3), (TileKind::Wire, 7)]);
        assert!(template.truths().is_empty());
    }

    #[test]
    fn headers_are_case_insensitive_and_other_headers_keep_the_section() {
        let text = "=== TEMPLATE ===\n10\n=== notes ===\n60\n=== TRUTH TABLE ===\n1 0 = 1\n";
        let template = parse(text).expect("valid template");

        assert_eq!(template.grid().rows(), 2);
        assert_eq!(
            template.truths(),
            &[Truth::new(vec![true, false], vec![true])]
        );
    }

    #[test]
    fn non_zero_bits_are_true() {
        let template = parse("=== truth table\n 2 0 x = 0 9\n").expect("valid template");

        assert_eq!(
            template.truths(),
            &[Truth::new(vec![true, false, true], vec![false, true])]
        );
    }

    #[test]
    fn lines_outside_sections_are_skipped() {
        let template = parse("stray line\n=== template\n00\n").expect("valid template");
        assert_eq!(template.grid().len(), 1);
    }

    #[test]
    fn empty_text_yields_an_empty_template() {
        let template = parse("").expect("valid template");
        assert!(template.grid().is_empty());
        assert!(template.truths().is_empty());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            parse("=== template\n40 1\n"),
            Err(ParseError::InvalidToken {
                line: 2,
                token: "1".to_owned(),
            })
        );
        assert_eq!(
            parse("=== template\n40 100\n"),
            Err(ParseError::InvalidToken {
                line: 2,
                token: "100".to_owned(),
            })
        );
        assert_eq!(
            parse("=== template\nw0\n"),
            Err(ParseError::InvalidToken {
                line: 2,
                token: "w0".to_owned(),
            })
        );
        assert_eq!(
            parse("=== template\n30\n"),
            Err(ParseError::UnknownTile { line: 2, id: 3 })
        );
    }

    #[test]
    fn truth_rows_need_exactly_one_separator() {
        assert_eq!(
            parse("=== truth table\n1 0\n"),
            Err(ParseError::Separator { line: 2, found: 0 })
        );
        assert_eq!(
            parse("=== truth table\n1 = 0 = 1\n"),
            Err(ParseError::Separator { line: 2, found: 2 })
        );
    }

    #[test]
    fn inconsistent_shapes_are_configuration_errors() {
        assert_eq!(
            parse("=== template\n10 60\n10\n"),
            Err(ParseError::Template(TemplateError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1,
            }))
        );
        assert_eq!(
            parse("=== truth table\n1 = 1\n1 = 1 0\n"),
            Err(ParseError::Template(TemplateError::OutputWidthMismatch {
                row: 1,
                expected: 1,
                found: 2,
            }))
        );
    }

    #[test]
    fn load_reports_missing_files() {
        let error = load("does/not/exist.rstemplate").expect_err("missing file");
        assert!(error.to_string().contains("does/not/exist.rstemplate"));
    }
}
