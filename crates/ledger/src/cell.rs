// Typed cell values as delivered by the workbook reader.
//
// The engine never sees a file format: the io crate converts whatever the
// spreadsheet stored into these variants, and extraction coerces from here.

use chrono::NaiveDateTime;

use crate::normalize::format_number;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

static EMPTY: Cell = Cell::Empty;

/// Result of coercing a cell to a quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coerced {
    pub value: f64,
    /// True when the cell held something that could not be read as a number
    /// and was neutralized to 0.
    pub neutralized: bool,
}

impl Cell {
    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Trimmed text form of the cell, or `None` when blank.
    ///
    /// Integral numbers print without a decimal part, so a pole id stored as
    /// `42.0` reads back as `42`.
    pub fn text(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.trim().to_string()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(if *b { "TRUE".into() } else { "FALSE".into() }),
            Self::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Coerce to a finite quantity. Missing values are 0 without being
    /// flagged; unreadable values are 0 and flagged as neutralized.
    pub fn quantity(&self) -> Coerced {
        let clean = |value: f64| {
            if value.is_finite() {
                Coerced { value, neutralized: false }
            } else {
                Coerced { value: 0.0, neutralized: true }
            }
        };
        match self {
            Self::Empty => Coerced { value: 0.0, neutralized: false },
            Self::Number(n) if n.is_nan() => Coerced { value: 0.0, neutralized: false },
            Self::Number(n) => clean(*n),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Coerced { value: 0.0, neutralized: false };
                }
                match trimmed.replace(',', ".").parse::<f64>() {
                    Ok(n) => clean(n),
                    Err(_) => Coerced { value: 0.0, neutralized: true },
                }
            }
            Self::Bool(_) | Self::DateTime(_) => Coerced { value: 0.0, neutralized: true },
        }
    }
}

// ---------------------------------------------------------------------------
// Sheet table
// ---------------------------------------------------------------------------

/// One worksheet: a header row plus data rows. Row vectors may be shorter
/// than the header; missing trailing cells read as empty.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SheetTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Position of the first header equal to `name` after trimming both
    /// sides, ignoring ASCII case.
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.headers.iter().position(|h| h.trim().eq_ignore_ascii_case(wanted))
    }
}

/// Cell at `col`, or an empty cell when the row is short.
pub fn cell_at(row: &[Cell], col: usize) -> &Cell {
    row.get(col).unwrap_or(&EMPTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_text_drops_integral_fraction() {
        assert_eq!(Cell::Number(42.0).text().as_deref(), Some("42"));
        assert_eq!(Cell::Number(1.5).text().as_deref(), Some("1.5"));
        assert_eq!(Cell::Text("  x ".into()).text().as_deref(), Some("x"));
        assert_eq!(Cell::Text("   ".into()).text(), None);
        assert_eq!(Cell::Empty.text(), None);
    }

    #[test]
    fn quantity_coercion() {
        assert_eq!(Cell::Number(3.0).quantity().value, 3.0);
        assert_eq!(Cell::Text("2,5".into()).quantity().value, 2.5);
        assert_eq!(Cell::Empty.quantity(), Coerced { value: 0.0, neutralized: false });

        let bad = Cell::Text("dos".into()).quantity();
        assert_eq!(bad.value, 0.0);
        assert!(bad.neutralized);

        let inf = Cell::Number(f64::INFINITY).quantity();
        assert_eq!(inf.value, 0.0);
        assert!(inf.neutralized);
    }

    #[test]
    fn short_rows_read_empty() {
        let row = vec![Cell::Number(1.0)];
        assert_eq!(cell_at(&row, 0), &Cell::Number(1.0));
        assert_eq!(cell_at(&row, 5), &Cell::Empty);
    }

    #[test]
    fn column_lookup_trims_headers() {
        let table = SheetTable::new("s", vec![" 5.Nodo ".into(), "MATERIAL 1".into()]);
        assert_eq!(table.column("5.Nodo"), Some(0));
        assert_eq!(table.column("MATERIAL 1"), Some(1));
        assert_eq!(table.column("MATERIAL 2"), None);
    }
}
