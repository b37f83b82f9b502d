//! Column schema: `ColumnDefinition` and the derived `Layout` facts codecs
//! need (packed offsets, bool/string counts).

use crate::definitions::{ColumnType, MAX_COLUMN_COUNT, MAX_STRING_LENGTH};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self { name: name.into(), column_type }
    }
}

/// Generates Excel-style column labels: A, B, ..., Z, AA, AB, ...
pub fn excel_column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        let rem = index % 26;
        letters.push((b'A' + rem as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    columns: Vec<ColumnDefinition>,
    bool_count: usize,
    string_count: usize,
    /// Packed byte offset of each fixed-width, non-bool, non-string column
    /// within the Flat row's fixed-scalar section. Index matches `columns`;
    /// bool/string columns carry offset 0 (unused).
    packed_offsets: Vec<usize>,
    fixed_payload_size: usize,
}

impl Layout {
    pub fn new(mut columns: Vec<ColumnDefinition>) -> Result<Self> {
        if columns.len() > MAX_COLUMN_COUNT {
            return Err(Error::Schema(format!(
                "column count {} exceeds MAX_COLUMN_COUNT {}",
                columns.len(),
                MAX_COLUMN_COUNT
            )));
        }
        for (i, col) in columns.iter_mut().enumerate() {
            col.name = col.name.trim().to_string();
            if col.name.is_empty() {
                col.name = excel_column_name(i);
            }
            if col.name.len() > MAX_STRING_LENGTH {
                return Err(Error::Schema(format!(
                    "column name '{}' exceeds MAX_STRING_LENGTH {}",
                    col.name, MAX_STRING_LENGTH
                )));
            }
        }
        Self::deduplicate_names(&mut columns);
        Ok(Self::build(columns))
    }

    /// Gives each repeated name a `.N` suffix, in column order, so two
    /// columns named `"Foo"` and `" Foo "` (equal after trimming) don't
    /// silently alias in [`Self::find`]. Mirrors the conflict-resolution
    /// outcome of the reference flat-map index: duplicates at positions
    /// `[0, 1, 2]` become `"name"`, `"name.1"`, `"name.2"`.
    fn deduplicate_names(columns: &mut [ColumnDefinition]) {
        let mut seen = std::collections::HashMap::new();
        for col in columns.iter_mut() {
            let count: &mut usize = seen.entry(col.name.clone()).or_insert(0);
            if *count > 0 {
                col.name = format!("{}.{}", col.name, *count);
            }
            *count += 1;
        }
    }

    fn build(columns: Vec<ColumnDefinition>) -> Self {
        let mut bool_count = 0;
        let mut string_count = 0;
        let mut packed_offsets = vec![0usize; columns.len()];
        let mut fixed_payload_size = 0usize;

        for (i, col) in columns.iter().enumerate() {
            match col.column_type {
                ColumnType::Bool => bool_count += 1,
                ColumnType::String => string_count += 1,
                other => {
                    packed_offsets[i] = fixed_payload_size;
                    fixed_payload_size += other.wire_size();
                }
            }
        }

        Self { columns, bool_count, string_count, packed_offsets, fixed_payload_size }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn bool_count(&self) -> usize {
        self.bool_count
    }

    pub fn string_count(&self) -> usize {
        self.string_count
    }

    pub fn fixed_payload_size(&self) -> usize {
        self.fixed_payload_size
    }

    pub fn packed_offset(&self, index: usize) -> usize {
        self.packed_offsets[index]
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excel_names_follow_spreadsheet_convention() {
        assert_eq!(excel_column_name(0), "A");
        assert_eq!(excel_column_name(25), "Z");
        assert_eq!(excel_column_name(26), "AA");
        assert_eq!(excel_column_name(27), "AB");
        assert_eq!(excel_column_name(51), "AZ");
        assert_eq!(excel_column_name(52), "BA");
        assert_eq!(excel_column_name(701), "ZZ");
        assert_eq!(excel_column_name(702), "AAA");
    }

    #[test]
    fn unnamed_columns_get_excel_defaults() {
        let layout = Layout::new(vec![
            ColumnDefinition::new("", ColumnType::Uint32),
            ColumnDefinition::new("", ColumnType::Bool),
        ])
        .unwrap();
        assert_eq!(layout.columns()[0].name, "A");
        assert_eq!(layout.columns()[1].name, "B");
    }

    #[test]
    fn names_are_trimmed_and_deduplicated() {
        let layout = Layout::new(vec![
            ColumnDefinition::new("Foo", ColumnType::Uint32),
            ColumnDefinition::new(" Foo ", ColumnType::Uint32),
            ColumnDefinition::new("Foo", ColumnType::Uint32),
        ])
        .unwrap();
        assert_eq!(layout.columns()[0].name, "Foo");
        assert_eq!(layout.columns()[1].name, "Foo.1");
        assert_eq!(layout.columns()[2].name, "Foo.2");
        assert_eq!(layout.find("Foo"), Some(0));
        assert_eq!(layout.find("Foo.1"), Some(1));
    }

    #[test]
    fn packed_offsets_skip_bool_and_string_columns() {
        let layout = Layout::new(vec![
            ColumnDefinition::new("a", ColumnType::Uint32),
            ColumnDefinition::new("b", ColumnType::Bool),
            ColumnDefinition::new("c", ColumnType::Double),
            ColumnDefinition::new("d", ColumnType::String),
        ])
        .unwrap();
        assert_eq!(layout.packed_offset(0), 0);
        assert_eq!(layout.packed_offset(2), 4);
        assert_eq!(layout.fixed_payload_size(), 12);
        assert_eq!(layout.bool_count(), 1);
        assert_eq!(layout.string_count(), 1);
    }
}
