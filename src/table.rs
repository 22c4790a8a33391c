use crate::error::RenderError;
use crate::vertex::{AssayId, ItemKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column-group colour tag shown in the top header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Source,
    Sample,
    Process,
    Material,
    Data,
}

impl From<ItemKind> for Category {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Source => Category::Source,
            ItemKind::Sample => Category::Sample,
            ItemKind::Material => Category::Material,
            ItemKind::Data => Category::Data,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderType {
    Name,
    Protocol,
    ExtractLabel,
    Characteristics,
    FactorValues,
    ParameterValues,
    Performer,
    PerformDate,
    Comments,
}

impl HeaderType {
    /// Attribute of the vertex the column's values are read from.
    pub fn attribute(&self) -> &'static str {
        match self {
            HeaderType::Name => "name",
            HeaderType::Protocol => "protocol",
            HeaderType::ExtractLabel => "extract_label",
            HeaderType::Characteristics => "characteristics",
            HeaderType::FactorValues => "factor_values",
            HeaderType::ParameterValues => "parameter_values",
            HeaderType::Performer => "performer",
            HeaderType::PerformDate => "perform_date",
            HeaderType::Comments => "comments",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Plain,
    Name,
    Protocol,
    Ontology,
    Unit,
    Contact,
    Date,
    LinkFile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjClass {
    Material,
    Process,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopHeader {
    pub value: String,
    pub category: Category,
    pub colspan: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldHeader {
    /// Display label.
    pub value: String,
    /// Attribute key: characteristic/parameter/comment name, or the fixed
    /// label of name, protocol and process detail columns.
    pub name: String,
    pub header_type: HeaderType,
    pub obj_cls: ObjClass,
    pub item_type: Category,
    pub col_type: ColumnType,
    pub num_col: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: Option<String>,
    pub unit: Option<String>,
    pub repeat: bool,
    pub link: Option<String>,
    pub tooltip: Option<String>,
    pub attrs: BTreeMap<String, String>,
}

impl Cell {
    /// Empty text becomes no value.
    pub fn text<S: AsRef<str>>(value: Option<S>) -> Self {
        Cell {
            value: value
                .map(|v| v.as_ref().to_string())
                .filter(|v| !v.is_empty()),
            ..Cell::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedTable {
    pub top_header: Vec<TopHeader>,
    pub field_header: Vec<FieldHeader>,
    pub table_data: Vec<Vec<Cell>>,
}

impl RenderedTable {
    pub fn is_empty(&self) -> bool {
        self.table_data.is_empty()
    }

    /// Index of the SAMPLE group in `top_header`.
    pub fn sample_group(&self) -> Option<usize> {
        self.top_header
            .iter()
            .position(|h| h.category == Category::Sample)
    }

    /// First field column of each top-header group.
    pub fn group_offsets(&self) -> Vec<usize> {
        let mut offset = 0;
        self.top_header
            .iter()
            .map(|h| {
                let start = offset;
                offset += h.colspan;
                start
            })
            .collect()
    }

    /// Field columns up to and including the SAMPLE group.
    pub fn sample_prefix_len(&self) -> Option<usize> {
        let group = self.sample_group()?;
        Some(self.top_header[..=group].iter().map(|h| h.colspan).sum())
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.table_data.iter().filter_map(move |row| row.get(index))
    }
}

/// Numeric cell text. `NaN` and infinities do not count as numbers.
pub(crate) fn finite_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Study table plus one table per assay, keyed by assay id in study order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyTables {
    pub study: RenderedTable,
    pub assays: IndexMap<AssayId, RenderedTable>,
}

/// Identity of a column independent of any row's values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub category: Category,
    pub header_type: HeaderType,
    pub name: String,
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}/{}", self.category, self.header_type.attribute(), self.name)
    }
}

/// Column sequence taken from a table's first row; every other row of the
/// table must match it exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowSchema {
    table: String,
    columns: Vec<ColumnKey>,
}

impl RowSchema {
    pub fn new(table: &str, columns: Vec<ColumnKey>) -> Self {
        RowSchema {
            table: table.to_string(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn validate(&self, row: usize, columns: &[ColumnKey]) -> Result<(), RenderError> {
        if columns.len() != self.columns.len() {
            return Err(RenderError::ShapeMismatch {
                table: self.table.clone(),
                row,
                expected: self.columns.len(),
                found: columns.len(),
            });
        }
        for (i, (expected, found)) in self.columns.iter().zip(columns).enumerate() {
            if expected != found {
                return Err(RenderError::ColumnMismatch {
                    table: self.table.clone(),
                    row,
                    column: i,
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
        }
        Ok(())
    }
}
