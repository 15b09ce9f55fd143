//! Spreadsheet loading for the catalog sheets.

use super::{
    table::{Table, normalize_cell},
    types::CatalogError,
};
use calamine::{Data, Reader, open_workbook_auto};
use std::collections::BTreeMap;
use std::path::Path;

/// Sheet holding one row per college.
pub const COLLEGES_SHEET: &str = "LIST OF COLLEGES";
/// Sheet holding one row per program.
pub const PROGRAMS_SHEET: &str = "PROGRAMS table";
/// Junction sheet pairing colleges with the programs they offer.
pub const OFFERINGS_SHEET: &str = "COLLEGE_PROGRAMS_junction";
/// Sheet of online resources keyed by program.
pub const RESOURCES_SHEET: &str = "ONLINE RESOURCES table";
/// Sheet of scholarships keyed by school.
pub const SCHOLARSHIPS_SHEET: &str = "SCHOOL_SCHOLARSHIPS table";

/// Every sheet of a workbook, keyed by sheet name.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: BTreeMap<String, Table>,
}

impl Workbook {
    /// Read every worksheet of an `.xlsx`/`.xls`/`.ods` file; the first row of each is the header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let workbook_error = |message: String| CatalogError::Workbook {
            path: path.display().to_string(),
            message,
        };

        let mut reader = open_workbook_auto(path).map_err(|err| workbook_error(err.to_string()))?;
        let mut workbook = Workbook::default();
        for name in reader.sheet_names() {
            let range = reader
                .worksheet_range(&name)
                .map_err(|err| workbook_error(format!("sheet '{name}': {err}")))?;
            let mut rows = range.rows();
            let columns = rows
                .next()
                .map(|header| {
                    header
                        .iter()
                        .map(|cell| cell_to_string(cell).unwrap_or_default())
                        .collect()
                })
                .unwrap_or_default();
            let body = rows
                .map(|row| row.iter().map(cell_to_string).collect())
                .collect();
            workbook.insert(Table::new(name.clone(), columns, body));
        }

        tracing::info!(
            path = %path.display(),
            sheets = ?workbook.sheet_names().collect::<Vec<_>>(),
            "Workbook loaded"
        );
        Ok(workbook)
    }

    /// Build a workbook from already-parsed tables, keyed by their names.
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut workbook = Workbook::default();
        for table in tables {
            workbook.insert(table);
        }
        workbook
    }

    /// Add or replace a sheet.
    pub fn insert(&mut self, table: Table) {
        self.sheets.insert(table.name().to_string(), table);
    }

    /// Names of the loaded sheets, sorted.
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    /// Fetch a sheet or fail with [`CatalogError::MissingSheet`].
    pub fn sheet(&self, name: &str) -> Result<&Table, CatalogError> {
        self.sheets
            .get(name)
            .ok_or_else(|| CatalogError::MissingSheet(name.to_string()))
    }
}

/// Render a spreadsheet cell as text, `None` for blanks and error cells.
///
/// Whole-number floats drop their fractional part so numeric ids join against textual ones.
pub(crate) fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(text) => normalize_cell(text.clone()),
        Data::Int(value) => Some(value.to_string()),
        Data::Float(value) => Some(format_float(*value)),
        Data::Bool(value) => Some(if *value { "TRUE" } else { "FALSE" }.to_string()),
        other => normalize_cell(other.to_string()),
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
