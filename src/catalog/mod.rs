//! Catalog ETL: workbook sheets in, embedding-ready records out.

mod records;
pub mod table;
pub mod types;
pub mod workbook;

pub use records::{build_record_batch, build_records, describe_offering, merge_catalog};
pub use table::Table;
pub use types::{CatalogError, CatalogRecord, OfferingMetadata, PLACEHOLDER, RecordBatch};
pub use workbook::{
    COLLEGES_SHEET, OFFERINGS_SHEET, PROGRAMS_SHEET, RESOURCES_SHEET, SCHOLARSHIPS_SHEET, Workbook,
};
