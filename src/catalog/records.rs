//! Denormalize the catalog sheets and synthesize embedding records.

use super::{
    table::Table,
    types::{CatalogError, CatalogRecord, OfferingMetadata, PLACEHOLDER, RecordBatch},
    workbook::{
        COLLEGES_SHEET, OFFERINGS_SHEET, PROGRAMS_SHEET, RESOURCES_SHEET, SCHOLARSHIPS_SHEET,
        Workbook,
    },
};
use std::cmp::Ordering;

const SCHOOL_KEY: &str = "SCHOOL_ID";
const PROGRAM_KEY: &str = "PROGRAM_ID";
const MERGED_TABLE: &str = "merged catalog";
const ID_PREFIX: &str = "school_program_offering_";

/// Left-join offerings with colleges, programs, resources and scholarships.
///
/// All five sheets are fetched before any join so a missing sheet fails first.
pub fn merge_catalog(workbook: &Workbook) -> Result<Table, CatalogError> {
    let offerings = workbook.sheet(OFFERINGS_SHEET)?;
    let colleges = workbook.sheet(COLLEGES_SHEET)?;
    let programs = workbook.sheet(PROGRAMS_SHEET)?;
    let resources = workbook.sheet(RESOURCES_SHEET)?;
    let scholarships = workbook.sheet(SCHOLARSHIPS_SHEET)?;

    let merged = offerings
        .left_join(colleges, SCHOOL_KEY)?
        .left_join(programs, PROGRAM_KEY)?
        .left_join(resources, PROGRAM_KEY)?
        .left_join(scholarships, SCHOOL_KEY)?;

    tracing::info!(
        offerings = offerings.rows().len(),
        merged = merged.rows().len(),
        "Catalog sheets merged"
    );
    Ok(merged)
}

/// Merge the workbook and turn every surviving row into a [`CatalogRecord`].
///
/// Rows are stably ordered by `(school_id, program_id)` before ids are assigned, so the same
/// workbook always yields the same ids.
pub fn build_records(workbook: &Workbook) -> Result<Vec<CatalogRecord>, CatalogError> {
    let merged = merge_catalog(workbook)?;
    let columns = ColumnMap::resolve(&merged)?;

    let mut rows: Vec<(OfferingMetadata, String)> = merged
        .rows()
        .iter()
        .map(|row| (columns.metadata(row), columns.website(row)))
        .collect();
    rows.sort_by(|(a, _), (b, _)| {
        compare_keys(&a.school_id, &b.school_id)
            .then_with(|| compare_keys(&a.program_id, &b.program_id))
    });

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(n, (metadata, website))| CatalogRecord {
            id: format!("{ID_PREFIX}{n}"),
            document: describe_offering(&metadata, &website),
            metadata,
        })
        .collect())
}

/// Build the records and pack them into parallel documents, metadatas and ids.
pub fn build_record_batch(workbook: &Workbook) -> Result<RecordBatch, CatalogError> {
    build_records(workbook).map(RecordBatch::from_iter)
}

/// The fixed sentence embedded for each offering.
pub fn describe_offering(metadata: &OfferingMetadata, website_address: &str) -> String {
    format!(
        "The {} ({} college) located in {}, {} offers the {} program. Their website is {}.",
        metadata.institution_name,
        metadata.institution_type,
        metadata.municipality,
        metadata.province,
        metadata.program_name,
        website_address,
    )
}

/// Positions of the fields record synthesis reads from a merged row.
struct ColumnMap {
    school_id: usize,
    program_id: usize,
    institution_name: usize,
    institution_type: usize,
    municipality: usize,
    province: usize,
    website_address: usize,
    program_name: usize,
    resource_name: usize,
    resource_link: usize,
    resource_types: usize,
    dost_eligibility: usize,
}

impl ColumnMap {
    fn resolve(merged: &Table) -> Result<Self, CatalogError> {
        let find = |column: &str| -> Result<usize, CatalogError> {
            merged
                .column_index(column)
                .or_else(|| merged.column_index(&format!("{column}_x")))
                .ok_or_else(|| CatalogError::MissingColumn {
                    table: MERGED_TABLE.to_string(),
                    column: column.to_string(),
                })
        };

        Ok(Self {
            school_id: find(SCHOOL_KEY)?,
            program_id: find(PROGRAM_KEY)?,
            institution_name: find("INSTITUTION_NAME")?,
            institution_type: find("INSTITUTION_TYPE")?,
            municipality: find("MUNICIPALITY")?,
            province: find("PROVINCE")?,
            website_address: find("WEBSITE_ADDRESS")?,
            program_name: find("PROGRAM_NAME")?,
            resource_name: find("RESOURCE_NAME")?,
            resource_link: find("LINK")?,
            resource_types: find("TYPE")?,
            dost_eligibility: find("DOST_ELIGIBLE")?,
        })
    }

    fn metadata(&self, row: &[Option<String>]) -> OfferingMetadata {
        OfferingMetadata {
            school_id: value_or_placeholder(row, self.school_id),
            program_id: value_or_placeholder(row, self.program_id),
            institution_name: value_or_placeholder(row, self.institution_name),
            institution_type: value_or_placeholder(row, self.institution_type),
            province: value_or_placeholder(row, self.province),
            municipality: value_or_placeholder(row, self.municipality),
            program_name: value_or_placeholder(row, self.program_name),
            resource_name: value_or_placeholder(row, self.resource_name),
            resource_link: value_or_placeholder(row, self.resource_link),
            resource_types: value_or_placeholder(row, self.resource_types),
            dost_eligibility: value_or_placeholder(row, self.dost_eligibility),
        }
    }

    fn website(&self, row: &[Option<String>]) -> String {
        value_or_placeholder(row, self.website_address)
    }
}

fn value_or_placeholder(row: &[Option<String>], idx: usize) -> String {
    row.get(idx)
        .and_then(Option::as_deref)
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

/// Compare join keys numerically when both are integers, textually otherwise.
fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn colleges() -> Table {
        Table::from_literal(
            COLLEGES_SHEET,
            &[
                "SCHOOL_ID",
                "INSTITUTION_NAME",
                "INSTITUTION_TYPE",
                "MUNICIPALITY",
                "PROVINCE",
                "WEBSITE_ADDRESS",
            ],
            &[
                &["1", "Test U", "Public", "Cebu City", "Cebu", ""],
                &["2", "Coast College", "Private", "Mandaue", "Cebu", "coast.edu.ph"],
            ],
        )
    }

    fn programs() -> Table {
        Table::from_literal(
            PROGRAMS_SHEET,
            &["PROGRAM_ID", "PROGRAM_NAME"],
            &[&["1", "BS CS"], &["2", "BS IT"]],
        )
    }

    fn empty_resources() -> Table {
        Table::from_literal(
            RESOURCES_SHEET,
            &["PROGRAM_ID", "RESOURCE_NAME", "LINK", "TYPE"],
            &[],
        )
    }

    fn empty_scholarships() -> Table {
        Table::from_literal(
            SCHOLARSHIPS_SHEET,
            &["SCHOOL_ID", "PROGRAM_ID", "DOST_ELIGIBLE"],
            &[],
        )
    }

    fn workbook(offerings: &[&[&str]], resources: Table, scholarships: Table) -> Workbook {
        Workbook::from_tables([
            colleges(),
            programs(),
            Table::from_literal(OFFERINGS_SHEET, &["SCHOOL_ID", "PROGRAM_ID"], offerings),
            resources,
            scholarships,
        ])
    }

    #[test]
    fn lone_offering_yields_one_placeholder_record() {
        let workbook = workbook(&[&["1", "1"]], empty_resources(), empty_scholarships());

        let records = build_records(&workbook).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "school_program_offering_0");
        assert_eq!(
            record.document,
            "The Test U (Public college) located in Cebu City, Cebu offers the BS CS program. \
             Their website is N/A."
        );
        assert_eq!(record.metadata.school_id, "1");
        assert_eq!(record.metadata.program_id, "1");
        assert_eq!(record.metadata.resource_name, PLACEHOLDER);
        assert_eq!(record.metadata.resource_link, PLACEHOLDER);
        assert_eq!(record.metadata.resource_types, PLACEHOLDER);
        assert_eq!(record.metadata.dost_eligibility, PLACEHOLDER);
    }

    #[test]
    fn resources_and_scholarships_fan_out() {
        let resources = Table::from_literal(
            RESOURCES_SHEET,
            &["PROGRAM_ID", "RESOURCE_NAME", "LINK", "TYPE"],
            &[
                &["1", "CS50", "https://cs50.harvard.edu", "Course"],
                &["1", "Khan Academy", "https://khanacademy.org", "Video"],
            ],
        );
        let scholarships = Table::from_literal(
            SCHOLARSHIPS_SHEET,
            &["SCHOOL_ID", "PROGRAM_ID", "DOST_ELIGIBLE"],
            &[&["2", "2", "Yes"]],
        );
        let workbook = workbook(&[&["2", "1"], &["1", "2"]], resources, scholarships);

        let batch = build_record_batch(&workbook).unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.documents.len(), batch.metadatas.len());
        assert_eq!(batch.ids.len(), batch.metadatas.len());
        let unique: HashSet<_> = batch.ids.iter().collect();
        assert_eq!(unique.len(), batch.ids.len());

        // school 1 sorts first even though its offering came second
        assert_eq!(batch.metadatas[0].school_id, "1");
        assert_eq!(batch.metadatas[0].resource_name, PLACEHOLDER);
        assert_eq!(batch.metadatas[1].resource_name, "CS50");
        assert_eq!(batch.metadatas[2].resource_name, "Khan Academy");
        assert_eq!(batch.metadatas[1].dost_eligibility, "Yes");
        assert_eq!(batch.metadatas[1].program_id, "1");
        assert!(batch.documents[1].ends_with("Their website is coast.edu.ph."));
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let build = || {
            build_record_batch(&workbook(
                &[&["2", "2"], &["1", "1"], &["2", "1"]],
                empty_resources(),
                empty_scholarships(),
            ))
            .unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn numeric_keys_sort_numerically() {
        assert_eq!(compare_keys("9", "10"), Ordering::Less);
        assert_eq!(compare_keys("10", "abc"), Ordering::Less);
        assert_eq!(compare_keys("b", "a"), Ordering::Greater);
    }

    #[test]
    fn unknown_school_is_kept_with_placeholders() {
        let workbook = workbook(&[&["42", "1"]], empty_resources(), empty_scholarships());

        let records = build_records(&workbook).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.institution_name, PLACEHOLDER);
        assert_eq!(records[0].metadata.program_name, "BS CS");
    }

    #[test]
    fn missing_sheet_aborts() {
        let workbook = Workbook::from_tables([colleges(), programs()]);

        let error = build_records(&workbook).unwrap_err();

        assert!(matches!(error, CatalogError::MissingSheet(ref name) if name == OFFERINGS_SHEET));
    }

    #[test]
    fn missing_column_after_merge_aborts() {
        let scholarships = Table::from_literal(SCHOLARSHIPS_SHEET, &["SCHOOL_ID"], &[]);
        let workbook = workbook(&[&["1", "1"]], empty_resources(), scholarships);

        let error = build_records(&workbook).unwrap_err();

        assert!(matches!(
            error,
            CatalogError::MissingColumn { ref table, ref column }
                if table == MERGED_TABLE && column == "DOST_ELIGIBLE"
        ));
    }
}
