use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use roadmap_rag::{
    catalog::{Workbook, build_record_batch},
    config, logging,
    ingest::CatalogIngestor,
    store::QdrantCatalogStore,
};

#[derive(Parser)]
#[command(
    name = "ingest-catalog",
    about = "Load the college and program workbook into the vector store"
)]
struct Cli {
    /// Workbook to read; defaults to CATALOG_WORKBOOK_PATH.
    #[arg(long)]
    workbook: Option<PathBuf>,
    /// Target collection; defaults to QDRANT_COLLECTION_NAME.
    #[arg(long)]
    collection: Option<String>,
    /// Build the records and report them without touching the store.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing("ingest-catalog");

    let path = cli
        .workbook
        .unwrap_or_else(|| PathBuf::from(&config::get_config().catalog_workbook_path));
    let workbook = Workbook::open(&path)
        .with_context(|| format!("Failed to read workbook {}", path.display()))?;
    let batch = build_record_batch(&workbook).context("Failed to build catalog records")?;

    if cli.dry_run {
        println!("{} records prepared from {}", batch.len(), path.display());
        if let Some((id, document, _)) = batch.iter().next() {
            println!("first record {id}:\n{document}");
        }
        return Ok(());
    }

    let store = QdrantCatalogStore::connect(cli.collection)
        .await
        .context("Failed to connect to the catalog store")?;
    let collection = store.collection().to_string();
    let summary = CatalogIngestor::new(Arc::new(store))
        .ingest_batch(&batch)
        .await
        .context("Ingestion failed")?;

    println!(
        "{} records upserted into '{}' ({} prepared)",
        summary.upserted, collection, summary.records
    );
    Ok(())
}
