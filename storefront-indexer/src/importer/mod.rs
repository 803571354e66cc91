//! Importer module: pages through an upstream source and writes every record.
//!
//! The page loop stops on an empty page, after a short page (fewer documents than
//! the page size), or after a single oversized page from a source that ignores the
//! page size. A full page moves on to the next one.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use storefront_indexer_shared::{document_id, Document, ImportCursor};
use storefront_sources::DocumentSource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::ImportError;
use crate::loader::DocumentWriter;
use crate::processor::{MapperRegistry, RecordMapper};

/// CMS entity types imported by `import cms`, in order.
pub const CMS_ENTITY_TYPES: [&str; 3] = ["cms_page", "cms_block", "cms_hierarchy"];

/// Knobs for one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub start_page: u32,
    pub page_size: u32,
    /// Write the records of a page concurrently.
    pub concurrent: bool,
    /// Upper bound on records in flight per page; the whole page when `None`.
    pub max_in_flight: Option<usize>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            start_page: 0,
            page_size: 25,
            concurrent: true,
            max_in_flight: None,
        }
    }
}

/// What an import run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub entity_type: String,
    pub pages_fetched: u32,
    pub documents_fetched: usize,
    pub records_written: usize,
}

impl ImportReport {
    fn new(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            ..Self::default()
        }
    }
}

/// Imports upstream collections into an index.
///
/// # Example
///
/// ```ignore
/// let importer = Importer::new(Arc::new(SearchLoader::new(provider)), MapperRegistry::with_defaults(), cancel);
/// let report = importer.import_all("category", source.as_ref(), "shop_4", &ImportOptions::default()).await?;
/// ```
pub struct Importer {
    writer: Arc<dyn DocumentWriter>,
    mappers: MapperRegistry,
    cancel: CancellationToken,
}

impl Importer {
    pub fn new(
        writer: Arc<dyn DocumentWriter>,
        mappers: MapperRegistry,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            writer,
            mappers,
            cancel,
        }
    }

    /// Import every page of `entity_type` from `source` into `target_index`.
    #[instrument(skip(self, source, options), fields(source = source.name()))]
    pub async fn import_all(
        &self,
        entity_type: &str,
        source: &dyn DocumentSource,
        target_index: &str,
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let mapper = self.mappers.mapper_for(entity_type);
        let mut cursor = ImportCursor::new(entity_type, options.start_page, options.page_size);
        let mut report = ImportReport::new(entity_type);

        info!(
            index = %target_index,
            start_page = options.start_page,
            page_size = options.page_size,
            concurrent = options.concurrent,
            "Starting import"
        );

        loop {
            if self.cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            let documents = source
                .get_documents(&cursor)
                .await
                .map_err(|e| ImportError::fetch(entity_type, cursor.page, e))?;
            report.pages_fetched += 1;

            let fetched = documents.len();
            report.documents_fetched += fetched;
            if fetched == 0 {
                debug!(page = cursor.page, "Empty page");
                break;
            }

            let written = if options.concurrent {
                self.cancellable(self.write_page_concurrent(
                    mapper.as_ref(),
                    target_index,
                    &cursor,
                    documents,
                    options.max_in_flight,
                ))
                .await?
            } else {
                self.cancellable(self.write_page_sequential(
                    mapper.as_ref(),
                    target_index,
                    &cursor,
                    documents,
                ))
                .await?
            };
            report.records_written += written;

            let page_size = cursor.page_size as usize;
            info!(page = cursor.page, documents = fetched, records = written, "Page imported");

            if fetched < page_size {
                break;
            }
            if fetched > page_size {
                warn!(
                    page = cursor.page,
                    documents = fetched,
                    page_size,
                    "Source returned more documents than the page size; not paginating"
                );
                break;
            }
            cursor = cursor.next_page();
        }

        info!(
            index = %target_index,
            pages = report.pages_fetched,
            documents = report.documents_fetched,
            records = report.records_written,
            "Import finished"
        );
        Ok(report)
    }

    /// Import several entity types one after another, stopping at the first failure.
    pub async fn import_sequence(
        &self,
        entity_types: &[&str],
        source: &dyn DocumentSource,
        target_index: &str,
        options: &ImportOptions,
    ) -> Result<Vec<ImportReport>, ImportError> {
        let mut reports = Vec::with_capacity(entity_types.len());
        for entity_type in entity_types {
            reports.push(
                self.import_all(entity_type, source, target_index, options)
                    .await?,
            );
        }
        Ok(reports)
    }

    async fn cancellable<T, F>(&self, operation: F) -> Result<T, ImportError>
    where
        F: Future<Output = Result<T, ImportError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ImportError::Cancelled),
            result = operation => result,
        }
    }

    /// Map and write one record at a time; the first failure ends the page.
    async fn write_page_sequential(
        &self,
        mapper: &dyn RecordMapper,
        index: &str,
        cursor: &ImportCursor,
        documents: Vec<Document>,
    ) -> Result<usize, ImportError> {
        let mut written = 0;
        for document in documents {
            let records = mapper
                .map(document)
                .await
                .map_err(|e| ImportError::mapper(&cursor.entity_type, cursor.page, e))?;
            for record in records {
                self.write_record(index, cursor, &record).await?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Map and write with bounded concurrency. Every write settles before the page
    /// result is decided, and any failure fails the page.
    async fn write_page_concurrent(
        &self,
        mapper: &dyn RecordMapper,
        index: &str,
        cursor: &ImportCursor,
        documents: Vec<Document>,
        max_in_flight: Option<usize>,
    ) -> Result<usize, ImportError> {
        let mut failures: Vec<ImportError> = Vec::new();
        let mut attempted = 0;

        let limit = max_in_flight.unwrap_or(documents.len()).max(1);
        let mapped: Vec<_> = stream::iter(documents)
            .map(|document| mapper.map(document))
            .buffered(limit)
            .collect()
            .await;

        let mut records = Vec::new();
        for result in mapped {
            match result {
                Ok(mut batch) => records.append(&mut batch),
                Err(e) => {
                    attempted += 1;
                    failures.push(ImportError::mapper(&cursor.entity_type, cursor.page, e));
                }
            }
        }

        let limit = max_in_flight.unwrap_or(records.len()).max(1);
        attempted += records.len();
        let results: Vec<Result<(), ImportError>> = stream::iter(records.iter())
            .map(|record| self.write_record(index, cursor, record))
            .buffered(limit)
            .collect()
            .await;

        let mut written = 0;
        for result in results {
            match result {
                Ok(()) => written += 1,
                Err(ImportError::Cancelled) => return Err(ImportError::Cancelled),
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            return Ok(written);
        }

        let failed = failures.len();
        let first_error = failures.swap_remove(0);
        error!(
            page = cursor.page,
            failed,
            attempted,
            first_error = %first_error,
            "Page failed"
        );
        Err(ImportError::PageFailed {
            entity_type: cursor.entity_type.clone(),
            page: cursor.page,
            failed,
            attempted,
            first_error: Box::new(first_error),
        })
    }

    async fn write_record(
        &self,
        index: &str,
        cursor: &ImportCursor,
        record: &Document,
    ) -> Result<(), ImportError> {
        self.writer
            .write(index, &cursor.entity_type, record)
            .await
            .map_err(|e| {
                ImportError::write(
                    &cursor.entity_type,
                    cursor.page,
                    document_id(&cursor.entity_type, record),
                    e,
                )
            })
    }
}
