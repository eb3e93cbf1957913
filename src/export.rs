//! Export Orchestrator
//!
//! Walks customers, their domains and each domain's DNS records in strict
//! sequence, feeding address records through the [`RowFilter`] into a
//! [`CsvRotator`].
//!
//! Fetch failures are scoped: a customer or domain whose call fails counts as
//! having no data and the run moves on. Anything that fails on the file side
//! aborts the run and leaves already-written files where they are.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::error::{ExportError, Result};
use crate::filter::{RowFilter, Verdict};
use crate::variomedia::{Customer, VariomediaApi};
use crate::writer::{CsvRotator, ExportedFile};

/// Parameters for a single export run.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Directory the CSV files are written to.
    pub directory: PathBuf,
    /// Base name such as `export.csv`; files become `export_<n>.csv`.
    pub base_filename: String,
    /// Data rows per file before rotating.
    pub max_rows: u64,
    /// Courtesy pause between customers.
    pub pause: Duration,
    /// Notified to cut a running pause short. The run itself continues.
    pub interrupt: Arc<Notify>,
}

/// Counters and output files of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub files: Vec<ExportedFile>,
    pub customers: u64,
    pub domains: u64,
    pub empty_domains: u64,
    pub failed_fetches: u64,
    pub records: u64,
    pub rows_written: u64,
    pub duplicates: u64,
    pub non_address_records: u64,
}

/// Run one export with `api` as the data source.
pub async fn run_export(api: &dyn VariomediaApi, request: &ExportRequest) -> Result<ExportReport> {
    ExportRun::new(api, request)?.run().await
}

/// Create `dir` (and parents) unless it already exists.
pub fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    info!(path = %dir.display(), "📁 Created export directory");
    Ok(())
}

/// State of one export run: the dedup set and the counters.
///
/// Nothing here is shared between runs.
pub struct ExportRun<'a> {
    api: &'a dyn VariomediaApi,
    request: &'a ExportRequest,
    filter: RowFilter,
    report: ExportReport,
}

impl<'a> ExportRun<'a> {
    pub fn new(api: &'a dyn VariomediaApi, request: &'a ExportRequest) -> Result<Self> {
        if request.max_rows == 0 {
            return Err(ExportError::Config(
                "max rows per file must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api,
            request,
            filter: RowFilter::new(),
            report: ExportReport::default(),
        })
    }

    pub async fn run(mut self) -> Result<ExportReport> {
        info!(
            directory = %self.request.directory.display(),
            base_filename = %self.request.base_filename,
            max_rows = self.request.max_rows,
            "📂 Starting CSV generation"
        );

        let customers = match self.api.list_customers().await {
            Ok(customers) => customers,
            Err(e) if e.is_fetch_error() => {
                error!(error = %e, "Failed to list customers");
                self.report.failed_fetches += 1;
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        if customers.is_empty() {
            info!("No customers found, nothing to export");
            return Ok(self.report);
        }

        let mut writer = CsvRotator::open(
            &self.request.directory,
            &self.request.base_filename,
            1,
        )?;

        for (position, customer) in customers.iter().enumerate() {
            if position > 0 {
                pause(self.request.pause, &self.request.interrupt).await;
            }

            self.report.customers += 1;
            info!(
                customer_id = %customer.id,
                customer_name = %customer.name,
                "✔ Processing customer"
            );

            self.export_customer(customer, &mut writer).await?;
        }

        self.report.files = writer.finish()?;

        info!(
            files = self.report.files.len(),
            customers = self.report.customers,
            domains = self.report.domains,
            rows = self.report.rows_written,
            duplicates = self.report.duplicates,
            failed_fetches = self.report.failed_fetches,
            "📂 All CSV files generated"
        );

        Ok(self.report)
    }

    async fn export_customer(
        &mut self,
        customer: &Customer,
        writer: &mut CsvRotator,
    ) -> Result<()> {
        let domains = match self.api.list_domains(&customer.id).await {
            Ok(domains) => domains,
            Err(e) if e.is_fetch_error() => {
                warn!(customer_id = %customer.id, error = %e, "Failed to list domains, skipping customer");
                self.report.failed_fetches += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if domains.is_empty() {
            info!(customer_id = %customer.id, "Customer has no domains");
            return Ok(());
        }

        for domain in &domains {
            if domain.name.is_empty() {
                debug!(customer_id = %customer.id, "Skipping domain with empty name");
                self.report.empty_domains += 1;
                continue;
            }

            self.report.domains += 1;
            debug!(domain = %domain.name, "Fetching DNS records");

            let records = match self.api.list_dns_records(&domain.name).await {
                Ok(records) => records,
                Err(e) if e.is_fetch_error() => {
                    warn!(domain = %domain.name, error = %e, "Failed to fetch DNS records, skipping domain");
                    self.report.failed_fetches += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if records.is_empty() {
                info!(domain = %domain.name, "Domain has no DNS records");
                continue;
            }

            for record in &records {
                self.report.records += 1;
                match self.filter.accept(record, customer) {
                    Verdict::Accepted(row) => {
                        writer.write_row(&row)?;
                        self.report.rows_written += 1;
                        writer.rotate_if_needed(self.request.max_rows)?;
                    }
                    Verdict::Duplicate => self.report.duplicates += 1,
                    Verdict::NotAddressRecord => self.report.non_address_records += 1,
                }
            }
        }

        Ok(())
    }
}

/// Sleep between customers unless `interrupt` fires first.
async fn pause(duration: Duration, interrupt: &Notify) {
    if duration.is_zero() {
        return;
    }

    tokio::select! {
        () = tokio::time::sleep(duration) => {}
        () = interrupt.notified() => {
            warn!("⚠ Pause between customers interrupted, continuing export");
        }
    }
}
