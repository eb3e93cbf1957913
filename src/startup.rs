//! One-shot export run at process start.

use tracing::{error, info};

use crate::config::ExportSettings;
use crate::error::Result;
use crate::export::{ensure_directory, run_export, ExportReport};
use crate::variomedia::VariomediaApi;

/// Create the export directory, then run a single export.
///
/// A directory that cannot be created aborts before any upstream call.
pub async fn run_startup_export(
    api: &dyn VariomediaApi,
    settings: &ExportSettings,
) -> Result<ExportReport> {
    info!("🔄 Starting startup CSV export");

    if let Err(e) = ensure_directory(&settings.export_path) {
        error!(
            path = %settings.export_path.display(),
            error = %e,
            "❌ Could not create export directory"
        );
        return Err(e);
    }

    let request = settings.request(settings.export_filename.clone());
    let report = run_export(api, &request).await.inspect_err(|e| {
        error!(error = %e, "❌ Startup CSV export failed");
    })?;

    if report.files.is_empty() {
        info!("Startup CSV export produced no files");
    }
    for file in &report.files {
        info!(
            path = %file.path.display(),
            rows = file.rows,
            "✅ CSV export finished, file saved"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variomedia::{Customer, DnsRecord, Domain};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    struct OneRecord;

    #[async_trait]
    impl VariomediaApi for OneRecord {
        async fn list_customers(&self) -> Result<Vec<Customer>> {
            Ok(vec![Customer {
                id: "7".to_string(),
                name: "Sieben AG".to_string(),
            }])
        }

        async fn list_domains(&self, _customer_id: &str) -> Result<Vec<Domain>> {
            Ok(vec![Domain {
                name: "sieben.de".to_string(),
            }])
        }

        async fn list_dns_records(&self, domain: &str) -> Result<Vec<DnsRecord>> {
            Ok(vec![DnsRecord {
                record_type: "A".to_string(),
                fqdn: domain.to_string(),
                domain: domain.to_string(),
                data: "198.51.100.7".to_string(),
                ..Default::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_creates_directory_and_numbers_after_existing_files() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("exports");
        let settings =
            ExportSettings::new(dir.clone(), "dns.csv".to_string(), 100, Duration::ZERO).unwrap();

        let first = run_startup_export(&OneRecord, &settings).await.unwrap();
        let second = run_startup_export(&OneRecord, &settings).await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(first.files[0].file_name(), "dns_1.csv");
        assert_eq!(second.files[0].file_name(), "dns_2.csv");
        assert_eq!(second.files[0].rows, 1);
    }

    #[tokio::test]
    async fn test_directory_failure_aborts() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let settings = ExportSettings::new(
            blocker.join("exports"),
            "dns.csv".to_string(),
            100,
            Duration::ZERO,
        )
        .unwrap();

        assert!(run_startup_export(&OneRecord, &settings).await.is_err());
    }
}
