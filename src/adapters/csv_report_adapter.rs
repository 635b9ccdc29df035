//! CSV result-table writer implementing ReportPort.

use std::path::Path;

use crate::domain::error::KrxError;
use crate::domain::projection::ResultRow;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, rows: &[ResultRow], output_path: &Path) -> Result<(), KrxError> {
        let mut writer = csv::Writer::from_path(output_path).map_err(|e| KrxError::Report {
            reason: format!("failed to create {}: {}", output_path.display(), e),
        })?;

        for row in rows {
            writer.serialize(row).map_err(|e| KrxError::Report {
                reason: e.to_string(),
            })?;
        }
        writer.flush()?;

        tracing::info!(path = %output_path.display(), rows = rows.len(), "wrote result table");
        Ok(())
    }
}
