//! Result table output port.

use crate::domain::error::KrxError;
use crate::domain::projection::ResultRow;
use std::path::Path;

/// Port for writing a projected result table.
pub trait ReportPort {
    fn write(&self, rows: &[ResultRow], output_path: &Path) -> Result<(), KrxError>;
}
