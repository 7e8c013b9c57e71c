use super::TableExporter;
use crate::error::Result;

/// Writes tables as RFC 4180 CSV.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableExporter;

impl TableExporter for CsvTableExporter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn export(&self, rows: &[Vec<String>]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for row in rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| crate::Error::ExtractionFailed(format!("csv flush failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_quotes_fields() {
        let rows = vec![
            vec!["Name".to_string(), "Note".to_string()],
            vec!["a".to_string(), "x, \"y\"".to_string()],
        ];
        let bytes = CsvTableExporter.export(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "Name,Note\na,\"x, \"\"y\"\"\"\n");
    }

    #[test]
    fn test_ragged_rows_allowed() {
        let rows = vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]];
        assert!(CsvTableExporter.export(&rows).is_ok());
    }
}
