//! Dual-path dataset fetch: CSV export first, script endpoint second.
//!
//! The export path is fast and needs no auth but breaks on sheets whose
//! rows are wider than their header. The script path is slower (cold
//! starts) but authoritative. Both paths end in [`reconcile`].

use crate::rpc::RpcClient;
use crate::transport::{with_timeout, HttpTransport};
use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tutorsheet_core::{
    new_local_id, normalize_key, parse_delimited, reconcile, ConfigError, DatasetKey, Fields,
    Record, ResponseError, RowPosition, SheetError, SheetResult,
};
use tutorsheet_storage::DatasetFetcher;

pub const DEFAULT_EXPORT_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";

/// Timeouts for export-path requests.
#[derive(Debug, Clone, Copy)]
pub struct ExportTimeouts {
    /// Full dataset download.
    pub dataset: Duration,
    /// Download for a column option list.
    pub options: Duration,
}

impl Default for ExportTimeouts {
    fn default() -> Self {
        Self {
            dataset: Duration::from_secs(12),
            options: Duration::from_secs(10),
        }
    }
}

/// Fetches datasets over the export path with script-endpoint fallback.
#[derive(Clone)]
pub struct DualSourceFetcher {
    transport: Arc<dyn HttpTransport>,
    rpc: RpcClient,
    export_base_url: String,
    timeouts: ExportTimeouts,
}

impl DualSourceFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        rpc: RpcClient,
        export_base_url: impl Into<String>,
        timeouts: ExportTimeouts,
    ) -> Self {
        Self {
            transport,
            rpc,
            export_base_url: export_base_url.into().trim_end_matches('/').to_string(),
            timeouts,
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// CSV export URL of a dataset's sheet.
    pub fn export_url(&self, key: DatasetKey) -> SheetResult<String> {
        let source = key.source();
        let mut url = self.parse_base(&format!("{}/gviz/tq", source.spreadsheet_id))?;
        url.query_pairs_mut()
            .append_pair("tqx", "out:csv")
            .append_pair("sheet", source.sheet);
        Ok(url.to_string())
    }

    /// Human-facing URL of the spreadsheet holding a dataset.
    pub fn spreadsheet_url(&self, key: DatasetKey) -> String {
        format!("{}/{}/edit", self.export_base_url, key.source().spreadsheet_id)
    }

    /// Fetch, trying both paths. `Err` only when neither produced rows.
    pub async fn try_fetch(&self, key: DatasetKey) -> SheetResult<Vec<Record>> {
        match self.fetch_export(key).await {
            Ok(records) if !records.is_empty() => {
                info!(dataset = %key, rows = records.len(), path = "export", "dataset fetched");
                return Ok(reconcile(key, records));
            }
            Ok(_) => debug!(dataset = %key, "export path returned no rows"),
            Err(err) => warn!(dataset = %key, error = %err, "export path failed"),
        }

        if !self.rpc.is_configured() {
            debug!(dataset = %key, "script endpoint not configured, no fallback");
            return Err(SheetError::NoUsableRows(key));
        }

        match self.rpc.read(key).await {
            Ok(records) => {
                info!(dataset = %key, rows = records.len(), path = "script", "dataset fetched");
                Ok(reconcile(key, records))
            }
            Err(err) => {
                warn!(dataset = %key, error = %err, "script path failed");
                Err(err)
            }
        }
    }

    /// Fetch, with total failure reported as an empty list.
    pub async fn fetch_dataset(&self, key: DatasetKey) -> Vec<Record> {
        self.try_fetch(key).await.unwrap_or_default()
    }

    /// Export path only. Rows wider than the header fail the whole table.
    pub async fn fetch_export(&self, key: DatasetKey) -> SheetResult<Vec<Record>> {
        let rows = self.download_table(key, self.timeouts.dataset).await?;
        Ok(records_from_table(key, rows)?)
    }

    /// Distinct non-empty values of one column, export path only.
    ///
    /// `column` is matched case-insensitively against the header; the first
    /// column is used when it is absent or not found.
    pub async fn fetch_column_options(&self, key: DatasetKey, column: Option<&str>) -> SheetResult<Vec<String>> {
        let rows = self.download_table(key, self.timeouts.options).await?;
        if rows.len() < 2 {
            return Err(SheetError::NoUsableRows(key));
        }
        Ok(column_options(&rows, column))
    }

    async fn download_table(&self, key: DatasetKey, limit: Duration) -> SheetResult<Vec<Vec<String>>> {
        let url = self.export_url(key)?;
        let response = with_timeout(&url, limit, self.transport.get(&url)).await?;
        let response = response.error_for_status(&url)?;
        Ok(parse_delimited(&response.body))
    }

    fn parse_base(&self, path: &str) -> SheetResult<Url> {
        Url::parse(&format!("{}/{}", self.export_base_url, path)).map_err(|e| {
            ConfigError::InvalidValue {
                field: "export_base_url".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl DatasetFetcher for DualSourceFetcher {
    async fn fetch(&self, key: DatasetKey) -> SheetResult<Vec<Record>> {
        self.try_fetch(key).await
    }
}

/// Turn a parsed export table into records.
///
/// Header cells are normalized. Short rows are padded with empty cells and
/// blank rows are skipped. Each record's marker is its 1-based position in
/// the table, header included.
pub fn records_from_table(key: DatasetKey, rows: Vec<Vec<String>>) -> Result<Vec<Record>, ResponseError> {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.iter().map(|h| normalize_key(h)).collect();
    let rows: Vec<Vec<String>> = rows.collect();

    if let Some((i, wide)) = rows.iter().enumerate().find(|(_, row)| row.len() > header.len()) {
        let err = ResponseError::ColumnMismatch {
            dataset: key,
            header_len: header.len(),
            row: i + 2,
            row_len: wide.len(),
        };
        warn!(dataset = %key, error = %err, "export table is wider than its header");
        return Err(err);
    }

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        if row.iter().all(String::is_empty) {
            continue;
        }
        let mut cells = row.into_iter();
        let fields: Fields = header
            .iter()
            .map(|name| (name.clone(), cells.next().unwrap_or_default()))
            .collect();
        records.push(Record::new(
            RowPosition::from_data_index(i),
            new_local_id("csv"),
            fields,
        ));
    }
    Ok(records)
}

/// Distinct non-empty values of the chosen column, in first-seen order.
pub fn column_options(rows: &[Vec<String>], column: Option<&str>) -> Vec<String> {
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    let index = column
        .map(str::trim)
        .and_then(|wanted| {
            header
                .iter()
                .position(|h| h.trim().to_lowercase() == wanted.to_lowercase())
        })
        .unwrap_or(0);

    let mut seen = HashSet::new();
    data.iter()
        .filter_map(|row| row.get(index))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> Vec<Vec<String>> {
        parse_delimited(text)
    }

    #[test]
    fn test_records_from_table_pads_and_numbers_rows() {
        let records = records_from_table(
            DatasetKey::Attendance,
            table("Nama,Tanggal,Status\nAni,1/2/2024,Hadir\nBudi,2/2/2024\n"),
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, RowPosition::new(2));
        assert_eq!(records[1].row, RowPosition::new(3));
        assert_eq!(records[1].get("Status"), Some(""));
        assert!(records[0].local_id.starts_with("csv-"));
        assert_ne!(records[0].local_id, records[1].local_id);
    }

    #[test]
    fn test_records_from_table_normalizes_header() {
        let records = records_from_table(
            DatasetKey::Students,
            vec![
                vec!["\u{FEFF}Nama\u{00A0} Siswa".to_string()],
                vec!["Ani".to_string()],
            ],
        )
        .unwrap();
        assert_eq!(records[0].get("Nama Siswa"), Some("Ani"));
    }

    #[test]
    fn test_wide_row_rejects_table() {
        let err = records_from_table(DatasetKey::Students, table("a,b\n1,2\n3,4,5\n")).unwrap_err();
        assert_eq!(
            err,
            ResponseError::ColumnMismatch {
                dataset: DatasetKey::Students,
                header_len: 2,
                row: 3,
                row_len: 3,
            }
        );
    }

    #[test]
    fn test_header_only_table_is_empty() {
        assert!(records_from_table(DatasetKey::Students, table("a,b\n")).unwrap().is_empty());
        assert!(records_from_table(DatasetKey::Students, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_column_options_selects_and_dedups() {
        let rows = table("Kelas,Wali\n10A,Bu Sari\n10B,Pak Budi\n10A,Bu Sari\n,Pak Andi\n");
        assert_eq!(column_options(&rows, None), vec!["10A", "10B"]);
        assert_eq!(
            column_options(&rows, Some("wali")),
            vec!["Bu Sari", "Pak Budi", "Pak Andi"]
        );
        assert_eq!(column_options(&rows, Some("missing")), vec!["10A", "10B"]);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_column_options_are_distinct_and_in_first_seen_order(
            values in proptest::collection::vec("[a-c]{0,2}", 0..30)
        ) {
            let mut rows = vec![vec!["Kelas".to_string()]];
            rows.extend(values.iter().map(|v| vec![v.clone()]));

            let options = column_options(&rows, None);

            let mut expected: Vec<String> = Vec::new();
            for value in values.iter().filter(|v| !v.is_empty()) {
                if !expected.contains(value) {
                    expected.push(value.clone());
                }
            }
            prop_assert_eq!(options, expected);
        }
    }
}
