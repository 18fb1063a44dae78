//! Script endpoint ("RPC") client.
//!
//! Reads are `GET {endpoint}?action=...&sheet=...`; writes are a JSON body
//! POSTed to the endpoint itself. Every response is an [`RpcEnvelope`].

use crate::endpoint::EndpointSettings;
use crate::transport::{with_timeout, HttpTransport};
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tutorsheet_core::{
    new_local_id, ConfigError, DatasetKey, Fields, Record, ResponseError, RowPosition,
    SheetResult, ValidationError, LOCAL_ID_FIELD, ROW_INDEX_FIELD,
};

/// Response shape shared by every script action.
///
/// Only `success` is strict. Everything else is decoded leniently since the
/// script echoes raw cell values (numeric headers, null messages).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEnvelope {
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub headers: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_rows: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub row_index: Option<Value>,
    #[serde(default)]
    pub deleted_row: Option<Value>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_added: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl RpcEnvelope {
    /// Parse a response body. Anything that is not an envelope is malformed.
    pub fn parse(body: &str) -> Result<Self, ResponseError> {
        serde_json::from_str(body).map_err(|e| ResponseError::Malformed {
            reason: format!("not a script response: {}", e),
        })
    }

    /// Fail with the server's message when `success` is false.
    pub fn into_success(self) -> Result<Self, ResponseError> {
        if self.success {
            Ok(self)
        } else {
            Err(ResponseError::Rejected {
                message: self.message,
            })
        }
    }

    /// `data` as a list of records. Row markers come from each item's
    /// `_rowIndex`, or from its position when absent.
    pub fn records(&self) -> Result<Vec<Record>, ResponseError> {
        match &self.data {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(object) => Ok(record_from_object(object, RowPosition::from_data_index(i))),
                    other => Err(ResponseError::Malformed {
                        reason: format!("row {} is not an object: {}", i, other),
                    }),
                })
                .collect(),
            Some(other) => Err(ResponseError::Malformed {
                reason: format!("expected a list of rows, got {}", json_kind(other)),
            }),
            None => Err(ResponseError::Malformed {
                reason: "response has no data".to_string(),
            }),
        }
    }

    /// `data` as a single record, if it is an object.
    pub fn record(&self) -> Option<Record> {
        match &self.data {
            Some(Value::Object(object)) => {
                let fallback = self.row().unwrap_or(RowPosition::new(0));
                Some(record_from_object(object, fallback))
            }
            _ => None,
        }
    }

    /// Row the server reported for a create.
    pub fn row(&self) -> Option<RowPosition> {
        self.row_index.as_ref().and_then(row_from_value)
    }

    pub fn deleted_row(&self) -> Option<RowPosition> {
        self.deleted_row.as_ref().and_then(row_from_value)
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(cell_text(&Value::deserialize(deserializer)?))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(row_from_value(&value).map(|row| u64::from(row.get())))
}

/// Body of a script POST.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RpcRequest<'a> {
    Create {
        sheet: DatasetKey,
        data: &'a Fields,
    },
    BulkCreate {
        sheet: DatasetKey,
        data: &'a [Fields],
    },
    Update {
        sheet: DatasetKey,
        row: u32,
        data: &'a Fields,
    },
    Delete {
        sheet: DatasetKey,
        row: u32,
    },
    Search {
        sheet: DatasetKey,
        #[serde(rename = "searchField")]
        search_field: &'a str,
        #[serde(rename = "searchValue")]
        search_value: &'a str,
    },
}

impl RpcRequest<'_> {
    pub fn action(&self) -> &'static str {
        match self {
            RpcRequest::Create { .. } => "create",
            RpcRequest::BulkCreate { .. } => "bulkCreate",
            RpcRequest::Update { .. } => "update",
            RpcRequest::Delete { .. } => "delete",
            RpcRequest::Search { .. } => "search",
        }
    }
}

/// Timeouts for script calls.
#[derive(Debug, Clone, Copy)]
pub struct RpcTimeouts {
    pub read: Duration,
    pub write: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(15),
            write: Duration::from_secs(20),
        }
    }
}

/// Client for the script endpoint.
///
/// Does not strip reserved fields or touch any cache; the service layer
/// does both.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Arc<EndpointSettings>,
    timeouts: RpcTimeouts,
}

impl RpcClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoint: Arc<EndpointSettings>,
        timeouts: RpcTimeouts,
    ) -> Self {
        Self {
            transport,
            endpoint,
            timeouts,
        }
    }

    pub fn endpoint(&self) -> &EndpointSettings {
        &self.endpoint
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_configured()
    }

    /// Whole dataset, unreconciled.
    pub async fn read(&self, key: DatasetKey) -> SheetResult<Vec<Record>> {
        let envelope = self.get(&[("action", "read"), ("sheet", key.wire_name())]).await?;
        Ok(envelope.into_success()?.records()?)
    }

    /// Raw envelope of a read, without judging `success`.
    pub async fn read_envelope(&self, key: DatasetKey) -> SheetResult<RpcEnvelope> {
        self.get(&[("action", "read"), ("sheet", key.wire_name())]).await
    }

    /// One row by position.
    pub async fn read_one(&self, key: DatasetKey, row: RowPosition) -> SheetResult<Record> {
        ensure_mutable(row)?;
        let row_param = row.to_string();
        let envelope = self
            .get(&[
                ("action", "readOne"),
                ("sheet", key.wire_name()),
                ("row", row_param.as_str()),
            ])
            .await?
            .into_success()?;
        let mut record = envelope.record().ok_or_else(|| ResponseError::Malformed {
            reason: "readOne returned no row".to_string(),
        })?;
        if !record.row.is_mutable() {
            record.row = row;
        }
        Ok(record)
    }

    pub async fn create(&self, key: DatasetKey, data: &Fields) -> SheetResult<RpcEnvelope> {
        self.post(&RpcRequest::Create { sheet: key, data }).await
    }

    pub async fn bulk_create(&self, key: DatasetKey, data: &[Fields]) -> SheetResult<RpcEnvelope> {
        self.post(&RpcRequest::BulkCreate { sheet: key, data }).await
    }

    pub async fn update(&self, key: DatasetKey, row: RowPosition, data: &Fields) -> SheetResult<RpcEnvelope> {
        ensure_mutable(row)?;
        self.post(&RpcRequest::Update {
            sheet: key,
            row: row.get(),
            data,
        })
        .await
    }

    pub async fn delete(&self, key: DatasetKey, row: RowPosition) -> SheetResult<RpcEnvelope> {
        ensure_mutable(row)?;
        self.post(&RpcRequest::Delete {
            sheet: key,
            row: row.get(),
        })
        .await
    }

    /// Rows whose `field` matches `value`, as the script decides matching.
    pub async fn search(&self, key: DatasetKey, field: &str, value: &str) -> SheetResult<Vec<Record>> {
        let envelope = self
            .post(&RpcRequest::Search {
                sheet: key,
                search_field: field,
                search_value: value,
            })
            .await?;
        Ok(envelope.records()?)
    }

    async fn get(&self, params: &[(&str, &str)]) -> SheetResult<RpcEnvelope> {
        let mut url = self.endpoint_url()?;
        url.query_pairs_mut().extend_pairs(params);
        let url = url.to_string();
        debug!(url = %url, "script GET");

        let response = with_timeout(&url, self.timeouts.read, self.transport.get(&url)).await?;
        let response = response.error_for_status(&url)?;
        Ok(RpcEnvelope::parse(&response.body)?)
    }

    /// POST a request. A `success: false` envelope becomes
    /// [`ResponseError::Rejected`].
    async fn post(&self, request: &RpcRequest<'_>) -> SheetResult<RpcEnvelope> {
        let url = self.endpoint_url()?.to_string();
        let body = serde_json::to_string(request).map_err(|e| ResponseError::Malformed {
            reason: format!("could not encode request: {}", e),
        })?;
        debug!(url = %url, action = request.action(), "script POST");

        let response = with_timeout(&url, self.timeouts.write, self.transport.post_text(&url, body)).await?;
        let response = response.error_for_status(&url)?;
        Ok(RpcEnvelope::parse(&response.body)?.into_success()?)
    }

    fn endpoint_url(&self) -> SheetResult<Url> {
        let endpoint = self.endpoint.require()?;
        Url::parse(&endpoint).map_err(|e| {
            ConfigError::InvalidValue {
                field: "endpoint".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn ensure_mutable(row: RowPosition) -> Result<(), ValidationError> {
    if row.is_mutable() {
        Ok(())
    } else {
        Err(ValidationError::InvalidRowPosition { row: row.get() })
    }
}

/// Build a record from a JSON row. Non-string cells are rendered as text.
fn record_from_object(object: &Map<String, Value>, fallback_row: RowPosition) -> Record {
    let row = object
        .get(ROW_INDEX_FIELD)
        .and_then(row_from_value)
        .filter(RowPosition::is_mutable)
        .unwrap_or(fallback_row);
    let fields: Fields = object
        .iter()
        .filter(|(key, _)| key.as_str() != ROW_INDEX_FIELD && key.as_str() != LOCAL_ID_FIELD)
        .map(|(key, value)| (key.clone(), cell_text(value)))
        .collect();
    Record::new(row, new_local_id("api"), fields)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn row_from_value(value: &Value) -> Option<RowPosition> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(RowPosition::new).or_else(|| {
            n.as_f64()
                .and_then(|f| RowPosition::parse(&f.to_string()))
        }),
        Value::String(s) => RowPosition::parse(s),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shapes() {
        let mut data = Fields::new();
        data.insert("Nama".to_string(), "Ani".to_string());

        let create = serde_json::to_value(RpcRequest::Create {
            sheet: DatasetKey::Students,
            data: &data,
        })
        .unwrap();
        assert_eq!(create, json!({"action": "create", "sheet": "siswa", "data": {"Nama": "Ani"}}));

        let bulk = serde_json::to_value(RpcRequest::BulkCreate {
            sheet: DatasetKey::Attendance,
            data: std::slice::from_ref(&data),
        })
        .unwrap();
        assert_eq!(bulk["action"], "bulkCreate");
        assert_eq!(bulk["data"][0]["Nama"], "Ani");

        let delete = serde_json::to_value(RpcRequest::Delete {
            sheet: DatasetKey::Teachers,
            row: 7,
        })
        .unwrap();
        assert_eq!(delete, json!({"action": "delete", "sheet": "pengajar", "row": 7}));

        let search = serde_json::to_value(RpcRequest::Search {
            sheet: DatasetKey::Students,
            search_field: "Nama",
            search_value: "Budi",
        })
        .unwrap();
        assert_eq!(
            search,
            json!({"action": "search", "sheet": "siswa", "searchField": "Nama", "searchValue": "Budi"})
        );
    }

    #[test]
    fn test_envelope_records_use_server_row_index() {
        let envelope = RpcEnvelope::parse(
            r#"{"success":true,"message":"ok","data":[
                {"_rowIndex":5,"Nama":"Ani","Umur":17},
                {"Nama":"Budi","Aktif":true,"Catatan":null},
                {"_rowIndex":"9","_id":"server-id","Nama":"Citra"}
            ],"totalRows":3}"#,
        )
        .unwrap();
        let records = envelope.records().unwrap();

        assert_eq!(records[0].row, RowPosition::new(5));
        assert_eq!(records[0].get("Umur"), Some("17"));
        assert_eq!(records[1].row, RowPosition::new(3));
        assert_eq!(records[1].get("Aktif"), Some("true"));
        assert_eq!(records[1].get("Catatan"), Some(""));
        assert_eq!(records[2].row, RowPosition::new(9));
        assert!(records[2].get(LOCAL_ID_FIELD).is_none());
        assert!(records[2].local_id.starts_with("api-"));
    }

    #[test]
    fn test_envelope_tolerates_raw_header_cells_and_null_message() {
        let envelope = RpcEnvelope::parse(
            r#"{"success":true,"message":null,"headers":["Nama",2024,null],
                "data":[{"_rowIndex":2,"Nama":"Ani","2024":88}],"totalRows":1.0,"timestamp":1700000000}"#,
        )
        .unwrap();

        assert_eq!(envelope.message, "");
        assert_eq!(envelope.headers.as_ref().map(Vec::len), Some(3));
        assert_eq!(envelope.total_rows, Some(1));
        let records = envelope.records().unwrap();
        assert_eq!(records[0].get("2024"), Some("88"));
    }

    #[test]
    fn test_non_envelope_body_is_malformed() {
        assert!(matches!(
            RpcEnvelope::parse("<html>Sign in</html>"),
            Err(ResponseError::Malformed { .. })
        ));
        assert!(matches!(
            RpcEnvelope::parse(r#"{"message":"no success flag"}"#),
            Err(ResponseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_rejected_envelope_keeps_server_message() {
        let envelope = RpcEnvelope::parse(r#"{"success":false,"message":"Sheet tidak ditemukan"}"#).unwrap();
        assert_eq!(
            envelope.into_success(),
            Err(ResponseError::Rejected {
                message: "Sheet tidak ditemukan".to_string()
            })
        );
    }

    #[test]
    fn test_created_row_accepts_number_or_text() {
        let envelope = RpcEnvelope::parse(r#"{"success":true,"message":"","rowIndex":12.0}"#).unwrap();
        assert_eq!(envelope.row(), Some(RowPosition::new(12)));
        let envelope = RpcEnvelope::parse(r#"{"success":true,"message":"","rowIndex":"4"}"#).unwrap();
        assert_eq!(envelope.row(), Some(RowPosition::new(4)));
    }

    #[test]
    fn test_data_must_be_a_list_for_reads() {
        let envelope = RpcEnvelope::parse(r#"{"success":true,"message":"","data":{"Nama":"x"}}"#).unwrap();
        assert!(envelope.records().is_err());
        assert_eq!(envelope.record().and_then(|r| r.get("Nama").map(String::from)), Some("x".to_string()));
    }
}
