//! The data-access service the dashboard talks to.
//!
//! Owns the dataset cache, the option cache and the endpoint settings.
//! Reads go through the cache and never fail. Writes go straight to the
//! script endpoint and, when they succeed, invalidate what they touched.
//! Every write reports a [`MutationOutcome`] instead of an error.

use crate::config::ClientConfig;
use crate::endpoint::EndpointSettings;
use crate::fetcher::DualSourceFetcher;
use crate::persistence::SettingsStore;
use crate::rpc::{RpcClient, RpcEnvelope};
use crate::transport::{HttpTransport, ReqwestTransport};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tutorsheet_core::{
    reconcile, strip_reserved, DatasetKey, Fields, Record, ResponseError, RowPosition, SheetError,
    SheetResult, TransportError,
};
use tutorsheet_storage::{
    CacheRead, Freshness, OptionCache, OptionList, ReadThroughCache, Snapshot,
};

/// Result of a write, shaped for a toast message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub success: bool,
    pub message: String,
    /// Row written or deleted, when the server reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<RowPosition>,
    /// Records added by a bulk create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_added: Option<u64>,
    /// Record as stored by the server after a create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
}

impl MutationOutcome {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Failure outcome for `err`. Server rejections keep the server's own
    /// message; everything else uses the error's description.
    pub fn from_error(err: &SheetError) -> Self {
        match err {
            SheetError::Response(ResponseError::Rejected { message }) => Self::failed(message.clone()),
            other => Self::failed(other.to_string()),
        }
    }
}

/// Result of probing the script endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
}

/// Dataset reads, writes and option lists for one dashboard session.
///
/// Cloning is cheap and clones share caches and settings.
#[derive(Clone)]
pub struct SheetService {
    cache: ReadThroughCache<DualSourceFetcher>,
    options: Arc<OptionCache>,
    endpoint: Arc<EndpointSettings>,
}

impl SheetService {
    /// Build a service over `transport`, loading endpoint settings from the
    /// configured settings file (or memory).
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ClientConfig) -> Self {
        let store = match &config.settings_path {
            Some(path) => SettingsStore::File(path.clone()),
            None => SettingsStore::Memory,
        };
        let endpoint = Arc::new(EndpointSettings::new(config.default_endpoint.clone(), store));
        Self::with_endpoint(transport, endpoint, config)
    }

    pub fn with_endpoint(
        transport: Arc<dyn HttpTransport>,
        endpoint: Arc<EndpointSettings>,
        config: &ClientConfig,
    ) -> Self {
        let rpc = RpcClient::new(Arc::clone(&transport), Arc::clone(&endpoint), config.rpc_timeouts());
        let fetcher = DualSourceFetcher::new(
            transport,
            rpc,
            config.export_base_url.clone(),
            config.export_timeouts(),
        );
        let cache_config = config.cache();
        Self {
            options: Arc::new(OptionCache::new(cache_config.options_ttl)),
            cache: ReadThroughCache::new(fetcher, cache_config),
            endpoint,
        }
    }

    /// Service over a real HTTP client.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
        Ok(Self::new(transport, config))
    }

    pub fn endpoint(&self) -> &EndpointSettings {
        &self.endpoint
    }

    pub fn fetcher(&self) -> &DualSourceFetcher {
        self.cache.fetcher()
    }

    fn rpc(&self) -> &RpcClient {
        self.fetcher().rpc()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Whole dataset through the cache.
    pub async fn fetch_all_data(&self, key: DatasetKey, freshness: Freshness) -> CacheRead<Snapshot> {
        self.cache.get(key, freshness).await
    }

    /// Several datasets at once. Each key is cached and coalesced on its own.
    pub async fn fetch_many(
        &self,
        keys: &[DatasetKey],
        freshness: Freshness,
    ) -> Vec<(DatasetKey, CacheRead<Snapshot>)> {
        let reads = keys.iter().map(|&key| async move { (key, self.cache.get(key, freshness).await) });
        join_all(reads).await
    }

    /// One row straight from the script endpoint. Not cached.
    pub async fn read_one(&self, key: DatasetKey, row: RowPosition) -> SheetResult<Record> {
        let record = self.rpc().read_one(key, row).await?;
        reconcile(key, vec![record]).pop().ok_or_else(|| {
            ResponseError::Malformed {
                reason: "readOne returned no row".to_string(),
            }
            .into()
        })
    }

    /// Server-side search. Not cached.
    pub async fn search(&self, key: DatasetKey, field: &str, value: &str) -> SheetResult<Vec<Record>> {
        let records = self.rpc().search(key, field, value).await?;
        Ok(reconcile(key, records))
    }

    pub fn invalidate_cache(&self, key: Option<DatasetKey>) {
        match key {
            Some(key) => {
                self.cache.invalidate(key);
            }
            None => {
                self.cache.invalidate_all();
            }
        }
    }

    pub fn cache_age(&self, key: DatasetKey) -> Option<Duration> {
        self.cache.age(key)
    }

    // ------------------------------------------------------------------------
    // Option lists
    // ------------------------------------------------------------------------

    /// Distinct values of a column, for dropdowns. Falls back to the last
    /// list fetched (or an empty one) when the export path fails.
    pub async fn fetch_sheet_options(&self, key: DatasetKey, column: Option<&str>) -> CacheRead<OptionList> {
        if let Some(read) = self.options.get_fresh(key, column) {
            return read;
        }
        match self.fetcher().fetch_column_options(key, column).await {
            Ok(values) => self.options.put(key, column, values),
            Err(err) => {
                warn!(dataset = %key, column = ?column, error = %err, "option list fetch failed");
                self.options
                    .get_any(key, column)
                    .unwrap_or_else(|| CacheRead::empty(Arc::new(Vec::new())))
            }
        }
    }

    pub fn invalidate_options_cache(&self, key: Option<DatasetKey>) {
        match key {
            Some(key) => {
                self.options.invalidate(key);
            }
            None => {
                self.options.invalidate_all();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    pub async fn create_record(&self, key: DatasetKey, fields: &Fields) -> MutationOutcome {
        let data = strip_reserved(fields);
        let result = self.rpc().create(key, &data).await;
        self.settle(key, "create", result, |envelope| {
            let record = envelope.record();
            let row = record
                .as_ref()
                .map(|r| r.row)
                .filter(RowPosition::is_mutable)
                .or_else(|| envelope.row());
            MutationOutcome {
                success: true,
                message: envelope.message,
                row,
                record,
                ..Default::default()
            }
        })
    }

    /// One round trip for the whole batch.
    pub async fn create_bulk_records(&self, key: DatasetKey, records: &[Fields]) -> MutationOutcome {
        let data: Vec<Fields> = records.iter().map(strip_reserved).collect();
        let result = self.rpc().bulk_create(key, &data).await;
        self.settle(key, "bulkCreate", result, |envelope| MutationOutcome {
            success: true,
            total_added: envelope.total_added,
            message: envelope.message,
            ..Default::default()
        })
    }

    /// Rows below 2 are rejected without a request.
    pub async fn update_record(&self, key: DatasetKey, row: RowPosition, fields: &Fields) -> MutationOutcome {
        let data = strip_reserved(fields);
        let result = self.rpc().update(key, row, &data).await;
        self.settle(key, "update", result, |envelope| MutationOutcome {
            success: true,
            message: envelope.message,
            row: Some(row),
            ..Default::default()
        })
    }

    /// Rows below 2 are rejected without a request.
    pub async fn delete_record(&self, key: DatasetKey, row: RowPosition) -> MutationOutcome {
        let result = self.rpc().delete(key, row).await;
        self.settle(key, "delete", result, |envelope| MutationOutcome {
            success: true,
            row: envelope.deleted_row().or(Some(row)),
            message: envelope.message,
            ..Default::default()
        })
    }

    fn settle(
        &self,
        key: DatasetKey,
        action: &'static str,
        result: SheetResult<RpcEnvelope>,
        build: impl FnOnce(RpcEnvelope) -> MutationOutcome,
    ) -> MutationOutcome {
        match result {
            Ok(envelope) => {
                self.cache.invalidate(key);
                self.options.invalidate(key);
                info!(dataset = %key, action, "write applied");
                build(envelope)
            }
            Err(err) => {
                warn!(dataset = %key, action, local = err.is_local(), error = %err, "write failed");
                MutationOutcome::from_error(&err)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Endpoint
    // ------------------------------------------------------------------------

    /// Read the teachers sheet through the script endpoint. Any envelope
    /// counts as reachable, whatever its `success` flag.
    pub async fn test_connection(&self) -> ConnectionReport {
        if !self.endpoint.is_configured() {
            return ConnectionReport {
                success: false,
                message: "Script endpoint URL is not set.".to_string(),
            };
        }
        match self.rpc().read_envelope(DatasetKey::Teachers).await {
            Ok(envelope) => ConnectionReport {
                success: true,
                message: format!("Connected. {}", envelope.message).trim_end().to_string(),
            },
            Err(SheetError::Response(ResponseError::Malformed { reason })) => {
                warn!(reason = %reason, "connection test got a non-script response");
                ConnectionReport {
                    success: false,
                    message: "Invalid response from server.".to_string(),
                }
            }
            Err(err) => ConnectionReport {
                success: false,
                message: format!("Connection failed: {}", err),
            },
        }
    }

    /// Link to the spreadsheet holding a dataset.
    pub fn spreadsheet_url(&self, key: DatasetKey) -> String {
        self.fetcher().spreadsheet_url(key)
    }
}
