//! Tutorsheet client library exports.
//!
//! [`service::SheetService`] is the entry point: build one per session and
//! hand it to whatever needs dataset reads or writes.

pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod persistence;
pub mod rpc;
pub mod service;
pub mod telemetry;
pub mod transport;

pub use config::ClientConfig;
pub use endpoint::EndpointSettings;
pub use error::ClientError;
pub use fetcher::DualSourceFetcher;
pub use rpc::{RpcClient, RpcEnvelope, RpcRequest};
pub use service::{ConnectionReport, MutationOutcome, SheetService};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
