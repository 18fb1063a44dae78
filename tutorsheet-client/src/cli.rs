//! Operator command line.
//!
//! ```text
//! tutorsheet [--config <path>] read <dataset>... [--refresh]
//! tutorsheet [--config <path>] options <dataset> [column]
//! tutorsheet [--config <path>] test-connection
//! tutorsheet [--config <path>] endpoint show|set <url>|reset
//! tutorsheet [--config <path>] url <dataset>
//! ```

use crate::error::ClientError;
use crate::service::SheetService;
use serde_json::{json, Value};
use tutorsheet_core::DatasetKey;
use tutorsheet_storage::{CacheRead, Freshness, ReadOrigin};

pub const USAGE: &str = "tutorsheet [--config <path>] <read <dataset>... [--refresh] | options <dataset> [column] | test-connection | endpoint show|set <url>|reset | url <dataset>>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read {
        datasets: Vec<DatasetKey>,
        freshness: Freshness,
    },
    Options {
        dataset: DatasetKey,
        column: Option<String>,
    },
    TestConnection,
    EndpointShow,
    EndpointSet(String),
    EndpointReset,
    Url(DatasetKey),
}

impl Command {
    /// Parse arguments after the program name. `--config <path>` is skipped;
    /// config loading reads it separately.
    pub fn parse<I, S>(args: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words = Vec::new();
        let mut refresh = false;
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    args.next();
                }
                "--refresh" => refresh = true,
                _ => words.push(arg),
            }
        }

        let mut words = words.into_iter();
        let command = words.next().ok_or_else(usage)?;
        let parsed = match command.as_str() {
            "read" => {
                let datasets = words
                    .by_ref()
                    .map(|w| w.parse::<DatasetKey>())
                    .collect::<Result<Vec<_>, _>>()?;
                if datasets.is_empty() {
                    return Err(usage());
                }
                Command::Read {
                    datasets,
                    freshness: Freshness::from_force_refresh(refresh),
                }
            }
            "options" => Command::Options {
                dataset: words.next().ok_or_else(usage)?.parse()?,
                column: words.next(),
            },
            "test-connection" => Command::TestConnection,
            "endpoint" => match words.next().as_deref() {
                Some("show") | None => Command::EndpointShow,
                Some("set") => Command::EndpointSet(words.next().ok_or_else(usage)?),
                Some("reset") => Command::EndpointReset,
                Some(_) => return Err(usage()),
            },
            "url" => Command::Url(words.next().ok_or_else(usage)?.parse()?),
            _ => return Err(usage()),
        };
        if words.next().is_some() {
            return Err(usage());
        }
        Ok(parsed)
    }

    /// Run against `service` and return what to print.
    pub async fn run(self, service: &SheetService) -> Result<Value, ClientError> {
        let output = match self {
            Command::Read { datasets, freshness } => {
                let reads = service.fetch_many(&datasets, freshness).await;
                let mut out = serde_json::Map::new();
                for (key, read) in reads {
                    let rows = serde_json::to_value(read.value().as_slice())?;
                    out.insert(key.to_string(), describe(&read, rows));
                }
                Value::Object(out)
            }
            Command::Options { dataset, column } => {
                let read = service.fetch_sheet_options(dataset, column.as_deref()).await;
                let values = serde_json::to_value(read.value().as_slice())?;
                describe(&read, values)
            }
            Command::TestConnection => serde_json::to_value(service.test_connection().await)?,
            Command::EndpointShow => endpoint_json(service),
            Command::EndpointSet(url) => {
                service.endpoint().set_endpoint(&url)?;
                endpoint_json(service)
            }
            Command::EndpointReset => {
                service.endpoint().reset()?;
                endpoint_json(service)
            }
            Command::Url(dataset) => json!({ "dataset": dataset, "url": service.spreadsheet_url(dataset) }),
        };
        Ok(output)
    }
}

fn usage() -> ClientError {
    ClientError::Usage(USAGE.to_string())
}

fn origin_name(origin: ReadOrigin) -> &'static str {
    match origin {
        ReadOrigin::Cache => "cache",
        ReadOrigin::Fetched => "fetched",
        ReadOrigin::StaleFallback => "stale",
        ReadOrigin::Empty => "empty",
    }
}

fn describe<T>(read: &CacheRead<T>, data: Value) -> Value {
    json!({
        "origin": origin_name(read.origin()),
        "capturedAt": read.captured_at().map(|at| at.to_rfc3339()),
        "data": data,
    })
}

fn endpoint_json(service: &SheetService) -> Value {
    let endpoint = service.endpoint();
    json!({
        "endpoint": endpoint.endpoint(),
        "default": endpoint.default_endpoint(),
        "overridden": endpoint.is_overridden(),
        "configured": endpoint.is_configured(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_with_refresh_and_config() {
        let command = Command::parse(["--config", "tutorsheet.toml", "read", "siswa", "pengajar", "--refresh"]).unwrap();
        assert_eq!(
            command,
            Command::Read {
                datasets: vec![DatasetKey::Students, DatasetKey::Teachers],
                freshness: Freshness::Refresh,
            }
        );
    }

    #[test]
    fn test_parse_options_and_endpoint() {
        assert_eq!(
            Command::parse(["options", "kelompokKelas", "Kelas"]).unwrap(),
            Command::Options {
                dataset: DatasetKey::ClassGroups,
                column: Some("Kelas".to_string())
            }
        );
        assert_eq!(Command::parse(["endpoint"]).unwrap(), Command::EndpointShow);
        assert_eq!(
            Command::parse(["endpoint", "set", "https://script.google.com/x"]).unwrap(),
            Command::EndpointSet("https://script.google.com/x".to_string())
        );
        assert_eq!(Command::parse(["url", "PRESENSI"]).unwrap(), Command::Url(DatasetKey::Attendance));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(Command::parse(Vec::<String>::new()), Err(ClientError::Usage(_))));
        assert!(matches!(Command::parse(["read"]), Err(ClientError::Usage(_))));
        assert!(matches!(Command::parse(["read", "murid"]), Err(ClientError::Sheet(_))));
        assert!(matches!(Command::parse(["url", "siswa", "extra"]), Err(ClientError::Usage(_))));
        assert!(matches!(Command::parse(["frobnicate"]), Err(ClientError::Usage(_))));
    }
}
