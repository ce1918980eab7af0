//! Async IPC client for `reposcribe-jobd`.
//!
//! Keeps one connection open, performs the `hello` handshake on connect,
//! and sends one request per line with increasing ids.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use crate::PROTOCOL_VERSION;
use crate::protocol::{
    CancelResult, HelloParams, HelloResult, JobIdParams, JobListResult, ListParams, RpcRequest,
    ServiceStatusResult, SubmitParams,
};
use crate::registry::JobRecord;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot connect to job service at {path}: {source}\nHint: start it with `reposcribe-jobd`")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("service closed the connection")]
    Closed,

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub struct ServiceClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
    hello: HelloResult,
}

impl ServiceClient {
    /// Connect and complete the handshake.
    pub async fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
            next_id: 0,
            hello: HelloResult {
                protocol_version: String::new(),
                service_version: String::new(),
                capabilities: Vec::new(),
            },
        };

        client.hello = client
            .call(
                "hello",
                &HelloParams {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    client_version: env!("CARGO_PKG_VERSION").to_string(),
                },
            )
            .await?;
        tracing::debug!(
            service_version = %client.hello.service_version,
            "Connected to job service"
        );
        Ok(client)
    }

    pub fn service_info(&self) -> &HelloResult {
        &self.hello
    }

    /// Send one request and decode its `result`.
    pub async fn call<P, R>(&mut self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let id = self.next_id;
        self.next_id += 1;

        let request = RpcRequest {
            id: Value::from(id),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
        };
        let mut bytes = serde_json::to_vec(&request)?;
        bytes.push(b'\n');
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Closed);
        }

        let mut response: Value = serde_json::from_str(line.trim())?;
        if let Some(error) = response.get("error") {
            return Err(ClientError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        let result = response
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }

    pub async fn submit(&mut self, params: &SubmitParams) -> Result<JobRecord> {
        self.call("job.submit", params).await
    }

    pub async fn get(&mut self, job_id: &str) -> Result<JobRecord> {
        self.call(
            "job.get",
            &JobIdParams {
                job_id: job_id.to_string(),
            },
        )
        .await
    }

    pub async fn list(&mut self, params: &ListParams) -> Result<JobListResult> {
        self.call("job.list", params).await
    }

    pub async fn cancel(&mut self, job_id: &str) -> Result<CancelResult> {
        self.call(
            "job.cancel",
            &JobIdParams {
                job_id: job_id.to_string(),
            },
        )
        .await
    }

    pub async fn status(&mut self) -> Result<ServiceStatusResult> {
        self.call("service.status", &serde_json::json!({})).await
    }
}
