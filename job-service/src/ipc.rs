//! Unix domain socket IPC listener.
//!
//! Reads newline-delimited JSON-RPC-lite messages and dispatches them to
//! the JobManager.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

use crate::PROTOCOL_VERSION;
use crate::manager::{JobManager, ManagerError};
use crate::protocol::*;

type RpcResult = Result<Value, (i64, String)>;

/// Bind at `path`, replacing a stale socket file and creating the parent
/// directory when needed.
pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(path)?;
    tracing::info!("Job service listening on {}", path.display());
    Ok(listener)
}

/// Accept connections until `shutdown` flips to true.
pub async fn serve(
    manager: Arc<JobManager>,
    listener: UnixListener,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("IPC listener shutting down");
                    return Ok(());
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let mgr = Arc::clone(&manager);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(mgr, stream).await {
                            tracing::warn!("Connection error: {e}");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {e}");
                }
            }
        }
    }
}

async fn handle_connection(manager: Arc<JobManager>, stream: UnixStream) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = dispatch_message(&manager, trimmed).await;
        let mut response_bytes = serde_json::to_vec(&response).unwrap_or_else(|_| b"{}".to_vec());
        response_bytes.push(b'\n');
        writer.write_all(&response_bytes).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse and dispatch a single JSON-RPC message.
pub(crate) async fn dispatch_message(manager: &JobManager, raw: &str) -> Value {
    let request: RpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => {
            return error_value(
                Value::from(0),
                ERR_INVALID_REQUEST,
                format!("Invalid JSON-RPC: {e}"),
            );
        }
    };

    let id = request.id.clone();
    match dispatch_method(manager, &request.method, request.params).await {
        Ok(result) => serde_json::to_value(RpcResponse { id, result }).unwrap_or_default(),
        Err((code, message)) => error_value(id, code, message),
    }
}

fn error_value(id: Value, code: i64, message: String) -> Value {
    serde_json::to_value(RpcError {
        id,
        error: RpcErrorBody { code, message },
    })
    .unwrap_or_default()
}

async fn dispatch_method(manager: &JobManager, method: &str, params: Option<Value>) -> RpcResult {
    match method {
        "hello" => handle_hello(params),
        "job.submit" => {
            let params: SubmitParams = parse_params(method, params)?;
            let job = manager.submit(params).await.map_err(|e| manager_error_to_rpc(&e))?;
            to_result(&job)
        }
        "job.get" => {
            let params: JobIdParams = parse_params(method, params)?;
            let job = manager
                .get(&params.job_id)
                .await
                .map_err(|e| manager_error_to_rpc(&e))?;
            to_result(&job)
        }
        "job.list" => {
            let params: ListParams = match params {
                Some(v) if !v.is_null() => parse_params(method, Some(v))?,
                _ => ListParams::default(),
            };
            let (jobs, total) = manager.list(&params).await;
            to_result(&JobListResult { jobs, total })
        }
        "job.cancel" => {
            let params: JobIdParams = parse_params(method, params)?;
            let result = manager
                .cancel(&params.job_id)
                .await
                .map_err(|e| manager_error_to_rpc(&e))?;
            to_result(&result)
        }
        "service.status" => to_result(&manager.status().await),
        _ => Err((ERR_METHOD_NOT_FOUND, format!("Unknown method: {method}"))),
    }
}

fn parse_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T, (i64, String)> {
    params
        .ok_or_else(|| (ERR_INVALID_PARAMS, "Missing params".to_string()))
        .and_then(|v| {
            serde_json::from_value(v)
                .map_err(|e| (ERR_INVALID_PARAMS, format!("Invalid {method} params: {e}")))
        })
}

fn to_result<T: serde::Serialize>(value: &T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| (ERR_INFRA, format!("Serialize error: {e}")))
}

/// Handle the `hello` handshake.
fn handle_hello(params: Option<Value>) -> RpcResult {
    let hello: HelloParams = parse_params("hello", params)?;

    if hello.protocol_version != PROTOCOL_VERSION {
        return Err((
            ERR_INVALID_PARAMS,
            format!(
                "Incompatible protocol version: client={}, service={}",
                hello.protocol_version, PROTOCOL_VERSION
            ),
        ));
    }

    to_result(&HelloResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        capabilities: [
            "job.submit",
            "job.get",
            "job.list",
            "job.cancel",
            "service.status",
        ]
        .iter()
        .map(|c| (*c).to_string())
        .collect(),
    })
}

fn manager_error_to_rpc(err: &ManagerError) -> (i64, String) {
    match err {
        ManagerError::JobNotFound { .. } => (ERR_JOB_NOT_FOUND, err.to_string()),
        ManagerError::InvalidRequest { .. } => (ERR_INVALID_PARAMS, err.to_string()),
        ManagerError::Infra(_) => (ERR_INFRA, err.to_string()),
    }
}
