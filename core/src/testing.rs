//! In-memory collaborators for tests: a snapshot source backed by fixture
//! files and a scripted inference client.

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::inference::{InferenceClient, InferenceError, InferenceResult};
use crate::snapshot::{CloneError, Snapshot, SnapshotSource};

/// Writes a fixed file tree into a fresh temporary directory per acquire.
#[derive(Debug, Default)]
pub struct FixtureSource {
    files: Vec<(String, Vec<u8>)>,
    fail_with: Option<String>,
    roots: Mutex<Vec<PathBuf>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, rel_path: &str, contents: &str) -> Self {
        self.with_bytes(rel_path, contents.as_bytes().to_vec())
    }

    pub fn with_bytes(mut self, rel_path: &str, contents: Vec<u8>) -> Self {
        self.files.push((rel_path.to_string(), contents));
        self
    }

    /// Every acquire fails with a clone error carrying `reason`.
    pub fn failing(mut self, reason: &str) -> Self {
        self.fail_with = Some(reason.to_string());
        self
    }

    /// Roots of every snapshot handed out so far.
    pub fn acquired_roots(&self) -> Vec<PathBuf> {
        self.roots.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SnapshotSource for FixtureSource {
    async fn acquire(&self, address: &str) -> Result<Snapshot, CloneError> {
        let fail = |reason: String| CloneError {
            address: address.to_string(),
            reason,
        };
        if let Some(reason) = &self.fail_with {
            return Err(fail(reason.clone()));
        }

        let dir = TempDir::new().map_err(|e| fail(e.to_string()))?;
        let root = dir.path().to_path_buf();
        for (rel, contents) in &self.files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
            }
            std::fs::write(&path, contents).map_err(|e| fail(e.to_string()))?;
        }
        if let Ok(mut roots) = self.roots.lock() {
            roots.push(root.clone());
        }
        Ok(Snapshot::new(dir, root))
    }
}

enum Rule {
    Respond(String),
    Fail(String),
    Panic(String),
}

/// Inference client answering from prompt-substring rules.
///
/// The first rule whose needle occurs in the prompt decides the answer;
/// otherwise the default response is returned. Failures surface as HTTP 429
/// API errors.
pub struct ScriptedInference {
    rules: Vec<(String, Rule)>,
    default: String,
    delay: Option<Duration>,
    cancel_on_call: Option<(usize, CancellationToken)>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl Default for ScriptedInference {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default: "Scripted analysis.".to_string(),
            delay: None,
            cancel_on_call: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, response: &str) -> Self {
        self.default = response.to_string();
        self
    }

    pub fn respond_when_contains(mut self, needle: &str, response: &str) -> Self {
        self.rules
            .push((needle.to_string(), Rule::Respond(response.to_string())));
        self
    }

    pub fn fail_when_contains(mut self, needle: &str, message: &str) -> Self {
        self.rules
            .push((needle.to_string(), Rule::Fail(message.to_string())));
        self
    }

    /// Panic inside `generate` when the prompt contains `needle`.
    pub fn panic_when_contains(mut self, needle: &str, message: &str) -> Self {
        self.rules
            .push((needle.to_string(), Rule::Panic(message.to_string())));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cancel `token` when the `n`th call (1-based) arrives.
    pub fn cancel_on_call(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((n, token));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn generate(&self, prompt: &str) -> InferenceResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some((n, token)) = &self.cancel_on_call
            && *n == call
        {
            token.cancel();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let rule = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, rule)| rule);
        match rule {
            Some(Rule::Respond(text)) => Ok(text.clone()),
            Some(Rule::Fail(message)) => Err(InferenceError::ApiResponse {
                status: 429,
                message: message.clone(),
                error_type: Some("RESOURCE_EXHAUSTED".to_string()),
            }),
            Some(Rule::Panic(message)) => panic!("{message}"),
            None => Ok(self.default.clone()),
        }
    }
}
