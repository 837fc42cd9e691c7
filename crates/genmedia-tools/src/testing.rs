//! In-crate fakes for tool tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use genmedia_backends::{
    BackendError, BackendSet, GenerationBackend, GenerationRequest, MediaTransform, Submission,
    TransformInput, TransformOp,
};
use genmedia_delivery::OutputMaterializer;
use genmedia_registry::CapabilityRegistry;
use genmedia_storage::{ObjectLocation, ObjectStore, StorageError};
use genmedia_types::{GeneratedAsset, MediaDomain, OperationHandle, OperationStatus};

use crate::context::ToolContext;

enum Script {
    Ready(Vec<GeneratedAsset>),
    Fail(String),
    Pending {
        handle: OperationHandle,
        pending_polls: usize,
        assets: Vec<GeneratedAsset>,
    },
}

pub struct FakeBackend {
    domain: MediaDomain,
    script: Script,
    delay: Duration,
    submissions: AtomicUsize,
    polls: AtomicUsize,
    last: Mutex<Option<GenerationRequest>>,
}

impl FakeBackend {
    fn new(domain: MediaDomain, script: Script) -> Self {
        Self {
            domain,
            script,
            delay: Duration::ZERO,
            submissions: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn ready(domain: MediaDomain, assets: Vec<GeneratedAsset>) -> Self {
        Self::new(domain, Script::Ready(assets))
    }

    pub fn failing(domain: MediaDomain, message: &str) -> Self {
        Self::new(domain, Script::Fail(message.to_string()))
    }

    pub fn pending(
        domain: MediaDomain,
        handle: OperationHandle,
        pending_polls: usize,
        assets: Vec<GeneratedAsset>,
    ) -> Self {
        Self::new(
            domain,
            Script::Pending {
                handle,
                pending_polls,
                assets,
            },
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    fn id(&self) -> &str {
        "fake"
    }

    fn domain(&self) -> MediaDomain {
        self.domain
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, BackendError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::Ready(assets) => Ok(Submission::Ready(assets.clone())),
            Script::Fail(message) => Err(BackendError::Api {
                status: 429,
                message: message.clone(),
            }),
            Script::Pending { handle, .. } => Ok(Submission::Pending(handle.clone())),
        }
    }

    async fn poll(&self, _handle: &OperationHandle) -> Result<OperationStatus, BackendError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Pending {
                pending_polls,
                assets,
                ..
            } if n >= *pending_polls => Ok(OperationStatus::DoneOk(assets.clone())),
            _ => Ok(OperationStatus::Pending),
        }
    }
}

/// Echoes its first input with the op's output MIME type.
#[derive(Default)]
pub struct FakeTransform {
    pub calls: Mutex<Vec<TransformOp>>,
    /// Input extensions seen by each `apply` call.
    pub extensions: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl MediaTransform for FakeTransform {
    async fn apply(
        &self,
        inputs: Vec<TransformInput>,
        op: &TransformOp,
        _cancel: &CancellationToken,
    ) -> Result<GeneratedAsset, BackendError> {
        self.calls.lock().unwrap().push(op.clone());
        self.extensions
            .lock()
            .unwrap()
            .push(inputs.iter().map(|i| i.extension.clone()).collect());
        let data = inputs.first().map(|i| i.data.clone()).unwrap_or_default();
        Ok(GeneratedAsset::from_bytes(data, op.output_type().0))
    }

    async fn media_info(
        &self,
        input: TransformInput,
        _cancel: &CancellationToken,
    ) -> Result<Value, BackendError> {
        Ok(json!({
            "format": { "format_name": input.extension, "size": input.data.len().to_string() },
            "streams": [],
        }))
    }
}

/// Object store whose every call fails the way an unreachable service does.
pub struct FailingStore;

#[async_trait]
impl ObjectStore for FailingStore {
    async fn upload(
        &self,
        _location: &ObjectLocation,
        _data: Bytes,
        _mime_type: &str,
    ) -> Result<(), StorageError> {
        Err(StorageError::Api {
            status: 503,
            message: "service unavailable".into(),
        })
    }

    async fn download(&self, _location: &ObjectLocation) -> Result<Bytes, StorageError> {
        Err(StorageError::Api {
            status: 503,
            message: "service unavailable".into(),
        })
    }
}

pub fn context(backends: BackendSet) -> ToolContext {
    let registry = Arc::new(CapabilityRegistry::builtin().unwrap());
    ToolContext::new(registry, backends, Arc::new(OutputMaterializer::local_only()))
}
