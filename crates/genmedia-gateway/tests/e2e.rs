//! JSON-RPC frames driven through the dispatcher into fake backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use genmedia_backends::{BackendError, BackendSet, GenerationBackend, GenerationRequest, Submission};
use genmedia_delivery::OutputMaterializer;
use genmedia_gateway::{CallContext, McpServer, ToolDispatcher};
use genmedia_registry::CapabilityRegistry;
use genmedia_tools::{ToolContext, default_tools};
use genmedia_types::{GeneratedAsset, MediaDomain, OperationHandle, OperationStatus};

/// Answers speech synchronously; video goes through `pending_polls` pending polls.
struct FakeBackend {
    domain: MediaDomain,
    asset: GeneratedAsset,
    pending_polls: usize,
    submissions: AtomicUsize,
    polls: AtomicUsize,
}

impl FakeBackend {
    fn new(domain: MediaDomain, asset: GeneratedAsset, pending_polls: usize) -> Arc<Self> {
        Arc::new(Self {
            domain,
            asset,
            pending_polls,
            submissions: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        })
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

    async fn submit(&self, _request: &GenerationRequest) -> Result<Submission, BackendError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        match self.domain {
            MediaDomain::Video => Ok(Submission::Pending(OperationHandle::new("ops/e2e", "veo"))),
            _ => Ok(Submission::Ready(vec![self.asset.clone()])),
        }
    }

    async fn poll(&self, _handle: &OperationHandle) -> Result<OperationStatus, BackendError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.pending_polls {
            Ok(OperationStatus::Pending)
        } else {
            Ok(OperationStatus::DoneOk(vec![self.asset.clone()]))
        }
    }
}

fn server(backends: BackendSet) -> McpServer {
    let registry = Arc::new(CapabilityRegistry::builtin().unwrap());
    let ctx = ToolContext::new(
        registry.clone(),
        backends,
        Arc::new(OutputMaterializer::local_only()),
    );
    let dispatcher = ToolDispatcher::new(default_tools(Arc::new(ctx)));
    McpServer::new(Arc::new(dispatcher), registry)
}

fn call(id: u64, tool: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments }
    })
}

async fn result_of(server: &McpServer, request: Value, ctx: &CallContext) -> Value {
    let response = server.handle_value(request, ctx).await.unwrap();
    assert!(response.error.is_none(), "unexpected rpc error: {:?}", response.error);
    response.result.unwrap()
}

#[tokio::test]
async fn test_speech_inline_end_to_end() {
    let speech = FakeBackend::new(
        MediaDomain::Speech,
        GeneratedAsset::from_bytes(b"RIFF\x24\x00\x00\x00WAVE".to_vec(), "audio/wav"),
        0,
    );
    let server = server(BackendSet::new().with(speech.clone()));

    let result = result_of(
        &server,
        call(1, "synthesize-speech", json!({"text": "hello world", "voice": "Kore"})),
        &CallContext::default(),
    )
    .await;

    assert_eq!(result["isError"], false);
    let content = result["content"].as_array().unwrap();
    let binaries: Vec<&Value> = content.iter().filter(|b| b["type"] == "audio").collect();
    assert_eq!(binaries.len(), 1);
    assert!(!binaries[0]["data"].as_str().unwrap().is_empty());
    assert_eq!(binaries[0]["mimeType"], "audio/wav");

    assert_eq!(content[0]["type"], "text");
    assert!(content[0]["text"].as_str().unwrap().contains("Kore"));
    assert_eq!(content[1]["type"], "audio");
    assert_eq!(speech.submissions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsupported_duration_end_to_end() {
    let video = FakeBackend::new(
        MediaDomain::Video,
        GeneratedAsset::from_bytes(b"mp4".to_vec(), "video/mp4"),
        0,
    );
    let server = server(BackendSet::new().with(video.clone()));

    let result = result_of(
        &server,
        call(
            2,
            "generate-video",
            json!({"prompt": "waves at dusk", "model": "veo-3.0-generate-001", "duration": 5}),
        ),
        &CallContext::default(),
    )
    .await;

    assert_eq!(result["isError"], true);
    let content = result["content"].as_array().unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0]["type"], "text");
    let text = content[0]["text"].as_str().unwrap();
    assert!(text.contains('5'));
    assert!(text.contains("4, 6, 8"));
    assert_eq!(video.submissions.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_video_progress_then_inline_result() {
    let video = FakeBackend::new(
        MediaDomain::Video,
        GeneratedAsset::from_bytes(b"mp4".to_vec(), "video/mp4"),
        2,
    );
    let server = server(BackendSet::new().with(video.clone()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let ctx = CallContext::default().with_notifier(tx);

    let mut request = call(3, "generate-video", json!({"prompt": "a lighthouse"}));
    request["params"]["_meta"] = json!({"progressToken": 42});
    let result = result_of(&server, request, &ctx).await;

    assert_eq!(result["isError"], false);
    assert_eq!(result["content"][1]["type"], "resource");
    assert_eq!(result["content"][1]["resource"]["mimeType"], "video/mp4");

    let mut notes = Vec::new();
    while let Ok(note) = rx.try_recv() {
        notes.push(note);
    }
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| n["method"] == "notifications/progress"));
    assert_eq!(notes[0]["params"]["progressToken"], 42);
    assert_eq!(video.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_canceled_caller_stops_polling() {
    let video = FakeBackend::new(
        MediaDomain::Video,
        GeneratedAsset::from_bytes(b"mp4".to_vec(), "video/mp4"),
        usize::MAX,
    );
    let server = server(BackendSet::new().with(video.clone()));
    let cancel = CancellationToken::new();
    let ctx = CallContext::new(cancel.clone());

    let canceler = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        cancel.cancel();
    });
    let result = result_of(&server, call(4, "generate-video", json!({"prompt": "x"})), &ctx).await;
    canceler.await.unwrap();

    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"].as_str().unwrap().contains("canceled"));
    let polls = video.polls.load(Ordering::SeqCst);
    assert_eq!(polls, 3);

    // Nothing keeps polling after the cancel.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(video.polls.load(Ordering::SeqCst), polls);
}

#[tokio::test]
async fn test_unknown_tool_lists_available() {
    let server = server(BackendSet::new());
    let result = result_of(&server, call(5, "paint", json!({})), &CallContext::default()).await;
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("generate-video, generate-image, synthesize-speech, list-voices, process-media"));
}
