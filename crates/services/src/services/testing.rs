//! In-memory doubles for the external backends

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::services::content::{GenerationError, GenerationRequest, TextBackend};
use crate::services::editron::{EditronError, EditronResult, MediaEncoder};
use crate::services::notify::{NotifyChannel, NotifyError};
use crate::services::social::{ContainerPayload, GraphApi, SocialError};
use crate::services::speech::{SpeechEngine, SpeechError};
use crate::services::storage::{AssetStore, StorageError};

/// Records delivered messages; optionally rejects every send
#[derive(Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Text backend replying with a fixed text, or failing every call
pub struct ScriptedBackend {
    reply: Option<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone().ok_or_else(|| GenerationError::Api {
            status: 503,
            message: "Model is currently loading".to_string(),
        })
    }
}

/// Speech engine writing a placeholder file per call
#[derive(Default)]
pub struct FakeSpeech {
    fail: bool,
    calls: Mutex<Vec<(String, String, PathBuf)>>,
}

impl FakeSpeech {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(text, voice, output)` per call
    pub fn calls(&self) -> Vec<(String, String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<(), SpeechError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice.to_string(), output.to_path_buf()));
        if self.fail {
            return Err(SpeechError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "No audio was received".to_string(),
            });
        }
        std::fs::write(output, b"ID3")?;
        Ok(())
    }
}

/// Media encoder that records its arguments and writes placeholder outputs
pub struct FakeEncoder {
    probe: Option<f64>,
    fail_all: bool,
    fail_matching: Option<String>,
    encodes: Mutex<Vec<(Vec<String>, PathBuf)>>,
}

impl Default for FakeEncoder {
    fn default() -> Self {
        Self {
            probe: Some(6.0),
            fail_all: false,
            fail_matching: None,
            encodes: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEncoder {
    pub fn with_probe(duration: f64) -> Self {
        Self {
            probe: Some(duration),
            ..Self::default()
        }
    }

    pub fn probe_failing() -> Self {
        Self {
            probe: None,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Fail encodes whose output file name contains `fragment`
    pub fn failing_for(fragment: &str) -> Self {
        Self {
            fail_matching: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    /// `(args, output)` per encode call
    pub fn encodes(&self) -> Vec<(Vec<String>, PathBuf)> {
        self.encodes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    async fn probe_duration(&self, path: &Path) -> EditronResult<f64> {
        self.probe
            .ok_or_else(|| EditronError::FileNotFound(path.to_path_buf()))
    }

    async fn encode(&self, args: &[String], output: &Path) -> EditronResult<()> {
        self.encodes
            .lock()
            .unwrap()
            .push((args.to_vec(), output.to_path_buf()));

        let name = output.to_string_lossy();
        let matches = self
            .fail_matching
            .as_deref()
            .is_some_and(|fragment| name.contains(fragment));
        if self.fail_all || matches {
            return Err(EditronError::FFmpeg(
                "FFmpeg failed with status exit status: 1".to_string(),
            ));
        }

        std::fs::write(output, b"media")?;
        Ok(())
    }
}

/// Asset store answering with a CDN URL per file name
#[derive(Default)]
pub struct FakeStore {
    no_url_for: Option<String>,
    uploads: Mutex<Vec<PathBuf>>,
}

impl FakeStore {
    /// Responses for files whose name contains `fragment` lack `secure_url`
    pub fn without_url_for(fragment: &str) -> Self {
        Self {
            no_url_for: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for FakeStore {
    async fn upload(&self, path: &Path) -> Result<Value, StorageError> {
        self.uploads.lock().unwrap().push(path.to_path_buf());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if self
            .no_url_for
            .as_deref()
            .is_some_and(|fragment| name.contains(fragment))
        {
            return Ok(json!({"public_id": name, "resource_type": "video"}));
        }

        Ok(json!({
            "public_id": name,
            "secure_url": format!("https://res.cloudinary.com/demo/upload/{}", name),
        }))
    }
}

enum GraphFailure {
    None,
    /// The nth create call (1-based) answers without an id
    CreateAt(usize),
    /// The nth carousel child create (1-based) answers without an id
    ChildAt(usize),
    Publish,
}

/// Graph API double numbering containers `container-1`, `container-2`, ...
pub struct FakeGraph {
    failure: GraphFailure,
    creates: Mutex<Vec<ContainerPayload>>,
    publishes: Mutex<Vec<String>>,
}

impl Default for FakeGraph {
    fn default() -> Self {
        Self::with_failure(GraphFailure::None)
    }
}

impl FakeGraph {
    fn with_failure(failure: GraphFailure) -> Self {
        Self {
            failure,
            creates: Mutex::new(Vec::new()),
            publishes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_create_at(n: usize) -> Self {
        Self::with_failure(GraphFailure::CreateAt(n))
    }

    pub fn failing_child(n: usize) -> Self {
        Self::with_failure(GraphFailure::ChildAt(n))
    }

    pub fn rejecting_publish() -> Self {
        Self::with_failure(GraphFailure::Publish)
    }

    pub fn creates(&self) -> Vec<ContainerPayload> {
        self.creates.lock().unwrap().clone()
    }

    pub fn publishes(&self) -> Vec<String> {
        self.publishes.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphApi for FakeGraph {
    async fn create_container(&self, payload: &ContainerPayload) -> Result<Value, SocialError> {
        let mut creates = self.creates.lock().unwrap();
        creates.push(payload.clone());
        let n = creates.len();

        let children = creates
            .iter()
            .filter(|p| matches!(p, ContainerPayload::CarouselChild { .. }))
            .count();
        let is_child = matches!(payload, ContainerPayload::CarouselChild { .. });

        let fail = match self.failure {
            GraphFailure::CreateAt(at) => n == at,
            GraphFailure::ChildAt(at) => is_child && children == at,
            GraphFailure::None | GraphFailure::Publish => false,
        };

        if fail {
            return Ok(json!({"error": {"message": "Invalid image url", "code": 9004}}));
        }
        Ok(json!({ "id": format!("container-{}", n) }))
    }

    async fn publish_container(&self, creation_id: &str) -> Result<Value, SocialError> {
        self.publishes.lock().unwrap().push(creation_id.to_string());

        if matches!(self.failure, GraphFailure::Publish) {
            return Err(SocialError::PlatformError {
                status: 400,
                body: r#"{"error":{"message":"Media ID is not available"}}"#.to_string(),
            });
        }
        Ok(json!({ "id": format!("media-{}", creation_id) }))
    }
}
