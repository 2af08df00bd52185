//! Scripted in-memory backend for orchestrator tests.
//!
//! One [`FakeHost`] implements both service traits. Behaviour is
//! scripted per hook type; the server job id of hook `H1` is `job-H1`.
//! Every push frame is delayed by `step` so jobs stay in flight long
//! enough to observe, with the paused test clock advancing on demand.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use ccbell_core::backend::{
    BackendError, GenerationBackend, ProgressStream, PushChannelFactory, TransportError,
};
use ccbell_core::progress::{JobStatusReport, ProgressEvent, RemoteJobStatus};
use ccbell_core::readiness::{LoadOutcome, ModelStatusReport, RemoteModelStatus};
use ccbell_core::request::{GenerationRequest, ModelId};
use ccbell_core::sound::SoundStatus;
use ccbell_core::types::{PackId, ServerJobId};
use ccbell_orchestrator::{Library, Orchestrator, OrchestratorConfig, LibraryStore};

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// One frame of a push channel script.
#[derive(Clone)]
pub enum Frame {
    Progress(f32),
    Complete,
    Fail(&'static str),
    Break(TransportError),
}

/// How the push channel of a job behaves.
#[derive(Clone)]
pub enum PushPlan {
    Frames(Vec<Frame>),
    /// Opening the channel fails.
    Refuse,
    /// Opens but never sends anything.
    Hang,
    /// The stream panics on first poll.
    Panic,
}

/// One answer of the status endpoint. The last answer repeats.
#[derive(Clone)]
pub enum Poll {
    Processing(f32),
    Complete,
    Error(&'static str),
    Unreachable,
}

/// What the fake host saw at each submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub hook: String,
    pub accepted: bool,
    /// Terminal events delivered for earlier jobs at submission time.
    pub terminals_before: usize,
    pub model_ready: bool,
}

pub fn job_id(hook: &str) -> ServerJobId {
    ServerJobId::new(format!("job-{hook}"))
}

pub fn audio_url(hook: &str) -> String {
    format!("/api/audio/job-{hook}")
}

fn hook_of(job_id: &ServerJobId) -> String {
    job_id.as_str().trim_start_matches("job-").to_string()
}

// ---------------------------------------------------------------------------
// FakeHost
// ---------------------------------------------------------------------------

struct ModelState {
    status: RemoteModelStatus,
    loading_polls: u32,
    loads: u32,
    /// Status polls that fail before the host answers again.
    outage: u32,
}

pub struct FakeHost {
    step: Duration,
    submit_delay: Duration,
    terminals: Arc<AtomicUsize>,
    rejected: Mutex<HashSet<String>>,
    push: Mutex<HashMap<String, PushPlan>>,
    polls: Mutex<HashMap<String, VecDeque<Poll>>>,
    submissions: Mutex<Vec<Submission>>,
    deleted: Mutex<Vec<ServerJobId>>,
    model: Mutex<ModelState>,
}

impl FakeHost {
    /// Model ready, every job completes over push after two progress frames.
    pub fn new() -> Self {
        Self {
            step: Duration::from_millis(100),
            submit_delay: Duration::ZERO,
            terminals: Arc::new(AtomicUsize::new(0)),
            rejected: Mutex::new(HashSet::new()),
            push: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            model: Mutex::new(ModelState {
                status: RemoteModelStatus::Ready,
                loading_polls: 0,
                loads: 0,
                outage: 0,
            }),
        }
    }

    pub fn step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Every submission takes `delay` before it is answered.
    pub fn submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn reject(self, hook: &str) -> Self {
        self.rejected.lock().unwrap().insert(hook.into());
        self
    }

    pub fn push(self, hook: &str, plan: PushPlan) -> Self {
        self.push.lock().unwrap().insert(hook.into(), plan);
        self
    }

    pub fn polls(self, hook: &str, answers: Vec<Poll>) -> Self {
        self.polls.lock().unwrap().insert(hook.into(), answers.into());
        self
    }

    /// Model starts in `status`; a load keeps it loading for `loading_polls` polls.
    pub fn model(self, status: RemoteModelStatus, loading_polls: u32) -> Self {
        {
            let mut model = self.model.lock().unwrap();
            model.status = status;
            model.loading_polls = loading_polls;
        }
        self
    }

    /// The next `polls` model status requests fail at the network level.
    pub fn model_outage(self, polls: u32) -> Self {
        self.model.lock().unwrap().outage = polls;
        self
    }

    /// Change the model status mid-test.
    pub fn set_model(&self, status: RemoteModelStatus) {
        self.model.lock().unwrap().status = status;
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submitted_hooks(&self) -> Vec<String> {
        self.submissions()
            .into_iter()
            .filter(|s| s.accepted)
            .map(|s| s.hook)
            .collect()
    }

    pub fn deleted(&self) -> Vec<ServerJobId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn loads(&self) -> u32 {
        self.model.lock().unwrap().loads
    }

    /// Every accepted job was submitted only after all earlier ones finished.
    pub fn assert_sequential(&self) {
        let accepted: Vec<_> = self.submissions().into_iter().filter(|s| s.accepted).collect();
        for (n, submission) in accepted.iter().enumerate() {
            assert_eq!(
                submission.terminals_before, n,
                "{} was submitted while an earlier job was still running",
                submission.hook
            );
        }
    }
}

#[async_trait]
impl GenerationBackend for FakeHost {
    async fn submit(&self, request: &GenerationRequest) -> Result<ServerJobId, BackendError> {
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        let hook = request.hook_type.clone();
        let accepted = !self.rejected.lock().unwrap().contains(&hook);
        self.submissions.lock().unwrap().push(Submission {
            hook: hook.clone(),
            accepted,
            terminals_before: self.terminals.load(Ordering::SeqCst),
            model_ready: self.model.lock().unwrap().status == RemoteModelStatus::Ready,
        });

        if accepted {
            Ok(job_id(&hook))
        } else {
            Err(BackendError::Api {
                status: 500,
                body: "queue full".into(),
            })
        }
    }

    async fn job_status(&self, job_id: &ServerJobId) -> Result<JobStatusReport, BackendError> {
        let hook = hook_of(job_id);
        let answer = {
            let mut polls = self.polls.lock().unwrap();
            let script = polls
                .entry(hook.clone())
                .or_insert_with(|| VecDeque::from([Poll::Complete]));
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        };

        let report = |status, progress, url: Option<String>, error: Option<&str>| JobStatusReport {
            status,
            progress,
            stage: Some("generating".into()),
            audio_url: url,
            error: error.map(str::to_string),
        };

        match answer {
            Poll::Processing(p) => Ok(report(RemoteJobStatus::Processing, p, None, None)),
            Poll::Complete => {
                self.terminals.fetch_add(1, Ordering::SeqCst);
                // The backend leaves `audio_url` out of finished status reports.
                Ok(report(RemoteJobStatus::Complete, 1.0, None, None))
            }
            Poll::Error(message) => {
                self.terminals.fetch_add(1, Ordering::SeqCst);
                Ok(report(RemoteJobStatus::Error, 0.0, None, Some(message)))
            }
            Poll::Unreachable => Err(BackendError::Request("connection refused".into())),
        }
    }

    async fn delete_job(&self, job_id: &ServerJobId) -> Result<(), BackendError> {
        self.deleted.lock().unwrap().push(job_id.clone());
        Ok(())
    }

    async fn model_status(&self, model: ModelId) -> Result<ModelStatusReport, BackendError> {
        let mut state = self.model.lock().unwrap();
        if state.outage > 0 {
            state.outage -= 1;
            return Err(BackendError::Request("connection refused".into()));
        }
        if state.status == RemoteModelStatus::Loading {
            if state.loading_polls == 0 {
                state.status = RemoteModelStatus::Ready;
            } else {
                state.loading_polls -= 1;
            }
        }
        Ok(ModelStatusReport {
            model_id: model,
            status: state.status,
            progress: 0.0,
            stage: None,
            error: (state.status == RemoteModelStatus::Error).then(|| "weights missing".into()),
        })
    }

    async fn load_model(&self, _: ModelId) -> Result<LoadOutcome, BackendError> {
        let mut state = self.model.lock().unwrap();
        state.loads += 1;
        if state.status == RemoteModelStatus::Ready {
            return Ok(LoadOutcome::AlreadyReady);
        }
        state.status = RemoteModelStatus::Loading;
        Ok(LoadOutcome::LoadingStarted)
    }
}

#[async_trait]
impl PushChannelFactory for FakeHost {
    async fn open(&self, job_id: &ServerJobId) -> Result<ProgressStream, TransportError> {
        let hook = hook_of(job_id);
        let plan = self.push.lock().unwrap().get(&hook).cloned().unwrap_or_else(|| {
            PushPlan::Frames(vec![Frame::Progress(0.25), Frame::Progress(0.75), Frame::Complete])
        });

        let frames = match plan {
            PushPlan::Refuse => return Err(TransportError::Connect("connection refused".into())),
            PushPlan::Hang => return Ok(stream::pending::<Result<ProgressEvent, TransportError>>().boxed()),
            PushPlan::Panic => return Ok(stream::once(async { explode() }).boxed()),
            PushPlan::Frames(frames) => frames,
        };

        let items: Vec<Result<ProgressEvent, TransportError>> = frames
            .into_iter()
            .map(|frame| match frame {
                Frame::Progress(p) => Ok(ProgressEvent::progress(p, "generating")),
                Frame::Complete => Ok(ProgressEvent::completed(audio_url(&hook))),
                Frame::Fail(message) => Ok(ProgressEvent::failed(message)),
                Frame::Break(e) => Err(e),
            })
            .collect();

        let step = self.step;
        let terminals = Arc::clone(&self.terminals);
        Ok(stream::iter(items)
            .then(move |item| {
                let terminals = Arc::clone(&terminals);
                async move {
                    tokio::time::sleep(step).await;
                    if matches!(&item, Ok(event) if event.is_terminal()) {
                        terminals.fetch_add(1, Ordering::SeqCst);
                    }
                    item
                }
            })
            .boxed())
    }
}

fn explode() -> Result<ProgressEvent, TransportError> {
    panic!("progress decoder blew up")
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        model: ModelId::Small,
        poll_interval: Duration::from_millis(100),
        max_poll_failures: 3,
        settle_delay: Duration::from_millis(50),
        readiness_poll_interval: Duration::from_millis(100),
    }
}

pub fn request(hook: &str) -> GenerationRequest {
    GenerationRequest::new(ModelId::Small, "soft notification chime", hook)
}

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub orchestrator: Orchestrator,
    pub pack: PackId,
}

/// Build and start an orchestrator over `host`, with one empty pack.
pub fn start(host: FakeHost) -> Harness {
    start_with(host, test_config())
}

pub fn start_with(host: FakeHost, config: OrchestratorConfig) -> Harness {
    let host = Arc::new(host);
    let orchestrator = Orchestrator::new(host.clone(), host.clone(), LibraryStore::new(), config);
    let pack = orchestrator.create_pack("Test pack", None, ModelId::Small);
    orchestrator.start();
    Harness {
        host,
        orchestrator,
        pack,
    }
}

/// Wait until `n` entries are finalized.
pub async fn wait_finalized(orchestrator: &Orchestrator, n: usize) -> Library {
    let mut rx = orchestrator.subscribe_library();
    let library = tokio::time::timeout(
        Duration::from_secs(120),
        rx.wait_for(|lib| lib.sounds.iter().filter(|s| s.status.is_terminal()).count() >= n),
    )
    .await
    .expect("timed out waiting for jobs to finish")
    .expect("library store dropped")
    .clone();
    library
}

pub fn status_of(library: &Library, hook: &str) -> Option<SoundStatus> {
    library
        .sounds
        .iter()
        .find(|s| s.hook_type == hook)
        .map(|s| s.status)
}
