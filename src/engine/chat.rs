//! Chat session: submits user text and assembles the streamed reply
//!
//! A submission moves through these phases:
//! 1. The user message is appended before any network activity
//! 2. The transport opens a streaming request
//! 3. An empty assistant reply is appended once the response is accepted
//! 4. Each text delta extends that reply, publishing a new transcript snapshot
//! 5. The reply is finalized at end of stream, or replaced by an error string
//!
//! Only one submission runs at a time. The busy flag is released on every exit
//! path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::conversation::{Transcript, TranscriptError};
use crate::providers::{Flavor, Fragment, GenerationRequest};
use crate::stream;

use super::transport::{CompletionTransport, TransportError};

/// Which upstream flavor and model a session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub flavor: Flavor,
    pub model: String,
}

/// Progress of the current submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    UserMessageAppended,
    StreamOpening,
    StreamingDeltas,
    Finalized,
}

/// Result of a submission that was accepted or silently ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// The reply streamed to completion.
    Completed { reply: String },
    /// The reply was replaced by `error` in the transcript.
    Failed { error: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a reply is still being generated")]
    Busy,
}

#[derive(Debug, Error)]
enum ReplyError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

struct SessionInner {
    id: Uuid,
    settings: SessionSettings,
    transport: Arc<dyn CompletionTransport>,
    busy: AtomicBool,
    phase: watch::Sender<Phase>,
    transcript: watch::Sender<Transcript>,
}

/// One live conversation. Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    pub fn new(settings: SessionSettings, transport: Arc<dyn CompletionTransport>) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        let (transcript, _) = watch::channel(Transcript::new());

        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                settings,
                transport,
                busy: AtomicBool::new(false),
                phase,
                transcript,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Current transcript snapshot
    pub fn transcript(&self) -> Transcript {
        self.inner.transcript.borrow().clone()
    }

    /// Receive every transcript snapshot as it is published.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.inner.transcript.subscribe()
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Submit user text and stream the assistant's reply into the transcript.
    ///
    /// Transport failures do not return `Err`: they end up in the transcript
    /// and in [`SubmitOutcome::Failed`].
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, SubmitError> {
        if text.trim().is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        let _busy = BusyGuard::acquire(&self.inner)?;

        let span = info_span!("submit", session = %self.inner.id);
        Ok(self.run(text).instrument(span).await)
    }

    async fn run(&self, text: &str) -> SubmitOutcome {
        if let Err(e) = self.update(|t| t.push_user(text)) {
            return self.fail(ReplyError::from(e));
        }
        self.set_phase(Phase::UserMessageAppended);

        let settings = &self.inner.settings;
        let request = GenerationRequest::new(settings.flavor, settings.model.clone(), text);

        match self.stream_reply(&request).await {
            Ok(()) => {
                self.inner.transcript.send_modify(|t| *t = t.finish());
                self.set_phase(Phase::Finalized);

                let reply = self
                    .inner
                    .transcript
                    .borrow()
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                info!(chars = reply.len(), "Reply complete");
                SubmitOutcome::Completed { reply }
            }
            Err(e) => self.fail(e),
        }
    }

    async fn stream_reply(&self, request: &GenerationRequest) -> Result<(), ReplyError> {
        self.set_phase(Phase::StreamOpening);
        let bytes = self.inner.transport.open(request).await?;

        self.update(|t| t.begin_assistant())?;
        self.set_phase(Phase::StreamingDeltas);

        let fragments = stream::fragments(bytes, request.flavor);
        futures::pin_mut!(fragments);

        while let Some(fragment) = fragments.next().await {
            match fragment? {
                Fragment::Delta(delta) => {
                    self.update(|t| t.append_to_last_assistant_message(&delta))?
                }
                Fragment::Done => break,
                Fragment::Skip => {}
            }
        }

        Ok(())
    }

    fn fail(&self, error: ReplyError) -> SubmitOutcome {
        let error = format!("Error: {}", error);
        tracing::error!("{}", error);

        self.inner.transcript.send_modify(|t| *t = t.fail(error.clone()));
        self.set_phase(Phase::Finalized);

        SubmitOutcome::Failed { error }
    }

    /// Replace the transcript with the snapshot `f` derives from it.
    fn update<F>(&self, f: F) -> Result<(), TranscriptError>
    where
        F: FnOnce(&Transcript) -> Result<Transcript, TranscriptError>,
    {
        let mut result = Ok(());
        self.inner.transcript.send_if_modified(|current| match f(current) {
            Ok(next) => {
                *current = next;
                true
            }
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }

    fn set_phase(&self, phase: Phase) {
        debug!(?phase, "Submission phase");
        self.inner.phase.send_replace(phase);
    }
}

/// Holds the busy flag for one submission.
struct BusyGuard<'a> {
    inner: &'a SessionInner,
}

impl<'a> BusyGuard<'a> {
    fn acquire(inner: &'a SessionInner) -> Result<Self, SubmitError> {
        inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SubmitError::Busy)?;
        Ok(Self { inner })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.inner.phase.send_replace(Phase::Idle);
        self.inner.busy.store(false, Ordering::Release);
    }
}
