//! Streaming Delivery
//!
//! Turns a paginated or progressively-produced result into an ordered
//! sequence of frames delivered incrementally to one caller, instead of
//! one large payload. Frames travel over a bounded channel so a slow
//! consumer suspends the producer rather than growing an unbounded
//! backlog, and the producer yields between items so a single stream
//! cannot starve other in-flight work.
//!
//! On the wire each frame is one JSON object per line, discriminated by
//! its `type` field.

use async_trait::async_trait;
use chrono::Utc;
use fablecraft_core::{new_entity_id, GateError, GateResult, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

// ============================================================================
// FRAMES
// ============================================================================

/// Summary carried by a `stream_complete` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Number of data/progress frames emitted before completion.
    pub total_count: u64,
    /// For generation streams: number of progress steps observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u64>,
    /// For generation streams: the final produced payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// One discrete unit of a streamed response.
///
/// `sequence` is strictly increasing from 0 across the data-bearing
/// frames of a session; start/complete/error frames carry a wall-clock
/// timestamp (milliseconds since the Unix epoch) instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    StreamStart { timestamp: i64 },
    Data { payload: Value, sequence: u64 },
    GenerationProgress { payload: Value, sequence: u64 },
    StreamComplete { summary: StreamSummary, timestamp: i64 },
    StreamError { message: String },
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// SESSION
// ============================================================================

/// Lifecycle of a stream session.
///
/// `Starting → Emitting → {Completed | Failed}`; the terminal states
/// are exclusive and nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Emitting,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Starting => "starting",
            SessionState::Emitting => "emitting",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Bookkeeping for one streaming response, owned by the connection it
/// serves and mutated only by the producer loop.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub id: Uuid,
    pub sequence: u64,
    pub state: SessionState,
    pub started_at: Timestamp,
}

// ============================================================================
// CHANNEL
// ============================================================================

/// Producer half of a streaming response.
///
/// The paired receiver feeds the client connection; dropping it is how
/// consumer disconnection reaches the producer (the next send fails,
/// the session transitions to `Failed`, and no error frame is emitted
/// toward the already-gone client).
#[derive(Debug)]
pub struct StreamingChannel {
    session: StreamSession,
    tx: mpsc::Sender<StreamFrame>,
}

impl StreamingChannel {
    /// Open a session with the given frame backlog and emit the start
    /// frame.
    pub fn open(buffer: usize) -> (Self, mpsc::Receiver<StreamFrame>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let session = StreamSession {
            id: new_entity_id(),
            sequence: 0,
            state: SessionState::Starting,
            started_at: Utc::now(),
        };

        // A freshly opened channel always has room for the start frame.
        let _ = tx.try_send(StreamFrame::StreamStart {
            timestamp: now_millis(),
        });
        tracing::debug!(session_id = %session.id, "Stream session opened");

        (Self { session, tx }, rx)
    }

    /// The session's current bookkeeping.
    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    /// Emit a data frame. Returns the frame's sequence number.
    pub async fn emit(&mut self, payload: Value) -> GateResult<u64> {
        self.emit_sequenced(payload, false).await
    }

    /// Emit a generation-progress frame. Returns the sequence number.
    pub async fn progress(&mut self, payload: Value) -> GateResult<u64> {
        self.emit_sequenced(payload, true).await
    }

    /// Complete the session and release the connection resource.
    pub async fn complete(&mut self, summary: StreamSummary) -> GateResult<()> {
        self.ensure_open()?;
        self.send(StreamFrame::StreamComplete {
            summary,
            timestamp: now_millis(),
        })
        .await?;
        self.session.state = SessionState::Completed;
        tracing::debug!(
            session_id = %self.session.id,
            frames = self.session.sequence,
            "Stream session completed"
        );
        Ok(())
    }

    /// Fail the session, best-effort emitting an error frame.
    ///
    /// A consumer that already disconnected simply never sees the
    /// frame; the session still lands in `Failed`.
    pub async fn fail(&mut self, message: impl Into<String>) -> GateResult<()> {
        self.ensure_open()?;
        let message = message.into();
        let _ = self
            .tx
            .send(StreamFrame::StreamError {
                message: message.clone(),
            })
            .await;
        self.session.state = SessionState::Failed;
        tracing::debug!(session_id = %self.session.id, error = %message, "Stream session failed");
        Ok(())
    }

    async fn emit_sequenced(&mut self, payload: Value, progress: bool) -> GateResult<u64> {
        self.ensure_open()?;
        let sequence = self.session.sequence;
        let frame = if progress {
            StreamFrame::GenerationProgress { payload, sequence }
        } else {
            StreamFrame::Data { payload, sequence }
        };
        self.send(frame).await?;
        self.session.sequence += 1;
        if self.session.state == SessionState::Starting {
            self.session.state = SessionState::Emitting;
        }
        Ok(sequence)
    }

    /// Frames after a terminal state are a programming error in the
    /// producer; the violation is surfaced, never silently dropped.
    fn ensure_open(&self) -> GateResult<()> {
        if self.session.state.is_terminal() {
            tracing::error!(
                session_id = %self.session.id,
                state = %self.session.state,
                "Frame emitted after terminal stream state"
            );
            return Err(GateError::StreamClosed {
                state: self.session.state.to_string(),
            });
        }
        Ok(())
    }

    /// Deliver a frame; a closed receiver means the consumer went away.
    async fn send(&mut self, frame: StreamFrame) -> GateResult<()> {
        if self.tx.send(frame).await.is_err() {
            self.session.state = SessionState::Failed;
            tracing::debug!(session_id = %self.session.id, "Stream consumer disconnected");
            return Err(GateError::StreamAbort);
        }
        Ok(())
    }
}

// ============================================================================
// PAGINATION DRIVER
// ============================================================================

/// One page of a paginated upstream result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Externally supplied paginated fetch, the upstream side of a
/// streamed listing.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, cursor: Option<String>, limit: usize) -> GateResult<Page>;
}

/// Drive a paginated fetch through a streaming channel.
///
/// Each item is emitted as its page arrives rather than after the full
/// result set is buffered, with a cooperative yield between items. If
/// the consumer disconnects, the driver stops consuming upstream pages
/// at the next send point and returns [`GateError::StreamAbort`] with
/// the session in `Failed` - no error frame is sent to the gone client.
/// An upstream failure is forwarded verbatim as a `stream_error` frame.
pub async fn stream_pages<F>(
    mut channel: StreamingChannel,
    fetcher: &F,
    cursor: Option<String>,
    chunk_size: usize,
) -> GateResult<()>
where
    F: PageFetcher + ?Sized,
{
    let mut cursor = cursor;
    let mut total_count: u64 = 0;

    loop {
        let page = match fetcher.fetch_page(cursor.take(), chunk_size).await {
            Ok(page) => page,
            Err(e) => {
                channel.fail(e.to_string()).await?;
                return Err(e);
            }
        };

        for item in page.items {
            channel.emit(item).await?;
            total_count += 1;
            // Cooperative scheduling point: let other in-flight work
            // run between items.
            tokio::task::yield_now().await;
        }

        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }

    channel
        .complete(StreamSummary {
            total_count,
            ..StreamSummary::default()
        })
        .await
}

// ============================================================================
// GENERATION DRIVER
// ============================================================================

/// AI text/image generation backend (external collaborator).
///
/// Progress events are reported through the supplied sender; the final
/// payload is the return value. Failures are typed errors, never a
/// partially valid payload.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate(&self, request: Value, progress: mpsc::Sender<Value>) -> GateResult<Value>;
}

/// Drive an AI generation through a streaming channel.
///
/// Progress events become `generation_progress` frames with sequence
/// numbers; completion emits `stream_complete` carrying the final
/// result and step count. A generator failure is forwarded verbatim as
/// a `stream_error` frame. If the consumer disconnects, forwarding
/// stops and the generation future is dropped with the session in
/// `Failed`.
pub async fn stream_generation<G>(
    mut channel: StreamingChannel,
    generator: &G,
    request: Value,
    progress_buffer: usize,
) -> GateResult<()>
where
    G: StoryGenerator + ?Sized,
{
    let (progress_tx, mut progress_rx) = mpsc::channel::<Value>(progress_buffer.max(1));
    let generation = generator.generate(request, progress_tx);
    tokio::pin!(generation);

    let mut steps: u64 = 0;
    let result = loop {
        tokio::select! {
            event = progress_rx.recv() => {
                match event {
                    Some(payload) => {
                        channel.progress(payload).await?;
                        steps += 1;
                    }
                    // Generator dropped its sender; only completion
                    // remains.
                    None => break (&mut generation).await,
                }
            }
            result = &mut generation => {
                // Flush progress events that raced with completion so
                // sequences stay gapless before the terminal frame.
                while let Ok(payload) = progress_rx.try_recv() {
                    channel.progress(payload).await?;
                    steps += 1;
                }
                break result;
            }
        }
    };

    match result {
        Ok(payload) => {
            channel
                .complete(StreamSummary {
                    total_count: steps,
                    total_steps: Some(steps),
                    result: Some(payload),
                })
                .await
        }
        Err(e) => {
            channel.fail(e.to_string()).await?;
            Err(e)
        }
    }
}
