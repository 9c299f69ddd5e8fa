//! Speech input backed by a line-oriented transcript stream.
//!
//! Each non-blank line is one finished utterance, as produced by an external
//! speech-to-text tool writing into a FIFO or file. Lines that arrive while
//! the recognizer is disarmed are dropped.

use lesson_core::speech::{ListenPolicy, RecognizerEvent, SpeechError, SpeechRecognizer};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(unix)]
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
#[cfg(unix)]
use tokio::net::unix::pipe;
use tokio::sync::mpsc;

const EVENT_CHANNEL_SIZE: usize = 64;
#[cfg(unix)]
const FIFO_REOPEN_DELAY: Duration = Duration::from_millis(200);

#[derive(Clone)]
struct Shared {
    armed: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    events: mpsc::Sender<RecognizerEvent>,
}

impl Shared {
    fn notify(&self, listening: bool) {
        if let Err(e) = self
            .events
            .try_send(RecognizerEvent::ListeningChanged(listening))
        {
            tracing::warn!("Failed to report listening change: {}", e);
        }
    }

    fn stop(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.notify(false);
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.stop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Eof,
    OwnerGone,
}

pub struct LineRecognizer {
    shared: Shared,
    policy: ListenPolicy,
}

impl LineRecognizer {
    /// Starts reading utterances from `reader` in a background task.
    pub fn spawn<R>(reader: R, policy: ListenPolicy) -> (Self, mpsc::Receiver<RecognizerEvent>)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (recognizer, rx) = Self::detached(policy);
        let shared = recognizer.shared.clone();
        tokio::spawn(async move {
            match read_lines(reader, &shared, policy).await {
                Ok(StreamEnd::OwnerGone) => return,
                Ok(StreamEnd::Eof) => tracing::info!("Transcript source ended"),
                Err(e) => tracing::error!("Transcript source failed: {}", e),
            }
            shared.close();
        });
        (recognizer, rx)
    }

    /// Like `spawn`, but opens `path` inside the task so a FIFO without a writer
    /// does not hold up startup. A FIFO is followed across writer sessions; only
    /// a failed open or a regular file running out ends speech input.
    pub fn from_path(path: PathBuf, policy: ListenPolicy) -> (Self, mpsc::Receiver<RecognizerEvent>) {
        let (recognizer, rx) = Self::detached(policy);
        let shared = recognizer.shared.clone();
        tokio::spawn(async move {
            match follow_path(&path, &shared, policy).await {
                Ok(StreamEnd::OwnerGone) => return,
                Ok(StreamEnd::Eof) => tracing::info!("Transcript source ended"),
                Err(e) => {
                    tracing::error!("Transcript source {} failed: {}", path.display(), e)
                }
            }
            shared.close();
        });
        (recognizer, rx)
    }

    fn detached(policy: ListenPolicy) -> (Self, mpsc::Receiver<RecognizerEvent>) {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let shared = Shared {
            armed: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            events,
        };
        (Self { shared, policy }, rx)
    }

    pub fn policy(&self) -> ListenPolicy {
        self.policy
    }
}

impl SpeechRecognizer for LineRecognizer {
    fn arm(&self) -> Result<(), SpeechError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SpeechError::Unsupported);
        }
        if !self.shared.armed.swap(true, Ordering::SeqCst) {
            self.shared.notify(true);
        }
        Ok(())
    }

    fn disarm(&self) {
        self.shared.stop();
    }
}

async fn follow_path(path: &Path, shared: &Shared, policy: ListenPolicy) -> io::Result<StreamEnd> {
    #[cfg(unix)]
    if is_fifo(path).await? {
        return follow_fifo(path, shared, policy).await;
    }
    let file = tokio::fs::File::open(path).await?;
    tracing::info!("Reading transcripts from {}", path.display());
    read_lines(BufReader::new(file), shared, policy).await
}

#[cfg(unix)]
async fn is_fifo(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::FileTypeExt;
    Ok(tokio::fs::metadata(path).await?.file_type().is_fifo())
}

#[cfg(unix)]
fn open_fifo(path: &Path) -> io::Result<pipe::Receiver> {
    let mut options = pipe::OpenOptions::new();
    // Holding a write end keeps the pipe from reporting end-of-stream between writers.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    options.read_write(true);
    options.open_receiver(path)
}

#[cfg(unix)]
async fn follow_fifo(path: &Path, shared: &Shared, policy: ListenPolicy) -> io::Result<StreamEnd> {
    tracing::info!("Reading transcripts from FIFO {}", path.display());
    loop {
        let receiver = open_fifo(path)?;
        if read_lines(BufReader::new(receiver), shared, policy).await? == StreamEnd::OwnerGone {
            return Ok(StreamEnd::OwnerGone);
        }
        if shared.events.is_closed() {
            return Ok(StreamEnd::OwnerGone);
        }
        tracing::debug!("Transcript writer hung up, reopening {}", path.display());
        tokio::time::sleep(FIFO_REOPEN_DELAY).await;
    }
}

async fn read_lines<R>(reader: R, shared: &Shared, policy: ListenPolicy) -> io::Result<StreamEnd>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if !shared.armed.load(Ordering::SeqCst) {
            tracing::debug!("Not listening, dropping transcript line");
            continue;
        }
        if shared
            .events
            .send(RecognizerEvent::Utterance(text.to_string()))
            .await
            .is_err()
        {
            tracing::debug!("Recognizer owner went away");
            return Ok(StreamEnd::OwnerGone);
        }
        if policy == ListenPolicy::SingleShot {
            shared.stop();
        }
    }
    Ok(StreamEnd::Eof)
}
