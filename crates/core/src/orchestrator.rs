//! Runtime for a [`LessonSession`].
//!
//! The orchestrator owns the session and every collaborator. It runs a single
//! loop over front-end actions, recognizer events and completions of the work
//! it spawned, feeds each one through the session and executes the resulting
//! effects. Remote calls and playback never block the loop; they report back
//! as completion events tagged with their turn.

use crate::{
    Effect, TurnId,
    dialogue::DialogueEngine,
    session_state::{LessonSession, SessionEvent},
    speech::{AudioPlayer, RecognizerEvent, SpeechError, SpeechRecognizer, SpeechSynthesizer},
    status::{LessonUpdate, StatusSnapshot},
};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const ACTION_CHANNEL_SIZE: usize = 32;
const UPDATE_CHANNEL_SIZE: usize = 128;
const COMPLETION_CHANNEL_SIZE: usize = 8;

/// Deadlines for the three suspension points of a turn.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub reply_timeout: Duration,
    pub synthesis_timeout: Duration,
    pub playback_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(30),
            synthesis_timeout: Duration::from_secs(45),
            playback_timeout: Duration::from_secs(180),
        }
    }
}

/// What the student can do on the lesson screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonAction {
    SubmitText(String),
    ToggleMic,
    ExplainStep,
    NextStep,
    Back,
}

impl From<LessonAction> for SessionEvent {
    fn from(action: LessonAction) -> Self {
        match action {
            LessonAction::SubmitText(text) => SessionEvent::TextSubmitted(text),
            LessonAction::ToggleMic => SessionEvent::MicToggled,
            LessonAction::ExplainStep => SessionEvent::ExplainRequested,
            LessonAction::NextStep => SessionEvent::NextStepRequested,
            LessonAction::Back => SessionEvent::Exit,
        }
    }
}

/// The adapters a lesson talks to.
pub struct Collaborators {
    pub dialogue: Arc<dyn DialogueEngine>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub player: Arc<dyn AudioPlayer>,
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub recognizer_events: mpsc::Receiver<RecognizerEvent>,
}

/// The front-end's side of a running lesson.
pub struct LessonHandle {
    pub actions: mpsc::Sender<LessonAction>,
    pub updates: mpsc::Receiver<LessonUpdate>,
    pub status: watch::Receiver<StatusSnapshot>,
}

pub struct LessonOrchestrator {
    session: LessonSession,
    dialogue: Arc<dyn DialogueEngine>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    recognizer: Box<dyn SpeechRecognizer>,
    recognizer_events: mpsc::Receiver<RecognizerEvent>,
    recognizer_open: bool,
    actions: mpsc::Receiver<LessonAction>,
    completions_tx: mpsc::Sender<SessionEvent>,
    completions_rx: mpsc::Receiver<SessionEvent>,
    updates: mpsc::Sender<LessonUpdate>,
    status: watch::Sender<StatusSnapshot>,
    config: OrchestratorConfig,
}

impl LessonOrchestrator {
    pub fn new(
        session: LessonSession,
        collaborators: Collaborators,
        config: OrchestratorConfig,
    ) -> (Self, LessonHandle) {
        let (actions_tx, actions_rx) = mpsc::channel(ACTION_CHANNEL_SIZE);
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_SIZE);
        let (completions_tx, completions_rx) = mpsc::channel(COMPLETION_CHANNEL_SIZE);
        let (status_tx, status_rx) = watch::channel(session.snapshot());

        let orchestrator = Self {
            session,
            dialogue: collaborators.dialogue,
            synthesizer: collaborators.synthesizer,
            player: collaborators.player,
            recognizer: collaborators.recognizer,
            recognizer_events: collaborators.recognizer_events,
            recognizer_open: true,
            actions: actions_rx,
            completions_tx,
            completions_rx,
            updates: updates_tx,
            status: status_tx,
            config,
        };
        let handle = LessonHandle {
            actions: actions_tx,
            updates: updates_rx,
            status: status_rx,
        };
        (orchestrator, handle)
    }

    /// Bootstraps the lesson and processes events until the student leaves.
    pub async fn run(mut self) -> Result<()> {
        self.dispatch(SessionEvent::Started).await;
        while !self.session.is_closed() {
            let event = self.next_event().await;
            self.dispatch(event).await;
        }
        tracing::info!(
            "Lesson finished with {} turns",
            self.session.conversation().len()
        );
        Ok(())
    }

    async fn next_event(&mut self) -> SessionEvent {
        loop {
            let event = tokio::select! {
                action = self.actions.recv() => match action {
                    Some(action) => Some(action.into()),
                    None => {
                        tracing::info!("Front-end went away, closing lesson");
                        Some(SessionEvent::Exit)
                    }
                },
                Some(done) = self.completions_rx.recv() => Some(done),
                event = self.recognizer_events.recv(), if self.recognizer_open => match event {
                    Some(RecognizerEvent::Utterance(text)) => Some(SessionEvent::Utterance(text)),
                    Some(RecognizerEvent::ListeningChanged(on)) => {
                        Some(SessionEvent::ListeningChanged(on))
                    }
                    None => {
                        tracing::debug!("Recognizer event channel closed");
                        self.recognizer_open = false;
                        None
                    }
                },
            };
            if let Some(event) = event {
                return event;
            }
        }
    }

    async fn dispatch(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.session.handle(event) {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
        self.status.send_replace(self.session.snapshot());
    }

    async fn execute(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::ArmMic => match self.recognizer.arm() {
                Ok(()) => None,
                Err(SpeechError::Unsupported) => Some(SessionEvent::MicUnsupported),
            },
            Effect::DisarmMic => {
                self.recognizer.disarm();
                None
            }
            Effect::RequestReply {
                turn,
                prompt,
                system_instruction,
            } => {
                self.spawn_reply(turn, prompt, system_instruction);
                None
            }
            Effect::Synthesize { turn, text } => {
                self.spawn_synthesis(turn, text);
                None
            }
            Effect::Play { turn, audio } => {
                self.spawn_playback(turn, audio);
                None
            }
            Effect::Publish(update) => {
                if self.updates.send(update).await.is_err() {
                    tracing::debug!("No front-end listening for lesson updates");
                }
                None
            }
        }
    }

    fn spawn_reply(&self, turn: TurnId, prompt: String, system_instruction: String) {
        let dialogue = Arc::clone(&self.dialogue);
        let done = self.completions_tx.clone();
        let deadline = self.config.reply_timeout;
        tokio::spawn(async move {
            tracing::debug!("Requesting reply for turn {}", turn);
            let event = match tokio::time::timeout(
                deadline,
                dialogue.reply(&prompt, &system_instruction),
            )
            .await
            {
                Ok(Ok(text)) => SessionEvent::ReplyReady { turn, text },
                Ok(Err(e)) => SessionEvent::ReplyFailed {
                    turn,
                    reason: e.to_string(),
                },
                Err(_) => SessionEvent::ReplyFailed {
                    turn,
                    reason: format!("no reply within {:?}", deadline),
                },
            };
            report(done, turn, event).await;
        });
    }

    fn spawn_synthesis(&self, turn: TurnId, text: String) {
        let synthesizer = Arc::clone(&self.synthesizer);
        let done = self.completions_tx.clone();
        let deadline = self.config.synthesis_timeout;
        tokio::spawn(async move {
            let audio = match tokio::time::timeout(deadline, synthesizer.synthesize(&text)).await {
                Ok(audio) => audio,
                Err(_) => {
                    tracing::warn!("Speech synthesis for turn {} timed out", turn);
                    None
                }
            };
            report(done, turn, SessionEvent::SynthesisDone { turn, audio }).await;
        });
    }

    fn spawn_playback(&self, turn: TurnId, audio: Vec<u8>) {
        let player = Arc::clone(&self.player);
        let done = self.completions_tx.clone();
        let deadline = self.config.playback_timeout;
        tokio::spawn(async move {
            tracing::debug!("Playing {} bytes of audio for turn {}", audio.len(), turn);
            if tokio::time::timeout(deadline, player.play(audio)).await.is_err() {
                tracing::warn!("Playback for turn {} did not finish within {:?}", turn, deadline);
            }
            report(done, turn, SessionEvent::PlaybackDone { turn }).await;
        });
    }
}

async fn report(done: mpsc::Sender<SessionEvent>, turn: TurnId, event: SessionEvent) {
    if done.send(event).await.is_err() {
        tracing::debug!("Lesson closed before turn {} completed", turn);
    }
}
