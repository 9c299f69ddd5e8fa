use crate::{
    Effect, TurnId,
    conversation::{Conversation, Turn},
    dialogue::or_fallback,
    lesson::LessonProgress,
    prompts::LessonContext,
    status::{Activity, LessonUpdate, Notice, StatusSnapshot},
};

/// The three independent flags the orchestrator state is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnFlags {
    pub generating: bool,
    /// Synthesizing or playing audio.
    pub speaking: bool,
    pub mic_armed: bool,
}

impl TurnFlags {
    pub fn activity(&self) -> Activity {
        if self.generating {
            Activity::Generating
        } else if self.speaking {
            Activity::Speaking
        } else {
            Activity::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.generating || self.speaking
    }
}

/// Everything that can happen to a lesson session: front-end actions,
/// recognizer events and completions of work the session asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    Utterance(String),
    TextSubmitted(String),
    ExplainRequested,
    NextStepRequested,
    MicToggled,
    ListeningChanged(bool),
    MicUnsupported,
    ReplyReady { turn: TurnId, text: String },
    ReplyFailed { turn: TurnId, reason: String },
    SynthesisDone { turn: TurnId, audio: Option<Vec<u8>> },
    PlaybackDone { turn: TurnId },
    Exit,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Started => "started",
            SessionEvent::Utterance(_) => "utterance",
            SessionEvent::TextSubmitted(_) => "text_submitted",
            SessionEvent::ExplainRequested => "explain_requested",
            SessionEvent::NextStepRequested => "next_step_requested",
            SessionEvent::MicToggled => "mic_toggled",
            SessionEvent::ListeningChanged(_) => "listening_changed",
            SessionEvent::MicUnsupported => "mic_unsupported",
            SessionEvent::ReplyReady { .. } => "reply_ready",
            SessionEvent::ReplyFailed { .. } => "reply_failed",
            SessionEvent::SynthesisDone { .. } => "synthesis_done",
            SessionEvent::PlaybackDone { .. } => "playback_done",
            SessionEvent::Exit => "exit",
        }
    }
}

/// The lesson's dialogue state machine.
///
/// `handle` is the only way state changes; it never performs I/O and instead
/// returns the effects the runtime must carry out, in order.
pub struct LessonSession {
    context: LessonContext,
    conversation: Conversation,
    progress: LessonProgress,
    flags: TurnFlags,
    dialogue_intent: bool,
    listening: bool,
    speech_input_supported: bool,
    unsupported_notice_shown: bool,
    active_turn: Option<TurnId>,
    next_turn_id: u64,
    started: bool,
    closed: bool,
}

impl LessonSession {
    pub fn new(context: LessonContext) -> Self {
        Self {
            context,
            conversation: Conversation::new(),
            progress: LessonProgress::new(),
            flags: TurnFlags::default(),
            dialogue_intent: false,
            listening: false,
            speech_input_supported: true,
            unsupported_notice_shown: false,
            active_turn: None,
            next_turn_id: 0,
            started: false,
            closed: false,
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        if self.closed {
            tracing::debug!("Lesson already closed, ignoring '{}' event", event.name());
            return Vec::new();
        }
        tracing::trace!("Handling '{}' event", event.name());

        let mut effects = Vec::new();
        match event {
            SessionEvent::Started => self.bootstrap(&mut effects),
            SessionEvent::Utterance(text) => self.on_utterance(text, &mut effects),
            SessionEvent::TextSubmitted(text) => self.start_student_turn(&text, &mut effects),
            SessionEvent::ExplainRequested => self.explain_step(&mut effects),
            SessionEvent::NextStepRequested => self.next_step(&mut effects),
            SessionEvent::MicToggled => self.toggle_dialogue_mode(&mut effects),
            SessionEvent::ListeningChanged(on) => self.on_listening_changed(on, &mut effects),
            SessionEvent::MicUnsupported => self.on_mic_unsupported(&mut effects),
            SessionEvent::ReplyReady { turn, text } => self.on_reply(turn, &text, &mut effects),
            SessionEvent::ReplyFailed { turn, reason } => {
                if self.is_active(turn) {
                    tracing::warn!("Reply for turn {} failed: {}", turn, reason);
                    self.finish_turn(&mut effects);
                }
            }
            SessionEvent::SynthesisDone { turn, audio } => {
                if self.is_active(turn) && self.flags.speaking {
                    match audio {
                        Some(audio) if !audio.is_empty() => {
                            effects.push(Effect::Play { turn, audio });
                        }
                        _ => {
                            tracing::info!("No audio for turn {}, showing text only", turn);
                            self.finish_turn(&mut effects);
                        }
                    }
                }
            }
            SessionEvent::PlaybackDone { turn } => {
                if self.is_active(turn) && self.flags.speaking {
                    self.finish_turn(&mut effects);
                }
            }
            SessionEvent::Exit => self.exit(&mut effects),
        }

        debug_assert!(
            !(self.flags.mic_armed && self.flags.is_busy()),
            "microphone armed while a turn is in flight"
        );
        effects
    }

    pub fn context(&self) -> &LessonContext {
        &self.context
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn progress(&self) -> &LessonProgress {
        &self.progress
    }

    pub fn flags(&self) -> TurnFlags {
        self.flags
    }

    pub fn dialogue_intent(&self) -> bool {
        self.dialogue_intent
    }

    pub fn active_turn(&self) -> Option<TurnId> {
        self.active_turn
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            activity: self.flags.activity(),
            listening: self.listening,
            dialogue_active: self.dialogue_intent,
            step: self.progress.current_step(),
            step_number: self.progress.step_number(),
            step_count: crate::lesson::STEP_COUNT,
            progress_percent: self.progress.percent_complete(),
            turns: self.conversation.len(),
            closed: self.closed,
        }
    }

    // The opening turn is tutor-only: nothing is appended until the reply arrives.
    fn bootstrap(&mut self, effects: &mut Vec<Effect>) {
        if self.started {
            tracing::debug!("Lesson already started");
            return;
        }
        self.started = true;
        tracing::info!(
            "Starting unit {} for {}",
            self.context.unit.id,
            self.context.student_name
        );
        let prompt = self.context.intro_prompt(self.progress.current_step());
        self.begin_generation(prompt, effects);
    }

    fn on_utterance(&mut self, text: String, effects: &mut Vec<Effect>) {
        if self.flags.speaking {
            tracing::debug!("Discarding utterance captured while the tutor is speaking");
            return;
        }
        if !self.dialogue_intent {
            tracing::debug!("Discarding utterance received with dialogue mode off");
            return;
        }
        self.start_student_turn(&text, effects);
    }

    fn start_student_turn(&mut self, text: &str, effects: &mut Vec<Effect>) {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring empty input");
            return;
        }
        if self.flags.is_busy() {
            tracing::info!("A turn is already in progress, rejecting new input");
            return;
        }
        self.silence_mic(effects);
        let turn = self.conversation.push(Turn::student(text));
        effects.push(Effect::Publish(LessonUpdate::TurnAppended(turn)));
        effects.push(Effect::Publish(LessonUpdate::ClearInput));
        self.request_reply(text.to_string(), effects);
    }

    fn explain_step(&mut self, effects: &mut Vec<Effect>) {
        if self.flags.is_busy() {
            tracing::info!("A turn is already in progress, rejecting explain request");
            return;
        }
        let prompt = self.context.explain_prompt(self.progress.current_step());
        self.begin_generation(prompt, effects);
    }

    fn next_step(&mut self, effects: &mut Vec<Effect>) {
        if self.flags.is_busy() {
            tracing::info!("A turn is already in progress, rejecting step advance");
            return;
        }
        if self.progress.advance() {
            tracing::info!(
                "Advanced to step {} ({})",
                self.progress.step_number(),
                self.progress.current_step()
            );
        } else {
            tracing::debug!("Already on the last step");
        }
        let ready = self.context.ready_utterance(self.progress.current_step());
        self.start_student_turn(&ready, effects);
    }

    fn begin_generation(&mut self, prompt: String, effects: &mut Vec<Effect>) {
        self.silence_mic(effects);
        self.request_reply(prompt, effects);
    }

    fn silence_mic(&mut self, effects: &mut Vec<Effect>) {
        self.flags.mic_armed = false;
        effects.push(Effect::DisarmMic);
    }

    fn request_reply(&mut self, prompt: String, effects: &mut Vec<Effect>) {
        self.flags.generating = true;
        let turn = TurnId(self.next_turn_id);
        self.next_turn_id += 1;
        self.active_turn = Some(turn);

        let system_instruction = self
            .context
            .system_instruction(self.progress.current_step());
        effects.push(Effect::RequestReply {
            turn,
            prompt,
            system_instruction,
        });
    }

    fn on_reply(&mut self, turn: TurnId, text: &str, effects: &mut Vec<Effect>) {
        if !self.is_active(turn) || !self.flags.generating {
            return;
        }
        self.flags.generating = false;
        let text = or_fallback(text);
        let appended = self.conversation.push(Turn::tutor(text.clone()));
        effects.push(Effect::Publish(LessonUpdate::TurnAppended(appended)));

        self.flags.mic_armed = false;
        self.flags.speaking = true;
        effects.push(Effect::Synthesize { turn, text });
    }

    fn finish_turn(&mut self, effects: &mut Vec<Effect>) {
        self.flags.generating = false;
        self.flags.speaking = false;
        self.active_turn = None;
        self.restore_listening(effects);
    }

    /// The one place that decides whether the microphone should be re-armed.
    fn restore_listening(&mut self, effects: &mut Vec<Effect>) {
        if self.dialogue_intent
            && self.speech_input_supported
            && !self.flags.is_busy()
            && !self.flags.mic_armed
        {
            self.flags.mic_armed = true;
            effects.push(Effect::ArmMic);
        }
    }

    fn toggle_dialogue_mode(&mut self, effects: &mut Vec<Effect>) {
        if !self.speech_input_supported {
            self.notify_unsupported(effects);
            return;
        }
        if self.dialogue_intent {
            tracing::info!("Dialogue mode off");
            self.dialogue_intent = false;
            self.flags.mic_armed = false;
            effects.push(Effect::DisarmMic);
        } else {
            tracing::info!("Dialogue mode on");
            self.dialogue_intent = true;
            effects.push(Effect::Publish(LessonUpdate::ClearInput));
            self.restore_listening(effects);
        }
    }

    fn on_listening_changed(&mut self, on: bool, effects: &mut Vec<Effect>) {
        self.listening = on;
        if on && !self.flags.mic_armed {
            tracing::debug!("Recognizer reports listening while disarmed");
            effects.push(Effect::DisarmMic);
        } else if !on && self.flags.mic_armed {
            tracing::debug!("Recognizer stopped on its own");
            self.flags.mic_armed = false;
            self.restore_listening(effects);
        }
    }

    fn on_mic_unsupported(&mut self, effects: &mut Vec<Effect>) {
        tracing::warn!("Speech input unsupported, dialogue mode disabled");
        self.speech_input_supported = false;
        self.dialogue_intent = false;
        self.flags.mic_armed = false;
        self.listening = false;
        self.notify_unsupported(effects);
    }

    fn notify_unsupported(&mut self, effects: &mut Vec<Effect>) {
        if !self.unsupported_notice_shown {
            self.unsupported_notice_shown = true;
            effects.push(Effect::Publish(LessonUpdate::Notice(
                Notice::SpeechInputUnsupported,
            )));
        }
    }

    fn exit(&mut self, effects: &mut Vec<Effect>) {
        tracing::info!("Leaving lesson after {} turns", self.conversation.len());
        self.closed = true;
        self.dialogue_intent = false;
        self.flags = TurnFlags::default();
        self.listening = false;
        self.active_turn = None;
        effects.push(Effect::DisarmMic);
        effects.push(Effect::Publish(LessonUpdate::Closed));
    }

    fn is_active(&self, turn: TurnId) -> bool {
        if self.active_turn == Some(turn) {
            true
        } else {
            tracing::debug!(
                "Ignoring stale completion for turn {} (active: {:?})",
                turn,
                self.active_turn
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Speaker;
    use crate::lesson::{STEP_COUNT, TeachingMode, Unit};

    fn session() -> LessonSession {
        let unit = Unit {
            id: 1,
            title: "Let's Get Started!".to_string(),
            subtitle: "Greetings and Classroom Objects".to_string(),
            vocabulary: vec!["hello".to_string(), "chair".to_string()],
            phonics: vec![],
            language_in_use: "Hello, I'm Ali.".to_string(),
            life_skills: vec![],
        };
        LessonSession::new(LessonContext::new(unit, "Lina", TeachingMode::Mixed))
    }

    fn requested_turn(effects: &[Effect]) -> TurnId {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::RequestReply { turn, .. } => Some(*turn),
                _ => None,
            })
            .expect("a reply should have been requested")
    }

    fn has(effects: &[Effect], pred: impl Fn(&Effect) -> bool) -> bool {
        effects.iter().any(pred)
    }

    fn arms(effects: &[Effect]) -> usize {
        effects.iter().filter(|e| matches!(e, Effect::ArmMic)).count()
    }

    /// Runs the bootstrap turn to completion without audio.
    fn started_and_idle() -> LessonSession {
        let mut s = session();
        let turn = requested_turn(&s.handle(SessionEvent::Started));
        s.handle(SessionEvent::ReplyReady {
            turn,
            text: "Hello Lina!".to_string(),
        });
        s.handle(SessionEvent::SynthesisDone { turn, audio: None });
        assert_eq!(s.flags().activity(), Activity::Idle);
        s
    }

    #[test]
    fn test_bootstrap_produces_one_tutor_turn_before_any_student_turn() {
        // --- 1. Arrange ---
        let mut s = session();

        // --- 2. Act ---
        let effects = s.handle(SessionEvent::Started);

        // --- 3. Assert ---
        assert!(s.conversation().is_empty(), "nothing is appended before the reply");
        assert_eq!(s.flags().activity(), Activity::Generating);
        let turn = requested_turn(&effects);
        assert!(has(&effects, |e| matches!(
            e,
            Effect::RequestReply { prompt, system_instruction, .. }
                if prompt.contains("Lina") && system_instruction.contains("Let's Get Started!")
        )));

        let effects = s.handle(SessionEvent::ReplyReady {
            turn,
            text: "Welcome, Lina!".to_string(),
        });
        assert_eq!(s.conversation().turns(), &[Turn::tutor("Welcome, Lina!")]);
        assert_eq!(s.flags().activity(), Activity::Speaking);
        assert!(has(&effects, |e| matches!(e, Effect::Synthesize { .. })));

        let effects = s.handle(SessionEvent::SynthesisDone {
            turn,
            audio: Some(vec![1, 2, 3, 4]),
        });
        assert!(has(&effects, |e| matches!(e, Effect::Play { audio, .. } if audio.len() == 4)));

        s.handle(SessionEvent::PlaybackDone { turn });
        assert_eq!(s.flags(), TurnFlags::default());
        assert_eq!(s.conversation().count(Speaker::Student), 0);

        // A second start is ignored.
        assert!(s.handle(SessionEvent::Started).is_empty());
    }

    #[test]
    fn test_utterance_while_speaking_is_discarded() {
        let mut s = session();
        let turn = requested_turn(&s.handle(SessionEvent::Started));

        // Turning dialogue mode on mid-turn defers arming.
        let effects = s.handle(SessionEvent::MicToggled);
        assert!(s.dialogue_intent());
        assert_eq!(arms(&effects), 0);
        assert!(!s.flags().mic_armed);

        s.handle(SessionEvent::ReplyReady {
            turn,
            text: "Let's begin!".to_string(),
        });
        assert!(s.flags().speaking);

        let effects = s.handle(SessionEvent::Utterance("hello".to_string()));
        assert!(effects.is_empty());
        assert_eq!(s.conversation().len(), 1);

        s.handle(SessionEvent::SynthesisDone {
            turn,
            audio: Some(vec![0; 8]),
        });
        let effects = s.handle(SessionEvent::PlaybackDone { turn });
        assert_eq!(arms(&effects), 1, "deferred arming happens on return to idle");
        assert!(s.flags().mic_armed);
    }

    #[test]
    fn test_reply_failure_returns_to_idle_and_rearms() {
        let mut s = started_and_idle();
        let effects = s.handle(SessionEvent::MicToggled);
        assert_eq!(arms(&effects), 1);

        let effects = s.handle(SessionEvent::Utterance("I like red".to_string()));
        assert!(has(&effects, |e| matches!(e, Effect::DisarmMic)));
        assert!(!s.flags().mic_armed);
        let turn = requested_turn(&effects);
        assert_eq!(s.conversation().last(), Some(&Turn::student("I like red")));

        let effects = s.handle(SessionEvent::ReplyFailed {
            turn,
            reason: "quota exceeded".to_string(),
        });
        assert_eq!(s.conversation().count(Speaker::Tutor), 1, "no new tutor turn");
        assert_eq!(s.flags().activity(), Activity::Idle);
        assert_eq!(arms(&effects), 1);
        assert!(s.flags().mic_armed);
    }

    #[test]
    fn test_step_advance_ten_times_saturates() {
        let mut s = started_and_idle();
        let ready = s.context().ready_utterance(s.progress().current_step());

        for _ in 0..10 {
            let effects = s.handle(SessionEvent::NextStepRequested);
            let turn = requested_turn(&effects);
            s.handle(SessionEvent::ReplyFailed {
                turn,
                reason: "offline".to_string(),
            });
        }

        assert_eq!(s.progress().current_step_index(), STEP_COUNT - 1);
        assert_eq!(s.conversation().count(Speaker::Student), 10);
        assert!(s
            .conversation()
            .turns()
            .iter()
            .filter(|t| t.speaker == Speaker::Student)
            .all(|t| t.text == ready));
    }

    #[test]
    fn test_missing_audio_goes_straight_to_idle() {
        let mut s = started_and_idle();
        let turn = requested_turn(&s.handle(SessionEvent::TextSubmitted("red".to_string())));
        s.handle(SessionEvent::ReplyReady {
            turn,
            text: "Red يعني أحمر".to_string(),
        });

        let effects = s.handle(SessionEvent::SynthesisDone {
            turn,
            audio: Some(Vec::new()),
        });
        assert!(!has(&effects, |e| matches!(e, Effect::Play { .. })));
        assert_eq!(s.flags().activity(), Activity::Idle);
        assert_eq!(s.conversation().last(), Some(&Turn::tutor("Red يعني أحمر")));
    }

    #[test]
    fn test_empty_reply_is_replaced_by_fallback() {
        let mut s = session();
        let turn = requested_turn(&s.handle(SessionEvent::Started));
        s.handle(SessionEvent::ReplyReady {
            turn,
            text: "   ".to_string(),
        });
        assert_eq!(
            s.conversation().last().map(|t| t.text.as_str()),
            Some(crate::dialogue::FALLBACK_REPLY)
        );
    }

    #[test]
    fn test_explain_does_not_log_a_student_turn() {
        let mut s = started_and_idle();
        let effects = s.handle(SessionEvent::ExplainRequested);
        assert!(has(&effects, |e| matches!(
            e,
            Effect::RequestReply { prompt, .. } if prompt.contains("WARM_UP") && prompt.contains("Let's Get Started!")
        )));
        assert_eq!(s.conversation().count(Speaker::Student), 0);
        assert_eq!(s.flags().activity(), Activity::Generating);
    }

    #[test]
    fn test_turn_starts_are_rejected_while_busy() {
        let mut s = session();
        s.handle(SessionEvent::Started);

        assert!(s.handle(SessionEvent::TextSubmitted("hi".to_string())).is_empty());
        assert!(s.handle(SessionEvent::ExplainRequested).is_empty());
        assert!(s.handle(SessionEvent::NextStepRequested).is_empty());
        assert_eq!(s.progress().current_step_index(), 0);
        assert!(s.conversation().is_empty());
    }

    #[test]
    fn test_student_turn_disarms_the_mic_before_publishing() {
        let mut s = started_and_idle();
        s.handle(SessionEvent::MicToggled);
        assert!(s.flags().mic_armed);

        let effects = s.handle(SessionEvent::Utterance("hello".to_string()));
        assert_eq!(effects.first(), Some(&Effect::DisarmMic));
        assert_eq!(
            effects.iter().filter(|e| matches!(e, Effect::DisarmMic)).count(),
            1
        );
        assert_eq!(
            &effects[1..3],
            &[
                Effect::Publish(LessonUpdate::TurnAppended(Turn::student("hello"))),
                Effect::Publish(LessonUpdate::ClearInput),
            ]
        );
        assert!(matches!(effects[3], Effect::RequestReply { .. }));
    }

    #[test]
    fn test_blank_input_never_starts_a_turn() {
        let mut s = started_and_idle();
        s.handle(SessionEvent::MicToggled);

        assert!(s.handle(SessionEvent::TextSubmitted("   ".to_string())).is_empty());
        assert!(s.handle(SessionEvent::Utterance("\n".to_string())).is_empty());
        assert_eq!(s.flags().activity(), Activity::Idle);
    }

    #[test]
    fn test_toggle_off_mid_turn_suppresses_rearm() {
        let mut s = started_and_idle();
        s.handle(SessionEvent::MicToggled);
        let turn = requested_turn(&s.handle(SessionEvent::Utterance("hello".to_string())));

        let effects = s.handle(SessionEvent::MicToggled);
        assert!(has(&effects, |e| matches!(e, Effect::DisarmMic)));
        assert!(!s.dialogue_intent());

        // The in-flight turn still completes.
        s.handle(SessionEvent::ReplyReady {
            turn,
            text: "Hi!".to_string(),
        });
        let effects = s.handle(SessionEvent::SynthesisDone { turn, audio: None });
        assert_eq!(arms(&effects), 0);
        assert!(!s.flags().mic_armed);
        assert_eq!(s.conversation().last(), Some(&Turn::tutor("Hi!")));
    }

    #[test]
    fn test_turning_dialogue_mode_on_clears_manual_input() {
        let mut s = started_and_idle();
        let effects = s.handle(SessionEvent::MicToggled);
        assert_eq!(
            effects,
            vec![Effect::Publish(LessonUpdate::ClearInput), Effect::ArmMic]
        );
    }

    #[test]
    fn test_unsupported_speech_input_notifies_once() {
        let mut s = started_and_idle();
        let effects = s.handle(SessionEvent::MicToggled);
        assert_eq!(arms(&effects), 1);

        let effects = s.handle(SessionEvent::MicUnsupported);
        assert_eq!(
            effects,
            vec![Effect::Publish(LessonUpdate::Notice(
                Notice::SpeechInputUnsupported
            ))]
        );
        assert!(!s.dialogue_intent());
        assert!(!s.flags().mic_armed);

        // Further toggles are inert.
        assert!(s.handle(SessionEvent::MicToggled).is_empty());
        assert!(s.handle(SessionEvent::MicToggled).is_empty());
        assert!(!s.dialogue_intent());
    }

    #[test]
    fn test_recognizer_stopping_on_its_own_is_rearmed_once() {
        let mut s = started_and_idle();
        s.handle(SessionEvent::MicToggled);
        assert!(s.handle(SessionEvent::ListeningChanged(true)).is_empty());

        let effects = s.handle(SessionEvent::ListeningChanged(false));
        assert_eq!(effects, vec![Effect::ArmMic]);

        // A stop we asked for is not undone.
        s.handle(SessionEvent::MicToggled);
        assert!(s.handle(SessionEvent::ListeningChanged(false)).is_empty());
    }

    #[test]
    fn test_stale_and_post_exit_completions_are_ignored() {
        let mut s = session();
        let turn = requested_turn(&s.handle(SessionEvent::Started));

        let effects = s.handle(SessionEvent::ReplyReady {
            turn: TurnId(turn.0 + 7),
            text: "Wrong turn".to_string(),
        });
        assert!(effects.is_empty());
        assert!(s.conversation().is_empty());

        let effects = s.handle(SessionEvent::Exit);
        assert!(has(&effects, |e| matches!(e, Effect::Publish(LessonUpdate::Closed))));
        assert!(s.is_closed());

        assert!(s
            .handle(SessionEvent::ReplyReady {
                turn,
                text: "Late".to_string()
            })
            .is_empty());
        assert!(s.conversation().is_empty());
        assert!(s.handle(SessionEvent::MicToggled).is_empty());
    }

    #[test]
    fn test_mic_is_never_armed_while_speaking() {
        // Drive the session with a long pseudo-random event sequence and check
        // the invariant after every step.
        let mut s = session();
        let mut pending: Vec<SessionEvent> = Vec::new();
        let mut seed: u64 = 0x5eed;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        };

        let mut effects = s.handle(SessionEvent::Started);
        for _ in 0..2_000 {
            for effect in effects.drain(..) {
                match effect {
                    Effect::RequestReply { turn, .. } => pending.push(if next() % 4 == 0 {
                        SessionEvent::ReplyFailed {
                            turn,
                            reason: "boom".to_string(),
                        }
                    } else {
                        SessionEvent::ReplyReady {
                            turn,
                            text: "ok".to_string(),
                        }
                    }),
                    Effect::Synthesize { turn, .. } => pending.push(SessionEvent::SynthesisDone {
                        turn,
                        audio: (next() % 3 != 0).then(|| vec![0; 2]),
                    }),
                    Effect::Play { turn, .. } => pending.push(SessionEvent::PlaybackDone { turn }),
                    Effect::ArmMic => pending.push(SessionEvent::ListeningChanged(true)),
                    Effect::DisarmMic | Effect::Publish(_) => {}
                }
            }

            let event = match next() % 8 {
                0 => SessionEvent::MicToggled,
                1 => SessionEvent::Utterance("hello".to_string()),
                2 => SessionEvent::NextStepRequested,
                3 => SessionEvent::ExplainRequested,
                4 => SessionEvent::TextSubmitted("red".to_string()),
                5 => SessionEvent::ListeningChanged(false),
                _ if !pending.is_empty() => pending.remove(0),
                _ => SessionEvent::Utterance(" ".to_string()),
            };
            let before = s.progress().current_step_index();
            effects = s.handle(event);

            let flags = s.flags();
            assert!(!(flags.mic_armed && flags.speaking));
            assert!(!(flags.mic_armed && flags.generating));
            assert!(s.progress().current_step_index() >= before);
            assert!(s.progress().current_step_index() < STEP_COUNT);
        }
    }
}
