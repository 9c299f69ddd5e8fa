//! Prompt templates for the tutor persona.
//!
//! Every prompt is a template with `{placeholder}` markers filled from the
//! [`LessonContext`]. Templates can be replaced wholesale by overrides keyed on
//! `system`, `intro`, `explain` and `ready`.

use crate::lesson::{LessonStep, TeachingMode, Unit};
use std::collections::HashMap;

const SYSTEM_TEMPLATE: &str = r#"You are "Super Miss", the 3D superhero teacher.
Student: {student}. Mode: {mode}. Lesson: {unit_title} ({unit_subtitle}).
Current step: {step}.
Vocabulary: {vocabulary}.
Phonics: {phonics}.
Language in use: {language_in_use}.

CORE RULES:
1. {language_rule}
2. SLOW DELIVERY: Keep sentences short. Imagine you are teaching a 7-year-old child in Egypt.
3. INTERACTIVE: Ask simple questions. If they answer correctly, cheer!
4. START CLEARLY: Begin each step with a friendly introduction."#;

const MIXED_LANGUAGE_RULE: &str = r#"BILINGUAL CONTENT: For every English word or sentence, follow it immediately with "يعني [Arabic translation]". Example: "The chair is blue يعني الكرسي لونه أزرق"."#;
const ENGLISH_LANGUAGE_RULE: &str =
    "ENGLISH ONLY: Use simple English words only. Never translate into another language.";

const INTRO_TEMPLATE: &str = "Start Unit {unit_id} intro for {student}. {delivery}";
const EXPLAIN_TEMPLATE: &str = r#"Explain "{step}" from "{unit_title}". {explain_delivery}"#;

const MIXED_DELIVERY: &str = "Speak very slowly, English then Arabic translation.";
const ENGLISH_DELIVERY: &str = "Speak very slowly, in simple English only.";
const MIXED_EXPLAIN_DELIVERY: &str =
    "Read the English words/sentences then their Arabic meanings slowly.";
const ENGLISH_EXPLAIN_DELIVERY: &str = "Read the English words and sentences slowly and clearly.";

const MIXED_READY: &str = "أنا مستعد للمرحلة الجاية يا سوبر ميس! 🚀";
const ENGLISH_READY: &str = "I'm ready for the next step, Super Miss! 🚀";

pub const PROMPT_KEYS: [&str; 4] = ["system", "intro", "explain", "ready"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub system: String,
    pub intro: String,
    pub explain: String,
    pub ready: String,
}

impl PromptSet {
    pub fn for_mode(mode: TeachingMode) -> Self {
        let ready = match mode {
            TeachingMode::Mixed => MIXED_READY,
            TeachingMode::English => ENGLISH_READY,
        };
        Self {
            system: SYSTEM_TEMPLATE.to_string(),
            intro: INTRO_TEMPLATE.to_string(),
            explain: EXPLAIN_TEMPLATE.to_string(),
            ready: ready.to_string(),
        }
    }

    /// Replaces templates with the given overrides. Unknown keys are skipped.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (key, template) in overrides {
            let template = template.trim().to_string();
            if template.is_empty() {
                tracing::warn!("Ignoring empty prompt override '{}'", key);
                continue;
            }
            match key.as_str() {
                "system" => self.system = template,
                "intro" => self.intro = template,
                "explain" => self.explain = template,
                "ready" => self.ready = template,
                other => tracing::warn!("Ignoring unknown prompt override '{}'", other),
            }
        }
        self
    }
}

/// Fixed facts about a lesson session that every prompt is rendered from.
#[derive(Debug, Clone)]
pub struct LessonContext {
    pub unit: Unit,
    pub student_name: String,
    pub mode: TeachingMode,
    pub prompts: PromptSet,
}

impl LessonContext {
    pub fn new(unit: Unit, student_name: impl Into<String>, mode: TeachingMode) -> Self {
        Self {
            unit,
            student_name: student_name.into(),
            mode,
            prompts: PromptSet::for_mode(mode),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn system_instruction(&self, step: LessonStep) -> String {
        render(&self.prompts.system, &self.values(step))
    }

    pub fn intro_prompt(&self, step: LessonStep) -> String {
        render(&self.prompts.intro, &self.values(step))
    }

    pub fn explain_prompt(&self, step: LessonStep) -> String {
        render(&self.prompts.explain, &self.values(step))
    }

    /// The canned student line sent when advancing to the next step.
    pub fn ready_utterance(&self, step: LessonStep) -> String {
        render(&self.prompts.ready, &self.values(step))
    }

    fn values(&self, step: LessonStep) -> Vec<(&'static str, String)> {
        let (language_rule, delivery, explain_delivery) = match self.mode {
            TeachingMode::Mixed => (MIXED_LANGUAGE_RULE, MIXED_DELIVERY, MIXED_EXPLAIN_DELIVERY),
            TeachingMode::English => (
                ENGLISH_LANGUAGE_RULE,
                ENGLISH_DELIVERY,
                ENGLISH_EXPLAIN_DELIVERY,
            ),
        };
        vec![
            ("student", self.student_name.clone()),
            ("mode", self.mode.label().to_string()),
            ("unit_id", self.unit.id.to_string()),
            ("unit_title", self.unit.title.clone()),
            ("unit_subtitle", self.unit.subtitle.clone()),
            ("step", step.label().to_string()),
            ("vocabulary", self.unit.vocabulary.join(", ")),
            ("phonics", self.unit.phonics.join("; ")),
            ("language_in_use", self.unit.language_in_use.clone()),
            ("life_skills", self.unit.life_skills.join(", ")),
            ("language_rule", language_rule.to_string()),
            ("delivery", delivery.to_string()),
            ("explain_delivery", explain_delivery.to_string()),
        ]
    }
}

/// Substitutes every `{key}` in `template`. Unknown placeholders are left as-is.
pub fn render(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
}
