use anyhow::{Context, Result};
use clap::Parser;
use lesson_core::lesson::TeachingMode;
use lesson_core::prompts::{LessonContext, PromptSet};
use lesson_core::speech::{RecognizerEvent, SpeechRecognizer, UnsupportedRecognizer};
use lesson_core::status::{LessonUpdate, StatusSnapshot};
use lesson_core::{Collaborators, LessonAction, LessonOrchestrator, LessonSession};
use std::path::PathBuf;
use std::sync::Arc;
use super_miss_service::config::Config;
use super_miss_service::curriculum::Curriculum;
use super_miss_service::gemini_adapter::GeminiClient;
use super_miss_service::playback::CpalPlayer;
use super_miss_service::prompt_loader;
use super_miss_service::repl::{self, Command};
use super_miss_service::transcript_source::LineRecognizer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Super Miss, the superhero English tutor")]
struct Cli {
    /// Curriculum unit to study
    #[arg(long, required_unless_present_any = ["list_units", "list_outputs"])]
    unit: Option<u32>,
    /// The student's name
    #[arg(long, required_unless_present_any = ["list_units", "list_outputs"])]
    name: Option<String>,
    /// mixed (English with Arabic meanings) or english
    #[arg(long, default_value = "mixed")]
    mode: TeachingMode,
    /// Use a curriculum JSON file instead of the built-in one
    #[arg(long)]
    curriculum: Option<PathBuf>,
    /// Print the curriculum units and exit
    #[arg(long)]
    list_units: bool,
    /// Print the audio output devices and exit
    #[arg(long)]
    list_outputs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let args = Cli::parse();

    let curriculum = match &args.curriculum {
        Some(path) => Curriculum::from_file(path)?,
        None => Curriculum::embedded()?,
    };
    if args.list_outputs {
        println!("{}", lesson_native_utils::device::get_available_outputs()?);
        return Ok(());
    }
    if args.list_units {
        for unit in curriculum.units() {
            println!("{:>3}  {} ({})", unit.id, unit.title, unit.subtitle);
        }
        return Ok(());
    }

    // --- 2. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting Super Miss...");

    let unit_id = args.unit.context("--unit is required")?;
    let student = args.name.clone().context("--name is required")?;
    let unit = curriculum
        .unit(unit_id)
        .cloned()
        .with_context(|| format!("No unit {} in the curriculum (try --list-units)", unit_id))?;

    // --- 4. Load Prompts ---
    let overrides = prompt_loader::load_prompt_overrides(&config.prompts_dir)
        .context("Failed to load prompt overrides")?;
    let prompts = PromptSet::for_mode(args.mode).with_overrides(&overrides);
    let context = LessonContext::new(unit, student.clone(), args.mode).with_prompts(prompts);

    // --- 5. Initialize Adapters ---
    let gemini = Arc::new(GeminiClient::new(&config));
    let player = Arc::new(CpalPlayer::new(
        config.output_device.clone(),
        config.playback_timeout,
    ));
    let (recognizer, recognizer_events) = match &config.transcript_path {
        Some(path) => {
            tracing::info!(
                "Speech input from {} ({}, {:?})",
                path.display(),
                args.mode.recognition_language(),
                config.listen_policy
            );
            let (recognizer, events) =
                LineRecognizer::from_path(path.clone(), config.listen_policy);
            let recognizer: Box<dyn SpeechRecognizer> = Box::new(recognizer);
            (recognizer, events)
        }
        None => {
            tracing::info!("No transcript source configured, speech input unsupported");
            let (_tx, events) = mpsc::channel::<RecognizerEvent>(1);
            let recognizer: Box<dyn SpeechRecognizer> = Box::new(UnsupportedRecognizer);
            (recognizer, events)
        }
    };

    // --- 6. Start the Lesson ---
    println!(
        "Unit {}: {} | {} | {}",
        context.unit.id,
        context.unit.title,
        student,
        args.mode.label()
    );
    println!("{}", repl::HELP);

    let collaborators = Collaborators {
        dialogue: gemini.clone(),
        synthesizer: gemini,
        player,
        recognizer,
        recognizer_events,
    };
    let session = LessonSession::new(context);
    let (orchestrator, handle) =
        LessonOrchestrator::new(session, collaborators, config.orchestrator_config());
    let lesson = tokio::spawn(orchestrator.run());

    let mode = args.mode;
    let printer = tokio::spawn(print_updates(handle.updates, student, mode));
    let status_printer = tokio::spawn(print_status(handle.status, mode));

    // --- 7. Read Student Input ---
    let actions = handle.actions;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            let _ = actions.send(LessonAction::Back).await;
            break;
        };
        match repl::parse_line(&line) {
            Command::Action(action) => {
                let leaving = action == LessonAction::Back;
                if actions.send(action).await.is_err() || leaving {
                    break;
                }
            }
            Command::Help => println!("{}", repl::HELP),
            Command::Unknown(cmd) => println!("Unknown command {}. {}", cmd, repl::HELP),
            Command::Empty => {}
        }
    }
    drop(actions);

    lesson.await.context("Lesson task failed")??;
    printer.await.context("Update printer failed")?;
    status_printer.abort();
    Ok(())
}

async fn print_updates(
    mut updates: mpsc::Receiver<LessonUpdate>,
    student: String,
    mode: TeachingMode,
) {
    while let Some(update) = updates.recv().await {
        if let Some(line) = repl::render_update(&update, &student, mode) {
            println!("{}", line);
        }
        if update == LessonUpdate::Closed {
            break;
        }
    }
}

async fn print_status(mut status: watch::Receiver<StatusSnapshot>, mode: TeachingMode) {
    let mut last_step = 0;
    let mut last_text = None;
    while status.changed().await.is_ok() {
        let snapshot = status.borrow_and_update().clone();
        if snapshot.closed {
            break;
        }
        if snapshot.step_number != last_step {
            last_step = snapshot.step_number;
            println!("{}", repl::render_progress(&snapshot));
        }
        let text = snapshot.status_text(mode);
        if text != last_text {
            last_text = text;
            if let Some(text) = text {
                println!("... {}", text);
            }
        }
    }
}
