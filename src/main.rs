use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use jarvis_native::api::GeminiClient;
use jarvis_native::handlers::CannedWeather;
use jarvis_native::presenter::TerminalPresenter;
use jarvis_native::response::Feedback;
use jarvis_native::speech::{CommandRecognizer, EspeakSynthesizer, RecognizerConfig};
use jarvis_native::system::SystemOpener;
use jarvis_native::visualizer::{LogCanvas, Visualizer};
use jarvis_native::{Adapters, Config, Session};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const INFO_INTERVAL: Duration = Duration::from_secs(60);
const CANVAS_SIZE: f32 = 320.0;

/// One line of terminal input.
#[derive(Debug, PartialEq)]
enum Input {
    Say(String),
    Listen,
    Suggestion(usize),
    Translate(u64),
    Rate(u64, Feedback),
    Language(String),
    Help,
    Quit,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return Input::Say(line.to_string());
    };

    let mut words = rest.split_whitespace();
    let verb = words.next().unwrap_or("");
    let arg = words.next();
    let id = || arg.and_then(|a| a.parse::<u64>().ok());

    match (verb, arg) {
        ("listen" | "l", _) => Input::Listen,
        ("quit" | "q", _) => Input::Quit,
        ("help" | "h", _) => Input::Help,
        ("s", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Input::Suggestion(n - 1),
            _ => Input::Invalid(line.to_string()),
        },
        ("translate" | "t", _) => id().map_or(Input::Invalid(line.to_string()), Input::Translate),
        ("like", _) => id().map_or(Input::Invalid(line.to_string()), |id| Input::Rate(id, Feedback::Like)),
        ("dislike", _) => id().map_or(Input::Invalid(line.to_string()), |id| {
            Input::Rate(id, Feedback::Dislike)
        }),
        ("lang", Some(code)) => Input::Language(code.to_string()),
        _ => Input::Invalid(line.to_string()),
    }
}

const HELP: &str = "Type a command, or:\n  \
    :listen          start/stop voice input\n  \
    :s <n>           pick suggestion n\n  \
    :translate <id>  translate a Jarvis message\n  \
    :like <id> / :dislike <id>\n  \
    :lang <code>     en-US, te-IN, hi-IN, fr-FR, es-ES, de-DE\n  \
    :quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("jarvis v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load();
    if !config.has_api_key() {
        log::warn!(
            "No Gemini API key set! Edit {} or set GEMINI_API_KEY env var",
            Config::config_path().display()
        );
    }

    let (rec_tx, mut rec_rx) = mpsc::unbounded_channel();
    let (synth_tx, mut synth_rx) = mpsc::unbounded_channel();

    let adapters = Adapters {
        recognizer: Box::new(CommandRecognizer::new(
            config.effective_recognizer_command(),
            RecognizerConfig::single_shot(config.language.clone()),
            rec_tx,
        )),
        synthesizer: Box::new(EspeakSynthesizer::new(&config.synthesizer_command, synth_tx)),
        presenter: Box::new(TerminalPresenter::new(std::io::stdout())),
        opener: Box::new(SystemOpener::new()),
        weather: Box::new(CannedWeather::new(config.weather_report.clone())),
        canvas: Box::new(LogCanvas::new(CANVAS_SIZE, CANVAS_SIZE)),
    };

    let client = GeminiClient::from_config(&config);
    let mut session = Session::new(config, client, adapters, Visualizer::new(None));
    session.start(&chrono::Local::now());
    session.activate_microphone();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut info = tokio::time::interval(INFO_INTERVAL);
    info.tick().await;
    let started = Instant::now();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Input::Say(text) => { session.submit_text(&text).await; }
                    Input::Listen => {
                        if !session.toggle_listening() {
                            println!("{}", session.status());
                        }
                    }
                    Input::Suggestion(index) => {
                        if session.select_suggestion(index).await.is_none() {
                            println!("No suggestion #{}", index + 1);
                        }
                    }
                    Input::Translate(id) => {
                        if !session.request_translation(id).await {
                            println!("No Jarvis message #{}", id);
                        }
                    }
                    Input::Rate(id, feedback) => {
                        if !session.set_feedback(id, feedback) {
                            println!("No Jarvis message #{}", id);
                        }
                    }
                    Input::Language(code) => {
                        if !session.set_language(&code) {
                            println!("Unsupported language {}", code);
                        }
                    }
                    Input::Help => println!("{}", HELP),
                    Input::Quit => break,
                    Input::Invalid(text) => println!("Unknown command: {} (:help)", text),
                }
            }
            Some(event) = rec_rx.recv() => {
                session.on_recognition_event(event).await;
            }
            Some(event) = synth_rx.recv() => {
                session.on_synthesis_event(event);
            }
            _ = frames.tick(), if session.is_animating() => {
                session.render_frame(started.elapsed().as_secs_f64() * 1000.0);
            }
            _ = info.tick() => {
                session.refresh_info(&chrono::Local::now());
            }
        }
    }

    log::info!("Goodbye");
    Ok(())
}
