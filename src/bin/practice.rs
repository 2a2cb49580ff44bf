use anyhow::{anyhow, Context, Result};
use clap::Parser;
use concurso_quiz::clients::flexible::ClientType;
use concurso_quiz::config::AppConfig;
use concurso_quiz::question::option_letter;
use concurso_quiz::{DifficultyLevel, Question, QuizApp, SessionPhase};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "📚 Concurso practice quiz", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    GEMINI_API_KEY     Default API key when none was saved with --set-key
    GEMINI_MODEL       Model used for generation
    QUIZ_DATA_DIR      Where statistics and the saved key live
    QUIZ_LOOKAHEAD     Questions kept ready ahead of the current one
    RUST_LOG           Log filter (with --verbose)

KEYS:
    a-d   answer          n / →  next question
    p / ← previous        1-9    jump to question
    r     reset topic     q      quit

EXAMPLES:
    practice --list-topics
    practice --topic GEN1 --difficulty iniciante
    practice --client mock --verbose
    practice --set-key AIzaSy...")]
struct Args {
    /// Topic id or name
    #[arg(short, long, default_value = "GEN1")]
    topic: String,

    /// iniciante, intermediario or avancado
    #[arg(short, long, default_value = "intermediario")]
    difficulty: String,

    /// Set client type: gemini, mock [default: gemini]
    #[arg(short, long)]
    client: Option<String>,

    /// Override QUIZ_DATA_DIR
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Save an API key and exit
    #[arg(long)]
    set_key: Option<String>,

    /// Print the syllabus with current mastery and exit
    #[arg(long)]
    list_topics: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

enum Action {
    Answer(usize),
    Next,
    Previous,
    Jump(usize),
    Reset,
    Quit,
    Ignore,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = AppConfig::from_env();
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    let client_type = args
        .client
        .as_deref()
        .map(ClientType::from_str)
        .transpose()
        .map_err(|e| anyhow!(e))?;
    let difficulty = DifficultyLevel::from_str(&args.difficulty).map_err(|e| anyhow!(e))?;

    let (app, client_type) = QuizApp::open(&config, client_type).context("Failed to open the quiz store")?;

    if let Some(key) = &args.set_key {
        app.set_credential(key)?;
        println!("✅ API key saved to {}", config.store_path().display());
        return Ok(());
    }

    if args.list_topics {
        print_topics(&app);
        return Ok(());
    }

    println!("🎯 Generating questions with the {} backend", client_type);
    run_session(&app, &args.topic, difficulty).await
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "concurso_quiz=debug" } else { "concurso_quiz=warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .try_init();
}

fn print_topics(app: &QuizApp) {
    println!("{:<6} {:<32} {:>8}", "ID", "Matéria", "Domínio");
    for topic in app.topics() {
        println!(
            "{:<6} {} {:<29} {:>7}%",
            topic.id,
            topic.icon,
            topic.name,
            app.mastery(&topic.id)
        );
    }
    println!();
    let stats = app.stats();
    println!(
        "Respondidas: {}  Acertos: {}%  Sequência: {}",
        stats.total_answered,
        app.accuracy_percent(),
        stats.streak
    );
}

async fn run_session(app: &QuizApp, topic: &str, difficulty: DifficultyLevel) -> Result<()> {
    println!("⏳ Preparando a primeira questão...");
    let snapshot = loop {
        match app.start_session(topic, difficulty).await {
            Ok(snapshot) => break snapshot,
            Err(e) if e.is_credential() => {
                println!("🔑 {}", e);
                let Some(key) = prompt_for_key().await? else {
                    return Err(anyhow!("No API key given. Save one with --set-key <KEY> or set GEMINI_API_KEY"));
                };
                match app.set_credential(&key) {
                    Ok(()) => println!("✅ Chave salva. Preparando a primeira questão..."),
                    Err(e) => println!("⚠️  {}", e),
                }
            }
            Err(e) => return Err(e.into()),
        }
    };
    let topic_id = snapshot.topic_id.clone().unwrap_or_default();

    loop {
        let snapshot = app.snapshot();
        if snapshot.phase == SessionPhase::Waiting {
            println!("⏳ Gerando a próxima questão...");
            let ready = app.wait_until_ready().await;
            if ready.phase == SessionPhase::Idle {
                break;
            }
            continue;
        }

        let Some(question) = app.current_question() else {
            break;
        };
        render_question(&question, snapshot.cursor, snapshot.queue_length, app.answer_for(snapshot.cursor));

        match read_action().await? {
            Action::Answer(option) => match app.submit_answer(option) {
                Ok(outcome) => {
                    if outcome.is_correct {
                        println!("\n✅ Correto! Domínio em {}: {}%", topic_id, outcome.mastery);
                    } else {
                        println!(
                            "\n❌ Incorreto. Resposta: {}. Domínio em {}: {}%",
                            option_letter(outcome.correct_index),
                            topic_id,
                            outcome.mastery
                        );
                    }
                    render_explanations(&question);
                }
                Err(e) => println!("\n⚠️  {}", e),
            },
            Action::Next => {
                app.advance()?;
            }
            Action::Previous => {
                app.retreat()?;
            }
            Action::Jump(index) => {
                if let Err(e) = app.jump_to(index) {
                    println!("\n⚠️  {}", e);
                }
            }
            Action::Reset => {
                app.reset_topic(&topic_id)?;
                println!("\n🔄 Domínio de {} zerado", topic_id);
            }
            Action::Quit => break,
            Action::Ignore => {}
        }
    }

    let summary = app.session_summary();
    app.end_session();
    println!(
        "\n📊 Sessão encerrada: {} respondidas, {} corretas. Domínio em {}: {}%",
        summary.answered,
        summary.correct,
        topic_id,
        app.mastery(&topic_id)
    );
    Ok(())
}

fn render_question(question: &Question, cursor: usize, queue_length: usize, answer: Option<usize>) {
    println!("\n──────── Questão {} de {} ({}) ────────", cursor + 1, queue_length, question.difficulty);
    println!("{}\n", question.text);
    for (i, option) in question.options.iter().enumerate() {
        let mark = match answer {
            Some(_) if question.is_correct(i) => "✅",
            Some(selected) if selected == i => "❌",
            _ => "  ",
        };
        println!("{} {}) {}", mark, option_letter(i).to_ascii_lowercase(), option);
    }
    print!("\n[a-d] responder  [n] próxima  [p] anterior  [1-9] ir para  [r] zerar  [q] sair: ");
    let _ = io::stdout().flush();
}

fn render_explanations(question: &Question) {
    println!("\n{}", question.correct_explanation);
    for line in &question.distractor_explanations {
        println!("  • {}", line);
    }
    println!("\n📖 {}", question.concept_explanation);
    println!("⚖️  {}", question.legal_basis);
    println!("💡 {}", question.study_tip);
}

async fn read_action() -> Result<Action> {
    let code = tokio::task::spawn_blocking(read_single_key).await??;
    let action = match code {
        KeyCode::Char(c @ 'a'..='d') | KeyCode::Char(c @ 'A'..='D') => {
            Action::Answer((c.to_ascii_lowercase() as u8 - b'a') as usize)
        }
        KeyCode::Char('n' | 'N') | KeyCode::Right | KeyCode::Enter => Action::Next,
        KeyCode::Char('p' | 'P') | KeyCode::Left => Action::Previous,
        KeyCode::Char(c @ '1'..='9') => Action::Jump((c as u8 - b'1') as usize),
        KeyCode::Char('r' | 'R') => Action::Reset,
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        _ => Action::Ignore,
    };
    println!();
    Ok(action)
}

/// Ask for a Gemini key on stdin; `None` when the line is empty.
async fn prompt_for_key() -> Result<Option<String>> {
    print!("Informe a chave da API Gemini (Enter vazio para sair): ");
    io::stdout().flush()?;
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;
    let key = line.trim();
    Ok((!key.is_empty()).then(|| key.to_string()))
}

/// Block until one key press, in raw mode.
fn read_single_key() -> io::Result<KeyCode> {
    terminal::enable_raw_mode()?;
    let result = loop {
        match event::poll(Duration::from_millis(250)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. })) => break Ok(code),
                Ok(_) => continue,
                Err(e) => break Err(e),
            },
            Ok(false) => continue,
            Err(e) => break Err(e),
        }
    };
    terminal::disable_raw_mode()?;
    result
}
