use std::error::Error;
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;

use quizgen::models::domain::{GenerationRequest, Quiz};
use quizgen::repositories::{QuizRecord, QuizRowStatus, QuizStore, SqliteQuizStore};
use quizgen::services::quiz_generator::{GeneratorOptions, QuizGenerator, StreamOutcome};
use quizgen::Config;

#[derive(Parser)]
#[command(name = "quizgen", about = "Generate a validated multiple-choice quiz with an LLM")]
struct Cli {
    /// Quiz topic.
    #[arg(long)]
    topic: String,

    /// Number of questions to generate.
    #[arg(long, default_value_t = 10)]
    questions: usize,

    /// File with source material to base the questions on.
    #[arg(long)]
    source_file: Option<PathBuf>,

    /// Difficulty level (easy, medium, hard).
    #[arg(long, default_value = "medium")]
    difficulty: String,

    /// Output file for the quiz JSON (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,

    /// SQLite database to persist the quiz into as questions arrive.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Model override (defaults to QUIZGEN_MODEL or gpt-4o).
    #[arg(long)]
    model: Option<String>,

    /// Enable verbose debugging output.
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if cli.verbose && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "quizgen=debug");
    }
    pretty_env_logger::init();

    let config = Config::from_env();
    let mut options = GeneratorOptions::from_config(&config);
    if let Some(model) = &cli.model {
        options.model = model.clone();
    }

    let mut request = GenerationRequest::new(cli.topic.clone(), cli.questions)
        .with_difficulty(cli.difficulty.clone());
    if let Some(path) = &cli.source_file {
        request = request.with_source_material(std::fs::read_to_string(path)?);
    }

    let store: Option<SqliteQuizStore> = match &cli.database {
        Some(path) => {
            let store = SqliteQuizStore::new(path);
            store.init().await?;
            Some(store)
        }
        None => None,
    };

    let generator = QuizGenerator::new(&config).with_options(options);
    let mut stream = generator.stream(request.clone())?;

    if let Some(store) = &store {
        store
            .create_quiz(&QuizRecord {
                id: stream.quiz_id().to_string(),
                topic: request.topic.clone(),
                num_questions: request.num_questions,
                source_material: request.source_material.clone(),
                difficulty: request.difficulty.clone(),
                created_at: Utc::now(),
                status: QuizRowStatus::Generating,
            })
            .await?;
    }

    let quiz_id = stream.quiz_id().to_string();
    let mut questions = Vec::new();

    while let Some(question) = stream.next().await {
        let number = questions.len() + 1;
        println!("Question {}/{}:", number, request.num_questions);
        println!("{}", question.text);
        for (i, option) in question.options.iter().enumerate() {
            println!("  {}) {}", (b'A' + i as u8) as char, option);
        }
        println!();

        if let Some(store) = &store {
            store.append_question(&quiz_id, &question).await?;
        }
        questions.push(question);
    }

    let outcome = stream.finish().await;

    let total_questions = questions.len();
    let quiz = Quiz {
        id: quiz_id.clone(),
        topic: request.topic.clone(),
        questions,
        created_at: Utc::now(),
        total_questions,
    };

    let rendered = serde_json::to_string_pretty(&quiz)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            log::info!("Quiz saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }

    match outcome {
        StreamOutcome::Completed => {
            if let Some(store) = &store {
                store.complete_quiz(&quiz_id).await?;
            }
            Ok(())
        }
        StreamOutcome::Cancelled => Err("quiz generation hit the run deadline".into()),
        StreamOutcome::Exhausted { reason } => {
            Err(format!("quiz generation ended early: {}", reason).into())
        }
    }
}
