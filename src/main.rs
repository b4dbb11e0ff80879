//! Interactive clarification session on stdin/stdout.
//!
//! ```text
//! requirement-clarifier "<description>" <verification-method> [requirement-id]
//! ```

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use requirement_clarifier::adapters::{
    FileKeyValueStore, OpenAiConfig, OpenAiTextGenerator, WatchConnectivity,
};
use requirement_clarifier::application::{
    LlmBusyFlag, PacingPolicy, SessionDeps, SessionHandle, SessionSettings, SessionSnapshot,
};
use requirement_clarifier::config::AppConfig;
use requirement_clarifier::domain::clarification::RequirementContext;
use requirement_clarifier::domain::foundation::{QuestionId, RequirementId};

const HELP: &str = "commands: go | ask | answer N <text> | assume N | skip N | reset | quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    let env_filter = config.logging.env_filter();
    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    config.validate()?;

    let mut args = std::env::args().skip(1);
    let (Some(description), Some(method)) = (args.next(), args.next()) else {
        eprintln!("usage: requirement-clarifier \"<description>\" <verification-method> [requirement-id]");
        std::process::exit(2);
    };
    let mut requirement = RequirementContext::new(description, method);
    if let Some(id) = args.next() {
        requirement = requirement.with_id(RequirementId::new(id)?);
    }

    let api_key = config.ai.api_key.clone().unwrap_or_default();
    let generator = OpenAiTextGenerator::new(
        OpenAiConfig::new(api_key)
            .with_model(config.ai.model.clone())
            .with_base_url(config.ai.base_url.clone())
            .with_timeout(config.ai.timeout())
            .with_max_retries(config.ai.max_retries)
            .with_temperature(config.ai.temperature),
    )?;

    let deps = SessionDeps {
        generator: Arc::new(generator),
        store: Arc::new(FileKeyValueStore::new(&config.storage.data_dir)),
        connectivity: Arc::new(WatchConnectivity::default()),
        busy: LlmBusyFlag::new(),
        pacing: PacingPolicy::new(config.presentation.fade_out()),
        settings: SessionSettings {
            question_budget: config.clarification.question_budget,
            replacements_enabled: config.clarification.replacements_enabled,
        },
    };
    tracing::info!(
        model = %config.ai.model,
        budget = config.clarification.question_budget,
        data_dir = %config.storage.data_dir.display(),
        "Starting clarification session"
    );

    let session = SessionHandle::spawn(requirement, deps);
    print_snapshot(&session.snapshot());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.trim().splitn(3, ' ');
        let command = parts.next().unwrap_or_default();
        let snapshot = session.snapshot();

        let result = match command {
            "" => continue,
            "quit" | "exit" => break,
            "go" => session.trigger_action().await.map(|dispatch| {
                tracing::debug!(?dispatch, "Smart action dispatched");
            }),
            "ask" => session.ask_questions().await,
            "answer" => match question_at(&snapshot, parts.next()) {
                Some(id) => session.answer(id, parts.next().unwrap_or_default()).await,
                None => {
                    println!("no such question");
                    continue;
                }
            },
            "assume" | "skip" => match question_at(&snapshot, parts.next()) {
                Some(id) if command == "assume" => session.mark_as_assumption(id).await,
                Some(id) => session.skip(id).await,
                None => {
                    println!("no such question");
                    continue;
                }
            },
            "reset" => session.reset_assumptions().await.map(|_| ()),
            _ => {
                println!("{}", HELP);
                continue;
            }
        };

        if let Err(err) = result {
            println!("! {}", err);
        }
        match session.wait_until_settled().await {
            Ok(snapshot) => print_snapshot(&snapshot),
            Err(err) => {
                println!("! {}", err);
                break;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

/// Resolves a 1-based index into the active questions.
fn question_at(snapshot: &SessionSnapshot, index: Option<&str>) -> Option<QuestionId> {
    let index: usize = index?.parse().ok()?;
    snapshot
        .active_questions()
        .nth(index.checked_sub(1)?)
        .map(|q| q.id())
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!();
    println!("[{}] {}", snapshot.state, snapshot.action_label);
    for (index, question) in snapshot.active_questions().enumerate() {
        let answer = question
            .answer
            .as_deref()
            .map(|a| format!(" -> {}", a))
            .unwrap_or_default();
        println!("  {}. [{}] {}{}", index + 1, question.severity, question.text, answer);
    }
    let enabled: Vec<_> = snapshot.assumptions.iter().filter(|a| a.is_enabled).collect();
    if !enabled.is_empty() {
        println!("  assumptions:");
        for assumption in enabled {
            println!("    - {}", assumption.content_line);
        }
    }
    if let Some(status) = &snapshot.status {
        println!("  status: {}", status);
    }
    if let Some(test_cases) = &snapshot.test_cases {
        println!("\n{}", test_cases);
    }
}
