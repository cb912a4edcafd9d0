use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use mise_core::MiseConfig;
use mise_core::app::{DropTarget, FeedView, ProgressSummary, Session, SessionBuilder, StepDrag};
use mise_core::domain::{DomainEvent, NoticeLevel, TodoCounts, Urgency, WeeklySummary};
use mise_core::impls::InMemoryApi;
use mise_core::ports::{EventSink, SystemClock};

/// Prints notices the way the UI would toast them.
struct StdoutSink;

#[async_trait]
impl EventSink for StdoutSink {
    async fn emit(&self, event: DomainEvent) {
        let notice = event.notice();
        let mark = match notice.level {
            NoticeLevel::Success => "✓",
            NoticeLevel::Error => "✗",
        };
        println!("{mark} {} - {}", notice.title, notice.description);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    counts: TodoCounts,
    progress: ProgressSummary,
    message: String,
    weekly: WeeklySummary,
}

fn tag(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Overdue => "OVERDUE",
        Urgency::Now => "now",
        Urgency::Upcoming => "soon",
        Urgency::Later => "later",
    }
}

fn print_feed(title: &str, feed: &FeedView) {
    println!("\n== {title} ==");
    if feed.is_empty() {
        println!("  (nothing scheduled)");
        return;
    }
    for todo in &feed.active {
        println!("  [{:>7}] {}  ({})", tag(todo.urgency), todo.description, todo.id);
    }
    if feed.all_done {
        println!("  All done for today!");
    }
    for todo in &feed.recently_completed {
        println!("  [   done] {}", todo.description);
    }
    if feed.more_completed > 0 {
        println!("  ... and {} more completed", feed.more_completed);
    }
}

/// Complete the most urgent todo and put the first open cooking step on today's list.
async fn walk_through(session: &Session) {
    if let Some(todo) = session.todos.feed().await.active.first().cloned() {
        println!("\n> completing \"{}\"", todo.description);
        let phase = session.todos.complete_todo(&todo.id).await;
        info!(todo_id = %todo.id, ?phase, "completion settled");
    }

    if let Some((meal_name, step)) = session.planner.schedulable_steps().await.into_iter().next() {
        println!("> dragging \"{}\" from {meal_name} onto today", step.instruction);
        // failure is reported through the sink
        let _ = session
            .bridge
            .schedule_step(StepDrag::new(meal_name, step), DropTarget::today())
            .await;
    }

    tokio::time::sleep(session.todos.settings().reconcile_delay * 2).await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = MiseConfig::from_env()?;
    let mock_mode = config.api_base_url.is_none();

    let builder = SessionBuilder::new(config).event_sink(Arc::new(StdoutSink));
    let builder = if mock_mode {
        println!("MISE_API_URL not set, using demo data");
        builder.in_memory(Arc::new(InMemoryApi::with_demo_data(Arc::new(SystemClock))))
    } else {
        builder.http()?
    };
    let mut session = builder.build()?;
    session.start().await;

    if let Some(error) = session.todos.error().await {
        eprintln!("could not load todos: {}", error.message);
    }
    print_feed("Today", &session.todos.feed().await);

    // only touch data that belongs to the demo server
    if mock_mode {
        walk_through(&session).await;
        print_feed("Today (after)", &session.todos.feed().await);
    }

    let progress = session.todos.progress().await;
    let report = Report {
        counts: session.todos.counts().await,
        message: progress.message(),
        progress,
        weekly: session.planner.summary().await,
    };
    println!("\n{}", serde_json::to_string_pretty(&report)?);

    session.close().await;
    Ok(())
}
