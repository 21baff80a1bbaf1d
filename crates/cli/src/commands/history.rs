//! `nova history`: Saved conversation turns.

use crate::runtime::Runtime;
use nova_core::error::MemoryError;
use nova_core::memory::TurnLog;
use nova_core::message::{Role, ThreadId};

pub async fn show(thread: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    let messages = runtime.turns.load_history(&ThreadId::from(thread)).await?;

    if messages.is_empty() {
        println!("  No messages in thread {thread}.");
    }
    for message in messages {
        let who = match message.role {
            Role::User => "You",
            _ => "Nova",
        };
        println!("  [{}] {who} > {}", message.timestamp.format("%Y-%m-%d %H:%M"), message.content);
    }
    Ok(())
}

pub async fn clear(thread: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    runtime.turns.clear_history(&ThreadId::from(thread)).await?;
    println!("  Cleared thread {thread}.");
    Ok(())
}

pub async fn list(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    let lines = thread_summaries(runtime.turns.as_ref(), limit).await?;

    if lines.is_empty() {
        println!("  No saved threads.");
    }
    for line in lines {
        println!("  {line}");
    }
    Ok(())
}

/// One line per recent thread: ID, message count and when it was last written.
async fn thread_summaries(turns: &dyn TurnLog, limit: usize) -> Result<Vec<String>, MemoryError> {
    let mut lines = Vec::new();
    for thread in turns.recent_threads(limit).await? {
        let messages = turns.load_history(&thread).await?;
        let last = messages
            .last()
            .map(|m| m.timestamp.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        lines.push(format!("{thread}  {} messages  last {last}", messages.len()));
    }
    Ok(lines)
}
