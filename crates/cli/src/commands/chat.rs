//! `nova chat`: Interactive or single-message chat mode.

use crate::runtime::Runtime;
use futures::StreamExt;
use nova_agent::{TurnOrchestrator, quick_facts};
use nova_config::AppConfig;
use nova_core::memory::{FactStore, TurnLog};
use nova_core::message::{ConversationTurn, ThreadId};
use nova_core::retrieval::DocumentIndex;
use nova_providers::router::{base_url_for, is_local};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

pub async fn run(message: Option<String>, thread: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    check_api_key(&runtime.config)?;

    let orchestrator = runtime.orchestrator()?;
    let thread_id = thread.map(|t| ThreadId::from(&t)).unwrap_or_default();
    let mut stdout = std::io::stdout();

    if let Some(msg) = message {
        // Single message mode
        respond(
            &orchestrator,
            runtime.facts.as_ref(),
            runtime.turns.as_ref(),
            &thread_id,
            &msg,
            &mut stdout,
        )
        .await?;
        println!();
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Nova — Interactive Mode");
    println!();
    println!("  Provider:  {}", runtime.config.default_provider);
    println!("  Model:     {}", runtime.model());
    println!("  Documents: {} ({})", runtime.index.name(), runtime.store_location());
    println!("  Thread:    {thread_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        print!("  Nova > ");
        respond(
            &orchestrator,
            runtime.facts.as_ref(),
            runtime.turns.as_ref(),
            &thread_id,
            line,
            &mut stdout,
        )
        .await?;
        println!("\n");
    }

    println!();
    println!("  Goodbye! Continue later with: nova chat --thread {thread_id}");
    println!();
    Ok(())
}

/// Answer one utterance, writing the reply to `out` as it streams, then
/// save the turn. Returns the full reply.
///
/// A captured quick fact is acknowledged without calling the model. Store
/// failures are logged; the reply has already been shown by then.
pub async fn respond(
    orchestrator: &TurnOrchestrator,
    facts: &dyn FactStore,
    turns: &dyn TurnLog,
    thread_id: &ThreadId,
    utterance: &str,
    out: &mut impl Write,
) -> std::io::Result<String> {
    let reply = match quick_fact_reply(facts, utterance).await {
        Some(reply) => {
            write!(out, "{reply}")?;
            out.flush()?;
            reply
        }
        None => {
            let mut reply = String::new();
            let mut turn = orchestrator.run_turn(utterance);
            while let Some(fragment) = turn.next().await {
                write!(out, "{fragment}")?;
                out.flush()?;
                reply.push_str(&fragment);
            }
            reply
        }
    };

    let turn = ConversationTurn::new(thread_id.clone(), utterance, reply.as_str());
    if let Err(e) = turns.save_turn(&turn).await {
        warn!(thread = %thread_id, error = %e, "Failed to save turn");
    }
    Ok(reply)
}

/// Store a quick fact from `utterance`, if it carries one.
async fn quick_fact_reply(facts: &dyn FactStore, utterance: &str) -> Option<String> {
    let captured = quick_facts::capture(utterance)?;
    match facts.add_fact(captured.fact).await {
        Ok(()) => Some(captured.reply),
        Err(e) => {
            warn!(error = %e, "Quick fact not saved; answering normally");
            None
        }
    }
}

fn check_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let provider = &config.default_provider;
    if config.api_key_for(provider).is_some() || is_local(&base_url_for(config, provider)) {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured for '{provider}'!");
    eprintln!();
    eprintln!("  Set one of these environment variables (or put it in .env):");
    eprintln!("    GROQ_API_KEY   = 'gsk_...'   (default provider)");
    eprintln!("    OPENAI_API_KEY = 'sk-...'");
    eprintln!("    NOVA_API_KEY   = '...'       (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
