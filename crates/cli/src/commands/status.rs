//! `nova status`: Show configuration and store status.

use crate::runtime::Runtime;
use nova_config::AppConfig;
use nova_core::retrieval::DocumentIndex;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    let config = &runtime.config;

    let chunks = match runtime.index.count().await {
        Ok(n) => n.to_string(),
        Err(e) => format!("unavailable ({e})"),
    };

    println!("Nova Status");
    println!("===========");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", runtime.model());
    println!("  Temperature:  {}", config.default_temperature);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Memory:       {} ({})", config.memory.backend, runtime.store_location());
    println!("  Documents:    {} index, {chunks} chunks", runtime.index.name());
    println!("  Embeddings:   {}", config.retrieval.embedding_provider);
    println!("  Passages:     up to {} per turn", config.assistant.result_limit);

    if AppConfig::config_path().exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — run `nova onboard` to create one");
    }

    Ok(())
}
