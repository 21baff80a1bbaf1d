//! `nova memory`: Profile and fact management.

use crate::runtime::Runtime;
use nova_core::memory::{Fact, FactStore, PROFILE_NAME, ProfileStore};

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    let name = runtime.profile.get_profile(PROFILE_NAME).await?;
    let facts = runtime.facts.get_facts().await?;

    println!("Memory");
    println!("======");
    println!("  Store: {}", runtime.store_location());
    println!("  Name:  {}", name.as_deref().unwrap_or("(not set)"));
    if facts.is_empty() {
        println!("  Facts: (none)");
    } else {
        println!("  Facts:");
        for fact in &facts {
            println!("    {}/{}: {}", fact.category, fact.label, fact.value);
        }
    }
    Ok(())
}

pub async fn set_name(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    runtime.profile.set_profile(PROFILE_NAME, name).await?;
    println!("  Name set to {name}.");
    Ok(())
}

pub async fn add_fact(category: &str, label: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    runtime.facts.add_fact(Fact::new(category, label, value)).await?;
    println!("  Remembered {category}/{label}: {value}");
    Ok(())
}

pub async fn clear_facts() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    runtime.facts.clear_facts().await?;
    println!("  All facts cleared.");
    Ok(())
}
