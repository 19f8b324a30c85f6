//! `parley status` — Show the resolved configuration.

use parley_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Parley Status");
    println!("=============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Persona:      {} ({}, {})", config.persona.name, config.persona.age, config.persona.profession);
    println!("  Provider:     {}", config.provider.base_url);
    println!("  Model:        {}", config.provider.model);
    println!("  Temperature:  {}", config.provider.temperature);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!(
        "  Trigger:      baseline {} / step {} / re-engage below {}",
        config.trigger.baseline, config.trigger.decay_step, config.trigger.reengage_threshold
    );
    println!("  Context:      max {} / fit {}", config.context.max_context, config.context.fit_context);
    println!("  Debounce:     {} ms", config.debounce.delay_ms);
    println!("  Tool rounds:  {}", config.generation.max_tool_iterations);
    println!("  History:      {} ({})", config.history.backend, config.history_path().display());
    println!(
        "  Channels:     {}",
        if config.channels.allowed.is_empty() {
            "all".to_string()
        } else {
            config.channels.allowed.join(", ")
        }
    );
    println!(
        "  Slang lookup: {}",
        if config.abbreviation.enabled { config.abbreviation.api_url.as_str() } else { "disabled" }
    );

    println!("  Endpoints:");
    for endpoint in &config.endpoints {
        println!(
            "    - {:<8} self_id={} channel={}{}",
            endpoint.kind,
            endpoint.self_id,
            endpoint.channel_id,
            if endpoint.enabled { "" } else { " (disabled)" }
        );
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `parley init` first");
    }

    Ok(())
}
