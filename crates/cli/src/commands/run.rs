//! `parley run` — Start the endpoints, ingestion and the engine.

use std::sync::Arc;

use parley_agent::{Engine, EngineParts, GenerationEvent};
use parley_config::AppConfig;
use parley_core::lookup::AbbreviationLookup;
use parley_providers::OpenAiCompatProvider;
use parley_tools::NbnhhshLookup;
use tracing::{debug, info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PARLEY_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to the [provider] section of:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = OpenAiCompatProvider::from_config(&config.provider)?;
    let history = parley_history::open(&config.history.backend, &config.history_path())
        .await
        .map_err(|e| format!("Failed to open history: {e}"))?;

    let (registry, _locals) = parley_endpoints::build_registry(&config.endpoints);
    if registry.is_empty() {
        return Err("No enabled endpoints. Add an [[endpoints]] entry to config.toml.".into());
    }
    let endpoints = Arc::new(registry);

    println!();
    println!("  Parley — {} is online", config.persona.name);
    println!();
    println!("  Model:      {}", config.provider.model);
    println!("  History:    {}", history.name());
    println!("  Endpoints:  {}", endpoints.list().join(", "));
    println!();
    println!("  Type a message and press Enter. `/edit <id> <text>` edits one.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut parts = EngineParts::new(config.clone(), Arc::new(provider), history, endpoints.clone());
    if config.abbreviation.enabled {
        let lookup: Arc<dyn AbbreviationLookup> = Arc::new(NbnhhshLookup::new(&config.abbreviation.api_url));
        parts = parts.with_lookup(lookup);
    }
    let engine = Engine::new(parts).await?;
    let handle = engine.handle();

    let mut generation = engine.subscribe_generation();
    tokio::spawn(async move {
        while let Ok(event) = generation.recv().await {
            match &event {
                GenerationEvent::ToolCall { name, input, .. } => info!(tool = %name, %input, "Tool call"),
                GenerationEvent::Done {
                    iterations,
                    tool_calls_made,
                    ..
                } => debug!(iterations, tool_calls_made, "Model finished"),
                _ => {}
            }
        }
    });

    let inbound = endpoints.start_all().await.map_err(|e| format!("Endpoint error: {e}"))?;
    let pump = engine.attach(inbound);
    let engine_task = tokio::spawn(engine.run());

    let drained = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            false
        }
        _ = pump => true,
    };
    if drained {
        // Settled messages are in; let the last reply go out
        info!("All endpoints closed, finishing in-flight replies");
        tokio::select! {
            result = handle.wait_idle() => {
                if let Err(e) = result {
                    warn!(error = %e, "Engine stopped before going idle");
                }
            }
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
    }

    if let Ok(status) = handle.status().await {
        info!(
            attempts = status.attempts_started,
            replies = status.attempts_succeeded,
            history = status.history_len,
            "Shutting down"
        );
    }
    handle.shutdown().await;
    endpoints.stop_all().await;
    let _ = engine_task.await;

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
