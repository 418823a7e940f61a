//! `priorender models` — List model presets.

use priorender_config::RenderConfig;

/// Print every preset the current config knows about.
pub fn run() -> anyhow::Result<()> {
    let config = RenderConfig::load()?;
    let registry = config.registry();

    println!("📐 Model Presets");
    println!("───────────────────────────────────────────────────────────────────────");
    println!(
        "{:<28} {:>12} {:>12}  {}",
        "Model", "Token limit", "Max output", "Tokenizer"
    );
    println!("───────────────────────────────────────────────────────────────────────");

    let models = registry.models();
    for name in &models {
        if let Some(p) = registry.get(name) {
            println!(
                "{:<28} {:>12} {:>12}  {}",
                name, p.token_limit, p.output_token_limit, p.tokenizer
            );
        }
    }

    println!();
    println!("  {} models", models.len());
    println!(
        "  Tokenizers in this build: {}",
        priorender_tokenizers::available().join(", ")
    );

    Ok(())
}
