//! `priorender config` — Configuration management commands.

use priorender_config::RenderConfig;

pub fn validate() -> anyhow::Result<()> {
    println!("🔍 Validating configuration...");

    let config = match RenderConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let mut warnings = Vec::new();
    match config.resolve_target() {
        Ok(target) => {
            if let Err(e) = priorender_tokenizers::tokenizer_from_name(&target.tokenizer) {
                warnings.push(format!("Tokenizer unavailable: {e}"));
            }
            println!();
            println!("   Model:       {}", config.model.as_deref().unwrap_or("(none)"));
            println!("   Token limit: {}", target.token_limit);
            println!("   Tokenizer:   {}", target.tokenizer);
        }
        Err(e) => warnings.push(format!("No render target: {e}")),
    }

    if config.calibration.base_priority <= 0 {
        warnings.push("calibration.base_priority is not positive; prioritized content may outrank top level".into());
    }

    println!("   Search:      {:?}", config.search);
    println!("   Custom models: {}", config.models.len());

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    Ok(())
}

pub fn show() -> anyhow::Result<()> {
    let config = RenderConfig::load()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() -> anyhow::Result<()> {
    println!("{}", RenderConfig::config_path().display());
    Ok(())
}

pub fn init() -> anyhow::Result<()> {
    let path = RenderConfig::config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(RenderConfig::config_dir())?;
    std::fs::write(&path, RenderConfig::default_toml())?;
    println!("✅ Wrote default config to {}", path.display());
    Ok(())
}
