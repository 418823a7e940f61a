//! `priorender render` — fit a JSON prompt tree into the token budget.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use priorender_config::{RenderConfig, RenderTarget};
use priorender_core::{ChatTemplate, Priority, Prompt, parse_tree};
use priorender_engine::{PromptRenderer, RenderOutput, SearchStrategy, TokenBudget};

#[derive(Args, Debug, Default)]
pub struct RenderArgs {
    /// Prompt tree as JSON; `-` reads stdin
    pub tree: PathBuf,

    /// Model preset supplying token limit and tokenizer
    #[arg(short, long)]
    pub model: Option<String>,

    /// Token limit, overrides the model preset
    #[arg(short = 'l', long)]
    pub token_limit: Option<usize>,

    /// Tokenizer name (heuristic, words, cl100k_base, o200k_base, p50k_base, hf:<path>)
    #[arg(short, long)]
    pub tokenizer: Option<String>,

    /// Scan levels from the top instead of binary search
    #[arg(long)]
    pub linear: bool,

    /// Render at a fixed priority cutoff without searching
    #[arg(long, value_name = "PRIORITY", allow_hyphen_values = true)]
    pub at: Option<Priority>,

    /// Flatten chat prompts with a completion template
    #[arg(long, value_enum)]
    pub template: Option<TemplateArg>,

    /// Print the full render result as JSON
    #[arg(long)]
    pub json: bool,

    /// Config file to use instead of ~/.priorender/config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateArg {
    Chatml,
    Llama3,
}

impl From<TemplateArg> for ChatTemplate {
    fn from(arg: TemplateArg) -> Self {
        match arg {
            TemplateArg::Chatml => ChatTemplate::ChatMl,
            TemplateArg::Llama3 => ChatTemplate::Llama3,
        }
    }
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = RenderConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config
        }
        None => RenderConfig::load()?,
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    let target = config.resolve_target()?;
    let tokenizer = priorender_tokenizers::tokenizer_from_name(&target.tokenizer)?;
    tracing::debug!(
        tokenizer = %target.tokenizer,
        token_limit = target.token_limit,
        "Render target resolved"
    );

    let json = read_tree(&args.tree)?;
    let tree = parse_tree(&json)
        .with_context(|| format!("Invalid prompt tree in {}", args.tree.display()))?;

    let renderer = PromptRenderer::new(
        tokenizer,
        TokenBudget {
            token_limit: target.token_limit,
        },
    )
    .with_settings(config.render_settings())
    .with_strategy(config.search);

    if let Some(cutoff) = args.at {
        let level = renderer.render_at(&tree, cutoff)?;
        let prompt = level.prompt.unwrap_or_default();
        if args.json {
            let value = serde_json::json!({
                "prompt": prompt,
                "tokens_reserved": level.reserved_tokens,
                "priority_cutoff": cutoff,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", format_prompt(&prompt, args.template));
        }
        return Ok(());
    }

    let output = renderer.render(&tree)?;

    if args.json {
        let value = output_json(&output, &target)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", format_prompt(&output.prompt, args.template));
        print_summary(&output, &target);
    }

    Ok(())
}

/// Command-line flags win over file and environment.
fn apply_overrides(config: &mut RenderConfig, args: &RenderArgs) {
    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if let Some(limit) = args.token_limit {
        config.token_limit = Some(limit);
    }
    if let Some(tokenizer) = &args.tokenizer {
        config.tokenizer = Some(tokenizer.clone());
    }
    if args.linear {
        config.search = SearchStrategy::Linear;
    }
}

fn read_tree(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read prompt tree from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn format_prompt(prompt: &Prompt, template: Option<TemplateArg>) -> String {
    match (prompt, template) {
        (Prompt::Chat(messages), Some(template)) => ChatTemplate::from(template).join(messages, false),
        _ => prompt.to_string(),
    }
}

fn output_json(output: &RenderOutput, target: &RenderTarget) -> anyhow::Result<serde_json::Value> {
    let mut value = serde_json::to_value(output)?;
    if let serde_json::Value::Object(map) = &mut value {
        map.insert("token_limit".into(), target.token_limit.into());
        map.insert("tokenizer".into(), target.tokenizer.clone().into());
        if let Some(preset) = &target.preset {
            map.insert(
                "completion_budget".into(),
                preset.completion_budget(output.token_count).into(),
            );
        }
    }
    Ok(value)
}

// Summary goes to stderr so the prompt can be piped.
fn print_summary(output: &RenderOutput, target: &RenderTarget) {
    eprintln!();
    eprintln!("─────────────────────────────────────");
    eprintln!(
        "  Tokens:      {} / {} ({:.1}%)",
        output.token_count, target.token_limit, output.utilization_pct
    );
    if output.tokens_reserved > 0 {
        eprintln!("  Reserved:    {}", output.tokens_reserved);
    }
    eprintln!("  Cutoff:      {}", output.priority_cutoff);
    eprintln!("  Tokenizer:   {}", target.tokenizer);
    if let Some(preset) = &target.preset {
        eprintln!(
            "  Completion:  {} tokens available",
            preset.completion_budget(output.token_count)
        );
    }
    eprintln!("  Time:        {:.2}ms", output.duration_ms);
    for w in &output.warnings {
        eprintln!("  ⚠️  {w}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use priorender_config::ModelPreset;
    use priorender_core::ChatPromptMessage;

    #[test]
    fn flags_override_config() {
        let mut config = RenderConfig {
            model: Some("gpt-4".into()),
            token_limit: Some(100),
            ..Default::default()
        };
        let args = RenderArgs {
            token_limit: Some(50),
            tokenizer: Some("words".into()),
            linear: true,
            ..Default::default()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.model.as_deref(), Some("gpt-4"));
        assert_eq!(config.token_limit, Some(50));
        assert_eq!(config.tokenizer.as_deref(), Some("words"));
        assert_eq!(config.search, SearchStrategy::Linear);
    }

    #[test]
    fn template_applies_only_to_chat() {
        let chat = Prompt::Chat(vec![ChatPromptMessage::new("user", "hi")]);
        assert_eq!(
            format_prompt(&chat, Some(TemplateArg::Chatml)),
            "<|im_start|>user<|im_sep|>hi<|im_end|>"
        );
        assert_eq!(format_prompt(&chat, None), "[user] hi");

        let plain = Prompt::Plain("hello".into());
        assert_eq!(format_prompt(&plain, Some(TemplateArg::Llama3)), "hello");
    }

    #[test]
    fn json_output_carries_target() {
        let output = RenderOutput {
            prompt: Prompt::Plain("x".into()),
            token_count: 100,
            tokens_reserved: 0,
            priority_cutoff: 5,
            duration_ms: 0.5,
            utilization_pct: 1.0,
            warnings: vec![],
        };
        let target = RenderTarget {
            token_limit: 8192,
            tokenizer: "cl100k_base".into(),
            preset: Some(ModelPreset::new(8192, "cl100k_base")),
        };
        let value = output_json(&output, &target).unwrap();
        assert_eq!(value["token_limit"], 8192);
        assert_eq!(value["tokenizer"], "cl100k_base");
        assert_eq!(value["completion_budget"], 4096);
        assert_eq!(value["priority_cutoff"], 5);
        assert!(value.get("warnings").is_none());
    }
}
