use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use skumatch::config::{
    require_credential, JudgeOptions, JudgeProvider, OpenAiArgs, SearchKeys,
    DEFAULT_ANTHROPIC_MODEL, DEFAULT_JUDGE_MODEL, SNIPPET_CACHE_CAPACITY,
};
use skumatch::logging::init_tracing;
use skumatch::{
    AnthropicProvider, Judge, LlmProvider, OpenAiProvider, ProductAttributes, SearchChain,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "sku-judge",
    about = "Decide whether two plumbing SKU descriptions name the same product"
)]
struct JudgeCli {
    /// First supplier description
    desc_a: String,

    /// Second supplier description
    desc_b: String,

    /// Skip web retrieval and judge from the descriptions alone
    #[arg(long, default_value_t = false)]
    no_web: bool,

    /// Total web snippets passed to the judge model
    #[arg(long, default_value_t = 8)]
    max_snippets: usize,

    /// Print the parsed attribute records and exit
    #[arg(long, default_value_t = false)]
    parse_only: bool,

    /// Judge model provider
    #[arg(long, value_enum, env = "SKU_JUDGE_PROVIDER", default_value = "openai")]
    provider: JudgeProvider,

    /// OpenAI chat model used for judging
    #[arg(long, env = "SKU_JUDGE_MODEL", default_value = DEFAULT_JUDGE_MODEL)]
    model: String,

    /// Anthropic API key (required when --provider anthropic)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,

    /// Anthropic model identifier
    #[arg(long, env = "SKU_ANTHROPIC_MODEL", default_value = DEFAULT_ANTHROPIC_MODEL)]
    anthropic_model: String,

    #[command(flatten)]
    openai: OpenAiArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = JudgeCli::parse();

    if cli.parse_only {
        let a = ProductAttributes::parse(&cli.desc_a);
        let b = ProductAttributes::parse(&cli.desc_b);
        println!("{}", serde_json::to_string_pretty(&json!({ "A": a, "B": b }))?);
        return Ok(());
    }

    let llm = build_provider(&cli)?;
    let search = SearchChain::from_keys(&SearchKeys::from_env(), SNIPPET_CACHE_CAPACITY)?;
    info!(providers = ?search.provider_names(), "search chain ready");

    let judge = Judge::new(llm, search);
    let options = JudgeOptions {
        use_web: !cli.no_web,
        max_snippets: cli.max_snippets,
    };
    let verdict = judge.judge_same_product(&cli.desc_a, &cli.desc_b, options);
    println!(
        "{}",
        serde_json::to_string_pretty(&verdict).context("failed to render verdict")?
    );
    Ok(())
}

fn build_provider(cli: &JudgeCli) -> Result<Box<dyn LlmProvider>> {
    let provider: Box<dyn LlmProvider> = match cli.provider {
        JudgeProvider::Openai => {
            let key = cli.openai.require_key()?;
            Box::new(OpenAiProvider::new(
                key,
                &cli.openai.openai_base,
                cli.model.clone(),
                cli.openai.timeout(),
            )?)
        }
        JudgeProvider::Anthropic => {
            let key = require_credential(cli.anthropic_api_key.as_deref(), "ANTHROPIC_API_KEY")?;
            Box::new(AnthropicProvider::new(
                key,
                cli.anthropic_model.clone(),
                cli.openai.timeout(),
            )?)
        }
    };
    Ok(provider)
}
