//! graph-query-orchestrator binary.
//!
//! Parses one natural-language query from the command line, runs it through
//! the pipeline, and prints the rendered answer.

use orchestrator::cli::Cli;
use orchestrator::config::OrchestratorConfig;
use orchestrator::executor::ExecutorConfig;
use orchestrator::llm::{ModelParams, Provider};
use orchestrator::pipeline::Pipeline;
use orchestrator::synthesizer::SynthesizerConfig;
use orchestrator::tools::ToolRegistry;
use orchestrator::{ToolClient, ToolClientConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse_args();
    if cli.verbose {
        tracing::debug!("verbose logging requested via --verbose");
    }

    tracing::info!("starting graph-query-orchestrator");

    let config = OrchestratorConfig::load(&cli.config).map_err(|e| {
        tracing::error!(error = %e, path = %cli.config.display(), "failed to load configuration");
        e
    })?;

    let tool_client = ToolClient::new(ToolClientConfig {
        base_url: config.tool_server.base_url.clone(),
        api_key: config.tool_server.api_key()?,
        max_retries: config.tool_server.max_retries,
        retry_base_delay: config.tool_server.retry_base_delay(),
        pool_max_idle_per_host: config.tool_server.connection_pool_limit,
    })?;

    let tool_registry = ToolRegistry::new();
    tracing::info!(tools = tool_registry.tool_names().len(), "tool registry loaded");

    #[cfg(debug_assertions)]
    match tool_client.list_tools().await {
        Ok(server_tools) => {
            let diff = tool_registry.diff_against_server(&server_tools);
            if !diff.is_empty() {
                tracing::warn!(
                    missing_locally = ?diff.missing_locally,
                    missing_on_server = ?diff.missing_on_server,
                    "compiled-in tool catalog has drifted from the live server"
                );
            }
        }
        Err(e) => tracing::warn!(error = %e, "could not reach tool server to validate the tool catalog"),
    }

    let decomposer_llm = make_provider(&config, &config.llm.decomposer_model, config.llm.decomposer_temperature)
        .create_client(ModelParams { temperature: Some(config.llm.decomposer_temperature), ..Default::default() })
        .await?;
    let subquery_llm = make_provider(&config, &config.llm.subquery_model, config.llm.subquery_temperature)
        .create_client(ModelParams { temperature: Some(config.llm.subquery_temperature), ..Default::default() })
        .await?;
    let synthesizer_llm = make_provider(&config, &config.llm.synthesizer_model, config.llm.synthesizer_temperature)
        .create_client(ModelParams { temperature: Some(config.llm.synthesizer_temperature), ..Default::default() })
        .await?;

    let pipeline = Pipeline::new(
        tool_client,
        tool_registry,
        decomposer_llm,
        subquery_llm,
        synthesizer_llm,
        config.tool_server.max_retries,
        ExecutorConfig {
            max_concurrency: config.execution.max_concurrency,
            per_call_timeout: config.tool_server.timeout(),
        },
        SynthesizerConfig { per_fetch_timeout: config.tool_server.timeout() },
    );

    let desired_count = cli.desired_count.or(Some(config.execution.default_desired_count));
    let result = pipeline.run(&cli.user_query, desired_count, CancellationToken::new()).await;

    tracing::info!(status = ?result.workflow_status, errors = result.errors.len(), "pipeline run complete");
    println!("{}", result.final_response);

    if !result.errors.is_empty() {
        eprintln!("\n({} diagnostic(s) recorded during this run)", result.errors.len());
        for error in &result.errors {
            eprintln!("  - [{:?}] {}", error.kind, error.message);
        }
    }

    Ok(())
}

fn make_provider(config: &OrchestratorConfig, model: &str, _temperature: f32) -> Provider {
    match config.llm.provider.as_str() {
        "openai" => Provider::OpenAI {
            api_key: config.llm.api_key().unwrap_or_default(),
            api_base: config.llm.api_base.clone().unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.to_string(),
        },
        _ => Provider::Ollama { base_url: config.llm.base_url.clone(), model: model.to_string() },
    }
}
