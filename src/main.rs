use clap::Parser;
use colored::*;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use twinchat::cli::Args;
use twinchat::config::{defaults::DEFAULT_PERSONA_NAME, Config, ToolsConfig};
use twinchat::llm::OpenAiBackend;
use twinchat::orchestrator::Orchestrator;
use twinchat::prompt::build_system_prompt;
use twinchat::server::{serve, AppState};
use twinchat::tools::{build_registry, ToolRegistry, ToolServices};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "Error:".red(), message);
    process::exit(1);
}

fn print_tools(registry: &ToolRegistry) {
    println!("{}", "Registered tools:".cyan().bold());
    for tool in registry.list() {
        println!("  {} {}", tool.name.green(), tool.description.dimmed());
        for param in &tool.schema.params {
            let required = if param.required { "required" } else { "optional" };
            println!(
                "      {}: {} ({}) {}",
                param.name,
                param.kind.json_type(),
                required,
                param.description.dimmed()
            );
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.list_tools {
        let services = ToolServices::new(DEFAULT_PERSONA_NAME, &ToolsConfig::default())
            .unwrap_or_else(|e| fail(e));
        print_tools(&build_registry(Arc::new(services)));
        return;
    }

    let config = Config::from_env_and_args(&args).unwrap_or_else(|e| fail(e));
    init_tracing(config.verbose);

    let services = ToolServices::from_config(&config).unwrap_or_else(|e| fail(e));
    let registry = Arc::new(build_registry(Arc::new(services)));
    let backend = OpenAiBackend::new(&config).unwrap_or_else(|e| fail(e));

    let system_prompt = build_system_prompt(
        &config.persona_name,
        config.system_prompt.as_deref(),
        &registry,
    );
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(backend), registry.clone()));
    let state = AppState::new(orchestrator, system_prompt, config.persona_name.clone());

    println!(
        "{} {} on {}:{} ({})",
        ">>".green().bold(),
        config.persona_name.bold(),
        config.host,
        config.port,
        config.model.dimmed()
    );
    println!(
        "{} {}",
        "Tools:".cyan(),
        registry.names().join(", ")
    );

    if let Err(e) = serve(state, &config.host, config.port).await {
        fail(e);
    }
}
