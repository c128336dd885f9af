use chainforge::config::Config;
use chainforge::prelude::*;
use chainforge::service::{ServiceContext, TemplateService};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Infer, compile and run prompt chains from the command line
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Optional TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Suggest form fields for a free-form prompt
    Infer {
        prompt: String,
    },
    /// Compile a chain JSON file into its form
    Form {
        chain_path: PathBuf,
    },
    /// Fill in a chain's form and run it through the simulator
    Run {
        chain_path: PathBuf,

        /// A response as `variable=value`; repeat for each field
        #[arg(short, long = "set", value_parser = parse_response)]
        responses: Vec<(String, String)>,

        /// Model to run against (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        #[arg(long, env = "CHAINFORGE_API_KEY")]
        api_key: Option<String>,
    },
    /// List templates from a store snapshot
    Templates {
        /// Store snapshot file (defaults to the configured snapshot path)
        #[arg(short, long)]
        store: Option<PathBuf>,

        #[arg(short = 'q', long, default_value = "")]
        search: String,

        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&e.to_string())),
        None => Config::default(),
    }
    .with_env_overrides();

    match cli.command {
        Command::Infer { prompt } => run_infer(&prompt),
        Command::Form { chain_path } => run_form(&chain_path),
        Command::Run {
            chain_path,
            responses,
            model,
            api_key,
        } => {
            let model = model.unwrap_or_else(|| config.default_model.clone());
            run_chain(&chain_path, responses, &model, api_key.as_deref()).await
        }
        Command::Templates {
            store,
            search,
            category,
        } => {
            let store = store
                .or_else(|| config.store.snapshot_path.clone())
                .unwrap_or_else(|| exit_with_error("No store snapshot given and none configured."));
            run_templates(&store, &search, category.as_deref(), config).await
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chainforge=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn run_infer(prompt: &str) {
    let analysis = FieldInferer::default().analyze(prompt);
    println!("Suggested fields for: {}", analysis.analyzed_prompt);
    for field in &analysis.fields {
        let options = field
            .options
            .as_ref()
            .map(|o| format!(" [{}]", o.join(", ")))
            .unwrap_or_default();
        println!(
            "  - {} ({}) -> {{{{{}}}}}{}",
            field.label, field.field_type, field.variable, options
        );
    }
}

fn run_form(chain_path: &Path) {
    let chain = load_chain(chain_path);
    report_issues(&chain);

    let form = FormCompiler::new().compile_form(&chain.nodes, &chain.final_prompt);
    let json = serde_json::to_string_pretty(&form)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialise form: {}", e)));
    println!("{}", json);
}

async fn run_chain(
    chain_path: &Path,
    responses: Vec<(String, String)>,
    model: &str,
    api_key: Option<&str>,
) {
    let total_start = Instant::now();
    let chain = load_chain(chain_path);
    report_issues(&chain);

    let responses: Responses = responses.into_iter().collect();
    let form = FormCompiler::new().compile_form(&chain.nodes, &chain.final_prompt);
    if let Err(errors) = form.validate(&responses) {
        for error in &errors.errors {
            eprintln!("  - {}: {}", error.variable, error.message);
        }
        exit_with_error(&errors.to_string());
    }

    let executor = ChainExecutor::new(SimulatedBackend::new());
    let record = executor
        .execute(&chain, &responses, model, api_key)
        .await
        .unwrap_or_else(|e| exit_with_error(&format!("Execution failed: {}", e)));

    println!("\n--- Prompt ---\n{}", record.prompt);
    println!("\n--- Response ({}) ---\n{}", record.model, record.response);
    println!(
        "\nTokens: {} prompt + {} completion = {}",
        record.token_usage.prompt, record.token_usage.completion, record.token_usage.total
    );
    println!("Total time: {:?}", total_start.elapsed());
}

async fn run_templates(store_path: &Path, search: &str, category: Option<&str>, config: Config) {
    let store = InMemoryStore::from_snapshot_file(store_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to load store '{}': {}",
            store_path.display(),
            e
        ))
    });
    let templates = TemplateService::new(ServiceContext::new(Arc::new(store)).with_config(config));

    let found = templates.search(search, category).await;
    println!("Categories: {}", templates.categories().await.join(", "));
    println!("{} template(s):", found.len());
    for template in found {
        println!(
            "  [{}] {} ({}) - {} uses, rated {:.1}",
            template.id.unwrap_or_default(),
            template.name,
            template.category,
            template.uses,
            template.rating
        );
    }
}

fn load_chain(path: &Path) -> Chain {
    let json = fs::read_to_string(path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read chain file '{}': {}", path.display(), e))
    });
    serde_json::from_str(&json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse chain JSON: {}", e)))
}

fn report_issues(chain: &Chain) {
    for issue in chain.validate() {
        if issue.is_blocking() {
            tracing::error!(chain = %chain.name, "{}", issue);
        } else {
            tracing::warn!(chain = %chain.name, "{}", issue);
        }
    }
}

fn parse_response(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected `variable=value`, got '{raw}'"))
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
