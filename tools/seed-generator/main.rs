use chainforge::prelude::*;
use chainforge::service::{
    Activity, AnalyticsService, AnalyticsSnapshot, ChainPerformance, ModelUsage, MonthSummary,
    Overview, ServiceContext, UsagePeriod, UsageStat,
};
use chrono::{Duration, Utc};
use clap::Parser;
use rand::rngs::ThreadRng;
use rand::seq::IndexedRandom;
use rand::{Rng, rng};
use std::sync::Arc;

const MODELS: [&str; 4] = ["gpt-4-turbo-preview", "gpt-3.5-turbo", "claude-3-opus", "gemini-pro"];

const TEMPLATE_BLUEPRINTS: [(&str, &str, &str); 4] = [
    ("Blog Post Writer", "Content", "Write a blog post about a topic for my audience in a friendly tone"),
    ("Product Description", "Marketing", "Write a product description for my brand and product name"),
    ("Email Campaign", "Marketing", "Create an email for a target audience with a call to action"),
    ("Social Media Post", "Social", "Write a social media post about a topic in a casual tone"),
];

/// A CLI tool to generate a randomised record store snapshot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the snapshot to
    #[arg(short, long, default_value = "store.bin")]
    output: String,

    /// How many prompt chains to generate
    #[arg(long, default_value_t = 8)]
    chains: usize,

    /// How many days of usage history to generate
    #[arg(long, default_value_t = 30)]
    days: i64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut rng = rng();

    if cli.days <= 0 {
        eprintln!("Error: --days must be positive, got {}", cli.days);
        std::process::exit(1);
    }

    println!(
        "Generating store snapshot ({} chains, {} days of usage)...",
        cli.chains, cli.days
    );

    let store = Arc::new(InMemoryStore::new());
    let ctx = ServiceContext::new(store.clone());

    let templates = TemplateService::new(ctx.clone());
    for (name, category, prompt) in TEMPLATE_BLUEPRINTS {
        let template = generate_template(&mut rng, name, category, prompt)?;
        templates.create(template).await?;
    }
    println!("-> Generated {} templates.", TEMPLATE_BLUEPRINTS.len());

    let chains = ChainService::new(ctx.clone());
    let mut created = Vec::with_capacity(cli.chains);
    for i in 0..cli.chains {
        let (_, _, prompt) = TEMPLATE_BLUEPRINTS[i % TEMPLATE_BLUEPRINTS.len()];
        let analysis = chains.analyze_prompt(prompt).await;
        let chain = WizardDraft::new(analysis.analyzed_prompt, analysis.fields)
            .named(format!("Generated Chain {}", i + 1))
            .into_chain()?;
        created.push(chains.create(chain).await?);
    }
    println!("-> Generated {} chains.", created.len());

    let snapshot = generate_snapshot(&mut rng, &created, cli.days);
    AnalyticsService::new(ctx).record_snapshot(snapshot).await?;
    println!("-> Generated analytics snapshot.");

    store.save_snapshot(&cli.output).await?;
    println!("Successfully saved store snapshot to '{}'", cli.output);

    Ok(())
}

fn generate_template(
    rng: &mut ThreadRng,
    name: &str,
    category: &str,
    prompt: &str,
) -> std::result::Result<Template, ConversionError> {
    let analysis = FieldInferer::default().analyze(prompt);
    let chain = WizardDraft::new(analysis.analyzed_prompt, analysis.fields).into_chain()?;
    Ok(Template {
        name: name.to_string(),
        description: prompt.to_string(),
        category: category.to_string(),
        nodes: chain.nodes,
        connections: chain.connections,
        settings: chain.settings,
        final_prompt: chain.final_prompt,
        uses: rng.random_range(0..2000),
        rating: (rng.random_range(35..=50) as f32) / 10.0,
        ..Default::default()
    })
}

fn generate_snapshot(rng: &mut ThreadRng, chains: &[Chain], days: i64) -> AnalyticsSnapshot {
    let today = Utc::now().date_naive();

    let mut usage_stats = std::collections::BTreeMap::new();
    for period in [UsagePeriod::Week, UsagePeriod::Month, UsagePeriod::Quarter] {
        let span: i64 = period.key().trim_end_matches('d').parse().unwrap_or(7);
        let stats: Vec<UsageStat> = (0..span.min(days))
            .rev()
            .map(|offset| {
                let executions = rng.random_range(5..60);
                UsageStat {
                    date: today - Duration::days(offset),
                    executions,
                    success: executions - rng.random_range(0..=executions / 10),
                }
            })
            .collect();
        usage_stats.insert(period.key().to_string(), stats);
    }

    let chain_performance: Vec<ChainPerformance> = chains
        .iter()
        .filter_map(|chain| {
            Some(ChainPerformance {
                id: chain.id?,
                name: chain.name.clone(),
                executions: rng.random_range(10..500),
                success_rate: rng.random_range(85.0..100.0),
                avg_response_time: rng.random_range(0.8..4.0),
            })
        })
        .collect();

    let total_executions: u64 = chain_performance.iter().map(|c| c.executions).sum();
    let mut remaining = 100.0;
    let model_usage: Vec<ModelUsage> = MODELS
        .iter()
        .enumerate()
        .map(|(i, model)| {
            let percentage = if i + 1 == MODELS.len() {
                remaining
            } else {
                rng.random_range(0.0..remaining / 2.0)
            };
            remaining -= percentage;
            ModelUsage {
                model: model.to_string(),
                executions: (total_executions as f64 * percentage / 100.0).round() as u64,
                percentage,
            }
        })
        .collect();

    let recent_activity: Vec<Activity> = chains
        .iter()
        .filter_map(|chain| {
            let failed = rng.random_bool(0.1);
            Some(Activity {
                id: chain.id?,
                chain_name: chain.name.clone(),
                kind: "execution".to_string(),
                status: if failed { "error" } else { "success" }.to_string(),
                model: MODELS.choose(rng).map(|m| m.to_string()),
                timestamp: Utc::now() - Duration::minutes(rng.random_range(1..600)),
            })
        })
        .collect();

    let success_rate = if chain_performance.is_empty() {
        0.0
    } else {
        chain_performance.iter().map(|c| c.success_rate).sum::<f64>()
            / chain_performance.len() as f64
    };

    AnalyticsSnapshot {
        overview: Overview {
            total_chains: chains.len() as u64,
            total_executions,
            success_rate,
            avg_response_time: rng.random_range(1.0..3.0),
            this_month: MonthSummary {
                executions: total_executions / 3,
                growth: rng.random_range(-10.0..40.0),
            },
        },
        usage_stats,
        chain_performance,
        model_usage,
        recent_activity,
        ..Default::default()
    }
}
