use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use deedscout::config::AppConfig;
use deedscout::counties::{
    ALABAMA_COUNTY_CODES, ARKANSAS_COUNTIES, FLORIDA_COUNTIES, TEXAS_COUNTIES,
};
use deedscout::scrapers::factory::ScraperFactory;
use deedscout::states::active_states;

#[derive(Parser)]
#[command(name = "deedscout", about = "Multi-state tax sale property scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a harvest for one state
    Scrape {
        /// Two-letter state code (e.g. AR, AL, TX, FL)
        state: String,
        /// County name or code; required for county-based states
        #[arg(long)]
        county: Option<String>,
        /// Write the records to this file as JSON
        #[arg(long)]
        output: Option<std::path::PathBuf>,
    },
    /// List supported states
    States,
    /// List supported counties for a state
    Counties {
        /// Two-letter state code
        state: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let file_appender = tracing_appender::rolling::daily("logs", "deedscout.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env().add_directive("deedscout=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Scrape {
            state,
            county,
            output,
        } => {
            let config = AppConfig::from_env()?;
            let factory = ScraperFactory::new(config);

            info!("Starting scrape for {state}");
            let result = factory.scrape(&state, county.as_deref()).await;

            match &result.error {
                None => println!(
                    "Scraped {} properties from {}",
                    result.items_found,
                    state.to_uppercase()
                ),
                Some(error) if result.items_found > 0 => println!(
                    "Scraped {} properties from {} (partial: {error})",
                    result.items_found,
                    state.to_uppercase()
                ),
                Some(error) => anyhow::bail!("Scrape failed: {error}"),
            }

            for record in result.records.iter().take(5) {
                println!(
                    "  - {}: ${:.2} ({})",
                    record.parcel_id,
                    record.amount,
                    record.owner_name.as_deref().unwrap_or("unknown owner")
                );
            }
            if result.records.len() > 5 {
                println!("  ... and {} more", result.records.len() - 5);
            }

            if let Some(path) = output {
                std::fs::write(&path, serde_json::to_string_pretty(&result.records)?)?;
                println!("Saved {} records to {}", result.items_found, path.display());
            }
        }
        Command::States => {
            println!("Supported states:");
            for state in active_states() {
                println!(
                    "  {} - {} ({}, {})",
                    state.state_code,
                    state.state_name,
                    state.sale_type,
                    if state.requires_county {
                        "county required"
                    } else {
                        "statewide"
                    }
                );
            }
        }
        Command::Counties { state } => match state.to_uppercase().as_str() {
            "AR" => {
                let mut counties: Vec<_> = ARKANSAS_COUNTIES.iter().collect();
                counties.sort_by_key(|(code, _)| *code);
                for (code, name) in counties {
                    println!("  {code} - {name}");
                }
            }
            "AL" => {
                let mut counties: Vec<_> = ALABAMA_COUNTY_CODES.iter().collect();
                counties.sort_by_key(|(code, _)| *code);
                for (code, name) in counties {
                    println!("  {code} - {name}");
                }
            }
            "TX" => {
                for site in TEXAS_COUNTIES.iter() {
                    println!("  {} - {}", site.key, site.listing_url);
                }
            }
            "FL" => {
                for site in FLORIDA_COUNTIES.iter() {
                    println!("  {} - {}", site.key, site.listing_url);
                }
            }
            other => anyhow::bail!("Unknown or unsupported state: {other}"),
        },
    }

    Ok(())
}
