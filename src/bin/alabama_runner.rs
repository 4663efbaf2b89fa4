//! Alabama ADOR runner: scrapes one county's delinquent properties in a
//! headless browser and reports through the exit code taxonomy.

use clap::Parser;

use deedscout::config::AppConfig;
use deedscout::scrapers::alabama;
use deedscout::scrapers::browser::{finish, init_runner_tracing, RunnerArgs};
use deedscout::snapshot::SnapshotRecorder;

fn main() {
    init_runner_tracing();
    let args = RunnerArgs::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => finish(Err(e.into()), &args.json_output),
    };
    let recorder = SnapshotRecorder::new(&config.snapshots.dir);

    let result = alabama::scrape_county(&config.scraper, &recorder, &args.county, args.max_pages);
    finish(result, &args.json_output);
}
