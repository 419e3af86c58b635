//! syncdb - contention scenarios against an in-memory versioned store
//!
//! This is the main entry point for the syncdb command-line interface.

use std::process::ExitCode;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::Level;

use syncdb::workload::{self, scenarios, ClientConfig};
use syncdb::{LockStrategy, Stats, Store, StoreConfig, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    Counter,
    Transfer,
    Paired,
    Mixed,
}

impl Scenario {
    const ALL: [Scenario; 4] = [
        Scenario::Counter,
        Scenario::Transfer,
        Scenario::Paired,
        Scenario::Mixed,
    ];

    fn name(&self) -> &'static str {
        match self {
            Scenario::Counter => "counter",
            Scenario::Transfer => "transfer",
            Scenario::Paired => "paired",
            Scenario::Mixed => "mixed",
        }
    }
}

fn parse_scenarios(s: &str) -> StoreResult<Vec<Scenario>> {
    if s == "all" {
        return Ok(Scenario::ALL.to_vec());
    }
    Scenario::ALL
        .into_iter()
        .find(|scenario| scenario.name() == s)
        .map(|scenario| vec![scenario])
        .ok_or_else(|| StoreError::invalid_argument("--scenario", s))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: Option<&String>) -> StoreResult<T> {
    let value = value.ok_or_else(|| StoreError::invalid_argument(name, "<missing>"))?;
    value
        .parse()
        .map_err(|_| StoreError::invalid_argument(name, value.as_str()))
}

struct Options {
    strategy: LockStrategy,
    scenarios: Vec<Scenario>,
    clients: Option<usize>,
    seed: u64,
    delay: Option<Duration>,
    duration: Duration,
    json: bool,
    verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strategy: LockStrategy::default(),
            scenarios: Scenario::ALL.to_vec(),
            clients: None,
            seed: u64::from(chrono::Utc::now().timestamp_subsec_nanos()),
            delay: None,
            duration: Duration::from_secs(2),
            json: false,
            verbose: false,
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut options = Options::default();
    let mut i = 1;
    while i < args.len() {
        let parsed = match args[i].as_str() {
            "-s" | "--strategy" => {
                i += 1;
                args.get(i)
                    .ok_or_else(|| StoreError::invalid_argument("--strategy", "<missing>"))
                    .and_then(|s| s.parse())
                    .map(|strategy| options.strategy = strategy)
            }
            "--scenario" => {
                i += 1;
                args.get(i)
                    .ok_or_else(|| StoreError::invalid_argument("--scenario", "<missing>"))
                    .and_then(|s| parse_scenarios(s))
                    .map(|scenarios| options.scenarios = scenarios)
            }
            "-c" | "--clients" => {
                i += 1;
                parse_number("--clients", args.get(i)).and_then(|n: usize| {
                    if n == 0 {
                        return Err(StoreError::invalid_argument("--clients", "0"));
                    }
                    options.clients = Some(n);
                    Ok(())
                })
            }
            "--seed" => {
                i += 1;
                parse_number("--seed", args.get(i)).map(|seed| options.seed = seed)
            }
            "--delay-us" => {
                i += 1;
                parse_number("--delay-us", args.get(i))
                    .map(|us| options.delay = Some(Duration::from_micros(us)))
            }
            "--duration-ms" => {
                i += 1;
                parse_number("--duration-ms", args.get(i))
                    .map(|ms| options.duration = Duration::from_millis(ms))
            }
            "--json" => {
                options.json = true;
                Ok(())
            }
            "-v" | "--verbose" => {
                options.verbose = true;
                Ok(())
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("syncdb v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = parsed {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_max_level(if options.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match run(&options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("syncdb - contention scenarios against an in-memory versioned store");
    println!();
    println!("Usage: syncdb [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -s, --strategy NAME    Lock strategy: global, rwlock, per-key (default: per-key)");
    println!("  --scenario NAME        counter, transfer, paired, mixed or all (default: all)");
    println!("  -c, --clients N        Concurrent clients per scenario");
    println!("  --seed N               Seed for generated workloads");
    println!("  --delay-us N           Sleep N microseconds inside every critical section");
    println!("  --duration-ms N        Run time of the paired scenario (default: 2000)");
    println!("  --json                 Print reports as JSON");
    println!("  -v, --verbose          Enable debug logging");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Examples:");
    println!("  syncdb                                   Run every scenario");
    println!("  syncdb -s global --scenario counter      Counter scenario on one mutex");
    println!("  syncdb --scenario mixed --seed 7 --json  Reproducible mixed run as JSON");
}

fn fresh_store(options: &Options) -> Store {
    let mut config = StoreConfig::new(options.strategy);
    if let Some(delay) = options.delay {
        config = config.processing_delay(delay);
    }
    Store::with_config(config)
}

fn run(options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let mut reports = Map::new();
    if !options.json {
        println!("syncdb: strategy={} seed={}", options.strategy, options.seed);
    }

    for scenario in &options.scenarios {
        let store = fresh_store(options);
        let report = run_scenario(*scenario, &store, options)?;
        reports.insert(scenario.name().to_string(), report);
    }

    if options.json {
        let output = json!({
            "strategy": options.strategy,
            "seed": options.seed,
            "scenarios": Value::Object(reports),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn run_scenario(
    scenario: Scenario,
    store: &Store,
    options: &Options,
) -> Result<Value, Box<dyn std::error::Error>> {
    let text = !options.json;
    if text {
        println!();
        println!("{}", "=".repeat(60));
    }

    let value = match scenario {
        Scenario::Counter => {
            let clients = options.clients.unwrap_or(10);
            let report = scenarios::run_counter(store, clients, 100)?;
            if text {
                println!("=== Counter Increment Scenario ===");
                println!("{} clients, {} increments each", clients, report.increments_per_client);
                println!("Expected final value: {}", report.expected);
                match report.final_state {
                    Some(state) => println!("Final counter value: {}", state),
                    None => println!("Final counter value: NOT_FOUND"),
                }
                for line in report.integrity.descriptions() {
                    println!("  {}", line);
                }
                print_verdict(report.is_consistent(), "all increments recorded");
                print_stats(&report.stats);
            }
            serde_json::to_value(&report)?
        }
        Scenario::Transfer => {
            let clients = options.clients.unwrap_or(5);
            let report = scenarios::run_bank_transfer(store, clients, 50, options.seed)?;
            if text {
                println!("=== Bank Transfer Scenario ===");
                println!("{} clients, {} transfers each", clients, report.transfers_per_client);
                println!(
                    "Final state: {}={}, {}={}, total={}",
                    scenarios::ACCOUNT_A,
                    format_balance(report.final_a),
                    scenarios::ACCOUNT_B,
                    format_balance(report.final_b),
                    format_balance(report.final_total()),
                );
                println!("Transfers applied: {}, refused: {}", report.applied, report.refused);
                print_verdict(report.is_conserved(), "total preserved");
                print_stats(&report.stats);
            }
            serde_json::to_value(&report)?
        }
        Scenario::Paired => {
            let readers = options.clients.unwrap_or(5);
            let writers = (readers * 3 / 5).max(1);
            let report = scenarios::run_paired_read_write(
                store,
                readers,
                writers,
                options.duration,
                options.seed,
            )?;
            if text {
                println!("=== Read-Write Scenario ===");
                println!(
                    "{} readers, {} writers for {:?}",
                    readers, writers, report.duration
                );
                println!(
                    "Paired reads: {}, paired writes: {}, inconsistent reads: {}",
                    report.paired_reads, report.paired_writes, report.inconsistent_reads
                );
                print_verdict(report.is_consistent(), "no inconsistent reads");
                print_stats(&report.stats);
            }
            serde_json::to_value(&report)?
        }
        Scenario::Mixed => {
            let configs: Vec<ClientConfig> =
                scenarios::default_clients(options.clients.unwrap_or(8));
            let report = workload::run_mixed(store, &configs, options.seed)?;
            if text {
                println!("=== General Concurrent Operations Scenario ===");
                println!("{} clients with mixed operations", configs.len());
                println!();
                println!("Final records:");
                for record in &report.records {
                    println!(
                        "  {}: {} (v{}, updated {})",
                        record.key(),
                        record.value(),
                        record.version(),
                        record.updated_at().format("%H:%M:%S%.6f")
                    );
                }
                print_verdict(report.is_accounted(), "statistics match issued operations");
                print_stats(&report.stats);
            }
            serde_json::to_value(&report)?
        }
    };
    Ok(value)
}

fn format_balance(balance: Option<i64>) -> String {
    balance.map_or_else(|| "NOT_FOUND".to_string(), |b| b.to_string())
}

fn print_verdict(ok: bool, what: &str) {
    if ok {
        println!("OK: {}", what);
    } else {
        println!("FAILED: {}", what);
    }
}

fn print_stats(stats: &Stats) {
    println!();
    println!("Statistics:");
    println!("  Reads:        {}", stats.total_reads);
    println!("  Writes:       {}", stats.total_writes);
    println!("  Updates:      {}", stats.total_updates);
    println!("  Deletes:      {}", stats.total_deletes);
    println!("  Transfers:    {}", stats.total_transfers);
    println!("  Lost updates: {}", stats.lost_updates);
    println!("  Corruption:   {}", stats.data_corruption);
    println!(
        "  Transactions: {} started, {} committed, {} aborted",
        stats.transactions_started, stats.transactions_committed, stats.transactions_aborted
    );
}
