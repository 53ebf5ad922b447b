//! bilateral-settlement CLI
//!
//! Replay settlement events through the netting ledgers from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Replay an event file and print positions
//! bilateral-settlement replay --input events.json
//!
//! # Use the delta-only close-out strategy and print JSON
//! bilateral-settlement replay --input events.json --config engine.json --format json
//!
//! # Generate a random, valid event stream
//! bilateral-settlement generate --pairs 10 --events 500 --seed 7
//! ```

use bilateral_settlement::config::EngineConfig;
use bilateral_settlement::core::currency::CurrencyCode;
use bilateral_settlement::engine::SettlementEngine;
use bilateral_settlement::events::EventEnvelope;
use bilateral_settlement::ledger::aggregate::CurrencyAggregates;
use bilateral_settlement::ledger::payment_slot::SlotState;
use bilateral_settlement::ledger::repository::Position;
use bilateral_settlement::simulation::stream::{generate_event_stream, StreamConfig};
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"bilateral-settlement — bilateral net settlement engine

USAGE:
    bilateral-settlement <COMMAND> [OPTIONS]

COMMANDS:
    replay      Apply an event file to fresh ledgers and print the result
    generate    Generate a random, valid event stream (for testing)
    help        Show this message

OPTIONS (replay):
    --input <FILE>      Path to JSON events file
    --config <FILE>     Path to JSON engine config
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --pairs <N>         Number of counterparty pairs (default: 8)
    --events <N>        Number of events (default: 200)
    --currencies <LIST> Comma-separated currency codes (default: USD,ETH)
    --seed <N>          Seed for a reproducible stream
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    bilateral-settlement replay --input events.json
    bilateral-settlement replay --input events.json --format json
    bilateral-settlement generate --pairs 20 --events 1000 --seed 42
    bilateral-settlement generate --currencies USD,ETH,FIL --output events.json"#
    );
}

/// Event files are either `{"events": [...]}` or a bare array.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum EventsFile {
    Wrapped { events: Vec<EventEnvelope> },
    Bare(Vec<EventEnvelope>),
}

impl EventsFile {
    fn into_events(self) -> Vec<EventEnvelope> {
        match self {
            EventsFile::Wrapped { events } | EventsFile::Bare(events) => events,
        }
    }
}

#[derive(serde::Serialize)]
struct EventsOutput<'a> {
    events: &'a [EventEnvelope],
}

/// JSON output schema for a replay.
#[derive(serde::Serialize)]
struct ReplayOutput {
    events_applied: usize,
    time_slots: Vec<SlotOutput>,
    close_outs: Vec<NetOutput>,
    collateral: Vec<CollateralOutput>,
    slot_totals: Vec<AggregateOutput>,
    close_out_totals: Vec<AggregateOutput>,
}

#[derive(serde::Serialize)]
struct SlotOutput {
    key: String,
    party0: String,
    party1: String,
    total0: String,
    total1: String,
    net_payment: String,
    payer: String,
    state: String,
}

#[derive(serde::Serialize)]
struct NetOutput {
    key: String,
    party0: String,
    party1: String,
    total0: String,
    total1: String,
    net_payment: String,
    payer: String,
}

#[derive(serde::Serialize)]
struct CollateralOutput {
    key: String,
    party0: String,
    party1: String,
    settled0: String,
    settled1: String,
    unsettled0: String,
    unsettled1: String,
}

#[derive(serde::Serialize)]
struct AggregateOutput {
    currency: String,
    gross_payment: String,
    net_payment: String,
    savings: String,
    positions: u64,
}

fn state_name(state: &SlotState) -> &'static str {
    match state {
        SlotState::Open => "open",
        SlotState::Verified { .. } => "verified",
        SlotState::Settled { .. } => "settled",
    }
}

fn aggregate_rows(totals: &CurrencyAggregates) -> Vec<AggregateOutput> {
    totals
        .iter()
        .map(|(currency, agg)| AggregateOutput {
            currency: currency.to_string(),
            gross_payment: agg.gross_payment().to_string(),
            net_payment: agg.net_payment().to_string(),
            savings: agg.savings().to_string(),
            positions: agg.positions(),
        })
        .collect()
}

fn load_events(path: &str) -> Vec<EventEnvelope> {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });

    let file: EventsFile = serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "events": [
    {{
      "position": {{ "block": 1, "tx_index": 0, "log_index": 0 }},
      "event": {{
        "type": "close_out_payment_adjusted",
        "party0": "0xaaaa", "party1": "0xbbbb", "currency": "ETH",
        "payment0": "100", "payment1": "40", "is_increase": true
      }}
    }}
  ]
}}"#
        );
        process::exit(1);
    });

    let mut events = file.into_events();
    events.sort_by_key(|e| e.position);
    events
}

fn load_config(path: Option<String>) -> EngineConfig {
    match path {
        Some(path) => EngineConfig::from_json_file(&path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        }),
        None => EngineConfig::default(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        process::exit(1);
    })
}

fn cmd_replay(args: &[String]) {
    let mut input_path = None;
    let mut config_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--input requires a file path");
                    process::exit(1);
                }));
            }
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--config requires a file path");
                    process::exit(1);
                }));
            }
            "--format" => {
                i += 1;
                format = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--format requires 'text' or 'json'");
                    process::exit(1);
                });
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let config = load_config(config_path);
    let events = load_events(&path);
    let mut engine = SettlementEngine::in_memory(&config);
    let applied = engine.replay(&events).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        if e.source.is_integrity_error() {
            eprintln!("The event stream is inconsistent with the ledgers at {}.", e.position);
        }
        process::exit(1);
    });

    let mut slots: Vec<_> = engine.slots().repository().positions().collect();
    slots.sort_by_key(|s| s.key().to_string());
    let mut close_outs: Vec<_> = engine.close_outs().repository().positions().collect();
    close_outs.sort_by_key(|p| p.key().to_string());
    let mut collateral: Vec<_> = engine.collateral().repository().positions().collect();
    collateral.sort_by_key(|p| p.key().to_string());

    if format == "json" {
        let output = ReplayOutput {
            events_applied: applied,
            time_slots: slots
                .iter()
                .map(|s| SlotOutput {
                    key: s.key().to_string(),
                    party0: s.pair().side0().to_string(),
                    party1: s.pair().side1().to_string(),
                    total0: s.balance().total0().to_string(),
                    total1: s.balance().total1().to_string(),
                    net_payment: s.balance().net_payment().to_string(),
                    payer: s.pair().party(s.balance().payer()).to_string(),
                    state: state_name(s.state()).to_string(),
                })
                .collect(),
            close_outs: close_outs
                .iter()
                .map(|p| NetOutput {
                    key: p.key().to_string(),
                    party0: p.address0().to_string(),
                    party1: p.address1().to_string(),
                    total0: p.balance().total0().to_string(),
                    total1: p.balance().total1().to_string(),
                    net_payment: p.balance().net_payment().to_string(),
                    payer: p.pair().party(p.balance().payer()).to_string(),
                })
                .collect(),
            collateral: collateral
                .iter()
                .map(|p| {
                    let pair = p.pair();
                    CollateralOutput {
                        key: p.key().to_string(),
                        party0: pair.side0().to_string(),
                        party1: pair.side1().to_string(),
                        settled0: p.settled_for(pair.side0()).unwrap_or_default().to_string(),
                        settled1: p.settled_for(pair.side1()).unwrap_or_default().to_string(),
                        unsettled0: p.unsettled_for(pair.side0()).unwrap_or_default().to_string(),
                        unsettled1: p.unsettled_for(pair.side1()).unwrap_or_default().to_string(),
                    }
                })
                .collect(),
            slot_totals: aggregate_rows(engine.slot_totals()),
            close_out_totals: aggregate_rows(engine.close_out_totals()),
        };
        println!("{}", to_json(&output));
    } else {
        println!("Applied {} events\n", applied);

        println!("Time slots ({}):", slots.len());
        for s in &slots {
            println!(
                "  {}  net {} paid by {}  [{}]",
                s.key(),
                s.balance().net_payment(),
                s.pair().party(s.balance().payer()),
                state_name(s.state())
            );
        }

        println!("\nClose-out positions ({}):", close_outs.len());
        for p in &close_outs {
            println!(
                "  {}  totals {} / {}  net {} paid by {}",
                p.key(),
                p.balance().total0(),
                p.balance().total1(),
                p.balance().net_payment(),
                p.pair().party(p.balance().payer())
            );
        }

        println!("\nCollateral positions ({}):", collateral.len());
        for p in &collateral {
            let pair = p.pair();
            println!(
                "  {}  {}: settled {} unsettled {}  {}: settled {} unsettled {}",
                p.key(),
                pair.side0(),
                p.settled_for(pair.side0()).unwrap_or_default(),
                p.unsettled_for(pair.side0()).unwrap_or_default(),
                pair.side1(),
                p.settled_for(pair.side1()).unwrap_or_default(),
                p.unsettled_for(pair.side1()).unwrap_or_default()
            );
        }

        for (title, totals) in [
            ("Time-slot totals", engine.slot_totals()),
            ("Close-out totals", engine.close_out_totals()),
        ] {
            println!("\n{}:", title);
            for (currency, agg) in totals.iter() {
                println!(
                    "  {:<6} gross {}  net {}  saved {}  ({} positions)",
                    currency.as_str(),
                    agg.gross_payment(),
                    agg.net_payment(),
                    agg.savings(),
                    agg.positions()
                );
            }
        }
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = StreamConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--pairs" => {
                i += 1;
                config.pair_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--pairs requires a number");
                        process::exit(1);
                    });
            }
            "--events" => {
                i += 1;
                config.event_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--events requires a number");
                        process::exit(1);
                    });
            }
            "--currencies" => {
                i += 1;
                let list = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--currencies requires a comma-separated list");
                    process::exit(1);
                });
                config.currencies = list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(CurrencyCode::new)
                    .collect();
            }
            "--seed" => {
                i += 1;
                config.seed = Some(args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(
                    || {
                        eprintln!("--seed requires a number");
                        process::exit(1);
                    },
                ));
            }
            "--output" => {
                i += 1;
                output_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--output requires a file path");
                    process::exit(1);
                }));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let events = generate_event_stream(&config);
    let json = to_json(&EventsOutput { events: &events });

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} events across {} pairs → {}",
            events.len(),
            config.pair_count,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "replay" => cmd_replay(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
