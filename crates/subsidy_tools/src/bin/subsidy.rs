#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use subsidy_adapter::bridges::{RemoteProfileClient, SubgraphLedgerClient};
use subsidy_adapter::config::AdminConfig;
use subsidy_adapter::init_tracing;
use subsidy_engines::profile_api::ProfileApiRuntime;
use subsidy_engines::subgraph::SubgraphRuntime;
use subsidy_os::dashboard::load_dashboard;
use subsidy_os::editor::ProfileEditor;
use subsidy_tools::dashboard_cli::{parse_dashboard_args, render_dashboard, DASHBOARD_USAGE};
use subsidy_tools::seed_cli::{load_seed_profiles, seed_profiles, DEFAULT_SEED_FILE};
use tracing::debug;

const USAGE: &str = "usage: subsidy <dashboard|seed|profile> ...\n  \
     subsidy dashboard [flags]\n  \
     subsidy seed [file]\n  \
     subsidy profile get <address>\n  \
     subsidy profile set <address> <name> [phone] [responsable]";

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

async fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().ok_or_else(|| USAGE.to_string())?;
    let config = AdminConfig::from_env().map_err(|e| e.to_string())?;
    debug!(profile_api = %config.profile_api_url, "configuration loaded");
    let profiles = remote_profiles(&config)?;

    match command.as_str() {
        "dashboard" => {
            let dashboard_args = parse_dashboard_args(&args[1..])?;
            let subgraph = config
                .subgraph()
                .map_err(|e| format!("{e}. {DASHBOARD_USAGE}"))?;
            let ledger = SubgraphLedgerClient::new(
                SubgraphRuntime::new(&subgraph).map_err(|e| e.to_string())?,
            );
            let snapshot = load_dashboard(&ledger, &profiles)
                .await
                .map_err(|e| e.to_string())?;
            if dashboard_args.json {
                let json = serde_json::to_string_pretty(&snapshot.summary)
                    .map_err(|e| e.to_string())?;
                println!("{json}");
            } else {
                print!("{}", render_dashboard(&snapshot, &dashboard_args));
            }
            Ok(())
        }
        "seed" => {
            let file = args
                .get(1)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SEED_FILE));
            let env_data = env::var("BENEFICIARIES_DATA").ok();
            let seeds = load_seed_profiles(env_data.as_deref(), &file)?;
            println!("found {} beneficiaries to seed", seeds.len());
            let lines = seed_profiles(&profiles, &seeds)
                .await
                .map_err(|e| e.to_string())?;
            for line in lines {
                println!("{line}");
            }
            Ok(())
        }
        "profile" => run_profile(&args[1..], profiles).await,
        other => Err(format!("unknown command: {other}\n{USAGE}")),
    }
}

async fn run_profile(args: &[String], profiles: RemoteProfileClient) -> Result<(), String> {
    let editor = ProfileEditor::new(Arc::new(profiles));
    let arg = |i: usize| args.get(i).map(String::as_str);
    match (arg(0), arg(1)) {
        (Some("get"), Some(address)) => {
            match editor.lookup(address).await.map_err(|e| e.to_string())? {
                Some(record) => {
                    let json =
                        serde_json::to_string_pretty(&record).map_err(|e| e.to_string())?;
                    println!("{json}");
                }
                None => println!("no profile for {address}"),
            }
            Ok(())
        }
        (Some("set"), Some(address)) => {
            let name = arg(2).ok_or_else(|| USAGE.to_string())?;
            let (record, kind) = editor
                .save(address, name, arg(3), arg(4))
                .await
                .map_err(|e| e.to_string())?;
            println!("{kind:?} {} ({})", record.name, record.address.compact_label());
            Ok(())
        }
        _ => Err(USAGE.to_string()),
    }
}

fn remote_profiles(config: &AdminConfig) -> Result<RemoteProfileClient, String> {
    let runtime = ProfileApiRuntime::new(&config.profile_api()).map_err(|e| e.to_string())?;
    Ok(RemoteProfileClient::new(runtime))
}
