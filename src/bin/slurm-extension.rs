//! Scheduler extension: translates provider operations into Slurm
//! accounting CLI invocations.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use provider_extensions::config::{ExtensionConfig, DEFAULT_CONFIG_PATH};
use provider_extensions::errors::{OpError, OpResult};
use provider_extensions::request::OpRequest;
use provider_extensions::slurm::{ops, SlurmCli, SlurmRun};

#[derive(Parser, Debug)]
#[command(name = "slurm-extension")]
#[command(about = "Slurm scheduler extension for the provider integration layer", long_about = None)]
struct Args {
    /// Operation to perform (account_create, account_query,
    /// account_delete, user_add_to_account, user_remove_from_account,
    /// qos_modify, job_query, job_cancel)
    operation: String,

    /// Path to the JSON request file; read from stdin when omitted
    request: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(long, env = "PROVIDER_EXT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn read_request(path: Option<&PathBuf>) -> Result<OpRequest> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read request file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read request from stdin")?;
            buf
        }
    };
    Ok(OpRequest::from_json(&text)?)
}

fn dispatch(run: &dyn SlurmRun, operation: &str, req: &OpRequest) -> OpResult {
    match operation {
        "account_create" => ops::account_create(run, req),
        "account_query" => ops::account_query(run, req),
        "account_delete" => ops::account_delete(run, req),
        "user_add_to_account" => ops::user_add_to_account(run, req),
        "user_remove_from_account" => ops::user_remove_from_account(run, req),
        "qos_modify" => ops::qos_modify(run, req),
        "job_query" => ops::job_query(run, req),
        "job_cancel" => ops::job_cancel(run, req),
        _ => Err(OpError::InvalidField("operation".to_string())),
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = ExtensionConfig::load(&args.config)?;
    let req = read_request(args.request.as_ref())?;

    let cli = SlurmCli::new(config.slurm);
    let output = dispatch(&cli, &args.operation, &req)?;
    println!("{}", serde_json::to_string(&Value::Object(output))?);
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
