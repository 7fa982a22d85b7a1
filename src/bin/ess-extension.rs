//! Storage extension: translates provider operations into Spectrum Scale
//! management calls.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use provider_extensions::config::{ExtensionConfig, DEFAULT_CONFIG_PATH};
use provider_extensions::errors::{OpError, OpResult};
use provider_extensions::ess::{ops, EssClient};
use provider_extensions::request::OpRequest;

#[derive(Parser, Debug)]
#[command(name = "ess-extension")]
#[command(about = "Spectrum Scale storage extension for the provider integration layer", long_about = None)]
struct Args {
    /// Operation to perform (fileset_query, fileset_create,
    /// fileset_delete, fileset_link, fileset_unlink, quota_set)
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

fn dispatch(client: &EssClient, operation: &str, req: &OpRequest) -> OpResult {
    match operation {
        "fileset_query" => ops::fileset_query(client, req),
        "fileset_create" => ops::fileset_create(client, req),
        "fileset_delete" => ops::fileset_delete(client, req),
        "fileset_link" => ops::fileset_link(client, req),
        "fileset_unlink" => ops::fileset_unlink(client, req),
        "quota_set" => ops::quota_set(client, req),
        _ => Err(OpError::InvalidField("operation".to_string())),
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = ExtensionConfig::load(&args.config)?;
    let req = read_request(args.request.as_ref())?;

    let client = EssClient::connect(&config.ess)?;
    let output = dispatch(&client, &args.operation, &req)?;
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
