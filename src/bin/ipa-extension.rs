//! Identity extension: translates provider operations into FreeIPA calls.
//!
//! Invoked by the integration framework with an operation name and a JSON
//! request of named arguments (from a file, or stdin when no file is
//! given). Answers with a JSON object of named outputs on stdout, or a
//! short error message on stderr and exit code 1.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use provider_extensions::config::{ExtensionConfig, DEFAULT_CONFIG_PATH};
use provider_extensions::errors::{OpError, OpResult};
use provider_extensions::ipa::{ops, IpaClient};
use provider_extensions::request::OpRequest;

#[derive(Parser, Debug)]
#[command(name = "ipa-extension")]
#[command(about = "FreeIPA identity extension for the provider integration layer", long_about = None)]
struct Args {
    /// Operation to perform (user_create, user_query, user_modify,
    /// user_delete, group_create, group_query, group_delete,
    /// group_add_user, group_remove_user)
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

fn dispatch(client: &IpaClient, operation: &str, req: &OpRequest) -> OpResult {
    match operation {
        "user_create" => ops::user_create(client, req),
        "user_query" => ops::user_query(client, req),
        "user_modify" => ops::user_modify(client, req),
        "user_delete" => ops::user_delete(client, req),
        "group_create" => ops::group_create(client, req),
        "group_query" => ops::group_query(client, req),
        "group_delete" => ops::group_delete(client, req),
        "group_add_user" => ops::group_add_user(client, req),
        "group_remove_user" => ops::group_remove_user(client, req),
        _ => Err(OpError::InvalidField("operation".to_string())),
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = ExtensionConfig::load(&args.config)?;
    let req = read_request(args.request.as_ref())?;

    let client = IpaClient::connect(&config.ipa)?;
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
