//! Minimal example extension over the local account database.
//!
//! Unlike the backend extensions this one reports a plain
//! `{"success": bool}` instead of a structured error taxonomy; it exists
//! as the smallest illustrative extension, not a production pattern.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use provider_extensions::errors::OpError;
use provider_extensions::request::OpRequest;
use provider_extensions::simple;

#[derive(Parser, Debug)]
#[command(name = "simple-extension")]
#[command(about = "Minimal local-system extension example", long_about = None)]
struct Args {
    /// Operation to perform (group_exists, user_exists, group_add,
    /// group_rename, group_delete, user_add_to_group,
    /// user_remove_from_group, create_dir, slurm_account_add,
    /// slurm_user_add)
    operation: String,

    /// Path to the JSON request file; read from stdin when omitted
    request: Option<PathBuf>,
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

fn dispatch(operation: &str, req: &OpRequest) -> Result<bool, OpError> {
    Ok(match operation {
        "group_exists" => simple::group_exists(req.required_name("group")?),
        "user_exists" => simple::user_exists(req.required_name("user")?),
        "group_add" => simple::group_add(
            req.required_name("group")?,
            req.optional_u64("gid")?.map(|g| g as u32),
        ),
        "group_rename" => {
            simple::group_rename(req.required_name("group")?, req.required_name("new_name")?)
        }
        "group_delete" => simple::group_delete(req.required_name("group")?),
        "user_add_to_group" => {
            simple::user_add_to_group(req.required_name("user")?, req.required_name("group")?)
        }
        "user_remove_from_group" => {
            simple::user_remove_from_group(req.required_name("user")?, req.required_name("group")?)
        }
        "create_dir" => simple::create_owned_dir(
            req.required("path")?,
            req.required("owner")?,
            req.required("mode")?,
        ),
        "slurm_account_add" => {
            let account = req.required_name("account")?;
            simple::slurm_account_exists(account) || simple::slurm_account_add(account)
        }
        "slurm_user_add" => {
            simple::slurm_user_add(req.required_name("user")?, req.required_name("account")?)
        }
        _ => return Err(OpError::InvalidField("operation".to_string())),
    })
}

fn run() -> Result<()> {
    let args = Args::parse();
    let req = read_request(args.request.as_ref())?;
    let success = dispatch(&args.operation, &req)?;
    println!("{}", json!({ "success": success }));
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
