//! CLI command handlers that bridge between `clap` and `tandem-core`

mod leases;
mod merge;
mod sessions;

use std::process;

use anyhow::Result;
use tandem_core::TandemContext;

use crate::cli::{build_cli, current_dir};

/// Format an error for user display (no stack traces)
pub fn format_error(err: &anyhow::Error) -> String {
    let msg = err.to_string();
    if let Some(source) = err.source() {
        let source_msg = source.to_string();
        if !msg.contains(&source_msg) && !source_msg.is_empty() {
            return format!("{msg}\nCause: {source_msg}");
        }
    }
    msg
}

pub async fn run_cli() -> Result<()> {
    let matches = match build_cli().try_get_matches() {
        Ok(m) => m,
        Err(e) => {
            use clap::error::ErrorKind;
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let json_err = serde_json::json!({
                "ok": false,
                "error": { "code": "INVALID_ARGUMENT", "message": e.to_string() }
            });
            println!("{}", serde_json::to_string_pretty(&json_err)?);
            let _ = e.print();
            process::exit(1);
        }
    };

    let cwd = current_dir()?;
    let ctx = TandemContext::discover(&cwd).await?;

    match matches.subcommand() {
        Some(("register", sub_m)) => sessions::handle_register(&ctx, &cwd, sub_m).await,
        Some(("create", sub_m)) => sessions::handle_create(&ctx, sub_m).await,
        Some(("list", sub_m)) => sessions::handle_list(&ctx, &cwd, sub_m),
        Some(("delete", sub_m)) => sessions::handle_delete(&ctx, sub_m).await,
        Some(("status", _)) => sessions::handle_status(&ctx, &cwd),
        Some(("full-status", sub_m)) => sessions::handle_full_status(&ctx, &cwd, sub_m).await,
        Some(("check-merge", sub_m)) => merge::handle_check_merge(&ctx, sub_m).await,
        Some(("merge-preview", sub_m)) => merge::handle_merge_preview(&ctx, sub_m).await,
        Some(("integrate", sub_m)) => merge::handle_integrate(&ctx, sub_m).await,
        Some(("smart-merge", sub_m)) => merge::handle_smart_merge(&ctx, sub_m).await,
        Some(("merge-history", _)) => merge::handle_merge_history(&ctx),
        Some(("add-story", sub_m)) => leases::handle_add_story(&ctx, sub_m),
        Some(("claim", sub_m)) => leases::handle_claim(&ctx, &cwd, sub_m).await,
        Some(("release", sub_m)) => leases::handle_release(&ctx, &cwd, sub_m).await,
        Some(("claims", _)) => leases::handle_claims(&ctx),
        Some(("cleanup", _)) => leases::handle_cleanup(&ctx, &cwd),
        Some(("touch", sub_m)) => leases::handle_touch(&ctx, &cwd, sub_m).await,
        Some(("overlaps", _)) => leases::handle_overlaps(&ctx, &cwd).await,
        _ => Err(anyhow::anyhow!(
            "Unknown command. Run 'tandem --help' for usage."
        )),
    }
}

/// Required positional argument as `&str`.
fn required<'a>(sub_m: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    sub_m
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{name} is required"))
}
