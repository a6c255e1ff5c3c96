//! check-merge, merge-preview, integrate, smart-merge and merge-history

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde_json::json;
use tandem_core::{merge::MergeOptions, vcs::MergeStrategy, TandemContext};

use super::required;
use crate::cli::output::print_json;

fn merge_options(ctx: &TandemContext, sub_m: &ArgMatches) -> Result<MergeOptions> {
    let strategy = match sub_m.get_one::<String>("strategy") {
        Some(value) => value
            .parse::<MergeStrategy>()
            .with_context(|| format!("Unknown merge strategy '{value}'"))?,
        None => ctx.config.merge.default_strategy,
    };
    Ok(MergeOptions {
        strategy,
        delete_branch: sub_m.get_one::<bool>("delete-branch").copied().unwrap_or(true),
        delete_worktree: sub_m
            .get_one::<bool>("delete-worktree")
            .copied()
            .unwrap_or(true),
        message: sub_m.get_one::<String>("message").cloned(),
    })
}

pub async fn handle_check_merge(ctx: &TandemContext, sub_m: &ArgMatches) -> Result<()> {
    let check = ctx.merges.check_merge(required(sub_m, "id")?).await?;
    print_json(&check)
}

pub async fn handle_merge_preview(ctx: &TandemContext, sub_m: &ArgMatches) -> Result<()> {
    let preview = ctx.merges.preview(required(sub_m, "id")?).await?;
    print_json(&preview)
}

pub async fn handle_integrate(ctx: &TandemContext, sub_m: &ArgMatches) -> Result<()> {
    let options = merge_options(ctx, sub_m)?;
    let report = ctx
        .merges
        .integrate(required(sub_m, "id")?, &options)
        .await?;
    print_json(&report)
}

pub async fn handle_smart_merge(ctx: &TandemContext, sub_m: &ArgMatches) -> Result<()> {
    let options = merge_options(ctx, sub_m)?;
    let report = ctx
        .merges
        .smart_merge(required(sub_m, "id")?, &options)
        .await?;
    print_json(&report)
}

pub fn handle_merge_history(ctx: &TandemContext) -> Result<()> {
    let merges = ctx.audit().list()?;
    print_json(json!({ "count": merges.len(), "merges": merges }))
}
