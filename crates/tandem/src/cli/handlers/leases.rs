//! add-story, claim, release, claims, cleanup, touch and overlaps

use std::path::Path;

use anyhow::Result;
use clap::ArgMatches;
use serde::Serialize;
use serde_json::json;
use tandem_core::{
    json::ErrorDetail,
    lease::{Lease, LeaseHolder},
    Error, TandemContext,
};

use super::required;
use crate::cli::{
    current_holder, current_session,
    output::{print_json, ReportedFailure},
};

/// A claim refused because another live session holds the item.
#[derive(Debug, Serialize)]
struct ClaimRefused<'a> {
    ok: bool,
    claimed: bool,
    #[serde(rename = "claimedBy")]
    claimed_by: &'a LeaseHolder,
    #[serde(rename = "claimedAt")]
    claimed_at: chrono::DateTime<chrono::Utc>,
    error: ErrorDetail,
}

pub fn handle_add_story(ctx: &TandemContext, sub_m: &ArgMatches) -> Result<()> {
    let id = required(sub_m, "item")?;
    let title = sub_m.get_one::<String>("title").map(String::as_str);
    let added = ctx.stories.add_story(id, title)?;
    print_json(json!({ "id": id, "added": added }))
}

pub async fn handle_claim(ctx: &TandemContext, cwd: &Path, sub_m: &ArgMatches) -> Result<()> {
    let item = required(sub_m, "item")?;
    let holder = current_holder(ctx, cwd, sub_m).await?;

    match ctx.stories.acquire(item, &holder, sub_m.get_flag("force")) {
        Ok(acquired) => print_json(json!({
            "claimed": true,
            "item": item,
            "newly_acquired": acquired.newly_acquired,
            "lease": acquired.lease,
            "previous": acquired.previous,
        })),
        Err(error @ Error::Conflict { .. }) => {
            report_refused_claim(&error)?;
            Err(ReportedFailure {
                exit_code: error.exit_code(),
            }
            .into())
        }
        Err(error) => Err(error.into()),
    }
}

fn report_refused_claim(error: &Error) -> Result<()> {
    let Error::Conflict { lease, .. } = error else {
        return Ok(());
    };
    let refused = ClaimRefused {
        ok: false,
        claimed: true,
        claimed_by: &lease.holder,
        claimed_at: lease.acquired_at,
        error: ErrorDetail::from(error),
    };
    println!("{}", serde_json::to_string_pretty(&refused)?);
    Ok(())
}

pub async fn handle_release(ctx: &TandemContext, cwd: &Path, sub_m: &ArgMatches) -> Result<()> {
    let item = required(sub_m, "item")?;
    let holder = current_holder(ctx, cwd, sub_m).await?;
    let released = ctx.stories.release(item, &holder)?;
    print_json(json!({ "item": item, "released": released }))
}

pub fn handle_claims(ctx: &TandemContext) -> Result<()> {
    let claims = ctx.stories.list_valid(None)?;
    print_json(json!({ "count": claims.len(), "claims": claims }))
}

fn keys(leases: &[Lease]) -> Vec<&str> {
    leases.iter().map(|lease| lease.key.as_str()).collect()
}

pub fn handle_cleanup(ctx: &TandemContext, cwd: &Path) -> Result<()> {
    let stories = ctx.stories.sweep_stale()?;
    let touches = ctx.touches.sweep_stale()?;
    let tokens = ctx.registry.list(cwd)?.cleaned;

    print_json(json!({
        "removed": stories.len() + touches.len() + tokens,
        "stories": keys(&stories),
        "touches": keys(&touches),
        "tokens": tokens,
    }))
}

pub async fn handle_touch(ctx: &TandemContext, cwd: &Path, sub_m: &ArgMatches) -> Result<()> {
    let paths: Vec<String> = sub_m
        .get_many::<String>("paths")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let holder = current_holder(ctx, cwd, sub_m).await?;
    let files = ctx.touches.touch(&holder, &paths)?;
    let overlaps = ctx.touches.overlaps_for(&holder.session_id)?;

    print_json(json!({
        "session_id": holder.session_id,
        "files": files,
        "overlaps": overlaps,
    }))
}

pub async fn handle_overlaps(ctx: &TandemContext, cwd: &Path) -> Result<()> {
    let session = current_session(ctx, cwd).await?;
    let overlaps = ctx.touches.overlaps_for(&session.id)?;
    print_json(json!({ "session_id": session.id, "overlaps": overlaps }))
}
