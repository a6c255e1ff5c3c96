//! register, create, list, delete, status and full-status

use std::path::Path;

use anyhow::Result;
use clap::ArgMatches;
use tandem_core::TandemContext;

use super::required;
use crate::cli::{
    output::{kanban, print_json, session_table},
    registration, thread_type,
};

pub async fn handle_register(ctx: &TandemContext, cwd: &Path, sub_m: &ArgMatches) -> Result<()> {
    let outcome = ctx.registry.register(registration(cwd, sub_m)?).await?;
    print_json(&outcome)
}

pub async fn handle_create(ctx: &TandemContext, sub_m: &ArgMatches) -> Result<()> {
    let branch = required(sub_m, "branch")?;
    let nickname = sub_m.get_one::<String>("nickname").map(String::as_str);
    let outcome = ctx
        .registry
        .create_working_copy(branch, nickname, thread_type(sub_m)?)
        .await?;
    print_json(&outcome)
}

pub fn handle_list(ctx: &TandemContext, cwd: &Path, sub_m: &ArgMatches) -> Result<()> {
    let list = ctx.registry.list(cwd)?;

    if sub_m.get_flag("json") {
        return print_json(&list);
    }
    if sub_m.get_flag("kanban") {
        let claims = ctx.stories.list_valid(None)?;
        print!("{}", kanban(&list.sessions, &claims));
        return Ok(());
    }
    print!("{}", session_table(&list.sessions));
    Ok(())
}

pub async fn handle_delete(ctx: &TandemContext, sub_m: &ArgMatches) -> Result<()> {
    let id = required(sub_m, "id")?;
    let outcome = ctx
        .registry
        .delete(id, sub_m.get_flag("remove-worktree"))
        .await?;
    print_json(&outcome)
}

pub fn handle_status(ctx: &TandemContext, cwd: &Path) -> Result<()> {
    print_json(&ctx.registry.summary(cwd)?)
}

pub async fn handle_full_status(
    ctx: &TandemContext,
    cwd: &Path,
    sub_m: &ArgMatches,
) -> Result<()> {
    let status = ctx
        .registry
        .full_status(registration(cwd, sub_m)?)
        .await?;
    print_json(&status)
}
