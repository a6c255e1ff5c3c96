//! CLI command definitions using `clap`

use clap::{Arg, ArgAction, Command as ClapCommand};

pub fn after_help_text(examples: &[&str]) -> String {
    let mut text = String::from("EXAMPLES:\n");
    for example in examples {
        text.push_str("  ");
        text.push_str(example);
        text.push('\n');
    }
    text
}

fn arg_session_id() -> Arg {
    Arg::new("id")
        .required(true)
        .value_name("SESSION_ID")
        .help("Numeric session id (see 'tandem list')")
}

fn arg_item_id() -> Arg {
    Arg::new("item")
        .required(true)
        .value_name("ITEM_ID")
        .help("Work item id, e.g. US-0001")
}

fn arg_pid() -> Arg {
    Arg::new("pid")
        .long("pid")
        .value_name("PID")
        .value_parser(clap::value_parser!(u32))
        .help("Process that owns the session (defaults to the calling process)")
}

fn arg_thread_type() -> Arg {
    Arg::new("thread-type")
        .long("thread-type")
        .value_name("TYPE")
        .value_parser(["base", "parallel", "chained", "fusion", "big", "long"])
        .help("Informational session classification")
}

fn arg_nickname() -> Arg {
    Arg::new("nickname")
        .long("nickname")
        .short('n')
        .value_name("NAME")
        .help("Human-friendly session name")
}

/// `--flag`, `--flag=true` and `--flag=false`, defaulting to true.
fn arg_bool_flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("BOOL")
        .num_args(0..=1)
        .require_equals(true)
        .default_value("true")
        .default_missing_value("true")
        .value_parser(clap::value_parser!(bool))
        .help(help)
}

fn merge_args(command: ClapCommand) -> ClapCommand {
    command
        .arg(arg_session_id())
        .arg(
            Arg::new("strategy")
                .long("strategy")
                .value_name("STRATEGY")
                .value_parser(["squash", "merge"])
                .help("Squash into one commit or create a merge commit [default: from config]"),
        )
        .arg(arg_bool_flag(
            "delete-branch",
            "Delete the session branch after merging",
        ))
        .arg(arg_bool_flag(
            "delete-worktree",
            "Remove the session worktree after merging",
        ))
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .value_name("MSG")
                .help("Commit message (generated from the session if not provided)"),
        )
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSIONS
// ═══════════════════════════════════════════════════════════════════════════

pub fn cmd_register() -> ClapCommand {
    ClapCommand::new("register")
        .about("Register the current working copy as a session")
        .long_about(
            "Creates or refreshes the session bound to the working copy containing the \
             current directory and records the owning process for liveness checks.",
        )
        .arg(arg_pid())
        .arg(arg_nickname())
        .arg(arg_thread_type())
        .after_help(after_help_text(&[
            "tandem register                     Register with the calling process as owner",
            "tandem register --pid 4242          Register on behalf of another process",
            "tandem register -n auth             Give the session a nickname",
        ]))
}

pub fn cmd_create() -> ClapCommand {
    ClapCommand::new("create")
        .about("Create a branch, a linked worktree and a session for a new worker")
        .arg(
            Arg::new("branch")
                .required(true)
                .value_name("BRANCH")
                .help("Branch to check out (created from trunk if missing)"),
        )
        .arg(arg_nickname())
        .arg(arg_thread_type())
        .after_help(after_help_text(&[
            "tandem create feat/login            New worktree on branch feat/login",
            "tandem create fix/crash -n crash    With a nickname",
        ]))
}

pub fn cmd_list() -> ClapCommand {
    ClapCommand::new("list")
        .about("List sessions")
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .conflicts_with("kanban")
                .help("Output as JSON"),
        )
        .arg(
            Arg::new("kanban")
                .long("kanban")
                .action(ArgAction::SetTrue)
                .help("Board of active and idle sessions with their claimed items"),
        )
}

pub fn cmd_delete() -> ClapCommand {
    ClapCommand::new("delete")
        .about("Remove a worker session")
        .arg(arg_session_id())
        .arg(
            Arg::new("remove-worktree")
                .long("remove-worktree")
                .action(ArgAction::SetTrue)
                .help("Also remove the session's worktree"),
        )
}

pub fn cmd_status() -> ClapCommand {
    ClapCommand::new("status").about("Summary of the current session and totals")
}

pub fn cmd_full_status() -> ClapCommand {
    ClapCommand::new("full-status")
        .about("Register, then report the summary and every session")
        .arg(arg_pid())
        .arg(arg_nickname())
        .arg(arg_thread_type())
}

// ═══════════════════════════════════════════════════════════════════════════
// MERGING
// ═══════════════════════════════════════════════════════════════════════════

pub fn cmd_check_merge() -> ClapCommand {
    ClapCommand::new("check-merge")
        .about("Report whether a session could be merged right now")
        .arg(arg_session_id())
}

pub fn cmd_merge_preview() -> ClapCommand {
    ClapCommand::new("merge-preview")
        .about("Show files changed on both sides and how each would be resolved")
        .arg(arg_session_id())
}

pub fn cmd_integrate() -> ClapCommand {
    merge_args(
        ClapCommand::new("integrate")
            .about("Merge a session into trunk; refuse if it conflicts"),
    )
    .after_help(after_help_text(&[
        "tandem integrate 2                          Squash-merge session 2 and clean up",
        "tandem integrate 2 --strategy merge         Keep history with a merge commit",
        "tandem integrate 2 --delete-branch=false    Keep the branch",
    ]))
}

pub fn cmd_smart_merge() -> ClapCommand {
    merge_args(
        ClapCommand::new("smart-merge")
            .about("Merge a session into trunk, resolving conflicts by file category"),
    )
    .after_help(after_help_text(&[
        "tandem smart-merge 2                        Resolve conflicts automatically",
        "tandem merge-preview 2                      See the plan first",
    ]))
}

pub fn cmd_merge_history() -> ClapCommand {
    ClapCommand::new("merge-history").about("Recent successful smart-merges, oldest first")
}

// ═══════════════════════════════════════════════════════════════════════════
// LEASES
// ═══════════════════════════════════════════════════════════════════════════

pub fn cmd_add_story() -> ClapCommand {
    ClapCommand::new("add-story")
        .about("Add a work item that sessions can claim")
        .arg(arg_item_id())
        .arg(
            Arg::new("title")
                .long("title")
                .value_name("TITLE")
                .help("Short description"),
        )
}

pub fn cmd_claim() -> ClapCommand {
    ClapCommand::new("claim")
        .about("Claim a work item for the current session")
        .arg(arg_item_id())
        .arg(
            Arg::new("force")
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Take the item even if another live session holds it"),
        )
        .arg(arg_pid())
        .after_help(after_help_text(&[
            "tandem claim US-0001                Claim, failing if someone else holds it",
            "tandem claim US-0001 --force        Take it over",
        ]))
}

pub fn cmd_release() -> ClapCommand {
    ClapCommand::new("release")
        .about("Release a work item held by the current session")
        .arg(arg_item_id())
        .arg(arg_pid())
}

pub fn cmd_claims() -> ClapCommand {
    ClapCommand::new("claims").about("List valid claims on work items")
}

pub fn cmd_cleanup() -> ClapCommand {
    ClapCommand::new("cleanup")
        .about("Remove claims, touches and liveness tokens of dead or expired holders")
}

pub fn cmd_touch() -> ClapCommand {
    ClapCommand::new("touch")
        .about("Record files the current session is editing")
        .arg(
            Arg::new("paths")
                .required(true)
                .num_args(1..)
                .value_name("PATH")
                .help("Repository-relative paths"),
        )
        .arg(arg_pid())
}

pub fn cmd_overlaps() -> ClapCommand {
    ClapCommand::new("overlaps")
        .about("Files the current session shares with other live sessions")
}

pub fn build_cli() -> ClapCommand {
    ClapCommand::new("tandem")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Tandem - parallel git worktree sessions with leases and auto-merging")
        .long_about(
            "Tandem coordinates several worker processes sharing one git repository.\n\n\
            Core workflow:\n  \
              tandem create <branch>     New worktree + session for a worker\n  \
              tandem register            Worker announces itself\n  \
              tandem claim <item>        Take a work item\n  \
              tandem smart-merge <id>    Land the work and clean up",
        )
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .subcommand(cmd_register())
        .subcommand(cmd_create())
        .subcommand(cmd_list())
        .subcommand(cmd_delete())
        .subcommand(cmd_status())
        .subcommand(cmd_full_status())
        .subcommand(cmd_check_merge())
        .subcommand(cmd_merge_preview())
        .subcommand(cmd_integrate())
        .subcommand(cmd_smart_merge())
        .subcommand(cmd_merge_history())
        .subcommand(cmd_add_story())
        .subcommand(cmd_claim())
        .subcommand(cmd_release())
        .subcommand(cmd_claims())
        .subcommand(cmd_cleanup())
        .subcommand(cmd_touch())
        .subcommand(cmd_overlaps())
}
