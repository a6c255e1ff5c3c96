//! Rendering of command results on stdout.

use std::{collections::BTreeMap, fmt};

use anyhow::Result;
use itertools::Itertools;
use serde::Serialize;
use tandem_core::{
    json::{ErrorDetail, JsonError, WithEnvelope},
    lease::Lease,
    registry::SessionView,
};

/// Print `data` inside the success envelope.
pub fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&data.into_envelope())?);
    Ok(())
}

/// Print the failure envelope for a core error.
pub fn print_error(error: &tandem_core::Error) {
    print_failure(&JsonError::from(error));
}

/// Print the failure envelope for anything that is not a core error.
pub fn print_untyped_error(message: String) {
    print_failure(&JsonError::new(ErrorDetail::new("INTERNAL_ERROR", message)));
}

fn print_failure<T: Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(json) => println!("{json}"),
        Err(_) => println!(r#"{{"ok":false,"error":{{"code":"INTERNAL_ERROR"}}}}"#),
    }
}

/// A failure whose JSON has already been printed by the handler.
#[derive(Debug)]
pub struct ReportedFailure {
    pub exit_code: i32,
}

impl fmt::Display for ReportedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command failed with exit code {}", self.exit_code)
    }
}

impl std::error::Error for ReportedFailure {}

// ═══════════════════════════════════════════════════════════════════════════
// TEXT VIEWS
// ═══════════════════════════════════════════════════════════════════════════

fn role_marker(view: &SessionView) -> &'static str {
    if view.record.is_main() {
        "main"
    } else {
        ""
    }
}

/// Plain table of sessions, current one marked with `*`.
pub fn session_table(sessions: &[SessionView]) -> String {
    if sessions.is_empty() {
        return "No sessions registered.\n".to_string();
    }

    let mut out = format!(
        "  {:<4} {:<5} {:<7} {:<30} {:<16} {}\n",
        "ID", "ROLE", "ACTIVE", "BRANCH", "NICKNAME", "PATH"
    );
    for view in sessions {
        out.push_str(&format!(
            "{} {:<4} {:<5} {:<7} {:<30} {:<16} {}\n",
            if view.current { "*" } else { " " },
            view.record.id,
            role_marker(view),
            if view.active { "yes" } else { "no" },
            view.record.branch,
            view.record.nickname.as_deref().unwrap_or("-"),
            view.record.path.display()
        ));
    }
    out
}

/// Two-column board: active sessions and idle ones, each with its claims.
pub fn kanban(sessions: &[SessionView], claims: &[Lease]) -> String {
    let by_session: BTreeMap<&str, Vec<&str>> = claims
        .iter()
        .map(|lease| (lease.holder.session_id.as_str(), lease.key.as_str()))
        .into_group_map()
        .into_iter()
        .collect();

    let card = |view: &SessionView| {
        let items = by_session
            .get(view.record.id.as_str())
            .map(|items| items.iter().sorted().join(", "))
            .unwrap_or_else(|| "-".to_string());
        let name = view
            .record
            .nickname
            .as_deref()
            .map(|nick| format!(" \"{nick}\""))
            .unwrap_or_default();
        format!(
            "  #{}{} {} [{}]\n",
            view.record.id, name, view.record.branch, items
        )
    };

    let (active, idle): (Vec<&SessionView>, Vec<&SessionView>) =
        sessions.iter().partition(|view| view.active);

    let mut out = format!("ACTIVE ({})\n", active.len());
    active.iter().for_each(|view| out.push_str(&card(view)));
    out.push_str(&format!("\nIDLE ({})\n", idle.len()));
    idle.iter().for_each(|view| out.push_str(&card(view)));
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Utc;
    use tandem_core::{
        lease::LeaseHolder,
        registry::{SessionRecord, SessionRole, ThreadType},
    };

    use super::*;

    fn view(id: &str, branch: &str, active: bool, role: SessionRole) -> SessionView {
        SessionView {
            record: SessionRecord {
                id: id.to_string(),
                path: PathBuf::from(format!("/w/{id}")),
                branch: branch.to_string(),
                nickname: None,
                created_at: Utc::now(),
                last_active: Utc::now(),
                role,
                thread_type: ThreadType::Base,
            },
            active,
            current: id == "1",
            pid: None,
        }
    }

    #[test]
    fn test_table_marks_current_and_main() {
        let table = session_table(&[
            view("1", "main", true, SessionRole::Main),
            view("2", "feat/a", false, SessionRole::Worker),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("* 1"));
        assert!(lines[1].contains("main"));
        assert!(lines[2].contains("feat/a"));
        assert!(lines[2].contains("no"));
    }

    #[test]
    fn test_empty_table_says_so() {
        assert_eq!(session_table(&[]), "No sessions registered.\n");
    }

    #[test]
    fn test_kanban_groups_claims_by_session() {
        let claims = vec![Lease {
            key: "US-0001".to_string(),
            holder: LeaseHolder::new("2", 200, "/w/2"),
            acquired_at: Utc::now(),
        }];
        let board = kanban(
            &[
                view("1", "main", false, SessionRole::Main),
                view("2", "feat/a", true, SessionRole::Worker),
            ],
            &claims,
        );

        assert!(board.starts_with("ACTIVE (1)\n  #2 feat/a [US-0001]\n"));
        assert!(board.contains("IDLE (1)\n  #1 main [-]\n"));
    }
}
