//! Session registry behaviour against the in-memory backend.

mod common;

use common::TestHarness;
use tandem_core::{
    registry::{Registration, SessionRecord, SessionRole, StepOutcome, ThreadType},
    store::Mutation,
    Error, Precondition,
};

mod registration_behavior {
    use super::*;

    #[tokio::test]
    async fn test_registering_same_path_twice_reuses_id() {
        // GIVEN a fresh repository
        let h = TestHarness::new();
        h.oracle.spawn(100);

        // WHEN the trunk registers twice
        let first = h
            .ctx
            .registry
            .register(Registration::new(&h.trunk, 100))
            .await
            .unwrap();
        let second = h
            .ctx
            .registry
            .register(Registration::new(h.trunk.join("src"), 100))
            .await
            .unwrap();

        // THEN the id is stable and only the first call creates it
        assert_eq!(first.id, "1");
        assert!(first.is_new);
        assert!(first.is_main);
        assert_eq!(second.id, "1");
        assert!(!second.is_new);
    }

    #[tokio::test]
    async fn test_worker_registration_finds_created_record() {
        let h = TestHarness::new();
        let created = h
            .ctx
            .registry
            .create_working_copy("feat/login", Some("login"), None)
            .await
            .unwrap();
        assert!(created.branch_created);
        assert!(h.backend.has_branch("feat/login"));
        assert!(created.path.ends_with("feat-login"));

        let registered = h
            .ctx
            .registry
            .register(Registration::new(&created.path, 200))
            .await
            .unwrap();

        assert_eq!(registered.id, created.id);
        assert!(!registered.is_new);
        assert!(!registered.is_main);
        assert_eq!(registered.branch, "feat/login");
        assert_eq!(registered.thread_type, ThreadType::Parallel);
    }

    #[tokio::test]
    async fn test_refresh_updates_nickname_and_thread_type() {
        let h = TestHarness::new();
        h.ctx
            .registry
            .register(Registration::new(&h.trunk, 100))
            .await
            .unwrap();

        let mut request = Registration::new(&h.trunk, 100);
        request.nickname = Some("lead".to_string());
        request.thread_type = Some(ThreadType::Long);
        h.ctx.registry.register(request).await.unwrap();

        let record = h.ctx.registry.get("1").unwrap();
        assert_eq!(record.nickname.as_deref(), Some("lead"));
        assert_eq!(record.thread_type, ThreadType::Long);
        assert_eq!(record.role, SessionRole::Main);
    }

    #[tokio::test]
    async fn test_second_main_at_other_path_is_refused() {
        // GIVEN a registry whose main record points somewhere else
        let h = TestHarness::new();
        h.ctx
            .registry
            .document()
            .transact(|doc| {
                let now = chrono::Utc::now();
                doc.sessions.insert(
                    "1".to_string(),
                    SessionRecord {
                        id: "1".to_string(),
                        path: "/elsewhere/trunk".into(),
                        branch: "main".to_string(),
                        nickname: None,
                        created_at: now,
                        last_active: now,
                        role: SessionRole::Main,
                        thread_type: ThreadType::Base,
                    },
                );
                doc.next_id = 2;
                Ok(Mutation::Changed(()))
            })
            .unwrap();

        // WHEN the real trunk registers
        let err = h
            .ctx
            .registry
            .register(Registration::new(&h.trunk, 100))
            .await
            .unwrap_err();

        // THEN it is rejected and nothing is allocated
        assert!(matches!(
            err,
            Error::PreconditionFailed {
                reason: Precondition::MainAlreadyBound { .. },
                ..
            }
        ));
        assert_eq!(h.ctx.registry.document().load().unwrap().next_id, 2);
    }

    #[tokio::test]
    async fn test_invalid_nickname_rejected_before_any_write() {
        let h = TestHarness::new();
        let mut request = Registration::new(&h.trunk, 100);
        request.nickname = Some("!bad".to_string());

        let err = h.ctx.registry.register(request).await.unwrap_err();

        assert!(matches!(err, Error::InvalidInput { field: "nickname", .. }));
        assert!(h.ctx.registry.document().load().unwrap().sessions.is_empty());
    }
}

mod working_copy_behavior {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let h = TestHarness::new();
        let a = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap();
        h.ctx.registry.delete(&a.id, true).await.unwrap();

        let b = h
            .ctx
            .registry
            .create_working_copy("feat/b", None, None)
            .await
            .unwrap();

        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
    }

    #[tokio::test]
    async fn test_existing_branch_is_reused() {
        let h = TestHarness::new();
        let first = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap();
        h.ctx.registry.delete(&first.id, true).await.unwrap();

        let again = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, Some(ThreadType::Chained))
            .await
            .unwrap();

        assert!(!again.branch_created);
        let record = h.ctx.registry.get(&again.id).unwrap();
        assert_eq!(record.thread_type, ThreadType::Chained);
    }

    #[tokio::test]
    async fn test_occupied_worktree_path_is_rejected() {
        let h = TestHarness::new();
        h.ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap();

        let err = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput { field: "branch", .. }));
    }

    #[tokio::test]
    async fn test_failed_worktree_add_removes_new_branch() {
        let h = TestHarness::new();
        h.backend.fail_worktree_add();

        let err = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend { .. }));
        assert!(!h.backend.has_branch("feat/a"));
        assert!(h.ctx.registry.list(&h.trunk).unwrap().sessions.is_empty());
    }

    #[tokio::test]
    async fn test_failed_worktree_add_keeps_existing_branch() {
        let h = TestHarness::new();
        let first = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap();
        h.ctx.registry.delete(&first.id, true).await.unwrap();
        h.backend.fail_worktree_add();

        let result = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await;

        assert!(result.is_err());
        assert!(h.backend.has_branch("feat/a"));
    }

    #[tokio::test]
    async fn test_bad_branch_name_is_rejected() {
        let h = TestHarness::new();
        let err = h
            .ctx
            .registry
            .create_working_copy("feat..x", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { field: "branch", .. }));
        assert!(!h.backend.has_branch("feat..x"));
    }

    #[tokio::test]
    async fn test_delete_reports_each_step() {
        let h = TestHarness::new();
        let created = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap();

        let kept = h.ctx.registry.delete(&created.id, false).await.unwrap();

        assert_eq!(kept.worktree, StepOutcome::Skipped);
        assert_eq!(kept.touches, StepOutcome::Done);
        assert!(h.backend.has_worktree(&created.path));
        assert!(matches!(
            h.ctx.registry.get(&created.id),
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_main_cannot_be_deleted() {
        let h = TestHarness::new();
        h.ctx
            .registry
            .register(Registration::new(&h.trunk, 100))
            .await
            .unwrap();

        let err = h.ctx.registry.delete("1", true).await.unwrap_err();

        assert!(matches!(
            err,
            Error::PreconditionFailed {
                reason: Precondition::CannotDeleteMain,
                ..
            }
        ));
        assert!(h.ctx.registry.get("1").is_ok());
    }
}

mod listing_behavior {
    use super::*;

    #[tokio::test]
    async fn test_list_computes_active_and_current() {
        let h = TestHarness::new();
        h.oracle.spawn(100);
        h.oracle.spawn(200);
        h.ctx
            .registry
            .register(Registration::new(&h.trunk, 100))
            .await
            .unwrap();
        let created = h
            .ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap();
        h.ctx
            .registry
            .register(Registration::new(&created.path, 200))
            .await
            .unwrap();

        let list = h.ctx.registry.list(&created.path).unwrap();

        let ids: Vec<&str> = list.sessions.iter().map(|v| v.record.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert!(list.sessions.iter().all(|v| v.active));
        assert!(!list.sessions[0].current);
        assert!(list.sessions[1].current);
        assert_eq!(list.sessions[1].pid, Some(200));
        assert_eq!(list.cleaned, 0);
    }

    #[tokio::test]
    async fn test_dead_tokens_are_swept_while_listing() {
        // GIVEN a worker whose process has exited
        let h = TestHarness::new();
        h.oracle.spawn(100);
        h.ctx
            .registry
            .register(Registration::new(&h.trunk, 100))
            .await
            .unwrap();
        h.oracle.kill(100);

        // WHEN listing
        let list = h.ctx.registry.list(&h.trunk).unwrap();

        // THEN the token is gone but the record stays
        assert_eq!(list.cleaned, 1);
        assert_eq!(list.sessions.len(), 1);
        assert!(!list.sessions[0].active);
        assert!(!h.ctx.state_dir.join("pids").join("1.json").exists());
    }

    #[tokio::test]
    async fn test_summary_and_full_status() {
        let h = TestHarness::new();
        h.oracle.spawn(100);
        h.ctx
            .registry
            .create_working_copy("feat/a", None, None)
            .await
            .unwrap();

        let status = h
            .ctx
            .registry
            .full_status(Registration::new(&h.trunk, 100))
            .await
            .unwrap();

        assert_eq!(status.registration.id, "2");
        assert!(status.registration.is_main);
        assert_eq!(status.summary.total, 2);
        assert_eq!(status.summary.active, 1);
        assert_eq!(status.summary.project_name.as_deref(), Some("demo"));
        assert_eq!(
            status.summary.current.map(|v| v.record.id),
            Some("2".to_string())
        );
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let h = TestHarness::new();
        assert!(matches!(
            h.ctx.registry.get("abc"),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            h.ctx.registry.get("99"),
            Err(Error::NotFound { kind: "session", .. })
        ));
    }
}
