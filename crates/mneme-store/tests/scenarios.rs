use mneme_core::commit_md::{parse_commit_log, render_commit, render_commit_log};
use mneme_core::{MainSection, MemoryError, Role};
use mneme_store::lock::FileLock;
use mneme_store::{
    AppendOutcome, CommitRequest, Context, ContextQuery, EventRequest, Repository, StoreConfig,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn init() -> anyhow::Result<(tempfile::TempDir, Repository)> {
    let tmp = tempfile::tempdir()?;
    let repo = Repository::init(tmp.path(), "Scenario workspace")?;
    Ok((tmp, repo))
}

fn with_config(workspace: &Path, config: StoreConfig) -> anyhow::Result<Repository> {
    config.save(&workspace.join(".mneme").join("config.json"))?;
    Ok(Repository::open(workspace)?)
}

/// Every file under `.mneme/` with its bytes.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in std::fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.insert(path.clone(), std::fs::read(&path).unwrap());
            }
        }
    }
    out
}

#[test]
fn activation_leaves_exactly_one_active_branch() -> anyhow::Result<()> {
    let (_tmp, repo) = init()?;
    for name in ["feature-a", "feature_b", "v1.2"] {
        repo.create_branch(name, "", true)?;
        let active: Vec<String> = repo
            .list()?
            .into_iter()
            .filter(|b| b.active)
            .map(|b| b.name)
            .collect();
        assert_eq!(active, [name]);
    }
    repo.activate("main")?;
    assert_eq!(repo.list()?.iter().filter(|b| b.active).count(), 1);
    Ok(())
}

#[test]
fn concurrent_commits_stay_gapless_per_branch() -> anyhow::Result<()> {
    let (tmp, repo) = init()?;
    repo.create_branch("side", "", false)?;
    let config = StoreConfig {
        lock_timeout_ms: 30_000,
        ..Default::default()
    };
    with_config(tmp.path(), config)?;

    std::thread::scope(|s| {
        for worker in 0..4 {
            let root = tmp.path().to_path_buf();
            s.spawn(move || {
                let repo = Repository::open(&root).unwrap();
                let branch = if worker % 2 == 0 { "main" } else { "side" };
                for i in 0..8 {
                    repo.commit(
                        branch,
                        CommitRequest::new(format!("w{worker} #{i}")).contribution("work"),
                        None,
                    )
                    .unwrap();
                    repo.append_event(branch, EventRequest::new(Role::Action, format!("w{worker}")))
                        .unwrap();
                }
            });
        }
    });

    for branch in ["main", "side"] {
        let seqs: Vec<u64> = repo.commits(branch)?.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, (1..=16).collect::<Vec<u64>>());
        assert_eq!(repo.event_count(branch)?, 16);
    }
    Ok(())
}

#[test]
fn concurrent_appends_with_one_dedup_key_record_one_event() -> anyhow::Result<()> {
    let (tmp, _repo) = init()?;
    let config = StoreConfig {
        lock_timeout_ms: 30_000,
        ..Default::default()
    };
    let repo = with_config(tmp.path(), config)?;

    let outcomes: Vec<AppendOutcome> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let root = tmp.path().to_path_buf();
                s.spawn(move || {
                    let repo = Repository::open(&root).unwrap();
                    repo.append_event(
                        "main",
                        EventRequest::new(Role::Observation, format!("prompt from w{worker}"))
                            .dedup("session-1:turn-1"),
                    )
                    .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|o| o.is_appended()).count(), 1);
    assert!(outcomes
        .iter()
        .all(|o| o.is_appended() || *o == AppendOutcome::AlreadyPresent { pos: 1 }));
    assert_eq!(repo.event_count("main")?, 1);
    Ok(())
}

#[test]
fn persisted_commit_round_trips() -> anyhow::Result<()> {
    let (_tmp, repo) = init()?;
    repo.commit(
        "main",
        CommitRequest::new("Tricky: title\\with escapes")
            .contribution("line one\n# looks like a heading\n**bold marker**\n\n\\backslash")
            .external_ref("abc123"),
        None,
    )?;
    let written = repo.read_commit("main", 0)?;
    let rendered = render_commit_log("main", std::slice::from_ref(&written));
    let parsed = parse_commit_log(&rendered, Path::new("commit.md"))?;
    assert_eq!(parsed, vec![written.clone()]);
    assert!(render_commit(&written).contains("- external-ref: abc123"));
    Ok(())
}

#[test]
fn dedup_key_yields_one_event() -> anyhow::Result<()> {
    let (_tmp, repo) = init()?;
    let req = EventRequest::new(Role::Observation, "user prompt").dedup("K");
    repo.append_event("main", req.clone())?;
    let second = repo.append_event("main", req)?;
    assert_eq!(second, AppendOutcome::AlreadyPresent { pos: 1 });
    assert_eq!(repo.event_count("main")?, 1);
    Ok(())
}

#[test]
fn merge_keeps_source_untouched() -> anyhow::Result<()> {
    let (tmp, repo) = init()?;
    repo.create_branch("B", "integration", false)?;
    repo.create_branch("A", "experiment", false)?;
    repo.commit("B", CommitRequest::new("b1").contribution("first"), None)?;
    repo.commit("B", CommitRequest::new("b2").contribution("second"), None)?;
    repo.commit("A", CommitRequest::new("a1").contribution("idea"), None)?;

    let source_dir = repo.paths().branch("A").dir;
    let before = snapshot(&source_dir);

    let out = repo.merge("A", "B")?;
    let commits = repo.commits("B")?;
    assert_eq!(commits.len(), 3);
    assert_eq!(&commits[2], &out.merge_commit);
    let range = commits[2].merged_from.as_ref().map(|m| (m.source.as_str(), m.commits));
    assert_eq!(range, Some(("A", Some((1, 1)))));
    assert_eq!(commits[2].carried[0].title, "a1");

    assert_eq!(snapshot(&source_dir), before);
    assert_eq!(repo.commits("A")?.len(), 1);
    let a = repo.list()?.into_iter().find(|b| b.name == "A").unwrap();
    assert!(!a.active);

    // survives a reopen
    let reopened = Repository::open(tmp.path())?;
    assert_eq!(reopened.commits("B")?.len(), 3);
    Ok(())
}

#[test]
fn chained_summary_carries_earlier_notes() -> anyhow::Result<()> {
    let (_tmp, repo) = init()?;
    assert_eq!(repo.active_branch()?, "main");
    repo.commit("main", CommitRequest::new("Init").contribution("Set up skeleton"), None)?;
    repo.commit("main", CommitRequest::new("Add auth").contribution("Implemented JWT"), None)?;

    let Context::Branch(ctx) = repo.context(&ContextQuery::Branch {
        branch: "main".into(),
        depth: None,
        offset: 0,
    })?
    else {
        panic!("expected branch context");
    };
    let titles: Vec<&str> = ctx.commits.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, ["Add auth", "Init"]);
    assert!(ctx.commits[0].prev_summary.contains("Set up skeleton"));
    Ok(())
}

#[test]
fn commit_index_past_end_is_not_found() -> anyhow::Result<()> {
    let (_tmp, repo) = init()?;
    repo.commit("main", CommitRequest::new("one").contribution("x"), None)?;
    for index in [1, 2, 100] {
        let err = repo
            .context(&ContextQuery::Commit {
                branch: "main".into(),
                index,
            })
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }
    Ok(())
}

#[test]
fn held_lock_makes_writers_busy() -> anyhow::Result<()> {
    let (tmp, _repo) = init()?;
    let config = StoreConfig {
        lock_timeout_ms: 50,
        ..Default::default()
    };
    let repo = with_config(tmp.path(), config)?;
    let held = FileLock::acquire(&repo.paths().branch("main").lock_file, Duration::from_secs(1))?;

    let err = repo
        .commit("main", CommitRequest::new("blocked").contribution("x"), None)
        .unwrap_err();
    assert!(matches!(err, MemoryError::Busy { .. }));
    assert!(err.recovery_suggestion().is_some());

    // other branches are not blocked
    repo.create_branch("other", "", false)?;
    repo.commit("other", CommitRequest::new("free").contribution("x"), None)?;

    drop(held);
    repo.commit("main", CommitRequest::new("unblocked").contribution("x"), None)?;
    Ok(())
}

#[test]
fn interrupted_merge_is_detected_on_load() -> anyhow::Result<()> {
    let (tmp, repo) = init()?;
    repo.create_branch("spike", "", false)?;
    repo.append_event("spike", EventRequest::new(Role::Action, "edit"))?;
    repo.commit("main", CommitRequest::new("base").contribution("x"), None)?;
    repo.merge("spike", "main")?;

    // Simulate a crash after log.md was written but before commit.md was.
    let commits = repo.commits("main")?;
    let commit_md = repo.paths().branch("main").commit_md;
    std::fs::write(&commit_md, render_commit_log("main", &commits[..1]))?;

    let reopened = Repository::open(tmp.path())?;
    assert!(matches!(
        reopened.commits("main"),
        Err(MemoryError::Corrupt { .. })
    ));
    assert!(matches!(
        reopened.commit("main", CommitRequest::new("next").contribution("y"), None),
        Err(MemoryError::Corrupt { .. })
    ));
    Ok(())
}

#[test]
fn validation_errors_leave_bytes_unchanged() -> anyhow::Result<()> {
    let (tmp, repo) = init()?;
    repo.create_branch("spike", "", false)?;
    repo.commit("main", CommitRequest::new("one").contribution("x"), None)?;
    let mneme = tmp.path().join(".mneme");
    let before = snapshot(&mneme);

    assert!(matches!(
        repo.create_branch("spike", "", true),
        Err(MemoryError::DuplicateBranch(_))
    ));
    assert!(matches!(repo.activate("ghost"), Err(MemoryError::UnknownBranch(_))));
    assert!(matches!(repo.merge("spike", "spike"), Err(MemoryError::SelfMerge(_))));
    assert!(matches!(
        repo.read_commit("main", 5),
        Err(MemoryError::OutOfRange { .. })
    ));
    assert!(matches!(
        repo.commit("ghost", CommitRequest::new("t"), None),
        Err(MemoryError::UnknownBranch(_))
    ));

    assert_eq!(snapshot(&mneme), before);
    Ok(())
}

#[test]
fn corrupt_file_is_surfaced_not_emptied() -> anyhow::Result<()> {
    let (_tmp, repo) = init()?;
    let log_md = repo.paths().branch("main").log_md;
    std::fs::write(&log_md, "# Event Log: main\n\n## [7] ACTION @ x\n\npayload\n\n")?;
    assert!(matches!(repo.tail("main", 5), Err(MemoryError::Corrupt { .. })));
    assert!(matches!(
        repo.append_event("main", EventRequest::new(Role::Action, "more")),
        Err(MemoryError::Corrupt { .. })
    ));

    let commit_md = repo.paths().branch("main").commit_md;
    std::fs::write(&commit_md, b"# Commit Log: main\n\n\xff\xfe\n")?;
    assert!(matches!(repo.commits("main"), Err(MemoryError::Corrupt { .. })));
    Ok(())
}

#[test]
fn main_document_renders_in_fixed_order() -> anyhow::Result<()> {
    let (_tmp, repo) = init()?;
    repo.update_main(MainSection::PendingQuestions, "Which DB?")?;
    repo.update_main(MainSection::Milestones, "- v0.1")?;
    let text = std::fs::read_to_string(&repo.paths().main_md)?;
    let purpose = text.find("## Purpose").unwrap();
    let milestones = text.find("## Milestones").unwrap();
    let questions = text.find("## Pending Questions").unwrap();
    assert!(purpose < milestones && milestones < questions);
    Ok(())
}
