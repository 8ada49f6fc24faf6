use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use breaktime_config::{
    ChunkSizeSource, ConfigGuardRailError, ConfigLoadError, ConfigLoader,
    EnvConfig, IdentitySource, Overrides, Task, TaskKind,
};
use breaktime_core::{Command, CronTableError};
use serde_json::json;
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> EnvConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| vars.get(name).cloned())
}

fn base_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("JOBS", "a.b.c.d.e/f.g.h.i.j/k.l.m.n.o"),
        ("META_SVC_URL", "https://meta.example.com/api"),
        ("CMD", "pause"),
    ]
}

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("breaktime.toml");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn run_config_from_environment_uses_defaults() {
    let load = ConfigLoader::new()
        .load_with_env(TaskKind::Run, env(&base_env()))
        .expect("config loads");
    let config = load.config;

    assert_eq!(config.jobs.len(), 3);
    assert_eq!(config.jobs[1], "f.g.h.i.j");
    assert_eq!(config.chunk_size, 5);
    assert_eq!(config.metadata.chunk_size_source, ChunkSizeSource::Default);
    assert_eq!(config.start_at, 1);
    assert_eq!(config.http_timeout, Duration::from_secs(30));
    assert!(matches!(
        &config.identity,
        IdentitySource::Command(line)
            if line == "gcloud auth print-identity-token"
    ));

    let Task::Run(run) = &config.task else {
        panic!("expected a run task");
    };
    assert_eq!(run.command, Command::Pause);
    assert_eq!(run.control_plane.base_url, "https://meta.example.com/api");
    assert_eq!(run.control_plane.validate_path, "sources");
    assert!(run.payloads.reload.keep_foundry_dataset);
    assert_eq!(run.payloads.cron.ranges().len(), 18);
    assert!(load.warnings.is_empty());
}

#[test]
fn unusable_chunk_size_falls_back_with_a_warning() {
    for raw in ["0", "many", "-3"] {
        let mut vars = base_env();
        vars.push(("CHUNK_SIZE", raw));
        let load = ConfigLoader::new()
            .load_with_env(TaskKind::Run, env(&vars))
            .expect("config loads");
        assert_eq!(load.config.chunk_size, 5, "CHUNK_SIZE={raw}");
        assert_eq!(load.warnings.items.len(), 1);
    }

    let mut vars = base_env();
    vars.push(("CHUNK_SIZE", "12"));
    let load = ConfigLoader::new()
        .load_with_env(TaskKind::Run, env(&vars))
        .unwrap();
    assert_eq!(load.config.chunk_size, 12);
    assert_eq!(load.config.metadata.chunk_size_source, ChunkSizeSource::Env);
}

#[test]
fn flags_override_environment() {
    let overrides = Overrides {
        jobs: Some("x.x.x.x.x/y.y.y.y.y".into()),
        command: Some("resume".into()),
        chunk_size: Some(2),
        start_at: Some(2),
        token: Some("Bearer operator".into()),
        ..Overrides::default()
    };
    let config = ConfigLoader::new()
        .with_overrides(overrides)
        .load_with_env(TaskKind::Run, env(&base_env()))
        .unwrap()
        .config;

    assert_eq!(config.jobs, vec!["x.x.x.x.x", "y.y.y.y.y"]);
    assert_eq!(config.command(), Some(Command::Resume));
    assert_eq!(config.chunk_size, 2);
    assert_eq!(config.start_at, 2);
    assert!(matches!(
        &config.identity,
        IdentitySource::Static(token) if token.secret() == "operator"
    ));
}

#[test]
fn custom_delimiter_splits_jobs() {
    let config = ConfigLoader::new()
        .load_with_env(
            TaskKind::Run,
            env(&[
                ("JOBS", "a.b.c.d.e,f.g.h.i.j"),
                ("JOBS_DELIMITER", ","),
                ("META_SVC_URL", "http://localhost:8080"),
                ("CMD", "load"),
            ]),
        )
        .unwrap()
        .config;
    assert_eq!(config.jobs, vec!["a.b.c.d.e", "f.g.h.i.j"]);
}

#[test]
fn job_entries_are_not_normalized() {
    let mut vars = base_env();
    vars[0] = ("JOBS", "a.b.c.d.e/ f.g.h.i.j/");
    let load = ConfigLoader::new()
        .load_with_env(TaskKind::Run, env(&vars))
        .unwrap();

    assert_eq!(load.config.jobs, vec!["a.b.c.d.e", " f.g.h.i.j", ""]);
    // The trailing delimiter leaves an empty, malformed entry.
    assert_eq!(load.warnings.items.len(), 1);
    assert!(
        load.warnings.items[0]
            .message
            .starts_with("1 job identifier(s) are malformed")
    );
}

fn guard_rail(vars: &[(&str, &str)]) -> ConfigGuardRailError {
    match ConfigLoader::new().load_with_env(TaskKind::Run, env(vars)) {
        Err(ConfigLoadError::GuardRail(rail)) => rail,
        Err(other) => panic!("expected a guard rail, got {other}"),
        Ok(_) => panic!("expected a guard rail, config loaded"),
    }
}

#[test]
fn guard_rails_stop_bad_runs() {
    assert!(matches!(
        guard_rail(&[
            ("JOBS", "a.b.c.d.e"),
            ("META_SVC_URL", "http://x"),
            ("CMD", "explode"),
        ]),
        ConfigGuardRailError::UnknownCommand(_)
    ));
    assert!(matches!(
        guard_rail(&[
            ("JOBS", "a.b.c.d.e"),
            ("META_SVC_URL", "http://x"),
            ("CMD", "delete"),
        ]),
        ConfigGuardRailError::DestructiveDisabled(Command::Delete)
    ));
    assert!(matches!(
        guard_rail(&[("JOBS", "a.b.c.d.e"), ("META_SVC_URL", "http://x")]),
        ConfigGuardRailError::MissingCommand
    ));
    assert!(matches!(
        guard_rail(&[("META_SVC_URL", "http://x"), ("CMD", "pause")]),
        ConfigGuardRailError::MissingJobs
    ));
    assert!(matches!(
        guard_rail(&[("JOBS", "a.b.c.d.e"), ("CMD", "pause")]),
        ConfigGuardRailError::MissingControlPlane
    ));
    assert!(matches!(
        guard_rail(&[
            ("JOBS", "a.b.c.d.e"),
            ("META_SVC_URL", "not a url"),
            ("CMD", "pause"),
        ]),
        ConfigGuardRailError::InvalidUrl { .. }
    ));
    assert!(matches!(
        guard_rail(&[
            ("JOBS", "a.b.c.d.e"),
            ("META_SVC_URL", "http://x"),
            ("CMD", "pause"),
            ("START_AT", "4"),
        ]),
        ConfigGuardRailError::StartOutOfRange { start_at: 4, total: 1 }
    ));
}

#[test]
fn destructive_commands_load_when_enabled() {
    let mut vars = base_env();
    vars.retain(|(k, _)| *k != "CMD");
    vars.push(("CMD", "deleteHydratedResources"));
    vars.push(("ENABLE_DESTRUCTIVE", "yes"));

    let config = ConfigLoader::new()
        .load_with_env(TaskKind::Run, env(&vars))
        .unwrap()
        .config;
    assert_eq!(config.command(), Some(Command::DeleteHydratedResources));
}

#[test]
fn malformed_identifiers_are_reported_up_front() {
    let mut vars = base_env();
    vars[0] = ("JOBS", "a.b.c.d.e/a.b.c/a..c.d.e");
    let load = ConfigLoader::new()
        .load_with_env(TaskKind::Run, env(&vars))
        .unwrap();

    assert_eq!(load.config.jobs.len(), 3);
    assert_eq!(load.warnings.items.len(), 1);
    assert!(load.warnings.items[0].message.contains("a.b.c, a..c.d.e"));
}

#[test]
fn toml_payloads_are_applied() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        [reload]
        keep_foundry_dataset = false
        retain_data = true

        [edit_target]
        target_project_ids = ["ri.project.main"]
        jdbc_targets = [{ url = "jdbc:postgresql://db/warehouse", schema = "stage" }]

        [cron]
        timezone = "UTC"
        default = "15 9 * * *"

        [[cron.ranges]]
        min = 1
        max = 2
        cron = "0 1 * * *"

        [[cron.ranges]]
        min = 3
        max = 4
        cron = "0 2 * * *"

        [control_plane]
        validate_path = "/health"
        timeout_secs = 7
        "#,
    );

    let mut vars = base_env();
    vars.retain(|(k, _)| *k != "CMD");
    vars.push(("CMD", "editCron"));

    let config = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(TaskKind::Run, env(&vars))
        .unwrap()
        .config;

    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));
    assert_eq!(config.http_timeout, Duration::from_secs(7));
    let Task::Run(run) = &config.task else {
        panic!("expected a run task");
    };
    assert_eq!(run.control_plane.validate_path, "/health");
    assert!(!run.payloads.reload.keep_foundry_dataset);
    assert!(run.payloads.reload.retain_data);
    assert_eq!(
        run.payloads.edit_target.jdbc_targets,
        vec![json!({"url": "jdbc:postgresql://db/warehouse", "schema": "stage"})]
    );
    assert_eq!(run.payloads.cron.timezone(), "UTC");
    assert_eq!(run.payloads.cron.assign(3).cron, "0 2 * * *");
    assert_eq!(run.payloads.cron.assign(5).cron, "15 9 * * *");
}

#[test]
fn environment_timeout_beats_the_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[control_plane]\ntimeout_secs = 7\n");
    let mut vars = base_env();
    vars.push(("HTTP_TIMEOUT", "1m"));

    let config = ConfigLoader::new()
        .with_config_path(path)
        .load_with_env(TaskKind::Run, env(&vars))
        .unwrap()
        .config;
    assert_eq!(config.http_timeout, Duration::from_secs(60));
}

#[test]
fn gapped_cron_table_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        [[cron.ranges]]
        min = 1
        max = 10
        cron = "0 1 * * *"

        [[cron.ranges]]
        min = 12
        max = 20
        cron = "0 2 * * *"
        "#,
    );

    let err = ConfigLoader::new()
        .with_config_path(path)
        .load_with_env(TaskKind::Run, env(&base_env()))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::InvalidCronTable(
            CronTableError::NotContiguous {
                index: 1,
                previous_max: 10,
                min: 12
            }
        ))
    ));
}

#[test]
fn missing_or_broken_config_files_fail() {
    let dir = TempDir::new().unwrap();

    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .load_with_env(TaskKind::Run, env(&base_env()))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));

    let path = write_config(dir.path(), "[reload\nretain_data = 1");
    let err = ConfigLoader::new()
        .load_with_env(
            TaskKind::Run,
            env(&[
                ("JOBS", "a.b.c.d.e"),
                ("META_SVC_URL", "http://x"),
                ("CMD", "pause"),
                ("BREAKTIME_CONFIG_PATH", path.to_str().unwrap()),
            ]),
        )
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { .. }));
}

#[test]
fn audit_config_needs_a_bucket() {
    let vars = [("JOBS", "a.b.c.d.e")];
    let err = ConfigLoader::new()
        .load_with_env(TaskKind::Audit, env(&vars))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::MissingBucket)
    ));

    let config = ConfigLoader::new()
        .load_with_env(
            TaskKind::Audit,
            env(&[
                ("JOBS", "a.b.c.d.e"),
                ("GCS_BUCKET", "lake"),
                ("AUDIT_SUBPATH", "/history/"),
                ("AUDIT_TRIM", "2"),
            ]),
        )
        .unwrap()
        .config;

    // No command or control plane is needed for an audit.
    assert_eq!(config.command(), None);
    let Task::Audit(audit) = &config.task else {
        panic!("expected an audit task");
    };
    assert_eq!(audit.bucket, "lake");
    assert_eq!(audit.subpath, "history");
    assert_eq!(audit.trim, 2);
    assert_eq!(
        audit.storage_base_url,
        "https://storage.googleapis.com/storage/v1"
    );
}

#[test]
fn env_file_is_optional() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join(".env.absent");
    // Only the env file is under test; the rest of the load may fail on
    // whatever the process environment holds.
    let result = ConfigLoader::new()
        .with_env_file(missing)
        .with_config_path(dir.path().join("absent.toml"))
        .load(TaskKind::Run);
    assert!(!matches!(result, Err(ConfigLoadError::EnvFile(_))));
}
