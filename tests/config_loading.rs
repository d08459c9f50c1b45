// tests/config_loading.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use jobhost::config::{ConfigFile, load_and_validate, load_from_str, resolve_config};
use jobhost::engine::EngineSettings;
use jobhost::errors::JobhostError;
use jobhost::validator::{ConstructKind, Verdict};
use jobhost_test_utils::builders::ConfigFileBuilder;

fn parse_and_validate(toml: &str) -> Result<ConfigFile, JobhostError> {
    ConfigFile::try_from(load_from_str(toml)?)
}

#[test]
fn empty_file_uses_defaults() {
    let cfg = parse_and_validate("").expect("empty config is valid");
    assert_eq!(cfg.engine.jobs_dir, PathBuf::from("jobs"));
    assert_eq!(cfg.engine.suffixes, vec!["job".to_string()]);
    assert_eq!(cfg.engine.init_stem, "__init__");
    assert_eq!(cfg.engine.name_prefix, "J");
    assert_eq!(cfg.engine.idle_poll_ms, 1000);
    assert!(cfg.policy.rules.is_empty());
}

#[test]
fn full_file_round_trips_into_settings() {
    let cfg = parse_and_validate(
        r#"
[engine]
jobs_dir = "scripts"
suffixes = ["job", "task"]
name_prefix = "Run"
idle_poll_ms = 250

[policy]
extra_denied_names = ["fetch"]

[policy.rules]
while_loop = "deny"
import = "allow"
"#,
    )
    .expect("valid config");

    let settings = EngineSettings::from_config(&cfg, Path::new("/srv/jobhost"));
    assert_eq!(settings.jobs_dir, PathBuf::from("/srv/jobhost/scripts"));
    assert_eq!(settings.suffixes, vec!["job".to_string(), "task".to_string()]);
    assert_eq!(settings.name_prefix, "Run");
    assert_eq!(settings.idle_poll, Duration::from_millis(250));
    assert!(!settings.exit_when_idle);

    assert_eq!(settings.policy.verdict(ConstructKind::WhileLoop), Verdict::Deny);
    assert_eq!(settings.policy.verdict(ConstructKind::Import), Verdict::Allow);
    assert_eq!(settings.policy.verdict(ConstructKind::PrivateName), Verdict::Deny);
    assert!(settings.policy.is_denied_name("fetch"));
    assert!(settings.policy.is_denied_name("eval"));
}

#[test]
fn absolute_jobs_dir_is_kept() {
    let cfg = ConfigFileBuilder::new().with_jobs_dir("/opt/jobs").build();
    let settings = EngineSettings::from_config(&cfg, Path::new("/elsewhere"));
    assert_eq!(settings.jobs_dir, PathBuf::from("/opt/jobs"));
}

#[test]
fn invalid_settings_are_config_errors() {
    let cases = [
        ConfigFileBuilder::new().with_suffixes(&[]),
        ConfigFileBuilder::new().with_suffixes(&[".job"]),
        ConfigFileBuilder::new().with_suffixes(&["jo b"]),
        ConfigFileBuilder::new().with_name_prefix(""),
        ConfigFileBuilder::new().with_name_prefix("9x"),
        ConfigFileBuilder::new().with_name_prefix("J-"),
        ConfigFileBuilder::new().with_idle_poll_ms(0),
        ConfigFileBuilder::new().with_denied_name("  "),
    ];

    for builder in cases {
        match builder.try_build() {
            Err(JobhostError::ConfigError(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }
}

#[test]
fn toml_type_errors_surface_as_toml_errors() {
    let cases = [
        "[engine]\nidle_poll_ms = \"soon\"",
        "[policy.rules]\nwhile_loop = \"maybe\"",
        "[policy.rules]\nteleport = \"deny\"",
        "[engine\n",
    ];
    for toml in cases {
        assert!(
            matches!(load_from_str(toml), Err(JobhostError::TomlError(_))),
            "{toml}"
        );
    }
}

#[test]
fn load_and_validate_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Jobhost.toml");
    std::fs::write(&path, "[engine]\nname_prefix = \"Q\"\n").unwrap();

    let cfg = load_and_validate(&path).expect("valid");
    assert_eq!(cfg.engine.name_prefix, "Q");

    let (cfg, base) = resolve_config(Some(&path)).expect("explicit path");
    assert_eq!(cfg.engine.name_prefix, "Q");
    assert_eq!(base, dir.path());
}

#[test]
fn explicit_missing_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        resolve_config(Some(&missing)),
        Err(JobhostError::IoError(_))
    ));
}
