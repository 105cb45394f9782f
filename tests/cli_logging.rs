// tests/cli_logging.rs

use std::path::PathBuf;

use clap::Parser;
use jobdeck::cli::{CliArgs, LogLevel};
use jobdeck::logging::resolve_level;
use tracing::Level;

#[test]
fn no_arguments_means_default_config_and_no_level() {
    let args = CliArgs::try_parse_from(["jobdeck"]).expect("parse");
    assert!(args.config.is_none());
    assert!(args.log_level.is_none());
    assert!(!args.dry_run);
}

#[test]
fn all_flags_parse() {
    let args = CliArgs::try_parse_from([
        "jobdeck",
        "--config",
        "conf/Jobdeck.toml",
        "--log-level",
        "debug",
        "--dry-run",
    ])
    .expect("parse");
    assert_eq!(args.config, Some(PathBuf::from("conf/Jobdeck.toml")));
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert!(args.dry_run);
}

#[test]
fn unknown_level_is_rejected() {
    assert!(CliArgs::try_parse_from(["jobdeck", "--log-level", "loud"]).is_err());
}

#[test]
fn level_priority_is_flag_then_env_then_warn() {
    assert_eq!(resolve_level(Some(LogLevel::Trace), Some("error")), Level::TRACE);
    assert_eq!(resolve_level(None, Some("info")), Level::INFO);
    assert_eq!(resolve_level(None, Some(" Warning ")), Level::WARN);
    assert_eq!(resolve_level(None, Some("nonsense")), Level::WARN);
    assert_eq!(resolve_level(None, None), Level::WARN);
}
