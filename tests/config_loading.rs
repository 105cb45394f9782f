// tests/config_loading.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use jobdeck::config::{ConfigFile, load_and_validate, load_from_path, load_or_default};
use jobdeck::errors::JobdeckError;
use jobdeck::types::{Balance, BusyBehaviour, ConcurrencyPolicy, Distribution, LongtailType, Partition};
use jobdeck_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<(tempfile::TempDir, PathBuf), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Jobdeck.toml");
    fs::write(&path, contents)?;
    Ok((dir, path))
}

fn config_error(contents: &str) -> String {
    let (_dir, path) = write_config(contents).expect("write config");
    match load_and_validate(&path) {
        Err(JobdeckError::ConfigError(msg)) => msg,
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn defaults_when_file_is_missing() -> TestResult {
    let dir = tempfile::tempdir()?;
    let cfg = load_or_default(dir.path().join("Jobdeck.toml"))?;

    assert_eq!(cfg.console().python, "python3");
    assert_eq!(cfg.console().project_root, PathBuf::from("."));
    assert!(cfg.console().announce);
    assert_eq!(cfg.console().log_capacity, None);

    let sup = cfg.supervisor();
    assert_eq!(sup.policy, ConcurrencyPolicy::Unrestricted);
    assert_eq!(sup.on_busy, BusyBehaviour::Reject);
    assert_eq!(sup.queue_length, 1);
    assert_eq!(sup.drain_grace(), Duration::from_secs(2));

    let ds = cfg.dataset();
    assert_eq!(ds.script, PathBuf::from("dataset").join("generate_Cifar10.py"));
    assert_eq!(ds.prefixes, vec!["Cifar", "MNIST"]);
    assert_eq!(ds.distribution, Distribution::NonIid);
    assert_eq!(ds.balance, Balance::Unbalanced);
    assert_eq!(ds.partition, Partition::Dir);
    assert!(ds.longtail);
    assert_eq!(ds.longtail_type, LongtailType::Global);
    assert_eq!(ds.imbalance_factor, 50);
    assert_eq!(ds.alpha, 0.5);
    assert_eq!(ds.num_clients, 20);

    let tr = cfg.training();
    assert_eq!(tr.workdir, PathBuf::from("system"));
    assert_eq!(tr.script, PathBuf::from("main.py"));
    assert_eq!(tr.algorithm, "CReFF");
    assert_eq!(tr.model, "ResNet8");
    assert_eq!(tr.global_rounds, 200);
    assert_eq!(tr.device_id, 0);
    Ok(())
}

#[test]
fn explicit_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_and_validate(dir.path().join("nope.toml")).expect_err("missing file");
    assert!(matches!(err, JobdeckError::IoError(_)));
}

#[test]
fn full_file_overrides_every_section() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[console]
python = "/usr/bin/python3.11"
project_root = "/srv/longtail"
announce = false
log_capacity = 5000

[supervisor]
policy = "single_flight"
on_busy = "queue"
queue_length = 3
drain_grace_ms = 250

[dataset]
prefixes = ["Cifar"]
distribution = "iid"
balance = "balance"
partition = "exdir"
longtail = false
longtail_type = "local"
imbalance_factor = 100
alpha = 0.1
num_clients = 10

[training]
algorithm = "FedAvg"
model = "CNN"
global_rounds = 5
device_id = 1
"#,
    )?;
    let cfg = load_and_validate(&path)?;

    assert!(!cfg.console().announce);
    assert_eq!(cfg.console().log_capacity, Some(5000));
    assert_eq!(cfg.supervisor().policy, ConcurrencyPolicy::SingleFlight);
    assert_eq!(cfg.supervisor().on_busy, BusyBehaviour::Queue);
    assert_eq!(cfg.supervisor().policy().queue_length, 3);
    assert_eq!(cfg.supervisor().drain_grace(), Duration::from_millis(250));
    assert_eq!(cfg.dataset().distribution, Distribution::Iid);
    assert_eq!(cfg.dataset().balance, Balance::Balanced);
    assert_eq!(cfg.dataset().partition, Partition::ExDir);
    assert_eq!(cfg.dataset().longtail_type, LongtailType::Local);
    assert_eq!(cfg.training().algorithm, "FedAvg");
    assert_eq!(cfg.training().global_rounds, 5);
    Ok(())
}

#[test]
fn balance_dash_is_accepted() -> TestResult {
    let (_dir, path) = write_config("[dataset]\nbalance = \"-\"\n")?;
    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.dataset().balance, Balance::Unbalanced);
    Ok(())
}

#[test]
fn out_of_range_values_are_config_errors() {
    assert!(config_error("[supervisor]\nqueue_length = 0\n").contains("queue_length"));
    assert!(config_error("[console]\nlog_capacity = 0\n").contains("log_capacity"));
    assert!(config_error("[console]\npython = \"  \"\n").contains("python"));
    assert!(config_error("[dataset]\nalpha = 0.0\n").contains("alpha"));
    assert!(config_error("[dataset]\nalpha = -1.5\n").contains("alpha"));
    assert!(config_error("[dataset]\nnum_clients = 0\n").contains("num_clients"));
    assert!(config_error("[dataset]\nprefixes = []\n").contains("prefixes"));
    assert!(config_error("[training]\nglobal_rounds = 0\n").contains("global_rounds"));
}

#[test]
fn form_defaults_must_pass_the_form_checks() -> TestResult {
    assert!(config_error("[dataset]\nimbalance_factor = 0\n").contains("imbalance_factor"));
    assert!(config_error("[training]\nalgorithm = \"NotAnAlgo\"\n").contains("algorithm"));
    assert!(config_error("[training]\nmodel = \"\"\n").contains("model"));

    let (_dir, path) = write_config("[training]\nalgorithm = \"fedprox\"\n")?;
    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.training().algorithm, "FedProx");
    Ok(())
}

#[test]
fn unknown_keys_and_bad_enums_fail_to_parse() -> TestResult {
    let (_dir, path) = write_config("[supervisor]\npolicy = \"sometimes\"\n")?;
    assert!(matches!(load_from_path(&path), Err(JobdeckError::TomlError(_))));

    let (_dir, path) = write_config("[console]\npyhton = \"python3\"\n")?;
    assert!(matches!(load_from_path(&path), Err(JobdeckError::TomlError(_))));

    let (_dir, path) = write_config("[dataset]\npartition = \"random\"\n")?;
    assert!(matches!(load_from_path(&path), Err(JobdeckError::TomlError(_))));
    Ok(())
}

#[test]
fn builder_produces_validated_config() {
    let cfg: ConfigFile = ConfigFileBuilder::new()
        .python("sh")
        .single_flight(BusyBehaviour::Queue)
        .queue_length(2)
        .log_capacity(10)
        .build();
    assert_eq!(cfg.console().python, "sh");
    assert_eq!(cfg.supervisor().policy().queue_length, 2);

    let raw = ConfigFileBuilder::new().queue_length(0).raw();
    assert!(ConfigFile::try_from(raw).is_err());
}
