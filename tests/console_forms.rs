// tests/console_forms.rs

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use jobdeck::console::{
    CancelTarget, ConsoleCommand, ConsolePaths, DatasetCatalog, DatasetForm, DatasetScan,
    TrainingForm, parse_assignments, scan_datasets,
};
use jobdeck::errors::FormError;
use jobdeck::job::{JobClass, JobId};
use jobdeck_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn paths(root: &Path) -> ConsolePaths {
    ConsolePaths::from_config(&ConfigFileBuilder::new().project_root(root).build())
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, "").expect("write");
}

#[test]
fn default_dataset_argv_includes_longtail_values() {
    let paths = paths(Path::new("/proj"));
    let d = DatasetForm::default().descriptor(&paths);

    let script = PathBuf::from("dataset").join("generate_Cifar10.py");
    assert_eq!(
        d.argv(),
        [
            "python3",
            script.to_str().expect("utf-8 path"),
            "noniid",
            "-",
            "dir",
            "longtail",
            "global",
            "50",
            "0.5",
            "20",
        ]
    );
    assert_eq!(d.class(), &JobClass::dataset_generation());
    assert_eq!(d.workdir(), Some(Path::new("/proj")));
}

#[test]
fn longtail_off_drops_the_three_longtail_arguments() -> TestResult {
    let mut form = DatasetForm::default();
    for (k, v) in parse_assignments(["longtail=off", "alpha=0.1", "clients=10", "dist=iid"])? {
        form.apply(&k, &v)?;
    }
    assert_eq!(form.script_args(), vec!["iid", "-", "dir", "0.1", "10"]);
    Ok(())
}

#[test]
fn dataset_fields_are_validated() {
    let mut form = DatasetForm::default();
    assert!(matches!(form.apply("partition", "random"), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("alpha", "0"), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("alpha", "abc"), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("num_clients", "0"), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("longtail", "maybe"), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("colour", "red"), Err(FormError::UnknownField(_))));
    assert_eq!(form, DatasetForm::default(), "failed assignments change nothing");
}

#[test]
fn dataset_build_requires_the_generator_script() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let paths = paths(tmp.path());

    let err = DatasetForm::default().build(&paths).expect_err("no script yet");
    assert!(matches!(err, FormError::MissingScript(_)));

    touch(&tmp.path().join("dataset").join("generate_Cifar10.py"));
    let d = DatasetForm::default().build(&paths)?;
    assert_eq!(d.workdir(), Some(tmp.path()));
    assert!(d.envs().iter().any(|(k, v)| k == "PYTHONUNBUFFERED" && v == "1"));
    Ok(())
}

#[test]
fn training_argv_and_workdir() {
    let paths = paths(Path::new("/proj"));
    let mut form = TrainingForm::default();
    form.apply("algo", "fedavg").expect("known algorithm");
    form.apply("gr", "5").expect("rounds");
    form.apply("model", "MyNet").expect("free-form model");

    let d = form.descriptor(&paths, "Cifar10_dir_0.5");
    assert_eq!(
        d.argv(),
        [
            "python3", "main.py", "-data", "Cifar10_dir_0.5", "-algo", "FedAvg", "-m", "MyNet",
            "-gr", "5", "-did", "0",
        ]
    );
    assert_eq!(d.class(), &JobClass::training());
    assert_eq!(d.workdir(), Some(Path::new("/proj").join("system").as_path()));
}

#[test]
fn training_fields_are_validated() {
    let mut form = TrainingForm::default();
    assert!(matches!(form.apply("algorithm", "SGD"), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("global_rounds", "0"), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("device_id", "-1"), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("model", ""), Err(FormError::InvalidField { .. })));
    assert!(matches!(form.apply("data", "x"), Err(FormError::UnknownField(_))));
}

#[test]
fn training_build_checks_script_then_dataset() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let paths = paths(tmp.path());
    let form = TrainingForm::default();

    assert!(matches!(
        form.build(&paths, Some("Cifar10")),
        Err(FormError::MissingScript(_))
    ));

    touch(&tmp.path().join("system").join("main.py"));
    assert!(matches!(form.build(&paths, None), Err(FormError::NoDatasetSelected)));
    assert!(matches!(form.build(&paths, Some("")), Err(FormError::NoDatasetSelected)));

    let d = form.build(&paths, Some("Cifar10"))?;
    assert_eq!(d.args()[1..3], ["-data".to_string(), "Cifar10".to_string()]);
    Ok(())
}

#[test]
fn assignments_need_an_equals_sign() {
    assert!(parse_assignments(["alpha"]).is_err());
    assert!(parse_assignments(["=1"]).is_err());
    let parsed = parse_assignments(["Num-Clients=5"]).expect("parse");
    assert_eq!(parsed, vec![("num_clients".to_string(), "5".to_string())]);
}

#[test]
fn scan_lists_prefixed_directories_sorted() -> TestResult {
    let tmp = tempfile::tempdir()?;
    for name in ["MNIST_iid", "Cifar10_b", "Cifar10_a", "other", "rawdata"] {
        fs::create_dir(tmp.path().join(name))?;
    }
    fs::write(tmp.path().join("Cifar10_file.txt"), "")?;

    let prefixes = vec!["Cifar".to_string(), "MNIST".to_string()];
    let scan = scan_datasets(tmp.path(), &prefixes)?;
    assert_eq!(scan.names(), ["Cifar10_a", "Cifar10_b", "MNIST_iid"]);
    Ok(())
}

#[test]
fn scan_of_missing_directory_is_reported() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let scan = scan_datasets(&tmp.path().join("dataset"), &["Cifar".to_string()])?;
    assert_eq!(scan, DatasetScan::MissingDir);
    assert!(scan.names().is_empty());
    Ok(())
}

#[test]
fn refresh_keeps_a_surviving_selection() -> TestResult {
    let tmp = tempfile::tempdir()?;
    fs::create_dir(tmp.path().join("Cifar_a"))?;
    fs::create_dir(tmp.path().join("Cifar_b"))?;

    let mut catalog = DatasetCatalog::new(tmp.path(), vec!["Cifar".to_string()]);
    catalog.refresh()?;
    assert_eq!(catalog.selected(), Some("Cifar_a"));

    catalog.select("Cifar_b")?;
    fs::create_dir(tmp.path().join("Cifar_0"))?;
    catalog.refresh()?;
    assert_eq!(catalog.selected(), Some("Cifar_b"));

    fs::remove_dir(tmp.path().join("Cifar_b"))?;
    catalog.refresh()?;
    assert_eq!(catalog.selected(), Some("Cifar_0"));

    assert!(catalog.select("Cifar_zzz").is_err());
    Ok(())
}

#[test]
fn console_commands_parse() {
    assert_eq!("".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Empty));
    assert_eq!("jobs".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Jobs));
    assert_eq!(
        "cancel #4".parse::<ConsoleCommand>(),
        Ok(ConsoleCommand::Cancel(CancelTarget::Job(JobId(4))))
    );
    assert_eq!(
        "cancel all".parse::<ConsoleCommand>(),
        Ok(ConsoleCommand::Cancel(CancelTarget::All))
    );
    assert_eq!(
        "train gr=3".parse::<ConsoleCommand>(),
        Ok(ConsoleCommand::Train(vec![("gr".to_string(), "3".to_string())]))
    );
    assert_eq!(
        "select Cifar10".parse::<ConsoleCommand>(),
        Ok(ConsoleCommand::Select("Cifar10".to_string()))
    );
    assert!("cancel".parse::<ConsoleCommand>().is_err());
    assert!("jobs now".parse::<ConsoleCommand>().is_err());
    assert!("launch".parse::<ConsoleCommand>().is_err());
}
