// tests/supervisor_policy.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use jobdeck::errors::LaunchError;
use jobdeck::job::{JobClass, JobDescriptor, JobId, JobStatus};
use jobdeck::sink::{LineSource, LogSink};
use jobdeck::supervisor::{CompletionRule, Supervisor, SupervisorPolicy};
use jobdeck::types::BusyBehaviour;
use jobdeck_test_utils::fake_launcher::{FakeJob, FakeLauncher};
use jobdeck_test_utils::{init_tracing, job_texts, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn job(class: &str, program: &str) -> JobDescriptor {
    JobDescriptor::new(JobClass::new(class), [program])
}

fn supervisor(policy: SupervisorPolicy, launcher: FakeLauncher) -> Supervisor<FakeLauncher> {
    Supervisor::new(policy, launcher, LogSink::unbounded())
}

#[tokio::test]
async fn unrestricted_runs_same_class_jobs_side_by_side() -> TestResult {
    init_tracing();
    let (slow, gate) = FakeJob::succeed().gated();
    let launcher = FakeLauncher::new().with_job("slow", slow);
    let spawned = launcher.spawned();
    let mut sup = supervisor(SupervisorPolicy::unrestricted(), launcher);

    let a = sup.submit(job("training", "slow"))?;
    let b = sup.submit(job("training", "slow"))?;

    assert_eq!(a.status(), JobStatus::Running);
    assert_eq!(b.status(), JobStatus::Running);
    assert_eq!(spawned.lock().unwrap().len(), 2);
    assert!(b.id() > a.id());

    gate.open();
    let done = with_timeout(sup.wait_idle()).await;
    assert_eq!(done.len(), 2);
    Ok(())
}

#[tokio::test]
async fn single_flight_reject_refuses_a_busy_class_only() -> TestResult {
    init_tracing();
    let (slow, gate) = FakeJob::succeed().gated();
    let launcher = FakeLauncher::new().with_job("slow", slow);
    let mut sup = supervisor(SupervisorPolicy::single_flight(BusyBehaviour::Reject), launcher);

    let first = sup.submit(job("training", "slow"))?;
    let err = sup
        .submit(job("training", "slow"))
        .expect_err("class is busy");
    assert!(matches!(err, LaunchError::Busy { ref class } if class.as_str() == "training"));
    assert!(err.is_policy_rejection());

    // Another class is independent.
    let other = sup.submit(job("dataset", "quick"))?;
    assert_ne!(first.id(), other.id());

    gate.open();
    with_timeout(sup.wait_idle()).await;

    // Slot is free again after dispatch.
    sup.submit(job("training", "quick"))?;
    with_timeout(sup.wait_idle()).await;
    Ok(())
}

#[tokio::test]
async fn single_flight_queue_starts_the_next_job_after_dispatch() -> TestResult {
    init_tracing();
    let (slow, gate) = FakeJob::succeed().with_lines(["first"]).gated();
    let launcher = FakeLauncher::new()
        .with_job("slow", slow)
        .with_job("next", FakeJob::succeed().with_lines(["second"]));
    let spawned = launcher.spawned();
    let mut sup = supervisor(SupervisorPolicy::single_flight(BusyBehaviour::Queue), launcher);

    let first = sup.submit(job("training", "slow"))?;
    let second = sup.submit(job("training", "next"))?;
    assert_eq!(second.status(), JobStatus::Queued);
    assert_eq!(spawned.lock().unwrap().len(), 1);

    let summary = sup.active();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[1].status, JobStatus::Queued);

    gate.open();
    let done = with_timeout(sup.wait_idle()).await;
    let order: Vec<JobId> = done.iter().map(|c| c.id).collect();
    assert_eq!(order, vec![first.id(), second.id()]);
    assert_eq!(second.status(), JobStatus::Succeeded);
    assert_eq!(spawned.lock().unwrap().len(), 2);
    assert_eq!(job_texts(sup.sink(), second.id()), vec!["second"]);
    Ok(())
}

#[tokio::test]
async fn full_queue_rejects_further_submissions() -> TestResult {
    init_tracing();
    let (slow, gate) = FakeJob::succeed().gated();
    let launcher = FakeLauncher::new().with_job("slow", slow);
    let mut sup = supervisor(
        SupervisorPolicy::single_flight(BusyBehaviour::Queue).with_queue_length(1),
        launcher,
    );

    sup.submit(job("training", "slow"))?;
    sup.submit(job("training", "slow"))?;
    let err = sup.submit(job("training", "slow")).expect_err("queue is full");
    assert!(matches!(err, LaunchError::QueueFull { .. }));
    assert_eq!(sup.active_count(), 2);

    gate.open();
    let done = with_timeout(sup.wait_idle()).await;
    assert_eq!(done.len(), 2);
    Ok(())
}

#[tokio::test]
async fn cancelling_a_queued_job_never_spawns_it() -> TestResult {
    init_tracing();
    let (slow, gate) = FakeJob::succeed().gated();
    let launcher = FakeLauncher::new().with_job("slow", slow);
    let spawned = launcher.spawned();
    let mut sup = supervisor(SupervisorPolicy::single_flight(BusyBehaviour::Queue), launcher);

    let running = sup.submit(job("training", "slow"))?;
    let queued = sup.submit(job("training", "never"))?;

    assert!(sup.cancel(queued.id()));
    assert!(!sup.cancel(queued.id()));
    assert_eq!(queued.status(), JobStatus::Cancelled);

    gate.open();
    let done = with_timeout(sup.wait_idle()).await;
    assert_eq!(done.len(), 2);
    assert_eq!(running.status(), JobStatus::Succeeded);

    let programs: Vec<String> = spawned
        .lock()
        .unwrap()
        .iter()
        .map(|d| d.display_command())
        .collect();
    assert_eq!(programs, vec!["slow"]);
    Ok(())
}

#[tokio::test]
async fn cancelling_a_running_job_reports_cancelled() -> TestResult {
    init_tracing();
    let (slow, _gate) = FakeJob::succeed().gated();
    let launcher = FakeLauncher::new().with_job("slow", slow);
    let mut sup = supervisor(SupervisorPolicy::default(), launcher);

    let handle = sup.submit(job("training", "slow"))?;
    assert!(sup.cancel(handle.id()));
    assert!(!sup.cancel(JobId(999)));

    let done = with_timeout(sup.wait_idle()).await;
    assert_eq!(done[0].status, JobStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn cancel_all_covers_running_and_queued_jobs() -> TestResult {
    init_tracing();
    let (slow, _gate) = FakeJob::succeed().gated();
    let launcher = FakeLauncher::new().with_job("slow", slow);
    let mut sup = supervisor(
        SupervisorPolicy::single_flight(BusyBehaviour::Queue).with_queue_length(3),
        launcher,
    );

    sup.submit(job("training", "slow"))?;
    sup.submit(job("training", "slow"))?;
    sup.submit(job("dataset", "slow"))?;

    assert_eq!(sup.cancel_all(), 3);
    let done = with_timeout(sup.wait_idle()).await;
    assert_eq!(done.len(), 3);
    assert!(done.iter().all(|c| c.status == JobStatus::Cancelled));
    Ok(())
}

#[tokio::test]
async fn queued_job_that_cannot_spawn_ends_errored() -> TestResult {
    init_tracing();
    let (slow, gate) = FakeJob::succeed().gated();
    let launcher = FakeLauncher::new()
        .with_job("slow", slow)
        .missing("ghost");
    let mut sup = supervisor(
        SupervisorPolicy::single_flight(BusyBehaviour::Queue).with_queue_length(2),
        launcher,
    );

    sup.submit(job("training", "slow"))?;
    let ghost = sup.submit(job("training", "ghost"))?;
    let after = sup.submit(job("training", "quick"))?;

    gate.open();
    let done = with_timeout(sup.wait_idle()).await;
    assert_eq!(done.len(), 3);

    assert!(matches!(ghost.status(), JobStatus::Errored(ref cause) if cause.contains("ghost")));
    let lines = sup.sink().lines_for(ghost.id());
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].source, LineSource::Notice);
    assert!(lines[0].text.starts_with(">>> error: "));

    // The next queued job still ran.
    assert_eq!(after.status(), JobStatus::Succeeded);
    Ok(())
}

#[tokio::test]
async fn missing_program_is_rejected_without_creating_a_job() {
    init_tracing();
    let launcher = FakeLauncher::new().missing("ghost");
    let mut sup = supervisor(SupervisorPolicy::default(), launcher);

    let err = sup.submit(job("training", "ghost")).expect_err("spawn fails");
    assert!(matches!(err, LaunchError::Spawn { .. }));
    assert!(!err.is_policy_rejection());
    assert!(sup.is_idle());
    assert!(sup.dispatch_pending().is_empty());

    // Rejections do not consume ids.
    let next = sup.submit(job("training", "ok")).expect("accepted");
    assert_eq!(next.id(), JobId(1));
}

#[tokio::test]
async fn callbacks_run_only_when_dispatched() -> TestResult {
    init_tracing();
    let launcher = FakeLauncher::new();
    let mut sup = supervisor(SupervisorPolicy::default(), launcher);
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    sup.register(CompletionRule::any(), move |_| {
        *counter.lock().unwrap() += 1;
    });

    let handle = sup.submit(job("dataset", "quick"))?;
    assert_eq!(with_timeout(handle.wait()).await, JobStatus::Succeeded);
    assert_eq!(*calls.lock().unwrap(), 0, "runner finished but nothing dispatched yet");

    let dispatched = sup.dispatch_pending();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(*calls.lock().unwrap(), 1);
    assert!(sup.dispatch_pending().is_empty());
    Ok(())
}

#[tokio::test]
async fn rules_route_by_class_and_outcome_in_registration_order() -> TestResult {
    init_tracing();
    let launcher = FakeLauncher::new()
        .with_job("ok", FakeJob::succeed())
        .with_job("bad", FakeJob::fail(2))
        .with_job("broken", FakeJob::error("pipe closed"));
    let mut sup = supervisor(SupervisorPolicy::default(), launcher);
    let log: Arc<Mutex<Vec<String>>> = Arc::default();

    let record = |tag: &'static str, log: &Arc<Mutex<Vec<String>>>| {
        let log = Arc::clone(log);
        move |c: &jobdeck::job::Completion| {
            log.lock().unwrap().push(format!("{tag}:{}", c.descriptor.display_command()));
        }
    };
    sup.register(
        CompletionRule::for_class(JobClass::dataset_generation()).succeeded(),
        record("refresh", &log),
    );
    sup.register(CompletionRule::any().unsuccessful(), record("alert", &log));
    sup.register(CompletionRule::any(), record("all", &log));

    sup.submit(job(JobClass::DATASET, "ok"))?;
    with_timeout(sup.wait_idle()).await;
    sup.submit(job(JobClass::TRAINING, "ok"))?;
    with_timeout(sup.wait_idle()).await;
    sup.submit(job(JobClass::DATASET, "bad"))?;
    with_timeout(sup.wait_idle()).await;
    sup.submit(job(JobClass::TRAINING, "broken"))?;
    with_timeout(sup.wait_idle()).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "refresh:ok",
            "all:ok",
            "all:ok",
            "alert:bad",
            "all:bad",
            "alert:broken",
            "all:broken",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn unregistered_callbacks_are_not_invoked() -> TestResult {
    init_tracing();
    let mut sup = supervisor(SupervisorPolicy::default(), FakeLauncher::new());
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let id = sup.register(CompletionRule::any(), move |_| {
        *counter.lock().unwrap() += 1;
    });
    assert!(sup.unregister(id));
    assert!(!sup.unregister(id));

    sup.submit(job("x", "quick"))?;
    with_timeout(sup.wait_idle()).await;
    assert_eq!(*calls.lock().unwrap(), 0);
    Ok(())
}

#[tokio::test]
async fn completion_seq_exceeds_every_line_of_the_job() -> TestResult {
    init_tracing();
    let launcher = FakeLauncher::new().with_job("chatty", FakeJob::succeed().with_lines(["1", "2", "3"]));
    let mut sup = supervisor(SupervisorPolicy::default(), launcher);

    let handle = sup.submit(job("x", "chatty"))?;
    let done = with_timeout(sup.wait_idle()).await;

    let max_line = sup
        .sink()
        .lines_for(handle.id())
        .iter()
        .map(|l| l.seq)
        .max()
        .expect("lines");
    assert!(done[0].seq > max_line);
    assert_eq!(done[0].class, JobClass::new("x"));
    Ok(())
}

#[tokio::test]
async fn handle_wait_returns_the_terminal_status_before_dispatch() -> TestResult {
    init_tracing();
    let (slow, gate) = FakeJob::fail(3).gated();
    let launcher = FakeLauncher::new().with_job("slow", slow);
    let mut sup = supervisor(SupervisorPolicy::unrestricted(), launcher);

    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    sup.register(CompletionRule::any(), move |_| *counter.lock().unwrap() += 1);

    let failing = sup.submit(job("training", "slow"))?;
    let cancelled = sup.submit(job("training", "slow"))?;
    let waiter = tokio::spawn({
        let handle = failing.clone();
        async move { handle.wait().await }
    });

    assert!(sup.cancel(cancelled.id()));
    assert_eq!(with_timeout(cancelled.wait()).await, JobStatus::Cancelled);

    gate.open();
    assert_eq!(with_timeout(waiter).await?, JobStatus::Failed(3));
    // Waiting observes the runner only; callbacks still wait for dispatch.
    assert_eq!(*calls.lock().unwrap(), 0);

    let done = with_timeout(sup.wait_idle()).await;
    assert_eq!(done.len(), 2);
    assert_eq!(*calls.lock().unwrap(), 2);
    Ok(())
}
