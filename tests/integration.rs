//! Integration tests for userforge

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use userforge::enumerate::CheckpointStatus;
use userforge::{
    CheckpointManager, CombinatorialSource, Cursor, EnumConfig, Enumerator, FormatLevel,
    ListSource, Probe, ProbeOutcome, RunOutcome, ShutdownSignal, Target,
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn config(threads: usize, state_file: &std::path::Path) -> EnumConfig {
    EnumConfig {
        threads,
        target: Target::new("corp.local", None),
        state_file: state_file.to_path_buf(),
        drain_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn source() -> CombinatorialSource {
    CombinatorialSource::new(
        strings(&["ann", "bob", "cid", "dan"]),
        strings(&["lee", "ray", "fox"]),
        FormatLevel::Big.templates(),
    )
}

fn full_sequence() -> Vec<String> {
    source().map(|c| c.username).collect()
}

/// Records every probed username; reports the ones in `valid` as existing
#[derive(Default)]
struct RecordingProbe {
    seen: Mutex<Vec<String>>,
    valid: HashSet<String>,
    errors: HashSet<String>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    stop_after: Option<(usize, ShutdownSignal)>,
}

impl RecordingProbe {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for RecordingProbe {
    async fn probe(&self, username: &str, _target: &Target) -> ProbeOutcome {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let count = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(username.to_string());
            seen.len()
        };
        if let Some((limit, signal)) = &self.stop_after {
            if count >= *limit {
                signal.trigger();
            }
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.valid.contains(username) {
            ProbeOutcome::Valid
        } else if self.errors.contains(username) {
            ProbeOutcome::Error("kdc unreachable".to_string())
        } else {
            ProbeOutcome::Invalid
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_run_counts_and_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    let probe = Arc::new(RecordingProbe {
        valid: ["ann.lee", "bfox", "dan"].iter().map(|s| s.to_string()).collect(),
        errors: ["cid_ray"].iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    let enumerator = Enumerator::with_probe(config(4, &state_file), probe.clone()).unwrap();

    let report = enumerator.run(source()).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.stats.attempted, 4 * 3 * 22);
    // "dan" is produced once per surname by the <name> format
    assert_eq!(report.stats.confirmed, 2 + 3);
    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.valid.len(), 5);

    let mut seen = probe.seen();
    let mut expected = full_sequence();
    seen.sort();
    expected.sort();
    assert_eq!(seen, expected);

    assert_eq!(report.checkpoint, CheckpointStatus::Saved(Cursor::new(4, 0, 0)));
    let saved = CheckpointManager::new(&state_file).load().unwrap().unwrap();
    assert_eq!(saved.cursor, Cursor::new(4, 0, 0));
    assert_eq!(saved.fingerprint, Some(source().fingerprint()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backpressure_bounds_in_flight_work() {
    let dir = tempfile::tempdir().unwrap();
    let threads = 3;

    let probe = Arc::new(RecordingProbe {
        delay: Duration::from_millis(2),
        ..Default::default()
    });
    let enumerator =
        Enumerator::with_probe(config(threads, &dir.path().join("state.json")), probe.clone()).unwrap();

    let small = CombinatorialSource::new(
        strings(&["ann", "bob"]),
        strings(&["lee", "ray", "fox"]),
        FormatLevel::Big.templates(),
    );
    let report = enumerator.run(small).await.unwrap();

    assert_eq!(report.stats.attempted, 2 * 3 * 22);
    assert!(probe.max_active.load(Ordering::SeqCst) <= threads);
    // queue capacity + one candidate per worker + the one the producer holds
    assert!(report.peak_in_flight <= 2 * threads + 1, "peak {}", report.peak_in_flight);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interrupt_then_resume_covers_everything_once() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");
    let full = full_sequence();

    let signal = ShutdownSignal::new();
    let first_probe = Arc::new(RecordingProbe {
        delay: Duration::from_millis(1),
        stop_after: Some((40, signal.clone())),
        ..Default::default()
    });
    let first = Enumerator::with_probe(config(4, &state_file), first_probe.clone())
        .unwrap()
        .with_shutdown(signal);

    let report = first.run(source()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.exit_code(), 1);
    let cursor = match report.checkpoint {
        CheckpointStatus::Saved(cursor) => cursor,
        other => panic!("expected a saved checkpoint, got {:?}", other),
    };
    assert_eq!(report.resume_cursor, Some(cursor));
    assert!(report.stats.attempted >= 40);
    assert!((report.stats.attempted as usize) < full.len());

    let second_probe = Arc::new(RecordingProbe::default());
    let second = Enumerator::with_probe(config(4, &state_file), second_probe.clone()).unwrap();
    let resumed = second.resume_source(source()).unwrap();
    assert_eq!(resumed.cursor(), cursor);

    let report = second.run(resumed).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);

    // Every queued candidate drained before the save, so nothing repeats.
    let first_seen = first_probe.seen();
    let second_seen = second_probe.seen();
    assert_eq!(first_seen.len() + second_seen.len(), full.len());

    let split = cursor.ordinal(3, 22) as usize;
    let mut before: Vec<String> = first_seen;
    let mut after: Vec<String> = second_seen;
    before.sort();
    after.sort();
    let mut expected_before = full[..split].to_vec();
    let mut expected_after = full[split..].to_vec();
    expected_before.sort();
    expected_after.sort();
    assert_eq!(before, expected_before);
    assert_eq!(after, expected_after);
}

/// Never returns for one specific username
struct StuckProbe {
    stuck_on: String,
    signal: ShutdownSignal,
}

#[async_trait]
impl Probe for StuckProbe {
    async fn probe(&self, username: &str, _target: &Target) -> ProbeOutcome {
        if username == self.stuck_on {
            self.signal.trigger();
            std::future::pending::<()>().await;
        }
        ProbeOutcome::Invalid
    }

    fn name(&self) -> &str {
        "stuck"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drain_timeout_keeps_unfinished_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");
    let full = full_sequence();
    let stuck_index = 30;

    let signal = ShutdownSignal::new();
    let probe = StuckProbe {
        stuck_on: full[stuck_index].clone(),
        signal: signal.clone(),
    };
    let mut cfg = config(2, &state_file);
    cfg.drain_timeout = Duration::from_millis(200);
    let enumerator = Enumerator::new(cfg, probe).unwrap().with_shutdown(signal);

    let report = tokio::time::timeout(Duration::from_secs(10), enumerator.run(source()))
        .await
        .expect("run must finish despite the stuck probe")
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    let cursor = report.resume_cursor.unwrap();
    assert!(cursor.ordinal(3, 22) as usize <= stuck_index);

    let second_probe = Arc::new(RecordingProbe::default());
    let second = Enumerator::with_probe(config(2, &state_file), second_probe.clone()).unwrap();
    let report = second.run(second.resume_source(source()).unwrap()).await.unwrap();
    assert!(report.is_complete());
    assert!(second_probe.seen().contains(&full[stuck_index]));
}

#[tokio::test]
async fn test_list_mode_has_no_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    let probe = Arc::new(RecordingProbe {
        valid: ["administrator"].iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    let enumerator = Enumerator::with_probe(config(2, &state_file), probe.clone()).unwrap();

    let input: &[u8] = b"Administrator\nguest\nnot valid\n\nkrbtgt@CORP.LOCAL\n";
    let report = enumerator.run(ListSource::from_reader(input)).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.stats.attempted, 3);
    assert_eq!(report.stats.confirmed, 1);
    assert_eq!(report.valid, vec!["administrator"]);
    assert_eq!(report.checkpoint, CheckpointStatus::NotApplicable);
    assert_eq!(report.resume_cursor, None);
    assert!(!state_file.exists());
}

#[tokio::test]
async fn test_list_mode_keeps_going_after_non_utf8_line() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(RecordingProbe::default());
    let enumerator =
        Enumerator::with_probe(config(1, &dir.path().join("state.json")), probe.clone()).unwrap();

    let input: &[u8] = b"alice\ncaf\xe9\nbob\n";
    let report = enumerator.run(ListSource::from_reader(input)).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.stats.attempted, 2);
    assert_eq!(probe.seen(), vec!["alice", "bob"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_mode_stops_while_waiting_for_input() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    // The writer half stays open, so the reader never reaches end of input.
    let (reader, mut writer) = tokio::io::duplex(64);
    tokio::io::AsyncWriteExt::write_all(&mut writer, b"alice\n")
        .await
        .unwrap();

    let probe = Arc::new(RecordingProbe::default());
    let enumerator = Enumerator::with_probe(config(2, &state_file), probe.clone()).unwrap();
    let signal = enumerator.shutdown_signal();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        signal.trigger();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        enumerator.run(ListSource::from_reader(reader)),
    )
    .await
    .expect("a blocked wordlist read must not outlive the interrupt")
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.stats.attempted, 1);
    assert_eq!(probe.seen(), vec!["alice"]);
    assert_eq!(report.checkpoint, CheckpointStatus::NotApplicable);
    assert!(!state_file.exists());
    drop(writer);
}

#[tokio::test]
async fn test_list_mode_delay_is_interruptible() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(1, &dir.path().join("state.json"));
    cfg.delay = Duration::from_secs(60);

    let probe = Arc::new(RecordingProbe::default());
    let enumerator = Enumerator::with_probe(cfg, probe.clone()).unwrap();
    let signal = enumerator.shutdown_signal();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.trigger();
    });

    let input: &[u8] = b"alice\nbob\n";
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        enumerator.run(ListSource::from_reader(input)),
    )
    .await
    .expect("delay must not outlive the interrupt")
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.stats.attempted, 0);
}

#[tokio::test]
async fn test_delay_is_interruptible() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(1, &dir.path().join("state.json"));
    cfg.delay = Duration::from_secs(60);

    let probe = Arc::new(RecordingProbe::default());
    let enumerator = Enumerator::with_probe(cfg, probe.clone()).unwrap();
    let signal = enumerator.shutdown_signal();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.trigger();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), enumerator.run(source()))
        .await
        .expect("delay must not outlive the interrupt")
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.stats.attempted, 0);
    // The candidate waiting out the delay was never probed.
    assert_eq!(report.checkpoint, CheckpointStatus::Saved(Cursor::new(0, 0, 0)));
}

#[tokio::test]
async fn test_resume_rejects_changed_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    let enumerator = Enumerator::new(config(1, &state_file), userforge::DryRunProbe).unwrap();
    let signal = enumerator.shutdown_signal();
    signal.trigger();
    let report = enumerator.run(source()).await.unwrap();
    assert!(matches!(report.checkpoint, CheckpointStatus::Saved(_)));

    let changed = CombinatorialSource::new(
        strings(&["ann", "bob"]),
        strings(&["lee"]),
        FormatLevel::Small.templates(),
    );
    let err = enumerator.resume_source(changed).err().unwrap();
    assert!(matches!(err, userforge::UserForgeError::Validation { .. }));
}

#[tokio::test]
async fn test_checkpoint_save_failure_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();

    let probe = Arc::new(RecordingProbe::default());
    let enumerator =
        Enumerator::with_probe(config(2, &blocker.join("state.json")), probe).unwrap();
    let report = enumerator.run(source()).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(matches!(report.checkpoint, CheckpointStatus::Failed(_)));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_zero_threads_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = Enumerator::new(config(0, &dir.path().join("state.json")), userforge::DryRunProbe);
    assert!(result.is_err());
}

#[test]
fn test_library_initialization() {
    let result = userforge::init();
    assert!(result.is_ok());
}

#[test]
fn test_source_blocks_on_runtime() {
    // The producer side works from a plain blocking context as well.
    let candidates = tokio_test::block_on(async {
        let mut source = userforge::CandidateSource::from(source());
        let mut out = Vec::new();
        while let Some(candidate) = source.next_candidate().await.unwrap() {
            out.push(candidate.username);
            if out.len() == 3 {
                break;
            }
        }
        out
    });
    assert_eq!(candidates, vec!["ann", "annlee", "ann.lee"]);
}
