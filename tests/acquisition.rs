mod common;

use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use tekmso::acquisition::{
    prepare_session, AcquisitionController, AcquisitionError, AcquisitionSession, ConfirmPolicy,
    LogSinks, LoopOptions, ReadyPolicy, RetryRecords,
};
use tekmso::devices::tek_mso::TekMso;

use common::{ScriptedDut, ScriptedOperator, ScriptedScope};

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> Vec<u8> { self.0.borrow().clone() }
}

impl Write for SharedBuf {
    fn write(&mut self, buf:&[u8]) -> io::Result<usize> { self.0.borrow_mut().write(buf) }
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

fn fast_options() -> LoopOptions {
    LoopOptions {
        ready: ReadyPolicy{ interval: Duration::from_millis(1), timeout: Some(Duration::from_secs(5)) },
        confirm: ConfirmPolicy::new(Duration::from_millis(1), Duration::from_millis(40)).unwrap(),
        rearm_on_retry: true,
        retry_records: RetryRecords::KeepAll,
    }
}

fn frames(range:std::ops::RangeInclusive<u32>) -> (Vec<u8>, Vec<u8>) {
    let mut full = vec![];
    let mut case_only = vec![];
    for n in range {
        full.extend(ScriptedDut::frame_bytes(n));
        case_only.extend(ScriptedDut::case_bytes(n));
    }
    (full, case_only)
}

struct Outcome {
    summary: tekmso::acquisition::SessionSummary,
    full: Vec<u8>,
    case_only: Vec<u8>,
    triggers: u32,
}

fn run(scope:&mut TekMso<ScriptedScope>, count:u32, options:LoopOptions) -> Result<Outcome, AcquisitionError> {
    let frames_per_trigger = scope.transport().max_frames;
    let session = AcquisitionSession::new(count, frames_per_trigger)?;
    let full = SharedBuf::default();
    let case_only = SharedBuf::default();
    let mut dut = ScriptedDut::default();

    let sinks = LogSinks::from_writers(full.clone(), case_only.clone());
    let summary = AcquisitionController::new(scope, &mut dut, sinks, session, options).run()?;

    Ok(Outcome{ summary, full: full.contents(), case_only: case_only.contents(), triggers: dut.triggers })
}

#[test]
fn immediate_confirmation_runs_one_cycle_per_fastframe() {
    let mut scope = TekMso::with_transport(ScriptedScope::new(4));
    let out = run(&mut scope, 8, fast_options()).unwrap();

    assert_eq!(out.summary.cycles, 2);
    assert_eq!(out.summary.failed_cycles, 0);
    assert_eq!(out.summary.completed, 8);
    assert_eq!(out.summary.records_written, 8);
    assert_eq!(out.triggers, 8);

    let (full, case_only) = frames(1..=8);
    assert_eq!(out.full, full);
    assert_eq!(out.case_only, case_only);

    let log = &scope.transport().log;
    assert_eq!(scope.transport().count("*ESR?"), 2);
    assert_eq!(scope.transport().count("*OPC"), 2);
    assert_eq!(&log[..8], &[
        ":HORizontal:FASTframe:STATE 1",
        ":HORizontal:FASTframe:COUNt 4",
        ":SAVEON:TRIGger 1",
        ":ACQuire:STOPAfter SEQuence",
        ":ACQuire:STATE 1",
        "*OPC",
        ":TRIGger:STATE?",
        "*ESR?",
    ]);
}

#[test]
fn unconfirmed_cycle_is_repeated_and_its_records_stay_in_the_logs() {
    let mut scope = TekMso::with_transport(ScriptedScope::new(3));
    scope.transport_mut().esr_replies.extend(std::iter::repeat("0".to_owned()).take(40));

    let out = run(&mut scope, 3, fast_options()).unwrap();

    assert_eq!(out.summary.completed, 3);
    assert_eq!(out.summary.cycles, 2);
    assert_eq!(out.summary.failed_cycles, 1);
    assert_eq!(out.summary.records_written, 6);
    assert_eq!(out.triggers, 6);

    // Failed cycle's frames first, then the retry's
    let (full, case_only) = frames(1..=6);
    assert_eq!(out.full, full);
    assert_eq!(out.case_only, case_only);

    assert_eq!(scope.transport().count("*ESR?"), 41);
    assert_eq!(scope.transport().count("*OPC"), 2);
}

#[test]
fn confirmed_only_policy_drops_records_of_unconfirmed_cycles() {
    let mut scope = TekMso::with_transport(ScriptedScope::new(3));
    scope.transport_mut().esr_replies.extend(std::iter::repeat("0".to_owned()).take(40));

    let mut options = fast_options();
    options.retry_records = RetryRecords::ConfirmedOnly;
    let out = run(&mut scope, 3, options).unwrap();

    assert_eq!(out.summary.completed, 3);
    assert_eq!(out.summary.records_written, 3);
    assert_eq!(out.triggers, 6);

    let (full, case_only) = frames(4..=6);
    assert_eq!(out.full, full);
    assert_eq!(out.case_only, case_only);
}

#[test]
fn retry_without_rearm_goes_straight_to_the_device() {
    let mut scope = TekMso::with_transport(ScriptedScope::new(2));
    scope.transport_mut().esr_replies.extend(std::iter::repeat("0".to_owned()).take(40));

    let mut options = fast_options();
    options.rearm_on_retry = false;
    let out = run(&mut scope, 2, options).unwrap();

    assert_eq!(out.summary.failed_cycles, 1);
    assert_eq!(out.triggers, 4);
    assert_eq!(scope.transport().count("*OPC"), 1);
    assert_eq!(scope.transport().count(":ACQuire:STATE 1"), 1);
}

#[test]
fn confirmation_poll_gives_up_after_the_ceiling() {
    for frames_per_trigger in &[1u32, 5, 10] {
        let mut scope = TekMso::with_transport(ScriptedScope::new(*frames_per_trigger));
        scope.transport_mut().esr_default = "0".to_owned();

        let session = AcquisitionSession::new(*frames_per_trigger * 3, *frames_per_trigger).unwrap();
        let sinks = LogSinks::from_writers(Vec::new(), Vec::new());
        let mut dut = ScriptedDut::default();
        let mut controller = AcquisitionController::new(&mut scope, &mut dut, sinks, session, fast_options());

        assert!(!controller.run_cycle().unwrap());
        assert!(controller.session().is_retry());
        assert_eq!(controller.session().completed(), 0);
        drop(controller);

        assert_eq!(scope.transport().count("*ESR?"), 40);
    }
}

#[test]
fn event_status_with_other_bits_still_confirms() {
    let mut scope = TekMso::with_transport(ScriptedScope::new(1));
    scope.transport_mut().esr_replies.push_back("0".to_owned());
    scope.transport_mut().esr_replies.push_back("33".to_owned());

    let out = run(&mut scope, 1, fast_options()).unwrap();
    assert_eq!(out.summary.failed_cycles, 0);
    assert_eq!(scope.transport().count("*ESR?"), 2);
}

#[test]
fn arming_waits_for_ready() {
    let mut scope = TekMso::with_transport(ScriptedScope::new(1));
    for state in &["ARMED", "TRIGGER", "ARMED"] {
        scope.transport_mut().trigger_replies.push_back(state.to_string());
    }

    let out = run(&mut scope, 1, fast_options()).unwrap();
    assert_eq!(out.summary.completed, 1);
    assert_eq!(scope.transport().count(":TRIGger:STATE?"), 4);
}

#[test]
fn scope_that_never_gets_ready_times_out() {
    let mut scope = TekMso::with_transport(ScriptedScope::new(2));
    scope.transport_mut().trigger_default = "ARMED".to_owned();

    let mut options = fast_options();
    options.ready = ReadyPolicy{ interval: Duration::from_millis(1), timeout: Some(Duration::from_millis(20)) };

    match run(&mut scope, 2, options) {
        Err(AcquisitionError::ReadyTimeout(t)) => assert_eq!(t, Duration::from_millis(20)),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("session should not finish"),
    }
    assert_eq!(scope.transport().count("*ESR?"), 0);
}

#[test]
fn count_not_multiple_of_fastframe_aborts_before_touching_anything() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("run1");
    let mut scope = TekMso::with_transport(ScriptedScope::new(4));
    let mut operator = ScriptedOperator::new(&[true, true, true]);

    match prepare_session(&mut scope, &mut operator, "E:/Traces/run1", &local, 10) {
        Err(AcquisitionError::CountNotMultiple{ count, frames }) => assert_eq!((count, frames), (10, 4)),
        other => panic!("unexpected result {:?}", other.map(|p| p.setup_path)),
    }
    assert_eq!(scope.transport().log, vec![":HORizontal:FASTframe:MAXFRames?"]);
    assert!(!local.exists());
    assert!(operator.prompts.is_empty());
}

#[test]
fn populated_scope_folder_needs_consent() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("run1");
    let mut scope = TekMso::with_transport(ScriptedScope::new(4));
    scope.transport_mut().ldir = "\"setup.set\",\"Tek000.wfm\"".to_owned();
    let mut operator = ScriptedOperator::new(&[false]);

    let res = prepare_session(&mut scope, &mut operator, "E:/Traces/run1", &local, 8);
    assert!(matches!(res, Err(AcquisitionError::Declined(_))));
    assert_eq!(operator.prompts.len(), 1);
    assert!(operator.prompts[0].contains("E:/Traces/run1"));

    assert_eq!(scope.transport().writes(), vec![
        ":FILESystem:MKDir \"E:/Traces/run1\"",
        ":FILESystem:CWD \"E:/Traces/run1\"",
    ]);
    assert!(!local.exists());
}

#[test]
fn populated_local_folder_needs_consent() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("run1");
    fs::create_dir(&local).unwrap();
    fs::write(local.join("old.txt"), b"x").unwrap();

    let mut scope = TekMso::with_transport(ScriptedScope::new(4));
    let mut operator = ScriptedOperator::new(&[false]);

    let res = prepare_session(&mut scope, &mut operator, "E:/Traces/run1", &local, 8);
    assert!(matches!(res, Err(AcquisitionError::Declined(_))));
    assert_eq!(scope.transport().writes().len(), 2);
    assert_eq!(fs::read_dir(&local).unwrap().count(), 1);
}

#[test]
fn declining_to_start_leaves_no_setup_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut scope = TekMso::with_transport(ScriptedScope::new(4));
    let mut operator = ScriptedOperator::new(&[false]);

    let res = prepare_session(&mut scope, &mut operator, "E:/Traces/run1", &dir.path().join("run1"), 8);
    assert!(matches!(res, Err(AcquisitionError::Declined(_))));
    assert!(operator.prompts[0].contains("Sample rate is 6250000000"));
    assert!(operator.prompts[0].contains("record length 10000"));
    assert_eq!(scope.transport().argument_of(":SAVe:SETUp"), None);
}

#[test]
fn setup_snapshot_lands_next_to_the_waveforms() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("run1");
    let mut scope = TekMso::with_transport(ScriptedScope::new(4));
    let mut operator = ScriptedOperator::new(&[true]);

    let prepared = prepare_session(&mut scope, &mut operator, "E:/Traces/run1", &local, 8).unwrap();
    assert_eq!(prepared.session.frames_per_trigger(), 4);
    assert_eq!(prepared.scope_dir, "E:/Traces/run1");
    assert_eq!(prepared.setup_path, "E:/Traces/run1/setup.set");
    assert!(local.is_dir());

    let dest = scope.transport().argument_of(":SAVEON:FILE:DEST").unwrap();
    let setup = scope.transport().argument_of(":SAVe:SETUp").unwrap();
    assert_eq!(format!("{}/setup.set", dest), setup);

    // The snapshot is taken after the scope is configured for the session
    let writes = scope.transport().writes();
    assert_eq!(writes[2..], [
        ":HEADer 0",
        "*ESE 1",
        "*CLS",
        ":SAVEON:FILE:DEST \"E:/Traces/run1\"",
        ":SAVe:SETUp \"E:/Traces/run1/setup.set\"",
    ]);
}

#[test]
fn full_session_writes_both_log_files() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("run1");
    let mut scope = TekMso::with_transport(ScriptedScope::new(2));
    scope.transport_mut().esr_replies.extend(std::iter::repeat("0".to_owned()).take(40));
    let mut operator = ScriptedOperator::new(&[true]);

    let prepared = prepare_session(&mut scope, &mut operator, "E:/Traces/run1", &local, 4).unwrap();
    let sinks = LogSinks::create(&prepared.local_dir, "20240309-1405_07").unwrap();
    let mut dut = ScriptedDut::default();

    let summary = AcquisitionController::new(&mut scope, &mut dut, sinks, prepared.session, fast_options()).run().unwrap();
    assert_eq!(summary.completed, 4);
    assert_eq!(summary.records_written, 6);

    let (full, case_only) = frames(1..=6);
    assert_eq!(fs::read(local.join("fullLog-20240309-1405_07.txt")).unwrap(), full);
    assert_eq!(fs::read(local.join("caseOnlyLog-20240309-1405_07.txt")).unwrap(), case_only);
}

#[test]
fn rooted_scope_folder_is_checked_where_the_waveforms_go() {
    let dir = tempfile::tempdir().unwrap();
    let mut scope = TekMso::with_transport(ScriptedScope::new(4));
    let mut operator = ScriptedOperator::new(&[true]);

    let prepared = prepare_session(&mut scope, &mut operator, "/Traces/run1/", &dir.path().join("run1"), 8).unwrap();
    let resolved = "C:/Users/Public/Tektronix/TekScope/SaveOn/Traces/run1";
    assert_eq!(prepared.scope_dir, resolved);
    assert_eq!(prepared.setup_path, format!("{}/setup.set", resolved));

    let t = scope.transport();
    assert_eq!(t.argument_of(":FILESystem:MKDir").unwrap(), resolved);
    assert_eq!(t.argument_of(":FILESystem:CWD").unwrap(), resolved);
    assert_eq!(t.argument_of(":SAVEON:FILE:DEST").unwrap(), resolved);
}
