//! Integration tests for `Scheduler`'s iteration lifecycle, driven entirely
//! through `ScriptedChild`/`DummySpec` in-process test doubles (a real
//! instrumented target binary is out of scope here, same as in the unit
//! tests inside `scheduler.rs`).

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use edgefuzz_core::config::FuzzerConfig;
use edgefuzz_core::engine::NoopTracer;
use edgefuzz_core::events::Event;
use edgefuzz_core::lifter::NullLifter;
use edgefuzz_core::runner::execution::Outcome;
use edgefuzz_core::runner::reprl::StatusWord;
use edgefuzz_core::runner::transport::{ChildProcessSpec, DummySpec, ScriptedResponse};
use edgefuzz_core::Scheduler;

fn scripted_spec(outcomes: Vec<Outcome>) -> Box<dyn ChildProcessSpec> {
    let responses: Vec<ScriptedResponse> = outcomes
        .into_iter()
        .map(|outcome| ScriptedResponse {
            status_word: StatusWord::encode(outcome, false),
            stdout: String::new(),
            stderr: String::new(),
            delay: Duration::ZERO,
        })
        .collect();
    let responses = Rc::new(responses);
    Box::new(DummySpec { responses_factory: Rc::new(move || (*responses).clone()) })
}

fn event_tag(event: &Event) -> &'static str {
    match event {
        Event::Initialized => "Initialized",
        Event::Shutdown { .. } => "Shutdown",
        Event::ShutdownComplete => "ShutdownComplete",
        Event::PreExecute { .. } => "PreExecute",
        Event::PostExecute { .. } => "PostExecute",
        Event::ProgramGenerated { .. } => "ProgramGenerated",
        Event::ValidProgramFound => "ValidProgramFound",
        Event::InvalidProgramFound => "InvalidProgramFound",
        Event::TimeOutFound => "TimeOutFound",
        Event::InterestingProgramFound { .. } => "InterestingProgramFound",
        Event::CrashFound { .. } => "CrashFound",
        Event::Log { .. } => "Log",
    }
}

#[test]
fn pre_execute_always_precedes_post_execute_within_an_iteration() {
    // Enough successful responses to survive every re-execution a
    // determinism check and coverage-preserving minimization might trigger.
    let outcomes = std::iter::repeat(Outcome::Succeeded).take(2_000).collect();
    let mut scheduler = Scheduler::new(FuzzerConfig::default(), scripted_spec(outcomes), Box::new(NullLifter), 64, 1);

    let log = Rc::new(RefCell::new(Vec::new()));
    let log2 = log.clone();
    scheduler.subscribe(move |event| log2.borrow_mut().push(event_tag(event)));

    let mut tracer = NoopTracer;
    for _ in 0..5 {
        scheduler.run_iteration(&mut tracer).unwrap();
    }

    let tags = log.borrow();
    let mut last_pre: Option<usize> = None;
    for (i, tag) in tags.iter().enumerate() {
        match *tag {
            "PreExecute" => last_pre = Some(i),
            "PostExecute" => {
                assert!(last_pre.is_some(), "PostExecute with no preceding PreExecute");
                assert!(last_pre.unwrap() < i);
                last_pre = None;
            }
            _ => {}
        }
    }
    assert!(tags.contains(&"PreExecute"));
    assert!(tags.contains(&"PostExecute"));
}

#[test]
fn shutdown_emits_shutdown_then_shutdown_complete_and_stops_iteration() {
    let mut scheduler =
        Scheduler::new(FuzzerConfig::default(), scripted_spec(vec![Outcome::Succeeded; 10]), Box::new(NullLifter), 64, 2);

    let log = Rc::new(RefCell::new(Vec::new()));
    let log2 = log.clone();
    scheduler.subscribe(move |event| log2.borrow_mut().push(event_tag(event)));

    scheduler.shutdown("all done");
    assert!(scheduler.is_shutdown());

    let before = log.borrow().clone();
    assert_eq!(before.last(), Some(&"ShutdownComplete"));
    assert_eq!(before[before.len() - 2], "Shutdown");

    let mut tracer = NoopTracer;
    scheduler.run_iteration(&mut tracer).unwrap();
    assert_eq!(log.borrow().len(), before.len(), "no events after shutdown, even if run_iteration is called again");
}

#[test]
fn a_crash_response_produces_exactly_one_crash_found_event() {
    // Every respawn the crash pipeline triggers (minimization trials,
    // determinism re-checks) should keep seeing a crash, since the whole
    // scripted response list is all crashes.
    let outcomes = std::iter::repeat(Outcome::Crashed { signal: 11 }).take(2_000).collect();
    let mut scheduler = Scheduler::new(FuzzerConfig::default(), scripted_spec(outcomes), Box::new(NullLifter), 64, 3);

    let crash_events = Rc::new(RefCell::new(0));
    let crash_events2 = crash_events.clone();
    scheduler.subscribe(move |event| {
        if matches!(event, Event::CrashFound { .. }) {
            *crash_events2.borrow_mut() += 1;
        }
    });

    let mut tracer = NoopTracer;
    scheduler.run_iteration(&mut tracer).unwrap();
    assert_eq!(*crash_events.borrow(), 1);
}

#[test]
fn failed_and_timed_out_outcomes_report_without_growing_the_corpus() {
    let outcomes = vec![Outcome::Failed(1), Outcome::TimedOut, Outcome::Failed(2)];
    let mut scheduler = Scheduler::new(FuzzerConfig::default(), scripted_spec(outcomes), Box::new(NullLifter), 64, 4);

    let log = Rc::new(RefCell::new(Vec::new()));
    let log2 = log.clone();
    scheduler.subscribe(move |event| log2.borrow_mut().push(event_tag(event)));

    let mut tracer = NoopTracer;
    for _ in 0..3 {
        scheduler.run_iteration(&mut tracer).unwrap();
    }

    assert_eq!(scheduler.corpus().size(), 0);
    assert!(log.borrow().contains(&"InvalidProgramFound"));
    assert!(log.borrow().contains(&"TimeOutFound"));
}
