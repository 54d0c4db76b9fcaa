use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hashbox_harness::{CancellationSignal, ErrorKind, Harness, HarnessConfig};

const ECHO: &str = include_str!("../testdata/echo.wat");

fn module(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).unwrap()
}

fn harness() -> Harness {
    Harness::new(HarnessConfig::default()).unwrap()
}

fn run(module_bytes: &[u8], input: &[u8]) -> hashbox_harness::Result<Vec<u8>> {
    harness().execute(module_bytes, input, &CancellationSignal::new())
}

#[test]
fn echo_returns_input() {
    let echo = module(ECHO);
    assert_eq!(run(&echo, b"ping").unwrap(), b"ping");
}

#[test]
fn echo_empty_input() {
    let echo = module(ECHO);
    assert_eq!(run(&echo, b"").unwrap(), b"");
}

#[test]
fn echo_input_that_forces_memory_growth() {
    let echo = module(ECHO);
    let input: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(run(&echo, &input).unwrap(), input);
}

#[test]
fn same_call_gives_same_output() {
    let harness = harness();
    let echo = module(ECHO);
    let signal = CancellationSignal::new();
    let first = harness.execute(&echo, b"stable", &signal).unwrap();
    let second = harness.execute(&echo, b"stable", &signal).unwrap();
    assert_eq!(first, second);
}

#[test]
fn constant_output_from_data_segment() {
    let greeter = module(
        r#"(module
            (memory (export "memory") 1)
            (data (i32.const 16) "\05\00\00\00hello")
            (func (export "run") (param i32 i32) (result i32) i32.const 16))"#,
    );
    assert_eq!(run(&greeter, b"ignored").unwrap(), b"hello");
}

#[test]
fn missing_entry_point_is_contract_violation() {
    let no_run = module(r#"(module (memory (export "memory") 1))"#);
    let err = run(&no_run, b"input").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
    assert!(err.to_string().contains("run"));
}

#[test]
fn missing_memory_is_contract_violation() {
    let no_memory = module(
        r#"(module (func (export "run") (param i32 i32) (result i32) i32.const 0))"#,
    );
    let err = run(&no_memory, b"input").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
}

#[test]
fn wrong_signature_is_contract_violation() {
    let wrong = module(
        r#"(module
            (memory (export "memory") 1)
            (func (export "run") (param i64) (result i32) i32.const 0))"#,
    );
    let err = run(&wrong, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
}

#[test]
fn run_exported_as_non_function_is_contract_violation() {
    let not_a_func = module(
        r#"(module
            (memory (export "memory") 1)
            (global (export "run") i32 (i32.const 0)))"#,
    );
    let err = run(&not_a_func, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
}

// Memory is pinned at one page, so placing any input at INPUT_OFFSET would
// have to grow it and fail with ResourceExhausted. Getting ContractViolation
// instead shows validation rejected the module before input placement.
#[test]
fn contract_violation_happens_before_input_is_placed() {
    let no_run = module(
        r#"(module
            (memory (export "memory") 1 1)
            (data (i32.const 0) "\05\00\00\00hello"))"#,
    );
    let err = run(&no_run, b"input").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContractViolation);

    let mistyped = module(
        r#"(module
            (memory (export "memory") 1 1)
            (data (i32.const 0) "\05\00\00\00hello")
            (func (export "run") (param i32) (result i32) i32.const 0))"#,
    );
    let err = run(&mistyped, b"input").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
}

#[test]
fn unreachable_is_trap() {
    let trapping = module(
        r#"(module
            (memory (export "memory") 1)
            (func (export "run") (param i32 i32) (result i32) unreachable))"#,
    );
    let err = run(&trapping, b"input").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Trap);
}

#[test]
fn division_by_zero_is_trap() {
    let dividing = module(
        r#"(module
            (memory (export "memory") 1)
            (func (export "run") (param i32 i32) (result i32)
                (i32.div_u (i32.const 1) (local.get 1))))"#,
    );
    let err = run(&dividing, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Trap);
}

#[test]
fn memory_at_its_maximum_is_resource_exhausted() {
    let capped = module(
        r#"(module
            (memory (export "memory") 1 1)
            (func (export "run") (param i32 i32) (result i32) i32.const 0))"#,
    );
    let err = run(&capped, b"x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

    // Empty input needs no growth and still runs.
    assert_eq!(run(&capped, b"").unwrap(), b"");
}

#[test]
fn output_pointer_outside_memory_is_bounds_violation() {
    let wild = module(
        r#"(module
            (memory (export "memory") 1)
            (func (export "run") (param i32 i32) (result i32) i32.const -1))"#,
    );
    let err = run(&wild, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BoundsViolation);
}

#[test]
fn output_length_past_memory_is_bounds_violation() {
    let liar = module(
        r#"(module
            (memory (export "memory") 1)
            (func (export "run") (param i32 i32) (result i32)
                (i32.store (i32.const 0) (i32.const 0x7fffffff))
                (i32.const 0)))"#,
    );
    let err = run(&liar, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BoundsViolation);
}

#[test]
fn imports_are_rejected_at_instantiation() {
    let importing = module(
        r#"(module
            (import "env" "log" (func $log (param i32)))
            (memory (export "memory") 1)
            (func (export "run") (param i32 i32) (result i32) i32.const 0))"#,
    );
    let err = run(&importing, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Instantiation);
}

#[test]
fn trapping_start_function_is_instantiation_error() {
    let bad_start = module(
        r#"(module
            (func $start unreachable)
            (start $start)
            (memory (export "memory") 1)
            (func (export "run") (param i32 i32) (result i32) i32.const 0))"#,
    );
    let err = run(&bad_start, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Instantiation);
}

const SPIN: &str = r#"(module
    (memory (export "memory") 1)
    (func (export "run") (param i32 i32) (result i32)
        (loop $forever (br $forever))
        (i32.const 0)))"#;

#[test]
fn cancel_interrupts_running_module() {
    let harness = harness();
    let spin = module(SPIN);
    let signal = CancellationSignal::new();

    let canceller = {
        let signal = signal.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            signal.cancel();
        })
    };

    let err = harness.execute(&spin, b"", &signal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    canceller.join().unwrap();
}

#[test]
fn deadline_interrupts_running_module() {
    let harness = harness();
    let spin = module(SPIN);
    let started = Instant::now();
    let signal = CancellationSignal::with_timeout(Duration::from_millis(50));

    let err = harness.execute(&spin, b"", &signal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn deadline_interrupts_spinning_start_function() {
    let spinning_start = module(
        r#"(module
            (func $start (loop $forever (br $forever)))
            (start $start)
            (memory (export "memory") 1)
            (func (export "run") (param i32 i32) (result i32) i32.const 0))"#,
    );
    let signal = CancellationSignal::with_timeout(Duration::from_millis(50));
    let err = harness()
        .execute(&spinning_start, b"", &signal)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn cancelling_one_call_leaves_others_alone() {
    let harness = Arc::new(harness());
    let spin = module(SPIN);
    let echo = module(ECHO);

    let signal = CancellationSignal::new();
    let spinner = {
        let harness = Arc::clone(&harness);
        let signal = signal.clone();
        thread::spawn(move || harness.execute(&spin, b"", &signal))
    };

    let output = harness
        .execute(&echo, b"unaffected", &CancellationSignal::new())
        .unwrap();
    assert_eq!(output, b"unaffected");

    signal.cancel();
    let err = spinner.join().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn no_state_survives_between_calls() {
    // Bumps a counter in a global and one in memory; fresh sandboxes always
    // report 1 for both.
    let counter = module(
        r#"(module
            (memory (export "memory") 1)
            (global $calls (mut i32) (i32.const 0))
            (func (export "run") (param i32 i32) (result i32)
                (global.set $calls (i32.add (global.get $calls) (i32.const 1)))
                (i32.store (i32.const 8) (i32.add (i32.load (i32.const 8)) (i32.const 1)))
                (i32.store (i32.const 0) (i32.const 8))
                (i32.store (i32.const 4) (global.get $calls))
                (i32.const 0)))"#,
    );
    let harness = harness();
    let signal = CancellationSignal::new();
    for _ in 0..3 {
        let output = harness.execute(&counter, b"", &signal).unwrap();
        assert_eq!(output, [1, 0, 0, 0, 1, 0, 0, 0]);
    }
}

#[test]
fn trap_does_not_affect_next_call() {
    let harness = harness();
    let signal = CancellationSignal::new();
    let trapping = module(
        r#"(module
            (memory (export "memory") 1)
            (func (export "run") (param i32 i32) (result i32) unreachable))"#,
    );
    let echo = module(ECHO);

    assert!(harness.execute(&trapping, b"x", &signal).is_err());
    assert_eq!(harness.execute(&echo, b"after", &signal).unwrap(), b"after");
}

#[test]
fn concurrent_calls_are_independent() {
    let harness = Arc::new(harness());
    let echo = Arc::new(module(ECHO));

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let harness = Arc::clone(&harness);
            let echo = Arc::clone(&echo);
            thread::spawn(move || {
                let input = vec![i; 70_000 + i as usize * 1000];
                let output = harness
                    .execute(&echo, &input, &CancellationSignal::new())
                    .unwrap();
                assert_eq!(output, input);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
