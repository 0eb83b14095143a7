/// Tests for throws and fault recovery.
///
/// A throw unwinds to the nearest independent caller, rolls the heap back to that caller's
/// checkpoint and hands it the thrown bytes. The heap access log shows exactly which roots were
/// loaded and how each checkpoint was resolved.
mod common;

use common::{method_area, run, word};
use txvm::{Controller, EngineLimits, ErrorCode, Identifier, MemoryModule};

#[test]
fn nonexistent_app() {
    let mut code = method_area(&[(0x11, &[(0, "pushC64 443 invokeDispatcher ret0")])]);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 0x11, &[]);
    assert!(outcome.output.is_empty());
    assert_eq!(outcome.error, ErrorCode::InvalidReference);
    assert_eq!(heap.access_log(), "root<-11   Save   root<-1bb   Restore");
}

#[test]
fn catch_nonexistent_app_error() {
    let mut code = method_area(&[(0x11, &[(0, "pushC64 443 indInvokeDispatcher pushC64 7 ret64")])]);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 0x11, &[]);
    assert_eq!(outcome.output, word(7));
    assert_eq!(outcome.error, ErrorCode::NoError);
    assert_eq!(
        heap.access_log(),
        "root<-11   Save   root<-1bb   Save   Restore   root<-11   Discard"
    );
}

#[test]
fn simple_throw() {
    let mut code = method_area(&[(17, &[(0, "pushC64 566265685016576 throw")])]);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 17, &[]);
    assert_eq!(outcome.output, vec![0x4, 0x3, 0x2, 0x0]);
    assert_eq!(outcome.error, ErrorCode::SoftwareError);
}

#[test]
fn failed_throw() {
    let mut code = method_area(&[(
        0x11,
        &[
            (0, "pushC64 5 pushC64 0x12 invokeInternal ret64"),
            (0x12, "pushC64 0x0700000000000000 throw"),
        ],
    )]);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 0x11, &[]);
    assert!(outcome.output.is_empty());
    assert_eq!(outcome.error, ErrorCode::InvalidReference);
    assert_eq!(heap.access_log(), "root<-11   Save   root<-11   Restore");
}

#[test]
fn catch_failed_throw() {
    let mut code = method_area(&[(
        0x11,
        &[
            (0, "pushC64 5 pushC64 0x12 indInvokeInternal ret64"),
            (0x12, "pushC64 0x0700000000000000 throw"),
        ],
    )]);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 0x11, &[]);
    assert_eq!(outcome.output, word(5));
    assert_eq!(outcome.error, ErrorCode::NoError);
    assert_eq!(
        heap.access_log(),
        "root<-11   Save   root<-11   Save   Restore   root<-11   Discard"
    );
}

#[test]
fn multiple_throw() {
    let mut code = method_area(&[(
        17,
        &[
            (0, "pushC64 1 invokeInternal pushC64 1 iAdd ret64"),
            (1, "pushC64 2 invokeInternal pushC64 2 iAdd ret64"),
            (2, "pushC64 3 invokeInternal pushC64 3 iAdd ret64"),
            (3, "pushC64 566265685016576 throw iAdd"),
        ],
    )]);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 17, &[]);
    assert_eq!(outcome.output, vec![0x4, 0x3, 0x2, 0x0]);
    assert_eq!(outcome.error, ErrorCode::SoftwareError);
}

const CHAIN: [(u64, &[(u64, &str)]); 3] = [
    (0x12, &[(0, "pushC64 0x13 invokeDispatcher pushC64 20 iAdd ret64")]),
    (0x13, &[(0, "pushC64 0x14 invokeDispatcher pushC64 30 iAdd ret64")]),
    (0x14, &[(0, "pushC64 0x0006000000000001 throw ret0")]),
];

#[test]
fn multiple_external_throw() {
    let entry: &[(u64, &str)] = &[(0, "pushC64 6 pushC64 0x12 invokeDispatcher iAdd ret64")];
    let mut apps = vec![(0x11, entry)];
    apps.extend(CHAIN);
    let mut code = method_area(&apps);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 0x11, &[]);
    assert_eq!(outcome.output, vec![0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x6, 0x0]);
    assert_eq!(outcome.error, ErrorCode::SoftwareError);
    assert_eq!(heap.access_log(), "root<-11   Save   root<-12   root<-13   root<-14   Restore");
}

#[test]
fn multi_throw_and_catch() {
    let entry: &[(u64, &str)] = &[(0, "pushC64 6 pushC64 0x12 indInvokeDispatcher iAdd ret64")];
    let mut apps = vec![(0x11, entry)];
    apps.extend(CHAIN);
    let mut code = method_area(&apps);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 0x11, &[]);
    assert_eq!(outcome.output, vec![0x7, 0x0, 0x0, 0x0, 0x0, 0x0, 0x6, 0x0]);
    assert_eq!(outcome.error, ErrorCode::NoError);
    assert_eq!(
        heap.access_log(),
        "root<-11   Save   root<-12   Save   root<-13   root<-14   Restore   root<-11   Discard"
    );
}

#[test]
fn thrown_bytes_land_on_the_catching_frame() {
    let mut code = method_area(&[(
        0x11,
        &[
            (0, "pushC64 9 pushC64 0x12 indInvokeInternal ret64"),
            (0x12, "pushC64 1 pushC64 2 pushC64 0x0006000000000003 throw"),
        ],
    )]);
    let mut heap = MemoryModule::new();
    let mut session =
        Controller::setup_session(EngineLimits::new(), Identifier::from_u64(0x11), vec![], &mut code, &mut heap).unwrap();

    // pushC64, pushC64, indInvokeInternal, then the callee's three pushes
    for _ in 0..6 {
        assert!(!session.emulate_next_instruction());
    }
    assert_eq!(session.processor().lane_depth(), 2);

    assert!(!session.emulate_next_instruction());
    assert_eq!(session.processor().lane_depth(), 1);
    assert_eq!(session.status(), ErrorCode::SoftwareError);
    let caller = session.processor().current().unwrap();
    assert_eq!(caller.operand_stack(), [word(9), word(0x0006_0000_0000_0003)].concat());

    let outcome = session.emulate();
    assert_eq!(outcome.output, word(0x0006_0000_0000_0003));
    assert_eq!(outcome.error, ErrorCode::NoError);
}

#[test]
fn throw_with_short_length_prefix_is_invalid_reference() {
    let mut code = method_area(&[(17, &[(0, "throw")])]);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 17, &[]);
    assert!(outcome.output.is_empty());
    assert_eq!(outcome.error, ErrorCode::InvalidReference);
}

#[test]
fn throw_skips_non_independent_frames_between() {
    let mut code = method_area(&[(
        17,
        &[
            (0, "pushC64 1 indInvokeInternal pushC64 100 iAdd ret64"),
            (1, "pushC64 2 invokeInternal pushC64 1000 iAdd ret64"),
            (2, "pushC64 3 invokeInternal pushC64 1000 iAdd ret64"),
            (3, "pushC64 0x0006000000000000 throw"),
        ],
    )]);
    let mut heap = MemoryModule::new();
    let outcome = run(&mut code, &mut heap, 17, &[]);
    assert_eq!(outcome.output, word(0x0006_0000_0000_0064));
    assert_eq!(outcome.error, ErrorCode::NoError);
    assert_eq!(heap.checkpoint_depth(), 0);
}
