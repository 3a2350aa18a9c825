//! Function, action, worker, global and memory bindings against live
//! instances.

mod common;

use common::*;
use guestbridge_core::guest_enum;
use guestbridge_core::types::GuestPtr;
use guestbridge_core::value::WasmValue;
use guestbridge_runtime::binding::{BindingPhase, CallOutcome, FrameCopy, MemoryView};
use guestbridge_runtime::config::BridgeConfig;
use guestbridge_runtime::lifecycle::ModuleSlot;
use std::sync::Arc;

guest_enum! {
    #[derive(Debug, PartialEq)]
    enum Mood: u8 {
        Calm = 1,
        Loud = 200,
    }
}

guest_enum! {
    #[derive(Debug, PartialEq)]
    enum Offset: i16 {
        Back = -2,
        Forward = 3,
    }
}

#[tokio::test]
async fn missing_export_is_not_callable() {
    let slot = loaded(CORE_WAT).await;
    let missing = slot.function::<(i32,), i32>("does_not_exist");

    assert!(!missing.is_found());
    let outcome = missing.call((1,));
    assert_eq!(outcome.error().map(|e| e.code()), Some("E201"));
    assert_eq!(outcome.into_value_or_default(), 0);
    assert!(matches!(missing.phase(), BindingPhase::NotCallable { generation: 1, .. }));
}

#[tokio::test]
async fn signature_must_match_exactly() {
    let slot = loaded(CORE_WAT).await;
    let wrong = slot.function::<(i64, i64), i64>("add");

    let outcome = wrong.call((2, 3));
    assert!(matches!(outcome, CallOutcome::Unavailable(_)));
    let err = outcome.error().unwrap();
    assert_eq!(err.code(), "E202");
    assert!(err.to_string().contains("(i32, i32) -> i32"));
}

#[tokio::test]
async fn trap_yields_default_and_instance_survives() {
    let slot = loaded(CORE_WAT).await;
    let boom = slot.action::<()>("boom");
    let add = slot.function::<(i32, i32), i32>("add");

    let outcome = boom.call(());
    assert!(matches!(outcome, CallOutcome::Trapped(_)));
    assert_eq!(outcome.error().map(|e| e.code()), Some("E401"));

    assert_eq!(add.call((20, 22)).value(), Some(42));
}

#[tokio::test]
async fn runaway_call_runs_out_of_fuel() {
    let runtime = runtime_with(BridgeConfig::testing().with_call_budget(10_000));
    let slot = loaded_with(runtime, CORE_WAT).await;
    let spin = slot.action::<()>("spin");

    let outcome = spin.call(());
    assert_eq!(outcome.error().map(|e| e.code()), Some("E403"));

    let add = slot.function::<(i32, i32), i32>("add");
    assert_eq!(add.call((1, 2)).value(), Some(3));
}

#[tokio::test]
async fn each_call_gets_a_fresh_budget() {
    let runtime = runtime_with(BridgeConfig::testing().with_call_budget(50_000));
    let slot = loaded_with(runtime, CORE_WAT).await;
    let fuel = slot.function::<(), i64>("fuel");

    let first = fuel.call(()).value().unwrap();
    let second = fuel.call(()).value().unwrap();
    assert!(first > 0 && first <= 50_000);
    assert_eq!(first, second);
}

#[tokio::test]
async fn abort_poisons_the_instance_until_reload() {
    let slot = loaded(CORE_WAT).await;
    let bail = slot.action::<(i32,)>("bail");
    let add = slot.function::<(i32, i32), i32>("add");

    assert!(matches!(bail.call((42,)), CallOutcome::Aborted { code: 42 }));
    assert!(slot.current().unwrap().is_poisoned());

    let outcome = add.call((1, 2));
    assert_eq!(outcome.error().map(|e| e.code()), Some("E404"));

    slot.load("main").await.unwrap();
    assert_eq!(add.call((1, 2)).value(), Some(3));
}

#[tokio::test]
async fn narrow_arguments_are_widened_per_slot() {
    let slot = loaded(CORE_WAT).await;

    let echo = slot.function::<(Mood,), i32>("echo");
    assert_eq!(echo.call((Mood::Loud,)).value(), Some(200));
    assert_eq!(echo.call((Mood::Calm,)).value(), Some(1));

    let echo = slot.function::<(Offset,), i32>("echo");
    assert_eq!(echo.call((Offset::Back,)).value(), Some(-2));
    assert_eq!(echo.call((Offset::Forward,)).value(), Some(3));

    let echo = slot.function::<(u8,), i32>("echo");
    assert_eq!(echo.call((255u8,)).value(), Some(255));

    let echo64 = slot.function::<(i64,), i64>("echo64");
    assert_eq!(echo64.call((-7,)).value(), Some(-7));
}

#[tokio::test]
async fn pointers_pass_as_i32() {
    let slot = loaded(CORE_WAT).await;
    let echo = slot.function::<(GuestPtr,), GuestPtr>("echo");
    assert_eq!(echo.call((GuestPtr::new(0x40),)).value(), Some(GuestPtr::new(0x40)));
}

#[tokio::test]
async fn strings_without_abi_pass_the_sentinel() {
    let slot = loaded(CORE_WAT).await;
    assert!(!slot.current().unwrap().has_abi());

    let echo = slot.function::<(String,), i32>("echo");
    assert_eq!(echo.call(("hello".to_string(),)).value(), Some(-1));
}

#[tokio::test]
async fn worker_ticks_until_it_traps() {
    let slot = loaded(WORKER_WAT).await;
    let worker = slot.register_worker(None);
    let ticks = slot.global::<i32>("ticks");
    let fail_at = slot.global::<i32>("fail_at");

    assert!(worker.is_found());
    assert!(fail_at.set(3));

    let report = slot.process_pending();
    assert_eq!(report.ticked, 1);
    slot.process_pending();
    assert_eq!(ticks.get(), 2);

    let report = slot.process_pending();
    assert_eq!(report.faulted, 1);
    assert!(!worker.is_enabled());

    let report = slot.process_pending();
    assert_eq!(report.disabled, 1);
    assert_eq!(ticks.get(), 3);
    assert_eq!(worker.completed_ticks(), 2);

    worker.enable();
    assert!(worker.tick().unwrap().is_returned());
    assert_eq!(ticks.get(), 4);
}

#[tokio::test]
async fn worker_without_instance_stays_enabled() {
    let slot = ModuleSlot::builder("idle", runtime(), source(&[])).build();
    let worker = slot.register_worker(Some("worker"));

    let report = slot.process_pending();
    assert_eq!(report.unavailable, 1);
    assert!(worker.is_enabled());
}

#[tokio::test]
async fn globals_honor_mutability() {
    let slot = loaded(CORE_WAT).await;

    let counter = slot.global::<i32>("counter");
    assert!(counter.is_mutable());
    assert!(counter.set(41));
    slot.action::<()>("bump").call(());
    assert_eq!(counter.get(), 42);

    let limit = slot.global::<i32>("limit");
    assert!(!limit.is_mutable());
    assert!(!limit.set(99));
    assert_eq!(limit.get(), 10);

    let scale = slot.global::<f64>("scale");
    assert_eq!(scale.get(), 1.5);

    let wrong_kind = slot.global::<i64>("counter");
    assert!(!wrong_kind.is_found());
    assert_eq!(wrong_kind.get(), 0);

    let missing = slot.global::<i32>("nope");
    assert_eq!(missing.try_get().unwrap_err().code(), "E201");
    assert_eq!(missing.get(), 0);
}

#[tokio::test]
async fn memory_binding_reports_sizes() {
    let slot = loaded(CORE_WAT).await;
    let memory = slot.memory("memory");

    assert!(memory.is_found());
    assert_eq!(memory.len(), 65_536);
    assert_eq!(memory.minimum_bytes(), 65_536);
    assert_eq!(memory.maximum_bytes(), 0);

    let bounded = loaded(TWO_PAGES_WAT).await;
    let memory = bounded.memory("memory");
    assert_eq!(memory.maximum_bytes(), 131_072);

    assert!(!slot.memory("other").is_found());
}

#[tokio::test]
async fn memory_reads_recheck_length_after_reload() {
    let source = source(&[("big", TWO_PAGES_WAT), ("small", ONE_PAGE_WAT)]);
    let slot = ModuleSlot::builder("mem", runtime(), source).build();
    slot.load("big").await.unwrap();

    let memory = slot.memory("memory");
    let at = GuestPtr::new(70_000);
    assert!(memory.write::<u32>(at, 0xDEAD_BEEF));
    assert_eq!(memory.read::<u32>(at), 0xDEAD_BEEF);

    slot.load("small").await.unwrap();
    assert_eq!(memory.len(), 65_536);
    assert_eq!(memory.read::<u32>(at), 0);
    assert!(!memory.write::<u32>(at, 1));

    let edge = GuestPtr::new(65_534);
    assert_eq!(memory.read_bytes(edge, 4).unwrap_err().code(), "E303");
}

#[tokio::test]
async fn views_and_frames() {
    let slot = loaded(CORE_WAT).await;
    let memory = slot.memory("memory");

    let mut view = MemoryView::<f32>::new(Arc::clone(&memory), GuestPtr::new(256));
    assert!(view.write(2.5));
    assert_eq!(view.read(), 2.5);
    view.set_address(GuestPtr::new(65_535));
    assert_eq!(view.read(), 0.0);
    assert!(!view.write(1.0));

    let pixels: Vec<u8> = (0..16).collect();
    memory.write_bytes(GuestPtr::new(1024), &pixels).unwrap();
    let frame = FrameCopy::new(Arc::clone(&memory), GuestPtr::new(1024), 2, 2, 4);
    assert_eq!(frame.capture(), Some(pixels));

    let too_big = FrameCopy::new(memory, GuestPtr::new(65_000), 64, 64, 4);
    assert_eq!(too_big.capture(), None);
}

#[tokio::test]
async fn bind_all_builds_dynamic_bindings() {
    let slot = loaded(CORE_WAT).await;
    let bound = slot.bind_all().unwrap();

    let add = bound.function("add").unwrap();
    assert!(!add.is_action());
    assert_eq!(add.signature().to_string(), "(i32, i32) -> i32");
    let outcome = add.invoke(&[WasmValue::I32(2), WasmValue::I32(3)]);
    assert_eq!(outcome.value(), Some(Some(WasmValue::I32(5))));

    let rejected = add.invoke(&[WasmValue::I32(2)]);
    assert!(matches!(rejected, CallOutcome::Rejected(_)));

    let bump = bound.function("bump").unwrap();
    assert!(bump.is_action());
    assert_eq!(bump.invoke(&[]).value(), Some(None));

    let counter = bound.global("counter").unwrap();
    assert_eq!(counter.get(), WasmValue::I32(1));
    assert!(counter.set(WasmValue::I32(5)));
    assert!(!counter.set(WasmValue::F32(5.0)));

    assert_eq!(bound.memory("memory").unwrap().len(), 65_536);
    assert!(bound.skipped.is_empty());
}
