//! Shared fixtures for runtime integration tests.

#![allow(dead_code)]

use guestbridge_runtime::config::BridgeConfig;
use guestbridge_runtime::lifecycle::{BinarySource, FetchFuture, MemorySource, ModuleSlot};
use guestbridge_runtime::runtime::BridgeRuntime;
use std::sync::Arc;
use std::time::Duration;

/// Arithmetic, faults and host imports.
pub const CORE_WAT: &str = r#"
(module
  (import "env" "curtime" (func $curtime (result i64)))
  (import "env" "fuel_left" (func $fuel_left (result i64)))
  (import "env" "abort" (func $abort (param i32)))
  (memory (export "memory") 1)
  (global $counter (export "counter") (mut i32) (i32.const 0))
  (global (export "limit") i32 (i32.const 10))
  (global (export "scale") (mut f64) (f64.const 1.5))

  (func (export "add") (param i32 i32) (result i32)
    (i32.add (local.get 0) (local.get 1)))
  (func (export "echo") (param i32) (result i32)
    (local.get 0))
  (func (export "echo64") (param i64) (result i64)
    (local.get 0))
  (func (export "now") (result i64)
    (call $curtime))
  (func (export "fuel") (result i64)
    (call $fuel_left))
  (func (export "boom")
    (unreachable))
  (func (export "bail") (param i32)
    (call $abort (local.get 0)))
  (func (export "spin")
    (loop $again (br $again)))
  (func (export "bump")
    (global.set $counter (i32.add (global.get $counter) (i32.const 1)))))
"#;

/// Same shape as `CORE_WAT` but `add` multiplies, to tell generations apart.
pub const CORE_V2_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "add") (param i32 i32) (result i32)
    (i32.mul (local.get 0) (local.get 1))))
"#;

/// A worker that can be told to trap on a given tick.
pub const WORKER_WAT: &str = r#"
(module
  (global $ticks (export "ticks") (mut i32) (i32.const 0))
  (global $fail_at (export "fail_at") (mut i32) (i32.const -1))
  (func (export "worker")
    (global.set $ticks (i32.add (global.get $ticks) (i32.const 1)))
    (if (i32.eq (global.get $ticks) (global.get $fail_at))
      (then (unreachable)))))
"#;

/// Two fixed pages.
pub const TWO_PAGES_WAT: &str = r#"(module (memory (export "memory") 2 2))"#;

/// One page, unbounded.
pub const ONE_PAGE_WAT: &str = r#"(module (memory (export "memory") 1))"#;

/// Allocator without a dealloc export.
pub const NO_DEALLOC_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (global (export "__resonite_v1_str_format") i32 (i32.const 3))
  (func (export "__resonite_v1_alloc") (param i32) (result i32)
    (i32.const 1024)))
"#;

/// Allocator whose dealloc has the wrong signature.
pub const BAD_DEALLOC_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (global (export "__resonite_v1_str_format") i32 (i32.const 3))
  (func (export "__resonite_v1_alloc") (param i32) (result i32)
    (i32.const 1024))
  (func (export "__resonite_v1_dealloc") (param i32) (result i32)
    (i32.const 0)))
"#;

/// An allocator that calls `env.abort(9)` on every request.
pub const ABORTING_ALLOC_WAT: &str = r#"
(module
  (import "env" "abort" (func $abort (param i32)))
  (memory (export "memory") 1)
  (global (export "__resonite_v1_str_format") i32 (i32.const 3))
  (func (export "__resonite_v1_alloc") (param i32) (result i32)
    (call $abort (i32.const 9))
    (i32.const 1024))
  (func (export "__resonite_v1_dealloc") (param i32))
  (func (export "identity") (param i32) (result i32)
    (local.get 0)))
"#;

/// Imports something the host does not provide.
pub const UNLINKABLE_WAT: &str = r#"
(module
  (import "env" "teleport" (func (param i32))))
"#;

/// A guest with the allocator ABI and the given string format value.
///
/// The allocator bumps from 1024, refuses requests over 60000 bytes and
/// hands out an offset too close to the end of memory for 13-byte blocks.
pub fn abi_wat(format: i32) -> String {
    format!(
        r#"
(module
  (import "env" "log" (func $log (param i32 i32)))
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (global (export "__resonite_v1_str_format") i32 (i32.const {format}))
  (global $last (export "last_alloc_len") (mut i32) (i32.const 0))
  (global $frees (export "frees") (mut i32) (i32.const 0))
  (data (i32.const 16) "hello")

  (func $alloc (export "__resonite_v1_alloc") (param $len i32) (result i32)
    (local $ptr i32)
    (global.set $last (local.get $len))
    (if (i32.gt_u (local.get $len) (i32.const 60000))
      (then (return (i32.const 0))))
    (if (i32.eq (local.get $len) (i32.const 13))
      (then (return (i32.const 65530))))
    (local.set $ptr (global.get $heap))
    (global.set $heap
      (i32.add (global.get $heap)
        (i32.and (i32.add (local.get $len) (i32.const 7)) (i32.const -8))))
    (local.get $ptr))

  (func (export "__resonite_v1_dealloc") (param i32)
    (global.set $frees (i32.add (global.get $frees) (i32.const 1))))

  (func (export "greet") (result i32)
    (local $ptr i32)
    (local.set $ptr (call $alloc (i32.const 9)))
    (i32.store (local.get $ptr) (i32.const 5))
    (memory.copy (i32.add (local.get $ptr) (i32.const 4)) (i32.const 16) (i32.const 5))
    (local.get $ptr))

  (func (export "strlen") (param $s i32) (result i32)
    (i32.load (local.get $s)))

  (func (export "identity") (param $p i32) (result i32)
    (local.get $p))

  (func (export "sum3") (param $v i32) (result f32)
    (f32.add
      (f32.add (f32.load (local.get $v)) (f32.load offset=4 (local.get $v)))
      (f32.load offset=8 (local.get $v))))

  (func (export "color_tag") (param $c i32) (result i32)
    (i32.load offset=16 (local.get $c)))

  (func (export "say") (param $s i32)
    (call $log (i32.add (local.get $s) (i32.const 4)) (i32.load (local.get $s))))

  (func (export "spin")
    (loop $again (br $again))))
"#
    )
}

/// UTF-8 guest.
pub fn utf8_abi_wat() -> String {
    abi_wat(3)
}

/// Runtime with test limits.
pub fn runtime() -> Arc<BridgeRuntime> {
    runtime_with(BridgeConfig::testing())
}

/// Runtime with a custom configuration.
pub fn runtime_with(config: BridgeConfig) -> Arc<BridgeRuntime> {
    Arc::new(BridgeRuntime::new(config).expect("runtime"))
}

/// In-memory source holding the given `(reference, wat)` modules.
pub fn source(modules: &[(&str, &str)]) -> Arc<MemorySource> {
    let source = MemorySource::new();
    for (reference, wat) in modules {
        source.insert(*reference, wat::parse_str(wat).expect("valid wat"));
    }
    Arc::new(source)
}

/// A slot already loaded with `wat` under the reference `main`.
pub async fn loaded(wat: &str) -> ModuleSlot {
    loaded_with(runtime(), wat).await
}

/// Same as [`loaded`] on a specific runtime.
pub async fn loaded_with(runtime: Arc<BridgeRuntime>, wat: &str) -> ModuleSlot {
    let slot = ModuleSlot::builder("test", runtime, source(&[("main", wat)])).build();
    slot.load("main").await.expect("module loads");
    slot
}

/// Delays fetches of references starting with `slow` before delegating.
pub struct DelayedSource {
    pub inner: Arc<MemorySource>,
    pub delay: Duration,
}

impl BinarySource for DelayedSource {
    fn fetch<'a>(&'a self, reference: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            if reference.starts_with("slow") {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.fetch(reference).await
        })
    }
}
