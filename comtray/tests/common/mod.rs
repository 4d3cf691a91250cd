#![allow(dead_code)]
//! 結合テストで共有するヘルパー。

use comtray::{
    capability::{self, Capability},
    sys::{IUnknownVtbl, IID_UNKNOWN},
    vtable, CapabilityTable, ComBase, ComCounted,
};
use std::{
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Once,
    },
};

static INIT_LOGGING: Once = Once::new();

/// テスト用のログを一度だけ初期化する
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}

static TRACKED_VTBL: IUnknownVtbl = vtable::unknown_vtbl::<Tracked>();

/// identityだけをサポートし、破棄された回数を数えるオブジェクト
#[repr(C)]
pub struct Tracked {
    vtbl: &'static IUnknownVtbl,
    base: ComBase,
    drops: Arc<AtomicUsize>,
}
impl Tracked {
    pub fn new(drops: &Arc<AtomicUsize>) -> Self {
        Self {
            vtbl: &TRACKED_VTBL,
            base: ComBase::new(),
            drops: drops.clone(),
        }
    }
}
impl CapabilityTable for Tracked {
    const CAPABILITIES: &'static [Capability<Self>] =
        &[Capability::new(IID_UNKNOWN, capability::primary::<Self>)];
}
unsafe impl ComCounted for Tracked {
    fn add_ref(&self) -> u32 {
        self.base.add_ref()
    }

    unsafe fn release(this: NonNull<Self>) -> u32 {
        unsafe { ComBase::release(this, |t| &t.base) }
    }

    fn debug_com_count(&self) -> u32 {
        self.base.debug_count()
    }
}
impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}
