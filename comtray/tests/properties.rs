//! 参照カウントの増減の列に対するproperty test。

mod common;

use common::Tracked;
use comtray::{
    com_object::{self, ComObject, ComObjectBase},
    ref_object::{RefCount, RefObject},
    ComCounted, ComHandle, RefHandle,
};
use proptest::prelude::*;
use std::{
    cell::Cell,
    panic::{catch_unwind, AssertUnwindSafe},
    ptr::NonNull,
    rc::Rc,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

#[derive(Debug, Clone, Copy)]
enum Op {
    Acquire,
    Release,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(prop_oneof![Just(Op::Acquire), Just(Op::Release)], 0..64)
}

#[derive(Default)]
struct Probe {
    teardowns: Cell<u32>,
    drops: Cell<u32>,
}

struct Session {
    base: ComObjectBase,
    probe: Rc<Probe>,
}
unsafe impl RefObject for Session {
    fn ref_count(&self) -> &RefCount {
        self.base.ref_count()
    }
}
impl ComObject for Session {
    fn com_object_base(&self) -> &ComObjectBase {
        &self.base
    }
    fn com_free(&self) {
        self.probe.teardowns.set(self.probe.teardowns.get() + 1);
    }
}
unsafe impl ComCounted for Session {
    fn add_ref(&self) -> u32 {
        com_object::add_ref_impl(self)
    }
    unsafe fn release(this: NonNull<Self>) -> u32 {
        unsafe { com_object::release_impl(this) }
    }
    fn debug_com_count(&self) -> u32 {
        self.base.debug_com_count()
    }
}
impl Drop for Session {
    fn drop(&mut self) {
        self.probe.drops.set(self.probe.drops.get() + 1);
    }
}

proptest! {
    #[test]
    fn plain_count_equals_acquires_minus_releases(ops in arb_ops()) {
        let refs = RefCount::new();
        let mut model: u32 = 0;
        for op in ops {
            match op {
                Op::Acquire => {
                    model += 1;
                    prop_assert_eq!(refs.add_reference(), model);
                }
                Op::Release if model == 0 => {
                    if cfg!(feature = "validation") {
                        let result = catch_unwind(AssertUnwindSafe(|| unsafe { refs.decrease_reference() }));
                        prop_assert!(result.is_err());
                    }
                }
                Op::Release => {
                    model -= 1;
                    prop_assert_eq!(unsafe { refs.decrease_reference() }, model);
                }
            }
            prop_assert_eq!(refs.debug_count(), model);
        }
    }

    #[test]
    fn atomic_count_destroys_exactly_when_balance_reaches_zero(ops in arb_ops()) {
        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(Tracked::new(&drops)))) };
        let mut model: u32 = 0;
        let mut destroyed = false;
        for op in ops {
            match op {
                Op::Acquire => {
                    model += 1;
                    prop_assert_eq!(unsafe { ptr.as_ref() }.add_ref(), model);
                }
                Op::Release if model == 0 => {
                    if cfg!(feature = "validation") {
                        let result = catch_unwind(AssertUnwindSafe(|| unsafe { Tracked::release(ptr) }));
                        prop_assert!(result.is_err());
                        prop_assert_eq!(drops.load(Ordering::SeqCst), 0);
                    }
                }
                Op::Release => {
                    model -= 1;
                    prop_assert_eq!(unsafe { Tracked::release(ptr) }, model);
                    if model == 0 {
                        destroyed = true;
                        break;
                    }
                    prop_assert_eq!(drops.load(Ordering::SeqCst), 0);
                }
            }
        }
        if !destroyed {
            // 残りの参照を返して後始末する
            unsafe { ptr.as_ref() }.add_ref();
            for _ in 0..=model {
                unsafe { Tracked::release(ptr) };
            }
        }
        prop_assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bridged_teardown_runs_once_and_destruction_follows_ownership(
        n in 1usize..32,
        internal_owner in any::<bool>(),
    ) {
        let probe = Rc::new(Probe::default());
        let owner = RefHandle::new(Session { base: ComObjectBase::new(), probe: probe.clone() });
        let handles: Vec<ComHandle<Session>> = (0..n).map(|_| owner.to_com()).collect();
        prop_assert_eq!(owner.count(), 2);
        prop_assert_eq!(handles[0].count(), n as u32);
        let owner = if internal_owner { Some(owner) } else { drop(owner); None };

        let last = handles.len() - 1;
        for (i, handle) in handles.into_iter().enumerate() {
            drop(handle);
            let expected = if i == last { 1 } else { 0 };
            prop_assert_eq!(probe.teardowns.get(), expected);
        }

        if let Some(owner) = owner {
            prop_assert_eq!(probe.drops.get(), 0);
            prop_assert!(owner.is_unique());
            drop(owner);
        }
        prop_assert_eq!(probe.drops.get(), 1);
        prop_assert_eq!(probe.teardowns.get(), 1);
    }
}

#[test]
fn copies_start_at_zero_regardless_of_source() {
    let drops = Arc::new(AtomicUsize::new(0));
    let handle = ComHandle::new(Tracked::new(&drops));
    let _a = handle.clone();
    let _b = handle.clone();
    assert_eq!(handle.count(), 3);

    let probe = Rc::new(Probe::default());
    let owner = RefHandle::new(Session {
        base: ComObjectBase::new(),
        probe,
    });
    let _com = owner.to_com();
    let copy = owner.base.clone();
    assert_eq!(copy.ref_count().debug_count(), 0);
    assert_eq!(copy.debug_com_count(), 0);
}
