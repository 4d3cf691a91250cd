//! 所有カウントとプロトコル側のカウントの二つを持つオブジェクト。
//!
//! 二つのカウントは別々のフィールドで、決して一つにまとめない。遷移は次の通り。
//!
//! | 遷移                     | 効果                                                        |
//! |--------------------------|-------------------------------------------------------------|
//! | プロトコル 0→1           | 所有カウントを+1する(プロトコル側の持ち分の登録)          |
//! | プロトコル n→n+1 (n≥1)   | なし                                                        |
//! | プロトコル 1→0           | `com_free` を呼び、その後所有カウントを-1する(破棄されうる) |
//! | プロトコル n→n-1 (n≥2)   | なし                                                        |
//! | 所有 0→1                 | なし                                                        |
//! | 所有 1→0                 | オブジェクトを破棄する                                      |
//!
//! プロトコル側のカウントはアトミックだが、所有カウントは単一コンテキスト前提なので
//! このオブジェクトは `Sync` にならない。

use crate::{
    policy,
    ref_object::{self, RefCount, RefObject},
};
use std::{
    fmt::Debug,
    ptr::NonNull,
    sync::atomic::{fence, AtomicU32, Ordering},
};

/// 二つのカウントを持つ土台
pub struct ComObjectBase {
    refs: RefCount,
    com_refs: AtomicU32,
}
impl ComObjectBase {
    /// どちらのカウントも0で作成する
    pub const fn new() -> Self {
        Self {
            refs: RefCount::new(),
            com_refs: AtomicU32::new(0),
        }
    }

    /// 所有カウント。`RefObject::ref_count` の実装から返す。
    pub fn ref_count(&self) -> &RefCount {
        &self.refs
    }

    /// プロトコル側の現在のカウント(デバッグ用)
    pub fn debug_com_count(&self) -> u32 {
        self.com_refs.load(Ordering::Acquire)
    }
}

impl Default for ComObjectBase {
    fn default() -> Self {
        Self::new()
    }
}

// コピーしたオブジェクトはどちらのカウントも0から始まる
impl Clone for ComObjectBase {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Debug for ComObjectBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComObjectBase")
            .field("refs", &self.refs.debug_count())
            .field("com_refs", &self.debug_com_count())
            .finish()
    }
}

/// 二つのカウントをまたぐオブジェクト
pub trait ComObject: RefObject {
    /// オブジェクトに埋め込まれた `ComObjectBase`
    fn com_object_base(&self) -> &ComObjectBase;

    /// プロトコル側のカウントが0になったときに一度だけ呼ばれる後始末。
    /// プロトコル側の資源(ネイティブのハンドルなど)をここで解放する。
    /// オブジェクトそのものはこの後も所有カウントが残っていれば生き続ける。
    fn com_free(&self) {}
}

/// プロトコル側の参照を一つ増やし、増やした後のカウントを返す。
///
/// 0→1の遷移では所有カウントを一つ増やす。0→1の遷移を観測できるのは
/// その参照を受け取る呼び出し元だけなので、戻る前に所有カウントの登録は済んでいる。
pub fn add_ref_impl<T: ComObject>(this: &T) -> u32 {
    let base = this.com_object_base();
    let previous = base.com_refs.fetch_add(1, Ordering::Relaxed);
    policy::ensure_not_leaking(previous, std::any::type_name::<T>());
    if previous == 0 {
        base.refs.add_reference();
    }
    previous + 1
}

/// プロトコル側の参照を一つ減らし、減らした後のカウントを返す。
///
/// 1→0の遷移では `com_free` を呼んでから所有カウントを一つ減らす。
///
/// ## Safety
/// `this` は `Box::into_raw` で得た生きているオブジェクトを指していなければならない。
/// `validation` が無効なビルドではプロトコル側のカウントが0でないことを呼び出し側が保証する。
pub unsafe fn release_impl<T: ComObject>(this: NonNull<T>) -> u32 {
    let name = std::any::type_name::<T>();
    let object = unsafe { this.as_ref() };
    let count = unsafe { policy::release_atomic(&object.com_object_base().com_refs, name) };
    if count == 0 {
        fence(Ordering::Acquire);
        tracing::trace!(object = name, "protocol references released, running teardown");
        object.com_free();
        unsafe { ref_object::release_reference(this) };
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

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
    impl Drop for Session {
        fn drop(&mut self) {
            self.probe.drops.set(self.probe.drops.get() + 1);
        }
    }

    fn session(probe: &Rc<Probe>) -> NonNull<Session> {
        let data = Box::new(Session {
            base: ComObjectBase::new(),
            probe: probe.clone(),
        });
        unsafe { NonNull::new_unchecked(Box::into_raw(data)) }
    }

    #[test]
    fn first_protocol_reference_registers_one_ownership_reference() {
        let probe = Rc::new(Probe::default());
        let ptr = session(&probe);
        let object = unsafe { ptr.as_ref() };
        assert_eq!(add_ref_impl(object), 1);
        assert_eq!(object.ref_count().debug_count(), 1);
        assert_eq!(add_ref_impl(object), 2);
        assert_eq!(add_ref_impl(object), 3);
        assert_eq!(object.ref_count().debug_count(), 1);

        assert_eq!(unsafe { release_impl(ptr) }, 2);
        assert_eq!(unsafe { release_impl(ptr) }, 1);
        assert_eq!(probe.teardowns.get(), 0);
        assert_eq!(unsafe { release_impl(ptr) }, 0);
        assert_eq!(probe.teardowns.get(), 1);
        assert_eq!(probe.drops.get(), 1);
    }

    #[test]
    fn internal_owner_outlives_protocol_side() {
        let probe = Rc::new(Probe::default());
        let ptr = session(&probe);
        let object = unsafe { ptr.as_ref() };
        object.ref_count().add_reference();

        add_ref_impl(object);
        assert_eq!(object.ref_count().debug_count(), 2);
        unsafe { release_impl(ptr) };
        assert_eq!(probe.teardowns.get(), 1);
        assert_eq!(probe.drops.get(), 0);

        // 再びプロトコル側に公開されると、改めて持ち分が登録される
        let object = unsafe { ptr.as_ref() };
        add_ref_impl(object);
        unsafe { release_impl(ptr) };
        assert_eq!(probe.teardowns.get(), 2);
        assert_eq!(probe.drops.get(), 0);

        unsafe { ref_object::release_reference(ptr) };
        assert_eq!(probe.drops.get(), 1);
    }

    #[test]
    fn clone_resets_both_counts() {
        let base = ComObjectBase::new();
        base.refs.add_reference();
        base.com_refs.fetch_add(3, Ordering::Relaxed);
        let copy = base.clone();
        assert_eq!(copy.ref_count().debug_count(), 0);
        assert_eq!(copy.debug_com_count(), 0);
    }

    #[cfg(feature = "validation")]
    #[test]
    #[should_panic(expected = "use after free")]
    fn protocol_release_at_zero_is_use_after_free() {
        let probe = Rc::new(Probe::default());
        unsafe { release_impl(session(&probe)) };
    }
}
