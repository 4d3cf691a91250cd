//! ライブラリ内部の所有のための侵入型の参照カウント。
//!
//! カウントはアトミックではない。`RefCount` は `Cell` を持つので、これを含む型は `Sync` にならず、
//! 単一のコンテキストから操作するという前提が型で表現される。

use crate::policy::{self, Fault};
use std::{cell::Cell, fmt::Debug, ptr::NonNull};

/// 非アトミックな所有カウント
pub struct RefCount {
    count: Cell<u32>,
}
impl RefCount {
    /// カウント0で作成する
    pub const fn new() -> Self {
        Self {
            count: Cell::new(0),
        }
    }

    /// 参照を一つ増やし、増やした後のカウントを返す
    #[inline]
    pub fn add_reference(&self) -> u32 {
        let previous = self.count.get();
        policy::ensure_not_leaking(previous, "RefCount");
        self.count.set(previous + 1);
        previous + 1
    }

    /// 破棄せずに参照を一つ減らす。所有権を別の持ち主に移すときに使う。
    ///
    /// ## Safety
    /// `validation` が無効なビルドではカウントが0でないことを呼び出し側が保証する。
    /// 0になってもオブジェクトは破棄されないので、その後の後始末は呼び出し側の責任。
    #[inline]
    pub unsafe fn decrease_reference(&self) -> u32 {
        let previous = self.count.get();
        unsafe { policy::ensure(previous != 0, || Fault::UseAfterFree("RefCount")) };
        self.count.set(previous - 1);
        previous - 1
    }

    /// 参照がちょうど一つかどうか。参照が一つもないときに呼ぶのは契約違反。
    pub fn is_uniquely_referenced(&self) -> bool {
        let count = self.count.get();
        policy::check(count != 0, || Fault::InvalidState("RefCount"));
        count == 1
    }

    /// 現在のカウント(デバッグ用)
    pub fn debug_count(&self) -> u32 {
        self.count.get()
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

// コピーしたオブジェクトは参照が0から始まる
impl Clone for RefCount {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Debug for RefCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefCount")
            .field("count", &self.count.get())
            .finish()
    }
}

/// 所有カウントを持つオブジェクト
///
/// ## Safety
/// 実装する型は `Box` で確保され、`release_reference` でのみ破棄されなければならない。
pub unsafe trait RefObject: Sized {
    /// オブジェクトに埋め込まれた所有カウント
    fn ref_count(&self) -> &RefCount;
}

/// 所有カウントを一つ減らし、0になったら `this` を破棄する。減らした後のカウントを返す。
///
/// ## Safety
/// `this` は `Box::into_raw` で得た生きているオブジェクトを指していなければならない。
/// `validation` が無効なビルドではカウントが0でないことを呼び出し側が保証する。
pub unsafe fn release_reference<T: RefObject>(this: NonNull<T>) -> u32 {
    let name = std::any::type_name::<T>();
    let refs = unsafe { this.as_ref() }.ref_count();
    let previous = refs.count.get();
    unsafe { policy::ensure(previous != 0, || Fault::UseAfterFree(name)) };
    refs.count.set(previous - 1);
    if previous == 1 {
        tracing::trace!(object = name, "destroying ref object");
        drop(unsafe { Box::from_raw(this.as_ptr()) });
    }
    previous - 1
}
