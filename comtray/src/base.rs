//! capability-query プロトコルの中だけに存在するオブジェクトのための
//! アトミックな参照カウント。
//!
//! カウントの増減のOrderingはArcの実装に準拠している。
//! 増加はRelaxed、減少はRelease、0になったときはAcquireのfenceを挟んでから破棄する。

use crate::policy;
use std::{
    fmt::Debug,
    ptr::NonNull,
    sync::atomic::{fence, AtomicU32, Ordering},
};

/// アトミックな参照カウント
pub struct ComBase {
    count: AtomicU32,
}
impl ComBase {
    /// カウント0で作成する
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// 参照を一つ増やし、増やした後のカウントを返す
    #[inline]
    pub fn add_ref(&self) -> u32 {
        let previous = self.count.fetch_add(1, Ordering::Relaxed);
        policy::ensure_not_leaking(previous, "ComBase");
        previous + 1
    }

    /// `this` の持つカウントを一つ減らし、0になったら `this` を破棄する。
    ///
    /// `project` は `this` の中の `ComBase` を取り出す関数。
    ///
    /// ## Safety
    /// `this` は `Box::into_raw` で得たものでなければならない。
    /// `validation` が無効なビルドではカウントが0でないことを呼び出し側が保証する。
    pub unsafe fn release<T>(this: NonNull<T>, project: fn(&T) -> &ComBase) -> u32 {
        let name = std::any::type_name::<T>();
        let count = unsafe { policy::release_atomic(&project(this.as_ref()).count, name) };
        if count == 0 {
            fence(Ordering::Acquire);
            tracing::trace!(object = name, "destroying com base object");
            drop(unsafe { Box::from_raw(this.as_ptr()) });
        }
        count
    }

    /// 現在のカウント(デバッグ用)
    pub fn debug_count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

impl Default for ComBase {
    fn default() -> Self {
        Self::new()
    }
}

// コピーしたオブジェクトは参照が0から始まる
impl Clone for ComBase {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Debug for ComBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComBase")
            .field("count", &self.debug_count())
            .finish()
    }
}
