use crate::{
    com_object::ComObject,
    ref_object::{self, RefObject},
    ComCounted, ComHandle,
};
use std::{fmt::Debug, ops::Deref, ptr::NonNull};

/// 所有カウントで管理するための型付きのハンドル。
///
/// 中身が `Sync` でないので、このハンドルもスレッドをまたがない。
pub struct RefHandle<T: RefObject> {
    ptr: NonNull<T>,
}
impl<T: RefObject> RefHandle<T> {
    /// `value` をヒープに確保し、最初の参照を取得する
    pub fn new(value: T) -> Self {
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(value))) };
        unsafe { Self::from_raw_acquire(ptr) }
    }

    /// 生のポインタから参照を一つ取得してハンドルを作る
    ///
    /// ## Safety
    /// `ptr` は `Box::into_raw` で得た生きているオブジェクトを指していなければならない。
    pub unsafe fn from_raw_acquire(ptr: NonNull<T>) -> Self {
        unsafe { ptr.as_ref() }.ref_count().add_reference();
        Self { ptr }
    }

    /// 参照を減らさずに生のポインタを取り出す
    pub fn into_raw(self) -> NonNull<T> {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }

    /// このハンドルだけがオブジェクトを参照しているか
    pub fn is_unique(&self) -> bool {
        self.ref_count().is_uniquely_referenced()
    }

    /// 現在の所有カウント(デバッグ用)
    pub fn count(&self) -> u32 {
        self.ref_count().debug_count()
    }

    /// 二つのハンドルが同じオブジェクトを指しているか
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }

    fn data(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ComObject + ComCounted> RefHandle<T> {
    /// 同じオブジェクトへのプロトコル側の参照を取得する
    pub fn to_com(&self) -> ComHandle<T> {
        unsafe { ComHandle::from_raw_acquire(self.ptr) }
    }
}

// Debugトレイトの実装
impl<T: RefObject> Debug for RefHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefHandle")
            .field("type", &std::any::type_name::<T>())
            .field("count", &self.count())
            .finish()
    }
}

// RefHandleは中身にDerefする
impl<T: RefObject> Deref for RefHandle<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

// Cloneで所有カウントを増やす
impl<T: RefObject> Clone for RefHandle<T> {
    fn clone(&self) -> Self {
        unsafe { Self::from_raw_acquire(self.ptr) }
    }
}

// Drop時に所有カウントを減らし、0になったら破棄する
impl<T: RefObject> Drop for RefHandle<T> {
    fn drop(&mut self) {
        unsafe { ref_object::release_reference(self.ptr) };
    }
}
