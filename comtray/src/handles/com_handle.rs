use crate::{capability, CapabilityTable, ComCounted, ComPtr, Error, Interface, Result};
use std::{fmt::Debug, ops::Deref, ptr::NonNull};

/// プロトコル側の参照カウントで管理するための型付きのハンドル
pub struct ComHandle<T: ComCounted> {
    ptr: NonNull<T>,
}
impl<T: ComCounted> ComHandle<T> {
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
        unsafe { ptr.as_ref() }.add_ref();
        Self { ptr }
    }

    /// 参照を減らさずに生のポインタを取り出す。
    /// 取り出した参照は `adopt` で戻すか、`ComCounted::release` で返す。
    pub fn into_raw(self) -> NonNull<T> {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }

    /// すでに持っている参照をハンドルに戻す
    ///
    /// ## Safety
    /// `ptr` は `into_raw` などで得た、呼び出し側が参照を一つ持っているポインタでなければならない。
    pub unsafe fn adopt(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    /// プロトコル側の現在のカウント(デバッグ用)
    pub fn count(&self) -> u32 {
        self.data().debug_com_count()
    }

    fn data(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ComCounted + CapabilityTable> ComHandle<T> {
    /// capabilityを問い合わせ、参照付きのinterfaceを取得する
    pub fn query<I: Interface>(&self) -> Result<ComPtr<I>> {
        let interface =
            capability::query(self.data(), &I::IID).ok_or(Error::NoSuchCapability(I::IID))?;
        Ok(unsafe { ComPtr::adopt(interface.cast()) })
    }

    /// このハンドルの参照をinterfaceの参照に変える
    pub fn into_interface<I: Interface>(self) -> Result<ComPtr<I>> {
        self.query()
    }
}

// Debugトレイトの実装
impl<T: ComCounted> Debug for ComHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComHandle")
            .field("type", &std::any::type_name::<T>())
            .field("count", &self.count())
            .finish()
    }
}

// 中身がSendかつSyncならComHandleはSend
unsafe impl<T: ComCounted + Send + Sync> Send for ComHandle<T> {}
// 中身がSendかつSyncならComHandleはSync
unsafe impl<T: ComCounted + Send + Sync> Sync for ComHandle<T> {}

// ComHandleは中身にDerefする
impl<T: ComCounted> Deref for ComHandle<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

// Cloneで参照カウントを増やす
impl<T: ComCounted> Clone for ComHandle<T> {
    fn clone(&self) -> Self {
        unsafe { Self::from_raw_acquire(self.ptr) }
    }
}

// Drop時に参照カウントを減らし、0になったら破棄する
impl<T: ComCounted> Drop for ComHandle<T> {
    fn drop(&mut self) {
        unsafe { T::release(self.ptr) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Blob;

    #[test]
    fn from_raw_acquire_takes_a_new_reference_and_adopt_does_not() {
        let handle = Blob::from_slice(b"abc");
        let raw = handle.clone().into_raw();
        assert_eq!(handle.count(), 2);

        let acquired = unsafe { ComHandle::from_raw_acquire(raw) };
        assert_eq!(handle.count(), 3);
        drop(acquired);
        assert_eq!(handle.count(), 2);

        let adopted = unsafe { ComHandle::adopt(raw) };
        assert_eq!(handle.count(), 2);
        drop(adopted);
        assert_eq!(handle.count(), 1);
    }
}
