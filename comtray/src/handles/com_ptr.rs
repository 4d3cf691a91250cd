use crate::{Error, IUnknown, Interface, Result};
use comtray_sys::{com_failed, COM_E_NO_INTERFACE};
use std::{ffi::c_void, fmt::Debug, ops::Deref, ptr::NonNull};

/// ABIの向こうのinterfaceを参照カウントで管理するためのハンドル。
///
/// 参照の増減はすべてvtable経由で行うので、相手のオブジェクトの型を知る必要はない。
/// 相手がスレッドセーフかどうかはわからないので `Send` / `Sync` にはしない。
pub struct ComPtr<I: Interface> {
    ptr: NonNull<I>,
}
impl<I: Interface> ComPtr<I> {
    /// すでに持っている参照をハンドルにする
    ///
    /// ## Safety
    /// `ptr` は `I` のinterfaceを指し、呼び出し側がその参照を一つ持っていなければならない。
    pub unsafe fn adopt(ptr: NonNull<I>) -> Self {
        Self { ptr }
    }

    /// 関数の出力引数などで受け取った生のポインタの参照を引き取る。nullならNone。
    ///
    /// ## Safety
    /// `adopt` と同じ。
    pub unsafe fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw as *mut I).map(|ptr| unsafe { Self::adopt(ptr) })
    }

    /// 借りている生のポインタから新しく参照を取得する。nullならNone。
    ///
    /// ## Safety
    /// `raw` は `I` のinterfaceを指す有効なポインタでなければならない。
    pub unsafe fn from_raw_acquire(raw: *mut c_void) -> Option<Self> {
        let ptr = NonNull::new(raw as *mut I)?;
        let handle = unsafe { Self::adopt(ptr) };
        unsafe { handle.unknown().add_ref() };
        Some(handle)
    }

    /// 参照を変えずに生のポインタを取得する
    pub fn as_raw(&self) -> *mut c_void {
        self.ptr.as_ptr() as *mut c_void
    }

    /// 参照を減らさずに生のポインタを取り出す。参照は呼び出し側に移る。
    pub fn into_raw(self) -> *mut c_void {
        let raw = self.as_raw();
        std::mem::forget(self);
        raw
    }

    /// identity interfaceとして見る
    pub fn unknown(&self) -> &IUnknown {
        unsafe { &*(self.ptr.as_ptr() as *const IUnknown) }
    }

    /// 別のcapabilityを問い合わせる
    pub fn query<J: Interface>(&self) -> Result<ComPtr<J>> {
        let mut out = std::ptr::null_mut();
        let result = unsafe { self.unknown().query_interface(&J::IID, &mut out) };
        if com_failed(result) {
            if result != COM_E_NO_INTERFACE {
                tracing::debug!(iid = %J::IID, result, "query_interface failed");
            }
            return Err(Error::NoSuchCapability(J::IID));
        }
        unsafe { ComPtr::from_raw(out) }.ok_or(Error::NoSuchCapability(J::IID))
    }

    /// 二つのハンドルが同じオブジェクトを指しているか。
    /// どちらもidentity interfaceを問い合わせて、そのポインタを比べる。
    pub fn same_object<J: Interface>(&self, other: &ComPtr<J>) -> Result<bool> {
        let lhs = self.query::<IUnknown>()?;
        let rhs = other.query::<IUnknown>()?;
        Ok(lhs.as_raw() == rhs.as_raw())
    }
}

// Debugトレイトの実装
impl<I: Interface> Debug for ComPtr<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComPtr")
            .field("iid", &I::IID)
            .field("ptr", &self.ptr)
            .finish()
    }
}

// ComPtrはinterfaceにDerefする
impl<I: Interface> Deref for ComPtr<I> {
    type Target = I;
    fn deref(&self) -> &Self::Target {
        unsafe { self.ptr.as_ref() }
    }
}

// Cloneでvtable経由で参照カウントを増やす
impl<I: Interface> Clone for ComPtr<I> {
    fn clone(&self) -> Self {
        unsafe { self.unknown().add_ref() };
        Self { ptr: self.ptr }
    }
}

// Drop時にvtable経由で参照カウントを減らす
impl<I: Interface> Drop for ComPtr<I> {
    fn drop(&mut self) {
        unsafe { self.unknown().release() };
    }
}
