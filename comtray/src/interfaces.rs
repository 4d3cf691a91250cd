//! ABIの向こうにあるオブジェクトをvtable経由で扱うためのinterfaceの型。
//!
//! どのinterfaceもvtableへのポインタ一つだけのレイアウトで、
//! vtableは `IUnknownVtbl` から始まる。

use crate::{Error, Result};
use comtray_sys::{ComResult, Guid, IBlobVtbl, IUnknownVtbl, IID_BLOB, IID_UNKNOWN};
use std::{borrow::Cow, ffi::c_void};

/// capability-query プロトコルのinterface
///
/// ## Safety
/// 実装する型は `#[repr(C)]` で、`IUnknownVtbl` から始まるvtableへのポインタだけを持たなければならない。
pub unsafe trait Interface: Sized {
    /// このinterfaceの識別子
    const IID: Guid;
}

/// identity interface。すべてのオブジェクトがサポートする。
#[repr(C)]
pub struct IUnknown {
    vtbl: *const IUnknownVtbl,
}
unsafe impl Interface for IUnknown {
    const IID: Guid = IID_UNKNOWN;
}
impl IUnknown {
    fn vtbl(&self) -> &IUnknownVtbl {
        unsafe { &*self.vtbl }
    }

    fn this(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// 生の `query_interface` を呼ぶ
    ///
    /// ## Safety
    /// `out` は有効なポインタでなければならない。成功したら `*out` の参照は呼び出し側が持つ。
    pub unsafe fn query_interface(&self, iid: &Guid, out: *mut *mut c_void) -> ComResult {
        unsafe { (self.vtbl().query_interface)(self.this(), iid, out) }
    }

    /// 生の `add_ref` を呼ぶ
    ///
    /// ## Safety
    /// 増やした参照は対応する `release` で必ず返さなければならない。
    pub unsafe fn add_ref(&self) -> u32 {
        unsafe { (self.vtbl().add_ref)(self.this()) }
    }

    /// 生の `release` を呼ぶ
    ///
    /// ## Safety
    /// 呼び出し側が持っている参照を一つ返す。0を返したらこのオブジェクトはもう使えない。
    pub unsafe fn release(&self) -> u32 {
        unsafe { (self.vtbl().release)(self.this()) }
    }
}

/// 読み取り専用のバイト列を公開するinterface
#[repr(C)]
pub struct IBlob {
    vtbl: *const IBlobVtbl,
}
unsafe impl Interface for IBlob {
    const IID: Guid = IID_BLOB;
}
impl IBlob {
    fn vtbl(&self) -> &IBlobVtbl {
        unsafe { &*self.vtbl }
    }

    fn this(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// バッファの先頭。サイズが0のときだけnullになりうる。
    pub fn buffer_pointer(&self) -> *const u8 {
        unsafe { (self.vtbl().get_buffer_pointer)(self.this()) as *const u8 }
    }

    /// バッファのバイト数。オブジェクトが生きている間は変わらない。
    pub fn buffer_size(&self) -> usize {
        unsafe { (self.vtbl().get_buffer_size)(self.this()) }
    }

    /// バッファをスライスとして取得する
    pub fn as_bytes(&self) -> &[u8] {
        let size = self.buffer_size();
        let pointer = self.buffer_pointer();
        if size == 0 || pointer.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(pointer, size) }
    }

    /// バッファを `T` のスライスとして解釈する。SPIR-Vのワード列などを読むときに使う。
    pub fn cast_slice<T: bytemuck::Pod>(&self) -> Result<&[T]> {
        bytemuck::try_cast_slice(self.as_bytes()).map_err(|e| Error::Cast(format!("{:?}", e)))
    }

    /// 診断メッセージのblobを文字列として読む。最初のNULまでを使う。
    pub fn diagnostic_text(&self) -> Cow<'_, str> {
        let bytes = self.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end])
    }
}
