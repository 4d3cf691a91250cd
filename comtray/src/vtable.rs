//! 任意のオブジェクト型のためのABIのthunkとvtableの組み立て。
//!
//! thunkが受け取る `this` はオブジェクトの先頭を指している前提。
//! つまりvtableへのポインタを先頭のフィールドに持つ `#[repr(C)]` の型で使う。
//! `extern "system"` の関数からpanicは巻き戻らずプロセスが終了するので、
//! 境界の向こうから契約違反をした場合もその場で止まる。

use crate::{capability, CapabilityTable, ComCounted};
use comtray_sys::{ComResult, Guid, IUnknownVtbl};
use std::{ffi::c_void, ptr::NonNull};

/// `query_interface` のthunk
///
/// ## Safety
/// `this` は `T` のオブジェクトを指していなければならない。
pub unsafe extern "system" fn query_interface<T: CapabilityTable + ComCounted>(
    this: *mut c_void,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> ComResult {
    let object = unsafe { &*(this as *const T) };
    unsafe { capability::query_into(object, iid, out) }
}

/// `add_ref` のthunk
///
/// ## Safety
/// `this` は `T` のオブジェクトを指していなければならない。
pub unsafe extern "system" fn add_ref<T: ComCounted>(this: *mut c_void) -> u32 {
    unsafe { &*(this as *const T) }.add_ref()
}

/// `release` のthunk
///
/// ## Safety
/// `this` は `T` のオブジェクトを指し、呼び出し側はその参照を一つ保持していなければならない。
pub unsafe extern "system" fn release<T: ComCounted>(this: *mut c_void) -> u32 {
    unsafe { T::release(NonNull::new_unchecked(this as *mut T)) }
}

/// `T` のためのidentity interfaceのvtableを作る。
/// `T` のテーブルでvtableを持つinterfaceはすべてオフセット0になければならない。
pub const fn unknown_vtbl<T: CapabilityTable + ComCounted>() -> IUnknownVtbl {
    IUnknownVtbl {
        query_interface: query_interface::<T>,
        add_ref: add_ref::<T>,
        release: release::<T>,
    }
}
