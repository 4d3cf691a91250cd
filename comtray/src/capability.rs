//! 識別子からcapabilityのポインタを解決する仕組み。
//!
//! 各オブジェクト型はサポートするcapabilityの静的なテーブルを持ち、
//! 解決はすべてこのモジュールの汎用の関数で行う。
//! 成功したときだけオブジェクトのプロトコル側のカウントを増やす。

use crate::ComCounted;
use comtray_sys::{ComResult, Guid, COM_E_INVALID_ARG, COM_E_NO_INTERFACE, COM_OK, IID_UNKNOWN};
use std::{ffi::c_void, ptr::NonNull};

/// capabilityの識別子と、それに対応するポインタを返す関数の組。
///
/// `vtable` のthunkは `this` をオブジェクトの先頭として扱うので、
/// vtableを持つinterfaceを返すaccessorは必ずオブジェクトの先頭(オフセット0)を返すこと。
/// 先頭以外を返してよいのは、vtableを通して呼ばれないデータだけ。
pub struct Capability<T> {
    /// capabilityの識別子
    pub iid: Guid,
    /// capabilityのポインタを返す関数
    pub accessor: fn(&T) -> *mut c_void,
}
impl<T> Capability<T> {
    /// テーブルのエントリを作成する
    pub const fn new(iid: Guid, accessor: fn(&T) -> *mut c_void) -> Self {
        Self { iid, accessor }
    }
}

/// オブジェクト型ごとのcapabilityのテーブル
pub trait CapabilityTable: Sized + 'static {
    /// サポートするcapabilityの一覧。先頭が主要なinterfaceで、
    /// identity (`IID_UNKNOWN`) の問い合わせは常に先頭のエントリに、テーブルが空ならオブジェクトの先頭に解決される。
    const CAPABILITIES: &'static [Capability<Self>];
}

/// オブジェクトの先頭を指すポインタを返すaccessor。
/// vtableを先頭のフィールドに持つ型では、これがそのままinterfaceのポインタになる。
pub fn primary<T>(this: &T) -> *mut c_void {
    this as *const T as *mut c_void
}

/// カウントを変えずに識別子を解決する。
/// テーブルが空でもidentityはオブジェクトの先頭に解決される。
pub fn resolve<T: CapabilityTable>(object: &T, iid: &Guid) -> Option<NonNull<c_void>> {
    if *iid == IID_UNKNOWN {
        let accessor = T::CAPABILITIES
            .first()
            .map_or(primary::<T> as fn(&T) -> *mut c_void, |capability| capability.accessor);
        return NonNull::new(accessor(object));
    }
    let capability = T::CAPABILITIES.iter().find(|capability| capability.iid == *iid)?;
    NonNull::new((capability.accessor)(object))
}

/// 識別子を解決し、成功したらプロトコル側の参照を一つ増やしてポインタを返す。
/// 失敗したときはカウントを変えない。
pub fn query<T: CapabilityTable + ComCounted>(object: &T, iid: &Guid) -> Option<NonNull<c_void>> {
    let interface = resolve(object, iid)?;
    object.add_ref();
    Some(interface)
}

/// `query` のABIの形。成功したら `*out` に書き込んで `COM_OK` を返す。
/// 失敗したら `*out` には触れずに `COM_E_NO_INTERFACE` を返す。
///
/// ## Safety
/// `iid` と `out` はnullか、有効なポインタでなければならない。
pub unsafe fn query_into<T: CapabilityTable + ComCounted>(
    object: &T,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> ComResult {
    if iid.is_null() || out.is_null() {
        return COM_E_INVALID_ARG;
    }
    match query(object, unsafe { &*iid }) {
        Some(interface) => {
            unsafe { out.write(interface.as_ptr()) };
            COM_OK
        }
        None => COM_E_NO_INTERFACE,
    }
}
