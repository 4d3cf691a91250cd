//! capability-query プロトコルの生のABI定義。
//!
//! バイナリ境界を越えて一致している必要があるのは
//! 128bitの識別子の形式と、`query_interface` / `add_ref` / `release` の3つの関数のシグネチャだけ。
//! ここにはロジックを置かず、レイアウトと定数だけを定義する。
#![allow(non_camel_case_types)]

use std::{ffi::c_void, fmt};

/// capabilityを識別する128bitの識別子
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}
impl Guid {
    /// `0x8BA5FB08_5195_40E2_AC58_0D989C3A0102` のような128bit値から作成する
    pub const fn from_u128(value: u128) -> Self {
        let tail = (value as u64).to_be_bytes();
        Self {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4: tail,
        }
    }

    /// 128bit値に戻す
    pub const fn to_u128(&self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | (u64::from_be_bytes(self.data4) as u128)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

/// プロトコルの関数が返す結果コード。負の値が失敗。
pub type ComResult = i32;

pub const COM_OK: ComResult = 0;
pub const COM_E_NO_INTERFACE: ComResult = 0x8000_4002_u32 as i32;
pub const COM_E_INVALID_ARG: ComResult = 0x8007_0057_u32 as i32;

/// 結果コードが失敗を表しているか
#[inline]
pub const fn com_failed(result: ComResult) -> bool {
    result < 0
}

/// すべてのオブジェクトがサポートするidentityのcapability
pub const IID_UNKNOWN: Guid = Guid::from_u128(0x00000000_0000_0000_C000_000000000046);
/// 読み取り専用のバイト列を公開するcapability
pub const IID_BLOB: Guid = Guid::from_u128(0x8BA5FB08_5195_40E2_AC58_0D989C3A0102);

pub type PFN_queryInterface =
    unsafe extern "system" fn(this: *mut c_void, uuid: *const Guid, out: *mut *mut c_void) -> ComResult;
pub type PFN_addRef = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type PFN_release = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type PFN_getBufferPointer = unsafe extern "system" fn(this: *mut c_void) -> *const c_void;
pub type PFN_getBufferSize = unsafe extern "system" fn(this: *mut c_void) -> usize;

/// identity interfaceのvtable。すべてのvtableはこれで始まる。
#[repr(C)]
pub struct IUnknownVtbl {
    pub query_interface: PFN_queryInterface,
    pub add_ref: PFN_addRef,
    pub release: PFN_release,
}

/// blob interfaceのvtable
#[repr(C)]
pub struct IBlobVtbl {
    pub base: IUnknownVtbl,
    pub get_buffer_pointer: PFN_getBufferPointer,
    pub get_buffer_size: PFN_getBufferSize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_iid_formats_like_registry_string() {
        assert_eq!(IID_BLOB.to_string(), "8BA5FB08-5195-40E2-AC58-0D989C3A0102");
        assert_eq!(IID_UNKNOWN.to_string(), "00000000-0000-0000-C000-000000000046");
    }

    #[test]
    fn fields_follow_the_c_layout() {
        assert_eq!(IID_BLOB.data1, 0x8BA5FB08);
        assert_eq!(IID_BLOB.data2, 0x5195);
        assert_eq!(IID_BLOB.data3, 0x40E2);
        assert_eq!(IID_BLOB.data4, [0xAC, 0x58, 0x0D, 0x98, 0x9C, 0x3A, 0x01, 0x02]);
        assert_eq!(std::mem::size_of::<Guid>(), 16);
        assert_eq!(Guid::from_u128(IID_BLOB.to_u128()), IID_BLOB);
    }

    #[test]
    fn result_codes_are_negative_on_failure() {
        assert!(!com_failed(COM_OK));
        assert!(com_failed(COM_E_NO_INTERFACE));
        assert!(com_failed(COM_E_INVALID_ARG));
    }

    #[test]
    fn blob_vtbl_starts_with_unknown_vtbl() {
        assert_eq!(
            std::mem::size_of::<IBlobVtbl>(),
            std::mem::size_of::<IUnknownVtbl>() + 2 * std::mem::size_of::<usize>()
        );
    }
}
