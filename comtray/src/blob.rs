//! 読み取り専用のバイト列を `IBlob` として公開するオブジェクト。
//!
//! 中身を所有するものと、呼び出し側のメモリを借りるだけのものの二種類がある。
//! 借りる場合、呼び出し側はblobへの参照が残っている間そのメモリを生かしておく責任を持つ。

use crate::{
    capability::{self, Capability},
    vtable, CapabilityTable, ComBase, ComCounted, ComHandle, Error, Result,
};
use comtray_sys::{IBlobVtbl, IID_BLOB};
use std::{ffi::c_void, fmt::Debug, ptr::NonNull};

/// `IBlob` として公開できるバイト列を持つ型
pub trait BlobSource {
    /// 公開するバイト列。オブジェクトが生きている間は変わってはいけない。
    fn bytes(&self) -> &[u8];
}

unsafe extern "system" fn get_buffer_pointer<T: BlobSource>(this: *mut c_void) -> *const c_void {
    let bytes = unsafe { &*(this as *const T) }.bytes();
    if bytes.is_empty() {
        std::ptr::null()
    } else {
        bytes.as_ptr() as *const c_void
    }
}

unsafe extern "system" fn get_buffer_size<T: BlobSource>(this: *mut c_void) -> usize {
    unsafe { &*(this as *const T) }.bytes().len()
}

/// `T` のための `IBlob` のvtableを作る
pub const fn blob_vtbl<T: BlobSource + CapabilityTable + ComCounted>() -> IBlobVtbl {
    IBlobVtbl {
        base: vtable::unknown_vtbl::<T>(),
        get_buffer_pointer: get_buffer_pointer::<T>,
        get_buffer_size: get_buffer_size::<T>,
    }
}

enum Storage {
    // 所有しているバイト列。破棄時にownerごと解放する。
    Owned(Box<dyn AsRef<[u8]> + Send + Sync>),
    // 呼び出し側のメモリ。解放しない。
    Unowned { ptr: *const u8, len: usize },
}

static BLOB_VTBL: IBlobVtbl = blob_vtbl::<Blob>();

/// アトミックな参照カウントで管理される読み取り専用のバイト列
#[repr(C)]
pub struct Blob {
    vtbl: &'static IBlobVtbl,
    base: ComBase,
    storage: Storage,
}
impl Blob {
    fn with_storage(storage: Storage) -> ComHandle<Self> {
        ComHandle::new(Self {
            vtbl: &BLOB_VTBL,
            base: ComBase::new(),
            storage,
        })
    }

    /// バイト列をコピーして所有するblobを作成する
    pub fn from_slice(bytes: &[u8]) -> ComHandle<Self> {
        Self::from_vec(bytes.to_vec())
    }

    /// `Vec` をコピーせずに所有するblobを作成する
    pub fn from_vec(bytes: Vec<u8>) -> ComHandle<Self> {
        Self::from_owner(bytes.into_boxed_slice())
    }

    /// バイト列を持つ任意の値をコピーせずに所有するblobを作成する。
    /// `owner` はblobが破棄されるときに一緒にdropされる。
    pub fn from_owner(owner: impl AsRef<[u8]> + Send + Sync + 'static) -> ComHandle<Self> {
        Self::with_storage(Storage::Owned(Box::new(owner)))
    }

    /// 呼び出し側のメモリを借りるblobを作成する。コピーも解放もしない。
    ///
    /// ## Safety
    /// `bytes` はこのblobへの参照がすべて解放されるまで生きていて、変更されてはいけない。
    pub unsafe fn unowned(bytes: &[u8]) -> ComHandle<Self> {
        Self::with_storage(Storage::Unowned {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
        })
    }

    /// `'static` なメモリを借りるblobを作成する
    pub fn unowned_static(bytes: &'static [u8]) -> ComHandle<Self> {
        unsafe { Self::unowned(bytes) }
    }

    /// 生のポインタとサイズからメモリを借りるblobを作成する。
    /// サイズが0でないのにnullが渡されたらエラー。
    ///
    /// ## Safety
    /// `ptr` から `len` バイトは読み取り可能で、`unowned` と同じ期間生きていなければならない。
    pub unsafe fn unowned_raw(ptr: *const u8, len: usize) -> Result<ComHandle<Self>> {
        if ptr.is_null() && len != 0 {
            return Err(Error::NullBuffer(len));
        }
        Ok(Self::with_storage(Storage::Unowned { ptr, len }))
    }

    /// バッファの先頭。サイズが0のときはnullになりうる。
    pub fn buffer_pointer(&self) -> *const u8 {
        let bytes = self.bytes();
        if bytes.is_empty() {
            std::ptr::null()
        } else {
            bytes.as_ptr()
        }
    }

    /// バッファのバイト数
    pub fn buffer_size(&self) -> usize {
        self.bytes().len()
    }

    /// 中身を所有しているか
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }
}

impl BlobSource for Blob {
    fn bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(owner) => (**owner).as_ref(),
            Storage::Unowned { len: 0, .. } => &[],
            Storage::Unowned { ptr, len } => unsafe { std::slice::from_raw_parts(*ptr, *len) },
        }
    }
}

impl CapabilityTable for Blob {
    const CAPABILITIES: &'static [Capability<Self>] =
        &[Capability::new(IID_BLOB, capability::primary::<Self>)];
}

unsafe impl ComCounted for Blob {
    fn add_ref(&self) -> u32 {
        self.base.add_ref()
    }

    unsafe fn release(this: NonNull<Self>) -> u32 {
        unsafe { ComBase::release(this, |blob| &blob.base) }
    }

    fn debug_com_count(&self) -> u32 {
        self.base.debug_count()
    }
}

// コピーは参照0の別のオブジェクトになる。所有しているものは中身もコピーし、借りているものは同じメモリを借りる。
impl Clone for Blob {
    fn clone(&self) -> Self {
        let storage = match &self.storage {
            Storage::Owned(_) => Storage::Owned(Box::new(self.bytes().to_vec().into_boxed_slice())),
            Storage::Unowned { ptr, len } => Storage::Unowned {
                ptr: *ptr,
                len: *len,
            },
        };
        Self {
            vtbl: self.vtbl,
            base: self.base.clone(),
            storage,
        }
    }
}

// Debugトレイトの実装
impl Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("owned", &self.is_owned())
            .field("size", &self.buffer_size())
            .field("count", &self.base.debug_count())
            .finish()
    }
}

// 借りているメモリも含めて中身は作成後に変更されないのでBlobはSend
unsafe impl Send for Blob {}
// 借りているメモリも含めて中身は作成後に変更されないのでBlobはSync
unsafe impl Sync for Blob {}
