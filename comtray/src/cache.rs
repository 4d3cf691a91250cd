//! 名前付きのblobをライブラリ内部で所有し、必要に応じてプロトコル側へ公開するキャッシュ。
//!
//! キャッシュは所有カウントでblobを持ち、公開先はプロトコル側のカウントで持つ。
//! 公開中に追い出されても、最後の公開先が参照を返すまでblobは生き続ける。
//! 公開先がすべて参照を返すと後始末が走るが、キャッシュに残っている限りblobは破棄されない。

use crate::{
    blob::{blob_vtbl, BlobSource},
    capability::{self, Capability},
    com_object::{self, ComObject, ComObjectBase},
    ref_object::{RefCount, RefObject},
    CapabilityTable, ComCounted, ComPtr, IBlob, RefHandle,
};
use comtray_sys::{IBlobVtbl, IID_BLOB};
use std::{cell::Cell, collections::HashMap, fmt::Debug, ptr::NonNull};

static CACHED_BLOB_VTBL: IBlobVtbl = blob_vtbl::<CachedBlob>();

/// キャッシュに置かれるblob。所有カウントとプロトコル側のカウントの両方を持つ。
#[repr(C)]
pub struct CachedBlob {
    vtbl: &'static IBlobVtbl,
    base: ComObjectBase,
    name: String,
    bytes: Box<[u8]>,
    teardowns: Cell<u32>,
}
impl CachedBlob {
    /// バイト列をコピーして作成する。まだどこからも参照されていない。
    pub fn new(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            vtbl: &CACHED_BLOB_VTBL,
            base: ComObjectBase::new(),
            name: name.into(),
            bytes: bytes.into(),
            teardowns: Cell::new(0),
        }
    }

    /// キャッシュのキー
    pub fn name(&self) -> &str {
        &self.name
    }

    /// プロトコル側に公開されているか
    pub fn is_exported(&self) -> bool {
        self.base.debug_com_count() > 0
    }

    /// 公開が終わって後始末が走った回数
    pub fn teardowns(&self) -> u32 {
        self.teardowns.get()
    }
}

impl BlobSource for CachedBlob {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl CapabilityTable for CachedBlob {
    const CAPABILITIES: &'static [Capability<Self>] =
        &[Capability::new(IID_BLOB, capability::primary::<Self>)];
}

unsafe impl RefObject for CachedBlob {
    fn ref_count(&self) -> &RefCount {
        self.base.ref_count()
    }
}

impl ComObject for CachedBlob {
    fn com_object_base(&self) -> &ComObjectBase {
        &self.base
    }

    fn com_free(&self) {
        self.teardowns.set(self.teardowns.get() + 1);
        tracing::trace!(name = %self.name, "cached blob is no longer exported");
    }
}

unsafe impl ComCounted for CachedBlob {
    fn add_ref(&self) -> u32 {
        com_object::add_ref_impl(self)
    }

    unsafe fn release(this: NonNull<Self>) -> u32 {
        unsafe { com_object::release_impl(this) }
    }

    fn debug_com_count(&self) -> u32 {
        self.base.debug_com_count()
    }
}

// コピーはどちらのカウントも0の別のオブジェクトになる
impl Clone for CachedBlob {
    fn clone(&self) -> Self {
        Self {
            vtbl: self.vtbl,
            base: self.base.clone(),
            name: self.name.clone(),
            bytes: self.bytes.clone(),
            teardowns: Cell::new(0),
        }
    }
}

// Debugトレイトの実装
impl Debug for CachedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedBlob")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .field("base", &self.base)
            .finish()
    }
}

// 所有カウントが0になって破棄されるとき
impl Drop for CachedBlob {
    fn drop(&mut self) {
        tracing::trace!(name = %self.name, "cached blob destroyed");
        #[cfg(test)]
        tests::DESTROYED.with(|destroyed| destroyed.set(destroyed.get() + 1));
    }
}

/// 名前付きの `CachedBlob` のキャッシュ
#[derive(Debug, Default)]
pub struct BlobCache {
    entries: HashMap<String, RefHandle<CachedBlob>>,
}
impl BlobCache {
    /// 空のキャッシュを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// バイト列をコピーしてキャッシュに置く。同じ名前のものがあれば置き換える。
    pub fn insert(&mut self, name: impl Into<String>, bytes: &[u8]) -> RefHandle<CachedBlob> {
        let name = name.into();
        let handle = RefHandle::new(CachedBlob::new(name.clone(), bytes));
        if let Some(previous) = self.entries.insert(name, handle.clone()) {
            tracing::trace!(name = %previous.name(), "replaced cached blob");
        }
        handle
    }

    /// 名前からblobを取得する
    pub fn get(&self, name: &str) -> Option<RefHandle<CachedBlob>> {
        self.entries.get(name).cloned()
    }

    /// 名前のblobをプロトコル側へ公開する
    pub fn export(&self, name: &str) -> Option<ComPtr<IBlob>> {
        let handle = self.entries.get(name)?;
        handle.to_com().into_interface().ok()
    }

    /// 名前のblobが公開中か
    pub fn is_exported(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map_or(false, |handle| handle.is_exported())
    }

    /// キャッシュから追い出す。公開中ならblobは最後の参照が返されるまで生き続ける。
    pub fn evict(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// キャッシュされているblobの数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// キャッシュが空か
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
