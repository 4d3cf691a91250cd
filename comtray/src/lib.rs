//! 一つのオブジェクトを二つの所有の仕組みで同時に共有するための参照カウントのオブジェクトモデル。
//!
//! - capability-query プロトコル : ABIの境界を越えて、識別子でinterfaceを問い合わせ、
//!   `add_ref` / `release` で参照を増減する。カウントはアトミック。
//! - 侵入型の所有 : ライブラリの内部で、オブジェクト自身のメソッドで参照を増減する。カウントは非アトミック。
//!
//! 土台は三種類ある。
//! プロトコルの中だけに存在するオブジェクトには `ComBase`、
//! 内部だけで所有するオブジェクトには `RefCount`、
//! 両方から参照されるオブジェクトには二つのカウントを持つ `ComObjectBase` を使う。
//! どの土台でも、最後に参照を返した側がちょうど一度だけオブジェクトを破棄する。
//!
//! 参照カウントの実装には「詳解 Rustアトミック操作とロック ―並行処理実装のための低レイヤプログラミング」の
//! Arcの実装を参考にしている。
//! メモリのOrderingなどは、それに準拠している。
#![warn(missing_docs)]

mod base;
pub use base::ComBase;
mod counted;
pub use counted::ComCounted;
pub mod ref_object;
pub use ref_object::{RefCount, RefObject};
pub mod com_object;
pub use com_object::{ComObject, ComObjectBase};
pub mod capability;
pub use capability::{Capability, CapabilityTable};
pub mod vtable;
mod interfaces;
pub use interfaces::{IBlob, IUnknown, Interface};
pub mod handles;
pub use handles::*;
mod blob;
pub use blob::{blob_vtbl, Blob, BlobSource};
mod cache;
pub use cache::{BlobCache, CachedBlob};
pub mod policy;
pub use policy::Fault;
mod error;
pub use error::{Error, Result};

pub use comtray_sys as sys;
pub use comtray_sys::Guid;
