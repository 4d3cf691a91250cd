//! 参照カウントの増減を自動で行うRAIIのハンドル。
//!
//! 手動の `add_ref` / `release` の対応はこれらの小さな型の中だけで取る。
//! Cloneで参照を増やし、Dropで参照を減らす。
//!
//! - `ComHandle` : 型付きのプロトコル側の参照
//! - `RefHandle` : 型付きの所有カウントの参照
//! - `ComPtr` : ABIの向こうのinterfaceへの参照

mod com_handle;
pub use com_handle::ComHandle;
mod ref_handle;
pub use ref_handle::RefHandle;
mod com_ptr;
pub use com_ptr::ComPtr;
