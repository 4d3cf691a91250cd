//! プロトコル側の参照カウント操作を抽象化するトレイト。

use std::ptr::NonNull;

/// capability-query プロトコルから見える参照カウントを持つオブジェクト。
///
/// `ComBase` を持つオブジェクトでは唯一のカウントを、
/// `ComObjectBase` を持つオブジェクトではプロトコル側のカウントを操作する。
///
/// ## Safety
/// 実装する型は `Box` で確保されて `ComHandle` などを通して管理されることを前提にする。
/// `release` はカウントが0になったときにだけ、ちょうど一度オブジェクトを破棄しなければならない。
pub unsafe trait ComCounted: Sized {
    /// 参照を一つ増やし、増やした後のカウントを返す
    fn add_ref(&self) -> u32;

    /// 参照を一つ減らし、減らした後のカウントを返す。
    /// 0になったらオブジェクトを破棄する。
    ///
    /// ## Safety
    /// `this` は `Box::into_raw` で得た生きているオブジェクトを指し、
    /// 呼び出し側はそのオブジェクトへの参照を一つ保持していなければならない。
    /// 戻り値が0のとき `this` はもう無効になっている。
    unsafe fn release(this: NonNull<Self>) -> u32;

    /// 現在のカウント(デバッグ用)
    fn debug_com_count(&self) -> u32;
}
