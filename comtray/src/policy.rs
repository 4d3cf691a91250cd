//! 参照カウントの不変条件が破られたときの扱い。
//!
//! `validation` featureが有効なとき(デフォルト)は、違反をログに出してpanicする。
//! 無効なときは不変条件が常に成り立つものとして扱い、コンパイラへのヒントにする。
//! この切り替えはこのモジュールだけで行い、呼び出し側では分岐しない。

use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "validation")]
pub(crate) const VALIDATE_COUNTS: bool = true;
#[cfg(not(feature = "validation"))]
pub(crate) const VALIDATE_COUNTS: bool = false;

/// 参照カウントの増加の上限。これを超えるのはリークとみなす。
pub(crate) const MAX_REFERENCES: u32 = u32::MAX / 2;

/// 参照カウント操作の契約違反
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// カウントが0のオブジェクトをreleaseした
    #[error("use after free: `{0}` released with no outstanding references")]
    UseAfterFree(&'static str),
    /// 参照が一つもないオブジェクトに対して一意性を問い合わせた
    #[error("invalid state: uniqueness of `{0}` queried with no outstanding references")]
    InvalidState(&'static str),
}

#[cold]
#[inline(never)]
#[track_caller]
fn raise(fault: Fault) -> ! {
    tracing::error!(%fault, "reference count invariant violated");
    panic!("{}", fault);
}

/// `holds` が偽なら契約違反として扱う。
///
/// ## Safety
/// `validation` が無効なビルドでは `holds` が偽になることは未定義動作になる。
#[inline]
#[track_caller]
pub(crate) unsafe fn ensure(holds: bool, fault: impl FnOnce() -> Fault) {
    if VALIDATE_COUNTS {
        if !holds {
            raise(fault());
        }
    } else if !holds {
        unsafe { std::hint::unreachable_unchecked() }
    }
}

/// `validation` が有効なときだけ検査する。無効なビルドでは何も仮定しない。
#[inline]
#[track_caller]
pub(crate) fn check(holds: bool, fault: impl FnOnce() -> Fault) {
    if VALIDATE_COUNTS && !holds {
        raise(fault());
    }
}

/// 増加後のカウントが上限を超えていないことを確かめる。これはビルド設定によらず常に検査する。
#[inline]
pub(crate) fn ensure_not_leaking(previous: u32, name: &'static str) {
    if previous > MAX_REFERENCES {
        panic!("Too many references to {}", name);
    }
}

/// アトミックなカウントを1減らし、減らした後の値を返す。
///
/// 減少はRelease、0になったときの後始末に必要なAcquireのfenceは呼び出し側で行う。
///
/// ## Safety
/// `validation` が無効なビルドでは、カウントが0でないことを呼び出し側が保証する。
#[inline]
#[track_caller]
pub(crate) unsafe fn release_atomic(count: &AtomicU32, name: &'static str) -> u32 {
    if VALIDATE_COUNTS {
        match count.fetch_update(Ordering::Release, Ordering::Relaxed, |c| c.checked_sub(1)) {
            Ok(previous) => previous - 1,
            Err(_) => raise(Fault::UseAfterFree(name)),
        }
    } else {
        let previous = count.fetch_sub(1, Ordering::Release);
        unsafe { ensure(previous != 0, || Fault::UseAfterFree(name)) };
        previous - 1
    }
}
