use comtray_sys::Guid;

/// 通常の値として返される失敗
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// オブジェクトが要求されたcapabilityをサポートしていない
    #[error("no such capability: {0}")]
    NoSuchCapability(Guid),
    /// 長さが0でないのにバッファのポインタがnull
    #[error("null buffer pointer with a size of {0} bytes")]
    NullBuffer(usize),
    /// blobの中身を要求された型のスライスとして解釈できない
    #[error("blob contents cannot be viewed as the requested type: {0}")]
    Cast(String),
}

/// comtrayのResult
pub type Result<T, E = Error> = std::result::Result<T, E>;
