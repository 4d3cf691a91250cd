use comtray::{ComPtr, IBlob};

const SPIRV_MAGIC: u32 = 0x0723_0203;
const RAW_PREVIEW: usize = 16;

/// SPIR-Vのモジュールならワード数とバージョンを返す
pub fn spirv_header(bytes: &[u8]) -> Option<(usize, u8, u8)> {
    if bytes.len() < 20 || bytes.len() % 4 != 0 {
        return None;
    }
    // 先頭のバイトでエンディアンを判定する
    let read: fn([u8; 4]) -> u32 = match bytes[0] {
        0x03 => u32::from_le_bytes,
        0x07 => u32::from_be_bytes,
        _ => return None,
    };
    let word = |i: usize| read(bytes[i * 4..i * 4 + 4].try_into().unwrap_or_default());
    if word(0) != SPIRV_MAGIC {
        return None;
    }
    let version = word(1);
    Some((bytes.len() / 4, (version >> 16) as u8, (version >> 8) as u8))
}

/// blobの概要を表示する
pub fn print_blob(label: &str, blob: &ComPtr<IBlob>, raw: bool) {
    let bytes = blob.as_bytes();
    println!("{}: {} bytes", label, blob.buffer_size());
    if let Some((words, major, minor)) = spirv_header(bytes) {
        println!("  SPIR-V {}.{} module, {} words", major, minor, words);
    }
    if raw {
        let preview = bytes
            .iter()
            .take(RAW_PREVIEW)
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  raw: {}", preview);
    }
    tracing::debug!(label, iid = %comtray::sys::IID_BLOB, "inspected blob");
}
