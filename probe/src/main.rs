use anyhow::{ensure, Context, Result};
use clap::Parser;
use comtray::{Blob, ComPtr, IBlob, IUnknown};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod report;

/// ファイルをblobに読み込み、capability-query プロトコルだけを通して中身を調べる
#[derive(Debug, Parser)]
#[command(name = "probe", version)]
struct Args {
    /// 調べるファイル
    files: Vec<PathBuf>,

    /// 呼び出し側のメモリを借りるblobに包んで診断メッセージとして表示する文字列
    #[arg(long)]
    alias: Option<String>,

    /// 先頭のバイト列を16進数で表示する
    #[arg(long)]
    raw: bool,
}

fn inspect_file(path: &Path, raw: bool) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    // ここから先はinterfaceのポインタだけで扱う
    let unknown: ComPtr<IUnknown> = Blob::from_vec(bytes).into_interface()?;
    let blob: ComPtr<IBlob> = unknown.query()?;
    ensure!(
        unknown.same_object(&blob)?,
        "{} does not satisfy the identity rule",
        path.display()
    );
    drop(unknown);

    report::print_blob(&path.display().to_string(), &blob, raw);
    Ok(())
}

fn inspect_alias(text: &str, raw: bool) -> Result<()> {
    // textはこの関数の中でblobより長く生きる
    let blob: ComPtr<IBlob> = unsafe { Blob::unowned(text.as_bytes()) }.into_interface()?;
    ensure!(
        blob.buffer_pointer() == text.as_ptr() || text.is_empty(),
        "aliasing blob copied its storage"
    );
    report::print_blob("--alias", &blob, raw);
    println!("  text: {}", blob.diagnostic_text());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.files.is_empty() && args.alias.is_none() {
        tracing::warn!("nothing to inspect");
    }

    for path in &args.files {
        inspect_file(path, args.raw)?;
    }
    if let Some(text) = &args.alias {
        inspect_alias(text, args.raw)?;
    }
    Ok(())
}
