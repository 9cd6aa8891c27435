//! packファイル・FENテキストの入出力ストリーム
//!
//! packファイルはレコード長40バイトの生バイナリ（拡張子 `bin` / `pack` /
//! `binpack`）。それ以外の拡張子は処理開始前にエラーとして弾く。
//! FEN入力はプレーンテキストを行単位で読む。

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::record::PackedSfenValue;

/// レコードI/Oのバッファサイズ（1MiB）
const IO_BUF_CAP: usize = 1024 * 1024;

/// これより短い行はFENとして不正（空行・ゴミ行）とみなして読み飛ばす。
pub const MIN_FEN_LEN: usize = 10;

fn has_pack_extension(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    matches!(ext.as_deref(), Some("bin" | "pack" | "binpack"))
}

/// pack入力ファイルを開く。対応しない拡張子はエラー。
pub fn open_pack_input<P: AsRef<Path>>(path: P) -> Result<PackReader> {
    let path = path.as_ref();
    if !has_pack_extension(path) {
        bail!("unsupported input file type: {}", path.display());
    }
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(PackReader {
        reader: BufReader::with_capacity(IO_BUF_CAP, file),
    })
}

/// pack出力ファイルを新規作成する。対応しない拡張子はエラー。
pub fn create_pack_output<P: AsRef<Path>>(path: P) -> Result<PackWriter> {
    let path = path.as_ref();
    if !has_pack_extension(path) {
        bail!("unsupported output file type: {}", path.display());
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(PackWriter {
        writer: BufWriter::with_capacity(IO_BUF_CAP, file),
    })
}

/// FENテキスト入力を開く。拡張子は問わない。
pub fn open_fen_input<P: AsRef<Path>>(path: P) -> Result<FenReader> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(FenReader {
        lines: BufReader::with_capacity(IO_BUF_CAP, file).lines(),
    })
}

/// packファイルの逐次リーダ。
///
/// クリーンなEOFで `None` を返し、以後も `None` のまま。末尾の
/// 不完全なレコードとI/Oエラーは警告を出してストリームを終端する。
pub struct PackReader {
    reader: BufReader<File>,
}

impl PackReader {
    fn read_record(&mut self) -> io::Result<Option<PackedSfenValue>> {
        let mut buf = [0u8; PackedSfenValue::SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < buf.len() {
            log::warn!(
                "dropping truncated trailing record ({filled} of {} bytes)",
                PackedSfenValue::SIZE
            );
            return Ok(None);
        }
        Ok(Some(PackedSfenValue::from_array(&buf)))
    }
}

impl Iterator for PackReader {
    type Item = PackedSfenValue;

    fn next(&mut self) -> Option<PackedSfenValue> {
        match self.read_record() {
            Ok(record) => record,
            Err(e) => {
                log::warn!("pack input aborted: {e}");
                None
            }
        }
    }
}

/// バッチ単位のレコード書き込み先。フラッシュ1回につき1回呼ばれる。
pub trait RecordWriter {
    fn write_batch(&mut self, batch: &[PackedSfenValue]) -> Result<()>;

    /// ストリームを確定させる。パイプライン終了時に1回呼ばれる。
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// packファイルへの追記ライタ。
pub struct PackWriter {
    writer: BufWriter<File>,
}

impl RecordWriter for PackWriter {
    fn write_batch(&mut self, batch: &[PackedSfenValue]) -> Result<()> {
        for record in batch {
            self.writer
                .write_all(&record.to_bytes())
                .context("failed to write record batch")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush pack output")
    }
}

/// FENテキストの行リーダ。[`MIN_FEN_LEN`] 未満の行は読み飛ばす。
pub struct FenReader {
    lines: Lines<BufReader<File>>,
}

impl Iterator for FenReader {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            match self.lines.next()? {
                Ok(mut line) => {
                    while line.ends_with('\r') {
                        line.pop();
                    }
                    if line.len() >= MIN_FEN_LEN {
                        return Some(line);
                    }
                }
                Err(e) => {
                    log::warn!("fen input aborted: {e}");
                    return None;
                }
            }
        }
    }
}
