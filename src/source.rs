//! 共有レコードソース
//!
//! 下位のリーダはスレッドセーフではないため、1件の取り出しの間だけ
//! ロックで直列化する。各レコードは丁度1つの呼び出し元に渡り、
//! どのワーカーに渡るかは不定（負荷分散）。

use parking_lot::Mutex;

/// 任意のイテレータをミューテックスで包んだ逐次カーソル。
///
/// ストリームが尽きた後の `next()` は常に `None` を返す。
pub struct SharedSource<I> {
    inner: Mutex<I>,
}

impl<I: Iterator> SharedSource<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// 次のレコードを1件取り出す。ロックはこの1回の読み取りの間だけ
    /// 保持し、変換処理中には保持しない。
    pub fn next(&self) -> Option<I::Item> {
        self.inner.lock().next()
    }
}
