//! ワーカーディスパッチ
//!
//! 両パイプラインを共通の形に落とす: 共有ソースから1件取り、ワーカー
//! 専有の状態で変換し、結果があればシンクへ追加する。`threads <= 1` は
//! 呼び出し元スレッドでそのまま実行し、それ以外は固定数のOSスレッドを
//! 起動して全員の終了を待ってから返る。

use std::thread;

use anyhow::{anyhow, Context, Result};

use crate::record::PackedSfenValue;
use crate::sink::BatchSink;
use crate::source::SharedSource;
use crate::stream::RecordWriter;

/// 指定スレッド数を解決する。0なら利用可能な並列度。
pub fn resolve_threads(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
}

/// 汎用パイプライン実行。
///
/// `step` はレコード1件の変換。`None` を返した入力は破棄される
/// （リトライも書き込みもしない）。`make_state` はワーカーごとの
/// 専有状態（局面・探索スクラッチ等）を作る。
///
/// 出力順はワーカーの完了順であり、入力順は保証しない。
/// ワーカーのエラーは全スレッドのjoin後に最初の1件を返す。
pub fn run_pipeline<I, W, S, M, F>(
    source: &SharedSource<I>,
    sink: &BatchSink<W>,
    threads: usize,
    make_state: M,
    step: F,
) -> Result<()>
where
    I: Iterator + Send,
    I::Item: Send,
    W: RecordWriter + Send,
    M: Fn() -> S + Sync,
    F: Fn(&mut S, I::Item) -> Option<PackedSfenValue> + Sync,
{
    if threads <= 1 {
        return worker_loop(source, sink, &make_state, &step);
    }

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for idx in 0..threads {
            let handle = thread::Builder::new()
                .name(format!("transform-{idx}"))
                .spawn_scoped(scope, || worker_loop(source, sink, &make_state, &step))
                .with_context(|| format!("failed to spawn worker {idx}"))?;
            handles.push(handle);
        }

        let mut first_err = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_err.get_or_insert(e);
                }
                Err(_) => {
                    first_err.get_or_insert(anyhow!("worker thread panicked"));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

fn worker_loop<I, W, S, M, F>(
    source: &SharedSource<I>,
    sink: &BatchSink<W>,
    make_state: &M,
    step: &F,
) -> Result<()>
where
    I: Iterator,
    W: RecordWriter,
    M: Fn() -> S,
    F: Fn(&mut S, I::Item) -> Option<PackedSfenValue>,
{
    let mut state = make_state();
    while let Some(item) = source.next() {
        if let Some(record) = step(&mut state, item) {
            sink.append(record)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct SharedWriter<'a>(&'a Mutex<Vec<PackedSfenValue>>);

    impl RecordWriter for SharedWriter<'_> {
        fn write_batch(&mut self, batch: &[PackedSfenValue]) -> Result<()> {
            self.0.lock().extend_from_slice(batch);
            Ok(())
        }
    }

    fn record(tag: u16) -> PackedSfenValue {
        let mut sfen = [0u8; 32];
        sfen[0..2].copy_from_slice(&tag.to_le_bytes());
        PackedSfenValue {
            sfen,
            score: 0,
            move16: tag,
            game_ply: 1,
            game_result: 0,
            padding: 0,
        }
    }

    fn run_counting(total: u16, threads: usize, drop_every: u16) -> Vec<PackedSfenValue> {
        let written = Mutex::new(Vec::new());
        let source = SharedSource::new(0..total);
        let sink = BatchSink::new(SharedWriter(&written), 8);

        run_pipeline(
            &source,
            &sink,
            threads,
            || (),
            |_state, n: u16| {
                if drop_every > 0 && n % drop_every == 0 {
                    None
                } else {
                    Some(record(n))
                }
            },
        )
        .unwrap();
        sink.finish().unwrap();
        written.into_inner()
    }

    #[test]
    fn single_threaded_keeps_input_order() {
        let out = run_counting(20, 1, 0);
        let tags: Vec<u16> = out.iter().map(|r| r.move16).collect();
        assert_eq!(tags, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn pool_delivers_each_record_exactly_once() {
        // ワーカー数の倍数と非倍数の両方
        for (total, threads) in [(24u16, 4usize), (23, 4)] {
            let out = run_counting(total, threads, 0);
            assert_eq!(out.len(), usize::from(total));
            let mut tags: Vec<u16> = out.iter().map(|r| r.move16).collect();
            tags.sort_unstable();
            assert_eq!(tags, (0..total).collect::<Vec<_>>());
        }
    }

    #[test]
    fn skipped_records_are_dropped_not_retried() {
        let out = run_counting(30, 3, 5);
        // 0,5,10,15,20,25 の6件がスキップされる
        assert_eq!(out.len(), 24);
        assert!(out.iter().all(|r| r.move16 % 5 != 0));
    }
}
