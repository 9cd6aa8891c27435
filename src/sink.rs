//! バッチ書き込みシンク
//!
//! レコードをバッファに蓄積し、閾値に達したらまとめて書き出す。
//! 書き出しとバッファのクリアはロックを保持したまま行う。そうしないと
//! 並行するappend同士でフラッシュが競合し、レコードの重複や欠落が
//! 起こり得る。

use anyhow::Result;
use parking_lot::Mutex;

use crate::record::PackedSfenValue;
use crate::stream::RecordWriter;

/// ミューテックスで保護されたバッチシンク。
pub struct BatchSink<W: RecordWriter> {
    state: Mutex<SinkState<W>>,
    threshold: usize,
}

struct SinkState<W> {
    buffer: Vec<PackedSfenValue>,
    writer: W,
    /// これまでにフラッシュしたレコードの累計。進捗表示用。
    processed: u64,
}

impl<W: RecordWriter> BatchSink<W> {
    pub fn new(writer: W, threshold: usize) -> Self {
        Self {
            state: Mutex::new(SinkState {
                buffer: Vec::with_capacity(threshold),
                writer,
                processed: 0,
            }),
            threshold: threshold.max(1),
        }
    }

    /// レコードを1件追加する。バッファが閾値に達したらこの呼び出しの
    /// 中でフラッシュする。
    pub fn append(&self, record: PackedSfenValue) -> Result<()> {
        let mut state = self.state.lock();
        state.buffer.push(record);
        if state.buffer.len() >= self.threshold {
            state.flush()?;
        }
        Ok(())
    }

    /// 残りを書き出してシンクを閉じ、処理したレコードの累計を返す。
    pub fn finish(self) -> Result<u64> {
        let mut state = self.state.into_inner();
        if !state.buffer.is_empty() {
            state.flush()?;
        }
        state.writer.finish()?;
        Ok(state.processed)
    }
}

impl<W: RecordWriter> SinkState<W> {
    fn flush(&mut self) -> Result<()> {
        self.processed += self.buffer.len() as u64;
        self.writer.write_batch(&self.buffer)?;
        self.buffer.clear();
        log::info!("Processed {} positions", self.processed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CaptureWriter {
        batches: Vec<Vec<PackedSfenValue>>,
        finished: bool,
    }

    impl RecordWriter for &mut CaptureWriter {
        fn write_batch(&mut self, batch: &[PackedSfenValue]) -> Result<()> {
            self.batches.push(batch.to_vec());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn record(tag: u8) -> PackedSfenValue {
        PackedSfenValue {
            sfen: [tag; 32],
            score: 0,
            move16: 0,
            game_ply: 1,
            game_result: 0,
            padding: 0,
        }
    }

    #[test]
    fn exactly_threshold_triggers_single_flush() {
        let mut writer = CaptureWriter::default();
        let sink = BatchSink::new(&mut writer, 3);
        for i in 0..3 {
            sink.append(record(i)).unwrap();
        }
        let total = sink.finish().unwrap();

        assert_eq!(total, 3);
        assert_eq!(writer.batches.len(), 1);
        assert_eq!(writer.batches[0].len(), 3);
        assert!(writer.finished);
    }

    #[test]
    fn below_threshold_flushes_only_at_finish() {
        let mut writer = CaptureWriter::default();
        let sink = BatchSink::new(&mut writer, 3);
        sink.append(record(1)).unwrap();
        sink.append(record(2)).unwrap();
        let total = sink.finish().unwrap();

        assert_eq!(total, 2);
        assert_eq!(writer.batches.len(), 1);
        assert_eq!(writer.batches[0].len(), 2);
    }

    #[test]
    fn threshold_plus_remainder_flushes_twice() {
        let mut writer = CaptureWriter::default();
        let sink = BatchSink::new(&mut writer, 3);
        for i in 0..4 {
            sink.append(record(i)).unwrap();
        }
        let total = sink.finish().unwrap();

        assert_eq!(total, 4);
        assert_eq!(writer.batches.len(), 2);
        assert_eq!(writer.batches[0].len(), 3);
        assert_eq!(writer.batches[1].len(), 1);
    }

    #[test]
    fn empty_sink_writes_nothing() {
        let mut writer = CaptureWriter::default();
        let sink = BatchSink::new(&mut writer, 3);
        let total = sink.finish().unwrap();

        assert_eq!(total, 0);
        assert!(writer.batches.is_empty());
        assert!(writer.finished);
    }
}
