//! 教師データ変換パイプライン
//!
//! packファイル（`PackedSfenValue` 列）とFENテキストを入力として、
//! 評価値の数値ナッジ（`nudged_static`）と探索による再スコアリング
//! （`rescore_fen`）を行うバッチパイプライン。
//!
//! 局面表現・静的評価・探索はこのクレートの管轄外で、[`engine`] の
//! トレイトを実装したホストエンジンが提供する。エントリポイントは
//! [`transform::transform`]: ホスト側のコマンドループから
//! `transform("<subcommand> key value ...", &backend)` の形で呼ぶ。

pub mod dispatch;
pub mod engine;
pub mod nudge;
pub mod record;
pub mod sink;
pub mod source;
pub mod stream;
pub mod transform;

pub use engine::{EngineBackend, EngineSession, SearchLimits, SearchOutcome};
pub use nudge::{nudge, NudgedStaticMode, NudgedStaticParams};
pub use record::{PackedSfen, PackedSfenValue};
pub use transform::{transform, RescoreFenParams};
