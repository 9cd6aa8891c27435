//! 外部エンジンとの境界
//!
//! 局面表現・静的評価・探索はホスト側エンジンの責務で、ここでは
//! パイプラインが必要とする操作だけをトレイトとして規定する。
//!
//! rescoreパイプラインの全ワーカーは同一の探索制限を共有するが、
//! プロセス全域の可変状態ではなく不変の [`SearchLimits`] を
//! 各search呼び出しに渡す。これにより同一プロセス内の他の探索利用と
//! 干渉しない。

use anyhow::Result;

use crate::record::PackedSfen;

/// 1回のsearch呼び出しに適用する探索制限。
#[derive(Debug, Clone)]
pub struct SearchLimits {
    /// 探索深さ（1以上）
    pub depth: i32,
    /// 探索ノード数上限（0=無制限）
    pub nodes: u64,
    /// 要求する候補手（PV）の本数
    pub multi_pv: usize,
    /// 時間管理を行わない（`go infinite` 相当）
    pub infinite: bool,
    /// 途中経過（info行）を出力しない
    pub silent: bool,
}

impl SearchLimits {
    /// 再スコアリング用の制限。
    ///
    /// 時間無制限・ノード無制限・出力抑制・PV1本。ノード上限は
    /// スレッドごとの累積ノード数と比較されてしまうため使わない。
    pub fn rescore(depth: i32) -> Self {
        Self {
            depth,
            nodes: 0,
            multi_pv: 1,
            infinite: true,
            silent: true,
        }
    }
}

/// search呼び出しの結果。
pub struct SearchOutcome {
    /// 評価値（手番視点）
    pub score: i16,
    /// 最善応手列（Move16形式）。空なら合法手なし。
    pub pv: Vec<u16>,
}

/// ワーカー1本が専有する局面・探索状態。
///
/// 並行するsearch呼び出しが可変の局面状態を共有しないよう、
/// ワーカーごとに独立したセッションを持たせる。
pub trait EngineSession {
    /// pack表現から局面を復元する。
    fn set_from_packed(&mut self, packed: &PackedSfen) -> Result<()>;

    /// FEN/SFEN文字列から局面を設定する。
    fn set_from_sfen(&mut self, sfen: &str) -> Result<()>;

    /// 手数・千日手カウンタ類をリセットする。
    /// 再スコアリングは常に新規1手目の局面として評価するため。
    fn reset_rule50(&mut self);

    /// 現局面のpack表現を得る。
    fn sfen_pack(&self) -> PackedSfen;

    /// 現局面の静的評価（手番視点）。
    fn evaluate(&mut self) -> i16;

    /// 現局面を与えられた制限で探索する。
    fn search(&mut self, limits: &SearchLimits) -> SearchOutcome;
}

/// セッションの供給元。ワーカーごとに [`EngineSession`] を作る。
pub trait EngineBackend: Sync {
    type Session: EngineSession;

    fn new_session(&self) -> Self::Session;
}
