//! PackedSfenValue（40バイト教師データレコード）の符号化・復号
//!
//! YaneuraOu系のpack形式に準拠したリトルエンディアンのレコード。
//! パイプラインはsfen部分を不透明なバイト列として扱い、書き換えるのは
//! 原則scoreのみ。paddingを含む残りのフィールドはそのまま素通しする。
//!
//! | フィールド  | サイズ | 内容                                |
//! |-------------|--------|-------------------------------------|
//! | sfen        | 32     | PackedSfen (256bit)                 |
//! | score       | 2      | 評価値 (i16)                        |
//! | move16      | 2      | 最善手 Move16形式 (u16)             |
//! | game_ply    | 2      | 手数 (u16)                          |
//! | game_result | 1      | 勝敗 (i8: 1=勝ち, 0=引分, -1=負け)  |
//! | padding     | 1      | 予約                                |

use thiserror::Error;

/// PackedSfen本体（256bit）。中身の符号化・復号は局面側（エンジン）の責務。
pub type PackedSfen = [u8; 32];

/// レコード復号エラー
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record too short: {0} bytes (expected {size})", size = PackedSfenValue::SIZE)]
    TooShort(usize),
}

/// 40バイトの教師データレコード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedSfenValue {
    /// 局面のpack表現
    pub sfen: PackedSfen,
    /// 評価値
    pub score: i16,
    /// 最善手（Move16形式）
    pub move16: u16,
    /// 手数
    pub game_ply: u16,
    /// 勝敗（手番視点）
    pub game_result: i8,
    /// 予約。round-tripで保存する。
    pub padding: u8,
}

impl PackedSfenValue {
    /// レコード長（バイト）
    pub const SIZE: usize = 40;

    /// 丁度1レコード分のバイト列から復号する。
    pub fn from_array(bytes: &[u8; Self::SIZE]) -> Self {
        let mut sfen = [0u8; 32];
        sfen.copy_from_slice(&bytes[0..32]);
        Self {
            sfen,
            score: i16::from_le_bytes([bytes[32], bytes[33]]),
            move16: u16::from_le_bytes([bytes[34], bytes[35]]),
            game_ply: u16::from_le_bytes([bytes[36], bytes[37]]),
            game_result: bytes[38] as i8,
            padding: bytes[39],
        }
    }

    /// 先頭40バイトを復号する。足りなければエラー。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let head: &[u8; Self::SIZE] = bytes
            .get(0..Self::SIZE)
            .and_then(|s| s.try_into().ok())
            .ok_or(RecordError::TooShort(bytes.len()))?;
        Ok(Self::from_array(head))
    }

    /// ワイヤ形式（リトルエンディアン）にシリアライズする。
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..32].copy_from_slice(&self.sfen);
        bytes[32..34].copy_from_slice(&self.score.to_le_bytes());
        bytes[34..36].copy_from_slice(&self.move16.to_le_bytes());
        bytes[36..38].copy_from_slice(&self.game_ply.to_le_bytes());
        bytes[38] = self.game_result as u8;
        bytes[39] = self.padding;
        bytes
    }
}
