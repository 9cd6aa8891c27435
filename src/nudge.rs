//! 静的評価の数値ナッジ（nudged_static変換の本体）
//!
//! 静的評価を、レコードに記録された深い探索の評価値（deep eval）へ
//! 有界に寄せる。3つのモードがある:
//!
//! - Absolute: 差分を±absolute_nudgeに制限して加算
//! - Relative: 比率を [1-relative_nudge, 1+relative_nudge] に制限して乗算
//! - Interpolate: interpolate_nudgeによる線形ブレンド

/// ナッジの方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgedStaticMode {
    Absolute,
    Relative,
    Interpolate,
}

/// nudged_staticパイプラインのパラメータ
#[derive(Debug, Clone)]
pub struct NudgedStaticParams {
    pub input_file: String,
    pub output_file: String,
    pub mode: NudgedStaticMode,
    pub absolute_nudge: i32,
    pub relative_nudge: f32,
    pub interpolate_nudge: f32,
}

impl Default for NudgedStaticParams {
    fn default() -> Self {
        Self {
            input_file: "in.binpack".to_string(),
            output_file: "out.binpack".to_string(),
            mode: NudgedStaticMode::Absolute,
            absolute_nudge: 5,
            relative_nudge: 0.1,
            interpolate_nudge: 0.1,
        }
    }
}

impl NudgedStaticParams {
    /// absolute_nudge / relative_nudge を非負に丸める。
    /// interpolate_nudge は意図的に制約しない（[0,1]外の外挿を許す）。
    pub fn enforce_constraints(&mut self) {
        self.absolute_nudge = self.absolute_nudge.max(0);
        self.relative_nudge = self.relative_nudge.max(0.0);
    }
}

fn saturate_i32(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// 静的評価をdeep評価へ寄せた値を返す。純粋関数。
///
/// 中間計算はi32/f32で行い、結果はi16へ飽和させる。浮動小数の結果は
/// 0方向への切り捨て（Rustの `as` キャストは切り捨てかつ飽和、NaNは0）。
///
/// Relativeモードで `static_eval == 0` のときは比が定義できないため
/// 調整なし（0のまま）とする。
pub fn nudge(params: &NudgedStaticParams, static_eval: i16, deep_eval: i16) -> i16 {
    let s = i32::from(static_eval);
    let d = i32::from(deep_eval);

    match params.mode {
        NudgedStaticMode::Absolute => {
            // enforce_constraints前の値でもclampの前提(min <= max)を満たすこと
            let bound = params.absolute_nudge.max(0);
            saturate_i32(s + (d - s).clamp(-bound, bound))
        }
        NudgedStaticMode::Relative => {
            if static_eval == 0 {
                return 0;
            }
            let bound = params.relative_nudge.max(0.0);
            let ratio = (d as f32 / s as f32).clamp(1.0 - bound, 1.0 + bound);
            (s as f32 * ratio) as i16
        }
        NudgedStaticMode::Interpolate => {
            let t = params.interpolate_nudge;
            (s as f32 * (1.0 - t) + d as f32 * t) as i16
        }
    }
}
