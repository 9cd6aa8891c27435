//! 変換パイプラインのドライバとサブコマンドディスパッチ
//!
//! ホストエンジンのコマンドループから
//! `transform("<subcommand> key value ...", &backend)` の形で呼ばれる。
//! サブコマンドは `nudged_static` と `rescore_fen`。未知のサブコマンドは
//! 報告のみで、致命的エラーにはしない。
//!
//! パラメータは `キーワード 値` の平坦な並び。未知のキーワードは
//! 読み飛ばし、値が欠けている・解釈できないキーワードは設定エラーとして
//! 処理開始前に返す。

use std::str::{FromStr, SplitWhitespace};

use anyhow::{anyhow, Context, Result};

use crate::dispatch::{resolve_threads, run_pipeline};
use crate::engine::{EngineBackend, EngineSession, SearchLimits};
use crate::nudge::{nudge, NudgedStaticMode, NudgedStaticParams};
use crate::record::PackedSfenValue;
use crate::sink::BatchSink;
use crate::source::SharedSource;
use crate::stream::{create_pack_output, open_fen_input, open_pack_input};

/// nudgeパイプラインのフラッシュ閾値。
pub const NUDGE_BATCH_SIZE: usize = 1_000_000;

/// rescoreパイプラインのフラッシュ閾値。探索は1件あたりのコストが
/// 桁違いに重いため、小さくして進捗とチェックポイントの粒度を細かくする。
pub const RESCORE_BATCH_SIZE: usize = 10_000;

/// rescore_fenパイプラインのパラメータ
#[derive(Debug, Clone)]
pub struct RescoreFenParams {
    pub input_file: String,
    pub output_file: String,
    /// 探索深さ（1以上）
    pub depth: i32,
    /// ワーカースレッド数（0=自動）
    pub threads: usize,
}

impl Default for RescoreFenParams {
    fn default() -> Self {
        Self {
            input_file: "in.epd".to_string(),
            output_file: "out.binpack".to_string(),
            depth: 3,
            threads: 0,
        }
    }
}

impl RescoreFenParams {
    pub fn enforce_constraints(&mut self) {
        self.depth = self.depth.max(1);
    }
}

/// サブコマンドを解決してパイプラインを実行する。
///
/// 未知のサブコマンドは報告して `Ok(())` を返す。開けない入力・
/// 作れない出力・不正なパラメータ値は処理開始前にエラーとして返る。
pub fn transform<B: EngineBackend>(args: &str, backend: &B) -> Result<()> {
    let mut tokens = args.split_whitespace();
    match tokens.next() {
        Some("nudged_static") => nudged_static(&mut tokens, backend),
        Some("rescore_fen") => rescore_fen(&mut tokens, backend),
        Some(other) => {
            log::error!("Invalid subcommand {other}. Exiting...");
            Ok(())
        }
        None => {
            log::error!("Missing transform subcommand. Exiting...");
            Ok(())
        }
    }
}

fn parse_value<T: FromStr>(tokens: &mut SplitWhitespace<'_>, keyword: &str) -> Result<T> {
    let raw = tokens
        .next()
        .ok_or_else(|| anyhow!("missing value for '{keyword}'"))?;
    raw.parse()
        .map_err(|_| anyhow!("invalid value '{raw}' for '{keyword}'"))
}

fn parse_nudged_static_params(tokens: &mut SplitWhitespace<'_>) -> Result<NudgedStaticParams> {
    let mut params = NudgedStaticParams::default();
    while let Some(token) = tokens.next() {
        match token {
            "absolute" => {
                params.mode = NudgedStaticMode::Absolute;
                params.absolute_nudge = parse_value(tokens, token)?;
            }
            "relative" => {
                params.mode = NudgedStaticMode::Relative;
                params.relative_nudge = parse_value(tokens, token)?;
            }
            "interpolate" => {
                params.mode = NudgedStaticMode::Interpolate;
                params.interpolate_nudge = parse_value(tokens, token)?;
            }
            "input_file" => params.input_file = parse_value(tokens, token)?,
            "output_file" => params.output_file = parse_value(tokens, token)?,
            _ => {}
        }
    }
    Ok(params)
}

fn parse_rescore_fen_params(tokens: &mut SplitWhitespace<'_>) -> Result<RescoreFenParams> {
    let mut params = RescoreFenParams::default();
    while let Some(token) = tokens.next() {
        match token {
            "depth" => params.depth = parse_value(tokens, token)?,
            "threads" => params.threads = parse_value(tokens, token)?,
            "input_file" => params.input_file = parse_value(tokens, token)?,
            "output_file" => params.output_file = parse_value(tokens, token)?,
            _ => {}
        }
    }
    Ok(params)
}

fn nudged_static<B: EngineBackend>(tokens: &mut SplitWhitespace<'_>, backend: &B) -> Result<()> {
    let mut params = parse_nudged_static_params(tokens)?;

    log::info!("Performing transform nudged_static with parameters:");
    log::info!("input_file          : {}", params.input_file);
    log::info!("output_file         : {}", params.output_file);
    match params.mode {
        NudgedStaticMode::Absolute => {
            log::info!("mode                : absolute");
            log::info!("absolute_nudge      : {}", params.absolute_nudge);
        }
        NudgedStaticMode::Relative => {
            log::info!("mode                : relative");
            log::info!("relative_nudge      : {}", params.relative_nudge);
        }
        NudgedStaticMode::Interpolate => {
            log::info!("mode                : interpolate");
            log::info!("interpolate_nudge   : {}", params.interpolate_nudge);
        }
    }

    params.enforce_constraints();
    do_nudged_static(&params, backend)
}

/// nudgeパイプライン本体。静的評価が安価なため単一スレッドで回す。
pub fn do_nudged_static<B: EngineBackend>(
    params: &NudgedStaticParams,
    backend: &B,
) -> Result<()> {
    let source = SharedSource::new(
        open_pack_input(&params.input_file).context("invalid input file")?,
    );
    let sink = BatchSink::new(
        create_pack_output(&params.output_file).context("invalid output file")?,
        NUDGE_BATCH_SIZE,
    );

    run_pipeline(
        &source,
        &sink,
        1,
        || backend.new_session(),
        |session: &mut B::Session, mut ps: PackedSfenValue| {
            if let Err(e) = session.set_from_packed(&ps.sfen) {
                log::warn!("skipping record with unreadable packed sfen: {e}");
                return None;
            }
            let static_eval = session.evaluate();
            let deep_eval = ps.score;
            ps.score = nudge(params, static_eval, deep_eval);
            Some(ps)
        },
    )?;

    let total = sink.finish()?;
    log::info!("Finished, {total} positions total");
    Ok(())
}

fn rescore_fen<B: EngineBackend>(tokens: &mut SplitWhitespace<'_>, backend: &B) -> Result<()> {
    let mut params = parse_rescore_fen_params(tokens)?;

    log::info!("Performing transform rescore_fen with parameters:");
    log::info!("depth               : {}", params.depth);
    log::info!("threads             : {}", params.threads);
    log::info!("input_file          : {}", params.input_file);
    log::info!("output_file         : {}", params.output_file);

    params.enforce_constraints();
    do_rescore_fen(&params, backend)
}

/// rescoreパイプライン本体。FEN行を読み、探索で一から採点し直した
/// レコードを書き出す。PVが空の局面（合法手なし）は破棄する。
pub fn do_rescore_fen<B: EngineBackend>(params: &RescoreFenParams, backend: &B) -> Result<()> {
    let source = SharedSource::new(
        open_fen_input(&params.input_file).context("invalid input file")?,
    );
    let sink = BatchSink::new(
        create_pack_output(&params.output_file).context("invalid output file")?,
        RESCORE_BATCH_SIZE,
    );

    let threads = resolve_threads(params.threads);
    log::info!("Using {threads} worker threads for rescoring");

    // 全ワーカーが共有する探索制限。探索中は不変。
    let limits = SearchLimits::rescore(params.depth);

    run_pipeline(
        &source,
        &sink,
        threads,
        || backend.new_session(),
        |session: &mut B::Session, fen: String| {
            if let Err(e) = session.set_from_sfen(&fen) {
                log::warn!("skipping unparsable position '{fen}': {e}");
                return None;
            }
            session.reset_rule50();

            let outcome = session.search(&limits);
            let best = *outcome.pv.first()?;

            Some(PackedSfenValue {
                sfen: session.sfen_pack(),
                score: outcome.score,
                move16: best,
                game_ply: 1,
                game_result: 0,
                padding: 0,
            })
        },
    )?;

    let total = sink.finish()?;
    log::info!("Finished, {total} positions total");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_nudged(args: &str) -> Result<NudgedStaticParams> {
        parse_nudged_static_params(&mut args.split_whitespace())
    }

    #[test]
    fn nudged_params_default_when_no_tokens() {
        let p = parse_nudged("").unwrap();
        assert_eq!(p.mode, NudgedStaticMode::Absolute);
        assert_eq!(p.absolute_nudge, 5);
        assert_eq!(p.input_file, "in.binpack");
    }

    #[test]
    fn nudged_params_mode_follows_last_keyword() {
        let p = parse_nudged("absolute 20 interpolate 0.5").unwrap();
        assert_eq!(p.mode, NudgedStaticMode::Interpolate);
        assert_eq!(p.absolute_nudge, 20);
        assert_eq!(p.interpolate_nudge, 0.5);
    }

    #[test]
    fn unknown_keywords_are_skipped() {
        let p = parse_nudged("bogus relative 0.2 input_file a.bin").unwrap();
        assert_eq!(p.mode, NudgedStaticMode::Relative);
        assert_eq!(p.relative_nudge, 0.2);
        assert_eq!(p.input_file, "a.bin");
    }

    #[test]
    fn missing_or_invalid_value_is_an_error() {
        assert!(parse_nudged("absolute").is_err());
        assert!(parse_nudged("absolute twenty").is_err());
    }

    #[test]
    fn rescore_params_parse_and_enforce() {
        let mut p =
            parse_rescore_fen_params(&mut "depth -4 threads 2 input_file x.epd".split_whitespace())
                .unwrap();
        assert_eq!(p.depth, -4);
        assert_eq!(p.threads, 2);
        assert_eq!(p.input_file, "x.epd");
        p.enforce_constraints();
        assert_eq!(p.depth, 1);
    }
}
