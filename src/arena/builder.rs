use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};

use super::coalescing::DEFAULT_HUNK_SIZE;
use super::CoalescingArena;
use crate::alignment::Alignment;
use crate::hunk::{HunkSource, SystemHunkSource};
use crate::metrics::ArenaMetrics;

/// `CoalescingArena`のビルダ.
#[derive(Debug, Clone)]
pub struct CoalescingArenaBuilder {
    hunk_size: usize,
    alignment: Alignment,
    metrics: MetricBuilder,
    logger: Logger,
}
impl CoalescingArenaBuilder {
    /// デフォルト設定で`CoalescingArenaBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        CoalescingArenaBuilder {
            hunk_size: 0,
            alignment: Alignment::default(),
            metrics: MetricBuilder::new(),
            logger: Logger::root(Discard, o!()),
        }
    }

    /// ハンクサイズ(メモリ源への要求の粒度)を設定する.
    ///
    /// `0`を指定した場合には、プロセス共通のデフォルト値
    /// (`DEFAULT_HUNK_SIZE`)が使用される.
    ///
    /// なお、実際に使用されるハンクサイズは、
    /// アリーナの構築時にアライメント単位の倍数へと切り上げられる.
    ///
    /// デフォルト値は`0`.
    pub fn hunk_size(&mut self, hunk_size: usize) -> &mut Self {
        self.hunk_size = hunk_size;
        self
    }

    /// アライメント単位を設定する.
    ///
    /// 全ての割当要求サイズとハンクサイズは、この単位の倍数へと切り上げられる.
    ///
    /// デフォルト値は`Alignment::word()`.
    pub fn alignment(&mut self, alignment: Alignment) -> &mut Self {
        self.alignment = alignment;
        self
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// アリーナ用のloggerを登録する.
    ///
    /// デフォルトでは何も出力されない.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// プラットフォームアロケータをメモリ源とするアリーナを構築する.
    pub fn build(&self) -> CoalescingArena<SystemHunkSource> {
        self.build_with_source(SystemHunkSource::new())
    }

    /// 指定のメモリ源を用いるアリーナを構築する.
    pub fn build_with_source<S>(&self, source: S) -> CoalescingArena<S>
    where
        S: HunkSource,
    {
        let hunk_size = if self.hunk_size == 0 {
            DEFAULT_HUNK_SIZE
        } else {
            self.hunk_size
        };
        let hunk_size = self.alignment.ceil_align(hunk_size);
        CoalescingArena::with_source(
            hunk_size,
            self.alignment,
            source,
            ArenaMetrics::new(&self.metrics),
            self.logger.clone(),
        )
    }
}
impl Default for CoalescingArenaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
