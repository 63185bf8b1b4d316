//! [Prometheus][prometheus]用のメトリクス.
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, MetricBuilder};

/// アリーナのメトリクス.
#[derive(Debug, Clone)]
pub struct ArenaMetrics {
    pub(crate) inserted_free_blocks: Counter,
    pub(crate) removed_free_blocks: Counter,
    pub(crate) allocated_blocks: Counter,
    pub(crate) allocated_bytes: Counter,
    pub(crate) freed_blocks: Counter,
    pub(crate) freed_bytes: Counter,
    pub(crate) acquired_hunks: Counter,
    pub(crate) acquired_hunk_bytes: Counter,
}
impl ArenaMetrics {
    /// 空きリストに挿入されたブロックの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_inserted_free_blocks_total <COUNTER>
    /// ```
    pub fn inserted_free_blocks(&self) -> u64 {
        self.inserted_free_blocks.value() as u64
    }

    /// 空きリストから削除されたブロックの数.
    ///
    /// 合体によって隣接ブロックに吸収されたエントリもここに含まれる.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_removed_free_blocks_total <COUNTER>
    /// ```
    pub fn removed_free_blocks(&self) -> u64 {
        self.removed_free_blocks.value() as u64
    }

    /// 空きリストの現在の長さ.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_inserted_free_blocks_total - coalloc_arena_removed_free_blocks_total
    /// ```
    pub fn free_list_len(&self) -> usize {
        // NOTE: 以下の順番で値を取得しないとアンダーフローする可能性がある
        let dec = self.removed_free_blocks();
        let inc = self.inserted_free_blocks();
        (inc - dec) as usize
    }

    /// ブロックの割当回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_allocated_blocks_total <COUNTER>
    /// ```
    pub fn allocated_blocks(&self) -> u64 {
        self.allocated_blocks.value() as u64
    }

    /// これまでに割り当てたバイト数(アライメント単位への切り上げ後).
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_allocated_bytes_total <COUNTER>
    /// ```
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.value() as u64
    }

    /// ブロックの解放回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_freed_blocks_total <COUNTER>
    /// ```
    pub fn freed_blocks(&self) -> u64 {
        self.freed_blocks.value() as u64
    }

    /// これまでに解放されたバイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_freed_bytes_total <COUNTER>
    /// ```
    pub fn freed_bytes(&self) -> u64 {
        self.freed_bytes.value() as u64
    }

    /// メモリ源から取得したハンクの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_acquired_hunks_total <COUNTER>
    /// ```
    pub fn acquired_hunks(&self) -> u64 {
        self.acquired_hunks.value() as u64
    }

    /// メモリ源から取得したハンクの総バイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_acquired_hunk_bytes_total <COUNTER>
    /// ```
    pub fn acquired_hunk_bytes(&self) -> u64 {
        self.acquired_hunk_bytes.value() as u64
    }

    /// アリーナの現在の使用量(使用中ブロックの総バイト数).
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// coalloc_arena_allocated_bytes_total - coalloc_arena_freed_bytes_total
    /// ```
    pub fn usage_bytes(&self) -> u64 {
        // NOTE: 以下の順番で値を取得しないとアンダーフローする可能性がある
        let dec = self.freed_bytes();
        let inc = self.allocated_bytes();
        inc - dec
    }

    pub(crate) fn new(builder: &MetricBuilder) -> Self {
        let mut builder = builder.clone();
        builder.namespace("coalloc").subsystem("arena");
        ArenaMetrics {
            inserted_free_blocks: builder
                .counter("inserted_free_blocks_total")
                .help("Number of blocks inserted into the free list")
                .finish()
                .expect("Never fails"),
            removed_free_blocks: builder
                .counter("removed_free_blocks_total")
                .help("Number of blocks removed from the free list")
                .finish()
                .expect("Never fails"),
            allocated_blocks: builder
                .counter("allocated_blocks_total")
                .help("Number of allocated blocks")
                .finish()
                .expect("Never fails"),
            allocated_bytes: builder
                .counter("allocated_bytes_total")
                .help("Number of allocated bytes")
                .finish()
                .expect("Never fails"),
            freed_blocks: builder
                .counter("freed_blocks_total")
                .help("Number of freed blocks")
                .finish()
                .expect("Never fails"),
            freed_bytes: builder
                .counter("freed_bytes_total")
                .help("Number of freed bytes")
                .finish()
                .expect("Never fails"),
            acquired_hunks: builder
                .counter("acquired_hunks_total")
                .help("Number of hunks acquired from the hunk source")
                .finish()
                .expect("Never fails"),
            acquired_hunk_bytes: builder
                .counter("acquired_hunk_bytes_total")
                .help("Number of bytes acquired from the hunk source")
                .finish()
                .expect("Never fails"),
        }
    }

    pub(crate) fn count_allocation(&self, bytes: usize) {
        self.allocated_blocks.increment();
        self.allocated_bytes.add_u64(bytes as u64);
    }

    pub(crate) fn count_releasion(&self, bytes: usize) {
        self.freed_blocks.increment();
        self.freed_bytes.add_u64(bytes as u64);
    }

    pub(crate) fn count_hunk_acquisition(&self, bytes: usize) {
        self.acquired_hunks.increment();
        self.acquired_hunk_bytes.add_u64(bytes as u64);
    }
}
