//! Coalescing Arena.

use slog::Logger;
use std::cmp;
use std::collections::BTreeMap;
use std::ptr::{self, NonNull};

use super::{Arena, Block};
use crate::alignment::Alignment;
use crate::hunk::{Hunk, HunkSource, SystemHunkSource};
use crate::metrics::ArenaMetrics;

/// ハンクサイズのデフォルト値(バイト単位).
pub const DEFAULT_HUNK_SIZE: usize = 1024 * 1024;

/// 合体方式のアリーナ.
///
/// 下位のメモリ源([`HunkSource`])からは粗粒度のハンクのみを取得し、
/// 個々の割当要求はハンク内部の切り出しによって捌く.
/// 解放されたブロックは、アドレス的に隣接する空きブロックと即座に合体されるため、
/// 割当と解放を長期間繰り返してもフラグメンテーションが際限なく進行することはない.
///
/// この実装自体は、完全にメモリ上のデータ構造であり、
/// 取得済みの全ハンクはインスタンスの破棄時に一括でメモリ源へ返却される.
/// その際、未解放の使用中ブロックが残っていても構わない
/// (プロセス寿命に紐付いたアリーナの典型的な使われ方を踏襲している).
///
/// # 割当戦略
///
/// このアロケータは"first-fit"戦略を採用している.
///
/// 新規割当要求が発行された際には、空きリストをアドレス昇順に探索し、
/// 要求サイズを満たす空きブロックの中で、一番アドレスが低いものが選択される.
/// サイズ最小のものを選ぶ"best-fit"ではない点に注意.
/// 同一サイズの要求が支配的なワークロードでは、低位アドレスのブロックが
/// 優先的に再利用され、大きな余剰は高位アドレス側に溜まる.
///
/// 選択された空きブロックは、その先頭から要求サイズ分だけの割当を行い、
/// もしまだ余剰分がある場合には、残余が再び空きリストに戻される.
///
/// [`HunkSource`]: ../hunk/trait.HunkSource.html
#[derive(Debug)]
pub struct CoalescingArena<S = SystemHunkSource>
where
    S: HunkSource,
{
    hunk_size: usize,
    alignment: Alignment,
    hunks: Vec<Hunk>,
    free_list: BTreeMap<usize, Block>,
    busy_list: BTreeMap<usize, Block>,
    source: S,
    metrics: ArenaMetrics,
    logger: Logger,
}
impl CoalescingArena<SystemHunkSource> {
    /// デフォルト設定のアリーナを生成する.
    ///
    /// `CoalescingArenaBuilder::new().build()`と等価.
    pub fn new() -> Self {
        super::CoalescingArenaBuilder::new().build()
    }
}
impl Default for CoalescingArena<SystemHunkSource> {
    fn default() -> Self {
        Self::new()
    }
}
impl<S: HunkSource> CoalescingArena<S> {
    pub(crate) fn with_source(
        hunk_size: usize,
        alignment: Alignment,
        source: S,
        metrics: ArenaMetrics,
        logger: Logger,
    ) -> Self {
        CoalescingArena {
            hunk_size,
            alignment,
            hunks: Vec::new(),
            free_list: BTreeMap::new(),
            busy_list: BTreeMap::new(),
            source,
            metrics,
            logger,
        }
    }

    /// このアリーナのハンクサイズ(バイト単位)を返す.
    pub fn hunk_size(&self) -> usize {
        self.hunk_size
    }

    /// このアリーナのアライメント単位を返す.
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// アリーナ用のメトリクスを返す.
    pub fn metrics(&self) -> &ArenaMetrics {
        &self.metrics
    }

    fn add_free_block(&mut self, block: Block) {
        assert!(
            self.free_list.insert(block.start(), block).is_none(),
            "corrupted arena: duplicate free block at {:#x}",
            block.start()
        );
        self.metrics.inserted_free_blocks.increment();
    }

    fn delete_free_block(&mut self, block: &Block) {
        let removed = self.free_list.remove(&block.start());
        assert!(
            removed.is_some(),
            "corrupted arena: missing free block at {:#x}",
            block.start()
        );
        self.metrics.removed_free_blocks.increment();
    }

    /// メモリ源から新しいハンクを取得して、その開始アドレスを返す.
    ///
    /// 取得失敗は致命的として扱われ、現在のスレッドがパニックする.
    fn acquire_hunk(&mut self, bytes: usize) -> usize {
        debug!(self.logger, "acquiring a new hunk"; "bytes" => bytes);
        let ptr = match track!(self.source.allocate_raw(bytes, self.alignment)) {
            Ok(ptr) => ptr,
            Err(e) => {
                crit!(self.logger, "hunk acquisition failed: {}", e; "bytes" => bytes);
                panic!("failed to acquire a {} byte hunk: {}", bytes, e);
            }
        };
        self.hunks.push(Hunk { ptr, len: bytes });
        self.metrics.count_hunk_acquisition(bytes);
        ptr.as_ptr() as usize
    }

    /// `addr`を含むハンクの範囲`(start, end)`を返す.
    fn hunk_bounds(&self, addr: usize) -> (usize, usize) {
        self.hunks
            .iter()
            .find(|h| h.start() <= addr && addr < h.start() + h.len)
            .map(|h| (h.start(), h.start() + h.len))
            .unwrap_or_else(|| {
                panic!(
                    "corrupted arena: address {:#x} is outside of every hunk",
                    addr
                )
            })
    }

    #[cfg(test)]
    pub(crate) fn free_blocks(&self) -> Vec<Block> {
        self.free_list.values().copied().collect()
    }

    #[cfg(test)]
    pub(crate) fn busy_blocks(&self) -> Vec<Block> {
        self.busy_list.values().copied().collect()
    }

    #[cfg(test)]
    pub(crate) fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }
}
impl<S: HunkSource> Arena for CoalescingArena<S> {
    fn alloc(&mut self, nbytes: usize) -> NonNull<u8> {
        let n = self.alignment.ceil_align(cmp::max(nbytes, 1));

        // 要求を満たす空きブロックの内、アドレスが最低位のものを探す(first-fit)
        let found = self.free_list.values().find(|b| b.len() >= n).copied();

        let start = if let Some(mut block) = found {
            self.delete_free_block(&block);
            let allocated = block.allocate(n);
            if block.len() > 0 {
                // 残余部分を空きリストへ戻す
                self.add_free_block(block);
            }
            allocated.start()
        } else {
            let hunk_bytes = cmp::max(n, self.hunk_size);
            let start = self.acquire_hunk(hunk_bytes);
            if n < hunk_bytes {
                // ハンクの切り出し後の残余を空きリストへ登録する
                self.add_free_block(Block::new(start + n, hunk_bytes - n));
            }
            start
        };

        let block = Block::new(start, n);
        assert!(
            self.busy_list.insert(start, block).is_none(),
            "corrupted arena: duplicate busy block at {:#x}",
            start
        );
        self.metrics.count_allocation(n);
        NonNull::new(start as *mut u8).expect("hunk addresses are never null")
    }

    unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            // C++のdelete同様、NULLの解放は許容する
            return;
        }
        let start = ptr as usize;
        let freed = self.busy_list.remove(&start).unwrap_or_else(|| {
            panic!("corrupted arena: free of an unallocated address {:#x}", start)
        });
        self.metrics.count_releasion(freed.len());
        self.add_free_block(freed);

        // 合体は同一ハンク内に閉じる.
        // 別々のハンクが偶然連続したアドレスに置かれていても、それらを跨ぐ
        // ブロックを作ってはならない(取得元の異なる領域を一つの割当として
        // 返すことは出来ない).
        let (hunk_start, hunk_end) = self.hunk_bounds(start);

        // 低位側の隣接ブロックと合体する.
        //
        // キーは開始アドレスのみであり、サイズはキーに含まれないため、
        // 吸収する側のブロックはマップから取り除かずにその場で伸長して良い.
        let mut surviving = freed;
        if surviving.start() > hunk_start {
            if let Some(lo) = self.free_list.range(..start).next_back().map(|(_, b)| *b) {
                if lo.end() == surviving.start() {
                    self.delete_free_block(&surviving);
                    let lo = self
                        .free_list
                        .get_mut(&lo.start())
                        .expect("the low neighbor is in the free list");
                    lo.extend(surviving.len());
                    surviving = *lo;
                }
            }
        }

        // 高位側の隣接ブロックと合体する
        if surviving.end() < hunk_end {
            if let Some(hi) = self.free_list.get(&surviving.end()).copied() {
                self.delete_free_block(&hi);
                let surviving = self
                    .free_list
                    .get_mut(&surviving.start())
                    .expect("the surviving block is in the free list");
                surviving.extend(hi.len());
            }
        }
    }

    unsafe fn realloc(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        if ptr.is_null() {
            assert_ne!(new_size, 0, "realloc of a null pointer with a zero size");
            return self.alloc(new_size).as_ptr();
        }
        if new_size == 0 {
            self.free(ptr);
            return ptr::null_mut();
        }

        let start = ptr as usize;
        let existing = self
            .busy_list
            .get(&start)
            .unwrap_or_else(|| {
                panic!(
                    "corrupted arena: realloc of an unallocated address {:#x}",
                    start
                )
            })
            .len();
        if new_size <= existing {
            // 縮小はその場で行う.
            // 末尾の余剰はブロック全体が解放されるまで回収されない.
            return ptr;
        }

        let new_ptr = self.alloc(new_size);
        ptr::copy_nonoverlapping(ptr, new_ptr.as_ptr(), existing);
        self.free(ptr);
        new_ptr.as_ptr()
    }
}
impl<S: HunkSource> Drop for CoalescingArena<S> {
    fn drop(&mut self) {
        // 使用中ブロックの有無に関わらず、取得済みの全ハンクを返却する
        debug!(self.logger, "releasing hunks"; "hunks" => self.hunks.len());
        for hunk in self.hunks.drain(..) {
            unsafe { self.source.deallocate_raw(hunk.ptr, hunk.len, self.alignment) };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;
    use trackable::result::TestResult;

    use super::*;
    use crate::arena::CoalescingArenaBuilder;

    fn arena(hunk_size: usize, align_unit: usize) -> CoalescingArena {
        CoalescingArenaBuilder::new()
            .hunk_size(hunk_size)
            .alignment(Alignment::new(align_unit).expect("valid alignment unit"))
            .build()
    }

    fn hunk_of(hunks: &[Hunk], b: &Block) -> usize {
        hunks
            .iter()
            .position(|h| h.start() <= b.start() && b.end() <= h.end())
            .expect("every block lies within a single hunk")
    }

    fn check_invariants<S: HunkSource>(arena: &CoalescingArena<S>) {
        let free = arena.free_blocks();
        let busy = arena.busy_blocks();
        let hunks = arena.hunks();

        // 同一ハンク内の空きリストに隣接するエントリが残っていないこと
        // (別ハンクのブロック同士は、アドレスが偶然連続していても合体しない)
        for w in free.windows(2) {
            if hunk_of(hunks, &w[0]) == hunk_of(hunks, &w[1]) {
                assert!(w[0].end() < w[1].start(), "unmerged blocks: {:?}", w);
            }
        }

        // 全ブロックの範囲が互いに重ならないこと(空きリストと使用中リストの非共有も含む)
        let mut all: Vec<Block> = free.iter().chain(busy.iter()).copied().collect();
        all.sort_by_key(|b| b.start());
        for w in all.windows(2) {
            assert!(w[0].end() <= w[1].start(), "overlapping blocks: {:?}", w);
        }

        // ハンク毎の保存則: ブロックの総バイト数がハンクサイズと一致すること
        for hunk in arena.hunks() {
            let total: usize = all
                .iter()
                .filter(|b| hunk.start() <= b.start() && b.end() <= hunk.end())
                .map(|b| b.len())
                .sum();
            assert_eq!(total, hunk.len);
        }
    }

    #[test]
    fn adjacent_frees_merge_into_one_block() {
        // ハンクサイズ64・アライメント16で二回の割当が同一ハンクに収まるケース
        let mut arena = arena(64, 16);
        let a0 = arena.alloc(10);
        let a1 = arena.alloc(10);
        assert_eq!(a1.as_ptr() as usize, a0.as_ptr() as usize + 16);
        assert_eq!(arena.metrics().acquired_hunks(), 1);
        check_invariants(&arena);

        unsafe {
            arena.free(a0.as_ptr());
            arena.free(a1.as_ptr());
        }

        // 解放された二領域と元々の残余が、一つの空きブロックへと合体していること
        assert_eq!(
            arena.free_blocks(),
            vec![Block::new(a0.as_ptr() as usize, 64)]
        );
        assert_eq!(arena.metrics().free_list_len(), 1);
        assert_eq!(arena.metrics().usage_bytes(), 0);
        check_invariants(&arena);
    }

    #[test]
    fn oversized_request_draws_an_exact_hunk() {
        let mut arena = arena(64, 8);
        let p = arena.alloc(100);
        assert_eq!(p.as_ptr() as usize % 8, 0);

        // 要求(切り上げ後104バイト)がハンクサイズを超えるため、
        // ちょうどその大きさのハンクが取得され、残余は登録されない
        assert_eq!(arena.metrics().acquired_hunks(), 1);
        assert_eq!(arena.metrics().acquired_hunk_bytes(), 104);
        assert_eq!(arena.metrics().free_list_len(), 0);
        assert_eq!(arena.busy_blocks(), vec![Block::new(p.as_ptr() as usize, 104)]);
        check_invariants(&arena);
    }

    #[test]
    fn first_fit_reuses_the_lowest_freed_address() {
        let mut arena = arena(256, 16);
        let a = arena.alloc(32);
        let _b = arena.alloc(32);
        unsafe { arena.free(a.as_ptr()) };

        // 高位アドレス側にはより大きな残余ブロックも存在するが、
        // first-fitは最低位アドレスの空きブロックを選択する
        let c = arena.alloc(16);
        assert_eq!(c, a);
        check_invariants(&arena);
    }

    #[test]
    fn first_fit_is_not_best_fit() {
        // [0..64) [64..112) を割当てた後の残余は [112..128) の16バイト
        let mut arena = arena(128, 16);
        let a = arena.alloc(64);
        let _b = arena.alloc(48);
        unsafe { arena.free(a.as_ptr()) };

        // 16バイト要求にちょうど一致する高位ブロックが存在しても、
        // より低位の64バイトブロックが選ばれる
        let c = arena.alloc(16);
        assert_eq!(c, a);
        check_invariants(&arena);
    }

    #[test]
    fn shrinking_realloc_keeps_the_address_and_the_original_size() {
        let mut arena = arena(256, 16);
        let p = arena.alloc(64);

        let q = unsafe { arena.realloc(p.as_ptr(), 16) };
        assert_eq!(q, p.as_ptr());

        // 使用中リストには縮小前のサイズが残り続ける
        assert_eq!(arena.busy_blocks(), vec![Block::new(p.as_ptr() as usize, 64)]);

        // 解放時には元のサイズ分がまとめて解放される
        unsafe { arena.free(q) };
        assert_eq!(arena.metrics().freed_bytes(), 64);
        assert_eq!(arena.metrics().usage_bytes(), 0);
        check_invariants(&arena);
    }

    #[test]
    fn growing_realloc_copies_the_existing_content() {
        let mut arena = arena(256, 16);
        let p = arena.alloc(16);
        unsafe {
            for i in 0..16 {
                *p.as_ptr().add(i) = i as u8;
            }

            let q = arena.realloc(p.as_ptr(), 64);
            assert_ne!(q, p.as_ptr());
            for i in 0..16 {
                assert_eq!(*q.add(i), i as u8);
            }

            arena.free(q);
        }
        check_invariants(&arena);
    }

    #[test]
    fn realloc_of_null_allocates() {
        let mut arena = arena(256, 16);
        let p = unsafe { arena.realloc(ptr::null_mut(), 100) };
        assert!(!p.is_null());
        assert_eq!(p as usize % 16, 0);
        check_invariants(&arena);
    }

    #[test]
    fn realloc_to_zero_frees() {
        let mut arena = arena(256, 16);
        let p = arena.alloc(32);
        let q = unsafe { arena.realloc(p.as_ptr(), 0) };
        assert!(q.is_null());
        assert_eq!(arena.metrics().usage_bytes(), 0);
        check_invariants(&arena);
    }

    #[test]
    fn zeroed_allocation_clears_recycled_memory() {
        let mut arena = arena(256, 16);
        let p = arena.alloc(32);
        unsafe {
            p.as_ptr().write_bytes(0xFF, 32);
            arena.free(p.as_ptr());
        }

        // 直前に汚した領域が再利用されても、全域がゼロで埋められていること
        let q = arena.alloc_zeroed(4, 8);
        assert_eq!(q, p);
        for i in 0..32 {
            unsafe { assert_eq!(*q.as_ptr().add(i), 0) };
        }
        check_invariants(&arena);
    }

    #[test]
    fn zero_byte_allocation_is_promoted() {
        let mut arena = arena(256, 16);
        let p = arena.alloc(0);
        assert_eq!(arena.busy_blocks(), vec![Block::new(p.as_ptr() as usize, 16)]);
        check_invariants(&arena);
    }

    #[test]
    fn free_of_null_is_harmless() {
        let mut arena = arena(256, 16);
        unsafe { arena.free(ptr::null_mut()) };
        assert_eq!(arena.metrics().freed_blocks(), 0);
    }

    #[test]
    #[should_panic]
    fn double_free_panics() {
        let mut arena = arena(256, 16);
        let p = arena.alloc(32);
        unsafe {
            arena.free(p.as_ptr());
            arena.free(p.as_ptr());
        }
    }

    #[test]
    #[should_panic]
    fn free_of_an_unallocated_address_panics() {
        let mut arena = arena(256, 16);
        let p = arena.alloc(32);
        // ブロックの内側を指すアドレスは解放対象として認められない
        unsafe { arena.free(p.as_ptr().add(16)) };
    }

    #[test]
    #[should_panic]
    fn zeroed_allocation_of_zero_count_panics() {
        let mut arena = arena(256, 16);
        arena.alloc_zeroed(0, 8);
    }

    #[test]
    #[should_panic]
    fn zeroed_allocation_of_zero_size_panics() {
        let mut arena = arena(256, 16);
        arena.alloc_zeroed(8, 0);
    }

    #[test]
    #[should_panic(expected = "too large size")]
    fn overflowing_request_panics_instead_of_wrapping() {
        let mut arena = arena(256, 16);
        arena.alloc(32);
        // 切り上げがゼロへと回り込んでしまうと、空きリストに残ったままの
        // アドレスが使用中としても返却されてしまう
        arena.alloc(usize::MAX - 8);
    }

    #[test]
    #[should_panic]
    fn realloc_of_null_with_zero_size_panics() {
        let mut arena = arena(256, 16);
        unsafe { arena.realloc(ptr::null_mut(), 0) };
    }

    #[test]
    fn allocate_and_free_soak() {
        let mut arena = arena(4096, 8);
        let align = arena.alignment();

        let mut live = Vec::new();
        for round in 0..8 {
            for i in 0..64 {
                let nbytes = (i % 13) * 24 + 1;
                let p = arena.alloc(nbytes);
                assert!(align.is_aligned(p.as_ptr() as usize));
                live.push(p);
            }
            check_invariants(&arena);

            // 一つおきに解放して、意図的に穴だらけの状態を作る
            let mut keep = Vec::new();
            for (i, p) in live.drain(..).enumerate() {
                if (i + round) % 2 == 0 {
                    unsafe { arena.free(p.as_ptr()) };
                } else {
                    keep.push(p);
                }
            }
            live = keep;
            check_invariants(&arena);
        }

        for p in live {
            unsafe { arena.free(p.as_ptr()) };
        }
        check_invariants(&arena);
        assert_eq!(arena.metrics().usage_bytes(), 0);

        // 全て解放された後は、各ハンクが一つの空きブロックへと合体している
        assert_eq!(arena.free_blocks().len(), arena.hunks().len());
    }

    #[test]
    fn metrics_accounting() -> TestResult {
        let mut arena = arena(128, 16);
        let p0 = arena.alloc(10);
        let p1 = arena.alloc(20);
        assert_eq!(arena.metrics().allocated_blocks(), 2);
        assert_eq!(arena.metrics().allocated_bytes(), 16 + 32);
        assert_eq!(arena.metrics().usage_bytes(), 48);
        assert_eq!(arena.metrics().acquired_hunks(), 1);
        assert_eq!(arena.metrics().acquired_hunk_bytes(), 128);

        unsafe {
            arena.free(p0.as_ptr());
            arena.free(p1.as_ptr());
        }
        assert_eq!(arena.metrics().freed_blocks(), 2);
        assert_eq!(arena.metrics().freed_bytes(), 48);
        assert_eq!(arena.metrics().usage_bytes(), 0);
        assert_eq!(arena.metrics().free_list_len(), 1);
        Ok(())
    }
}
