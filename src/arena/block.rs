//! Block
//!
//! アリーナの管理対象となる連続アドレス範囲.

/// アリーナ内の一つの連続したアドレス範囲を表現するための構造体.
///
/// 空きリスト・使用中リストの両方で、ブロックの記録として使用される.
/// 順序付けには常に開始アドレスのみが使われ、サイズは順序には寄与しない.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    start: usize,
    len: usize,
}
impl Block {
    pub(crate) fn new(start: usize, len: usize) -> Self {
        Block { start, len }
    }

    pub(crate) fn start(self) -> usize {
        self.start
    }

    /// 終端位置(exclusive)を返す.
    pub(crate) fn end(self) -> usize {
        self.start + self.len
    }

    pub(crate) fn len(self) -> usize {
        self.len
    }

    /// 先頭から`size`分だけ割り当てを行う.
    ///
    /// `self`は残余部分へと縮小され、切り出された先頭部分が返される.
    ///
    /// # Panics
    ///
    /// `size`が`self.len()`を超えている場合には、現在のスレッドがパニックする.
    pub(crate) fn allocate(&mut self, size: usize) -> Block {
        assert!(size <= self.len);
        let allocated = Block {
            start: self.start,
            len: size,
        };
        self.start += size;
        self.len -= size;
        allocated
    }

    /// `bytes`分だけ長さを増やす.
    ///
    /// 隣接ブロックとの合体時に、吸収する側のブロックに対して呼び出される.
    pub(crate) fn extend(&mut self, bytes: usize) {
        self.len += bytes;
    }
}
