//! 粗粒度メモリ("ハンク")源のインターフェース定義と実装群.
//!
//! このモジュールは[CoalescingArena](../arena/struct.CoalescingArena.html)が
//! 内部で切り出しを行うための生メモリ領域を提供する.
use std::ptr::NonNull;

pub use self::system::SystemHunkSource;

use crate::alignment::Alignment;
use crate::Result;

mod system;

/// ハンクの取得元となるメモリ源を表すトレイト.
///
/// "ハンク"は構造を持たない生のバイト領域であり、アリーナの成長単位となる.
///
/// アリーナは、空きリストで要求を満たせない場合にのみ`allocate_raw`を呼び出し、
/// 取得したハンクは自身の破棄時に`deallocate_raw`で一括返却する.
/// ハンクが部分的に返却されることはない.
pub trait HunkSource {
    /// `bytes`バイトの生メモリ領域を確保して、その先頭アドレスを返す.
    ///
    /// 返されるアドレスは`align`の境界に揃っていなければならない.
    ///
    /// # Errors
    ///
    /// 要求を満たせない場合には、種類が`ErrorKind::MemoryExhausted`のエラーが返される.
    /// アリーナ本体はこのエラーを致命的として扱う(リトライは行わない).
    fn allocate_raw(&mut self, bytes: usize, align: Alignment) -> Result<NonNull<u8>>;

    /// `allocate_raw`で確保した領域を返却する.
    ///
    /// # Safety
    ///
    /// `ptr`は、この`HunkSource`インスタンスの`allocate_raw`が
    /// 同じ`bytes`および`align`に対して返したアドレスであり、
    /// かつ、未返却でなければならない.
    unsafe fn deallocate_raw(&mut self, ptr: NonNull<u8>, bytes: usize, align: Alignment);
}

/// メモリ源から取得した一つのハンク.
///
/// アリーナがハンクリストの要素として排他的に所有し、
/// アリーナの破棄時にのみメモリ源へと返却される.
#[derive(Debug)]
pub(crate) struct Hunk {
    pub(crate) ptr: NonNull<u8>,
    pub(crate) len: usize,
}
impl Hunk {
    pub(crate) fn start(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    #[cfg(test)]
    pub(crate) fn end(&self) -> usize {
        self.start() + self.len
    }
}
