//! アリーナ本体と、そのクライアント向けインターフェース定義.
//!
//! アリーナは、粗粒度のハンクを[hunk](../hunk/index.html)モジュールから取得し、
//! その内部を切り出すことで個々の割当要求を捌く責務を負っている.
//! 実際のハンクの確保・返却そのものを、この中で行うことは無い.
use std::ptr::NonNull;

pub use self::builder::CoalescingArenaBuilder;
pub use self::coalescing::{CoalescingArena, DEFAULT_HUNK_SIZE};
pub use self::direct::DirectArena;

pub(crate) use self::block::Block;

mod block;
mod builder;
mod coalescing;
mod direct;

/// アリーナのクライアント向け操作を表すトレイト.
///
/// バッファ系のクライアントは、このトレイト越しにアリーナを利用することで、
/// 合体方式の[`CoalescingArena`]と素通し方式の[`DirectArena`]を
/// 差し替え可能なバックエンドとして扱うことが出来る.
///
/// # 誤用の扱い
///
/// 未割当アドレスの解放・リサイズ、および二重解放は、エラー返却ではなく
/// パニックとなる(詳細は[`ErrorKind`]のドキュメントを参照).
///
/// [`CoalescingArena`]: ./struct.CoalescingArena.html
/// [`DirectArena`]: ./struct.DirectArena.html
/// [`ErrorKind`]: ../enum.ErrorKind.html
pub trait Arena {
    /// `nbytes`バイトのブロックを割り当てて、その先頭アドレスを返す.
    ///
    /// `nbytes`はアライメント単位へと切り上げられる.
    /// ゼロバイトの要求は1バイトの要求として扱われる(切り上げの結果、
    /// 実際には1アライメント単位が割り当てられる).
    ///
    /// 返却されるアドレスがヌルになることはない.
    /// また、割当領域の内容は未初期化である.
    fn alloc(&mut self, nbytes: usize) -> NonNull<u8>;

    /// `nmemb * size`バイトのブロックを割り当てて、全体をゼロで埋めてから返す.
    ///
    /// # Panics
    ///
    /// `nmemb`ないし`size`がゼロの場合には、現在のスレッドがパニックする.
    fn alloc_zeroed(&mut self, nmemb: usize, size: usize) -> NonNull<u8> {
        assert_ne!(nmemb, 0, "zeroed allocation with a zero member count");
        assert_ne!(size, 0, "zeroed allocation with a zero member size");
        let nbytes = nmemb
            .checked_mul(size)
            .unwrap_or_else(|| panic!("allocation size overflow: {} * {}", nmemb, size));
        let ptr = self.alloc(nbytes);
        unsafe { ptr.as_ptr().write_bytes(0, nbytes) };
        ptr
    }

    /// `alloc`で割り当てたブロックを解放する.
    ///
    /// ヌルポインタの解放は無害な何もしない操作となる(C++の`delete`と同じ扱い).
    ///
    /// # Panics
    ///
    /// `ptr`が「このアリーナから割当済み」かつ「未解放」のアドレスではない場合には、
    /// 現在のスレッドがパニックする.
    ///
    /// # Safety
    ///
    /// `ptr`はヌル、ないし、このアリーナが返したアドレスでなければならない.
    /// 解放後に同領域へアクセスしてはならない.
    unsafe fn free(&mut self, ptr: *mut u8);

    /// 割当済みブロックのサイズを変更する.
    ///
    /// - `ptr`がヌルの場合: `alloc(new_size)`と等価(ただし`new_size == 0`はパニック)
    /// - `new_size == 0`の場合: `free(ptr)`と等価であり、ヌルが返される
    /// - 縮小の場合: 何も行わずに`ptr`をそのまま返す
    ///   - 末尾の余剰領域は、ブロック全体が解放されるまで回収されない
    /// - 拡大の場合: 新規ブロックを割り当て、旧ブロックの内容を先頭からコピーした上で
    ///   旧ブロックを解放し、新アドレスを返す
    ///
    /// # Panics
    ///
    /// `ptr`が非ヌルかつ未割当のアドレスである場合、
    /// および`ptr`がヌルかつ`new_size`がゼロの場合には、現在のスレッドがパニックする.
    ///
    /// # Safety
    ///
    /// `ptr`はヌル、ないし、このアリーナが返したアドレスでなければならない.
    /// 非ヌルのアドレスが返された場合、旧アドレスへアクセスしてはならない.
    unsafe fn realloc(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8;
}
