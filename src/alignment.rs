//! 割当サイズおよびアドレスの境界(アライメント)計算.
use std::mem;

use crate::{ErrorKind, Result};

/// アリーナが使用するアライメント単位を表現するための構造体.
///
/// アリーナへの全ての割当要求サイズ、およびハンクサイズは、
/// この単位の倍数へと切り上げられてから管理される.
/// これにより、返却されるアドレスは常にこの単位に揃い、
/// ブロックの分割・合体の加算演算が境界を跨がずに合成可能となる.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alignment(usize);
impl Alignment {
    /// プラットフォームの自然なワードサイズを単位とする`Alignment`インスタンスを返す.
    ///
    /// `Alignment::default()`で使われる値でもある.
    ///
    /// # Examples
    ///
    /// ```
    /// use coalloc::alignment::Alignment;
    ///
    /// assert_eq!(Alignment::word().as_usize(), std::mem::size_of::<usize>());
    /// ```
    pub fn word() -> Self {
        Alignment(mem::size_of::<usize>())
    }

    /// 指定された値を単位とする`Alignment`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// `unit`が二の冪ではない場合(ゼロを含む)には、
    /// 種類が`ErrorKind::InvalidInput`のエラーが返される.
    ///
    /// # Examples
    ///
    /// ```
    /// use coalloc::ErrorKind;
    /// use coalloc::alignment::Alignment;
    ///
    /// assert_eq!(Alignment::new(16).ok().map(|a| a.as_usize()), Some(16));
    /// assert_eq!(Alignment::new(0).err().map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    /// assert_eq!(Alignment::new(24).err().map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new(unit: usize) -> Result<Self> {
        track_assert!(unit.is_power_of_two(), ErrorKind::InvalidInput; unit);
        Ok(Alignment(unit))
    }

    /// 指定サイズより後方の最初の境界位置を返す.
    ///
    /// # Panics
    ///
    /// 切り上げ結果が`usize`で表現できない場合には、パニックする.
    /// 黙ってゼロへと回り込むと、呼び出し側の帳簿が壊れてしまうため.
    ///
    /// # Examples
    ///
    /// ```
    /// use coalloc::alignment::Alignment;
    ///
    /// let alignment = Alignment::new(16).unwrap();
    /// assert_eq!(alignment.ceil_align(0), 0);
    /// assert_eq!(alignment.ceil_align(1), 16);
    /// assert_eq!(alignment.ceil_align(16), 16);
    /// assert_eq!(alignment.ceil_align(17), 32);
    /// ```
    pub fn ceil_align(self, size: usize) -> usize {
        let ceiled = size
            .checked_add(self.0 - 1)
            .unwrap_or_else(|| panic!("too large size: {} (unit={})", size, self.0));
        ceiled / self.0 * self.0
    }

    /// 指定位置が境界に沿っているかどうかを判定する.
    ///
    /// # Examples
    ///
    /// ```
    /// use coalloc::alignment::Alignment;
    ///
    /// let alignment = Alignment::new(16).unwrap();
    /// assert!(alignment.is_aligned(0));
    /// assert!(alignment.is_aligned(32));
    /// assert!(!alignment.is_aligned(17));
    /// ```
    pub fn is_aligned(self, position: usize) -> bool {
        (position % self.0) == 0
    }

    /// アライメント単位を`usize`に変換して返す.
    pub fn as_usize(self) -> usize {
        self.0
    }
}
impl Default for Alignment {
    fn default() -> Self {
        Self::word()
    }
}
