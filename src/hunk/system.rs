use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::alignment::Alignment;
use crate::hunk::HunkSource;
use crate::{ErrorKind, Result};

/// プラットフォームアロケータ(`std::alloc`)を用いた`HunkSource`の実装.
///
/// アリーナのデフォルトのメモリ源.
#[derive(Debug, Default, Clone)]
pub struct SystemHunkSource;
impl SystemHunkSource {
    /// 新しい`SystemHunkSource`インスタンスを生成する.
    pub fn new() -> Self {
        SystemHunkSource
    }

    fn layout(bytes: usize, align: Alignment) -> Result<Layout> {
        track_assert_ne!(bytes, 0, ErrorKind::InvalidInput);
        let layout = track_assert_some!(
            Layout::from_size_align(bytes, align.as_usize()).ok(),
            ErrorKind::InvalidInput;
            bytes, align.as_usize()
        );
        Ok(layout)
    }
}
impl HunkSource for SystemHunkSource {
    fn allocate_raw(&mut self, bytes: usize, align: Alignment) -> Result<NonNull<u8>> {
        let layout = track!(Self::layout(bytes, align))?;
        let ptr = unsafe { alloc::alloc(layout) };
        let ptr = track_assert_some!(NonNull::new(ptr), ErrorKind::MemoryExhausted; bytes);
        Ok(ptr)
    }

    unsafe fn deallocate_raw(&mut self, ptr: NonNull<u8>, bytes: usize, align: Alignment) {
        let layout = Layout::from_size_align_unchecked(bytes, align.as_usize());
        alloc::dealloc(ptr.as_ptr(), layout);
    }
}
