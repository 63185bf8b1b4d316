//! Direct Arena.

use std::cmp;
use std::collections::BTreeMap;
use std::ptr::{self, NonNull};

use super::{Arena, Block};
use crate::alignment::Alignment;
use crate::hunk::{HunkSource, SystemHunkSource};

/// 素通し方式のアリーナ.
///
/// 全ての割当・解放要求を、そのままメモリ源へと転送する.
/// ハンクの切り出しも空きブロックの合体も行わないため、
/// 合体方式のアリーナとの比較・切り分け用の自明なバックエンドとして機能する.
///
/// 使用中ブロックの記録は、解放・リサイズ時にサイズを復元するためだけに保持される.
#[derive(Debug)]
pub struct DirectArena<S = SystemHunkSource>
where
    S: HunkSource,
{
    alignment: Alignment,
    busy_list: BTreeMap<usize, Block>,
    source: S,
}
impl DirectArena<SystemHunkSource> {
    /// プラットフォームアロケータをメモリ源とするアリーナを生成する.
    pub fn new() -> Self {
        Self::with_source(Alignment::default(), SystemHunkSource::new())
    }
}
impl Default for DirectArena<SystemHunkSource> {
    fn default() -> Self {
        Self::new()
    }
}
impl<S: HunkSource> DirectArena<S> {
    /// 指定のメモリ源を用いるアリーナを生成する.
    pub fn with_source(alignment: Alignment, source: S) -> Self {
        DirectArena {
            alignment,
            busy_list: BTreeMap::new(),
            source,
        }
    }
}
impl<S: HunkSource> Arena for DirectArena<S> {
    fn alloc(&mut self, nbytes: usize) -> NonNull<u8> {
        let n = self.alignment.ceil_align(cmp::max(nbytes, 1));
        let ptr = match track!(self.source.allocate_raw(n, self.alignment)) {
            Ok(ptr) => ptr,
            Err(e) => panic!("failed to allocate {} bytes: {}", n, e),
        };
        let start = ptr.as_ptr() as usize;
        assert!(
            self.busy_list.insert(start, Block::new(start, n)).is_none(),
            "corrupted arena: duplicate busy block at {:#x}",
            start
        );
        ptr
    }

    unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let start = ptr as usize;
        let freed = self.busy_list.remove(&start).unwrap_or_else(|| {
            panic!("corrupted arena: free of an unallocated address {:#x}", start)
        });
        let ptr = NonNull::new(ptr).expect("the pointer is non-null");
        self.source.deallocate_raw(ptr, freed.len(), self.alignment);
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
            return ptr;
        }

        let new_ptr = self.alloc(new_size);
        ptr::copy_nonoverlapping(ptr, new_ptr.as_ptr(), existing);
        self.free(ptr);
        new_ptr.as_ptr()
    }
}
impl<S: HunkSource> Drop for DirectArena<S> {
    fn drop(&mut self) {
        // 未解放のブロックはここでまとめて返却する
        let blocks = std::mem::replace(&mut self.busy_list, BTreeMap::new());
        for block in blocks.values() {
            let ptr = NonNull::new(block.start() as *mut u8).expect("busy addresses are never null");
            unsafe { self.source.deallocate_raw(ptr, block.len(), self.alignment) };
        }
    }
}
