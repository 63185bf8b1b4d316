//! Coalescing block arena.
//!
//! `coalloc`は、可変サイズのバッファ割当を大量に捌く長命なプロセス向けの、
//! 合体(coalescing)方式のブロックアロケータ.
//!
//! # 特徴
//!
//! - 下位のメモリ源からは"ハンク"と呼ばれる粗粒度の固定長ブロックのみを取得し、
//!   個々の割当要求はハンク内部の切り出しによって捌く
//!   - プラットフォームアロケータへの呼び出し回数とフラグメンテーションを抑制するのが目的
//! - 解放されたブロックは、アドレス的に隣接する空きブロックと即座に合体される
//!   - 任意の時点で、空きリスト内に隣接する二エントリが残ることはない
//! - 空きブロックの探索は「アドレス昇順のfirst-fit」
//!   - 同一サイズの要求が支配的なワークロードでは、低位アドレスのブロックが優先的に
//!     再利用され、大きな余りは高位アドレス側に溜まる
//! - 取得済みのハンクは、アリーナ破棄時に一括でメモリ源へ返却される
//!
//! # モジュールの依存関係
//!
//! ```text
//! arena => hunk => alignment
//! ```
//!
//! - [arena]モジュール:
//!   - 主に[CoalescingArena]構造体と[Arena]トレイトを提供
//!   - `coalloc`の利用者が直接触るのはこれら
//! - [hunk]モジュール:
//!   - 主に[HunkSource]トレイトとその実装である[SystemHunkSource]を提供
//!   - [arena]に対して粗粒度のメモリ取得層を提供するのが目的
//! - [alignment]モジュール:
//!   - 割当サイズおよびハンクサイズの境界計算を担当
//!
//! # 並行性
//!
//! アリーナは内部同期を行わない. 全ての操作は`&mut self`を要求するため、
//! 単一の論理的な所有者からの直列な呼び出しのみが型レベルで許容される.
//! 複数スレッドで共有したい場合には、利用者側で`Mutex`等に包むこと.
//!
//! [arena]: ./arena/index.html
//! [CoalescingArena]: ./arena/struct.CoalescingArena.html
//! [Arena]: ./arena/trait.Arena.html
//! [hunk]: ./hunk/index.html
//! [HunkSource]: ./hunk/trait.HunkSource.html
//! [SystemHunkSource]: ./hunk/struct.SystemHunkSource.html
//! [alignment]: ./alignment/index.html
#![warn(missing_docs)]
extern crate prometrics;
#[macro_use]
extern crate slog;
#[macro_use]
extern crate trackable;

pub use crate::error::{Error, ErrorKind};

pub mod alignment;
pub mod arena;
pub mod hunk;
pub mod metrics;

mod error;

/// crate固有の`Result`型.
pub type Result<T> = std::result::Result<T, Error>;
