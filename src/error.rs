/// crate固有のエラー型.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(trackable::error::TrackableError<ErrorKind>);

/// 発生し得るエラーの種別.
///
/// なお、割当・解放操作の誤用(e.g., 未割当アドレスの解放)は、
/// エラーとしては返却されずパニックとなる.
/// アリーナの正しさは空きリスト・使用中リストの整合性に全面的に依存しており、
/// 不整合を検出した後に処理を継続することは出来ないため.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 入力が不正.
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側のプログラムを修正して入力を正しくする
    InvalidInput,

    /// メモリ源がハンク要求を満たせなかった.
    ///
    /// アリーナ本体はこの状態からの回復(リトライ等)を行わない.
    ///
    /// # 典型的な対応策
    ///
    /// - プロセス全体としてメモリ使用量を削減する
    MemoryExhausted,
}
impl trackable::error::ErrorKind for ErrorKind {}
