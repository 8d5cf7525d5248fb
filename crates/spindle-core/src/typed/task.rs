//! Task trait - 型付き Task の定義
//!
//! task_type 文字列と入力型を 1:1 で対応付ける。

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::TaskType;

/// Task は task_type と入力型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ResizeImage {
///     url: String,
///     width: u32,
/// }
///
/// impl Task for ResizeImage {
///     const TYPE: &'static str = "media.image.resize.v1";
/// }
/// ```
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 命名規約: `{namespace}.{domain}.{action}.v{major}`
    const TYPE: &'static str;

    fn task_type() -> TaskType {
        TaskType::new(Self::TYPE)
    }
}
