//! # PS Master Testing Utils
//!
//! 各crate共用的测试替身与测试数据构造工具。
//!
//! - **Recording doubles**: 记录所有调用的 `EventSink` / `ProcessTerminator` /
//!   `PsFailureReporter` 实现，可注入失败
//! - **Snapshot stores**: 总是失败或记录写入次数的 `MetaSnapshotStore`
//! - **Matrix table**: 所有操作都失败的 `MatrixMetaManager`
//! - **Builders**: 矩阵元数据与PS上报清单的构造器
//!
//! ```toml
//! [dev-dependencies]
//! psmaster-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
