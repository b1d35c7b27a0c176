//! 通话核心模块

/// 通话状态机
pub mod state;

/// 迭代间隔计算
pub mod scheduler;

/// 通话引擎（通话表、协商、信令处理）
pub mod engine;

// 重新导出公共类型
pub use engine::{CallControl, CallEngine};
pub use scheduler::IterationScheduler;
pub use state::{BitRates, Call, CallState, Capabilities, IllegalTransition, Trigger};
