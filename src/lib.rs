//! Tox Call - 音视频通话会话控制核心库
//!
//! 在已有的加密传输之上协商、建立、维护和拆除与好友之间的音视频通话。
//! 入口是 [`Session`]：绑定一个传输连接，由应用周期性调用 `iterate` 驱动。

/// 版本与兼容性
pub mod version;

/// 错误分类
pub mod error;

/// 会话配置
pub mod config;

/// 传输边界
pub mod transport;

/// 编解码边界
pub mod media;

/// 通话核心（状态机、引擎、迭代间隔）
pub mod call;

/// 回调分发
pub mod dispatch;

/// 通话会话
pub mod session;

/// 重新导出常用类型
pub use call::{BitRates, CallControl, CallState, Capabilities};
pub use config::SessionConfig;
pub use dispatch::{CallHandler, IgnoreCalls, PeerState};
pub use error::{
    AnswerError, BitRateSetError, CallControlError, CallError, SessionCreationError, SessionError, SessionKilled,
};
pub use media::{CodecError, MediaCodec, PassiveCodec};
pub use session::Session;
pub use transport::{CallSignal, FriendNumber, Transport, TransportError, TransportHandle};
pub use version::{version_is_compatible, version_major, version_minor, version_patch};

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 日志系统
pub mod logging;
