//! 回调分发
//!
//! 会话创建时注册唯一的 [`CallHandler`]，之后不可更换。
//! 对端事件只在 `iterate` 内部同步投递，不经过队列，也不跨线程；
//! 回调阻塞会拖慢所有通话的迭代节奏。

use crate::call::state::{BitRates, Capabilities};
use crate::transport::FriendNumber;
use tracing::debug;

/// 对端通话状态（通过 `on_call_state` 报告）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// 通话因错误结束（对端掉线、编解码初始化失败）
    Error,
    /// 通话正常结束
    Finished,
    /// 通话进行中，附带对端当前能力
    Active(Capabilities),
}

/// 应用侧的通话事件处理器
pub trait CallHandler: Send {
    /// 收到好友的呼叫
    fn on_call(&mut self, friend: FriendNumber, audio_enabled: bool, video_enabled: bool);

    /// 通话状态变化
    fn on_call_state(&mut self, _friend: FriendNumber, _state: PeerState) {}

    /// 编解码器建议调整码率
    fn on_bit_rate_suggestion(&mut self, _friend: FriendNumber, _bit_rates: BitRates) {}
}

impl<F> CallHandler for F
where
    F: FnMut(FriendNumber, bool, bool) + Send,
{
    fn on_call(&mut self, friend: FriendNumber, audio_enabled: bool, video_enabled: bool) {
        self(friend, audio_enabled, video_enabled)
    }
}

/// 不处理任何事件
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreCalls;

impl CallHandler for IgnoreCalls {
    fn on_call(&mut self, friend: FriendNumber, _audio_enabled: bool, _video_enabled: bool) {
        debug!("忽略好友 {} 的呼叫", friend);
    }
}

/// 回调分发器
pub struct Dispatcher {
    handler: Box<dyn CallHandler>,
    delivered: u64,
}

impl Dispatcher {
    pub fn new(handler: Box<dyn CallHandler>) -> Self {
        Self { handler, delivered: 0 }
    }

    pub(crate) fn call_offer(&mut self, friend: FriendNumber, peer: Capabilities) {
        debug!("投递呼叫事件: 好友={}, 音频={}, 视频={}", friend, peer.send_audio, peer.send_video);
        self.delivered += 1;
        self.handler.on_call(friend, peer.send_audio, peer.send_video);
    }

    pub(crate) fn call_state(&mut self, friend: FriendNumber, state: PeerState) {
        debug!("投递状态事件: 好友={}, 状态={:?}", friend, state);
        self.delivered += 1;
        self.handler.on_call_state(friend, state);
    }

    pub(crate) fn bit_rate_suggestion(&mut self, friend: FriendNumber, bit_rates: BitRates) {
        debug!("投递码率建议: 好友={}, {:?}", friend, bit_rates);
        self.delivered += 1;
        self.handler.on_bit_rate_suggestion(friend, bit_rates);
    }

    /// 已投递的事件总数
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}
