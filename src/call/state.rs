//! 通话状态机
//!
//! 每个好友最多一个通话。状态转换表：
//!
//! | 当前 | 触发 | 下一状态 |
//! |---|---|---|
//! | Idle | 本端 call | OutgoingRinging |
//! | Idle | 对端邀请 | IncomingRinging |
//! | IncomingRinging | 本端 answer | Active |
//! | OutgoingRinging | 对端接听 | Active |
//! | 振铃 / Active | 挂断、kill、对端掉线 | Ended |
//!
//! Ended 是终止状态，记录随即被删除，好友重新回到 Idle。
//! 振铃不设超时，由应用决定何时取消。

use crate::transport::FriendNumber;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

/// 通话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Idle,
    OutgoingRinging,
    IncomingRinging,
    Active,
    Ended,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::OutgoingRinging => "outgoing-ringing",
            CallState::IncomingRinging => "incoming-ringing",
            CallState::Active => "active",
            CallState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// 状态转换触发条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// 本端发起呼叫
    LocalCall,
    /// 收到对端呼叫邀请
    PeerOffer,
    /// 本端接听
    LocalAnswer,
    /// 对端接听
    PeerAccept,
    /// 挂断（本端取消、对端挂断、对端掉线或会话 kill）
    Hangup,
}

/// 转换表；不合法的转换返回 None
pub fn next_state(from: CallState, trigger: Trigger) -> Option<CallState> {
    use CallState::*;
    match (from, trigger) {
        (Idle, Trigger::LocalCall) => Some(OutgoingRinging),
        (Idle, Trigger::PeerOffer) => Some(IncomingRinging),
        (IncomingRinging, Trigger::LocalAnswer) => Some(Active),
        (OutgoingRinging, Trigger::PeerAccept) => Some(Active),
        (OutgoingRinging | IncomingRinging | Active, Trigger::Hangup) => Some(Ended),
        _ => None,
    }
}

/// 一端的媒体能力（通过信令交换）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub send_audio: bool,
    pub send_video: bool,
    pub receive_audio: bool,
    pub receive_video: bool,
}

impl Capabilities {
    /// 什么都不收发（暂停）
    pub const NONE: Capabilities = Capabilities {
        send_audio: false,
        send_video: false,
        receive_audio: false,
        receive_video: false,
    };

    /// 根据码率推导本端能力：默认接收音视频，码率非 0 的流才发送
    pub fn for_bit_rates(audio_bit_rate: u32, video_bit_rate: u32) -> Self {
        Self {
            send_audio: audio_bit_rate > 0,
            send_video: video_bit_rate > 0,
            receive_audio: true,
            receive_video: true,
        }
    }

    /// 是否有视频在流动（发送或接收）
    pub fn carries_video(&self) -> bool {
        self.send_video || self.receive_video
    }
}

/// 协商得到的音视频码率（bit/s，0 表示关闭该流）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitRates {
    pub audio: u32,
    pub video: u32,
}

impl BitRates {
    pub fn new(audio: u32, video: u32) -> Self {
        Self { audio, video }
    }

    /// 音视频都关闭
    pub fn is_disabled(&self) -> bool {
        self.audio == 0 && self.video == 0
    }
}

/// 非法状态转换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: CallState,
    pub trigger: Trigger,
}

/// 与某个好友的通话记录
#[derive(Debug, Clone)]
pub struct Call {
    id: Uuid,
    friend: FriendNumber,
    state: CallState,
    bit_rates: BitRates,
    /// 本端当前能力
    self_caps: Capabilities,
    /// 对端最近一次声明的能力
    peer_caps: Capabilities,
    /// 暂停前的本端能力，恢复时使用
    paused_caps: Option<Capabilities>,
}

impl Call {
    /// 本端发起的呼叫（进入 OutgoingRinging）
    pub fn outgoing(friend: FriendNumber, bit_rates: BitRates) -> Self {
        let mut call = Self::idle(friend, Capabilities::NONE);
        call.bit_rates = bit_rates;
        call.self_caps = Capabilities::for_bit_rates(bit_rates.audio, bit_rates.video);
        call.leave_idle(Trigger::LocalCall);
        call
    }

    /// 对端发起的呼叫（进入 IncomingRinging）
    pub fn incoming(friend: FriendNumber, peer_caps: Capabilities) -> Self {
        let mut call = Self::idle(friend, peer_caps);
        call.leave_idle(Trigger::PeerOffer);
        call
    }

    fn leave_idle(&mut self, trigger: Trigger) {
        if let Err(e) = self.apply(trigger) {
            warn!("通话 {} 状态转换异常: {:?}", self.id, e);
        }
    }

    fn idle(friend: FriendNumber, peer_caps: Capabilities) -> Self {
        Self {
            id: Uuid::new_v4(),
            friend,
            state: CallState::Idle,
            bit_rates: BitRates::default(),
            self_caps: Capabilities::NONE,
            peer_caps,
            paused_caps: None,
        }
    }

    /// 按转换表推进状态
    pub fn apply(&mut self, trigger: Trigger) -> Result<CallState, IllegalTransition> {
        let next = next_state(self.state, trigger).ok_or(IllegalTransition {
            from: self.state,
            trigger,
        })?;
        self.state = next;
        Ok(next)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn friend(&self) -> FriendNumber {
        self.friend
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn bit_rates(&self) -> BitRates {
        self.bit_rates
    }

    pub fn self_capabilities(&self) -> Capabilities {
        self.self_caps
    }

    pub fn peer_capabilities(&self) -> Capabilities {
        self.peer_caps
    }

    pub fn is_paused(&self) -> bool {
        self.paused_caps.is_some()
    }

    pub(crate) fn set_bit_rates(&mut self, bit_rates: BitRates) {
        self.bit_rates = bit_rates;
    }

    pub(crate) fn set_self_capabilities(&mut self, caps: Capabilities) {
        self.self_caps = caps;
    }

    pub(crate) fn set_peer_capabilities(&mut self, caps: Capabilities) {
        self.peer_caps = caps;
    }

    /// 暂停：保存当前能力，返回暂停后的能力
    pub(crate) fn pause(&mut self) -> Capabilities {
        self.paused_caps = Some(self.self_caps);
        self.self_caps = Capabilities::NONE;
        self.self_caps
    }

    /// 暂停前保存的能力
    pub fn paused_capabilities(&self) -> Option<Capabilities> {
        self.paused_caps
    }

    /// 根据新码率更新发送方向；暂停中则更新暂停前保存的能力。返回当前生效的能力
    pub(crate) fn set_send_streams(&mut self, bit_rates: BitRates) -> Capabilities {
        let target = match self.paused_caps.as_mut() {
            Some(caps) => caps,
            None => &mut self.self_caps,
        };
        target.send_audio = bit_rates.audio > 0;
        target.send_video = bit_rates.video > 0;
        self.self_caps
    }

    /// 恢复：还原暂停前的能力
    pub(crate) fn resume(&mut self) -> Capabilities {
        if let Some(caps) = self.paused_caps.take() {
            self.self_caps = caps;
        }
        self.self_caps
    }

    /// 是否有媒体在流动
    pub fn is_media_flowing(&self) -> bool {
        self.state == CallState::Active && !self.is_paused()
    }
}
