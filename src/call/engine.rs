//! 通话引擎
//!
//! 一个会话一个引擎，按好友编号维护通话表，负责呼叫/接听/控制/码率的协商，
//! 以及在迭代时处理对端信令。操作失败时返回引擎失败码，由 `error` 模块
//! 映射到用户可见的错误。失败的操作不会修改通话表。

use crate::call::scheduler::IterationScheduler;
use crate::call::state::{BitRates, Call, CallState, Capabilities, Trigger};
use crate::config::SessionConfig;
use crate::dispatch::{Dispatcher, PeerState};
use crate::error::{AnswerStatus, BitRateSetStatus, CallControlStatus, CallStatus, NewStatus};
use crate::media::{self, MediaCodec};
use crate::transport::{CallSignal, FriendNumber, Transport};
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

/// 通话控制指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallControl {
    /// 恢复被暂停的通话
    Resume,
    /// 暂停通话（不收发任何媒体）
    Pause,
    /// 取消呼叫、拒接或挂断
    Cancel,
    /// 不再接收对端音频
    MuteAudio,
    /// 恢复接收对端音频
    UnmuteAudio,
    /// 不再接收对端视频
    HideVideo,
    /// 恢复接收对端视频
    ShowVideo,
}

/// 通话引擎
pub struct CallEngine {
    /// 好友编号 -> 通话
    calls: HashMap<FriendNumber, Call>,

    config: SessionConfig,

    scheduler: IterationScheduler,

    codec: Box<dyn MediaCodec>,
}

impl CallEngine {
    /// 创建引擎，预留通话表容量
    pub fn new(config: SessionConfig, codec: Box<dyn MediaCodec>) -> Result<Self, NewStatus> {
        let mut calls = HashMap::new();
        calls
            .try_reserve(config.initial_call_capacity)
            .map_err(|_| NewStatus::Malloc)?;

        Ok(Self {
            calls,
            scheduler: IterationScheduler::new(&config),
            config,
            codec,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 好友的通话状态；没有通话时为 Idle
    pub fn call_state(&self, friend: FriendNumber) -> CallState {
        self.calls.get(&friend).map(Call::state).unwrap_or(CallState::Idle)
    }

    /// 好友的通话记录
    pub fn call_info(&self, friend: FriendNumber) -> Option<&Call> {
        self.calls.get(&friend)
    }

    /// 当前通话数（包括振铃）
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// 下一次迭代前应等待的毫秒数
    pub fn iteration_interval(&self) -> u32 {
        self.scheduler.interval(self.calls.values())
    }

    /// 发起呼叫
    pub fn call(
        &mut self,
        transport: &dyn Transport,
        friend: FriendNumber,
        bit_rates: BitRates,
    ) -> Result<(), CallStatus> {
        if !self.config.call_bit_rates_valid(bit_rates) {
            return Err(CallStatus::InvalidBitRate);
        }
        if !transport.friend_exists(friend) {
            return Err(CallStatus::FriendNotFound);
        }
        if !transport.is_friend_connected(friend) {
            return Err(CallStatus::FriendNotConnected);
        }
        if self.calls.contains_key(&friend) {
            return Err(CallStatus::FriendAlreadyInCall);
        }
        if self.calls.try_reserve(1).is_err() {
            return Err(CallStatus::Malloc);
        }

        let call = Call::outgoing(friend, bit_rates);
        if let Err(e) = transport.send_signal(friend, CallSignal::Invite(call.self_capabilities())) {
            warn!("呼叫好友 {} 失败，邀请未发出: {}", friend, e);
            return Err(CallStatus::Sync);
        }

        info!(
            "呼叫好友 {}: 通话 {}, 音频 {} bit/s, 视频 {} bit/s",
            friend,
            call.id(),
            bit_rates.audio,
            bit_rates.video
        );
        self.calls.insert(friend, call);
        Ok(())
    }

    /// 接听呼叫；失败时通话保持振铃，可以稍后重试
    pub fn answer(
        &mut self,
        transport: &dyn Transport,
        friend: FriendNumber,
        bit_rates: BitRates,
    ) -> Result<(), AnswerStatus> {
        if !transport.friend_exists(friend) {
            return Err(AnswerStatus::FriendNotFound);
        }
        if !self.config.call_bit_rates_valid(bit_rates) {
            return Err(AnswerStatus::InvalidBitRate);
        }

        let Some(call) = self.calls.get_mut(&friend) else {
            return Err(AnswerStatus::FriendNotCalling);
        };
        if call.state() != CallState::IncomingRinging {
            return Err(AnswerStatus::FriendNotCalling);
        }

        if let Err(e) = media::prepare_transmission(self.codec.as_mut(), friend, bit_rates) {
            warn!("通话 {} 编解码初始化失败: {}", call.id(), e);
            return Err(AnswerStatus::CodecInitialization);
        }

        let caps = Capabilities::for_bit_rates(bit_rates.audio, bit_rates.video);
        if let Err(e) = transport.send_signal(friend, CallSignal::Start(caps)) {
            warn!("通话 {} 接听信令未发出: {}", call.id(), e);
            self.codec.close(friend);
            return Err(AnswerStatus::Sync);
        }

        call.set_bit_rates(bit_rates);
        call.set_self_capabilities(caps);
        if let Err(e) = call.apply(Trigger::LocalAnswer) {
            // 上面已经检查过状态
            warn!("通话 {} 状态转换异常: {:?}", call.id(), e);
        }

        info!("已接听好友 {} 的通话 {}", friend, call.id());
        Ok(())
    }

    /// 通话控制
    pub fn control(
        &mut self,
        transport: &dyn Transport,
        friend: FriendNumber,
        control: CallControl,
    ) -> Result<(), CallControlStatus> {
        if !transport.friend_exists(friend) {
            return Err(CallControlStatus::FriendNotFound);
        }

        let Some(call) = self.calls.get_mut(&friend) else {
            return Err(CallControlStatus::FriendNotInCall);
        };

        if control == CallControl::Cancel {
            // 对端不可达时也在本地结束通话，对端会自行超时
            if let Err(e) = transport.send_signal(friend, CallSignal::End) {
                debug!("通话 {} 挂断信令未发出: {}", call.id(), e);
            }
            self.end_call(friend);
            return Ok(());
        }

        // 接听之前只能取消
        if call.state() != CallState::Active {
            return Err(CallControlStatus::FriendNotInCall);
        }

        let current = call.self_capabilities();
        let next = match control {
            CallControl::Pause if !call.is_paused() => Capabilities::NONE,
            CallControl::Resume => match call.paused_capabilities() {
                Some(caps) => caps,
                None => return Err(CallControlStatus::InvalidTransition),
            },
            CallControl::MuteAudio if !call.is_paused() && current.receive_audio => Capabilities {
                receive_audio: false,
                ..current
            },
            CallControl::UnmuteAudio if !call.is_paused() && !current.receive_audio => Capabilities {
                receive_audio: true,
                ..current
            },
            CallControl::HideVideo if !call.is_paused() && current.receive_video => Capabilities {
                receive_video: false,
                ..current
            },
            CallControl::ShowVideo if !call.is_paused() && !current.receive_video => Capabilities {
                receive_video: true,
                ..current
            },
            _ => return Err(CallControlStatus::InvalidTransition),
        };

        if let Err(e) = transport.send_signal(friend, CallSignal::Change(next)) {
            warn!("通话 {} 控制 {:?} 失败: {}", call.id(), control, e);
            return Err(CallControlStatus::Sync);
        }

        match control {
            CallControl::Pause => {
                call.pause();
            }
            CallControl::Resume => {
                call.resume();
            }
            _ => call.set_self_capabilities(next),
        }

        debug!("通话 {} 执行控制 {:?}，本端能力 {:?}", call.id(), control, next);
        Ok(())
    }

    /// 调整码率；None 表示保持不变
    pub fn set_bit_rate(
        &mut self,
        transport: &dyn Transport,
        friend: FriendNumber,
        audio: Option<u32>,
        video: Option<u32>,
    ) -> Result<(), BitRateSetStatus> {
        if audio.is_some_and(|rate| !self.config.audio_bit_rate_valid(rate))
            || video.is_some_and(|rate| !self.config.video_bit_rate_valid(rate))
        {
            return Err(BitRateSetStatus::InvalidBitRate);
        }
        if !transport.friend_exists(friend) {
            return Err(BitRateSetStatus::FriendNotFound);
        }

        let Some(call) = self.calls.get_mut(&friend) else {
            return Err(BitRateSetStatus::FriendNotInCall);
        };
        // 振铃中的码率在 call/answer 时协商
        if call.state() != CallState::Active {
            return Err(BitRateSetStatus::FriendNotInCall);
        }

        let current = call.bit_rates();
        let next = BitRates::new(audio.unwrap_or(current.audio), video.unwrap_or(current.video));
        if next.is_disabled() {
            return Err(BitRateSetStatus::InvalidBitRate);
        }
        if next == current {
            return Ok(());
        }

        // 通话中且某个流开/关时，需要通知对端
        if call.is_media_flowing() {
            let caps = Capabilities {
                send_audio: next.audio > 0,
                send_video: next.video > 0,
                ..call.self_capabilities()
            };
            if caps != call.self_capabilities() {
                if let Err(e) = transport.send_signal(friend, CallSignal::Change(caps)) {
                    warn!("通话 {} 码率变更未能通知对端: {}", call.id(), e);
                    return Err(BitRateSetStatus::Sync);
                }
            }
        }

        call.set_bit_rates(next);
        call.set_send_streams(next);
        self.codec.set_bit_rates(friend, next);

        debug!("通话 {} 码率调整为 {:?}", call.id(), next);
        Ok(())
    }

    /// 执行一次迭代：处理到达的信令、检测掉线、推进编解码
    pub fn iterate(&mut self, transport: &dyn Transport, dispatcher: &mut Dispatcher) {
        while let Some((friend, signal)) = transport.poll_signal() {
            self.handle_signal(transport, dispatcher, friend, signal);
        }

        let lost: Vec<FriendNumber> = self
            .calls
            .keys()
            .copied()
            .filter(|&friend| !transport.friend_exists(friend) || !transport.is_friend_connected(friend))
            .collect();
        for friend in lost {
            info!("好友 {} 已断开，结束通话", friend);
            self.end_call(friend);
            dispatcher.call_state(friend, PeerState::Error);
        }

        for call in self.calls.values().filter(|call| call.is_media_flowing()) {
            if let Some(suggestion) = self.codec.iterate(call.friend()) {
                dispatcher.bit_rate_suggestion(call.friend(), suggestion);
            }
        }
    }

    /// 结束所有通话，不通知对端
    pub fn shutdown(&mut self) {
        let friends: Vec<FriendNumber> = self.calls.keys().copied().collect();
        if !friends.is_empty() {
            info!("强制结束 {} 个通话", friends.len());
        }
        for friend in friends {
            self.end_call(friend);
        }
    }

    fn handle_signal(
        &mut self,
        transport: &dyn Transport,
        dispatcher: &mut Dispatcher,
        friend: FriendNumber,
        signal: CallSignal,
    ) {
        trace!("收到好友 {} 的信令 {:?}", friend, signal);

        match signal {
            CallSignal::Invite(peer) => match self.call_state(friend) {
                CallState::Idle => self.on_offer(transport, dispatcher, friend, peer),
                // 双方同时呼叫，视为对端接听
                CallState::OutgoingRinging => self.on_accept(transport, dispatcher, friend, peer),
                state => debug!("好友 {} 重复邀请（当前 {}），忽略", friend, state),
            },
            CallSignal::Start(peer) => {
                if self.call_state(friend) == CallState::OutgoingRinging {
                    self.on_accept(transport, dispatcher, friend, peer);
                } else {
                    debug!("好友 {} 的接听信令与当前状态不符，忽略", friend);
                }
            }
            CallSignal::Change(peer) => match self.calls.get_mut(&friend) {
                Some(call) if call.state() == CallState::Active => {
                    call.set_peer_capabilities(peer);
                    dispatcher.call_state(friend, PeerState::Active(peer));
                }
                _ => debug!("好友 {} 不在通话中，忽略能力变更", friend),
            },
            CallSignal::End => {
                if self.end_call(friend).is_some() {
                    dispatcher.call_state(friend, PeerState::Finished);
                }
            }
        }
    }

    fn on_offer(
        &mut self,
        transport: &dyn Transport,
        dispatcher: &mut Dispatcher,
        friend: FriendNumber,
        peer: Capabilities,
    ) {
        if self.calls.try_reserve(1).is_err() {
            warn!("无法为好友 {} 的呼叫分配资源，拒接", friend);
            if let Err(e) = transport.send_signal(friend, CallSignal::End) {
                debug!("拒接信令未发出（好友 {}）: {}", friend, e);
            }
            return;
        }

        let call = Call::incoming(friend, peer);
        info!("收到好友 {} 的呼叫: 通话 {}", friend, call.id());
        self.calls.insert(friend, call);
        dispatcher.call_offer(friend, peer);
    }

    fn on_accept(
        &mut self,
        transport: &dyn Transport,
        dispatcher: &mut Dispatcher,
        friend: FriendNumber,
        peer: Capabilities,
    ) {
        let Some(call) = self.calls.get_mut(&friend) else {
            return;
        };

        if let Err(e) = media::prepare_transmission(self.codec.as_mut(), friend, call.bit_rates()) {
            warn!("通话 {} 编解码初始化失败，挂断: {}", call.id(), e);
            if let Err(e) = transport.send_signal(friend, CallSignal::End) {
                debug!("通话 {} 挂断信令未发出: {}", call.id(), e);
            }
            self.end_call(friend);
            dispatcher.call_state(friend, PeerState::Error);
            return;
        }

        call.set_peer_capabilities(peer);
        match call.apply(Trigger::PeerAccept) {
            Ok(_) => {
                info!("好友 {} 已接听通话 {}", friend, call.id());
                dispatcher.call_state(friend, PeerState::Active(peer));
            }
            Err(e) => warn!("通话 {} 状态转换异常: {:?}", call.id(), e),
        }
    }

    /// 删除通话记录并释放编解码资源
    fn end_call(&mut self, friend: FriendNumber) -> Option<Call> {
        let mut call = self.calls.remove(&friend)?;
        let was_active = call.state() == CallState::Active;

        if let Err(e) = call.apply(Trigger::Hangup) {
            warn!("通话 {} 状态转换异常: {:?}", call.id(), e);
        }
        if was_active {
            self.codec.close(friend);
        }

        info!("通话 {} 已结束（好友 {}）", call.id(), friend);
        Some(call)
    }
}
