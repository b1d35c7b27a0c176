//! 通话会话
//!
//! 一个 [`Session`] 绑定一个传输连接，同一连接同时最多一个会话。
//! 会话持有传输句柄的强引用，kill 或析构时释放（恰好一次）。
//!
//! 会话内部不启动线程。应用按 [`Session::iteration_interval`] 给出的节奏
//! 调用 [`Session::iterate`]，最好放在独立线程，不要和传输自己的迭代循环共用。
//! 所有操作都需要 `&mut self`，多个线程共享会话时由应用加锁（例如 `Mutex`）。
//!
//! 传输句柄的生命周期由应用负责：应当先 kill 会话，再关闭或丢弃传输。
//! 会话存活期间对句柄调用 `close()` 只阻止新的绑定，不影响已有会话。

use crate::call::engine::{CallControl, CallEngine};
use crate::call::state::{BitRates, Call, CallState};
use crate::config::SessionConfig;
use crate::dispatch::{CallHandler, Dispatcher};
use crate::error::{
    AnswerError, BitRateSetError, CallControlError, CallError, NewStatus, SessionCreationError, SessionError,
    SessionKilled,
};
use crate::media::{MediaCodec, PassiveCodec};
use crate::transport::{FriendNumber, SessionSlot, Transport, TransportHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 会话存活期间持有的资源
struct Bound<T: Transport> {
    engine: CallEngine,
    /// 析构时释放传输上的会话槽位
    slot: SessionSlot<T>,
}

/// 音视频通话会话
pub struct Session<T: Transport> {
    id: Uuid,
    /// kill 之后为 None
    bound: Option<Bound<T>>,
    dispatcher: Dispatcher,
}

impl<T: Transport> Session<T> {
    /// 使用默认配置和 [`PassiveCodec`] 创建会话
    pub fn new<H>(transport: &TransportHandle<T>, handler: H) -> Result<Self, SessionCreationError>
    where
        H: CallHandler + 'static,
    {
        Self::with_config(transport, handler, PassiveCodec, SessionConfig::default())
    }

    /// 创建会话
    ///
    /// 句柄已关闭时返回 `NullArgument`，该连接已有会话时返回 `DuplicateSession`，
    /// 通话表预留失败时返回 `AllocationFailure`。
    pub fn with_config<H, C>(
        transport: &TransportHandle<T>,
        handler: H,
        codec: C,
        config: SessionConfig,
    ) -> Result<Self, SessionCreationError>
    where
        H: CallHandler + 'static,
        C: MediaCodec + 'static,
    {
        Self::create(transport, Box::new(handler), Box::new(codec), config).map_err(|status| {
            warn!("创建通话会话失败: {:?}", status);
            SessionCreationError::from(status)
        })
    }

    fn create(
        transport: &TransportHandle<T>,
        handler: Box<dyn CallHandler>,
        codec: Box<dyn MediaCodec>,
        config: SessionConfig,
    ) -> Result<Self, NewStatus> {
        if !transport.is_valid() {
            return Err(NewStatus::Null);
        }
        let slot = transport.try_bind().ok_or(NewStatus::Multiple)?;
        // 失败时 slot 随之析构，槽位被释放
        let engine = CallEngine::new(config, codec)?;

        let id = Uuid::new_v4();
        info!("通话会话 {} 已创建，空闲迭代间隔 {} ms", id, engine.config().idle_interval_ms);

        Ok(Self {
            id,
            bound: Some(Bound { engine, slot }),
            dispatcher: Dispatcher::new(handler),
        })
    }

    /// 会话 ID（用于日志关联）
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_killed(&self) -> bool {
        self.bound.is_none()
    }

    /// 结束会话：强制结束所有通话（不通知对端），释放传输句柄。可重复调用
    pub fn kill(&mut self) {
        let Some(mut bound) = self.bound.take() else {
            debug!("通话会话 {} 已经 kill，忽略", self.id);
            return;
        };

        bound.engine.shutdown();
        drop(bound);
        info!("通话会话 {} 已 kill", self.id);
    }

    fn bound(&self) -> Result<&Bound<T>, SessionKilled> {
        self.bound.as_ref().ok_or(SessionKilled)
    }

    /// 绑定的传输句柄
    pub fn transport(&self) -> Result<&TransportHandle<T>, SessionKilled> {
        Ok(self.bound()?.slot.handle())
    }

    /// 距离下一次 iterate 应等待的毫秒数
    pub fn iteration_interval(&self) -> Result<u32, SessionKilled> {
        Ok(self.bound()?.engine.iteration_interval())
    }

    /// 执行一次迭代，期间可能同步调用回调
    pub fn iterate(&mut self) -> Result<(), SessionKilled> {
        let bound = self.bound.as_mut().ok_or(SessionKilled)?;
        bound.engine.iterate(bound.slot.transport(), &mut self.dispatcher);
        Ok(())
    }

    /// 呼叫好友；码率单位 bit/s，0 表示关闭该流
    pub fn call(
        &mut self,
        friend: FriendNumber,
        audio_bit_rate: u32,
        video_bit_rate: u32,
    ) -> Result<(), SessionError<CallError>> {
        let bound = self.bound.as_mut().ok_or(SessionKilled)?;
        bound
            .engine
            .call(bound.slot.transport(), friend, BitRates::new(audio_bit_rate, video_bit_rate))
            .map_err(|status| {
                debug!("会话 {} 呼叫好友 {} 被拒绝: {:?}", self.id, friend, status);
                SessionError::rejected(status)
            })
    }

    /// 接听好友的呼叫
    pub fn answer(
        &mut self,
        friend: FriendNumber,
        audio_bit_rate: u32,
        video_bit_rate: u32,
    ) -> Result<(), SessionError<AnswerError>> {
        let bound = self.bound.as_mut().ok_or(SessionKilled)?;
        bound
            .engine
            .answer(bound.slot.transport(), friend, BitRates::new(audio_bit_rate, video_bit_rate))
            .map_err(|status| {
                debug!("会话 {} 接听好友 {} 被拒绝: {:?}", self.id, friend, status);
                SessionError::rejected(status)
            })
    }

    /// 通话控制（取消、暂停、静音等）
    pub fn call_control(
        &mut self,
        friend: FriendNumber,
        control: CallControl,
    ) -> Result<(), SessionError<CallControlError>> {
        let bound = self.bound.as_mut().ok_or(SessionKilled)?;
        bound
            .engine
            .control(bound.slot.transport(), friend, control)
            .map_err(|status| {
                debug!("会话 {} 对好友 {} 的控制 {:?} 被拒绝: {:?}", self.id, friend, control, status);
                SessionError::rejected(status)
            })
    }

    /// 调整通话码率；None 表示该流保持不变
    pub fn set_bit_rate(
        &mut self,
        friend: FriendNumber,
        audio_bit_rate: Option<u32>,
        video_bit_rate: Option<u32>,
    ) -> Result<(), SessionError<BitRateSetError>> {
        let bound = self.bound.as_mut().ok_or(SessionKilled)?;
        bound
            .engine
            .set_bit_rate(bound.slot.transport(), friend, audio_bit_rate, video_bit_rate)
            .map_err(|status| {
                debug!("会话 {} 调整好友 {} 码率被拒绝: {:?}", self.id, friend, status);
                SessionError::rejected(status)
            })
    }

    /// 好友的通话状态
    pub fn call_state(&self, friend: FriendNumber) -> Result<CallState, SessionKilled> {
        Ok(self.bound()?.engine.call_state(friend))
    }

    /// 好友的通话详情
    pub fn call_info(&self, friend: FriendNumber) -> Result<Option<&Call>, SessionKilled> {
        Ok(self.bound()?.engine.call_info(friend))
    }

    /// 当前通话数（包括振铃中的）
    pub fn active_calls(&self) -> Result<usize, SessionKilled> {
        Ok(self.bound()?.engine.call_count())
    }

    /// 已投递给回调的事件数
    pub fn delivered_events(&self) -> u64 {
        self.dispatcher.delivered()
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.kill();
    }
}
