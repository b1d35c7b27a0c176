//! 编解码/媒体边界
//!
//! 通话层只协商码率并报告编解码初始化失败，实际的编码、解码和像素格式转换
//! 都由 [`MediaCodec`] 的实现负责。

use crate::call::state::BitRates;
use crate::transport::FriendNumber;
use thiserror::Error;

/// 编解码错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("no receive callback registered for either audio or video")]
    NoReceiver,

    #[error("codec rejected the configuration: {0}")]
    Rejected(String),
}

/// 编解码器
pub trait MediaCodec: Send {
    /// 是否注册了音频接收回调
    fn receives_audio(&self) -> bool;

    /// 是否注册了视频接收回调
    fn receives_video(&self) -> bool;

    /// 为一个通话初始化编解码器
    fn open(&mut self, friend: FriendNumber, bit_rates: BitRates) -> Result<(), CodecError>;

    /// 释放通话的编解码资源
    fn close(&mut self, friend: FriendNumber);

    /// 通话中码率变化
    fn set_bit_rates(&mut self, friend: FriendNumber, bit_rates: BitRates);

    /// 推进一次编解码；拥塞控制需要调整码率时返回建议值
    fn iterate(&mut self, friend: FriendNumber) -> Option<BitRates>;
}

/// 初始化一个通话的编解码：两个方向都没有接收者时直接失败
pub(crate) fn prepare_transmission(
    codec: &mut dyn MediaCodec,
    friend: FriendNumber,
    bit_rates: BitRates,
) -> Result<(), CodecError> {
    if !codec.receives_audio() && !codec.receives_video() {
        return Err(CodecError::NoReceiver);
    }
    codec.open(friend, bit_rates)
}

/// 默认编解码器：声明接收音视频，不做任何媒体处理
#[derive(Debug, Default, Clone, Copy)]
pub struct PassiveCodec;

impl MediaCodec for PassiveCodec {
    fn receives_audio(&self) -> bool {
        true
    }

    fn receives_video(&self) -> bool {
        true
    }

    fn open(&mut self, _friend: FriendNumber, _bit_rates: BitRates) -> Result<(), CodecError> {
        Ok(())
    }

    fn close(&mut self, _friend: FriendNumber) {}

    fn set_bit_rates(&mut self, _friend: FriendNumber, _bit_rates: BitRates) {}

    fn iterate(&mut self, _friend: FriendNumber) -> Option<BitRates> {
        None
    }
}
