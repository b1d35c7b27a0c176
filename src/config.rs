//! 会话配置

use crate::call::state::BitRates;

/// 空闲时的迭代间隔（毫秒）
pub const DEFAULT_IDLE_INTERVAL_MS: u32 = 200;

/// 会话配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// 没有活跃通话时报告的迭代间隔
    pub idle_interval_ms: u32,

    /// 有音频流动时的迭代间隔（一个音频帧的时长）
    pub audio_frame_ms: u32,

    /// 只有视频流动时的迭代间隔
    pub video_frame_ms: u32,

    /// 非 0 音频码率下限（bit/s）
    pub min_audio_bit_rate: u32,

    /// 音频码率上限（bit/s）
    pub max_audio_bit_rate: u32,

    /// 视频码率上限（bit/s）
    pub max_video_bit_rate: u32,

    /// 创建会话时预留的通话表容量
    pub initial_call_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            audio_frame_ms: 20,
            video_frame_ms: 40,
            // Opus 支持 6 kbit/s 到 510 kbit/s
            min_audio_bit_rate: 6_000,
            max_audio_bit_rate: 510_000,
            max_video_bit_rate: 100_000_000,
            initial_call_capacity: 8,
        }
    }
}

impl SessionConfig {
    pub fn with_idle_interval(mut self, ms: u32) -> Self {
        self.idle_interval_ms = ms;
        self
    }

    pub fn with_frame_intervals(mut self, audio_ms: u32, video_ms: u32) -> Self {
        self.audio_frame_ms = audio_ms;
        self.video_frame_ms = video_ms;
        self
    }

    pub fn with_initial_call_capacity(mut self, capacity: usize) -> Self {
        self.initial_call_capacity = capacity;
        self
    }

    /// 音频码率是否合法（0 表示关闭，总是合法）
    pub fn audio_bit_rate_valid(&self, bit_rate: u32) -> bool {
        bit_rate == 0 || (self.min_audio_bit_rate..=self.max_audio_bit_rate).contains(&bit_rate)
    }

    /// 视频码率是否合法（0 表示关闭，总是合法）
    pub fn video_bit_rate_valid(&self, bit_rate: u32) -> bool {
        bit_rate <= self.max_video_bit_rate
    }

    /// 建立通话时的码率校验：各自合法，且不能同时关闭
    pub fn call_bit_rates_valid(&self, bit_rates: BitRates) -> bool {
        !bit_rates.is_disabled()
            && self.audio_bit_rate_valid(bit_rates.audio)
            && self.video_bit_rate_valid(bit_rates.video)
    }
}
