use crate::call::state::{Call, CallState};
use crate::config::SessionConfig;

/// 迭代间隔计算
///
/// 没有媒体流动时返回空闲间隔；否则取所有活跃通话中最紧的帧间隔，
/// 结果永远不超过空闲间隔。
pub struct IterationScheduler {
    idle_ms: u32,
    audio_ms: u32,
    video_ms: u32,
}

impl IterationScheduler {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            idle_ms: config.idle_interval_ms,
            audio_ms: config.audio_frame_ms.min(config.idle_interval_ms),
            video_ms: config.video_frame_ms.min(config.idle_interval_ms),
        }
    }

    /// 单个通话需要的间隔
    pub fn call_interval(&self, call: &Call) -> u32 {
        if call.state() != CallState::Active || call.is_paused() {
            return self.idle_ms;
        }

        let ours = call.self_capabilities();
        if ours.send_audio || (ours.receive_audio && call.peer_capabilities().send_audio) {
            self.audio_ms
        } else if ours.carries_video() {
            self.video_ms
        } else {
            self.idle_ms
        }
    }

    /// 所有通话中最紧的间隔
    pub fn interval<'a>(&self, calls: impl IntoIterator<Item = &'a Call>) -> u32 {
        calls
            .into_iter()
            .map(|call| self.call_interval(call))
            .min()
            .unwrap_or(self.idle_ms)
            .min(self.idle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::state::{BitRates, Capabilities, Trigger};
    use crate::transport::FriendNumber;

    fn active(audio: u32, video: u32) -> Call {
        let mut call = Call::outgoing(FriendNumber(1), BitRates::new(audio, video));
        call.set_peer_capabilities(Capabilities::for_bit_rates(audio, video));
        call.apply(Trigger::PeerAccept).unwrap();
        call
    }

    #[test]
    fn test_idle_default() {
        let scheduler = IterationScheduler::new(&SessionConfig::default());
        assert_eq!(scheduler.interval(std::iter::empty()), 200);

        // 振铃中没有媒体
        let ringing = Call::outgoing(FriendNumber(1), BitRates::new(64_000, 0));
        assert_eq!(scheduler.interval([&ringing]), 200);
    }

    #[test]
    fn test_active_calls_tighten_interval() {
        let scheduler = IterationScheduler::new(&SessionConfig::default());

        let audio = active(64_000, 0);
        let video = active(0, 1_000_000);

        assert_eq!(scheduler.interval([&audio]), 20);
        assert_eq!(scheduler.interval([&video]), 40);
        assert_eq!(scheduler.interval([&video, &audio]), 20);
    }

    #[test]
    fn test_paused_call_is_idle() {
        let scheduler = IterationScheduler::new(&SessionConfig::default());
        let mut call = active(64_000, 0);
        call.pause();
        assert_eq!(scheduler.interval([&call]), 200);
    }

    #[test]
    fn test_never_exceeds_idle() {
        let config = SessionConfig::default()
            .with_idle_interval(10)
            .with_frame_intervals(20, 40);
        let scheduler = IterationScheduler::new(&config);

        let call = active(64_000, 0);
        assert_eq!(scheduler.interval([&call]), 10);
    }
}
