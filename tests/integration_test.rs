use tox_call::transport::memory::MemoryTransport;
use tox_call::{
    AnswerError, BitRateSetError, BitRates, CallControl, CallControlError, CallError, CallHandler, CallSignal, CallState, Capabilities,
    FriendNumber, IgnoreCalls, PeerState, Session, SessionCreationError, SessionError, SessionKilled, TransportHandle,
};
use tox_call::{version_is_compatible, version_major, version_minor, version_patch};
use std::sync::{Arc, Mutex};

const FRIEND: FriendNumber = FriendNumber(5);

fn handle_with_friend(friend: FriendNumber) -> TransportHandle<MemoryTransport> {
    let transport = MemoryTransport::new();
    transport.add_friend(friend, true);
    TransportHandle::new(transport)
}

/// 记录所有回调事件
#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl CallHandler for EventLog {
    fn on_call(&mut self, friend: FriendNumber, audio_enabled: bool, video_enabled: bool) {
        self.0
            .lock()
            .unwrap()
            .push(format!("call {} audio={} video={}", friend, audio_enabled, video_enabled));
    }

    fn on_call_state(&mut self, friend: FriendNumber, state: PeerState) {
        let state = match state {
            PeerState::Error => "error".to_string(),
            PeerState::Finished => "finished".to_string(),
            PeerState::Active(_) => "active".to_string(),
        };
        self.0.lock().unwrap().push(format!("state {} {}", friend, state));
    }
}

#[test]
fn test_call_scenario_until_kill() {
    let handle = handle_with_friend(FRIEND);
    let log = EventLog::default();
    let mut session = Session::new(&handle, log.clone()).unwrap();

    // 呼叫 -> OutgoingRinging
    session.call(FRIEND, 64_000, 0).unwrap();
    assert_eq!(session.call_state(FRIEND), Ok(CallState::OutgoingRinging));
    assert_eq!(
        handle.transport().take_sent(),
        vec![(FRIEND, CallSignal::Invite(Capabilities::for_bit_rates(64_000, 0)))]
    );

    // 对端接听 -> Active
    handle
        .transport()
        .inject(FRIEND, CallSignal::Start(Capabilities::for_bit_rates(48_000, 0)));
    session.iterate().unwrap();
    assert_eq!(session.call_state(FRIEND), Ok(CallState::Active));
    assert_eq!(log.take(), vec!["state 5 active".to_string()]);
    assert!(session.iteration_interval().unwrap() < 200);

    // kill 之后状态不可观察，所有操作都报 SessionKilled
    session.kill();
    assert_eq!(session.call_state(FRIEND), Err(SessionKilled));
    assert_eq!(session.call(FRIEND, 64_000, 0), Err(SessionError::Killed(SessionKilled)));
    assert!(handle.transport().take_sent().is_empty());
    assert!(log.take().is_empty());

    println!("✅ 呼叫 -> 接听 -> kill 流程测试通过");
}

#[test]
fn test_call_success_for_valid_rates() {
    let handle = handle_with_friend(FRIEND);
    let mut session = Session::new(&handle, IgnoreCalls).unwrap();

    let valid = [(6_000, 0), (510_000, 0), (0, 1), (64_000, 5_000_000), (0, 100_000_000)];
    for (audio, video) in valid {
        assert_eq!(session.call(FRIEND, audio, video), Ok(()), "audio={} video={}", audio, video);
        assert_eq!(session.call_state(FRIEND), Ok(CallState::OutgoingRinging));
        session.call_control(FRIEND, CallControl::Cancel).unwrap();
        assert_eq!(session.call_state(FRIEND), Ok(CallState::Idle));
    }
}

#[test]
fn test_call_rejections() {
    let handle = handle_with_friend(FRIEND);
    handle.transport().add_friend(FriendNumber(9), false);
    let mut session = Session::new(&handle, IgnoreCalls).unwrap();

    let rejected = |result: Result<(), SessionError<CallError>>| result.unwrap_err().rejection().copied();

    assert_eq!(rejected(session.call(FRIEND, 0, 0)), Some(CallError::InvalidBitRate));
    assert_eq!(rejected(session.call(FRIEND, 5_999, 0)), Some(CallError::InvalidBitRate));
    assert_eq!(rejected(session.call(FRIEND, 0, 100_000_001)), Some(CallError::InvalidBitRate));
    assert_eq!(rejected(session.call(FriendNumber(42), 64_000, 0)), Some(CallError::FriendNotFound));
    assert_eq!(rejected(session.call(FriendNumber(9), 64_000, 0)), Some(CallError::FriendNotConnected));

    session.call(FRIEND, 64_000, 0).unwrap();
    assert_eq!(rejected(session.call(FRIEND, 64_000, 0)), Some(CallError::FriendAlreadyInCall));

    // 发送失败：状态不变
    session.call_control(FRIEND, CallControl::Cancel).unwrap();
    handle.transport().set_fail_sends(true);
    assert_eq!(rejected(session.call(FRIEND, 64_000, 0)), Some(CallError::SyncError));
    assert_eq!(session.call_state(FRIEND), Ok(CallState::Idle));
}

#[test]
fn test_kill_is_idempotent() {
    let handle = handle_with_friend(FRIEND);
    let mut session = Session::new(&handle, IgnoreCalls).unwrap();

    session.kill();
    session.kill();
    assert!(session.is_killed());
    drop(session);
    assert_eq!(handle.reference_count(), 1);
}

#[test]
fn test_every_operation_after_kill_fails() {
    let handle = handle_with_friend(FRIEND);
    let mut session = Session::new(&handle, IgnoreCalls).unwrap();
    session.kill();

    assert_eq!(session.iteration_interval(), Err(SessionKilled));
    assert_eq!(session.iterate(), Err(SessionKilled));
    assert!(session.call(FRIEND, 64_000, 0).unwrap_err().is_killed());
    assert!(session.answer(FRIEND, 64_000, 0).unwrap_err().is_killed());
    assert!(session.call_control(FRIEND, CallControl::Pause).unwrap_err().is_killed());
    assert!(session.set_bit_rate(FRIEND, None, Some(0)).unwrap_err().is_killed());
    assert_eq!(session.active_calls(), Err(SessionKilled));

    // 错误信息
    assert_eq!(SessionKilled.to_string(), "call session killed");
}

#[test]
fn test_single_session_per_transport() {
    let handle = handle_with_friend(FRIEND);
    let mut first = Session::new(&handle, IgnoreCalls).unwrap();

    // 同一连接的另一个句柄也算同一连接
    let clone = handle.clone();
    assert_eq!(
        Session::new(&clone, IgnoreCalls).err(),
        Some(SessionCreationError::DuplicateSession)
    );

    first.kill();
    let second = Session::new(&clone, IgnoreCalls);
    assert!(second.is_ok());

    // 不同连接互不影响
    let other = handle_with_friend(FRIEND);
    assert!(Session::new(&other, IgnoreCalls).is_ok());
}

#[test]
fn test_iteration_interval_never_exceeds_idle() {
    let handle = handle_with_friend(FRIEND);
    handle.transport().add_friend(FriendNumber(6), true);
    let mut session = Session::new(&handle, IgnoreCalls).unwrap();
    assert_eq!(session.iteration_interval(), Ok(200));

    session.call(FRIEND, 0, 2_000_000).unwrap();
    assert!(session.iteration_interval().unwrap() <= 200);

    handle
        .transport()
        .inject(FRIEND, CallSignal::Start(Capabilities::for_bit_rates(0, 2_000_000)));
    session.iterate().unwrap();
    let video_only = session.iteration_interval().unwrap();
    assert!(video_only <= 200);

    session.call(FriendNumber(6), 64_000, 0).unwrap();
    handle
        .transport()
        .inject(FriendNumber(6), CallSignal::Start(Capabilities::for_bit_rates(64_000, 0)));
    session.iterate().unwrap();
    assert!(session.iteration_interval().unwrap() <= video_only);
    assert_eq!(session.active_calls(), Ok(2));

    session.call_control(FRIEND, CallControl::Cancel).unwrap();
    session.call_control(FriendNumber(6), CallControl::Cancel).unwrap();
    assert_eq!(session.iteration_interval(), Ok(200));
}

#[test]
fn test_answer_without_pending_call() {
    let handle = handle_with_friend(FRIEND);
    let mut session = Session::new(&handle, IgnoreCalls).unwrap();

    // Idle
    assert_eq!(
        session.answer(FRIEND, 64_000, 0),
        Err(SessionError::Rejected(AnswerError::FriendNotCalling))
    );

    // Active
    session.call(FRIEND, 64_000, 0).unwrap();
    handle
        .transport()
        .inject(FRIEND, CallSignal::Start(Capabilities::for_bit_rates(64_000, 0)));
    session.iterate().unwrap();
    assert_eq!(
        session.answer(FRIEND, 64_000, 0),
        Err(SessionError::Rejected(AnswerError::FriendNotCalling))
    );

    assert_eq!(
        session.answer(FriendNumber(77), 64_000, 0),
        Err(SessionError::Rejected(AnswerError::FriendNotFound))
    );
}

#[test]
fn test_incoming_call_answered() {
    let handle = handle_with_friend(FRIEND);
    let log = EventLog::default();
    let mut session = Session::new(&handle, log.clone()).unwrap();

    handle
        .transport()
        .inject(FRIEND, CallSignal::Invite(Capabilities::for_bit_rates(64_000, 0)));
    session.iterate().unwrap();
    assert_eq!(log.take(), vec!["call 5 audio=true video=false".to_string()]);
    assert_eq!(session.call_state(FRIEND), Ok(CallState::IncomingRinging));

    assert_eq!(
        session.answer(FRIEND, 0, 0),
        Err(SessionError::Rejected(AnswerError::InvalidBitRate))
    );
    session.answer(FRIEND, 32_000, 0).unwrap();
    assert_eq!(session.call_state(FRIEND), Ok(CallState::Active));

    // 本地操作不触发回调
    assert!(log.take().is_empty());

    handle.transport().inject(FRIEND, CallSignal::End);
    session.iterate().unwrap();
    assert_eq!(log.take(), vec!["state 5 finished".to_string()]);
    assert_eq!(session.call_state(FRIEND), Ok(CallState::Idle));
}

#[test]
fn test_ringing_never_times_out() {
    let handle = handle_with_friend(FRIEND);
    let log = EventLog::default();
    let mut session = Session::new(&handle, log.clone()).unwrap();

    session.call(FRIEND, 64_000, 0).unwrap();
    for _ in 0..50 {
        session.iterate().unwrap();
    }
    assert_eq!(session.call_state(FRIEND), Ok(CallState::OutgoingRinging));

    // 对端掉线才结束
    handle.transport().set_connected(FRIEND, false);
    session.iterate().unwrap();
    assert_eq!(session.call_state(FRIEND), Ok(CallState::Idle));
    assert_eq!(log.take(), vec!["state 5 error".to_string()]);
}

#[test]
fn test_call_control_and_bit_rate() {
    let handle = handle_with_friend(FRIEND);
    let mut session = Session::new(&handle, IgnoreCalls).unwrap();

    assert_eq!(
        session.call_control(FRIEND, CallControl::Pause),
        Err(SessionError::Rejected(CallControlError::FriendNotInCall))
    );

    session.call(FRIEND, 64_000, 0).unwrap();
    handle
        .transport()
        .inject(FRIEND, CallSignal::Start(Capabilities::for_bit_rates(64_000, 0)));
    session.iterate().unwrap();
    handle.transport().take_sent();

    session.call_control(FRIEND, CallControl::Pause).unwrap();
    assert_eq!(session.iteration_interval(), Ok(200));
    assert_eq!(
        session.call_control(FRIEND, CallControl::Pause),
        Err(SessionError::Rejected(CallControlError::InvalidTransition))
    );
    session.call_control(FRIEND, CallControl::Resume).unwrap();

    session.set_bit_rate(FRIEND, Some(24_000), None).unwrap();
    let call = session.call_info(FRIEND).unwrap().unwrap();
    assert_eq!(call.bit_rates(), BitRates::new(24_000, 0));

    assert_eq!(
        handle.transport().take_sent(),
        vec![
            (FRIEND, CallSignal::Change(Capabilities::NONE)),
            (FRIEND, CallSignal::Change(Capabilities::for_bit_rates(64_000, 0))),
        ]
    );
}

#[test]
fn test_bit_rate_change_needs_active_call() {
    let handle = handle_with_friend(FRIEND);
    let mut session = Session::new(&handle, IgnoreCalls).unwrap();

    session.call(FRIEND, 64_000, 0).unwrap();
    handle.transport().take_sent();
    assert_eq!(
        session.set_bit_rate(FRIEND, None, Some(1_000_000)),
        Err(SessionError::Rejected(BitRateSetError::FriendNotInCall))
    );

    handle
        .transport()
        .inject(FRIEND, CallSignal::Start(Capabilities::for_bit_rates(64_000, 0)));
    session.iterate().unwrap();
    let call = session.call_info(FRIEND).unwrap().unwrap();
    assert!(!call.self_capabilities().send_video);

    // 接听后再开视频，对端会收到能力变更
    session.set_bit_rate(FRIEND, None, Some(1_000_000)).unwrap();
    assert_eq!(
        handle.transport().take_sent(),
        vec![(FRIEND, CallSignal::Change(Capabilities::for_bit_rates(64_000, 1_000_000)))]
    );
}

#[test]
fn test_two_linked_sessions() {
    const BOB: FriendNumber = FriendNumber(1);
    const ALICE: FriendNumber = FriendNumber(0);

    let alice_transport = MemoryTransport::new();
    let bob_transport = MemoryTransport::new();
    MemoryTransport::link(&alice_transport, BOB, &bob_transport, ALICE);
    let alice_handle = TransportHandle::new(alice_transport);
    let bob_handle = TransportHandle::new(bob_transport);

    let bob_log = EventLog::default();
    let mut alice = Session::new(&alice_handle, IgnoreCalls).unwrap();
    let mut bob = Session::new(&bob_handle, bob_log.clone()).unwrap();

    alice.call(BOB, 64_000, 0).unwrap();
    bob.iterate().unwrap();
    assert_eq!(bob_log.take(), vec!["call 0 audio=true video=false".to_string()]);

    bob.answer(ALICE, 64_000, 0).unwrap();
    alice.iterate().unwrap();
    assert_eq!(alice.call_state(BOB), Ok(CallState::Active));
    assert_eq!(bob.call_state(ALICE), Ok(CallState::Active));

    alice.call_control(BOB, CallControl::Cancel).unwrap();
    bob.iterate().unwrap();
    assert_eq!(bob.call_state(ALICE), Ok(CallState::Idle));
    assert_eq!(bob_log.take(), vec!["state 0 finished".to_string()]);
}

#[test]
fn test_version_self_compatible() {
    assert!(version_is_compatible(version_major(), version_minor(), version_patch()));
    assert_eq!(
        format!("{}.{}.{}", version_major(), version_minor(), version_patch()),
        tox_call::VERSION
    );
}
