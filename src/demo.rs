use tracing::{error, info, warn};
use tox_call::logging::init;

use tox_call::transport::memory::MemoryTransport;
use tox_call::{BitRates, CallControl, CallHandler, CallState, FriendNumber, PeerState, Session, TransportHandle};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Alice 通讯录里 Bob 的编号
const BOB: FriendNumber = FriendNumber(1);
/// Bob 通讯录里 Alice 的编号
const ALICE: FriendNumber = FriendNumber(0);

const AUDIO_BIT_RATE: u32 = 64_000;
const RING_TIMEOUT: Duration = Duration::from_secs(5);

type SharedSession = Arc<Mutex<Session<MemoryTransport>>>;

/// 打印事件；收到呼叫时交给迭代线程去接听
struct DemoHandler {
    name: &'static str,
    incoming: Sender<FriendNumber>,
}

impl CallHandler for DemoHandler {
    fn on_call(&mut self, friend: FriendNumber, audio_enabled: bool, video_enabled: bool) {
        info!("[{}] 好友 {} 来电: 音频={}, 视频={}", self.name, friend, audio_enabled, video_enabled);
        // 回调在 iterate 内部执行，此时会话被锁住，不能直接 answer
        let _ = self.incoming.send(friend);
    }

    fn on_call_state(&mut self, friend: FriendNumber, state: PeerState) {
        info!("[{}] 好友 {} 通话状态: {:?}", self.name, friend, state);
    }

    fn on_bit_rate_suggestion(&mut self, friend: FriendNumber, bit_rates: BitRates) {
        info!("[{}] 好友 {} 建议码率: {:?}", self.name, friend, bit_rates);
    }
}

/// 按会话给出的间隔驱动 iterate；auto_answer 时接听所有来电
fn spawn_iterate_loop(
    name: &'static str,
    session: SharedSession,
    incoming: Receiver<FriendNumber>,
    auto_answer: bool,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::Acquire) {
            let interval = {
                let mut session = match session.lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        error!("[{}] 会话锁已损坏，退出迭代", name);
                        return;
                    }
                };

                if session.iterate().is_err() {
                    info!("[{}] 会话已 kill，退出迭代", name);
                    return;
                }

                for friend in incoming.try_iter() {
                    if !auto_answer {
                        continue;
                    }
                    match session.answer(friend, AUDIO_BIT_RATE, 0) {
                        Ok(()) => info!("[{}] 已接听好友 {}", name, friend),
                        Err(e) => warn!("[{}] 接听好友 {} 失败: {}", name, friend, e),
                    }
                }

                session.iteration_interval().unwrap_or(0)
            };

            thread::sleep(Duration::from_millis(u64::from(interval)));
        }
    })
}

fn wait_for_state(session: &SharedSession, friend: FriendNumber, expected: CallState) -> bool {
    let deadline = Instant::now() + RING_TIMEOUT;
    while Instant::now() < deadline {
        let state = session.lock().ok().and_then(|s| s.call_state(friend).ok());
        if state == Some(expected) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

fn main() {
    // 日志系统初始化
    init();

    let mut args = std::env::args();
    let cmd = args.next().unwrap_or_else(|| "toxcall-demo".to_string());
    if args.len() != 0 {
        println!("用法: {cmd}");
        println!("\n在进程内模拟两端通话：呼叫、自动接听、挂断、kill。");
        return;
    }

    let alice_transport = MemoryTransport::new();
    let bob_transport = MemoryTransport::new();
    alice_transport.add_friend(BOB, true);
    bob_transport.add_friend(ALICE, true);
    MemoryTransport::link(&alice_transport, BOB, &bob_transport, ALICE);

    let alice_handle = TransportHandle::new(alice_transport);
    let bob_handle = TransportHandle::new(bob_transport);

    let (alice_tx, alice_rx) = mpsc::channel();
    let (bob_tx, bob_rx) = mpsc::channel();

    let alice = match Session::new(&alice_handle, DemoHandler { name: "alice", incoming: alice_tx }) {
        Ok(session) => Arc::new(Mutex::new(session)),
        Err(e) => {
            error!("创建 alice 会话失败: {}", e);
            return;
        }
    };
    let bob = match Session::new(&bob_handle, DemoHandler { name: "bob", incoming: bob_tx }) {
        Ok(session) => Arc::new(Mutex::new(session)),
        Err(e) => {
            error!("创建 bob 会话失败: {}", e);
            return;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let loops = vec![
        spawn_iterate_loop("alice", Arc::clone(&alice), alice_rx, false, Arc::clone(&running)),
        spawn_iterate_loop("bob", Arc::clone(&bob), bob_rx, true, Arc::clone(&running)),
    ];

    let dialled = match alice.lock() {
        Ok(mut session) => session.call(BOB, AUDIO_BIT_RATE, 0),
        Err(_) => {
            error!("alice 会话锁已损坏");
            return;
        }
    };

    match dialled {
        Ok(()) => {
            info!("alice 正在呼叫 bob");
            // 振铃超时由应用负责
            if wait_for_state(&alice, BOB, CallState::Active) {
                info!("通话已建立");
                thread::sleep(Duration::from_millis(200));
            } else {
                warn!("{:?} 内无人接听，取消呼叫", RING_TIMEOUT);
            }

            if let Ok(mut session) = alice.lock() {
                if let Err(e) = session.call_control(BOB, CallControl::Cancel) {
                    warn!("挂断失败: {}", e);
                }
            }
            if !wait_for_state(&bob, ALICE, CallState::Idle) {
                warn!("bob 没有收到挂断");
            }
        }
        Err(e) => error!("呼叫失败: {}", e),
    }

    for session in [&alice, &bob] {
        if let Ok(mut session) = session.lock() {
            session.kill();
            // 第二次 kill 什么也不做
            session.kill();
        }
    }

    running.store(false, Ordering::Release);
    for handle in loops {
        if handle.join().is_err() {
            error!("迭代线程异常退出");
        }
    }

    info!(
        "演示结束: alice 句柄引用数 {}, bob 句柄引用数 {}",
        alice_handle.reference_count(),
        bob_handle.reference_count()
    );
}
