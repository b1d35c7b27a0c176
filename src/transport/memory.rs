//! 进程内传输实现
//!
//! 维护好友表、入站信令队列和出站记录。两个实例可以互相链接，
//! 从而在同一进程里完成一次完整的呼叫/接听流程。

use super::{CallSignal, FriendNumber, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::trace;

/// 出站记录上限，超出后丢弃最早的记录
pub const OUTBOX_CAPACITY: usize = 256;

/// 进程内传输（克隆后共享同一份状态）
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    /// 好友编号 -> 是否在线
    friends: HashMap<FriendNumber, bool>,

    /// 已到达、尚未被取走的信令
    inbox: VecDeque<(FriendNumber, CallSignal)>,

    /// 已发送的信令（按顺序，最多保留 OUTBOX_CAPACITY 条）
    outbox: VecDeque<(FriendNumber, CallSignal)>,

    /// 好友编号 -> (对端状态, 本端在对端的好友编号)
    links: HashMap<FriendNumber, (Weak<Mutex<MemoryState>>, FriendNumber)>,

    /// 为 true 时所有发送都失败
    fail_sends: bool,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加（或更新）一个好友
    pub fn add_friend(&self, friend: FriendNumber, connected: bool) {
        lock(&self.inner).friends.insert(friend, connected);
    }

    /// 删除好友
    pub fn remove_friend(&self, friend: FriendNumber) {
        let mut state = lock(&self.inner);
        state.friends.remove(&friend);
        state.links.remove(&friend);
    }

    /// 修改好友在线状态
    pub fn set_connected(&self, friend: FriendNumber, connected: bool) {
        if let Some(flag) = lock(&self.inner).friends.get_mut(&friend) {
            *flag = connected;
        }
    }

    /// 让后续发送全部失败（或恢复）
    pub fn set_fail_sends(&self, fail: bool) {
        lock(&self.inner).fail_sends = fail;
    }

    /// 模拟好友发来一条信令
    pub fn inject(&self, from: FriendNumber, signal: CallSignal) {
        lock(&self.inner).inbox.push_back((from, signal));
    }

    /// 取走出站记录
    pub fn take_sent(&self) -> Vec<(FriendNumber, CallSignal)> {
        lock(&self.inner).outbox.drain(..).collect()
    }

    /// 链接两个传输：a 的好友 `a_friend` 就是 b，b 的好友 `b_friend` 就是 a。
    /// 双方都会把对方加为在线好友。
    pub fn link(a: &MemoryTransport, a_friend: FriendNumber, b: &MemoryTransport, b_friend: FriendNumber) {
        {
            let mut state = lock(&a.inner);
            state.friends.insert(a_friend, true);
            state.links.insert(a_friend, (Arc::downgrade(&b.inner), b_friend));
        }
        let mut state = lock(&b.inner);
        state.friends.insert(b_friend, true);
        state.links.insert(b_friend, (Arc::downgrade(&a.inner), a_friend));
    }
}

impl Transport for MemoryTransport {
    fn friend_exists(&self, friend: FriendNumber) -> bool {
        lock(&self.inner).friends.contains_key(&friend)
    }

    fn is_friend_connected(&self, friend: FriendNumber) -> bool {
        lock(&self.inner).friends.get(&friend).copied().unwrap_or(false)
    }

    fn send_signal(&self, friend: FriendNumber, signal: CallSignal) -> Result<(), TransportError> {
        let link = {
            let mut state = lock(&self.inner);
            if state.fail_sends {
                return Err(TransportError::SendFailed("sends disabled".to_string()));
            }
            if !state.friends.get(&friend).copied().unwrap_or(false) {
                return Err(TransportError::Unreachable(friend));
            }
            if state.outbox.len() == OUTBOX_CAPACITY {
                state.outbox.pop_front();
            }
            state.outbox.push_back((friend, signal));
            state.links.get(&friend).cloned()
        };

        // 先释放本端锁再投递，避免两端互相加锁
        if let Some((peer, number_on_peer)) = link {
            if let Some(peer) = peer.upgrade() {
                lock(&peer).inbox.push_back((number_on_peer, signal));
                trace!("信令 {:?} 已投递给对端（对端好友编号 {}）", signal, number_on_peer);
            }
        }

        Ok(())
    }

    fn poll_signal(&self) -> Option<(FriendNumber, CallSignal)> {
        lock(&self.inner).inbox.pop_front()
    }
}
