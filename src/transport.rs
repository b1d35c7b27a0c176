//! 传输层边界
//!
//! 通话层只通过 [`Transport`] 访问底层加密信道：查询好友是否存在/在线，
//! 收发通话信令。信令的线路编码由传输层负责。
//!
//! [`TransportHandle`] 是引用计数的传输句柄，内部带一个会话槽位，
//! 保证同一时刻每个传输连接最多绑定一个会话。
//!
//! 销毁顺序约定：会话必须先于（或同时于）其传输句柄被 kill。
//! 传输本身的迭代循环由应用独立驱动。

pub mod memory;

use crate::call::state::Capabilities;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// 传输层的好友编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FriendNumber(pub u32);

impl fmt::Display for FriendNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FriendNumber {
    fn from(value: u32) -> Self {
        FriendNumber(value)
    }
}

/// 通话信令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSignal {
    /// 发起呼叫，携带本端能力
    Invite(Capabilities),
    /// 接听呼叫，携带本端能力
    Start(Capabilities),
    /// 通话中能力变更（暂停、静音、码率开关）
    Change(Capabilities),
    /// 挂断或拒接
    End,
}

/// 传输层错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("friend {0} is not reachable")]
    Unreachable(FriendNumber),

    #[error("signal could not be sent: {0}")]
    SendFailed(String),
}

/// 底层加密传输/身份层
pub trait Transport: Send + Sync + 'static {
    /// 好友编号是否指向一个有效好友
    fn friend_exists(&self, friend: FriendNumber) -> bool;

    /// 好友当前是否在线
    fn is_friend_connected(&self, friend: FriendNumber) -> bool;

    /// 向好友发送一条信令
    fn send_signal(&self, friend: FriendNumber, signal: CallSignal) -> Result<(), TransportError>;

    /// 取出一条已到达的信令，没有时返回 None
    fn poll_signal(&self) -> Option<(FriendNumber, CallSignal)>;
}

struct Shared<T> {
    transport: T,
    /// 句柄是否仍然有效
    alive: AtomicBool,
    /// 是否已有会话绑定
    session_bound: AtomicBool,
}

/// 传输连接句柄（可克隆，共享同一个底层连接）
pub struct TransportHandle<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for TransportHandle<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T: Transport> TransportHandle<T> {
    /// 包装一个传输实例
    pub fn new(transport: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                alive: AtomicBool::new(true),
                session_bound: AtomicBool::new(false),
            }),
        }
    }

    /// 底层传输
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// 标记句柄失效，之后不能再绑定新会话
    pub fn close(&self) {
        self.shared.alive.store(false, Ordering::Release);
    }

    /// 句柄是否有效
    pub fn is_valid(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// 是否已有会话绑定
    pub fn has_session(&self) -> bool {
        self.shared.session_bound.load(Ordering::Acquire)
    }

    /// 当前持有该连接的句柄数量（包括会话持有的引用）
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// 两个句柄是否指向同一个连接
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// 占用会话槽位；槽位已被占用时返回 None
    pub(crate) fn try_bind(&self) -> Option<SessionSlot<T>> {
        self.shared
            .session_bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SessionSlot { handle: self.clone() })
    }
}

/// 会话槽位守卫：持有传输句柄的强引用，析构时释放槽位（恰好一次）
pub(crate) struct SessionSlot<T: Transport> {
    handle: TransportHandle<T>,
}

impl<T: Transport> SessionSlot<T> {
    pub(crate) fn handle(&self) -> &TransportHandle<T> {
        &self.handle
    }

    pub(crate) fn transport(&self) -> &T {
        self.handle.transport()
    }
}

impl<T: Transport> Drop for SessionSlot<T> {
    fn drop(&mut self) {
        self.handle.shared.session_bound.store(false, Ordering::Release);
    }
}
