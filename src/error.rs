//! 错误分类
//!
//! 引擎对每个失败的操作返回一个失败码（`*Status`），这里把失败码一一映射到
//! 面向用户的错误类型。所有映射都是穷尽的 `match`，没有通配分支，
//! 引擎新增状态码时编译器会强制更新映射。
//!
//! [`SessionKilled`] 优先于所有操作相关错误，每个操作最先检查。

use thiserror::Error;

/// 会话已被 kill
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("call session killed")]
pub struct SessionKilled;

/// 会话操作的错误：会话已 kill，或者操作本身被拒绝
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError<E> {
    #[error(transparent)]
    Killed(#[from] SessionKilled),

    #[error(transparent)]
    Rejected(E),
}

impl<E> SessionError<E> {
    pub fn is_killed(&self) -> bool {
        matches!(self, SessionError::Killed(_))
    }

    /// 操作相关的拒绝原因
    pub fn rejection(&self) -> Option<&E> {
        match self {
            SessionError::Killed(_) => None,
            SessionError::Rejected(e) => Some(e),
        }
    }

    /// 把引擎失败码映射为操作错误
    pub(crate) fn rejected<S>(status: S) -> Self
    where
        E: From<S>,
    {
        SessionError::Rejected(E::from(status))
    }
}

/// 创建会话失败
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionCreationError {
    #[error("One of the arguments to the function was NULL when it was not expected.")]
    NullArgument,

    #[error("Memory allocation failure while trying to allocate structures required for the A/V session.")]
    AllocationFailure,

    #[error("Attempted to create a second session for the same transport connection.")]
    DuplicateSession,
}

/// 发起呼叫失败
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallError {
    #[error("A resource allocation error occurred while trying to create the structures required for the call.")]
    AllocationFailure,

    #[error("Synchronization error occurred.")]
    SyncError,

    #[error("The friend number did not designate a valid friend.")]
    FriendNotFound,

    #[error("The friend was valid, but not currently connected.")]
    FriendNotConnected,

    #[error("Attempted to call a friend while already in an audio or video call with them.")]
    FriendAlreadyInCall,

    #[error("Audio or video bit rate is invalid.")]
    InvalidBitRate,
}

/// 接听失败
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerError {
    #[error("Synchronization error occurred.")]
    SyncError,

    #[error(
        "Failed to initialize codecs for call session. Note that codec initiation will fail if there is no receive callback registered for either audio or video."
    )]
    CodecInitFailure,

    #[error("The friend number did not designate a valid friend.")]
    FriendNotFound,

    #[error(
        "The friend was valid, but they are not currently trying to initiate a call. This is also returned if this client is already in a call with the friend."
    )]
    FriendNotCalling,

    #[error("Audio or video bit rate is invalid.")]
    InvalidBitRate,
}

/// 通话控制失败
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallControlError {
    #[error("Synchronization error occurred.")]
    SyncError,

    #[error("The friend number did not designate a valid friend.")]
    FriendNotFound,

    #[error("This client is currently not in a call with the friend. Before the call is answered, only CANCEL is a valid control.")]
    FriendNotInCall,

    #[error("Happens if user tried to pause an already paused call or if trying to resume a call that is not paused.")]
    InvalidTransition,
}

/// 设置码率失败
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitRateSetError {
    #[error("Synchronization error occurred.")]
    SyncError,

    #[error("The bit rate passed was not one of the supported values.")]
    InvalidBitRate,

    #[error("The friend number did not designate a valid friend.")]
    FriendNotFound,

    #[error("This client is currently not in a call with the friend.")]
    FriendNotInCall,
}

// ============ 引擎失败码 ============

/// 创建会话的失败码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NewStatus {
    Null,
    Malloc,
    Multiple,
}

/// 发起呼叫的失败码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallStatus {
    Malloc,
    Sync,
    FriendNotFound,
    FriendNotConnected,
    FriendAlreadyInCall,
    InvalidBitRate,
}

/// 接听的失败码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerStatus {
    Sync,
    CodecInitialization,
    FriendNotFound,
    FriendNotCalling,
    InvalidBitRate,
}

/// 通话控制的失败码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallControlStatus {
    Sync,
    FriendNotFound,
    FriendNotInCall,
    InvalidTransition,
}

/// 设置码率的失败码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitRateSetStatus {
    Sync,
    InvalidBitRate,
    FriendNotFound,
    FriendNotInCall,
}

impl From<NewStatus> for SessionCreationError {
    fn from(status: NewStatus) -> Self {
        match status {
            NewStatus::Null => Self::NullArgument,
            NewStatus::Malloc => Self::AllocationFailure,
            NewStatus::Multiple => Self::DuplicateSession,
        }
    }
}

impl From<CallStatus> for CallError {
    fn from(status: CallStatus) -> Self {
        match status {
            CallStatus::Malloc => Self::AllocationFailure,
            CallStatus::Sync => Self::SyncError,
            CallStatus::FriendNotFound => Self::FriendNotFound,
            CallStatus::FriendNotConnected => Self::FriendNotConnected,
            CallStatus::FriendAlreadyInCall => Self::FriendAlreadyInCall,
            CallStatus::InvalidBitRate => Self::InvalidBitRate,
        }
    }
}

impl From<AnswerStatus> for AnswerError {
    fn from(status: AnswerStatus) -> Self {
        match status {
            AnswerStatus::Sync => Self::SyncError,
            AnswerStatus::CodecInitialization => Self::CodecInitFailure,
            AnswerStatus::FriendNotFound => Self::FriendNotFound,
            AnswerStatus::FriendNotCalling => Self::FriendNotCalling,
            AnswerStatus::InvalidBitRate => Self::InvalidBitRate,
        }
    }
}

impl From<CallControlStatus> for CallControlError {
    fn from(status: CallControlStatus) -> Self {
        match status {
            CallControlStatus::Sync => Self::SyncError,
            CallControlStatus::FriendNotFound => Self::FriendNotFound,
            CallControlStatus::FriendNotInCall => Self::FriendNotInCall,
            CallControlStatus::InvalidTransition => Self::InvalidTransition,
        }
    }
}

impl From<BitRateSetStatus> for BitRateSetError {
    fn from(status: BitRateSetStatus) -> Self {
        match status {
            BitRateSetStatus::Sync => Self::SyncError,
            BitRateSetStatus::InvalidBitRate => Self::InvalidBitRate,
            BitRateSetStatus::FriendNotFound => Self::FriendNotFound,
            BitRateSetStatus::FriendNotInCall => Self::FriendNotInCall,
        }
    }
}
