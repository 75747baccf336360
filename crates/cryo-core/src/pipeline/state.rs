//! 파이프라인 실행 상태 머신과 실행 결과.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::Destination;

/// Ctrl-C 등 호스트 취소 시 프로세스 종료 코드.
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// 한 번의 실행 상태.
///
/// `Idle → Fetching → {NoData | Dispatching} → {Delivered | Failed}`.
/// 취소는 수집 또는 전달 중에 `Cancelled`로 끝납니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    NoData,
    Dispatching,
    Delivered,
    Failed,
    Cancelled,
}

impl RunState {
    /// 최종 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoData | Self::Delivered | Self::Failed | Self::Cancelled
        )
    }

    /// `next`로 전이할 수 있는지 확인합니다.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Fetching)
                | (Self::Fetching, Self::NoData)
                | (Self::Fetching, Self::Dispatching)
                | (Self::Fetching, Self::Cancelled)
                | (Self::Dispatching, Self::Delivered)
                | (Self::Dispatching, Self::Failed)
                | (Self::Dispatching, Self::Cancelled)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::NoData => "no_data",
            Self::Dispatching => "dispatching",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// 실행당 하나씩 생성되는 상태 추적기. 같은 상태에 다시 들어가지 않습니다.
#[derive(Debug)]
pub(crate) struct RunTracker {
    state: RunState,
}

impl RunTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    pub(crate) fn state(&self) -> RunState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "잘못된 상태 전이: {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "실행 상태 전이");
        self.state = next;
    }
}

/// 한 번의 실행 결과 (실패는 `DeliveryError`로 반환).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 센서가 데이터를 반환하지 않음 (에러 아님)
    NoData,
    /// 싱크에 전달 완료. llm 싱크는 연결된 전체 응답을 담습니다.
    Delivered {
        sink: Destination,
        content: Option<String>,
    },
    /// 호스트가 실행을 취소함
    Cancelled,
}

impl RunOutcome {
    /// 대응하는 최종 상태.
    pub fn state(&self) -> RunState {
        match self {
            Self::NoData => RunState::NoData,
            Self::Delivered { .. } => RunState::Delivered,
            Self::Cancelled => RunState::Cancelled,
        }
    }

    /// 프로세스 종료 코드.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoData | Self::Delivered { .. } => 0,
            Self::Cancelled => CANCELLED_EXIT_CODE,
        }
    }
}
