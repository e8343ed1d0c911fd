// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Clock and task helpers shared by both protocols.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Outcome of a guarded wait.
#[derive(Debug, PartialEq, Eq)]
pub enum Guarded<T> {
    Completed(T),
    Cancelled,
    TimedOut,
}

/// Await `fut` unless `cancel` fires first or the optional `limit` elapses.
///
/// `None` as a limit waits indefinitely.
pub async fn guarded<F: Future>(
    cancel: &CancellationToken,
    limit: Option<Duration>,
    fut: F,
) -> Guarded<F::Output> {
    let bounded = async {
        match limit {
            Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
            None => Some(fut.await),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Guarded::Cancelled,
        out = bounded => match out {
            Some(value) => Guarded::Completed(value),
            None => Guarded::TimedOut,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_when_not_cancelled() {
        let cancel = CancellationToken::new();
        let out = guarded(&cancel, None, async { 7 }).await;
        assert_eq!(out, Guarded::Completed(7));
    }

    #[tokio::test]
    async fn cancelled_token_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = guarded(&cancel, None, async { 7 }).await;
        assert_eq!(out, Guarded::Cancelled);
    }

    #[tokio::test]
    async fn limit_elapses_on_pending_future() {
        let cancel = CancellationToken::new();
        let out = guarded(
            &cancel,
            Some(Duration::from_millis(5)),
            std::future::pending::<()>(),
        )
        .await;
        assert_eq!(out, Guarded::TimedOut);
    }

    #[test]
    fn unix_now_is_after_2024() {
        assert!(unix_now() > 1_704_067_200);
    }
}
