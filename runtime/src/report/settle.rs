//! Wait-for-both joins that tolerate partial failure.
//!
//! Each branch is driven to completion even when its sibling errors or
//! panics; a panic is caught and reported as a rejection of that branch only.

use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Outcome of one settled branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    Fulfilled(T),
    Rejected(String),
}

impl<T> Settled<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Fulfilled(v) => Some(v),
            Self::Rejected(_) => None,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }
}

/// Drive `fut` to completion, turning an error or a panic into a rejection.
pub async fn settle<F, T, E>(fut: F) -> Settled<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Settled::Fulfilled(value),
        Ok(Err(e)) => Settled::Rejected(e.to_string()),
        Err(panic) => Settled::Rejected(format!("task panicked: {}", panic_message(&*panic))),
    }
}

/// Run two fallible futures concurrently and wait for both.
pub async fn settle_both<A, B, TA, TB, EA, EB>(a: A, b: B) -> (Settled<TA>, Settled<TB>)
where
    A: Future<Output = Result<TA, EA>>,
    B: Future<Output = Result<TB, EB>>,
    EA: Display,
    EB: Display,
{
    futures::future::join(settle(a), settle(b)).await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
