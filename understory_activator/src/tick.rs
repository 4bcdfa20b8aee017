// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative scheduling helper.
//!
//! [`yield_now`] suspends the current task for exactly one turn of its executor.
//! It is the "next tick" used to stagger list-mode removals and to defer
//! completion callbacks in composition.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

/// Suspend the current task once, waking it immediately.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
