//! Async polling helpers

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            interval: Duration::from_millis(50),
        }
    }
}

/// Poll `check` until it succeeds or the timeout elapses.
///
/// On timeout the error carries the last failure `check` reported.
pub async fn wait_for<F, Fut, T, E>(mut check: F, options: WaitOptions) -> Result<T, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let deadline = Instant::now() + options.timeout;
    loop {
        match check().await {
            Ok(value) => return Ok(value),
            Err(e) if Instant::now() >= deadline => {
                return Err(HarnessError::Timeout {
                    timeout: options.timeout,
                    last_error: e.to_string(),
                });
            }
            Err(_) => sleep(options.interval).await,
        }
    }
}

/// Wait until `present` reports false. Fails straight away if it already does.
pub async fn wait_for_removal<F, Fut>(mut present: F, options: WaitOptions) -> Result<(), HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !present().await {
        return Err(HarnessError::AlreadyRemoved);
    }
    wait_for(
        || {
            let check = present();
            async move {
                if check.await {
                    Err("Element is still present")
                } else {
                    Ok(())
                }
            }
        },
        options,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn defaults() {
        let options = WaitOptions::default();
        assert_eq!(options.timeout, Duration::from_millis(1000));
        assert_eq!(options.interval, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn resolves_once_check_passes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = wait_for(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n >= 2 {
                        Ok(n)
                    } else {
                        Err("not yet")
                    }
                }
            },
            WaitOptions {
                interval: Duration::from_millis(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_with_last_failure() {
        let options = WaitOptions {
            timeout: Duration::from_millis(20),
            interval: Duration::from_millis(5),
        };
        let err = wait_for(
            || async { Err::<(), _>("Unable to find text: Loaded") },
            options,
        )
        .await
        .unwrap_err();
        match err {
            HarnessError::Timeout { timeout, last_error } => {
                assert_eq!(timeout, Duration::from_millis(20));
                assert_eq!(last_error, "Unable to find text: Loaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn waits_for_background_work() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let present = Arc::new(AtomicBool::new(true));
        let spinner = present.clone();
        let watcher = done.clone();
        tokio::spawn(async move {
            while !watcher.load(Ordering::SeqCst) {
                sleep(Duration::from_millis(5)).await;
            }
            spinner.store(false, Ordering::SeqCst);
        });

        wait_for_removal(
            || {
                let present = present.clone();
                async move { present.load(Ordering::SeqCst) }
            },
            WaitOptions {
                interval: Duration::from_millis(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn removal_of_absent_element_fails() {
        let err = wait_for_removal(|| async { false }, WaitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::AlreadyRemoved));
    }
}
