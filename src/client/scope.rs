//! Cancellable scope for view loads
//!
//! A view starts its loads inside a [`TaskScope`]. Once the scope is disposed,
//! explicitly or by dropping it, pending loads stop and their results are
//! never applied.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct TaskScope {
    token: CancellationToken,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope that is disposed together with this one
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn dispose(&self) {
        self.token.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Await `future` unless the scope is disposed first; `None` when disposed
    pub async fn run<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = future => (!self.token.is_cancelled()).then_some(output),
        }
    }

    /// Spawn `future` and hand its output to `apply`, skipping `apply` if the
    /// scope was disposed in the meantime
    pub fn spawn<F, A>(&self, future: F, apply: A) -> JoinHandle<()>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        A: FnOnce(F::Output) + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            let output = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                output = future => output,
            };
            if token.is_cancelled() {
                return;
            }
            apply(output);
        })
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_completes_in_live_scope() {
        let scope = TaskScope::new();
        assert_eq!(scope.run(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_run_in_disposed_scope_yields_nothing() {
        let scope = TaskScope::new();
        scope.dispose();
        assert_eq!(scope.run(async { 7 }).await, None);
        assert!(scope.is_disposed());
    }

    #[tokio::test]
    async fn test_disposed_scope_suppresses_late_result() {
        let scope = TaskScope::new();
        let applied = Arc::new(AtomicBool::new(false));
        let flag = applied.clone();

        let handle = scope.spawn(
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                1
            },
            move |_| flag.store(true, Ordering::SeqCst),
        );
        scope.dispose();
        handle.await.unwrap();

        assert!(!applied.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropping_scope_disposes_children() {
        let scope = TaskScope::new();
        let child = scope.child();
        drop(scope);
        assert!(child.is_disposed());
    }

    #[tokio::test]
    async fn test_spawn_applies_result() {
        let scope = TaskScope::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scope
            .spawn(async { "loaded" }, move |v| {
                let _ = tx.send(v);
            })
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), "loaded");
    }
}
