//! Scoped navigation into nested contexts (dialogs, tabs, frames)

use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, warn};

use crate::error::E2eResult;

/// A context entered from a parent page and left back to it
#[async_trait]
pub trait Nested<P: Sync>: Sized + Send {
    /// Where `enter` started from, handed back to `leave`
    type Origin: Send;

    async fn enter(parent: &P) -> E2eResult<(Self, Self::Origin)>;

    /// Return control to `parent` at `origin`; must be safe to call when
    /// already left
    async fn leave(parent: &P, origin: Self::Origin) -> E2eResult<()>;
}

/// Enter `C` from `parent`, run `block` in it, then always leave.
///
/// When both `block` and leaving fail, the block's error is returned and the
/// leave error is logged.
pub async fn perform_within<P, C, F, Fut, T>(parent: &P, block: F) -> E2eResult<T>
where
    P: Sync,
    C: Nested<P>,
    F: FnOnce(C) -> Fut,
    Fut: Future<Output = E2eResult<T>>,
{
    let (child, origin) = C::enter(parent).await?;
    debug!("Entered {}", std::any::type_name::<C>());
    let outcome = block(child).await;
    let left = C::leave(parent, origin).await;

    match (outcome, left) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(leave_error)) => {
            warn!("Leaving {} failed after an error: {}", std::any::type_name::<C>(), leave_error);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::E2eError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Parent {
        journal: Mutex<Vec<&'static str>>,
        fail_leave: bool,
    }

    struct Child;

    #[async_trait]
    impl Nested<Parent> for Child {
        type Origin = &'static str;

        async fn enter(parent: &Parent) -> E2eResult<(Self, Self::Origin)> {
            parent.journal.lock().push("enter");
            Ok((Child, "origin"))
        }

        async fn leave(parent: &Parent, origin: Self::Origin) -> E2eResult<()> {
            parent.journal.lock().push("leave");
            parent.journal.lock().push(origin);
            if parent.fail_leave {
                return Err(E2eError::StepFailed {
                    step: "leave".into(),
                    reason: "dialog stuck".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_leaves_after_success() {
        let parent = Parent::default();
        let value = perform_within(&parent, |_: Child| async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(*parent.journal.lock(), vec!["enter", "leave", "origin"]);
    }

    #[tokio::test]
    async fn test_leaves_after_failure_and_keeps_block_error() {
        let parent = Parent {
            fail_leave: true,
            ..Default::default()
        };
        let err = perform_within(&parent, |_: Child| async {
            Err::<(), _>(E2eError::OutputMismatch("boom".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, E2eError::OutputMismatch(_)));
        assert_eq!(*parent.journal.lock(), vec!["enter", "leave", "origin"]);
    }

    #[tokio::test]
    async fn test_leave_error_surfaces_when_block_succeeds() {
        let parent = Parent {
            fail_leave: true,
            ..Default::default()
        };
        let err = perform_within(&parent, |_: Child| async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, E2eError::StepFailed { .. }));
    }
}
