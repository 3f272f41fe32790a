use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Time budget for one core operation. When it runs out the operation's future is
/// dropped, which rolls back any open transaction, and the caller gets `Cancelled`.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Deadline { budget }
    }

    pub fn from_secs(secs: u64) -> Self {
        Deadline::new(Duration::from_secs(secs))
    }

    pub async fn run<F, T>(&self, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.budget, operation).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("operation exceeded its {:?} deadline", self.budget);
                Err(AppError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_budget() {
        let deadline = Deadline::from_secs(5);
        let value = deadline.run(async { Ok::<_, AppError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_expired_budget_cancels() {
        let deadline = Deadline::new(Duration::from_millis(10));
        let result = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, AppError>(())
            })
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let deadline = Deadline::from_secs(5);
        let result: Result<(), _> = deadline
            .run(async { Err(AppError::NotFound("Community".into())) })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
