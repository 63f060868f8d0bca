use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Await a backend call, failing once `limit` has elapsed.
pub async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("{what} timed out after {}ms", limit.as_millis())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_call_times_out() {
        let res: Result<()> = bounded(Duration::from_millis(10), "find", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let msg = res.unwrap_err().to_string();
        assert_eq!(msg, "find timed out after 10ms");
    }

    #[tokio::test]
    async fn backend_error_passes_through() {
        let res: Result<u8> =
            bounded(Duration::from_secs(1), "query", async { Err(anyhow!("down")) }).await;
        assert_eq!(res.unwrap_err().to_string(), "down");
    }
}
