use std::time::Duration;

/// Default wall-clock budget for a `command` backend invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries granted to `http` backends on transport errors and 5xx responses.
pub const HTTP_RETRIES: u32 = 2;

/// Build a reqwest client with sane defaults (timeouts, no redirect chasing).
pub fn make_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(2))
        .timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default http client");
            reqwest::Client::new()
        })
}

/// Exponential backoff for async ops; only errors accepted by `retryable` are retried.
pub async fn retry_async<T, E, Fut, F, R>(mut attempts: u32, retryable: R, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut try_num: u32 = 0;
    let mut delay_ms: u64 = 50;
    loop {
        match op(try_num).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempts == 0 || !retryable(&e) {
                    return Err(e);
                }
                attempts -= 1;
                tracing::debug!(attempt = try_num, delay_ms, "retrying");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(1_000);
                try_num += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::retry_async;

    #[tokio::test]
    async fn it_retries_then_succeeds() {
        let mut calls = 0;
        let res: Result<i32, i32> = retry_async(
            3,
            |_| true,
            move |_| {
                calls += 1;
                let c = calls;
                async move {
                    if c < 3 {
                        Err(-1)
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(res.unwrap(), 42);
    }

    #[tokio::test]
    async fn it_stops_on_non_retryable_error() {
        let mut calls = 0;
        let res: Result<i32, i32> = retry_async(
            5,
            |e: &i32| *e >= 500,
            |_| {
                calls += 1;
                async { Err(404) }
            },
        )
        .await;
        assert_eq!(res.unwrap_err(), 404);
        assert_eq!(calls, 1);
    }
}
