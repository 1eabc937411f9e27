use std::future::Future;
use std::time::Duration;

/// Parse a truthy env var in a tolerant way.
pub fn parse_bool_env(var: &str) -> bool {
    std::env::var(var)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

pub(crate) fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes"]
        .iter()
        .any(|pat| value.trim().eq_ignore_ascii_case(pat))
}

/// Retry an async operation with linear backoff.
pub async fn retry_async<F, Fut, T, E>(
    mut op: F,
    max_attempts: usize,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt as usize >= max_attempts => return Err(err),
            Err(_) => tokio::time::sleep(base_delay * attempt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" YES "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Cell::new(0);
        let result: Result<u32, &str> = retry_async(
            || {
                calls.set(calls.get() + 1);
                let current = calls.get();
                async move { if current < 3 { Err("not yet") } else { Ok(current) } }
            },
            5,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), &str> = retry_async(
            || {
                calls.set(calls.get() + 1);
                async { Err("down") }
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Err("down"));
        assert_eq!(calls.get(), 2);
    }
}
