use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;

/// Drive refuses batches of more than 100 calls.
pub const MAX_BATCH_SIZE: usize = 100;

/// Run `requests` in chunks of at most `batch_size`.
///
/// Requests inside a chunk are in flight together, chunks run one after the
/// other. The output keeps input order; a failed request is logged and yields
/// `None` without touching its neighbours. `progress` sees `(done, total)` at
/// the start of each chunk and once more when everything finished.
pub async fn execute_in_batches<T, E, Fut>(
    requests: Vec<Fut>,
    batch_size: usize,
    mut progress: impl FnMut(usize, usize),
) -> Vec<Option<T>>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let total = requests.len();
    let mut results = Vec::with_capacity(total);
    let mut pending = requests.into_iter();

    loop {
        let chunk: Vec<Fut> = pending.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            break;
        }
        progress(results.len(), total);

        let start = results.len();
        for (offset, outcome) in join_all(chunk).await.into_iter().enumerate() {
            match outcome {
                Ok(value) => results.push(Some(value)),
                Err(e) => {
                    tracing::error!("batch request {} failed: {}", start + offset, e);
                    results.push(None);
                }
            }
        }
    }

    progress(total, total);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_order_and_isolates_failures() {
        let requests: Vec<_> = (0..250)
            .map(|i| async move {
                if i % 7 == 0 {
                    Err(format!("request {} failed", i))
                } else {
                    Ok(i * 2)
                }
            })
            .collect();

        let mut seen = Vec::new();
        let results = execute_in_batches(requests, 100, |done, total| seen.push((done, total))).await;

        assert_eq!(results.len(), 250);
        assert_eq!(results[0], None);
        assert_eq!(results[1], Some(2));
        assert_eq!(results[249], Some(498));
        assert_eq!(seen, vec![(0, 250), (100, 250), (200, 250), (250, 250)]);
    }

    #[tokio::test]
    async fn clamps_oversized_batches() {
        let requests: Vec<_> = (0..150)
            .map(|i| async move { Ok::<_, String>(i) })
            .collect();

        let mut starts = Vec::new();
        execute_in_batches(requests, 1000, |done, _| starts.push(done)).await;
        assert_eq!(starts, vec![0, 100, 150]);
    }

    #[tokio::test]
    async fn empty_input_reports_completion() {
        let requests: Vec<std::future::Ready<Result<u8, String>>> = Vec::new();
        let mut seen = Vec::new();
        let results = execute_in_batches(requests, 100, |done, total| seen.push((done, total))).await;
        assert!(results.is_empty());
        assert_eq!(seen, vec![(0, 0)]);
    }
}
