// Bounded wait for analysis results.

use std::future::Future;

use anyhow::Result;
use m204_common::source_files::{is_settled, PollOutcome, PollPolicy, StatusWatch};
use m204_common::types::SourceFile;
use tracing::{debug, warn};

/// Re-fetch the file list until every file is terminal or the attempt
/// budget is spent. `file_count` scales the initial delay.
pub async fn wait_for_analysis<F, Fut>(policy: &PollPolicy, file_count: usize, mut fetch: F) -> Result<PollOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<SourceFile>>>,
{
    let mut watch = StatusWatch::new();
    let mut last = Vec::new();
    let attempts = policy.attempts();

    for attempt in 0..attempts {
        tokio::time::sleep(policy.delay_before(attempt, file_count)).await;
        let files = fetch().await?;

        for regression in watch.observe(&files) {
            warn!(
                file_id = %regression.file_id,
                file = %regression.file_name,
                from = %regression.from,
                to = %regression.to,
                "analysis status went backwards"
            );
        }

        let pending = files.iter().filter(|file| !file.analysis_status.is_terminal()).count();
        debug!(attempt = attempt + 1, pending, "polled analysis status");
        if is_settled(&files) {
            return Ok(PollOutcome::Settled { files, attempts: attempt + 1 });
        }
        last = files;
    }

    Ok(PollOutcome::Exhausted { files: last, attempts })
}
