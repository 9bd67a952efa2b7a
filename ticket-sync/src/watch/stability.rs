use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Wait until `path` stops growing.
///
/// True once two consecutive polls see the same size. Polls are `poll`
/// apart, except that the last one is taken at the deadline. False if no two
/// readings agree within `timeout`. A file that cannot be read never counts
/// as stable.
pub async fn wait_until_stable(path: &Path, timeout: Duration, poll: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut previous = file_size(path);

    loop {
        let now = Instant::now();
        if now >= deadline {
            debug!(path = %path.display(), size = ?previous, "file did not settle before timeout");
            return false;
        }
        tokio::time::sleep(poll.min(deadline - now)).await;

        let size = file_size(path);
        if let (Some(before), Some(after)) = (previous, size)
            && before == after
        {
            debug!(path = %path.display(), bytes = after, "file is stable");
            return true;
        }
        previous = size;
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}
