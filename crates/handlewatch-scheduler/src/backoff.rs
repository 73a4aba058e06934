const RATE_LIMIT_BACKOFF_MS: &[u64] = &[15_000, 30_000, 60_000, 120_000, 300_000];

/// Extra pause after `consecutive` rate-limited classifications in a row.
pub fn rate_limit_backoff_ms(consecutive: u32) -> u64 {
    if consecutive == 0 {
        return 0;
    }
    let idx = (consecutive as usize - 1).min(RATE_LIMIT_BACKOFF_MS.len() - 1);
    RATE_LIMIT_BACKOFF_MS[idx]
}
