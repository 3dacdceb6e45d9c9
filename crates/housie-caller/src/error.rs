/// Errors raised by the number caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallerError {
    /// Every number in the pool has already been drawn.
    #[error("draw pool exhausted after {called} numbers")]
    PoolExhausted { called: usize },

    /// A pool must hold between 1 and 90 numbers.
    #[error("invalid pool size {0} (expected 1..=90)")]
    InvalidPoolSize(u8),
}
