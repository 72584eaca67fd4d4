//! Span definitions per operation: embed call, batch dispatch, cache
//! reserve, worker dispatch. Each span carries duration and outcome via
//! the `tracing` crate.

/// Span for a whole `Embed` call.
#[macro_export]
macro_rules! embed_call_span {
    ($text_count:expr) => {
        tracing::info_span!("embed.call", text_count = $text_count)
    };
}

/// Span for one pool-bound batch dispatch.
#[macro_export]
macro_rules! batch_dispatch_span {
    ($batch_size:expr) => {
        tracing::info_span!("embed.batch_dispatch", batch_size = $batch_size)
    };
}

/// Span for a single-flight cache reservation.
#[macro_export]
macro_rules! cache_reserve_span {
    ($fingerprint:expr) => {
        tracing::info_span!("embed.cache_reserve", fingerprint = %$fingerprint)
    };
}

/// Span for one worker's handling of a dispatched batch.
#[macro_export]
macro_rules! worker_dispatch_span {
    ($worker_id:expr, $batch_size:expr) => {
        tracing::info_span!("embed.worker_dispatch", worker_id = $worker_id, batch_size = $batch_size)
    };
}

/// Span names as constants for programmatic use.
pub mod names {
    pub const EMBED_CALL: &str = "embed.call";
    pub const BATCH_DISPATCH: &str = "embed.batch_dispatch";
    pub const CACHE_RESERVE: &str = "embed.cache_reserve";
    pub const WORKER_DISPATCH: &str = "embed.worker_dispatch";
}
