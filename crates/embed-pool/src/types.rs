//! Wire types shared between the pool and its callers (the planner).

use embed_core::errors::EmbedResult;
use embed_worker::BatchOutcome;
use tokio::sync::oneshot;

/// One unit of dispatchable work: a list of texts to embed together,
/// bounded by the caller to at most `max_batch_size` entries.
pub struct BatchRequest {
    pub texts: Vec<String>,
    pub reply: oneshot::Sender<EmbedResult<BatchOutcome>>,
}

impl BatchRequest {
    pub fn new(texts: Vec<String>) -> (Self, oneshot::Receiver<EmbedResult<BatchOutcome>>) {
        let (reply, rx) = oneshot::channel();
        (Self { texts, reply }, rx)
    }
}
