//! Jobs waiting in the client-side queue.

use serde::{Deserialize, Serialize};

use crate::request::GenerationRequest;
use crate::types::{JobToken, PackId, Timestamp};

/// A [`GenerationRequest`] waiting for dispatch.
///
/// Owned by the queue until the dispatcher pops it; after that the
/// dispatcher's in-flight record owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub token: JobToken,
    pub pack_id: PackId,
    pub request: GenerationRequest,
    pub enqueued_at: Timestamp,
}

impl QueuedJob {
    /// Wrap a request with a fresh token.
    pub fn new(pack_id: PackId, request: GenerationRequest) -> Self {
        Self {
            token: JobToken::new(),
            pack_id,
            request,
            enqueued_at: chrono::Utc::now(),
        }
    }
}
