//! Lazily-loaded, shared transcoder.

use crate::backend::{Transcoder, TranscoderLoader};
use crate::error::ConvertError;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Owns the transcoder for one [`crate::Converter`].
///
/// The loader runs on first use. Concurrent first callers wait on the same
/// load; a failed load leaves the cell empty so a later conversion may try
/// again, but it is never retried inside one call.
pub struct TranscoderHandle {
    loader: Arc<dyn TranscoderLoader>,
    cell: OnceCell<Arc<dyn Transcoder>>,
}

impl TranscoderHandle {
    pub fn new(loader: Arc<dyn TranscoderLoader>) -> Self {
        Self {
            loader,
            cell: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// The transcoder, loading it if this is the first call.
    pub async fn get(&self) -> Result<Arc<dyn Transcoder>, ConvertError> {
        let transcoder = self
            .cell
            .get_or_try_init(|| async {
                debug!("Loading media transcoder");
                self.loader.load().await
            })
            .await?;
        Ok(Arc::clone(transcoder))
    }
}
