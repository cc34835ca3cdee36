//! Upload sink: buffers a write stream and replays it as chunked transfers.

use async_trait::async_trait;
use tracing::warn;

use crate::backend::BlobWriter;
use crate::client::CacheClient;
use crate::error::Result;
use crate::key::CacheKey;

/// Maximum bytes sent per chunk. Fixed by the service protocol.
pub const CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// Write destination for one blob upload.
///
/// The full payload is buffered in memory and nothing is sent until
/// [`finish`](UploadSink::finish), so peak memory is proportional to blob size
/// and writers see no backpressure. The sink owns one server-side upload
/// session, reserved when the sink is opened, and one payload buffer shared
/// with nothing else. `finish` consumes the sink, so no write can follow
/// end-of-input.
#[derive(Debug)]
pub struct UploadSink {
    client: CacheClient,
    session: i64,
    payload: Vec<u8>,
}

impl UploadSink {
    /// Reserves an upload session and opens a sink bound to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the reservation is refused; no sink is created
    /// that would fail later.
    pub(crate) async fn open(client: CacheClient, key: CacheKey) -> Result<Self> {
        let session = client.reserve(&key).await?;
        Ok(Self {
            client,
            session,
            payload: Vec::new(),
        })
    }

    /// Appends bytes to the buffered payload, in call order. No network
    /// activity and no client-side size limit.
    pub fn write(&mut self, data: &[u8]) {
        self.payload.extend_from_slice(data);
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Uploads the payload in 32 MiB chunks, then finalizes the session.
    ///
    /// Chunks go out one at a time in increasing offset order; the first
    /// failure aborts the remaining chunks and the finalize call. The
    /// protocol has no session abort, so a failed upload leaves an
    /// incomplete session on the server.
    pub async fn finish(self) -> Result<()> {
        let session = self.session;
        let result = self.transfer().await;
        if result.is_err() {
            warn!(session, "upload aborted, incomplete session left on the server");
        }
        result
    }

    async fn transfer(self) -> Result<()> {
        let total = self.payload.len() as u64;
        for (start, end) in chunk_ranges(self.payload.len()) {
            let chunk = self.payload[start..end].to_vec();
            self.client
                .upload_chunk(self.session, chunk, start as u64, total)
                .await?;
        }

        // A zero-length payload sends no chunks but still finalizes with size 0.
        self.client.finalize(self.session, total).await
    }
}

/// Splits `[0, total)` into consecutive ranges of at most [`CHUNK_SIZE`]
/// bytes. Empty for `total == 0`.
fn chunk_ranges(total: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..total)
        .step_by(CHUNK_SIZE)
        .map(move |start| (start, usize::min(start + CHUNK_SIZE, total)))
}

#[async_trait]
impl BlobWriter for UploadSink {
    fn write(&mut self, data: &[u8]) {
        UploadSink::write(self, data);
    }

    async fn finish(self: Box<Self>) -> Result<()> {
        UploadSink::finish(*self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_has_no_chunks() {
        assert_eq!(chunk_ranges(0).count(), 0);
    }

    #[test]
    fn small_payload_is_one_chunk() {
        let ranges: Vec<_> = chunk_ranges(3).collect();
        assert_eq!(ranges, vec![(0, 3)]);
    }

    #[test]
    fn exact_chunk_size_is_one_chunk() {
        let ranges: Vec<_> = chunk_ranges(CHUNK_SIZE).collect();
        assert_eq!(ranges, vec![(0, CHUNK_SIZE)]);
    }

    #[test]
    fn one_byte_over_spills_into_second_chunk() {
        let ranges: Vec<_> = chunk_ranges(CHUNK_SIZE + 1).collect();
        assert_eq!(ranges, vec![(0, CHUNK_SIZE), (CHUNK_SIZE, CHUNK_SIZE + 1)]);
    }

    #[test]
    fn ranges_partition_the_payload() {
        let total = 3 * CHUNK_SIZE + 17;
        let ranges: Vec<_> = chunk_ranges(total).collect();

        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].0, 0);
        assert_eq!(ranges.last().unwrap().1, total);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        for (start, end) in ranges {
            assert!(end - start <= CHUNK_SIZE);
            assert!(end > start);
        }
    }
}
