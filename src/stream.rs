use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::engine::ByteStream;
use crate::error::ProvisionResult;

/// Copies every chunk of `stream` into `out`, returning the number of bytes written.
///
/// Engine errors from the stream are returned as-is; write failures become
/// [`crate::error::ProvisionError::StreamCopyFailure`] via its `io::Error` conversion.
pub async fn copy_stream<W>(mut stream: ByteStream, out: &mut W) -> ProvisionResult<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    out.flush().await?;

    Ok(written)
}

/// Drains `stream` into a single buffer.
pub async fn collect_stream(mut stream: ByteStream) -> ProvisionResult<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}
