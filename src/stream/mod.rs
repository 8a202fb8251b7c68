//! Incremental decoding of streamed inference responses
//!
//! Byte chunks from the transport do not line up with fragment boundaries, so
//! lines are reassembled by [`LineDecoder`] before each flavor parses them.

mod decoder;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::providers::{Flavor, Fragment};

pub use decoder::{LineDecoder, LineTooLong, DEFAULT_MAX_LINE_BYTES};

/// Turn a byte stream into the fragments that carry text or end the stream.
///
/// Malformed fragments are logged and skipped. `Fragment::Skip` is never
/// yielded. After `Fragment::Done` the underlying stream is not polled again.
pub fn fragments<S, E>(bytes: S, flavor: Flavor) -> impl Stream<Item = Result<Fragment, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    async_stream::stream! {
        let mut decoder = LineDecoder::new();
        futures::pin_mut!(bytes);

        loop {
            let (lines, exhausted) = match bytes.next().await {
                Some(Ok(chunk)) => (decoder.push(&chunk), false),
                Some(Err(e)) => {
                    yield Err(e);
                    return;
                }
                None => (decoder.finish().into_iter().map(Ok).collect::<Vec<_>>(), true),
            };

            for line in lines {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(%flavor, "Skipping stream fragment: {}", e);
                        continue;
                    }
                };

                match flavor.parse_line(&line) {
                    Ok(Fragment::Skip) => {}
                    Ok(Fragment::Done) => {
                        yield Ok(Fragment::Done);
                        return;
                    }
                    Ok(fragment) => {
                        yield Ok(fragment);
                    }
                    Err(e) => warn!(%flavor, "Skipping stream fragment: {}", e),
                }
            }

            if exhausted {
                break;
            }
        }
    }
}
