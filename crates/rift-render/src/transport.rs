//! Writing a [`Response`] to the wire, honouring its delay policy.
//!
//! The initial delay elapses before the response head is returned. A chunked
//! dribble delay then spreads the body over `numberOfChunks` frames emitted
//! across `totalDuration` milliseconds.

use crate::response::Response;
use crate::stub::ChunkedDribbleDelay;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use std::convert::Infallible;
use std::time::Duration;
use tracing::trace;

pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Wait out the initial delay, then hand back the hyper response.
pub async fn into_http_response(response: Response) -> hyper::Response<ResponseBody> {
    let Response {
        status,
        headers,
        body,
        delay,
        ..
    } = response;

    if !delay.initial_delay.is_zero() {
        trace!("Delaying response by {:?}", delay.initial_delay);
        tokio::time::sleep(delay.initial_delay).await;
    }

    let body = match delay.chunked_dribble {
        Some(dribble) if !body.is_empty() => dribbled(body, dribble),
        _ => Full::new(body).boxed_unsync(),
    };

    let mut out = hyper::Response::new(body);
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

fn dribbled(body: Bytes, dribble: ChunkedDribbleDelay) -> ResponseBody {
    let chunks = split_chunks(&body, dribble.number_of_chunks);
    let interval = Duration::from_millis(dribble.total_duration) / chunks.len().max(1) as u32;
    trace!(
        "Dribbling {} bytes in {} chunks every {:?}",
        body.len(),
        chunks.len(),
        interval
    );

    let frames = futures::stream::unfold(chunks.into_iter(), move |mut remaining| async move {
        let chunk = remaining.next()?;
        tokio::time::sleep(interval).await;
        Some((Ok::<_, Infallible>(Frame::data(chunk)), remaining))
    });
    StreamBody::new(frames).boxed_unsync()
}

/// Split into `count` nearly equal slices; earlier slices take the remainder.
fn split_chunks(body: &Bytes, count: u32) -> Vec<Bytes> {
    let count = (count.max(1) as usize).min(body.len().max(1));
    let base = body.len() / count;
    let remainder = body.len() % count;

    let mut chunks = Vec::with_capacity(count);
    let mut offset = 0;
    for i in 0..count {
        let size = base + usize::from(i < remainder);
        if size == 0 {
            continue;
        }
        chunks.push(body.slice(offset..offset + size));
        offset += size;
    }
    chunks
}
