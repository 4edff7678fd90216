//! Adapts a streaming HTTP body into a stream of [`RawEvent`]s.

use std::collections::VecDeque;
use std::fmt::Display;

use futures::stream::{self, Stream, StreamExt};
use jobsync_core::backend::{BackendError, EventStream, RawEvent};

use crate::sse::SseDecoder;

/// Decode an SSE byte stream into an [`EventStream`].
///
/// A body error or an oversized line ends the stream with one `Err` item;
/// a clean end of body ends it with `None`. A partial frame left at end
/// of body is dropped.
pub fn decode_sse<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    decode_sse_with(bytes, SseDecoder::new())
}

fn decode_sse_with<S, B, E>(bytes: S, decoder: SseDecoder) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    struct State<S> {
        bytes: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<RawEvent>,
        done: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        decoder,
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => match state.decoder.feed(chunk.as_ref()) {
                    Ok(events) => state.pending.extend(events),
                    Err(e) => {
                        state.done = true;
                        return Some((Err(BackendError::Stream(e.to_string())), state));
                    }
                },
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(BackendError::Stream(e.to_string())), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

/// Turn an accepted stream response into an [`EventStream`].
pub fn response_events(response: reqwest::Response) -> EventStream {
    decode_sse(response.bytes_stream())
}
