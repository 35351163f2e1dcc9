//! Streaming response handling
//!
//! Turns the raw body of a generate response into [`StreamFrame`]s:
//! bytes → [`Utf8Decoder`] → [`ExtractorState`] → [`StreamFrame::from_value`].

pub mod extractor;
pub mod frame;
pub mod utf8;

use std::pin::Pin;

use futures::Stream;
use futures::StreamExt;
use tracing::debug;

pub use extractor::consume;
pub use extractor::ExtractorState;
pub use frame::ContextSource;
pub use frame::Phase;
pub use frame::StreamFrame;
pub use utf8::Utf8Decoder;

use crate::errors::LegalxError;
use crate::errors::Result;

/// Streaming sequence of frames from one generate response
pub struct FrameStream {
    stream: Pin<Box<dyn Stream<Item = Result<StreamFrame>> + Send>>,
}

impl FrameStream {
    pub fn new(stream: Pin<Box<dyn Stream<Item = Result<StreamFrame>> + Send>>) -> Self {
        Self { stream }
    }

    /// Wrap an already decoded sequence of frames
    pub fn from_frames(frames: Vec<Result<StreamFrame>>) -> Self {
        Self::new(Box::pin(futures::stream::iter(frames)))
    }

    /// Decode a raw byte stream, as produced by `reqwest::Response::bytes_stream`
    pub fn from_bytes<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
        E: Into<LegalxError> + Send + 'static,
    {
        Self::new(Box::pin(decode_frames(byte_stream)))
    }

    /// Next frame, `None` once the body is exhausted
    pub async fn next_frame(&mut self) -> Option<Result<StreamFrame>> {
        self.stream.next().await
    }

    /// Collect all frames, stopping at the first error
    pub async fn collect_all(mut self) -> Result<Vec<StreamFrame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.stream.next().await {
            frames.push(frame?);
        }
        Ok(frames)
    }
}

/// Parse a raw byte stream into frames.
///
/// A read error is yielded once and ends the stream. At end of input any
/// unterminated trailing frame is dropped without error.
fn decode_frames<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamFrame>> + Send + 'static
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
    E: Into<LegalxError> + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = Utf8Decoder::new();
        let mut extractor = ExtractorState::new();
        let mut bytes_stream = std::pin::pin!(byte_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    let err: LegalxError = e.into();
                    yield Err(err);
                    return;
                }
            };

            let text = decoder.decode(&chunk);
            for value in extractor.feed(&text) {
                yield Ok(StreamFrame::from_value(&value));
            }
        }

        let tail = decoder.finish();
        for value in extractor.feed(&tail) {
            yield Ok(StreamFrame::from_value(&value));
        }

        let dropped = extractor.frames_malformed();
        let emitted = extractor.frames_emitted();
        let truncated = extractor.finish();
        debug!(
            "Response body finished: {} frames, {} malformed, {} trailing bytes dropped",
            emitted, dropped, truncated
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_chunks(
        parts: &[&'static [u8]],
    ) -> impl Stream<Item = std::result::Result<bytes::Bytes, LegalxError>> + Send + 'static {
        let items: Vec<_> = parts
            .iter()
            .map(|part| Ok(bytes::Bytes::from_static(*part)))
            .collect();
        futures::stream::iter(items)
    }

    #[tokio::test]
    async fn test_decode_contract_example() {
        let stream = FrameStream::from_bytes(byte_chunks(&[
            br#"{"phase":"thi"#,
            br#"nking","think":"Analyzing..."}{"phase":"response","think":"Analyzing...","response":"A contract i"#,
            br#"s a binding agreement."}"#,
        ]));

        let frames = stream.collect_all().await.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].phase, Phase::Thinking);
        assert_eq!(frames[1].phase, Phase::Response);
        assert_eq!(
            frames[1].response.as_deref(),
            Some("A contract is a binding agreement.")
        );
    }

    #[tokio::test]
    async fn test_decode_multibyte_split_between_chunks() {
        let body = r#"{"phase":"response","response":"धारा"}"#.as_bytes();
        // cut inside the first Devanagari character
        let cut = body.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let (head, tail) = body.split_at(cut);

        let stream = FrameStream::from_bytes(futures::stream::iter(vec![
            Ok::<_, LegalxError>(bytes::Bytes::copy_from_slice(head)),
            Ok(bytes::Bytes::copy_from_slice(tail)),
        ]));

        let frames = stream.collect_all().await.unwrap();
        assert_eq!(frames[0].response.as_deref(), Some("धारा"));
    }

    #[tokio::test]
    async fn test_decode_read_error_ends_stream() {
        let items = vec![
            Ok(bytes::Bytes::from_static(br#"{"phase":"thinking","think":"a"}"#)),
            Err(LegalxError::StreamError("connection reset".to_string())),
            Ok(bytes::Bytes::from_static(br#"{"phase":"response"}"#)),
        ];
        let mut stream = FrameStream::from_bytes(futures::stream::iter(items));

        assert!(matches!(stream.next_frame().await, Some(Ok(_))));
        assert!(matches!(
            stream.next_frame().await,
            Some(Err(LegalxError::StreamError(_)))
        ));
        assert!(stream.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_drops_trailing_fragment() {
        let stream = FrameStream::from_bytes(byte_chunks(&[
            br#"{"phase":"thinking","think":"a"}"#,
            br#"{"phase":"response","response":"cut off"#,
        ]));

        let frames = stream.collect_all().await.unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[tokio::test]
    async fn test_from_frames() {
        let stream = FrameStream::from_frames(vec![Err(LegalxError::Busy)]);
        assert!(stream.collect_all().await.is_err());
    }
}
