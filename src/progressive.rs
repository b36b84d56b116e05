//! Follows text that grows on the server, such as a build log.
//!
//! The server is asked for the text from a byte offset onwards with a `POST`
//! whose body is `start={offset}`. It answers with the new text, the total
//! size in the `X-Text-Size` header and `X-More-Data: true` while the text is
//! still growing.

use std::sync::Arc;
use std::time::Duration;

use crate::proxy::{self, Request, Transport};
use crate::sink::OutputSink;
use crate::{Error, Result};

/// The delay between two fetches while following.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// The text appended since the last fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// The offset to fetch from next.
    pub text_size: u64,
    pub more_data: bool,
}

/// A progressively fetched text.
#[derive(Clone)]
pub struct ProgressiveText {
    href: String,
    transport: Arc<dyn Transport>,
}

/// The size and scroll position of the view that displays the text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub content_height: f64,
    pub scroll_top: f64,
    pub viewport_height: f64,
}

/// A view that displays the followed text.
pub trait ScrollView: OutputSink {
    fn metrics(&self) -> ScrollMetrics;

    fn scroll_to(&mut self, top: f64);
}

/// Keeps a view scrolled to the bottom while the reader is at the bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoScroll {
    /// How close to the bottom, in pixels, still counts as being at the
    /// bottom.
    pub bottom_threshold: f64,
}

impl ProgressiveText {
    /// Construct a new follower for the text at the URL.
    pub fn new(href: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            href: href.into(),
            transport,
        }
    }

    /// Fetch the text from the byte offset onwards.
    pub async fn fetch(&self, start: u64) -> Result<Chunk> {
        let request = Request {
            url: self.href.clone(),
            headers: vec![(
                "Content-Type".to_owned(),
                "application/x-www-form-urlencoded".to_owned(),
            )],
            body: format!("start={start}"),
        };
        let raw = self.transport.post(request).await?;
        if !(200..300).contains(&raw.status) {
            return Err(Error::remote(format!(
                "failed to fetch {}: {} {}",
                self.href, raw.status, raw.status_text
            )));
        }

        let text_size = match proxy::header(&raw.headers, "X-Text-Size") {
            Some(size) => size.trim().parse().map_err(|_| {
                Error::remote(format!("invalid X-Text-Size header `{size}`"))
            })?,
            None => start + raw.body.len() as u64,
        };
        let more_data = proxy::header(&raw.headers, "X-More-Data") == Some("true");
        log::trace!("fetched {} bytes from {}", raw.body.len(), self.href);

        Ok(Chunk {
            text: raw.body,
            text_size,
            more_data,
        })
    }

    /// Keep fetching from the offset until the server reports no more data,
    /// appending the text to the sink.
    ///
    /// Returns the offset after the last fetched text.
    pub async fn follow(
        &self,
        start: u64,
        sink: &mut dyn OutputSink,
        interval: Duration,
    ) -> Result<u64> {
        self.follow_with(start, interval, |text| sink.write(text))
            .await
    }

    /// Like [`follow`][Self::follow] but keeps the view scrolled to the
    /// bottom if the reader was at the bottom before the text was appended.
    pub async fn follow_view(
        &self,
        start: u64,
        view: &mut dyn ScrollView,
        scroll: AutoScroll,
        interval: Duration,
    ) -> Result<u64> {
        self.follow_with(start, interval, |text| scroll.append(&mut *view, text))
            .await
    }

    async fn follow_with<F>(&self, mut start: u64, interval: Duration, mut append: F) -> Result<u64>
    where
        F: FnMut(&str) -> Result<()>,
    {
        loop {
            let chunk = self.fetch(start).await?;
            if !chunk.text.is_empty() {
                append(&chunk.text)?;
            }
            start = chunk.text_size;
            if !chunk.more_data {
                log::debug!("finished following {} at {start} bytes", self.href);
                return Ok(start);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

impl std::fmt::Debug for ProgressiveText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressiveText")
            .field("href", &self.href)
            .finish_non_exhaustive()
    }
}

impl Default for AutoScroll {
    fn default() -> Self {
        Self {
            bottom_threshold: 25.0,
        }
    }
}

impl AutoScroll {
    /// Returns whether the view is in "stick to bottom" mode.
    pub fn is_sticking(&self, m: ScrollMetrics) -> bool {
        m.content_height - m.scroll_top - m.viewport_height < self.bottom_threshold
    }

    /// Append text to the view, scrolling to the bottom if it was sticking.
    pub fn append(&self, view: &mut dyn ScrollView, text: &str) -> Result<()> {
        let sticking = self.is_sticking(view.metrics());
        view.write(text)?;
        if sticking {
            let height = view.metrics().content_height;
            view.scroll_to(height);
        }
        Ok(())
    }
}
