//! Output sinks and the accumulator adapters that feed them.
//!
//! A compiled template never builds its output in memory. Instead it writes
//! every chunk through an accumulator that forwards it straight to the host's
//! [`OutputSink`]. The two syntaxes use different accumulator conventions:
//!
//! - ERB programs initialize their accumulator and then [`concat`] every
//!   chunk onto it, see [`ConcatBuffer`].
//! - Haml programs append to a receiver with `<<`, see [`AppendBuffer`].
//!
//! [`concat`]: ConcatBuffer::concat

use std::fmt;
use std::io;

use crate::Result;

/// The destination of all output produced during one template evaluation.
///
/// Empty chunks are never forwarded by the accumulators, so implementations
/// don't need to special case them.
pub trait OutputSink {
    /// Write a chunk of output.
    fn write(&mut self, chunk: &str) -> Result<()>;
}

impl OutputSink for String {
    #[inline]
    fn write(&mut self, chunk: &str) -> Result<()> {
        self.push_str(chunk);
        Ok(())
    }
}

impl<T> OutputSink for &mut T
where
    T: OutputSink + ?Sized,
{
    #[inline]
    fn write(&mut self, chunk: &str) -> Result<()> {
        (**self).write(chunk)
    }
}

/// An [`OutputSink`] that writes to any [`io::Write`] implementor.
pub struct IoSink<W> {
    writer: W,
}

impl<W> IoSink<W>
where
    W: io::Write,
{
    /// Construct a new sink around the writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> OutputSink for IoSink<W>
where
    W: io::Write,
{
    #[inline]
    fn write(&mut self, chunk: &str) -> Result<()> {
        self.writer.write_all(chunk.as_bytes())?;
        Ok(())
    }
}

impl<W> fmt::Debug for IoSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoSink").finish_non_exhaustive()
    }
}

/// The accumulator protocol that compiled programs write through.
pub(crate) trait Accumulator {
    /// The accumulator initialization step, e.g. `_erbout = ''`.
    fn reset(&mut self);

    /// Declare the encoding of the accumulated text.
    fn declare_encoding(&mut self, encoding: &str);

    /// Accumulate a chunk of output.
    fn push(&mut self, chunk: &str) -> Result<()>;

    /// The sink that this accumulator forwards to.
    fn sink(&mut self) -> &mut dyn OutputSink;
}

/// A direct-concat accumulator.
///
/// This is the accumulator used by ERB programs. Initializing it is ignored,
/// so nothing is ever held in memory, and every concatenated chunk streams
/// directly to the sink.
pub struct ConcatBuffer<'a> {
    sink: &'a mut dyn OutputSink,
}

impl<'a> ConcatBuffer<'a> {
    /// Construct a new accumulator that forwards to the sink.
    pub fn new(sink: &'a mut dyn OutputSink) -> Self {
        Self { sink }
    }

    /// Assigning an initial value is ignored.
    pub fn set(&mut self, _initial: &str) {}

    /// Write the chunk to the sink, `None` and empty chunks are ignored.
    pub fn concat(&mut self, chunk: Option<&str>) -> Result<()> {
        match chunk {
            Some(chunk) if !chunk.is_empty() => self.sink.write(chunk),
            _ => Ok(()),
        }
    }

    /// Accepted for compatibility, the chunks are not altered.
    pub fn force_encoding(&mut self, _encoding: &str) -> &mut Self {
        self
    }
}

impl Accumulator for ConcatBuffer<'_> {
    fn reset(&mut self) {
        self.set("");
    }

    fn declare_encoding(&mut self, encoding: &str) {
        self.force_encoding(encoding);
    }

    fn push(&mut self, chunk: &str) -> Result<()> {
        self.concat(Some(chunk))
    }

    fn sink(&mut self) -> &mut dyn OutputSink {
        &mut *self.sink
    }
}

/// A buffer-handle accumulator.
///
/// This is the receiver that Haml programs append to. Each appended chunk is
/// forwarded synchronously to the sink.
///
/// # Examples
///
/// ```
/// use viewbridge::AppendBuffer;
///
/// let mut out = String::new();
/// AppendBuffer::new(&mut out).append("<b>")?.append("hi")?.append("</b>")?;
/// assert_eq!(out, "<b>hi</b>");
/// # Ok::<(), viewbridge::Error>(())
/// ```
pub struct AppendBuffer<'a> {
    sink: &'a mut dyn OutputSink,
}

impl<'a> AppendBuffer<'a> {
    /// Construct a new receiver that forwards to the sink.
    pub fn new(sink: &'a mut dyn OutputSink) -> Self {
        Self { sink }
    }

    /// Write the chunk to the sink, returning the receiver for chaining.
    pub fn append(&mut self, chunk: &str) -> Result<&mut Self> {
        if !chunk.is_empty() {
            self.sink.write(chunk)?;
        }
        Ok(self)
    }

    /// Accepted for compatibility, the chunks are not altered.
    pub fn force_encoding(&mut self, _encoding: &str) -> &mut Self {
        self
    }
}

impl Accumulator for AppendBuffer<'_> {
    fn reset(&mut self) {}

    fn declare_encoding(&mut self, encoding: &str) {
        self.force_encoding(encoding);
    }

    fn push(&mut self, chunk: &str) -> Result<()> {
        self.append(chunk).map(|_| ())
    }

    fn sink(&mut self) -> &mut dyn OutputSink {
        &mut *self.sink
    }
}

impl fmt::Debug for ConcatBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcatBuffer").finish_non_exhaustive()
    }
}

impl fmt::Debug for AppendBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppendBuffer").finish_non_exhaustive()
    }
}
