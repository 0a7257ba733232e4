//! Diagnostic logging setup.
//!
//! Everything the agent logs goes through [`MaskingMakeWriter`], so a secret
//! that ends up in a log field is redacted like any step output.

use std::io::{self, Write};
use std::sync::Arc;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::secrets::SecretMasker;

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Logs go to stderr, masked with `masker`.
pub fn init_tracing(debug: bool, masker: Arc<SecretMasker>) {
    let filter = if debug {
        EnvFilter::new("hauler=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hauler=info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(MaskingMakeWriter::new(io::stderr, masker)),
        )
        .with(filter)
        .init();
}

/// A [`MakeWriter`] that masks secrets in every formatted event.
pub struct MaskingMakeWriter<M> {
    inner: M,
    masker: Arc<SecretMasker>,
}

impl<M> MaskingMakeWriter<M> {
    pub fn new(inner: M, masker: Arc<SecretMasker>) -> Self {
        Self { inner, masker }
    }
}

impl<'a, M> MakeWriter<'a> for MaskingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = MaskedEvent<'a, M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        MaskedEvent {
            inner: self.inner.make_writer(),
            masker: &self.masker,
            buffer: Vec::new(),
        }
    }
}

/// Buffers one event and writes it masked on flush or drop.
///
/// Masking the whole event at once catches secrets the formatter splits
/// across several writes.
pub struct MaskedEvent<'a, W: Write> {
    inner: W,
    masker: &'a SecretMasker,
    buffer: Vec<u8>,
}

impl<W: Write> MaskedEvent<'_, W> {
    fn emit(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let masked = self.masker.mask(&String::from_utf8_lossy(&self.buffer));
        self.buffer.clear();
        self.inner.write_all(masked.as_bytes())
    }
}

impl<W: Write> Write for MaskedEvent<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit()?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for MaskedEvent<'_, W> {
    fn drop(&mut self) {
        let _ = self.emit();
    }
}
