//! Streaming and one-shot compression entry points.

use crate::error::{LzhamError, Result};
use crate::lzcomp::LzCompressor;
use crate::params::{CompressParams, InitParams};
use crate::status::{CompressStatus, FlushMode};
use tracing::error;

/// A compressor driven by repeated `compress` calls.
#[derive(Debug)]
pub struct CompressState {
    comp: LzCompressor,
    status: CompressStatus,
}

impl CompressState {
    /// Validate `params` and build a compressor.
    pub fn init(params: &CompressParams) -> Result<Self> {
        let params = InitParams::from_params(params)?;
        Ok(Self {
            comp: LzCompressor::new(params)?,
            status: CompressStatus::NotFinished,
        })
    }

    /// Restart an existing compressor with its original parameters,
    /// keeping its allocations.
    pub fn reinit(state: Option<Self>) -> Result<Self> {
        let mut state = state.ok_or(LzhamError::NilCompressState)?;
        state.comp.reset()?;
        state.status = CompressStatus::NotFinished;
        Ok(state)
    }

    /// Last status returned by `compress`.
    pub fn status(&self) -> CompressStatus {
        self.status
    }

    /// The underlying block compressor.
    pub fn compressor(&self) -> &LzCompressor {
        &self.comp
    }

    fn drain(&mut self, output: &mut [u8]) -> usize {
        let pending = self.comp.pending_output();
        let n = pending.len().min(output.len());
        output[..n].copy_from_slice(&pending[..n]);
        self.comp.consume_output(n);
        n
    }

    /// Compress from `input` into `output`.
    ///
    /// Returns `(bytes consumed, bytes written, status)`. While compressed
    /// data is still pending, no input is consumed and the status is
    /// `HasMoreOutput`. Once a terminal status is reached it is returned
    /// unchanged until [`CompressState::reinit`].
    pub fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> (usize, usize, CompressStatus) {
        if self.status.is_terminal() {
            return (0, 0, self.status);
        }

        let mut written = self.drain(output);
        if !self.comp.pending_output().is_empty() {
            self.status = CompressStatus::HasMoreOutput;
            return (0, written, self.status);
        }

        let put = if input.is_empty() {
            Ok(())
        } else {
            self.comp.put_bytes(input)
        };
        let result = put.and_then(|()| match flush {
            FlushMode::None => Ok(()),
            FlushMode::Finish => self.comp.finish(),
            mode => self.comp.flush(mode),
        });
        if let Err(e) = result {
            error!(error = %e, "compression failed");
            self.status = e.status();
            return (0, written, self.status);
        }

        written += self.drain(&mut output[written..]);
        self.status = if !self.comp.pending_output().is_empty() {
            CompressStatus::HasMoreOutput
        } else if self.comp.is_finished() {
            CompressStatus::Success
        } else {
            CompressStatus::NeedsMoreInput
        };
        (input.len(), written, self.status)
    }
}

/// Compress `src` into `dst` in one call, returning the compressed size.
pub fn compress_memory(params: &CompressParams, dst: &mut [u8], src: &[u8]) -> Result<usize> {
    let out = compress_to_vec(params, src)?;
    if out.len() > dst.len() {
        return Err(LzhamError::OutputBufTooSmall {
            needed: out.len(),
            available: dst.len(),
        });
    }
    dst[..out.len()].copy_from_slice(&out);
    Ok(out.len())
}

/// Compress `src` into a new buffer.
pub fn compress_to_vec(params: &CompressParams, src: &[u8]) -> Result<Vec<u8>> {
    let mut comp = LzCompressor::new(InitParams::from_params(params)?)?;
    comp.put_bytes(src)?;
    comp.finish()?;
    Ok(comp.take_output())
}
