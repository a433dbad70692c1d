//! The boundary between the order-list builder and whatever owns the hardware.
//!
//! A [`BufferSource`] hands out order-list buffers, band output addresses and the per-page
//! configuration, and takes submitted buffers back. The builder holds at most one buffer at a
//! time and always returns it, either through [`BufferSource::submit_buffer`] or
//! [`BufferSource::discard_buffer`].

use thiserror::Error;

use crate::options::HwaOptions;

/// Failure codes reported by a buffer source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ApiError {
    #[error("persistent hardware failure")]
    Error,
    #[error("page or buffer not recognised")]
    Unknown,
    #[error("illegal parameters")]
    Syntax,
    #[error("band already completed")]
    InUse,
    #[error("no buffer or band memory available")]
    Memory,
}

/// Identifies the page being rendered. Sources use it to reject buffers from stale pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PageToken {
    pub job: u32,
    pub page: u32,
}

/// An order-list buffer on loan from a source.
///
/// `address` is where byte 0 of `data` lives from the consumer's point of view. Command
/// links and asset pointers are written relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    pub id: u32,
    pub address: u32,
    pub data: Vec<u8>,
}

/// Output band addresses, in K, C, M, Y order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BandAddresses {
    pub bands: [u32; 4],
}

/// A filled buffer handed back to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub buffer: Buffer,
    pub from_band: i32,
    pub to_band: i32,
    /// Length of the command area at the start of the buffer.
    pub command_len: usize,
    /// Offset of the asset area, which runs to the end of the buffer.
    pub asset_offset: usize,
    /// `to_band` is finished. All earlier bands in the range always are.
    pub complete: bool,
}

impl Submission {
    pub fn commands(&self) -> &[u8] {
        &self.buffer.data[..self.command_len]
    }

    pub fn assets(&self) -> &[u8] {
        &self.buffer.data[self.asset_offset..]
    }
}

pub trait BufferSource {
    /// Hands out an empty buffer. May block until one is free.
    fn get_buffer(&mut self, token: &PageToken) -> Result<Buffer, ApiError>;

    /// Takes a filled buffer back for rendering.
    ///
    /// Bands before `from_band` that were already completed cannot be submitted again; doing
    /// so yields [`ApiError::InUse`].
    fn submit_buffer(&mut self, token: &PageToken, submission: Submission) -> Result<(), ApiError>;

    /// Takes back a buffer that will not be submitted.
    fn discard_buffer(&mut self, token: &PageToken, buffer: Buffer) -> Result<(), ApiError>;

    /// Reserves output memory for `band` and associates it with `buffer_id`.
    ///
    /// Asking again for a band that was submitted incomplete returns the same addresses.
    fn get_bands(
        &mut self,
        token: &PageToken,
        buffer_id: u32,
        band: i32,
    ) -> Result<BandAddresses, ApiError>;

    /// Releases band memory reserved for a buffer that is being discarded.
    fn discard_bands(&mut self, token: &PageToken, buffer_id: u32) -> Result<(), ApiError>;

    /// Per-page configuration. `None` selects the defaults.
    fn get_options(&mut self, _token: &PageToken) -> Result<Option<HwaOptions>, ApiError> {
        Ok(None)
    }
}

impl<S: BufferSource + ?Sized> BufferSource for &mut S {
    fn get_buffer(&mut self, token: &PageToken) -> Result<Buffer, ApiError> {
        (**self).get_buffer(token)
    }

    fn submit_buffer(&mut self, token: &PageToken, submission: Submission) -> Result<(), ApiError> {
        (**self).submit_buffer(token, submission)
    }

    fn discard_buffer(&mut self, token: &PageToken, buffer: Buffer) -> Result<(), ApiError> {
        (**self).discard_buffer(token, buffer)
    }

    fn get_bands(
        &mut self,
        token: &PageToken,
        buffer_id: u32,
        band: i32,
    ) -> Result<BandAddresses, ApiError> {
        (**self).get_bands(token, buffer_id, band)
    }

    fn discard_bands(&mut self, token: &PageToken, buffer_id: u32) -> Result<(), ApiError> {
        (**self).discard_bands(token, buffer_id)
    }

    fn get_options(&mut self, token: &PageToken) -> Result<Option<HwaOptions>, ApiError> {
        (**self).get_options(token)
    }
}
