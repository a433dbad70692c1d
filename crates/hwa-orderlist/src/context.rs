//! The per-page order-list builder.
//!
//! [`HwaContext`] owns the buffer being filled, the band bookkeeping, the graphics state
//! mirror and the usage counters. The renderer drives it through [`HwaContext::band_start`],
//! the draw operations in [`crate::encode`], [`HwaContext::band_finished`] and finally
//! [`HwaContext::finish_page`].

use gipa2_protocol::{BandInit, Command, CommandLayout, Opcode, Planes};

use crate::api::{ApiError, BandAddresses, BufferSource, PageToken};
use crate::asset::{asset_size, AssetRef, AssetSource, AssetTag};
use crate::band::{band_memory_retry, BandRetry, BandState, BandStep};
use crate::buffer::CommandBuffer;
use crate::error::{HwaError, Result};
use crate::geom::BBox;
use crate::gstate::GState;
use crate::metrics::Metrics;
use crate::options::{HwaFlags, HwaOptions};
use crate::relocate::{relocate, Relocation};

/// Bytes every band needs for `COM_HEAD`, `BAND_INIT` and its closing commands.
pub const HWA_MINIMUM: usize = 68;

/// Room a band start insists on, on top of [`HWA_MINIMUM`].
pub const BAND_HEADROOM: usize = 1024;

/// Page geometry in device pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSetup {
    pub width: u32,
    pub height: u32,
    pub band_height: u32,
}

impl PageSetup {
    fn validate(self) -> Result<Self> {
        if self.width == 0
            || self.height == 0
            || self.band_height == 0
            || self.width > i32::MAX as u32
            || self.height > i32::MAX as u32
        {
            return Err(HwaError::BadPage {
                width: self.width,
                height: self.height,
                band_height: self.band_height,
            });
        }
        Ok(self)
    }

    /// Rows of `band`; the last band may be short.
    pub fn band_rows(&self, band: i32) -> u32 {
        let start = i64::from(band) * i64::from(self.band_height);
        (i64::from(self.height) - start).clamp(1, i64::from(self.band_height)) as u32
    }

    /// First row of `band`.
    pub fn band_offset(&self, band: i32) -> u32 {
        (i64::from(band) * i64::from(self.band_height)) as u32
    }
}

pub struct HwaContext<S: BufferSource> {
    pub(crate) source: S,
    pub(crate) token: PageToken,
    pub(crate) page: PageSetup,
    pub(crate) options: HwaOptions,
    pub(crate) buf: Option<CommandBuffer>,
    pub(crate) bands: BandState,
    pub(crate) gstate: GState,
    /// Base addresses of the preloaded color cells, K, C, M, Y, once the setup block placed
    /// them.
    pub(crate) color_cells: Option<[u32; 4]>,
    pub(crate) metrics: Metrics,
}

impl<S: BufferSource> HwaContext<S> {
    pub fn new(source: S, token: PageToken, page: PageSetup) -> Result<Self> {
        Self::with_metrics(source, token, page, Metrics::new())
    }

    /// Starts a page, carrying usage counters over from earlier pages.
    pub fn with_metrics(
        mut source: S,
        token: PageToken,
        page: PageSetup,
        mut metrics: Metrics,
    ) -> Result<Self> {
        let page = page.validate()?;
        let options = source
            .get_options(&token)
            .map_err(HwaError::source("get options"))?
            .unwrap_or_default()
            .validate();
        tracing::debug!(
            job = token.job,
            page = token.page,
            width = page.width,
            height = page.height,
            band_height = page.band_height,
            flags = ?options.flags,
            "page start"
        );
        metrics.begin_page();

        let mut ctx = Self {
            source,
            token,
            page,
            options,
            buf: None,
            bands: BandState::default(),
            gstate: GState::new(),
            color_cells: None,
            metrics,
        };
        // A single-band page gets its buffer, and with it its only BAND_INIT, on the first band.
        if !ctx.all_one_band() {
            ctx.new_buffer()?;
        }
        Ok(ctx)
    }

    pub fn options(&self) -> &HwaOptions {
        &self.options
    }

    pub fn page(&self) -> &PageSetup {
        &self.page
    }

    pub fn token(&self) -> &PageToken {
        &self.token
    }

    pub fn bands(&self) -> &BandState {
        &self.bands
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The buffer being filled, if any.
    pub fn buffer(&self) -> Option<&CommandBuffer> {
        self.buf.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Gives the source and counters back. A buffer still held is discarded.
    pub fn into_parts(mut self) -> (S, Metrics) {
        if let Err(err) = self.discard() {
            tracing::warn!(%err, "failed to discard order-list buffer");
        }
        (self.source, self.metrics)
    }

    pub(crate) fn all_one_band(&self) -> bool {
        self.options.flags.contains(HwaFlags::ALL_ONE_BAND)
    }

    /// The area the hardware can draw into with no clip loaded.
    pub(crate) fn band_clip(&self) -> BBox {
        let right = self.page.width as i32 - 1;
        if self.all_one_band() || !self.bands.has_bands() {
            return BBox::new(0, 0, right, self.page.height as i32 - 1);
        }
        let band = self.bands.last;
        let top = self.page.band_offset(band) as i32;
        BBox::new(0, top, right, top + self.page.band_rows(band) as i32 - 1)
    }

    pub(crate) fn current(&self) -> Result<&CommandBuffer> {
        self.buf.as_ref().ok_or(HwaError::NoBuffer)
    }

    pub(crate) fn current_mut(&mut self) -> Result<&mut CommandBuffer> {
        self.buf.as_mut().ok_or(HwaError::NoBuffer)
    }

    pub(crate) fn emit(&mut self, cmd: &Command) -> Result<usize> {
        let offset = self
            .buf
            .as_mut()
            .ok_or(HwaError::NoBuffer)?
            .emit(cmd)?;
        self.metrics.command(cmd.opcode(), cmd.size_bytes());
        Ok(offset)
    }

    /// Places an asset whose room was already reserved, charging it to `opcode`.
    pub(crate) fn add_asset(
        &mut self,
        opcode: Opcode,
        tag: AssetTag,
        source: AssetSource,
        len: usize,
        arg: i32,
    ) -> Result<AssetRef> {
        let asset = self
            .buf
            .as_mut()
            .ok_or(HwaError::NoBuffer)?
            .add_asset(tag, source, len, arg)
            .ok_or(HwaError::AssetAlloc { len })?;
        self.metrics.asset(opcode, asset_size(len));
        Ok(asset)
    }

    pub(crate) fn find_asset(&mut self, source: AssetSource, arg: i32) -> Option<AssetRef> {
        self.buf.as_mut()?.find_asset(source, arg)
    }

    /// Gets a fresh buffer and writes its setup block.
    pub(crate) fn new_buffer(&mut self) -> Result<()> {
        if let Some(old) = self.buf.take() {
            self.return_buffer(old)?;
        }
        let buffer = self
            .source
            .get_buffer(&self.token)
            .map_err(HwaError::source("get buffer"))?;
        tracing::debug!(id = buffer.id, len = buffer.data.len(), "new order-list buffer");
        self.buf = Some(CommandBuffer::new(buffer));
        self.bands.open = false;
        self.color_cells = None;
        let clip = self.band_clip();
        self.gstate.reset(clip);
        if !self.options.flags.contains(HwaFlags::DEFER) {
            self.buffer_assets(true)?;
        }
        Ok(())
    }

    /// Makes sure `n` more bytes of commands and assets fit, flushing the buffer if they don't.
    ///
    /// Returns `true` when a new buffer was started. An open band is re-opened in the new
    /// buffer, so the caller only has to re-send state.
    pub(crate) fn wont_fit(&mut self, n: usize) -> Result<bool> {
        if self.current()?.fits(n) {
            return Ok(false);
        }
        if !self.bands.has_bands() {
            return Err(HwaError::LimitCheck { required: n });
        }

        let reopen = self.bands.open;
        tracing::debug!(
            required = n,
            free = self.current()?.free(),
            band = self.bands.last,
            "order-list buffer full"
        );
        self.submit(!reopen && self.bands.complete)?;
        self.new_buffer()?;
        if reopen && !self.all_one_band() {
            self.open_band(self.bands.last)?;
        }
        if !self.current()?.fits(n) {
            return Err(HwaError::LimitCheck { required: n });
        }
        Ok(true)
    }

    /// Reserves `required(self)` bytes.
    ///
    /// Cached state and assets do not carry over to a new buffer, so when one is started the
    /// requirement is worked out again and must fit the fresh buffer.
    pub(crate) fn reserve(&mut self, required: impl Fn(&mut Self) -> usize) -> Result<bool> {
        let n = required(self);
        if !self.wont_fit(n)? {
            return Ok(false);
        }
        let n = required(self);
        if !self.current()?.fits(n) {
            return Err(HwaError::LimitCheck { required: n });
        }
        Ok(true)
    }

    /// Starts rendering `band`.
    pub fn band_start(&mut self, band: i32) -> Result<()> {
        if self.buf.is_none() {
            self.new_buffer()?;
        }
        // A deferred setup block follows BAND_INIT, so it needs room in the same buffer.
        let setup = if self.options.flags.contains(HwaFlags::DEFER) {
            self.setup_required()
        } else {
            0
        };
        self.wont_fit(HWA_MINIMUM + BAND_HEADROOM + setup)?;

        if !self.bands.has_bands() {
            self.bands.first = band;
        } else if !self.bands.continues(band) {
            tracing::debug!(
                band,
                first = self.bands.first,
                last = self.bands.last,
                "band not contiguous, flushing"
            );
            self.submit(true)?;
            self.new_buffer()?;
            self.bands.first = band;
        }
        self.bands.last = band;
        self.metrics.band_started();

        if self.all_one_band() {
            return Ok(());
        }
        self.open_band(band)
    }

    /// Emits `COM_HEAD` and `BAND_INIT` for `band`, first making room in band memory if the
    /// source is out of it.
    fn open_band(&mut self, band: i32) -> Result<()> {
        let mut retry = BandRetry::NotTried;
        let addresses = loop {
            let buffer_id = self.current()?.id();
            let outcome = self.source.get_bands(&self.token, buffer_id, band);
            match band_memory_retry(&mut retry, band, outcome)? {
                BandStep::Ready(addresses) => break addresses,
                BandStep::FlushAndRetry => {
                    tracing::debug!(band, "out of band memory, flushing earlier bands");
                    self.bands.last -= 1;
                    if self.bands.last >= self.bands.first {
                        self.submit(true)?;
                    } else if let Some(buf) = self.buf.take() {
                        self.return_buffer(buf)?;
                    }
                    self.bands.first = band;
                    self.bands.last = band;
                    self.new_buffer()?;
                }
            }
        };

        let buf = self.current_mut()?;
        buf.align16();
        let head = self.emit(&Command::ComHead { next: 0 })?;
        self.current_mut()?.link_head(head);
        let init = self.band_init(band, &addresses);
        self.emit(&Command::BandInit(init))?;
        tracing::debug!(band, rows = init.rows, "band open");

        self.bands.complete = false;
        self.bands.open = true;
        let clip = self.band_clip();
        self.gstate.reset(clip);
        if self.options.flags.contains(HwaFlags::DEFER) {
            self.buffer_assets(false)?;
        }
        Ok(())
    }

    pub(crate) fn band_init(&self, band: i32, addresses: &BandAddresses) -> BandInit {
        let width = self.page.width;
        let bit_depth = self.options.depth();
        let (rows, offset) = if self.all_one_band() {
            (self.page.height, 0)
        } else {
            (self.page.band_rows(band), self.page.band_offset(band))
        };
        BandInit {
            planes: Planes::CMYK,
            bit_depth,
            pixels: width,
            bytes: ((u64::from(width) * u64::from(bit_depth.bits()) + 63) / 64 * 8) as u32,
            rows,
            page_width: width,
            page_height: self.page.height,
            offset,
            bands: addresses.bands,
        }
    }

    fn band_end(&mut self, complete: bool) -> Result<()> {
        if !self.options.flags.contains(HwaFlags::NO_IMEM) {
            self.emit(&Command::BandDma)?;
        }
        self.emit(&Command::ComBlockEnd)?;
        self.bands.open = false;
        self.bands.complete = complete;
        Ok(())
    }

    /// Finishes the current band.
    pub fn band_finished(&mut self) -> Result<()> {
        if self.all_one_band() {
            // The page is still one band; only the clip must not leak into the next one.
            if self.buf.is_some() {
                self.wont_fit(CommandLayout::RESET_CLIP_SIZE)?;
                self.emit(&Command::ResetClip)?;
                let clip = self.band_clip();
                self.gstate.clip_reset(clip);
            }
        } else if self.bands.open {
            self.band_end(true)?;
        }
        self.metrics.band_finished();
        Ok(())
    }

    /// Hands the last buffer of the page to the source.
    pub fn finish_page(&mut self) -> Result<()> {
        if self.buf.is_some() {
            if self.bands.has_bands() {
                self.submit(true)?;
            } else if let Some(buf) = self.buf.take() {
                tracing::debug!(id = buf.id(), "no bands on page, discarding buffer");
                self.return_buffer(buf)?;
            }
        }
        self.metrics.end_page();
        tracing::debug!(job = self.token.job, page = self.token.page, "page done");
        Ok(())
    }

    /// Abandons the page: the buffer and any band memory it holds go back to the source.
    pub fn discard(&mut self) -> Result<()> {
        let result = match self.buf.take() {
            Some(buf) => self.return_buffer(buf),
            None => Ok(()),
        };
        self.bands = BandState::default();
        result
    }

    fn return_buffer(&mut self, buf: CommandBuffer) -> Result<()> {
        let id = buf.id();
        self.source
            .discard_bands(&self.token, id)
            .map_err(HwaError::source("discard bands"))?;
        self.source
            .discard_buffer(&self.token, buf.into_inner())
            .map_err(HwaError::source("discard buffer"))
    }

    /// Submits the buffer for bands `first..=last`. `complete` says whether `last` is done.
    pub(crate) fn submit(&mut self, complete: bool) -> Result<()> {
        if self.bands.open {
            self.band_end(complete)?;
        }
        let mut buf = self.buf.take().ok_or(HwaError::NoBuffer)?;
        let command_len = buf.cmd_len();
        let asset_len = buf.asset_len();

        if let Some(reloc) = Relocation::for_buffer(&buf, &self.options) {
            let stats = relocate(buf.commands_mut(), &reloc).map_err(HwaError::Relocate)?;
            tracing::trace!(
                links = stats.links,
                pointers = stats.pointers,
                vcomad = ?reloc.vcomad,
                vdataad = ?reloc.vdataad,
                "relocated"
            );
        }

        let (from, to) = (self.bands.first, self.bands.last);
        tracing::debug!(
            id = buf.id(),
            from,
            to,
            complete,
            command_len,
            asset_len,
            "submit"
        );
        let submission = buf.into_submission(from, to, complete);
        self.source
            .submit_buffer(&self.token, submission)
            .map_err(|err| match err {
                ApiError::InUse => HwaError::AlreadyComplete { from, to },
                err => HwaError::Source {
                    op: "submit buffer",
                    err,
                },
            })?;

        self.metrics.submitted(command_len, asset_len);
        self.bands.submitted(complete);
        Ok(())
    }
}
