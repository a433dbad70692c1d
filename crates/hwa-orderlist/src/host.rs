//! An in-memory [`BufferSource`] with two order-list buffers, modelled on a print host that
//! feeds an FPGA rig.
//!
//! Submissions are kept for inspection and can also be written out as FPGA dump files.

use crate::api::{ApiError, BandAddresses, Buffer, BufferSource, PageToken, Submission};
use crate::context::PageSetup;
use crate::dump::{DumpPage, FpgaDump, FPGA_VCOMAD};
use crate::options::{HwaFlags, HwaOptions, AUTO_ADDRESS};

/// K, C, M, Y band memory of the FPGA rig.
pub const DEFAULT_BAND_BASES: [u32; 4] = [0x0300_0000, 0x0400_0000, 0x0100_0000, 0x0200_0000];

#[derive(Clone, Debug)]
pub struct HostConfig {
    pub buffer_size: usize,
    /// Addresses the two buffers report as their start.
    pub buffer_addresses: [u32; 2],
    pub band_bases: [u32; 4],
    /// Distance between the memory of consecutive bands. Zero puts every band at the base.
    pub band_stride: u32,
    /// Band memory sets a single buffer may hold, `None` for no limit.
    pub bands_per_buffer: Option<u32>,
    /// Rendering goes to the FPGA rig: one band per buffer, with relocated addresses.
    pub fpga: bool,
    pub mono: bool,
    pub options: HwaOptions,
    pub dump: Option<FpgaDump>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1 << 20,
            buffer_addresses: [0x1000_0000, 0x1100_0000],
            band_bases: DEFAULT_BAND_BASES,
            band_stride: 0,
            bands_per_buffer: None,
            fpga: false,
            mono: false,
            options: HwaOptions::default(),
            dump: None,
        }
    }
}

/// A buffer handed to the host, with where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded {
    pub token: PageToken,
    /// Position of the buffer in its page, from 1.
    pub index: u32,
    pub submission: Submission,
}

pub struct HostSource {
    config: HostConfig,
    in_use: [bool; 2],
    /// Last band rendered to completion on this page.
    completed: i32,
    /// Band memory sets handed out since the last submit.
    bands: u32,
    page_buffers: u32,
    last_complete: bool,
    page: Option<PageSetup>,
    submissions: Vec<Recorded>,
}

impl HostSource {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            in_use: [false; 2],
            completed: -1,
            bands: 0,
            page_buffers: 0,
            last_complete: true,
            page: None,
            submissions: Vec::new(),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Remembers the page geometry, used to name and head dump files.
    pub fn begin_page(&mut self, page: PageSetup) {
        self.page = Some(page);
    }

    /// Resets the per-page state once the page has been output.
    pub fn page_done(&mut self) {
        self.page_buffers = 0;
        self.completed = -1;
        self.in_use = [false; 2];
        self.last_complete = true;
        self.bands = 0;
    }

    pub fn submissions(&self) -> &[Recorded] {
        &self.submissions
    }

    pub fn take_submissions(&mut self) -> Vec<Recorded> {
        std::mem::take(&mut self.submissions)
    }

    pub fn completed_band(&self) -> i32 {
        self.completed
    }

    pub fn band_addresses(&self, band: i32) -> BandAddresses {
        let offset = self.config.band_stride.wrapping_mul(band as u32);
        BandAddresses {
            bands: self.config.band_bases.map(|base| base.wrapping_add(offset)),
        }
    }

    fn slot(&self, buffer_id: u32) -> Option<usize> {
        let slot = buffer_id as usize;
        (slot < self.in_use.len() && self.in_use[slot]).then_some(slot)
    }

    fn dump(&self, token: &PageToken, index: u32, submission: &Submission) {
        let (Some(dump), Some(page)) = (&self.config.dump, self.page) else {
            return;
        };
        let page = DumpPage {
            token: *token,
            width: page.width,
            height: page.height,
            band_height: page.band_height,
            bit_depth: self.config.options.bit_depth,
            mono: self.config.mono,
            bands: self.config.band_bases,
        };
        if let Err(err) = dump.write(&page, index, submission, self.last_complete) {
            tracing::warn!(%err, dir = %dump.dir().display(), "failed to write FPGA dump");
        }
    }
}

impl BufferSource for HostSource {
    fn get_buffer(&mut self, _token: &PageToken) -> Result<Buffer, ApiError> {
        let slot = self
            .in_use
            .iter()
            .position(|busy| !busy)
            .ok_or(ApiError::Memory)?;
        self.in_use[slot] = true;
        Ok(Buffer {
            id: slot as u32,
            address: self.config.buffer_addresses[slot],
            data: vec![0; self.config.buffer_size],
        })
    }

    fn submit_buffer(&mut self, token: &PageToken, submission: Submission) -> Result<(), ApiError> {
        let (from, to) = (submission.from_band, submission.to_band);
        if from <= self.completed {
            return Err(ApiError::InUse);
        }
        let slot = self.slot(submission.buffer.id).ok_or(ApiError::Unknown)?;
        self.completed = if submission.complete { to } else { to - 1 };
        self.page_buffers += 1;
        tracing::debug!(
            job = token.job,
            page = token.page,
            index = self.page_buffers,
            from,
            to,
            complete = submission.complete,
            "host received order list"
        );

        self.dump(token, self.page_buffers, &submission);
        self.last_complete = submission.complete;
        self.in_use[slot] = false;
        self.bands = 0;
        self.submissions.push(Recorded {
            token: *token,
            index: self.page_buffers,
            submission,
        });
        Ok(())
    }

    fn discard_buffer(&mut self, _token: &PageToken, buffer: Buffer) -> Result<(), ApiError> {
        let slot = self.slot(buffer.id).ok_or(ApiError::Unknown)?;
        self.in_use[slot] = false;
        Ok(())
    }

    fn get_bands(
        &mut self,
        _token: &PageToken,
        buffer_id: u32,
        band: i32,
    ) -> Result<BandAddresses, ApiError> {
        if band <= self.completed {
            return Err(ApiError::InUse);
        }
        if self.slot(buffer_id).is_none() {
            return Err(ApiError::Unknown);
        }
        if band < 0 {
            return Err(ApiError::Syntax);
        }
        if self.config.fpga && self.bands > 0 {
            return Err(ApiError::Memory);
        }
        if self
            .config
            .bands_per_buffer
            .is_some_and(|limit| self.bands >= limit)
        {
            return Err(ApiError::Memory);
        }
        self.bands += 1;
        Ok(self.band_addresses(band))
    }

    fn discard_bands(&mut self, _token: &PageToken, _buffer_id: u32) -> Result<(), ApiError> {
        self.bands = 0;
        Ok(())
    }

    fn get_options(&mut self, _token: &PageToken) -> Result<Option<HwaOptions>, ApiError> {
        let mut options = self.config.options.clone();
        if self.config.fpga {
            options.vcomad = FPGA_VCOMAD;
            // A fixed data address leaves too little room for commands.
            options.vdataad = AUTO_ADDRESS;
        } else {
            options.flags.remove(HwaFlags::ALL_ONE_BAND);
        }
        Ok(Some(options))
    }
}
