use core::fmt;

use gipa2_protocol::Opcode;

/// Commands emitted with one opcode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpcodeStats {
    pub count: u64,
    pub command_bytes: u64,
    /// Asset bytes allocated on behalf of commands with this opcode.
    pub asset_bytes: u64,
}

/// Submitted buffer totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub buffers: u64,
    pub command_bytes: u64,
    pub asset_bytes: u64,
}

impl BufferStats {
    pub fn bytes(&self) -> u64 {
        self.command_bytes + self.asset_bytes
    }

    fn delta(&self, since: &BufferStats) -> BufferStats {
        BufferStats {
            buffers: self.buffers - since.buffers,
            command_bytes: self.command_bytes - since.command_bytes,
            asset_bytes: self.asset_bytes - since.asset_bytes,
        }
    }

    fn max_each(&mut self, other: &BufferStats) {
        self.buffers = self.buffers.max(other.buffers);
        self.command_bytes = self.command_bytes.max(other.command_bytes);
        self.asset_bytes = self.asset_bytes.max(other.asset_bytes);
    }

    fn add(&mut self, other: &BufferStats) {
        self.buffers += other.buffers;
        self.command_bytes += other.command_bytes;
        self.asset_bytes += other.asset_bytes;
    }
}

impl fmt::Display for BufferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buffers, {} bytes ({} commands, {} assets)",
            self.buffers,
            self.bytes(),
            self.command_bytes,
            self.asset_bytes
        )
    }
}

/// Order-list usage, per opcode for the current page and per buffer across pages.
///
/// Peaks are taken field by field, so a peak record need not describe any single page or band.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    opcodes: [OpcodeStats; Opcode::COUNT],
    page: BufferStats,
    band_mark: BufferStats,
    peak_band: BufferStats,
    peak_page: BufferStats,
    total: BufferStats,
    pages: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opcode(&self, opcode: Opcode) -> &OpcodeStats {
        &self.opcodes[opcode.index()]
    }

    pub fn page(&self) -> &BufferStats {
        &self.page
    }

    pub fn peak_page(&self) -> &BufferStats {
        &self.peak_page
    }

    pub fn peak_band(&self) -> &BufferStats {
        &self.peak_band
    }

    pub fn total(&self) -> &BufferStats {
        &self.total
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub(crate) fn command(&mut self, opcode: Opcode, bytes: usize) {
        let stats = &mut self.opcodes[opcode.index()];
        stats.count += 1;
        stats.command_bytes += bytes as u64;
    }

    pub(crate) fn asset(&mut self, opcode: Opcode, bytes: usize) {
        self.opcodes[opcode.index()].asset_bytes += bytes as u64;
    }

    pub(crate) fn submitted(&mut self, command_bytes: usize, asset_bytes: usize) {
        self.page.add(&BufferStats {
            buffers: 1,
            command_bytes: command_bytes as u64,
            asset_bytes: asset_bytes as u64,
        });
    }

    pub(crate) fn begin_page(&mut self) {
        self.page = BufferStats::default();
        self.band_mark = BufferStats::default();
        self.opcodes = Default::default();
    }

    pub(crate) fn band_started(&mut self) {
        self.band_mark = self.page;
    }

    pub(crate) fn band_finished(&mut self) {
        let band = self.page.delta(&self.band_mark);
        self.peak_band.max_each(&band);
    }

    pub(crate) fn end_page(&mut self) {
        if self.page.buffers > 0 {
            tracing::info!(page = %self.page, "order lists for page");
            for opcode in Opcode::ALL {
                let stats = self.opcode(opcode);
                if stats.count > 0 {
                    tracing::debug!(
                        %opcode,
                        count = stats.count,
                        command_bytes = stats.command_bytes,
                        asset_bytes = stats.asset_bytes,
                        "opcode usage"
                    );
                }
            }
        }
        self.peak_page.max_each(&self.page);
        self.total.add(&self.page);
        self.pages += 1;
    }

    /// Logs the totals and peaks gathered so far.
    pub fn report(&self) {
        if self.total.buffers == 0 {
            return;
        }
        tracing::info!(
            pages = self.pages,
            total = %self.total,
            peak_page = %self.peak_page,
            peak_band = %self.peak_band,
            "order list usage"
        );
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pages:     {}", self.pages)?;
        writeln!(f, "total:     {}", self.total)?;
        writeln!(f, "peak page: {}", self.peak_page)?;
        writeln!(f, "peak band: {}", self.peak_band)?;
        for opcode in Opcode::ALL {
            let stats = self.opcode(opcode);
            if stats.count > 0 {
                writeln!(
                    f,
                    "{:<26} {:>8} {:>10} {:>10}",
                    opcode.name(),
                    stats.count,
                    stats.command_bytes,
                    stats.asset_bytes
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn band_peaks_are_page_deltas() {
        let mut m = Metrics::new();
        m.begin_page();
        m.band_started();
        m.submitted(100, 20);
        m.submitted(50, 0);
        m.band_finished();
        m.band_started();
        m.submitted(300, 8);
        m.band_finished();
        m.end_page();

        assert_eq!(
            *m.peak_band(),
            BufferStats {
                buffers: 2,
                command_bytes: 300,
                asset_bytes: 20
            }
        );
        assert_eq!(m.total().bytes(), 478);
        assert_eq!(m.peak_page().buffers, 3);
    }

    #[test]
    fn opcode_counters_reset_per_page() {
        let mut m = Metrics::new();
        m.command(Opcode::SetRop2, 4);
        m.command(Opcode::SetRop2, 4);
        m.asset(Opcode::SetBrush, 528);
        assert_eq!(m.opcode(Opcode::SetRop2).count, 2);
        assert_eq!(m.opcode(Opcode::SetBrush).asset_bytes, 528);
        assert!(m.to_string().contains("SET_ROP2"));

        m.begin_page();
        assert_eq!(*m.opcode(Opcode::SetRop2), OpcodeStats::default());
    }
}
