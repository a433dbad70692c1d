//! Text dumps of submitted order lists in the layout the FPGA test rig loads.
//!
//! Each submission becomes three files in the output directory: `OLHead<name>` (load
//! parameters), `OL<name>` (command words) and `OLWork<name>` (asset words).

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gipa2_protocol::Opcode;

use crate::api::{PageToken, Submission};

/// Command area load address used by the FPGA rig.
pub const FPGA_VCOMAD: u32 = 0x0080_0000;

/// Page parameters the dump files are named and headed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DumpPage {
    pub token: PageToken,
    pub width: u32,
    pub height: u32,
    pub band_height: u32,
    pub bit_depth: u32,
    pub mono: bool,
    /// Band start addresses, K, C, M, Y.
    pub bands: [u32; 4],
}

impl DumpPage {
    /// `j_{job}_p{page}_w{width}_h{height}_d{depth}_c{index}`, page and index two digits.
    pub fn name(&self, index: u32) -> String {
        format!(
            "j_{}_p{:02}_w{}_h{}_d{}_c{:02}",
            self.token.job, self.token.page, self.width, self.height, self.bit_depth, index
        )
    }

    /// Raster line length in bytes, padded to 64 bits.
    pub fn line_bytes(&self) -> u32 {
        ((u64::from(self.width) * u64::from(self.bit_depth) + 63) / 64 * 8) as u32
    }

    pub fn band_bytes(&self) -> u32 {
        self.line_bytes().wrapping_mul(self.band_height)
    }
}

/// Whether commands run from instruction memory, which changes the SRAM header fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemoryModel {
    #[default]
    NoImem,
    /// `clear` says whether the band is cleared before drawing, i.e. the previous buffer
    /// completed its last band.
    Imem { clear: bool },
}

fn hex_line(out: &mut String, v: u32) {
    let _ = writeln!(out, "{v:08x}");
}

/// The `OLHead` file for a submission.
pub fn header(page: &DumpPage, commands: &[u8], asset_len: usize, model: MemoryModel) -> String {
    let vcomad = FPGA_VCOMAD;
    let vdataad = vcomad.wrapping_add(((commands.len() + 0xFFF) & !0xFFF) as u32);
    // A buffer that starts with BAND_INIT rather than a setup block covers the whole page.
    let rows = if commands.len() > 40 && commands[16] == Opcode::BandInit as u8 {
        page.height
    } else {
        page.band_height
    };

    let mut out = String::new();
    hex_line(&mut out, if page.mono { 0x01 } else { 0x0F });
    for band in page.bands {
        hex_line(&mut out, band);
    }
    hex_line(&mut out, page.line_bytes());
    hex_line(&mut out, rows);
    match model {
        MemoryModel::NoImem => {
            hex_line(&mut out, 0);
            hex_line(&mut out, 0);
            hex_line(&mut out, page.band_bytes());
            hex_line(&mut out, 0);
        }
        MemoryModel::Imem { clear } => {
            hex_line(&mut out, u32::from(clear));
            hex_line(&mut out, u32::from(!clear));
            hex_line(&mut out, vcomad);
            hex_line(&mut out, vcomad);
        }
    }
    hex_line(&mut out, commands.len() as u32);
    hex_line(&mut out, vdataad);
    hex_line(&mut out, vdataad);
    hex_line(&mut out, asset_len as u32);
    if model == MemoryModel::NoImem {
        hex_line(&mut out, 0);
        hex_line(&mut out, page.band_height);
        hex_line(&mut out, page.band_bytes());
    }
    out
}

/// Four bytes per line as eight hex digits, a space and a newline. A short last word is
/// padded with zeros.
pub fn hex_words(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() / 4 * 10 + 10);
    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let _ = writeln!(
            out,
            "{:02x}{:02x}{:02x}{:02x} ",
            word[0], word[1], word[2], word[3]
        );
    }
    out
}

/// Writes dump files into a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FpgaDump {
    dir: PathBuf,
    model: MemoryModel,
}

impl FpgaDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            model: MemoryModel::NoImem,
        }
    }

    pub fn with_model(mut self, model: MemoryModel) -> Self {
        self.model = model;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the three files for submission `index` of the page and returns their paths:
    /// header, commands, assets.
    pub fn write(
        &self,
        page: &DumpPage,
        index: u32,
        submission: &Submission,
        previous_complete: bool,
    ) -> io::Result<[PathBuf; 3]> {
        let model = match self.model {
            MemoryModel::NoImem => MemoryModel::NoImem,
            MemoryModel::Imem { .. } => MemoryModel::Imem {
                clear: previous_complete,
            },
        };
        let name = page.name(index);
        let paths = [
            self.dir.join(format!("OLHead{name}")),
            self.dir.join(format!("OL{name}")),
            self.dir.join(format!("OLWork{name}")),
        ];
        let commands = submission.commands();
        let assets = submission.assets();
        fs::write(&paths[0], header(page, commands, assets.len(), model))?;
        fs::write(&paths[1], hex_words(commands))?;
        fs::write(&paths[2], hex_words(assets))?;
        tracing::debug!(dir = %self.dir.display(), %name, "wrote FPGA dump");
        Ok(paths)
    }
}
