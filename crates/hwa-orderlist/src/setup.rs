//! The setup block: dither, cell size and gamma state that every buffer (or, deferred, every
//! band) starts with.

use gipa2_protocol::{
    Command, CommandLayout as L, DitherCell, Opcode, SetDitherSize, SetDitherStretchBlt,
    SetGamma, SetUserGamma, GIPA2_BGUCR, GIPA2_CMM, GIPA2_DITHER_GT, GIPA2_G2K, GIPA2_GAMMA,
    GIPA2_PRECMMGRAY, GIPA2_TONERLIMIT, GIPA2_TONERMASS, GIPA2_USERGAMMA,
};

use crate::api::BufferSource;
use crate::asset::{asset_size, AssetSource, AssetTag};
use crate::context::HwaContext;
use crate::error::{HwaError, Result};
use crate::options::{CellTable, HwaTables, Lut, TONER_LIMIT_OFF};

/// Side of the threshold matrix used when the device has no dither table.
const FAKE_DITHER_SIZE: u8 = 16;

/// Bytes of the fake threshold matrix: 16 rows of 128 bytes in pixel-pair order.
const FAKE_DITHER_BYTES: usize = 16 * 128;

type CellSelect = for<'a> fn(&'a HwaTables) -> Option<&'a CellTable>;
type LutSelect = for<'a> fn(&'a HwaTables) -> Option<&'a Lut>;

/// A ramp that makes every pixel of a 16x16 cell a distinct threshold.
fn fake_dither(out: &mut [u8]) {
    for (y, row) in out.chunks_exact_mut(128).take(16).enumerate() {
        for x in (0..16).step_by(2) {
            let t = (y * 16 + x) as u8;
            row[x * 2] = t;
            row[x * 2 + 1] = t.wrapping_add(1);
        }
    }
}

/// Payload of a cell table that has to be copied into the buffer.
fn table_len(table: &CellTable) -> Option<usize> {
    (!table.accessible).then(|| table.planes.iter().map(|p| p.data.len()).sum())
}

fn lut_len(lut: Option<&Lut>) -> Option<usize> {
    lut.filter(|lut| lut.address.is_none()).map(|lut| lut.data.len())
}

impl<S: BufferSource> HwaContext<S> {
    /// Bytes the setup block needs, counting only the tables not yet in the buffer.
    pub(crate) fn setup_required(&mut self) -> usize {
        let tables = &self.options.tables;
        let dither = match tables.dither() {
            Some(table) => table_len(table),
            None => Some(FAKE_DITHER_BYTES),
        };
        let mut commands = L::SET_DITHER_SIZE + L::SET_DITHER_SIZE_SIZE;
        let mut assets = vec![
            (AssetSource::DitherCache, 0, dither),
            (AssetSource::DitherCache, 1, tables.colors().and_then(table_len)),
        ];
        if tables.has_gamma() {
            commands += L::SET_GAMMA_SIZE;
            assets.extend([
                (AssetSource::OneOff, 0, lut_len(tables.gamma.as_ref())),
                (AssetSource::OneOff, 1, lut_len(tables.black.as_ref())),
                (AssetSource::OneOff, 2, lut_len(tables.cmm.as_ref())),
            ]);
        }
        if tables.user.is_some() {
            commands += L::SET_USERGAMMA_SIZE;
            assets.push((AssetSource::OneOff, 3, lut_len(tables.user.as_ref())));
        }

        commands
            + assets
                .into_iter()
                .filter_map(|(source, arg, len)| {
                    let len = len?;
                    self.find_asset(source, arg).is_none().then(|| asset_size(len))
                })
                .sum::<usize>()
    }

    /// Emits the setup commands and their tables.
    ///
    /// With `separate` they get a command block of their own. A single-band page also gets
    /// its only `BAND_INIT` here.
    pub(crate) fn buffer_assets(&mut self, separate: bool) -> Result<()> {
        if separate {
            self.current_mut()?.align16();
            let head = self.emit(&Command::ComHead { next: 0 })?;
            self.current_mut()?.link_head(head);
        }

        if self.all_one_band() {
            let buffer_id = self.current()?.id();
            let addresses = self
                .source
                .get_bands(&self.token, buffer_id, 0)
                .map_err(HwaError::source("get bands"))?;
            let init = self.band_init(0, &addresses);
            self.emit(&Command::BandInit(init))?;
            self.bands.open = true;
            self.bands.complete = false;
        }

        self.dither_setup()?;
        self.dither_size_setup()?;
        self.gamma_setup()?;
        self.user_gamma_setup()?;

        if separate && !self.all_one_band() {
            self.emit(&Command::ComBlockEnd)?;
        }
        Ok(())
    }

    fn dither_setup(&mut self) -> Result<()> {
        let cells = match self.plane_addresses(Opcode::SetDitherStretchBlt, 0, HwaTables::dither)? {
            Some((sizes, addresses)) => {
                [0, 1, 2, 3].map(|i| DitherCell {
                    width: sizes[i].0,
                    height: sizes[i].1,
                    size: 0,
                    cell: addresses[i],
                })
            }
            None => {
                let address = match self.find_asset(AssetSource::DitherCache, 0) {
                    Some(asset) => asset.address,
                    None => {
                        let asset = self.add_asset(
                            Opcode::SetDitherStretchBlt,
                            AssetTag::DITHER,
                            AssetSource::DitherCache,
                            FAKE_DITHER_BYTES,
                            0,
                        )?;
                        fake_dither(self.current_mut()?.payload_mut(&asset));
                        asset.address
                    }
                };
                [DitherCell {
                    width: FAKE_DITHER_SIZE,
                    height: FAKE_DITHER_SIZE,
                    size: 0,
                    cell: address,
                }; 4]
            }
        };
        self.emit(&Command::SetDitherStretchBlt(SetDitherStretchBlt {
            flags: GIPA2_DITHER_GT,
            cells,
            yclip: None,
        }))?;
        Ok(())
    }

    fn dither_size_setup(&mut self) -> Result<()> {
        let sizes = self.options.tables.cell_sizes();
        self.emit(&Command::SetDitherSize(SetDitherSize { sizes }))?;
        if let Some((_, addresses)) =
            self.plane_addresses(Opcode::SetDitherSize, 1, HwaTables::colors)?
        {
            self.color_cells = Some(addresses);
        }
        Ok(())
    }

    /// Sizes and K, C, M, Y addresses of a cell table. Tables the hardware cannot read in
    /// place are copied into one asset, planes back to back.
    fn plane_addresses(
        &mut self,
        opcode: Opcode,
        arg: i32,
        select: CellSelect,
    ) -> Result<Option<([(u8, u8); 4], [u32; 4])>> {
        let Some(table) = select(&self.options.tables) else {
            return Ok(None);
        };
        let sizes = table.sizes();
        if table.accessible {
            return Ok(Some((sizes, [0, 1, 2, 3].map(|i| table.planes[i].address))));
        }
        let lens = [0, 1, 2, 3].map(|i| table.planes[i].data.len());

        let asset = match self.find_asset(AssetSource::DitherCache, arg) {
            Some(asset) => asset,
            None => {
                let total = lens.iter().sum();
                let asset =
                    self.add_asset(opcode, AssetTag::DITHER, AssetSource::DitherCache, total, arg)?;
                let out = self
                    .buf
                    .as_mut()
                    .ok_or(HwaError::NoBuffer)?
                    .payload_mut(&asset);
                if let Some(table) = select(&self.options.tables) {
                    let mut offset = 0;
                    for plane in &table.planes {
                        out[offset..offset + plane.data.len()].copy_from_slice(&plane.data);
                        offset += plane.data.len();
                    }
                }
                asset
            }
        };

        let mut addresses = [0u32; 4];
        let mut offset = 0u32;
        for (address, len) in addresses.iter_mut().zip(lens) {
            *address = asset.address.wrapping_add(offset);
            offset += len as u32;
        }
        Ok(Some((sizes, addresses)))
    }

    /// Address of a lookup table, placing it as an asset unless it is preloaded. Zero when
    /// the device has none.
    fn lut_address(
        &mut self,
        opcode: Opcode,
        tag: AssetTag,
        arg: i32,
        select: LutSelect,
    ) -> Result<u32> {
        let Some(lut) = select(&self.options.tables) else {
            return Ok(0);
        };
        if let Some(address) = lut.address {
            return Ok(address);
        }
        let len = lut.data.len();
        if let Some(asset) = self.find_asset(AssetSource::OneOff, arg) {
            return Ok(asset.address);
        }
        let asset = self.add_asset(opcode, tag, AssetSource::OneOff, len, arg)?;
        let out = self
            .buf
            .as_mut()
            .ok_or(HwaError::NoBuffer)?
            .payload_mut(&asset);
        if let Some(lut) = select(&self.options.tables) {
            out.copy_from_slice(&lut.data);
        }
        Ok(asset.address)
    }

    fn gamma_setup(&mut self) -> Result<()> {
        let tables = &self.options.tables;
        if !tables.has_gamma() {
            return Ok(());
        }
        let toner_limit = tables.toner_limit;
        let mut flags = GIPA2_G2K;
        if toner_limit < TONER_LIMIT_OFF {
            flags |= GIPA2_TONERLIMIT;
        }
        if tables.gamma.is_some() {
            flags |= GIPA2_GAMMA | GIPA2_TONERMASS;
        }
        if tables.black.is_some() {
            flags |= GIPA2_BGUCR;
        }
        if tables.cmm.is_some() {
            flags |= GIPA2_CMM | GIPA2_PRECMMGRAY;
        }

        let op = Opcode::SetGammaStretchBlt;
        let gamma = self.lut_address(op, AssetTag::GAMMA, 0, |t| t.gamma.as_ref())?;
        let black = self.lut_address(op, AssetTag::BLACK, 1, |t| t.black.as_ref())?;
        let cmm = self.lut_address(op, AssetTag::CMM, 2, |t| t.cmm.as_ref())?;

        self.emit(&Command::SetGamma(SetGamma {
            flags,
            toner_limit: toner_limit as i16,
            gamma,
            black,
            cmm,
            yclip: None,
        }))?;
        Ok(())
    }

    fn user_gamma_setup(&mut self) -> Result<()> {
        if self.options.tables.user.is_none() {
            return Ok(());
        }
        let user = self.lut_address(
            Opcode::SetUserGammaStretchBlt,
            AssetTag::USER,
            3,
            |t| t.user.as_ref(),
        )?;
        self.emit(&Command::SetUserGamma(SetUserGamma {
            flags: GIPA2_USERGAMMA,
            user,
            yclip: None,
        }))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fake_dither_pairs() {
        let mut out = vec![0u8; FAKE_DITHER_BYTES];
        fake_dither(&mut out);
        assert_eq!(&out[..6], &[0, 1, 0, 0, 2, 3]);
        let last_row = &out[15 * 128..];
        assert_eq!(&last_row[28..30], &[254, 255]);
        assert!(out[15 * 128 + 32..].iter().all(|&b| b == 0));
    }

    #[test]
    fn only_copied_tables_take_room() {
        let preloaded = Lut {
            data: vec![0; 256],
            address: Some(0x2000),
        };
        assert_eq!(lut_len(Some(&preloaded)), None);
        let copied = Lut {
            data: vec![0; 256],
            address: None,
        };
        assert_eq!(lut_len(Some(&copied)), Some(256));

        let mut table = CellTable::default();
        table.planes[0].data = vec![0; 32];
        table.planes[3].data = vec![0; 8];
        assert_eq!(table_len(&table), Some(40));
        table.accessible = true;
        assert_eq!(table_len(&table), None);
    }
}
