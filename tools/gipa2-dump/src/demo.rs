//! Renders a synthetic page through the host buffer source.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use hwa_orderlist::{
    BBox, ClipState, DrawObject, FpgaDump, Glyph, GlyphForm, HostConfig, HostSource, HwaContext,
    HwaFlags, HwaOptions, MemoryModel, Metrics, ObjectKind, PackedColor, PageSetup, PageToken,
    NO_ADDRESS,
};

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Directory the FPGA dump files are written to
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub job: u32,

    /// Number of pages to render
    #[arg(long, default_value_t = 1)]
    pub pages: u32,

    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    #[arg(long, default_value_t = 512)]
    pub height: u32,

    #[arg(long, default_value_t = 128)]
    pub band_height: u32,

    /// Bands left blank; the band after a gap starts a new buffer
    #[arg(long = "skip-band", value_name = "BAND")]
    pub skip_bands: Vec<i32>,

    /// Order-list buffer size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = 1 << 20)]
    pub buffer_size: usize,

    /// Target the FPGA rig: one band per buffer, relocated to its load addresses
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub fpga: bool,

    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub mono: bool,

    /// Bits per pixel of the output bands (1, 2 or 4)
    #[arg(long, default_value_t = 1)]
    pub bit_depth: u32,

    /// Render the page as a single band
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub all_one_band: bool,

    /// Emit setup commands after each BAND_INIT
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub defer: bool,

    /// End bands without BAND_DMA
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_imem: bool,

    /// Write the SRAM header fields for instruction memory
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub imem_dump: bool,

    /// Command area load address (hex)
    #[arg(long, value_name = "ADDR", value_parser = crate::parse_address)]
    pub vcomad: Option<u32>,

    /// Data area load address (hex)
    #[arg(long, value_name = "ADDR", value_parser = crate::parse_address)]
    pub vdataad: Option<u32>,
}

impl DemoArgs {
    fn options(&self) -> HwaOptions {
        let mut flags = HwaFlags::empty();
        flags.set(HwaFlags::ALL_ONE_BAND, self.all_one_band);
        flags.set(HwaFlags::DEFER, self.defer);
        flags.set(HwaFlags::NO_IMEM, self.no_imem);
        HwaOptions {
            flags,
            vcomad: self.vcomad.unwrap_or(NO_ADDRESS),
            vdataad: self.vdataad.unwrap_or(NO_ADDRESS),
            bit_depth: self.bit_depth,
            ..HwaOptions::default()
        }
    }

    fn page(&self) -> PageSetup {
        PageSetup {
            width: self.width,
            height: self.height,
            band_height: if self.all_one_band {
                self.height
            } else {
                self.band_height
            },
        }
    }

    fn host(&self) -> anyhow::Result<HostConfig> {
        let dump = match &self.out {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("create {}", dir.display()))?;
                let model = if self.imem_dump {
                    MemoryModel::Imem { clear: true }
                } else {
                    MemoryModel::NoImem
                };
                Some(FpgaDump::new(dir).with_model(model))
            }
            None => None,
        };
        Ok(HostConfig {
            buffer_size: self.buffer_size,
            fpga: self.fpga,
            mono: self.mono,
            options: self.options(),
            dump,
            ..HostConfig::default()
        })
    }
}

/// A diagonal stroke, 16 pixels square, one bit per pixel.
const GLYPH: [u8; 32] = [
    0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00, 0x03, 0x00, 0x01,
    0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00, 0x03,
    0x00, 0x01,
];

const PALETTE: [u32; 4] = [0x0000_0000, 0x0000_00FF, 0x0000_FF00, 0x00FF_0000];

fn render_band<S: hwa_orderlist::BufferSource>(
    ctx: &mut HwaContext<S>,
    page: &PageSetup,
    band: i32,
) -> anyhow::Result<()> {
    let top = band * page.band_height as i32;
    let bottom = (top + page.band_height as i32).min(page.height as i32) - 1;
    let right = page.width as i32 - 1;
    let clip = ClipState::rect(BBox::new(0, top, right, bottom));
    let color = PackedColor(PALETTE[band as usize % PALETTE.len()]);

    ctx.prepare(&DrawObject::new(ObjectKind::Fill, color, clip))?;
    let inset = (page.width as i32 / 16).max(1);
    ctx.block(top, (top + 7).min(bottom), inset, right - inset)?;
    // A staircase of spans, one row apart so consecutive rows coalesce.
    for (step, y) in (top + 8..=bottom).step_by(4).enumerate() {
        let x0 = inset + step as i32 * 3;
        for row in y..(y + 4).min(bottom + 1) {
            ctx.span(row, x0, (x0 + page.width as i32 / 4).min(right))?;
        }
    }

    ctx.prepare(&DrawObject::new(ObjectKind::Char, PackedColor::BLACK, clip))?;
    for i in 0..4 {
        ctx.draw_char(&Glyph {
            id: 1,
            x: right / 2 + i * 20,
            y: top + 4,
            width: 16,
            height: 16,
            form: GlyphForm::Bitmap(&GLYPH),
        })?;
    }
    Ok(())
}

pub fn run(args: &DemoArgs) -> anyhow::Result<()> {
    if args.pages == 0 {
        bail!("--pages must be at least 1");
    }
    let page = args.page();
    let mut host = HostSource::new(args.host()?);
    let mut metrics = Metrics::new();
    let bands = page.height.div_ceil(page.band_height) as i32;

    for n in 1..=args.pages {
        let token = PageToken {
            job: args.job,
            page: n,
        };
        host.begin_page(page);
        let mut ctx = HwaContext::with_metrics(&mut host, token, page, metrics)
            .with_context(|| format!("start page {n}"))?;
        for band in (0..bands).filter(|b| !args.skip_bands.contains(b)) {
            ctx.band_start(band)
                .with_context(|| format!("start band {band} of page {n}"))?;
            render_band(&mut ctx, &page, band)
                .with_context(|| format!("render band {band} of page {n}"))?;
            ctx.band_finished()
                .with_context(|| format!("finish band {band} of page {n}"))?;
        }
        ctx.finish_page()
            .with_context(|| format!("finish page {n}"))?;
        metrics = ctx.into_parts().1;
        host.page_done();
    }

    for recorded in host.submissions() {
        let s = &recorded.submission;
        println!(
            "page {} buffer {:02}: bands {}..={}{} commands {} bytes, assets {} bytes",
            recorded.token.page,
            recorded.index,
            s.from_band,
            s.to_band,
            if s.complete { "" } else { " (open)" },
            s.command_len,
            s.assets().len()
        );
    }
    print!("{metrics}");
    metrics.report();
    if let Some(dir) = &args.out {
        tracing::info!(dir = %dir.display(), "dump files written");
    }
    Ok(())
}
