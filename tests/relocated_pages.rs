use gipa2_protocol::{walk, Opcode};
use hwa_orderlist::{
    BBox, ClipState, DrawObject, Glyph, GlyphForm, HostConfig, HostSource, HwaContext, HwaOptions,
    Metrics, ObjectKind, PackedColor, PageSetup, PageToken, AUTO_ADDRESS,
};

const VCOMAD: u32 = 0x4000_0000;

const PAGE: PageSetup = PageSetup {
    width: 800,
    height: 300,
    band_height: 100,
};

const GLYPH: [u8; 16] = [0xFF; 16];

fn render(ctx: &mut HwaContext<&mut HostSource>, band: i32) {
    let top = band * 100;
    let clip = ClipState::rect(BBox::new(0, top, 799, top + 99));
    ctx.band_start(band).unwrap();
    ctx.prepare(&DrawObject::new(
        ObjectKind::Fill,
        PackedColor(0x0020_4080),
        clip,
    ))
    .unwrap();
    ctx.block(top + 10, top + 20, 100, 700).unwrap();
    ctx.span(top + 50, 0, 799).unwrap();
    ctx.prepare(&DrawObject::new(ObjectKind::Char, PackedColor::BLACK, clip))
        .unwrap();
    ctx.draw_char(&Glyph {
        id: 9,
        x: 40,
        y: top + 30,
        width: 8,
        height: 16,
        form: GlyphForm::Bitmap(&GLYPH),
    })
    .unwrap();
    ctx.band_finished().unwrap();
}

#[test]
fn relocated_pointers_land_in_the_data_area() {
    let mut host = HostSource::new(HostConfig {
        options: HwaOptions {
            vcomad: VCOMAD,
            vdataad: AUTO_ADDRESS,
            ..HwaOptions::default()
        },
        ..HostConfig::default()
    });
    let mut metrics = Metrics::new();
    for page in 1..=2 {
        let token = PageToken { job: 5, page };
        let mut ctx = HwaContext::with_metrics(&mut host, token, PAGE, metrics).unwrap();
        for band in 0..3 {
            render(&mut ctx, band);
        }
        ctx.finish_page().unwrap();
        metrics = ctx.into_parts().1;
        host.page_done();
    }
    assert_eq!(metrics.pages(), 2);
    assert!(metrics.opcode(Opcode::DrawStretchBlt).count >= 6);

    let submissions = host.take_submissions();
    assert_eq!(submissions.len(), 2);
    for recorded in &submissions {
        let s = &recorded.submission;
        let cmds = s.commands();
        let vdataad = VCOMAD + ((s.command_len as u32 + 0xFFF) & !0xFFF);
        let data = vdataad..vdataad + s.assets().len() as u32;

        let mut pointers = 0;
        for step in walk(cmds, VCOMAD) {
            let step = step.unwrap();
            for &p in step.layout.pointers {
                let at = step.offset + p;
                let addr = u32::from_be_bytes([cmds[at], cmds[at + 1], cmds[at + 2], cmds[at + 3]]);
                if addr != 0 {
                    assert!(
                        data.contains(&addr),
                        "{} at {:#x} points at {addr:#x}, outside {data:x?}",
                        step.layout.opcode,
                        step.offset
                    );
                    pointers += 1;
                }
            }
        }
        assert!(pointers > 0);
    }
}
