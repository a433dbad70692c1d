use gipa2_protocol::{rop3_to_rop2, walk, Command, Opcode, GIPA2_CLIP_BITMAP, GIPA2_CLIP_RUN};
use hwa_orderlist::{
    BBox, BrushPattern, BrushSpec, ClipState, ComplexClip, Draw, DrawObject, HostConfig,
    HostSource, HwaContext, HwaError, HwaFlags, HwaOptions, ImageParams, ObjectKind, PackedColor,
    PageSetup, PageToken, Recorded, SpanMask,
};
use pretty_assertions::assert_eq;

const TOKEN: PageToken = PageToken { job: 4, page: 1 };

const PAGE: PageSetup = PageSetup {
    width: 640,
    height: 200,
    band_height: 100,
};

const BAND0: BBox = BBox::new(0, 0, 639, 99);

fn commands(recorded: &Recorded) -> Vec<Command> {
    let s = &recorded.submission;
    let cmds = s.commands();
    walk(cmds, s.buffer.address)
        .map(|step| Command::decode(&cmds[step.unwrap().offset..]).unwrap())
        .collect()
}

fn count(cmds: &[Command], opcode: Opcode) -> usize {
    cmds.iter().filter(|c| c.opcode() == opcode).count()
}

/// Two spans per row across the band: a run-list clip.
fn two_column_mask() -> SpanMask {
    SpanMask::repeated(0, 99, &[(0, 99), (200, 299)])
}

/// Twenty spans per row, more than a run-list clip holds.
fn busy_mask() -> SpanMask {
    let spans: Vec<_> = (0..20).map(|i| (i * 10, i * 10 + 4)).collect();
    SpanMask::repeated(0, 9, &spans)
}

fn checkerboard() -> BrushPattern {
    BrushPattern {
        id: 77,
        width: 2,
        height: 2,
        pixels: vec![1, 0, 0, 1],
    }
}

fn gray_image(samples: &[u8], bbox: BBox, ncols: u32, nrows: u32) -> ImageParams<'_> {
    ImageParams {
        id: 1,
        bbox,
        ncols,
        nrows,
        comps: 1,
        samples,
        reverse_x: false,
        reverse_y: false,
        orthogonal: true,
        knockout: false,
    }
}

#[test]
fn repeated_state_is_sent_once() {
    let mask = two_column_mask();
    let clip = ClipState::complex(BAND0, ComplexClip::new(7, BBox::new(0, 0, 299, 99), &mask));
    let colors = [0x00FF_0000, 0x00FF_0000, 0x0000_FF00, 0x0000_FF00, 0xFF, 0xFF];

    let mut host = HostSource::new(HostConfig::default());
    {
        let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
        ctx.band_start(0).unwrap();
        for (y, color) in colors.into_iter().enumerate() {
            let object = DrawObject::new(ObjectKind::Fill, PackedColor(color), clip);
            assert_eq!(ctx.prepare(&object).unwrap(), Draw::Hardware);
            ctx.span(y as i32 * 2, 0, 50).unwrap();
        }
        ctx.band_finished().unwrap();
        ctx.finish_page().unwrap();
    }

    let cmds = commands(&host.submissions()[0]);
    assert_eq!(count(&cmds, Opcode::SetRop2), 1);
    assert_eq!(count(&cmds, Opcode::SetBrush), 1);
    assert_eq!(count(&cmds, Opcode::SetClip), 1);
    assert_eq!(count(&cmds, Opcode::SetColor), 3);
    assert_eq!(count(&cmds, Opcode::DrawRunRepeat), 6);
}

#[test]
fn complex_clip_loaded_once_per_id() {
    let mask = two_column_mask();
    let bbox = BBox::new(0, 0, 299, 99);
    let mut host = HostSource::new(HostConfig::default());
    {
        let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
        ctx.band_start(0).unwrap();
        for id in [3, 3, 4, 3] {
            let clip = ClipState::complex(BAND0, ComplexClip::new(id, bbox, &mask));
            let object = DrawObject::new(ObjectKind::Fill, PackedColor::BLACK, clip);
            assert_eq!(ctx.prepare(&object).unwrap(), Draw::Hardware);
            ctx.span(10, 0, 20).unwrap();
        }
        // A plain object drops the complex clip.
        let object = DrawObject::new(ObjectKind::Fill, PackedColor::BLACK, ClipState::rect(BAND0));
        ctx.prepare(&object).unwrap();
        ctx.span(11, 0, 20).unwrap();
        ctx.band_finished().unwrap();
        ctx.finish_page().unwrap();
    }

    let cmds = commands(&host.submissions()[0]);
    let clips: Vec<_> = cmds
        .iter()
        .filter_map(|c| match c {
            Command::SetClip(clip) => Some((clip.kind, clip.x, clip.y, clip.height)),
            _ => None,
        })
        .collect();
    assert_eq!(clips, [(GIPA2_CLIP_RUN, 0, 0, 100); 3]);
    assert_eq!(count(&cmds, Opcode::ResetClip), 1);
}

#[test]
fn busy_clip_falls_back() {
    let mask = busy_mask();
    let clip = ClipState::complex(BAND0, ComplexClip::new(2, BBox::new(0, 0, 199, 9), &mask));
    let mut host = HostSource::new(HostConfig::default());
    let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
    ctx.band_start(0).unwrap();
    let object = DrawObject::new(ObjectKind::Fill, PackedColor::BLACK, clip);
    assert_eq!(ctx.prepare(&object).unwrap(), Draw::Fallback);

    // Unsupported ROPs fall back before anything is sent.
    let mut object = DrawObject::new(ObjectKind::Fill, PackedColor::BLACK, ClipState::rect(BAND0));
    object.rop3 = 0xB8;
    assert_eq!(ctx.prepare(&object).unwrap(), Draw::Fallback);
}

#[test]
fn busy_clip_on_an_image_is_a_bitmap() {
    let mask = busy_mask();
    let clip = ClipState::complex(BAND0, ComplexClip::new(2, BBox::new(0, 0, 199, 9), &mask));
    let samples = vec![0x80u8; 200 * 10];
    let image = gray_image(&samples, BBox::new(0, 0, 199, 9), 200, 10);

    let mut host = HostSource::new(HostConfig::default());
    {
        let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
        ctx.band_start(0).unwrap();
        let object = DrawObject::new(ObjectKind::Image, PackedColor::BLACK, clip);
        assert_eq!(ctx.prepare(&object).unwrap(), Draw::Hardware);
        assert_eq!(ctx.image(&image, &clip).unwrap(), Draw::Hardware);
        ctx.band_finished().unwrap();
        ctx.finish_page().unwrap();
    }

    let cmds = commands(&host.submissions()[0]);
    let clip = cmds
        .iter()
        .find_map(|c| match c {
            Command::SetClip(clip) => Some(*clip),
            _ => None,
        })
        .unwrap();
    assert_eq!((clip.kind, clip.x, clip.width, clip.height), (GIPA2_CLIP_BITMAP, 0, 4, 10));
    assert_eq!(count(&cmds, Opcode::DrawStretchBlt), 1);
}

#[test]
fn large_image_is_tiled() {
    let page = PageSetup {
        width: 10240,
        height: 100,
        band_height: 100,
    };
    let samples: Vec<u8> = (0..10240u32).map(|i| i as u8).collect();
    let image = gray_image(&samples, BBox::new(0, 0, 10239, 0), 10240, 1);
    let clip = ClipState::rect(BBox::new(0, 0, 10239, 99));

    let mut host = HostSource::new(HostConfig::default());
    {
        let mut ctx = HwaContext::new(&mut host, TOKEN, page).unwrap();
        ctx.band_start(0).unwrap();
        ctx.prepare(&DrawObject::new(ObjectKind::Image, PackedColor::BLACK, clip))
            .unwrap();
        assert_eq!(ctx.image(&image, &clip).unwrap(), Draw::Hardware);
        ctx.band_finished().unwrap();
        ctx.finish_page().unwrap();
    }

    let recorded = &host.submissions()[0];
    let s = &recorded.submission;
    let blits: Vec<_> = commands(recorded)
        .into_iter()
        .filter_map(|c| match c {
            Command::StretchBlt(blit) => Some(blit),
            _ => None,
        })
        .collect();
    let shapes: Vec<_> = blits.iter().map(|b| (b.src_width, b.width, b.x)).collect();
    assert_eq!(shapes, [(10176, 10176, 0), (64, 64, 10176)]);

    // The second tile starts at image column 10176.
    let at = (blits[1].data - s.buffer.address) as usize;
    assert_eq!(&s.buffer.data[at..at + 64], &samples[10176..]);
}

#[test]
fn images_the_hardware_cannot_draw_fall_back() {
    let samples = vec![0u8; 200 * 10];
    let clip = ClipState::rect(BAND0);
    let mut host = HostSource::new(HostConfig::default());
    let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
    ctx.band_start(0).unwrap();
    ctx.prepare(&DrawObject::new(ObjectKind::Image, PackedColor::BLACK, clip))
        .unwrap();

    let downscaled = gray_image(&samples, BBox::new(0, 0, 99, 9), 200, 10);
    assert_eq!(ctx.image(&downscaled, &clip).unwrap(), Draw::Fallback);

    let mut rotated = gray_image(&samples, BBox::new(0, 0, 199, 9), 200, 10);
    rotated.orthogonal = false;
    assert_eq!(ctx.image(&rotated, &clip).unwrap(), Draw::Fallback);

    let mut knockout = gray_image(&samples, BBox::new(0, 0, 199, 9), 200, 10);
    knockout.knockout = true;
    assert_eq!(ctx.image(&knockout, &clip).unwrap(), Draw::Fallback);

    let short = gray_image(&samples[..100], BBox::new(0, 0, 199, 9), 200, 10);
    assert_eq!(ctx.image(&short, &clip).unwrap(), Draw::Fallback);

    let drawn = gray_image(&samples, BBox::new(0, 0, 399, 19), 200, 10);
    assert_eq!(ctx.image(&drawn, &clip).unwrap(), Draw::Hardware);
}

#[test]
fn flush_resends_state() {
    let mask = two_column_mask();
    let clip = ClipState::complex(BAND0, ComplexClip::new(5, BBox::new(0, 0, 299, 99), &mask));
    let pattern = checkerboard();
    let mut object = DrawObject::new(ObjectKind::Fill, PackedColor(0x0080_4020), clip);
    object.rop3 = 0xF0;
    object.brush = Some(BrushSpec {
        pattern: Some(&pattern),
        transparent: false,
    });

    let mut host = HostSource::new(HostConfig {
        buffer_size: 6144,
        ..HostConfig::default()
    });
    {
        let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
        ctx.band_start(0).unwrap();
        assert_eq!(ctx.prepare(&object).unwrap(), Draw::Hardware);
        // Alternating extents never coalesce.
        for n in 0..400 {
            let i = n % 4;
            ctx.span(n / 4, i, 290 - i).unwrap();
        }
        ctx.band_finished().unwrap();
        ctx.finish_page().unwrap();
    }

    let submissions = host.submissions();
    assert!(submissions.len() >= 2, "{}", submissions.len());
    let mut runs = 0;
    for recorded in submissions {
        let cmds = commands(recorded);
        let first_run = cmds.iter().position(|c| c.opcode() == Opcode::DrawRunRepeat);
        let Some(first_run) = first_run else {
            continue;
        };
        let state = &cmds[..first_run];
        assert!(state.contains(&Command::SetRop2 {
            rop2: rop3_to_rop2(0xF0)
        }));
        assert!(state.iter().any(|c| matches!(
            c,
            Command::SetBrush(brush) if brush.data != 0 && (brush.width, brush.height) == (2, 2)
        )));
        assert!(state.iter().any(|c| matches!(
            c,
            Command::SetClip(clip) if clip.kind == GIPA2_CLIP_RUN
        )));
        assert_eq!(count(state, Opcode::SetColor), 1);
        runs += count(&cmds, Opcode::DrawRunRepeat);
    }
    assert_eq!(runs, 400);
}

#[test]
fn prepare_that_flushes_still_sends_its_rop() {
    let mask = two_column_mask();
    let mut host = HostSource::new(HostConfig {
        buffer_size: 8192,
        ..HostConfig::default()
    });
    {
        let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
        ctx.band_start(0).unwrap();
        let plain = DrawObject::new(ObjectKind::Fill, PackedColor::BLACK, ClipState::rect(BAND0));
        ctx.prepare(&plain).unwrap();
        let mut n = 0;
        while ctx.buffer().unwrap().free() >= 300 {
            let i = n % 4;
            ctx.span(n / 4 % 100, i, 600 - i).unwrap();
            n += 1;
        }

        let clip = ClipState::complex(BAND0, ComplexClip::new(5, BBox::new(0, 0, 299, 99), &mask));
        let mut object = DrawObject::new(ObjectKind::Fill, PackedColor(0x00FF_FF00), clip);
        object.rop3 = 0x66;
        assert_eq!(ctx.prepare(&object).unwrap(), Draw::Hardware);
        ctx.span(0, 0, 10).unwrap();
        ctx.band_finished().unwrap();
        ctx.finish_page().unwrap();
    }

    let submissions = host.submissions();
    assert_eq!(submissions.len(), 2);
    let cmds = commands(&submissions[1]);
    let first_run = cmds
        .iter()
        .position(|c| c.opcode() == Opcode::DrawRunRepeat)
        .unwrap();
    let state = &cmds[..first_run];
    assert!(state.contains(&Command::SetRop2 {
        rop2: rop3_to_rop2(0x66)
    }));
    assert_eq!(count(state, Opcode::SetClip), 1);
}

#[test]
fn empty_blocks_draw_nothing() {
    let mut host = HostSource::new(HostConfig::default());
    {
        let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
        ctx.band_start(0).unwrap();
        ctx.prepare(&DrawObject::new(ObjectKind::Fill, PackedColor::BLACK, ClipState::rect(BAND0)))
            .unwrap();
        ctx.block(20, 19, 0, 10).unwrap();
        ctx.span(20, 10, 9).unwrap();
        ctx.block(20, 21, 0, 10).unwrap();
        ctx.band_finished().unwrap();
        ctx.finish_page().unwrap();
    }

    let runs: Vec<_> = commands(&host.submissions()[0])
        .into_iter()
        .filter_map(|c| match c {
            Command::RunRepeat(run) => Some((run.y, run.rows)),
            _ => None,
        })
        .collect();
    assert_eq!(runs, [(20, 2)]);
}

fn deferred(buffer_size: usize) -> HostConfig {
    HostConfig {
        buffer_size,
        options: HwaOptions {
            flags: HwaFlags::DEFER,
            ..HwaOptions::default()
        },
        ..HostConfig::default()
    }
}

#[test]
fn deferred_setup_shares_tables_between_bands() {
    let mut host = HostSource::new(deferred(1 << 20));
    {
        let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
        for band in 0..2 {
            ctx.band_start(band).unwrap();
            ctx.band_finished().unwrap();
        }
        ctx.finish_page().unwrap();
    }

    assert_eq!(host.submissions().len(), 1);
    let cells: Vec<_> = commands(&host.submissions()[0])
        .into_iter()
        .filter_map(|c| match c {
            Command::SetDitherStretchBlt(d) => Some(d.cells[0].cell),
            _ => None,
        })
        .collect();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[0], cells[1]);
}

#[test]
fn deferred_setup_is_sized_before_the_band_opens() {
    // Room for the band header and headroom, but not for the fake dither table as well.
    let mut host = HostSource::new(deferred(3000));
    let mut ctx = HwaContext::new(&mut host, TOKEN, PAGE).unwrap();
    let err = ctx.band_start(0).unwrap_err();
    assert!(matches!(err, HwaError::LimitCheck { .. }), "{err:?}");
}
