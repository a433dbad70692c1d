use gipa2_protocol::{walk, Command, SetBrush};
use hwa_orderlist::{
    BBox, BrushPattern, BrushSpec, ClipState, DrawObject, HostConfig, HostSource, HwaContext,
    ObjectKind, PackedColor, PageSetup, PageToken, PATTERN_BYTES,
};
use pcl5_permres::{
    load_all, store_all, DirStore, PatternResource, Resource, ResourceDetail, ResourceKind,
};
use pretty_assertions::assert_eq;

const PAGE: PageSetup = PageSetup {
    width: 256,
    height: 64,
    band_height: 64,
};

/// An 8x4 black and white user pattern: a checkerboard of 2x2 cells.
fn checkerboard(id: u16) -> PatternResource {
    PatternResource {
        detail: ResourceDetail::numbered(ResourceKind::Udp, id),
        width: 8,
        height: 4,
        x_dpi: 300,
        y_dpi: 300,
        color: false,
        bits_per_pixel: 1,
        stride: 1,
        data: vec![0b1100_1100, 0b1100_1100, 0b0011_0011, 0b0011_0011],
    }
}

/// Unpacks a 1-bit user pattern, leftmost pixel in the high bit, into a hardware brush.
fn brush(p: &PatternResource) -> BrushPattern {
    let (w, h) = (usize::from(p.width), usize::from(p.height));
    let stride = usize::from(p.stride);
    let pixels = (0..h)
        .flat_map(|y| (0..w).map(move |x| (y, x)))
        .map(|(y, x)| (p.data[y * stride + x / 8] >> (7 - x % 8)) & 1)
        .collect();
    BrushPattern {
        id: u64::from(p.detail.numeric_id),
        width: p.width as u8,
        height: p.height as u8,
        pixels,
    }
}

#[test]
fn persisted_user_pattern_becomes_a_hardware_brush() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = DirStore::create(dir.path()).unwrap();
        let stored = Resource::Pattern(checkerboard(12));
        store_all(&mut store, ResourceKind::Udp, [&stored]).unwrap();
    }

    // A later job picks the pattern up from the same directory.
    let mut store = DirStore::create(dir.path()).unwrap();
    let loaded = load_all(&mut store, ResourceKind::Udp).unwrap();
    let [Resource::Pattern(udp)] = loaded.as_slice() else {
        panic!("expected one pattern, got {loaded:?}");
    };
    assert_eq!(udp, &checkerboard(12));
    let pattern = brush(udp);

    let mut host = HostSource::new(HostConfig::default());
    {
        let mut ctx = HwaContext::new(&mut host, PageToken { job: 1, page: 1 }, PAGE).unwrap();
        ctx.band_start(0).unwrap();
        let clip = ClipState::rect(BBox::new(0, 0, 255, 63));
        for transparent in [false, true] {
            let mut object = DrawObject::new(ObjectKind::Fill, PackedColor::BLACK, clip);
            object.rop3 = 0xF0;
            object.brush = Some(BrushSpec {
                pattern: Some(&pattern),
                transparent,
            });
            ctx.prepare(&object).unwrap();
            ctx.block(0, 31, 0, 255).unwrap();
        }
        ctx.band_finished().unwrap();
        ctx.finish_page().unwrap();
    }

    let recorded = &host.submissions()[0];
    let s = &recorded.submission;
    let cmds = s.commands();
    let brushes: Vec<SetBrush> = walk(cmds, s.buffer.address)
        .filter_map(|step| match Command::decode(&cmds[step.unwrap().offset..]).unwrap() {
            Command::SetBrush(b) => Some(b),
            _ => None,
        })
        .collect();
    assert_eq!(brushes.len(), 2);
    assert_eq!((brushes[0].width, brushes[0].height), (8, 4));
    // Both objects share one pattern asset.
    assert_eq!(brushes[0].data, brushes[1].data);
    assert_ne!(brushes[0].flags, brushes[1].flags);

    let mut mask = vec![0u8; PATTERN_BYTES];
    pattern.write_mask(&mut mask);
    // Mask rows are eight bytes apart, leftmost pixel in bit 0.
    assert_eq!([mask[0], mask[8], mask[16], mask[24]], [0x33, 0x33, 0xCC, 0xCC]);
    let at = (brushes[0].data - s.buffer.address) as usize;
    assert_eq!(&s.buffer.data[at..at + PATTERN_BYTES], mask.as_slice());
}
