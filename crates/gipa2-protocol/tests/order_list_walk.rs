use gipa2_protocol::{
    walk, BandInit, BitDepth, Command, CommandLayout, Opcode, Planes, ProtocolError, RunRepeat,
    SetColor,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const BASE: u32 = 0x0080_0000;

fn push(buf: &mut Vec<u8>, cmd: Command) -> usize {
    let offset = buf.len();
    buf.extend_from_slice(&cmd.to_vec().unwrap());
    offset
}

fn pad_to_16(buf: &mut Vec<u8>) {
    while buf.len() % 16 != 0 {
        buf.push(0);
    }
}

fn band_init(offset: u32) -> Command {
    Command::BandInit(BandInit {
        planes: Planes::CMYK,
        bit_depth: BitDepth::One,
        pixels: 640,
        bytes: 80,
        rows: 64,
        page_width: 640,
        page_height: 480,
        offset,
        bands: [0x0300_0000, 0x0400_0000, 0x0100_0000, 0x0200_0000],
    })
}

/// Two band blocks, the second linked from the first head.
fn two_block_list() -> Vec<u8> {
    let mut buf = Vec::new();
    let head0 = push(&mut buf, Command::ComHead { next: 0 });
    push(&mut buf, band_init(0));
    push(&mut buf, Command::SetRop2 { rop2: 0xCC });
    push(&mut buf, Command::BandDma);
    push(&mut buf, Command::ComBlockEnd);
    pad_to_16(&mut buf);

    let head1 = push(&mut buf, Command::ComHead { next: 0 });
    let link = BASE + head1 as u32;
    buf[head0 + 4..head0 + 8].copy_from_slice(&link.to_be_bytes());
    push(&mut buf, band_init(64));
    push(
        &mut buf,
        Command::SetColor(SetColor {
            fore: [0x10, 0x20, 0x30, 0x40],
            back: None,
        }),
    );
    push(&mut buf, Command::BandDma);
    push(&mut buf, Command::ComBlockEnd);
    buf
}

#[test]
fn walks_linked_blocks_in_chain_order() {
    let buf = two_block_list();
    let opcodes: Vec<Opcode> = walk(&buf, BASE)
        .map(|step| step.unwrap().layout.opcode)
        .collect();

    assert_eq!(
        opcodes,
        vec![
            Opcode::ComHead,
            Opcode::BandInit,
            Opcode::SetRop2,
            Opcode::BandDma,
            Opcode::ComBlockEnd,
            Opcode::ComHead,
            Opcode::BandInit,
            Opcode::SetColor,
            Opcode::BandDma,
            Opcode::ComBlockEnd,
        ]
    );
}

#[test]
fn decodes_every_step() {
    let buf = two_block_list();
    let commands: Vec<Command> = walk(&buf, BASE)
        .map(|step| {
            let step = step.unwrap();
            Command::decode(&buf[step.offset..]).unwrap()
        })
        .collect();

    assert_eq!(commands[1], band_init(0));
    assert_eq!(commands[6], band_init(64));
    assert_eq!(
        commands[7],
        Command::SetColor(SetColor {
            fore: [0x10, 0x20, 0x30, 0x40],
            back: None,
        })
    );
}

#[test]
fn link_outside_buffer_is_rejected() {
    let mut buf = two_block_list();
    buf[4..8].copy_from_slice(&(BASE + 0x10_0000).to_be_bytes());

    let last = walk(&buf, BASE).last().unwrap();
    assert_eq!(
        last,
        Err(ProtocolError::BadLink {
            address: BASE + 0x10_0000
        })
    );
}

#[test]
fn unknown_opcode_reports_offset() {
    let mut buf = Vec::new();
    push(&mut buf, Command::ComHead { next: 0 });
    buf.extend_from_slice(&[0x60, 0, 0, 0]);

    let result: Result<Vec<_>, _> = walk(&buf, BASE).collect();
    assert_eq!(
        result,
        Err(ProtocolError::UnknownOpcode {
            opcode: 0x60,
            offset: 16
        })
    );
}

proptest! {
    #[test]
    fn run_repeat_form_matches_layout_probe(
        wide in any::<bool>(),
        y in -32768i32..=32767,
        x0 in -32768i32..=32767,
        len in 0i32..=1000,
        rows in 1u32..=65535,
    ) {
        let x1 = (x0 + len).min(32767);
        let cmd = Command::RunRepeat(RunRepeat { wide, planes: Planes::CMYK, y, x0, x1, rows });
        let bytes = cmd.to_vec().unwrap();
        let layout = CommandLayout::probe(&bytes).unwrap();
        prop_assert_eq!(layout.size_bytes, bytes.len());
        prop_assert_eq!(Command::decode(&bytes).unwrap(), cmd);
    }
}
