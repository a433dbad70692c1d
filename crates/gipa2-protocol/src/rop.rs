/// ROP2 value for ROP3 codes the hardware cannot express. Never equal to a real ROP2.
pub const ROP2_INVALID: u8 = 1;

const fn build_rop3_table() -> [u8; 256] {
    let mut t = [ROP2_INVALID; 256];
    t[0x00] = 0x00;
    t[0x77] = 0x11;
    t[0x5F] = 0x11;
    t[0xBB] = 0x22;
    t[0xAF] = 0x22;
    t[0x33] = 0x33;
    t[0x0F] = 0x33;
    t[0xDD] = 0x44;
    t[0xF5] = 0x44;
    t[0x55] = 0x55;
    t[0x99] = 0x66;
    t[0xA5] = 0x66;
    t[0x11] = 0x77;
    t[0x05] = 0x77;
    t[0xEE] = 0x88;
    t[0xFA] = 0x88;
    t[0x66] = 0x99;
    t[0x5A] = 0x99;
    t[0xAA] = 0xAA;
    t[0x22] = 0xBB;
    t[0x0A] = 0xBB;
    t[0xCC] = 0xCC;
    t[0xF0] = 0xCC;
    t[0x44] = 0xDD;
    t[0x50] = 0xDD;
    t[0x88] = 0xEE;
    t[0xA0] = 0xEE;
    t[0xFF] = 0xFF;
    t
}

/// ROP3 to ROP2 translation. Source and pattern forms of the same boolean map to one ROP2.
pub const ROP3_TO_ROP2: [u8; 256] = build_rop3_table();

pub const fn rop3_to_rop2(rop3: u8) -> u8 {
    ROP3_TO_ROP2[rop3 as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_and_pattern_copies_agree() {
        assert_eq!(rop3_to_rop2(0xCC), 0xCC);
        assert_eq!(rop3_to_rop2(0xF0), 0xCC);
        assert_eq!(rop3_to_rop2(0x00), 0x00);
        assert_eq!(rop3_to_rop2(0xFF), 0xFF);
        assert_eq!(rop3_to_rop2(0xA5), 0x66);
    }

    #[test]
    fn unsupported_codes_are_invalid() {
        let supported = ROP3_TO_ROP2.iter().filter(|&&r| r != ROP2_INVALID).count();
        assert_eq!(supported, 28);
        assert_eq!(rop3_to_rop2(0xB8), ROP2_INVALID);
    }
}
