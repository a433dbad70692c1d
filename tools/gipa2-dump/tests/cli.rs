#![cfg(not(target_arch = "wasm32"))]

use std::fs;

use assert_cmd::Command;
use gipa2_protocol::{Command as Gipa2Command, SetColor};
use predicates::prelude::*;
use tempfile::tempdir;

fn gipa2_dump() -> Command {
    Command::cargo_bin("gipa2-dump").unwrap()
}

#[test]
fn decodes_a_raw_order_list() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("list.bin");
    let mut list = Gipa2Command::ComHead { next: 0 }.to_vec().unwrap();
    list.extend(
        Gipa2Command::SetColor(SetColor {
            fore: [1, 2, 3, 4],
            back: None,
        })
        .to_vec()
        .unwrap(),
    );
    list.extend(Gipa2Command::ComBlockEnd.to_vec().unwrap());
    fs::write(&path, &list).unwrap();

    gipa2_dump()
        .args(["decode", "--base", "0x10000000"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("10000000 COM_HEAD"))
        .stdout(predicate::str::contains("10000010 SET_COLOR"))
        .stdout(predicate::str::contains("COM_BLOCK_END"));
}

#[test]
fn demo_dumps_decode_back() {
    let dir = tempdir().unwrap();
    gipa2_dump()
        .args(["demo", "--fpga", "--job", "3", "--out"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("page 1 buffer 01: bands 0..=0"))
        .stdout(predicate::str::contains("page 1 buffer 04: bands 3..=3"))
        .stdout(predicate::str::contains("DRAW_RUN_REPEAT"));

    let name = "j_3_p01_w1024_h512_d1_c01";
    let head = fs::read_to_string(dir.path().join(format!("OLHead{name}"))).unwrap();
    assert_eq!(head.lines().next(), Some("0000000f"));
    assert!(dir.path().join(format!("OLWork{name}")).exists());

    // FPGA buffers are relocated to the rig's command area.
    gipa2_dump()
        .args(["decode", "--hex", "--base", "800000"])
        .arg(dir.path().join(format!("OL{name}")))
        .assert()
        .success()
        .stdout(predicate::str::contains("BAND_INIT"))
        .stdout(predicate::str::contains("DRAW_STRETCHBLT"))
        .stdout(predicate::str::contains("COM_BLOCK_END"));
}

#[test]
fn skipped_band_splits_the_page() {
    gipa2_dump()
        .args(["demo", "--skip-band", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bands 0..=1 commands"))
        .stdout(predicate::str::contains("bands 3..=3 commands"));
}

#[test]
fn garbage_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.txt");
    fs::write(&path, "not hex\n").unwrap();
    gipa2_dump()
        .args(["decode", "--hex"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse"));
}
