//! Record layouts for persisted macros and user-defined patterns.
//!
//! Every record is a little-endian header followed by its payload. A family's stream is its
//! records back to back with nothing in between.

use crate::error::{PermResError, Result};
use crate::resource::{
    MacroData, MacroResource, Operation, PatternResource, Resource, ResourceDetail, ResourceKind,
    MACRO_DATA_BLOCK_SIZE, MAX_STRING_ID_LENGTH,
};
use crate::transfer::{ResourceStore, Transfer};

/// `id:u16 name_len:u16 data_len:u32`.
pub const MACRO_HEADER_LEN: usize = 8;

/// `id width height x_dpi y_dpi:u16 color:u8 bpp:u8 stride:u16`.
pub const PATTERN_HEADER_LEN: usize = 14;

const MACRO_NAME_LEN: usize = 2;
const MACRO_DATA_LEN: usize = 4;

const PATTERN_WIDTH: usize = 2;
const PATTERN_HEIGHT: usize = 4;
const PATTERN_X_DPI: usize = 6;
const PATTERN_Y_DPI: usize = 8;
const PATTERN_COLOR: usize = 10;
const PATTERN_BPP: usize = 11;
const PATTERN_STRIDE: usize = 12;

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn send(t: &mut dyn Transfer, record: &'static str, buf: &mut [u8]) -> Result<()> {
    let moved = t.transfer(buf);
    if moved != buf.len() {
        return Err(PermResError::Short {
            record,
            wanted: buf.len(),
            moved,
        });
    }
    Ok(())
}

/// Fills `buf`, or reports how far the stream got.
fn receive(t: &mut dyn Transfer, record: &'static str, buf: &mut [u8]) -> Result<()> {
    send(t, record, buf)
}

/// Reads a header, telling a clean end of stream apart from a cut one.
fn receive_header(t: &mut dyn Transfer, record: &'static str, buf: &mut [u8]) -> Result<bool> {
    match t.transfer(buf) {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        moved => Err(PermResError::Short {
            record,
            wanted: buf.len(),
            moved,
        }),
    }
}

fn narrow<T: TryFrom<usize>>(field: &'static str, value: usize) -> Result<T> {
    T::try_from(value).map_err(|_| PermResError::TooLarge { field, value })
}

pub fn store_macro(t: &mut dyn Transfer, m: &MacroResource) -> Result<()> {
    let name = &m.detail.string_id;
    if name.len() > MAX_STRING_ID_LENGTH {
        return Err(PermResError::TooLarge {
            field: "macro name",
            value: name.len(),
        });
    }
    let data_len: u32 = narrow("macro data", m.data.len())?;

    let mut header = [0u8; MACRO_HEADER_LEN];
    put_u16(&mut header, 0, m.detail.numeric_id);
    put_u16(&mut header, MACRO_NAME_LEN, name.len() as u16);
    header[MACRO_DATA_LEN..].copy_from_slice(&data_len.to_le_bytes());
    send(t, "macro header", &mut header)?;

    if !name.is_empty() {
        send(t, "macro name", &mut name.clone())?;
    }
    for chunk in m.data.chunks() {
        send(t, "macro data", &mut chunk.to_vec())?;
    }
    Ok(())
}

/// Reads the next macro, or `None` at a clean end of stream.
///
/// A name longer than PCL5 allows is read in full and cut to the first
/// [`MAX_STRING_ID_LENGTH`] bytes.
pub fn load_macro(t: &mut dyn Transfer) -> Result<Option<MacroResource>> {
    let mut header = [0u8; MACRO_HEADER_LEN];
    if !receive_header(t, "macro header", &mut header)? {
        return Ok(None);
    }
    let numeric_id = u16_at(&header, 0);
    let name_len = usize::from(u16_at(&header, MACRO_NAME_LEN));
    let data_len = u32::from_le_bytes([
        header[MACRO_DATA_LEN],
        header[MACRO_DATA_LEN + 1],
        header[MACRO_DATA_LEN + 2],
        header[MACRO_DATA_LEN + 3],
    ]) as usize;

    let mut string_id = vec![0u8; name_len];
    receive(t, "macro name", &mut string_id)?;
    if name_len > MAX_STRING_ID_LENGTH {
        tracing::warn!(numeric_id, name_len, "macro name truncated");
        string_id.truncate(MAX_STRING_ID_LENGTH);
    }

    let mut data = MacroData::new();
    let mut block = [0u8; MACRO_DATA_BLOCK_SIZE];
    let mut left = data_len;
    while left > 0 {
        let n = left.min(MACRO_DATA_BLOCK_SIZE);
        receive(t, "macro data", &mut block[..n])?;
        data.extend_from_slice(&block[..n]);
        left -= n;
    }

    Ok(Some(MacroResource {
        detail: ResourceDetail {
            kind: ResourceKind::Macro,
            numeric_id,
            string_id,
            permanent: true,
        },
        data,
    }))
}

pub fn store_pattern(t: &mut dyn Transfer, p: &PatternResource) -> Result<()> {
    if p.data.len() != p.data_len() {
        return Err(PermResError::PatternData {
            len: p.data.len(),
            height: usize::from(p.height),
            stride: usize::from(p.stride),
        });
    }

    let mut header = [0u8; PATTERN_HEADER_LEN];
    put_u16(&mut header, 0, p.detail.numeric_id);
    put_u16(&mut header, PATTERN_WIDTH, p.width);
    put_u16(&mut header, PATTERN_HEIGHT, p.height);
    put_u16(&mut header, PATTERN_X_DPI, p.x_dpi);
    put_u16(&mut header, PATTERN_Y_DPI, p.y_dpi);
    header[PATTERN_COLOR] = u8::from(p.color);
    header[PATTERN_BPP] = p.bits_per_pixel;
    put_u16(&mut header, PATTERN_STRIDE, p.stride);
    send(t, "pattern header", &mut header)?;

    if !p.data.is_empty() {
        send(t, "pattern data", &mut p.data.clone())?;
    }
    Ok(())
}

/// Reads the next user-defined pattern, or `None` at a clean end of stream.
pub fn load_pattern(t: &mut dyn Transfer) -> Result<Option<PatternResource>> {
    let mut header = [0u8; PATTERN_HEADER_LEN];
    if !receive_header(t, "pattern header", &mut header)? {
        return Ok(None);
    }
    let mut p = PatternResource {
        detail: ResourceDetail::numbered(ResourceKind::Udp, u16_at(&header, 0)),
        width: u16_at(&header, PATTERN_WIDTH),
        height: u16_at(&header, PATTERN_HEIGHT),
        x_dpi: u16_at(&header, PATTERN_X_DPI),
        y_dpi: u16_at(&header, PATTERN_Y_DPI),
        color: header[PATTERN_COLOR] != 0,
        bits_per_pixel: header[PATTERN_BPP],
        stride: u16_at(&header, PATTERN_STRIDE),
        data: Vec::new(),
    };
    p.data = vec![0; p.data_len()];
    receive(t, "pattern data", &mut p.data)?;
    Ok(Some(p))
}

fn store_one(t: &mut dyn Transfer, resource: &Resource) -> Result<()> {
    match resource {
        Resource::Macro(m) => store_macro(t, m),
        Resource::Pattern(p) => store_pattern(t, p),
    }
}

fn load_one(t: &mut dyn Transfer, kind: ResourceKind) -> Result<Option<Resource>> {
    match kind {
        ResourceKind::Macro => Ok(load_macro(t)?.map(Resource::Macro)),
        ResourceKind::Udp => Ok(load_pattern(t)?.map(Resource::Pattern)),
        ResourceKind::Font | ResourceKind::SymbolSet => Err(PermResError::Unsupported { kind }),
    }
}

fn check_kind(kind: ResourceKind) -> Result<()> {
    match kind {
        ResourceKind::Macro | ResourceKind::Udp => Ok(()),
        _ => Err(PermResError::Unsupported { kind }),
    }
}

/// Replaces the persisted `kind` family with the permanent resources of that kind.
///
/// Returns how many records were written.
pub fn store_all<'r, S, I>(store: &mut S, kind: ResourceKind, resources: I) -> Result<usize>
where
    S: ResourceStore + ?Sized,
    I: IntoIterator<Item = &'r Resource>,
{
    check_kind(kind)?;
    let mut t = store.start(kind, Operation::Store)?;
    let mut stored = 0;
    for resource in resources {
        let detail = resource.detail();
        if detail.kind != kind || !detail.permanent {
            continue;
        }
        store_one(t.as_mut(), resource)?;
        stored += 1;
    }
    t.finish()?;
    tracing::debug!(?kind, stored, "stored permanent resources");
    Ok(stored)
}

/// Reads back every record of the `kind` family.
///
/// A record cut short at the end of the stream is dropped with a warning; the records before
/// it are kept.
pub fn load_all<S>(store: &mut S, kind: ResourceKind) -> Result<Vec<Resource>>
where
    S: ResourceStore + ?Sized,
{
    check_kind(kind)?;
    let mut t = store.start(kind, Operation::Load)?;
    let mut out = Vec::new();
    loop {
        match load_one(t.as_mut(), kind) {
            Ok(Some(resource)) => out.push(resource),
            Ok(None) => break,
            Err(PermResError::Short {
                record,
                wanted,
                moved,
            }) => {
                tracing::warn!(?kind, record, wanted, moved, "dropping truncated record");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    t.finish()?;
    tracing::debug!(?kind, loaded = out.len(), "loaded permanent resources");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::MemoryStore;
    use pretty_assertions::assert_eq;

    fn pattern(id: u16, height: u16, stride: u16) -> PatternResource {
        PatternResource {
            detail: ResourceDetail::numbered(ResourceKind::Udp, id),
            width: stride * 8,
            height,
            x_dpi: 300,
            y_dpi: 600,
            color: false,
            bits_per_pixel: 1,
            stride,
            data: (0..height * stride).map(|i| i as u8).collect(),
        }
    }

    #[test]
    fn macro_header_layout() {
        let m = MacroResource {
            detail: ResourceDetail {
                kind: ResourceKind::Macro,
                numeric_id: 0x1234,
                string_id: b"LOGO".to_vec(),
                permanent: true,
            },
            data: MacroData::from(&b"\x1b*c"[..]),
        };
        let mut store = MemoryStore::new();
        store_all(&mut store, ResourceKind::Macro, [&Resource::Macro(m)]).unwrap();
        assert_eq!(
            store.bytes(ResourceKind::Macro),
            *b"\x34\x12\x04\x00\x03\x00\x00\x00LOGO\x1b*c"
        );
    }

    #[test]
    fn pattern_header_layout() {
        let mut p = pattern(7, 1, 2);
        p.color = true;
        p.bits_per_pixel = 8;
        p.width = 2;
        let mut store = MemoryStore::new();
        store_all(&mut store, ResourceKind::Udp, [&Resource::Pattern(p)]).unwrap();
        assert_eq!(
            store.bytes(ResourceKind::Udp),
            [7u8, 0, 2, 0, 1, 0, 0x2c, 0x01, 0x58, 0x02, 1, 8, 2, 0, 0, 1]
        );
    }

    #[test]
    fn width_is_read_from_its_own_field() {
        let mut store = MemoryStore::new();
        let mut p = pattern(3, 2, 1);
        p.width = 5;
        store_all(&mut store, ResourceKind::Udp, [&Resource::Pattern(p.clone())]).unwrap();
        let loaded = load_all(&mut store, ResourceKind::Udp).unwrap();
        assert_eq!(loaded, [Resource::Pattern(p)]);
    }

    #[test]
    fn oversized_names_are_cut_on_load() {
        let name = vec![b'n'; 300];
        let mut bytes = vec![9, 0];
        bytes.extend_from_slice(&300u16.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(b"ab");
        // The next record must still line up.
        bytes.extend_from_slice(&[10, 0, 0, 0, 1, 0, 0, 0, b'c']);

        let mut store = MemoryStore::new();
        store.insert(ResourceKind::Macro, bytes);
        let loaded = load_all(&mut store, ResourceKind::Macro).unwrap();
        let [Resource::Macro(first), Resource::Macro(second)] = loaded.as_slice() else {
            panic!("expected two macros, got {loaded:?}");
        };
        assert_eq!(first.detail.string_id.len(), MAX_STRING_ID_LENGTH);
        assert_eq!(first.data.to_vec(), b"ab");
        assert_eq!(second.detail.numeric_id, 10);
        assert_eq!(second.data.to_vec(), b"c");
    }

    #[test]
    fn oversized_names_are_refused_on_store() {
        let m = MacroResource {
            detail: ResourceDetail {
                kind: ResourceKind::Macro,
                numeric_id: 1,
                string_id: vec![b'x'; MAX_STRING_ID_LENGTH + 1],
                permanent: true,
            },
            data: MacroData::new(),
        };
        let mut store = MemoryStore::new();
        let err = store_all(&mut store, ResourceKind::Macro, [&Resource::Macro(m)]).unwrap_err();
        assert!(matches!(err, PermResError::TooLarge { value: 254, .. }), "{err}");
    }

    #[test]
    fn truncated_trailing_record_is_dropped() {
        let mut store = MemoryStore::new();
        let p = pattern(1, 2, 2);
        store_all(&mut store, ResourceKind::Udp, [&Resource::Pattern(p.clone())]).unwrap();
        let mut bytes = store.bytes(ResourceKind::Udp).to_vec();
        bytes.extend_from_slice(&[2, 0, 8, 0, 4]);
        store.insert(ResourceKind::Udp, bytes);

        assert_eq!(
            load_all(&mut store, ResourceKind::Udp).unwrap(),
            [Resource::Pattern(p)]
        );
    }

    #[test]
    fn mismatched_pattern_data_is_refused() {
        let mut p = pattern(1, 2, 2);
        p.data.pop();
        let mut store = MemoryStore::new();
        let err = store_all(&mut store, ResourceKind::Udp, [&Resource::Pattern(p)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pattern data holds 3 bytes, 2 rows of 2 need 4"
        );
    }

    #[test]
    fn temporary_and_foreign_resources_are_skipped() {
        let mut temporary = pattern(1, 1, 1);
        temporary.detail.permanent = false;
        let m = Resource::Macro(MacroResource {
            detail: ResourceDetail::numbered(ResourceKind::Macro, 4),
            data: MacroData::new(),
        });
        let mut store = MemoryStore::new();
        let stored = store_all(
            &mut store,
            ResourceKind::Udp,
            [&Resource::Pattern(temporary), &m],
        )
        .unwrap();
        assert_eq!(stored, 0);
        assert_eq!(store.bytes(ResourceKind::Udp), &[] as &[u8]);
    }

    #[test]
    fn fonts_have_no_record_format() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            load_all(&mut store, ResourceKind::Font),
            Err(PermResError::Unsupported {
                kind: ResourceKind::Font
            })
        ));
    }
}
