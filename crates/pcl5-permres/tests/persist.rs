use pcl5_permres::{
    load_all, store_all, DirStore, MacroData, MacroResource, MemoryStore, PatternResource,
    Resource, ResourceDetail, ResourceKind, ResourceStore, MACRO_NUMERIC_UNDEFINED,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn named_macro(name: &str, body: &[u8]) -> Resource {
    Resource::Macro(MacroResource {
        detail: ResourceDetail {
            kind: ResourceKind::Macro,
            numeric_id: MACRO_NUMERIC_UNDEFINED,
            string_id: name.as_bytes().to_vec(),
            permanent: true,
        },
        data: MacroData::from(body),
    })
}

fn udp(id: u16, color: bool) -> Resource {
    let (bits_per_pixel, width) = if color { (8, 4) } else { (1, 12) };
    let stride = if color { 4 } else { 2 };
    Resource::Pattern(PatternResource {
        detail: ResourceDetail::numbered(ResourceKind::Udp, id),
        width,
        height: 3,
        x_dpi: 300,
        y_dpi: 300,
        color,
        bits_per_pixel,
        stride,
        data: (0..3 * stride).map(|i| (i * 17) as u8).collect(),
    })
}

fn round_trip(store: &mut dyn ResourceStore) {
    let long_body: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    let macros = vec![
        named_macro("HEADER", b"\x1b&l0O\x1b(s0p12h10v0s0b3T"),
        named_macro("", &long_body),
        Resource::Macro(MacroResource {
            detail: ResourceDetail::numbered(ResourceKind::Macro, 42),
            data: MacroData::new(),
        }),
    ];
    let patterns = vec![udp(1, false), udp(2, true)];

    assert_eq!(store_all(store, ResourceKind::Macro, &macros).unwrap(), 3);
    assert_eq!(store_all(store, ResourceKind::Udp, &patterns).unwrap(), 2);

    assert_eq!(load_all(store, ResourceKind::Macro).unwrap(), macros);
    assert_eq!(load_all(store, ResourceKind::Udp).unwrap(), patterns);
}

#[test]
fn memory_store_round_trip() {
    round_trip(&mut MemoryStore::new());
}

#[test]
fn directory_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    round_trip(&mut DirStore::create(dir.path()).unwrap());

    // A fresh store over the same directory sees what the first one wrote.
    let mut reopened = DirStore::create(dir.path()).unwrap();
    assert_eq!(load_all(&mut reopened, ResourceKind::Udp).unwrap().len(), 2);
}

#[test]
fn storing_replaces_the_previous_family() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DirStore::create(dir.path()).unwrap();
    store_all(&mut store, ResourceKind::Udp, &[udp(1, false), udp(2, false)]).unwrap();
    store_all(&mut store, ResourceKind::Udp, &[udp(3, true)]).unwrap();
    assert_eq!(
        load_all(&mut store, ResourceKind::Udp).unwrap(),
        [udp(3, true)]
    );
}

#[test]
fn cleared_store_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DirStore::create(dir.path()).unwrap();
    store_all(&mut store, ResourceKind::Macro, &[named_macro("A", b"x")]).unwrap();
    store.clear().unwrap();
    assert_eq!(load_all(&mut store, ResourceKind::Macro).unwrap(), Vec::<Resource>::new());
}

proptest! {
    #[test]
    fn macros_survive_persistence(
        bodies in proptest::collection::vec(
            (proptest::collection::vec(any::<u8>(), 0..40), proptest::collection::vec(any::<u8>(), 0..2100)),
            0..5,
        )
    ) {
        let macros: Vec<Resource> = bodies
            .iter()
            .enumerate()
            .map(|(i, (name, body))| Resource::Macro(MacroResource {
                detail: ResourceDetail {
                    kind: ResourceKind::Macro,
                    numeric_id: i as u16,
                    string_id: name.clone(),
                    permanent: true,
                },
                data: MacroData::from(body.as_slice()),
            }))
            .collect();
        let mut store = MemoryStore::new();
        store_all(&mut store, ResourceKind::Macro, &macros).unwrap();
        prop_assert_eq!(load_all(&mut store, ResourceKind::Macro).unwrap(), macros);
    }
}
