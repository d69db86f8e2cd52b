//! Integration tests for the store: definitions, strided element access,
//! growable tables, attributes, byte order and catalog enumeration.

use nefis::format::{Endian, FileKind, FormatVersion};
use nefis::{
    AccessMode, AttributeKind, AttributeValue, Coding, ElementType, FieldDef, Selector, Store,
    StoreConfig, TableDef,
};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn paths(dir: &TempDir, stem: &str) -> (PathBuf, PathBuf) {
    (
        dir.path().join(format!("{stem}.dat")),
        dir.path().join(format!("{stem}.def")),
    )
}

fn create(dir: &TempDir, stem: &str, coding: Coding) -> Store {
    let (dat, def) = paths(dir, stem);
    Store::create_or_open(dat, def, coding, AccessMode::Create).unwrap()
}

fn read_raw(path: &Path, offset: u64, len: usize) -> Vec<u8> {
    let mut file = OpenOptions::new().read(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).unwrap();
    buf
}

fn write_raw(path: &Path, offset: u64, data: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(data).unwrap();
}

/// Defines a one-field record, a table over it and one instance.
fn define_table(store: &mut Store, name: &str, field: FieldDef, dims: &[u32]) {
    let field_name = field.name.clone();
    store.define_field(&field).unwrap();
    store.define_record(name, &[field_name.as_str()]).unwrap();
    store
        .define_table_def(&TableDef::new(name, name, dims))
        .unwrap();
    store.define_instance(name, name).unwrap();
}

// ============================================================================
// Element round trips
// ============================================================================

#[test]
fn test_round_trip_every_element_type() {
    for coding in [Coding::Little, Coding::Big] {
        let dir = TempDir::new().unwrap();
        let mut store = create(&dir, "types", coding);

        let cases = [
            ("I2", ElementType::Integer, 2),
            ("I4", ElementType::Integer, 4),
            ("I8", ElementType::Integer, 8),
            ("R4", ElementType::Real, 4),
            ("R8", ElementType::Real, 8),
            ("C5", ElementType::Character, 5),
            ("L2", ElementType::Logical, 2),
            ("L4", ElementType::Logical, 4),
            ("X8", ElementType::Complex, 8),
            ("X16", ElementType::Complex, 16),
        ];
        let mut names = Vec::new();
        for (name, ty, bytes) in cases {
            store
                .define_field(&FieldDef::new(name, ty, bytes).with_dims(&[3]))
                .unwrap();
            names.push(name);
        }
        store.define_record("ALL", &names).unwrap();
        store
            .define_table_def(&TableDef::new("all", "ALL", &[2, 0]))
            .unwrap();
        store.define_instance("all", "all").unwrap();

        for (seed, (name, _, bytes)) in cases.iter().enumerate() {
            // Two records of the fixed axis times two growable slices.
            let len = 3 * *bytes as usize * 4;
            let data: Vec<u8> = (0..len).map(|i| (i * 7 + seed * 13) as u8).collect();
            let selectors = [Selector::range(1, 2), Selector::range(1, 2)];
            store.put("all", name, &selectors, &[1, 2], &data).unwrap();
            let back = store.get("all", name, &selectors, &[1, 2]).unwrap();
            assert_eq!(back, data, "{name} with {coding:?}");
        }
        store.close().unwrap();
    }
}

#[test]
fn test_typed_values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let (dat, def) = paths(&dir, "typed");
    {
        let mut store = Store::create_or_open(&dat, &def, Coding::Big, AccessMode::Create).unwrap();
        define_table(
            &mut store,
            "levels",
            FieldDef::new("LEVEL", ElementType::Real, 8),
            &[4],
        );
        store
            .put_values("levels", "LEVEL", &[Selector::range(1, 4)], &[1], &[1.0f64, -2.5, 3.25, 1e300])
            .unwrap();
        store.close().unwrap();
    }

    let mut store = Store::create_or_open(&dat, &def, Coding::Little, AccessMode::ReadOnly).unwrap();
    let values: Vec<f64> = store
        .get_values("levels", "LEVEL", &[Selector::range(1, 4)], &[1])
        .unwrap();
    assert_eq!(values, vec![1.0, -2.5, 3.25, 1e300]);

    let err = store
        .get_values::<f32>("levels", "LEVEL", &[Selector::range(1, 4)], &[1])
        .unwrap_err();
    assert_eq!(err.code(), 5002);
}

#[test]
fn test_opposite_byte_order_on_disk() {
    let dir = TempDir::new().unwrap();
    let (dat, def) = paths(&dir, "swap");
    let foreign = match Endian::host().opposite() {
        Endian::Little => Coding::Little,
        Endian::Big => Coding::Big,
    };
    let mut store = Store::create_or_open(&dat, &def, foreign, AccessMode::Create).unwrap();
    define_table(
        &mut store,
        "scalar",
        FieldDef::new("VALUE", ElementType::Real, 4),
        &[1],
    );
    store
        .put_values("scalar", "VALUE", &[Selector::single(1)], &[1], &[1.5f32])
        .unwrap();
    let offset = store.inquire_instance("scalar").unwrap().offset;
    store.close().unwrap();

    let at = offset + FormatVersion::Current.instance_entry_len() as u64;
    let raw = read_raw(&dat, at, 4);
    let expected = match Endian::host().opposite() {
        Endian::Little => 1.5f32.to_le_bytes(),
        Endian::Big => 1.5f32.to_be_bytes(),
    };
    assert_eq!(raw, expected);

    let mut store = Store::create_or_open(&dat, &def, Coding::Neutral, AccessMode::ReadOnly).unwrap();
    let back: Vec<f32> = store
        .get_values("scalar", "VALUE", &[Selector::single(1)], &[1])
        .unwrap();
    assert_eq!(back, vec![1.5]);
}

// ============================================================================
// Strided access
// ============================================================================

#[test]
fn test_transposed_read() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "grid", Coding::Neutral);
    define_table(
        &mut store,
        "grid",
        FieldDef::new("CELL", ElementType::Integer, 4),
        &[2, 3],
    );
    let all = [Selector::range(1, 2), Selector::range(1, 3)];
    store
        .put_values("grid", "CELL", &all, &[1, 2], &[1i32, 2, 3, 4, 5, 6])
        .unwrap();

    let natural: Vec<i32> = store.get_values("grid", "CELL", &all, &[1, 2]).unwrap();
    assert_eq!(natural, vec![1, 2, 3, 4, 5, 6]);

    let transposed: Vec<i32> = store
        .get_values(
            "grid",
            "CELL",
            &[Selector::range(1, 3), Selector::range(1, 2)],
            &[2, 1],
        )
        .unwrap();
    assert_eq!(transposed, vec![1, 3, 5, 2, 4, 6]);

    let column: Vec<i32> = store
        .get_values("grid", "CELL", &[Selector::single(2), Selector::new(1, 3, 2)], &[1, 2])
        .unwrap();
    assert_eq!(column, vec![2, 6]);
}

#[test]
fn test_multi_field_record_keeps_fields_apart() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "multi", Coding::Neutral);
    store
        .define_field(&FieldDef::new("FLAG", ElementType::Integer, 2))
        .unwrap();
    store
        .define_field(&FieldDef::new("VEL", ElementType::Real, 8).with_dims(&[2]))
        .unwrap();
    let record = store.define_record("STATE", &["FLAG", "VEL"]).unwrap();
    // FLAG is padded to four bytes.
    assert_eq!(record.size_bytes, 4 + 16);
    store
        .define_table_def(&TableDef::new("state", "STATE", &[3, 0]))
        .unwrap();
    store.define_instance("state", "state").unwrap();

    let sel = [Selector::range(1, 3), Selector::single(2)];
    store
        .put_values("state", "FLAG", &sel, &[1, 2], &[-1i16, 7, 300])
        .unwrap();
    store
        .put_values("state", "VEL", &sel, &[1, 2], &[0.1f64, 0.2, 1.1, 1.2, 2.1, 2.2])
        .unwrap();

    let flags: Vec<i16> = store.get_values("state", "FLAG", &sel, &[1, 2]).unwrap();
    assert_eq!(flags, vec![-1, 7, 300]);
    let vel: Vec<f64> = store.get_values("state", "VEL", &sel, &[1, 2]).unwrap();
    assert_eq!(vel, vec![0.1, 0.2, 1.1, 1.2, 2.1, 2.2]);
}

#[test]
fn test_selector_errors_and_buffer_size() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "errors", Coding::Neutral);
    define_table(
        &mut store,
        "t",
        FieldDef::new("V", ElementType::Integer, 4),
        &[4],
    );
    let code = |store: &mut Store, sel: Selector| store.get("t", "V", &[sel], &[1]).unwrap_err().code();
    assert_eq!(code(&mut store, Selector::new(3, 2, 1)), 3001);
    assert_eq!(code(&mut store, Selector::new(1, 2, 0)), 3002);
    assert_eq!(code(&mut store, Selector::new(0, 2, 1)), 3003);
    assert_eq!(code(&mut store, Selector::range(1, 5)), 3004);
    assert_eq!(
        store
            .get("t", "V", &[Selector::range(1, 2), Selector::single(1)], &[1, 2])
            .unwrap_err()
            .code(),
        3000
    );

    let mut small = [0u8; 7];
    let err = store
        .get_into("t", "V", &[Selector::range(1, 2)], &[1], &mut small)
        .unwrap_err();
    assert_eq!(err.code(), 3005);
    let mut exact = [0u8; 12];
    assert_eq!(
        store
            .get_into("t", "V", &[Selector::range(2, 4)], &[1], &mut exact)
            .unwrap(),
        12
    );
    assert_eq!(
        store
            .put("t", "V", &[Selector::range(1, 4)], &[1], &[0u8; 8])
            .unwrap_err()
            .code(),
        3005
    );
}

// ============================================================================
// Growable tables
// ============================================================================

#[test]
fn test_sparse_growable_indices() {
    let dir = TempDir::new().unwrap();
    let (dat, def) = paths(&dir, "sparse");
    {
        let mut store = Store::create_or_open(&dat, &def, Coding::Neutral, AccessMode::Create).unwrap();
        define_table(
            &mut store,
            "series",
            FieldDef::new("T", ElementType::Integer, 4),
            &[0],
        );
        assert_eq!(store.max_index("series").unwrap(), 0);
        for index in [1u32, 5, 1000, 70000] {
            store
                .put_values("series", "T", &[Selector::single(index)], &[1], &[index as i32 * 10])
                .unwrap();
        }
        assert_eq!(store.max_index("series").unwrap(), 70000);
        store.close().unwrap();
    }

    let mut store = Store::create_or_open(&dat, &def, Coding::Neutral, AccessMode::Update).unwrap();
    assert_eq!(store.max_index("series").unwrap(), 70000);
    for index in [1u32, 5, 1000, 70000] {
        let value: Vec<i32> = store
            .get_values("series", "T", &[Selector::single(index)], &[1])
            .unwrap();
        assert_eq!(value, vec![index as i32 * 10]);
    }
    let err = store
        .get("series", "T", &[Selector::single(6)], &[1])
        .unwrap_err();
    assert_eq!(err.code(), 3006);
    assert_eq!(store.last_error().unwrap().code, 3006);

    // A strided read over written slices only.
    let every: Vec<i32> = store
        .get_values("series", "T", &[Selector::new(1, 5, 4)], &[1])
        .unwrap();
    assert_eq!(every, vec![10, 50]);
}

#[test]
fn test_read_past_last_slice_fails_before_allocating() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "unbounded", Coding::Neutral);
    define_table(
        &mut store,
        "series",
        FieldDef::new("T", ElementType::Integer, 4),
        &[0],
    );
    store
        .put_values("series", "T", &[Selector::range(1, 3)], &[1], &[1i32, 2, 3])
        .unwrap();

    // Reaching to u32::MAX would need a 16 GiB buffer.
    let everything = [Selector::range(1, u32::MAX)];
    let err = store.get("series", "T", &everything, &[1]).unwrap_err();
    assert_eq!(err.code(), 3006);
    assert!(err.to_string().starts_with("Index 4 "));
    let err = store
        .get_values::<i32>("series", "T", &everything, &[1])
        .unwrap_err();
    assert_eq!(err.code(), 3006);
    let mut buf = [0u8; 16];
    let err = store
        .get_into("series", "T", &everything, &[1], &mut buf)
        .unwrap_err();
    assert_eq!(err.code(), 3006);

    let stepped: Vec<i32> = store
        .get_values("series", "T", &[Selector::new(1, 3, 2)], &[1])
        .unwrap();
    assert_eq!(stepped, vec![1, 3]);
}

#[test]
fn test_fixed_table_max_index_is_largest_extent() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "fixed", Coding::Neutral);
    define_table(
        &mut store,
        "grid",
        FieldDef::new("Z", ElementType::Real, 4),
        &[3, 7, 2],
    );
    assert_eq!(store.max_index("grid").unwrap(), 7);
    let zeros: Vec<f32> = store
        .get_values(
            "grid",
            "Z",
            &[Selector::range(1, 3), Selector::single(7), Selector::single(2)],
            &[1, 2, 3],
        )
        .unwrap();
    assert_eq!(zeros, vec![0.0; 3]);
}

// ============================================================================
// Names, attributes and errors
// ============================================================================

#[test]
fn test_name_uniqueness_per_catalog() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "names", Coding::Neutral);
    define_table(
        &mut store,
        "same",
        FieldDef::new("same", ElementType::Integer, 4),
        &[1],
    );

    let field = store.define_field(&FieldDef::new("same", ElementType::Real, 4));
    assert_eq!(field.unwrap_err().code(), 5007);
    assert_eq!(store.define_record("same", &["same"]).unwrap_err().code(), 5010);
    let table = store.define_table_def(&TableDef::new("same", "same", &[2]));
    assert_eq!(table.unwrap_err().code(), 5014);
    assert_eq!(store.define_instance("same", "same").unwrap_err().code(), 5019);

    assert_eq!(store.define_record("r", &["missing"]).unwrap_err().code(), 5009);
    let table = store.define_table_def(&TableDef::new("t", "missing", &[2]));
    assert_eq!(table.unwrap_err().code(), 5013);
    assert_eq!(store.define_instance("i", "missing").unwrap_err().code(), 5017);
    assert_eq!(
        store
            .get("missing", "same", &[Selector::single(1)], &[1])
            .unwrap_err()
            .code(),
        6004
    );

    store
        .define_field(&FieldDef::new("other", ElementType::Integer, 4))
        .unwrap();
    let err = store
        .get("same", "other", &[Selector::single(1)], &[1])
        .unwrap_err();
    assert_eq!(err.code(), 6005);
    assert_eq!(store.last_error().unwrap().code, 6005);

    let long = "a".repeat(17);
    let err = store
        .define_field(&FieldDef::new(long, ElementType::Integer, 4))
        .unwrap_err();
    assert_eq!(err.code(), 5000);
}

#[test]
fn test_attributes() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "attrs", Coding::Big);
    define_table(
        &mut store,
        "map",
        FieldDef::new("H", ElementType::Real, 4),
        &[0],
    );

    store
        .put_attribute("map", "NSTEPS", AttributeValue::Integer(24))
        .unwrap();
    store
        .put_attribute("map", "DT", AttributeValue::Real(0.5))
        .unwrap();
    store
        .put_attribute("map", "MODEL", AttributeValue::Text("delft".to_string()))
        .unwrap();
    store
        .put_attribute("map", "NSTEPS", AttributeValue::Integer(48))
        .unwrap();

    assert_eq!(
        store
            .get_attribute("map", "NSTEPS", AttributeKind::Integer)
            .unwrap(),
        AttributeValue::Integer(48)
    );
    assert_eq!(
        store.get_attribute("map", "DT", AttributeKind::Real).unwrap(),
        AttributeValue::Real(0.5)
    );
    match store
        .get_attribute("map", "MODEL", AttributeKind::Text)
        .unwrap()
    {
        AttributeValue::Text(text) => assert_eq!(text.trim_end(), "delft"),
        other => panic!("unexpected attribute {other:?}"),
    }
    let err = store
        .get_attribute("map", "DT", AttributeKind::Integer)
        .unwrap_err();
    assert_eq!(err.code(), 6015);

    for i in 2..=5 {
        store
            .put_attribute("map", &format!("I{i}"), AttributeValue::Integer(i))
            .unwrap();
    }
    let err = store
        .put_attribute("map", "SIXTH", AttributeValue::Integer(6))
        .unwrap_err();
    assert_eq!(err.code(), 6010);
    assert_eq!(store.last_error().unwrap().code, 6010);

    let integers = store
        .inquire_attributes("map", AttributeKind::Integer)
        .unwrap();
    assert_eq!(integers.len(), 5);
    assert_eq!(integers[0], ("NSTEPS".to_string(), AttributeValue::Integer(48)));
}

#[test]
fn test_read_only_rejects_mutation() {
    let dir = TempDir::new().unwrap();
    let (dat, def) = paths(&dir, "ro");
    {
        let mut store = Store::create_or_open(&dat, &def, Coding::Neutral, AccessMode::Create).unwrap();
        define_table(
            &mut store,
            "t",
            FieldDef::new("V", ElementType::Integer, 4),
            &[2],
        );
        store.close().unwrap();
    }

    let mut store = Store::create_or_open(&dat, &def, Coding::Neutral, AccessMode::ReadOnly).unwrap();
    let field = store.define_field(&FieldDef::new("W", ElementType::Integer, 4));
    assert_eq!(field.unwrap_err().code(), 8031);
    let put = store.put_values("t", "V", &[Selector::single(1)], &[1], &[1i32]);
    assert_eq!(put.unwrap_err().code(), 8031);
    let attr = store.put_attribute("t", "A", AttributeValue::Integer(1));
    assert_eq!(attr.unwrap_err().code(), 8031);
    assert!(store.get("t", "V", &[Selector::range(1, 2)], &[1]).is_ok());
}

#[test]
fn test_open_missing_file_read_only_fails() {
    let dir = TempDir::new().unwrap();
    let (dat, def) = paths(&dir, "absent");
    let err = Store::create_or_open(&dat, &def, Coding::Neutral, AccessMode::ReadOnly).unwrap_err();
    assert_eq!(err.code(), 8000);
}

#[test]
fn test_swapped_files_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (dat, def) = paths(&dir, "kinds");
    create(&dir, "kinds", Coding::Neutral).close().unwrap();
    let err = Store::create_or_open(&def, &dat, Coding::Neutral, AccessMode::Update).unwrap_err();
    assert_eq!(err.code(), 8016);
}

#[test]
fn test_definitions_larger_than_u64_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "huge", Coding::Neutral);

    // 65536^5 values of 8 bytes.
    let field = FieldDef::new("BIG", ElementType::Real, 8).with_dims(&[65536; 5]);
    assert_eq!(store.define_field(&field).unwrap_err().code(), 5001);
    assert_eq!(store.inquire_field("BIG").unwrap_err().code(), 5009);

    // 2^63 bytes per field is fine on its own; two of them are not.
    let half = FieldDef::new("HALF", ElementType::Character, 1)
        .with_dims(&[65536, 65536, 65536, 32768]);
    store.define_field(&half).unwrap();
    let other = FieldDef {
        name: "HALF2".to_string(),
        ..half
    };
    store.define_field(&other).unwrap();
    assert_eq!(
        store
            .define_record("PAIR", &["HALF", "HALF2"])
            .unwrap_err()
            .code(),
        5001
    );
    assert_eq!(store.inquire_record("PAIR").unwrap_err().code(), 5013);

    store
        .define_field(&FieldDef::new("V", ElementType::Real, 8))
        .unwrap();
    store.define_record("R", &["V"]).unwrap();
    // 10^20 cells.
    let cells = TableDef::new("T", "R", &[100000; 4]);
    assert_eq!(store.define_table_def(&cells).unwrap_err().code(), 5001);
    // Cells fit, bytes do not.
    let bytes = TableDef::new("U", "R", &[65536, 65536, 65536, 65535]);
    assert_eq!(store.define_table_def(&bytes).unwrap_err().code(), 5001);
    // Growable slices are checked the same way.
    let slices = TableDef::new("G", "R", &[65536, 0, 65536, 65536, 65535]);
    assert_eq!(store.define_table_def(&slices).unwrap_err().code(), 5001);

    assert!(store.table_defs().unwrap().is_empty());
    assert_eq!(store.define_instance("T", "T").unwrap_err().code(), 5017);
}

// ============================================================================
// Metadata cache
// ============================================================================

#[test]
fn test_cached_layouts_survive_catalog_damage() {
    let dir = TempDir::new().unwrap();
    let (dat, def) = paths(&dir, "cache");
    let mut store = Store::create_or_open(&dat, &def, Coding::Neutral, AccessMode::Create).unwrap();
    define_table(
        &mut store,
        "t",
        FieldDef::new("DEPTH", ElementType::Integer, 4),
        &[3],
    );
    store
        .put_values("t", "DEPTH", &[Selector::range(1, 3)], &[1], &[4i32, 5, 6])
        .unwrap();
    assert_eq!(store.cached_layouts(), 1);
    store.flush().unwrap();

    // The first field entry sits right after the bucket table.
    let field_at = FileKind::Definition.initial_eof(FormatVersion::Current);
    let name_at = field_at + FormatVersion::Current.name_offset() as u64;
    assert_eq!(read_raw(&def, name_at, 5), b"DEPTH");
    write_raw(&def, name_at, b"XXXXX");

    let values: Vec<i32> = store
        .get_values("t", "DEPTH", &[Selector::range(1, 3)], &[1])
        .unwrap();
    assert_eq!(values, vec![4, 5, 6]);
    assert_eq!(store.inquire_field("DEPTH").unwrap_err().code(), 5009);
    store.close().unwrap();

    let config = StoreConfig::new(AccessMode::ReadOnly, Coding::Neutral).with_cache(false);
    let mut uncached = Store::open_with_config(&dat, &def, config).unwrap();
    let err = uncached
        .get("t", "DEPTH", &[Selector::range(1, 3)], &[1])
        .unwrap_err();
    assert_eq!(err.code(), 5009);
    assert_eq!(uncached.cached_layouts(), 0);
}

// ============================================================================
// Enumeration and merged files
// ============================================================================

#[test]
fn test_enumeration_follows_definition_order() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "enum", Coding::Neutral);
    let names = ["zeta", "alpha", "mid", "beta"];
    for name in names {
        store
            .define_field(&FieldDef::new(name, ElementType::Integer, 4))
            .unwrap();
    }
    let listed: Vec<String> = store.fields().unwrap().into_iter().map(|f| f.name).collect();
    assert_eq!(listed, names);

    let mut cursor = Vec::new();
    let mut next = store.first_field().unwrap();
    while let Some(field) = next {
        cursor.push(field.name);
        next = store.next_field().unwrap();
    }
    assert_eq!(cursor, names);
    assert!(store.next_field().unwrap().is_none());
    assert_eq!(store.first_field().unwrap().unwrap().name, "zeta");

    assert!(store.first_record().unwrap().is_none());
    assert!(store.first_instance().unwrap().is_none());
}

#[test]
fn test_enumeration_sees_later_definitions() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "live", Coding::Neutral);
    for name in ["A", "B"] {
        store
            .define_field(&FieldDef::new(name, ElementType::Integer, 4))
            .unwrap();
    }
    assert_eq!(store.first_field().unwrap().unwrap().name, "A");
    store
        .define_field(&FieldDef::new("C", ElementType::Integer, 4))
        .unwrap();
    assert_eq!(store.next_field().unwrap().unwrap().name, "B");
    assert_eq!(store.next_field().unwrap().unwrap().name, "C");
    assert!(store.next_field().unwrap().is_none());

    // An exhausted cursor picks up entries defined after its end.
    store
        .define_field(&FieldDef::new("D", ElementType::Integer, 4))
        .unwrap();
    assert_eq!(store.next_field().unwrap().unwrap().name, "D");
    assert!(store.next_field().unwrap().is_none());

    define_table(
        &mut store,
        "one",
        FieldDef::new("X", ElementType::Integer, 4),
        &[2],
    );
    assert_eq!(store.first_instance().unwrap().unwrap().name, "one");
    store.define_instance("two", "one").unwrap();
    assert_eq!(store.next_instance().unwrap().unwrap().name, "two");
    assert!(store.next_instance().unwrap().is_none());
}

#[test]
fn test_merged_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("all.nef");
    {
        let mut store = Store::create_or_open(&path, &path, Coding::Neutral, AccessMode::Create).unwrap();
        assert!(store.is_merged());
        assert!(store.data_header().contains("Definition and Data File"));
        define_table(
            &mut store,
            "q",
            FieldDef::new("Q", ElementType::Real, 4),
            &[0],
        );
        store
            .put_values("q", "Q", &[Selector::range(1, 3)], &[1], &[1.0f32, 2.0, 3.0])
            .unwrap();
        store.close().unwrap();
    }

    // A merged data file is used for definitions too.
    let other = dir.path().join("unused.def");
    let mut store = Store::create_or_open(&path, &other, Coding::Neutral, AccessMode::ReadOnly).unwrap();
    assert!(store.is_merged());
    assert!(!other.exists());
    assert_eq!(store.table_defs().unwrap().len(), 1);
    assert_eq!(store.instances().unwrap()[0].table_def, "q");
    let q: Vec<f32> = store
        .get_values("q", "Q", &[Selector::range(1, 3)], &[1])
        .unwrap();
    assert_eq!(q, vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_inquiry_round_trips_definitions() {
    let dir = TempDir::new().unwrap();
    let mut store = create(&dir, "inq", Coding::Neutral);
    let field = FieldDef::new("WL", ElementType::Real, 4)
        .with_dims(&[2, 5])
        .with_quantity("waterlevel", "m")
        .with_description("water level above datum");
    store.define_field(&field).unwrap();
    store.define_record("HIS", &["WL"]).unwrap();
    store
        .define_table_def(&TableDef::new("his", "HIS", &[4, 0]).with_order(&[2, 1]))
        .unwrap();
    store.define_instance("his-1", "his").unwrap();

    let back = store.inquire_field("WL").unwrap();
    assert_eq!(back.dims, vec![2, 5]);
    assert_eq!(back.quantity, "waterlevel");
    assert_eq!(back.unit, "m");
    assert_eq!(back.description, "water level above datum");

    let record = store.inquire_record("HIS").unwrap();
    assert_eq!(record.fields, vec!["WL".to_string()]);
    assert_eq!(record.size_bytes, 40);

    let table = store.inquire_table_def("his").unwrap();
    assert_eq!(table.dims, vec![4, 0]);
    assert_eq!(table.order, vec![2, 1]);

    let instance = store.inquire_instance("his-1").unwrap();
    assert!(instance.growable);
    assert_eq!(instance.table_def, "his");
    assert!(store.definition_header().contains("Definition File"));
}
