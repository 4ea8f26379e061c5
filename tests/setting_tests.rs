//! Tree operations: paths, mutation, conversions, equality, and copies.

use cfgtree::{Config, ConfigError, IntegerFormat, ScalarValue, SettingType};

fn parse(text: &str) -> Config {
    text.parse().expect("document should parse")
}

#[test]
fn group_positional_access_follows_sorted_names() {
    let config = parse("zeta = 1; alpha = 2; mid = 3;");
    let root = config.root();
    let names: Vec<_> = root.children().map(|c| c.name().to_string()).collect();
    assert_eq!(names, ["alpha", "mid", "zeta"]);
    assert_eq!(root.lookup("[0]").unwrap().value::<i32>().unwrap(), 2);
    assert_eq!(root.lookup("[2]").unwrap().value::<i32>().unwrap(), 1);
}

#[test]
fn paths_resolve_through_every_aggregate_kind() {
    let config = parse("g = { arr = [10, 20]; list = ({ x = 1; }, 2); };");
    let root = config.root();
    assert_eq!(root.lookup("g.arr.[1]").unwrap().value::<i32>().unwrap(), 20);
    assert_eq!(root.lookup("g.list.[0].x").unwrap().value::<i32>().unwrap(), 1);
    assert_eq!(root.lookup("g.[0].[0]").unwrap().value::<i32>().unwrap(), 10);
}

#[test]
fn malformed_paths_are_invalid_arguments() {
    let config = parse("a = 1;");
    let root = config.root();
    for bad in ["", ".a", "a.", "a..b", "[x]", "[-1]", "[1"] {
        assert!(
            matches!(root.lookup(bad), Err(ConfigError::InvalidArgument { .. })),
            "expected invalid-argument for {bad:?}"
        );
        assert!(
            matches!(root.exists(bad), Err(ConfigError::InvalidArgument { .. })),
            "expected invalid-argument from exists for {bad:?}"
        );
    }
}

#[test]
fn missing_settings_carry_the_full_requested_path() {
    let config = parse("g = { a = 1; };");
    let err = config.root().lookup("g.missing.deep").unwrap_err();
    let ConfigError::SettingNotFound { path } = err else {
        panic!("expected not-found");
    };
    assert_eq!(path, "g.missing.deep");
}

#[test]
fn exists_distinguishes_absence_from_invalidity() {
    let config = parse("g = { a = 1; };");
    let root = config.root();
    assert!(root.exists("g.a").unwrap());
    assert!(!root.exists("g.b").unwrap());
    assert!(!root.exists("h").unwrap());
}

#[test]
fn lookup_value_swallows_both_failure_modes() {
    let config = parse("a = 1; s = \"x\";");
    let root = config.root();
    assert_eq!(root.lookup_value::<i32>("a"), Some(1));
    assert_eq!(root.lookup_value::<i32>("missing"), None);
    assert_eq!(root.lookup_value::<i32>("s"), None);
}

#[test]
fn add_and_remove_group_children() {
    let mut config = Config::new();
    let mut root = config.root_mut();
    root.add_value("b", 2).unwrap();
    root.add_value("a", 1).unwrap();
    root.add("g", SettingType::Group).unwrap();
    assert_eq!(root.len(), 3);

    // duplicate name
    let err = root.add_value("a", 9).unwrap_err();
    assert!(matches!(err, ConfigError::SettingName { .. }));
    assert_eq!(root.len(), 3);

    root.remove("a").unwrap();
    assert_eq!(root.len(), 2);
    let err = root.remove("a").unwrap_err();
    assert!(matches!(err, ConfigError::SettingNotFound { .. }));

    // positional removal uses sorted order: remaining are [b, g]
    root.remove_at(1).unwrap();
    assert_eq!(config.root().children().count(), 1);
    assert_eq!(config.root().child(0).unwrap().name(), "b");
}

#[test]
fn empty_or_missing_names_cannot_enter_groups() {
    let mut config = Config::new();
    let mut root = config.root_mut();
    let err = root.add("", SettingType::Int).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidArgument { .. }));
}

#[test]
fn named_add_is_a_type_error_outside_groups() {
    let mut config = parse("l = (1);");
    let mut root = config.root_mut();
    let mut list = root.lookup("l").unwrap();
    let err = list.add("x", SettingType::Int).unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
}

#[test]
fn list_elements_shift_on_removal() {
    let mut config = parse("l = (1, 2, 3);");
    let mut root = config.root_mut();
    let mut list = root.lookup("l").unwrap();
    list.remove_at(0).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list.as_ref().child(0).unwrap().value::<i32>().unwrap(), 2);
    let err = list.remove_at(5).unwrap_err();
    assert!(matches!(err, ConfigError::SettingNotFound { .. }));
}

#[test]
fn arrays_enforce_their_element_type_on_append() {
    let mut config = parse("a = [1, 2];");
    let mut root = config.root_mut();
    let mut arr = root.lookup("a").unwrap();
    arr.append_value(3).unwrap();
    assert_eq!(arr.len(), 3);

    let err = arr.append_value("four").unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    let err = arr.append(SettingType::Group).unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    assert_eq!(arr.len(), 3);
}

#[test]
fn empty_array_takes_type_from_first_insertion() {
    let mut config = Config::new();
    let mut root = config.root_mut();
    let mut arr = root.add("a", SettingType::Array).unwrap();
    assert_eq!(arr.as_ref().element_type(), None);
    arr.append_value("first").unwrap();
    assert_eq!(arr.as_ref().element_type(), Some(SettingType::String));
    let err = arr.append_value(1).unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
}

#[test]
fn lists_accept_heterogeneous_appends() {
    let mut config = Config::new();
    let mut root = config.root_mut();
    let mut list = root.add("l", SettingType::List).unwrap();
    list.append_value(1).unwrap();
    list.append_value("two").unwrap();
    list.append(SettingType::Group).unwrap();
    assert_eq!(list.len(), 3);
}

#[test]
fn assign_converts_where_the_matrix_allows() {
    let mut config = parse("i = 1; f = 1.0; s = \"x\"; b = false; l = 1L;");
    let mut root = config.root_mut();

    root.lookup("i").unwrap().assign(5i64).unwrap();
    assert_eq!(config.root().lookup("i").unwrap().value::<i32>().unwrap(), 5);
    // type tag is preserved by assignment
    assert_eq!(
        config.root().lookup("i").unwrap().setting_type(),
        SettingType::Int
    );

    let mut root = config.root_mut();
    root.lookup("f").unwrap().assign(2i32).unwrap();
    assert_eq!(
        config.root().lookup("f").unwrap().value::<f32>().unwrap(),
        2.0
    );

    let mut root = config.root_mut();
    root.lookup("b").unwrap().assign(3i32).unwrap();
    assert!(config.root().lookup("b").unwrap().value::<bool>().unwrap());

    let mut root = config.root_mut();
    root.lookup("s").unwrap().assign("replaced").unwrap();
    assert_eq!(
        config.root().lookup("s").unwrap().as_str().unwrap(),
        "replaced"
    );
}

#[test]
fn assign_rejects_disallowed_or_overflowing_conversions() {
    let mut config = parse("i = 1; s = \"x\"; f = 1.0; g = {};");
    let mut root = config.root_mut();

    let err = root.lookup("i").unwrap().assign("text").unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    let err = root.lookup("s").unwrap().assign(1i32).unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    let err = root.lookup("f").unwrap().assign("nope").unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    let err = root.lookup("g").unwrap().assign(1i32).unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    let err = root.lookup("i").unwrap().assign(i64::MAX).unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    // failed assignment leaves the value alone
    assert_eq!(config.root().lookup("i").unwrap().value::<i32>().unwrap(), 1);
}

#[test]
fn conversion_matrix_for_booleans() {
    let config = parse("b = true; i = 1; l = 1L; f = 1.5; s = \"x\";");
    let root = config.root();
    let b = root.lookup("b").unwrap();
    assert!(b.value::<bool>().unwrap());
    assert_eq!(b.value::<i32>().unwrap(), 1);
    assert_eq!(b.value::<u32>().unwrap(), 1);
    assert_eq!(b.value::<i64>().unwrap(), 1);
    assert_eq!(b.value::<u64>().unwrap(), 1);
    assert!(b.value::<f32>().is_err());
    assert!(b.value::<f64>().is_err());
    assert!(b.value::<String>().is_err());
}

#[test]
fn conversion_matrix_for_integers() {
    let config = parse("i = -3; l = 40L;");
    let root = config.root();
    let i = root.lookup("i").unwrap();
    assert!(i.value::<bool>().unwrap());
    assert_eq!(i.value::<i32>().unwrap(), -3);
    assert!(i.value::<u32>().is_err());
    assert!(i.value::<u64>().is_err());
    assert_eq!(i.value::<i64>().unwrap(), -3);
    assert_eq!(i.value::<f32>().unwrap(), -3.0);
    assert_eq!(i.value::<f64>().unwrap(), -3.0);
    assert!(i.value::<String>().is_err());

    let l = root.lookup("l").unwrap();
    assert_eq!(l.value::<i32>().unwrap(), 40);
    assert_eq!(l.value::<u32>().unwrap(), 40);
    assert_eq!(l.value::<f32>().unwrap(), 40.0);
}

#[test]
fn conversion_matrix_for_int64_narrowing() {
    let config = parse("big = 4294967296L; neg = -1L;");
    let root = config.root();
    let big = root.lookup("big").unwrap();
    assert!(big.value::<i32>().is_err());
    assert!(big.value::<u32>().is_err());
    assert_eq!(big.value::<i64>().unwrap(), 4_294_967_296);
    assert_eq!(big.value::<u64>().unwrap(), 4_294_967_296);

    let neg = root.lookup("neg").unwrap();
    assert_eq!(neg.value::<i32>().unwrap(), -1);
    assert!(neg.value::<u32>().is_err());
    assert!(neg.value::<u64>().is_err());
}

#[test]
fn conversion_matrix_for_floats_and_strings() {
    let config = parse("f = 2.5; s = \"text\"; z = 0.0;");
    let root = config.root();
    let f = root.lookup("f").unwrap();
    assert!(f.value::<bool>().unwrap());
    assert!(!root.lookup("z").unwrap().value::<bool>().unwrap());
    assert!(f.value::<i32>().is_err());
    assert!(f.value::<u32>().is_err());
    assert!(f.value::<i64>().is_err());
    assert!(f.value::<u64>().is_err());
    assert_eq!(f.value::<f32>().unwrap(), 2.5);
    assert_eq!(f.value::<f64>().unwrap(), 2.5);
    assert!(f.value::<String>().is_err());

    let s = root.lookup("s").unwrap();
    assert_eq!(s.value::<String>().unwrap(), "text");
    for err in [
        s.value::<bool>().is_err(),
        s.value::<i32>().is_err(),
        s.value::<u32>().is_err(),
        s.value::<i64>().is_err(),
        s.value::<u64>().is_err(),
        s.value::<f32>().is_err(),
        s.value::<f64>().is_err(),
    ] {
        assert!(err);
    }
}

#[test]
fn aggregates_do_not_convert() {
    let config = parse("g = {}; l = (); a = [1];");
    let root = config.root();
    for name in ["g", "l", "a"] {
        assert!(root.lookup(name).unwrap().value::<i32>().is_err());
        assert_eq!(root.lookup(name).unwrap().value::<bool>().is_err(), true);
    }
}

#[test]
fn format_hints_are_readable_and_writable() {
    let mut config = parse("x = 0xFF; y = 16;");
    assert_eq!(
        config.root().lookup("x").unwrap().format(),
        IntegerFormat::Hex
    );
    assert_eq!(
        config.root().lookup("y").unwrap().format(),
        IntegerFormat::Decimal
    );
    let mut root = config.root_mut();
    root.lookup("y").unwrap().set_format(IntegerFormat::Hex);
    assert!(config.to_string().contains("y = 0x10"));
}

#[test]
fn provenance_walks_back_to_the_root() {
    let config = parse("g = { b = { c = 2; }; arr = [7]; };");
    let root = config.root();
    let c = root.lookup("g.b.c").unwrap();
    assert_eq!(c.path(), "g.b.c");
    assert!(!c.is_root());
    assert!(root.is_root());
    assert_eq!(root.path(), "");
    assert_eq!(c.index_in_parent(), Some(0));
    assert_eq!(c.parent().unwrap().name(), "b");

    let elem = root.lookup("g.arr.[0]").unwrap();
    assert_eq!(elem.path(), "g.arr.[0]");
    assert_eq!(elem.name(), "");

    // every setting's path resolves back to a structurally equal setting
    for setting in [c, elem, root.lookup("g.b").unwrap()] {
        let back = root.lookup(&setting.path()).unwrap();
        assert!(back == setting);
        assert_eq!(back.path(), setting.path());
    }
}

#[test]
fn source_provenance_records_the_introducing_token() {
    let config = parse("a = 1;\ngroup = {\n    inner = 2;\n};\n");
    let root = config.root();
    let inner = root.lookup("group.inner").unwrap();
    let source = inner.source().expect("parsed settings carry provenance");
    assert_eq!(source.line(), 3);
    assert_eq!(source.column(), 5);

    // programmatic settings carry none
    let mut config = Config::new();
    config.root_mut().add_value("x", 1).unwrap();
    assert!(config.root().lookup("x").unwrap().source().is_none());
}

#[test]
fn structural_equality_ignores_provenance_and_format() {
    let a = parse("g = { x = 255; y = [1, 2]; };");
    let b = parse("\n\ng = {\n  y = [1, 2];\n  x = 0xFF;\n};");
    assert!(a.root() == b.root());

    let c = parse("g = { x = 255; y = [1, 3]; };");
    assert!(a.root() != c.root());
    let d = parse("g = { x = 255L; y = [1, 2]; };");
    assert!(a.root() != d.root(), "Int and Int64 are distinct types");
}

#[test]
fn snapshots_deep_copy_subtrees() {
    let mut source = parse("g = { a = 1; inner = { b = [2, 3]; }; };");
    let copy = source.root().lookup("g").unwrap().snapshot();

    // into another tree
    let mut dest = Config::new();
    dest.root_mut().add_copy("fresh", &copy).unwrap();
    assert_eq!(
        dest.root()
            .lookup("fresh.inner.b.[1]")
            .unwrap()
            .value::<i32>()
            .unwrap(),
        3
    );

    // into the same tree it came from
    source.root_mut().add_copy("twin", &copy).unwrap();
    assert!(source.root().lookup("twin").is_ok());

    // the copy is independent of its origin
    source
        .root_mut()
        .lookup("g.a")
        .unwrap()
        .assign(99)
        .unwrap();
    assert_eq!(
        source.root().lookup("twin.a").unwrap().value::<i32>().unwrap(),
        1
    );
}

#[test]
fn copies_respect_group_and_array_constraints() {
    let source = parse("n = 5; s = \"x\"; g = {};");
    let n = source.root().lookup("n").unwrap().snapshot();
    let s = source.root().lookup("s").unwrap().snapshot();
    let g = source.root().lookup("g").unwrap().snapshot();

    let mut dest = parse("arr = [1]; occupied = 0;");
    let mut root = dest.root_mut();

    let err = root.add_copy("occupied", &n).unwrap_err();
    assert!(matches!(err, ConfigError::SettingName { .. }));

    let mut arr = root.lookup("arr").unwrap();
    arr.append_copy(&n).unwrap();
    let err = arr.append_copy(&s).unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    let err = arr.append_copy(&g).unwrap_err();
    assert!(matches!(err, ConfigError::SettingType { .. }));
    assert_eq!(arr.len(), 2);
}

#[test]
fn scalar_length_is_zero() {
    let config = parse("a = 1; s = \"x\";");
    assert_eq!(config.root().lookup("a").unwrap().len(), 0);
    assert!(config.root().lookup("s").unwrap().is_empty());
}

#[test]
fn scalar_value_conversions_from_rust_types() {
    assert_eq!(ScalarValue::from(true).setting_type(), SettingType::Boolean);
    assert_eq!(ScalarValue::from(1i32).setting_type(), SettingType::Int);
    assert_eq!(ScalarValue::from(1i64).setting_type(), SettingType::Int64);
    assert_eq!(ScalarValue::from(1.0f32).setting_type(), SettingType::Float);
    assert_eq!(ScalarValue::from("x").setting_type(), SettingType::String);
}
