//! Include expansion: flattening, glob patterns, path resolution, and
//! the depth bound. File fixtures live in temporary directories.

use cfgtree::{Config, ConfigError};
use std::fs;
use tempfile::tempdir;

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::new();
    config.set_include_dir(dir);
    config
}

#[test]
fn include_splices_tokens_at_the_directive_site() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("b.cfg"), "u = 1;\n").expect("write");
    fs::write(dir.path().join("a.cfg"), "@include \"b.cfg\"\nv = 2;\n").expect("write");

    let mut config = config_in(dir.path());
    config.read_file("a.cfg").expect("parses");
    let names: Vec<_> = config
        .root()
        .children()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(names, ["u", "v"]);
    assert_eq!(config.root().lookup("u").unwrap().value::<i32>().unwrap(), 1);
    assert_eq!(config.root().lookup("v").unwrap().value::<i32>().unwrap(), 2);

    // flattening is equivalent to textual splicing
    let spliced: Config = "u = 1;\nv = 2;\n".parse().expect("parses");
    assert!(config.root() == spliced.root());
}

#[test]
fn include_works_wherever_whitespace_may_appear() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("inner.cfg"), "x = 1;\n").expect("write");

    let mut config = config_in(dir.path());
    config
        .read_str("g = {\n    @include \"inner.cfg\"\n    y = 2;\n};\n")
        .expect("parses");
    assert_eq!(config.root().lookup("g.x").unwrap().value::<i32>().unwrap(), 1);
    assert_eq!(config.root().lookup("g.y").unwrap().value::<i32>().unwrap(), 2);
}

#[test]
fn final_component_is_an_anchored_pattern() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("part_a.cfg"), "pa = 1;\n").expect("write");
    fs::write(dir.path().join("part_b.cfg"), "pb = 2;\n").expect("write");
    fs::write(dir.path().join("part_a.cfg.bak"), "bak = 3;\n").expect("write");
    fs::write(dir.path().join("other.txt"), "nope = 4;\n").expect("write");

    let mut config = config_in(dir.path());
    config
        .read_str(r#"@include "part_[ab]\\.cfg""#)
        .expect("parses");
    assert_eq!(config.root().len(), 2);
    assert!(config.root().exists("pa").unwrap());
    assert!(config.root().exists("pb").unwrap());
    // the anchor keeps part_a.cfg.bak out
    assert!(!config.root().exists("bak").unwrap());
}

#[test]
fn zero_matches_contribute_zero_tokens() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config
        .read_str("@include \"absent_.*\\\\.cfg\"\nz = 1;\n")
        .expect("parses");
    assert_eq!(config.root().len(), 1);
}

#[test]
fn missing_directory_is_a_file_io_error() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    let err = config
        .read_str("@include \"no_such_dir/x.cfg\"")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileIo { .. }), "got: {err:?}");
}

#[test]
fn separator_free_paths_name_exactly_one_file() {
    // With an empty include directory the resolved path has no separator
    // and is read directly, so a missing file is an I/O error.
    let mut config = Config::new();
    config.set_include_dir("");
    let err = config
        .read_str("@include \"definitely_absent_file.cfg\"")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileIo { .. }), "got: {err:?}");
}

#[test]
fn self_inclusion_hits_the_depth_bound() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("self.cfg"), "@include \"self.cfg\"\n").expect("write");

    let mut config = config_in(dir.path());
    let err = config.read_file("self.cfg").unwrap_err();
    let ConfigError::FileIo { source, .. } = &err else {
        panic!("expected file-io error, got: {err:?}");
    };
    assert!(
        source.to_string().contains("include depth"),
        "got: {source}"
    );
}

#[test]
fn absolute_include_paths_ignore_the_include_dir() {
    let data_dir = tempdir().expect("tempdir");
    fs::write(data_dir.path().join("abs.cfg"), "w = 7;\n").expect("write");
    let abs = data_dir.path().join("abs.cfg");

    let unrelated = tempdir().expect("tempdir");
    let mut config = config_in(unrelated.path());
    config
        .read_str(&format!("@include \"{}\"\n", abs.display()))
        .expect("parses");
    assert_eq!(config.root().lookup("w").unwrap().value::<i32>().unwrap(), 7);
}

#[test]
fn includes_nest_recursively() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("leaf.cfg"), "depth2 = 2;\n").expect("write");
    fs::write(
        dir.path().join("mid.cfg"),
        "@include \"leaf.cfg\"\ndepth1 = 1;\n",
    )
    .expect("write");

    let mut config = config_in(dir.path());
    config.read_str("@include \"mid.cfg\"\ndepth0 = 0;\n").expect("parses");
    assert_eq!(config.root().len(), 3);
}

#[test]
fn string_path_after_include_is_unquoted_first() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("bare.cfg"), "ok = true;\n").expect("write");

    // a bare (unquoted) token also works as an include path
    let mut config = config_in(dir.path());
    config.read_str("@include bare.cfg\n").expect("parses");
    assert!(config.root().lookup("ok").unwrap().value::<bool>().unwrap());
}

#[test]
fn dangling_include_at_end_of_input_is_a_parse_error() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    let err = config.read_str("a = 1;\n@include").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err:?}");
}

#[test]
fn write_file_then_read_file_preserves_the_tree() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config
        .read_str("g = { a = 1; s = \"two\"; arr = [3, 4]; };")
        .expect("parses");
    config.write_file("out.cfg").expect("writes");

    let mut reread = config_in(dir.path());
    reread.read_file("out.cfg").expect("rereads");
    assert!(config.root() == reread.root());
}

#[test]
fn read_file_reports_missing_files() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    let err = config.read_file("nope.cfg").unwrap_err();
    assert!(matches!(err, ConfigError::FileIo { .. }));
}

#[test]
fn from_file_resolves_against_the_cwd_by_default() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("standalone.cfg");
    fs::write(&path, "answer = 42;\n").expect("write");
    let config = Config::from_file(&path).expect("parses");
    assert_eq!(
        config.root().lookup("answer").unwrap().value::<i32>().unwrap(),
        42
    );
}
