use test_case::test_case;

use crate::{DEFAULT_VERSION, ExportOptions};

#[test]
fn test_defaults() {
    let options = ExportOptions::default();
    assert_eq!(options.header_name, "kernels.h");
    assert_eq!(options.registration_name, "kernels.c");
    assert_eq!(options.inst_switch_name, "runtime_inst_switch.h");
    assert_eq!(options.version_name, "tinykern_version.txt");
    assert_eq!(options.version, DEFAULT_VERSION);
    assert_eq!(options.unit_file_name("k_a"), "k_a.c");
}

#[test]
fn test_builder_overrides() {
    let options = ExportOptions::builder().header_name("tinynn.h").source_extension("cc").version("dev").build();
    assert_eq!(options.header_name, "tinynn.h");
    assert_eq!(options.unit_file_name("k"), "k.cc");
    assert_eq!(options.version, "dev");
    assert_eq!(options.registration_name, "kernels.c");
}

#[test_case(None, DEFAULT_VERSION; "unset")]
#[test_case(Some("2.0.1"), "2.0.1"; "set")]
#[test_case(Some("  rc-3\n"), "rc-3"; "trimmed")]
#[test_case(Some("   "), DEFAULT_VERSION; "blank")]
fn test_version_from_vars(value: Option<&str>, expected: &str) {
    let options = ExportOptions::from_vars(|key| {
        assert_eq!(key, "TINYKERN_VERSION");
        value.map(str::to_string)
    });
    assert_eq!(options.version, expected);
    assert_eq!(options.header_name, "kernels.h");
}
