//! Error type tests

use super::*;
use miette::Diagnostic;

macro_rules! test_error_contains {
    ($test_name:ident, $err:expr, $($contains:expr),+ $(,)?) => {
        #[test]
        fn $test_name() {
            let err = $err;
            let error_string = err.to_string();
            $(
                assert!(error_string.contains($contains),
                    "Error message should contain '{}', got: {}",
                    $contains,
                    error_string
                );
            )+
        }
    };
}

#[test]
fn test_error_code() {
    let err = registry::repository_exists("nosial");
    assert_eq!(
        err.code().map(|c| c.to_string()),
        Some("ncc::already_exists".to_string())
    );
}

#[test]
fn test_exit_codes() {
    assert_eq!(registry::validation("bad host").exit_code(), 1);
    assert_eq!(registry::repository_exists("x").exit_code(), 1);
    assert_eq!(registry::repository_not_found("x").exit_code(), 1);
    assert_eq!(resolve::circular(&["a".into(), "b".into()]).exit_code(), 2);
    assert_eq!(runtime::timeout("unit", 3).exit_code(), 2);
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: NccError = io_err.into();
    assert!(matches!(err, NccError::Io { .. }));
}

#[test]
fn test_yaml_error_conversion() {
    let parse_result: std::result::Result<serde_yaml::Value, _> =
        serde_yaml::from_str("invalid: yaml: content: [unclosed");
    let err: NccError = parse_result.unwrap_err().into();
    assert!(matches!(err, NccError::Config { .. }));
}

#[test]
fn test_retryable_kinds() {
    assert!(resolve::fetch_failed("x", 1, "reset").is_retryable());
    assert!(!resolve::integrity("x", "a", "b").is_retryable());
    assert!(!registry::authentication("r", "401").is_retryable());
}

test_error_contains!(
    test_already_exists_message,
    registry::repository_exists("nosial"),
    "already exists",
    "nosial"
);

test_error_contains!(
    test_circular_chain_message,
    resolve::circular(&["a".into(), "b".into(), "a".into()]),
    "a -> b -> a"
);

test_error_contains!(
    test_unresolvable_lists_requirers,
    resolve::unresolvable(
        "com.example.bravo",
        &[
            ("com.example.alpha".into(), ">=1.0".into()),
            ("com.example.charlie".into(), ">=1.2,<2.0".into()),
        ]
    ),
    "com.example.bravo",
    "com.example.alpha requires >=1.0",
    "com.example.charlie requires >=1.2,<2.0"
);

test_error_contains!(
    test_decoding_names_offset,
    codec::decoding(17, "unexpected end of input"),
    "offset 17"
);
