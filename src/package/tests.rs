use super::*;
use crate::error::NccError;
use crate::test_fixtures::{create_temp_dir, package, shell_unit};

fn sample() -> Package {
    let mut pkg = package("com.example.app", "1.4.0", &[("com.example.lib", "^1.2")]);
    pkg.execution_units.push(shell_unit("main", "echo hi"));
    pkg.components.push(Component {
        path: "lib/util.sh".to_string(),
        flag: ComponentFlag::Opaque,
        data: b"ZWNobw==".to_vec(),
    });
    pkg
}

#[test]
fn test_file_round_trip() {
    let temp = create_temp_dir();
    let path = temp.path().join("out").join(PACKAGE_FILE);
    let pkg = sample();

    let hash = pkg.write(&path).unwrap();

    assert_eq!(hash, crate::hash::hash_file(&path).unwrap());
    assert_eq!(Package::read(&path).unwrap(), pkg);
}

#[test]
fn test_header_and_key_order() {
    let bytes = sample().to_bytes().unwrap();
    assert_eq!(&bytes[..6], MAGIC);
    assert_eq!(bytes[6], FORMAT_VERSION);

    let crate::serializer::Value::Map(entries) = crate::serializer::decode(&bytes[7..]).unwrap() else {
        panic!("package body is not a map");
    };
    let keys: Vec<&str> = entries.iter().filter_map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec!["assembly", "build_configurations", "execution_units", "components", "dependencies"]
    );
}

#[test]
fn test_bad_magic_fails_at_offset_zero() {
    let mut bytes = sample().to_bytes().unwrap();
    bytes[0] = b'X';
    assert!(matches!(
        Package::from_bytes(&bytes),
        Err(NccError::Decoding { offset: 0, .. })
    ));
}

#[test]
fn test_unknown_format_version_fails_at_offset_six() {
    let mut bytes = sample().to_bytes().unwrap();
    bytes[6] = 9;
    assert!(matches!(
        Package::from_bytes(&bytes),
        Err(NccError::Decoding { offset: 6, .. })
    ));
}

#[test]
fn test_truncated_body_reports_file_offset() {
    let bytes = sample().to_bytes().unwrap();
    let err = Package::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
    match err {
        NccError::Decoding { offset, .. } => assert!(offset > 7),
        other => panic!("expected decoding error, got {other:?}"),
    }
}

#[test]
fn test_default_configuration_and_find_unit() {
    let pkg = sample();
    assert_eq!(pkg.default_configuration().unwrap().name, "release");
    assert!(pkg.find_unit("main").is_some());
    assert!(pkg.find_unit("missing").is_none());
}

#[test]
fn test_exit_handler_selection() {
    let handle = |message: &str| ExitHandle {
        message: Some(message.to_string()),
        end_process: false,
        exit_code: 0,
        run: None,
    };
    let handlers = ExitHandlers {
        success: Some(handle("ok")),
        warning: Some(handle("warn")),
        error: None,
    };
    assert_eq!(handlers.for_exit_code(0).unwrap().message.as_deref(), Some("ok"));
    assert_eq!(handlers.for_exit_code(1).unwrap().message.as_deref(), Some("warn"));
    assert!(handlers.for_exit_code(3).is_none());
}

mod structure {
    use super::*;
    use crate::package::validation::{is_safe_component_path, is_valid_package_id};

    fn invalid(pkg: &Package) -> String {
        match pkg.validate() {
            Err(NccError::Validation { message }) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_package_ids() {
        assert!(is_valid_package_id("com.example.tool"));
        assert!(is_valid_package_id("net.nosial.loglib_2"));
        assert!(!is_valid_package_id("tool"));
        assert!(!is_valid_package_id("Com.example.tool"));
        assert!(!is_valid_package_id("com..tool"));
        assert!(!is_valid_package_id("com.example.t"));
        assert!(!is_valid_package_id("1com.example"));
    }

    #[test]
    fn test_component_paths() {
        assert!(is_safe_component_path("lib/util.sh"));
        assert!(!is_safe_component_path(""));
        assert!(!is_safe_component_path("../escape"));
        assert!(!is_safe_component_path("/etc/passwd"));
        assert!(!is_safe_component_path("./lib"));
    }

    #[test]
    fn test_sample_is_valid() {
        sample().validate().unwrap();
    }

    #[test]
    fn test_requires_default_configuration() {
        let mut pkg = sample();
        pkg.build_configurations[0].default = false;
        assert!(invalid(&pkg).contains("default"));
    }

    #[test]
    fn test_duplicate_outputs() {
        let mut pkg = sample();
        let mut debug = pkg.build_configurations[0].clone();
        debug.name = "debug".to_string();
        debug.default = false;
        pkg.build_configurations.push(debug);
        assert!(invalid(&pkg).contains("build output path"));
    }

    #[test]
    fn test_duplicate_units_and_components() {
        let mut pkg = sample();
        pkg.execution_units.push(shell_unit("main", "echo again"));
        assert!(invalid(&pkg).contains("execution unit name"));

        let mut pkg = sample();
        let copy = pkg.components[0].clone();
        pkg.components.push(copy);
        assert!(invalid(&pkg).contains("component path"));
    }

    #[test]
    fn test_unsafe_component_path() {
        let mut pkg = sample();
        pkg.components[0].path = "../../outside.sh".to_string();
        assert!(invalid(&pkg).contains("../../outside.sh"));
    }

    #[test]
    fn test_bad_dependencies() {
        let mut pkg = sample();
        pkg.dependencies[0].package = "lib".to_string();
        assert!(invalid(&pkg).contains("not a valid package id"));

        let mut pkg = sample();
        pkg.dependencies[0].package = "com.example.app".to_string();
        assert!(invalid(&pkg).contains("itself"));
    }
}
