//! Repository registry tests

use super::*;
use crate::test_fixtures::create_context;

fn registry() -> (tempfile::TempDir, Context, RepositoryRegistry) {
    let (temp, context) = create_context();
    let registry = RepositoryRegistry::new(&context);
    (temp, context, registry)
}

fn write_system(context: &Context, yaml: &str) {
    std::fs::create_dir_all(&context.system_config_dir).unwrap();
    std::fs::write(context.system_config_dir.join(STORE_FILE), yaml).unwrap();
}

#[test]
fn test_add_then_get() {
    let (_temp, _context, registry) = registry();
    registry
        .add("Nosial", RepositoryType::Gitlab, "git.n64.cc", true, false)
        .unwrap();

    let entry = registry.get("nosial").unwrap();
    assert_eq!(entry.name, "nosial");
    assert_eq!(entry.repo_type, RepositoryType::Gitlab);
    assert_eq!(entry.scope, Scope::User);
    assert_eq!(entry.base_url(), "https://git.n64.cc");
    assert!(registry.exists("NOSIAL").unwrap());
}

#[test]
fn test_add_existing_name_requires_overwrite() {
    let (_temp, _context, registry) = registry();
    registry
        .add("nosial", RepositoryType::Github, "example.com", true, false)
        .unwrap();

    let err = registry
        .add("nosial", RepositoryType::Github, "example.com", true, false)
        .unwrap_err();
    assert!(matches!(err, NccError::AlreadyExists { .. }));
    assert!(err.to_string().contains("already exists"));

    registry
        .add("nosial", RepositoryType::Gitea, "other.example.org:3000", false, true)
        .unwrap();
    let entries = registry.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].host, "other.example.org:3000");
    assert_eq!(entries[0].repo_type, RepositoryType::Gitea);
    assert!(!entries[0].ssl);
}

#[test]
fn test_add_rejects_invalid_host() {
    let (_temp, _context, registry) = registry();
    let err = registry
        .add("bad", RepositoryType::Github, "not a host", true, false)
        .unwrap_err();
    assert!(matches!(err, NccError::Validation { .. }));
    assert!(registry.list().unwrap().is_empty());
}

#[test]
fn test_type_parsing() {
    assert_eq!("GitHub".parse::<RepositoryType>().unwrap(), RepositoryType::Github);
    assert!(matches!(
        "svn".parse::<RepositoryType>(),
        Err(NccError::Validation { .. })
    ));
}

#[test]
fn test_list_puts_system_first() {
    let (_temp, context, registry) = registry();
    write_system(
        &context,
        "- name: corp\n  type: gitlab\n  host: git.corp.example\n  ssl: true\n",
    );
    registry
        .add("mine", RepositoryType::Github, "example.com", true, false)
        .unwrap();

    let entries = registry.list().unwrap();
    let names: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.scope)).collect();
    assert_eq!(names, vec![("corp", Scope::System), ("mine", Scope::User)]);
    assert_eq!(registry.list_scope(Scope::System).unwrap().len(), 1);
}

#[test]
fn test_system_entry_cannot_be_shadowed_or_removed() {
    let (_temp, context, registry) = registry();
    write_system(&context, "- name: corp\n  type: gitlab\n  host: git.corp.example\n");

    let err = registry
        .add("corp", RepositoryType::Github, "example.com", true, false)
        .unwrap_err();
    assert!(matches!(err, NccError::AlreadyExists { .. }));

    let err = registry
        .add("corp", RepositoryType::Github, "example.com", true, true)
        .unwrap_err();
    assert!(matches!(err, NccError::Validation { .. }));

    let err = registry.delete("corp").unwrap_err();
    assert!(matches!(err, NccError::Validation { .. }));
}

#[test]
fn test_lookup_prefers_system_when_both_define_name() {
    let (_temp, context, registry) = registry();
    write_system(&context, "- name: dup\n  type: gitlab\n  host: system.example\n");
    std::fs::create_dir_all(&context.user_config_dir).unwrap();
    std::fs::write(
        context.user_config_dir.join(STORE_FILE),
        "- name: dup\n  type: github\n  host: user.example\n",
    )
    .unwrap();

    let entry = registry.get("dup").unwrap();
    assert_eq!(entry.host, "system.example");
    assert_eq!(entry.scope, Scope::System);
    assert_eq!(registry.list().unwrap().len(), 2);
}

#[test]
fn test_delete() {
    let (_temp, _context, registry) = registry();
    registry
        .add("gone", RepositoryType::Github, "example.com", true, false)
        .unwrap();
    registry.delete("gone").unwrap();
    assert!(!registry.exists("gone").unwrap());

    let err = registry.delete("gone").unwrap_err();
    assert!(matches!(err, NccError::NotFound { .. }));
}

#[test]
fn test_malformed_store_is_config_error() {
    let (_temp, context, registry) = registry();
    write_system(&context, "not: [a list");
    assert!(matches!(registry.list(), Err(NccError::Config { .. })));
    assert!(matches!(registry.exists("github"), Err(NccError::Config { .. })));
}
