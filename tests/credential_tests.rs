//! `ncc credential` against an isolated home

mod common;

use predicates::prelude::*;

#[test]
fn test_add_list_remove() {
    let home = common::TestHome::new();
    home.ncc()
        .args(["credential", "add", "--registry", "github", "--token", "ghp_supersecret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("access_token"))
        .stdout(predicate::str::contains("ghp_supersecret").not());

    home.ncc()
        .args(["credential", "add", "--registry", "lab", "--username", "me", "--password", "hunter2"])
        .assert()
        .success();

    home.ncc()
        .args(["credential", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("github"))
        .stdout(predicate::str::contains("lab"))
        .stdout(predicate::str::contains("hunter2").not());

    let store = std::fs::read(home.path.join("config/vault.store")).unwrap();
    assert!(!store.windows(7).any(|w| w == b"hunter2"));

    home.ncc()
        .args(["credential", "remove", "--registry", "github"])
        .assert()
        .success();
    home.ncc()
        .args(["credential", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("github").not());
}

#[test]
fn test_remove_missing_credential() {
    let home = common::TestHome::new();
    home.ncc()
        .args(["credential", "remove", "--registry", "nowhere"])
        .assert()
        .code(1);
}

#[test]
fn test_list_empty() {
    let home = common::TestHome::new();
    home.ncc()
        .args(["credential", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No credentials stored."));
}
