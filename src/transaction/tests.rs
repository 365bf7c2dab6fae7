//! Tests for transaction support

use super::*;
use crate::test_fixtures::create_temp_dir;

#[test]
fn test_commit_keeps_created_dirs() {
    let temp = create_temp_dir();
    let dir = temp.path().join("packages/com.example.app/1.0.0");

    let transaction = Transaction::new();
    transaction.prepare_dir(&dir).unwrap();
    fs::write(dir.join("package.ncc"), b"data").unwrap();
    transaction.commit();

    assert!(dir.join("package.ncc").exists());
}

#[test]
fn test_drop_without_commit_removes_created_dirs() {
    let temp = create_temp_dir();
    let dir = temp.path().join("packages/com.example.app/1.0.0");
    {
        let transaction = Transaction::new();
        transaction.prepare_dir(&dir).unwrap();
        fs::write(dir.join("package.ncc"), b"data").unwrap();
        assert_eq!(transaction.created_dirs(), vec![dir.clone()]);
    }
    assert!(!dir.exists());
}

#[test]
fn test_rollback_prunes_empty_parents_it_created() {
    let temp = create_temp_dir();
    let packages = temp.path().join("packages");
    fs::create_dir_all(packages.join("com.example.kept/2.0.0")).unwrap();
    let fresh = packages.join("com.example.app/1.0.0");
    let sibling = packages.join("com.example.kept/1.0.0");
    {
        let transaction = Transaction::new();
        transaction.prepare_dir(&fresh).unwrap();
        transaction.prepare_dir(&sibling).unwrap();
    }
    assert!(!packages.join("com.example.app").exists());
    assert!(!sibling.exists());
    assert!(packages.join("com.example.kept/2.0.0").is_dir());
}

#[test]
fn test_rollback_restores_replaced_dir() {
    let temp = create_temp_dir();
    let dir = temp.path().join("1.0.0");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("package.ncc"), b"old").unwrap();

    {
        let transaction = Transaction::new();
        transaction.prepare_dir(&dir).unwrap();
        assert!(!dir.join("package.ncc").exists());
        fs::write(dir.join("package.ncc"), b"new").unwrap();
    }

    assert_eq!(fs::read(dir.join("package.ncc")).unwrap(), b"old");
    assert!(!backup_path(&dir).exists());
}

#[test]
fn test_commit_drops_backup_of_replaced_dir() {
    let temp = create_temp_dir();
    let dir = temp.path().join("1.0.0");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("package.ncc"), b"old").unwrap();

    let transaction = Transaction::new();
    transaction.prepare_dir(&dir).unwrap();
    fs::write(dir.join("package.ncc"), b"new").unwrap();
    transaction.commit();

    assert_eq!(fs::read(dir.join("package.ncc")).unwrap(), b"new");
    assert!(!backup_path(&dir).exists());
}

#[test]
fn test_tracking_from_several_threads() {
    let temp = create_temp_dir();
    let transaction = Transaction::new();

    std::thread::scope(|scope| {
        for i in 0..4 {
            let transaction = &transaction;
            let dir = temp.path().join(format!("p{i}"));
            scope.spawn(move || transaction.prepare_dir(&dir).unwrap());
        }
    });
    assert_eq!(transaction.created_dirs().len(), 4);

    drop(transaction);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}
