// tests/linker.rs

//! Symlink farm behaviour against a real cellar install.

mod common;

use common::*;
use setpm::recipe::parse_recipe;
use setpm::{ErrorKind, Kitchen};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn install_foo(env: &TestEnv) -> PathBuf {
    let recipe = parse_recipe(foo_recipe(&format!("url = \"{FOO_URL}\"")).as_bytes()).unwrap();
    let client = Arc::new(FixtureClient::new().serve(FOO_URL, foo_archive()));
    Kitchen::new(env.kitchen_config(), client)
        .run(&recipe)
        .unwrap()
        .install_dir
}

#[test]
fn test_link_then_unlink_restores_prefix() {
    let env = TestEnv::new();
    let install_dir = install_foo(&env);

    // unrelated content already in the prefix
    fs::create_dir_all(env.prefix.join("bin")).unwrap();
    fs::write(env.prefix.join("bin/other"), b"other tool").unwrap();
    std::os::unix::fs::symlink("other", env.prefix.join("bin/other-alias")).unwrap();
    let before = snapshot(&env.prefix);

    let linker = env.linker();
    let report = linker.link(&install_dir).unwrap();
    assert_eq!(report.linked.len(), 3);
    assert!(report.conflicts.is_empty());
    assert_eq!(fs::read(env.prefix.join("bin/foo")).unwrap(), fs::read(install_dir.join("bin/foo")).unwrap());
    assert_ne!(snapshot(&env.prefix), before);

    linker.unlink(&install_dir).unwrap();
    assert_eq!(snapshot(&env.prefix), before);
    // category directories created by link stay
    assert!(env.prefix.join("share/foo").is_dir());
}

#[test]
fn test_relink_is_idempotent() {
    let env = TestEnv::new();
    let install_dir = install_foo(&env);
    let linker = env.linker();

    let first = linker.link(&install_dir).unwrap();
    let after_first = snapshot(&env.prefix);
    let second = linker.link(&install_dir).unwrap();

    assert!(second.conflicts.is_empty());
    assert_eq!(first.linked, second.linked);
    assert_eq!(snapshot(&env.prefix), after_first);
}

#[test]
fn test_every_link_targets_the_cellar() {
    let env = TestEnv::new();
    let install_dir = install_foo(&env);
    env.linker().link(&install_dir).unwrap();

    for (relative, node) in snapshot(&env.prefix) {
        match node {
            Node::Link(target) => {
                assert!(target.is_absolute());
                assert_eq!(target, install_dir.join(&relative));
            }
            Node::File(_) => panic!("{} is not a link", relative.display()),
        }
    }
}

#[test]
fn test_foreign_file_conflict_is_reported() {
    let env = TestEnv::new();
    let install_dir = install_foo(&env);
    fs::write(env.prefix.join("marker"), b"not ours").unwrap();

    let report = env.linker().link(&install_dir).unwrap();
    assert_eq!(report.conflicts, vec![PathBuf::from("marker")]);
    assert_eq!(fs::read_link(env.prefix.join("marker")).unwrap(), install_dir.join("marker"));
}

#[test]
fn test_uninstalled_package_cannot_be_linked() {
    let env = TestEnv::new();
    let missing = env.cellar.join("foo/9.9");
    let err = env.linker().link(Path::new(&missing)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInstalled);
}

#[test]
fn test_concurrent_links_to_one_prefix() {
    let env = TestEnv::new();
    let install_dir = install_foo(&env);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                env.linker().link(&install_dir).unwrap();
            });
        }
    });

    assert_eq!(
        fs::read_link(env.prefix.join("bin/foo")).unwrap(),
        install_dir.join("bin/foo")
    );
}
