//! Unit tests for working-directory scaffolding

use enclave_mirror::workdir::create_working_dirs;

#[test]
fn test_create_working_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    create_working_dirs(tmp.path()).unwrap();

    for dir in [
        "cluster-resources",
        "signatures",
        "release-images",
        "operator-catalogs",
        "additional-images",
    ] {
        assert!(tmp.path().join(dir).is_dir(), "{} should exist", dir);
    }

    // idempotent: existing directories are left alone
    std::fs::write(tmp.path().join("signatures").join("test.sig"), b"sig").unwrap();
    create_working_dirs(tmp.path()).unwrap();
    assert!(tmp.path().join("signatures").join("test.sig").is_file());
}
