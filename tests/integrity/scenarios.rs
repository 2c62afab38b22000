use verity::error::Error;
use verity::fco::prop::HashDisplay;
use verity::fco::Genre;
use verity::ops;
use verity::print::report::ReportLevel;

use crate::common::{Fixture, LOCAL_PASS};

fn check(fx: &Fixture) -> (String, u8) {
    ops::check(&fx.config, LOCAL_PASS, ReportLevel::Parseable, HashDisplay::Hex)
        .expect("integrity check")
}

#[test]
fn init_and_verify() {
    let fx = Fixture::new();
    fx.write_file("a", b"hello\nwor\n");
    fx.write_file("b/c", b"");

    ops::init(&fx.config, LOCAL_PASS).expect("init");

    // the database holds the two files plus their directories
    let keyfile =
        verity::archive::keyfile::Keyfile::load(&fx.config.local_keyfile).unwrap();
    let db = ops::load_database(&fx.config.database_file, keyfile.public()).unwrap();
    assert_eq!(db.tree.record_count(), 4); // watched, a, b, b/c

    // an immediate re-check is clean
    let (text, status) = check(&fx);
    assert_eq!(status, 0, "clean tree reported violations:\n{text}");
    assert!(text.is_empty(), "parseable output should list nothing:\n{text}");
}

#[test]
fn detect_modification() {
    let fx = Fixture::new();
    fx.write_file("a", b"hello\nwor\n");
    ops::init(&fx.config, LOCAL_PASS).expect("init");

    fx.append_file("a", b"x");

    let (_, status) = check(&fx);
    assert_ne!(status & 4, 0, "changed bit must be set");

    // inspect the stored report
    let keyfile =
        verity::archive::keyfile::Keyfile::load(&fx.config.local_keyfile).unwrap();
    let report_file = fx.report_files().pop().expect("a report was written");
    let report = ops::load_report(&report_file, keyfile.public()).unwrap();

    let spec = &report.specs(Genre::Fs)[0];
    let entry = spec
        .changed()
        .find(|e| e.new.name().as_string().ends_with("/a"))
        .expect("a is reported changed");
    use verity::fco::prop::{Prop, PropValue};
    assert!(entry.mask.contains(Prop::Size));
    assert!(entry.mask.contains(Prop::Sha1));
    assert_eq!(entry.old.get(Prop::Size).unwrap(), &PropValue::Int64(10));
    assert_eq!(entry.new.get(Prop::Size).unwrap(), &PropValue::Int64(11));
}

#[test]
fn detect_addition_and_removal() {
    let fx = Fixture::new();
    fx.write_file("a", b"hello\nwor\n");
    fx.write_file("b/c", b"");
    ops::init(&fx.config, LOCAL_PASS).expect("init");

    fx.write_file("a2", b"fresh");
    fx.remove_file("b/c");

    let (text, status) = check(&fx);
    assert_ne!(status & 1, 0, "added bit must be set");
    assert_ne!(status & 2, 0, "removed bit must be set");
    assert!(text.contains("added"));
    assert!(text.contains("/a2"));
    assert!(text.contains("removed"));
    assert!(text.contains("/b/c"));
}

#[test]
fn stop_point_suppresses_subtree() {
    let fx = Fixture::new();
    fx.write_file("a", b"data");
    fx.write_file("b/c", b"original");

    // same mask, but prune at watched/b
    let watched = fx.watched_str();
    fx.install_policy(&format!("{watched} -> +tsmS ;\n!{watched}/b ;\n"));
    ops::init(&fx.config, LOCAL_PASS).expect("init");

    fx.write_file("b/c", b"modified beyond the stop point");

    let (text, status) = check(&fx);
    assert_eq!(status, 0, "stop point must suppress the change:\n{text}");
}

#[test]
fn wrong_passphrase_writes_no_report() {
    let fx = Fixture::new();
    fx.write_file("a", b"data");
    ops::init(&fx.config, LOCAL_PASS).expect("init");

    let result = ops::check(
        &fx.config,
        "not the passphrase",
        ReportLevel::Parseable,
        HashDisplay::Hex,
    );
    assert!(matches!(result, Err(Error::WrongPassphrase)));
    assert!(fx.report_files().is_empty(), "no report may be written");
}

#[test]
fn tampered_database_is_rejected() {
    let fx = Fixture::new();
    fx.write_file("a", b"data");
    ops::init(&fx.config, LOCAL_PASS).expect("init");

    let bytes = std::fs::read(&fx.config.database_file).unwrap();
    let keyfile =
        verity::archive::keyfile::Keyfile::load(&fx.config.local_keyfile).unwrap();

    // flipping any single byte must invalidate the artifact
    for pos in [bytes.len() / 3, bytes.len() / 2, bytes.len() - 1] {
        let mut tampered = bytes.clone();
        tampered[pos] ^= 0x01;
        std::fs::write(&fx.config.database_file, &tampered).unwrap();

        let result = ops::load_database(&fx.config.database_file, keyfile.public());
        assert!(result.is_err(), "tampered byte {pos} was accepted");
    }

    // restored, it loads again
    std::fs::write(&fx.config.database_file, &bytes).unwrap();
    assert!(ops::load_database(&fx.config.database_file, keyfile.public()).is_ok());
}

#[test]
fn config_roundtrip_and_key_mismatch() {
    use verity::config::{load_config, save_config};

    let fx = Fixture::new();
    let site =
        verity::archive::keyfile::Keyfile::load(&fx.config.site_keyfile).unwrap();
    let signing = site.unlock(crate::common::SITE_PASS).unwrap();

    let cfg_path = fx.tempdir.path().join("verity.cfg");
    save_config(&cfg_path, &fx.config, &signing).unwrap();

    // verifies against the embedded key without any keyfile
    let loaded = load_config(&cfg_path, None).unwrap();
    assert_eq!(&loaded, &fx.config);

    // and detects a site-key mismatch when one is expected
    let other = verity::archive::keyfile::Keyfile::generate(
        verity::archive::keyfile::KeyRole::Site,
        "other",
    )
    .unwrap();
    assert!(matches!(
        load_config(&cfg_path, Some(other.public())),
        Err(Error::KeyMismatch { .. })
    ));
}

#[test]
fn update_database_after_check() {
    let fx = Fixture::new();
    fx.write_file("a", b"hello\nwor\n");
    ops::init(&fx.config, LOCAL_PASS).expect("init");

    fx.append_file("a", b"x");
    let (_, status) = check(&fx);
    assert_ne!(status, 0);

    let report_file = fx.report_files().pop().expect("a report was written");
    ops::update_db(&fx.config, LOCAL_PASS, &report_file, false).expect("update-db");

    // the next check is clean
    let (_, status) = check(&fx);
    assert_eq!(status, 0);
}

#[test]
fn exit_status_bits_are_orable() {
    let fx = Fixture::new();
    fx.write_file("keep", b"same");
    fx.write_file("mutate", b"before");
    fx.write_file("drop", b"bye");
    ops::init(&fx.config, LOCAL_PASS).expect("init");

    fx.write_file("extra", b"new");
    fx.append_file("mutate", b"!");
    fx.remove_file("drop");

    let (_, status) = check(&fx);
    assert_eq!(status & 7, 7, "all three violation bits should be set, got {status}");
}
