use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use verity::config::Config;
use verity::ops;

pub const SITE_PASS: &str = "site passphrase";
pub const LOCAL_PASS: &str = "local passphrase";

/// A sandbox with keyfiles, a signed policy over `watched/`, and a config
/// pointing at all of them.
pub struct Fixture {
    pub tempdir: TempDir,
    pub config: Config,
}

impl Fixture {
    /// Sets up keys and a policy measuring file type, size, mtime and
    /// SHA-1 under the watched directory.
    pub fn new() -> Self {
        Self::with_mask("+tsmS")
    }

    pub fn with_mask(mask: &str) -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        let root = tempdir.path();
        fs::create_dir(root.join("watched")).expect("create watched dir");

        let config = Config {
            site_keyfile: root.join("site.key"),
            local_keyfile: root.join("local.key"),
            policy_file: root.join("verity.pol"),
            database_file: root.join("verity.twd"),
            report_dir: root.to_path_buf(),
            ..Config::default()
        };

        ops::generate_keys(&config.site_keyfile, SITE_PASS, &config.local_keyfile, LOCAL_PASS)
            .expect("generate keys");

        let fixture = Self { tempdir, config };
        fixture.install_policy(&format!("{} -> {mask} ;\n", fixture.watched_str()));
        fixture
    }

    pub fn watched(&self) -> PathBuf {
        self.tempdir.path().join("watched")
    }

    pub fn watched_str(&self) -> String {
        self.watched().to_string_lossy().into_owned()
    }

    pub fn install_policy(&self, text: &str) {
        let site = verity::archive::keyfile::Keyfile::load(&self.config.site_keyfile).unwrap();
        let signing = site.unlock(SITE_PASS).unwrap();
        ops::save_policy_text(&self.config.policy_file, text, &signing)
            .expect("install policy");
    }

    pub fn write_file(&self, name: &str, data: &[u8]) {
        let path = self.watched().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, data).expect("write fixture file");
    }

    pub fn append_file(&self, name: &str, data: &[u8]) {
        use std::io::Write;
        let mut f = fs::OpenOptions::new()
            .append(true)
            .open(self.watched().join(name))
            .unwrap();
        f.write_all(data).unwrap();
    }

    pub fn remove_file(&self, name: &str) {
        fs::remove_file(self.watched().join(name)).unwrap();
    }

    /// Report files the checks in this sandbox have produced, oldest
    /// first.
    pub fn report_files(&self) -> Vec<PathBuf> {
        let mut reports: Vec<PathBuf> = fs::read_dir(self.tempdir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "twr"))
            .collect();
        reports.sort();
        reports
    }
}
