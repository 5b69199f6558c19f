//! Helpers shared by the crate's tests.
//!
//! Always compiled so both the inline unit tests and the `tests/`
//! integration suites can use them; nothing here ends up in a release
//! caller's path unless they ask for it.

use std::path::Path;
use std::sync::Once;

use crate::config::Config;
use crate::util;

static LOG_INIT: Once = Once::new();

/// Initialize logging for a test run. Safe to call from every test;
/// only the first call does anything.
pub fn init_logging() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Write *cfg* out as INI text at *path* so file-based lifecycle tests
/// (`read`, `changed`) have something real to load.
pub fn write_config_file(cfg: &Config, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, cfg.dump(true))
}

/// A minimal crawler config with the given quiet_time spec.
pub fn quiet_config(spec: &str) -> Config {
    Config::from_dict([("crawler", vec![("quiet_time", spec)])])
}

/// Assert that `quiet_time` reports *expected* at the moment *probe*
/// names, with a failure message that shows the probe as a human-readable
/// timestamp rather than a bare epoch count.
pub fn assert_quiet(cfg: &Config, probe: &str, expected: bool) {
    let when = util::epoch(probe)
        .unwrap_or_else(|e| panic!("bad probe time '{probe}': {e}"));
    let actual = cfg
        .quiet_time(when)
        .unwrap_or_else(|e| panic!("quiet_time failed at {}: {e}", util::ymdhms(when)));
    assert_eq!(
        actual,
        expected,
        "expected quiet_time == {expected} at {} (spec '{}')",
        util::ymdhms(when),
        cfg.get_d("crawler", "quiet_time", "<unset>")
    );
}

/// A crawler config pointing its database section at *dbname* with the
/// standard test table prefix.
pub fn sqlite_db_config(dbname: &str) -> Config {
    Config::from_dict([(
        "dbi-crawler",
        vec![
            ("dbtype", "sqlite"),
            ("dbname", dbname),
            ("tbl_prefix", "test"),
        ],
    )])
}
