//! Loading and saving configuration files, including the fail-open loaders.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use kook_config::{ConfigError, YamlConfiguration};

/// Collects everything a `tracing` subscriber writes.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber writing into the returned logs.
fn with_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

#[test]
fn test_save_then_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/config.yml");

    let mut config = YamlConfiguration::new();
    config.set("server.port", 8080);
    config.set_comments("server", vec![Some("network".to_string())]);
    config.save(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# network\nserver:\n  port: 8080\n");

    let mut reloaded = YamlConfiguration::new();
    reloaded.load(&path).unwrap();
    assert_eq!(reloaded.get_i64("server.port"), Some(8080));
    assert_eq!(reloaded.comments("server"), [Some("network".to_string())]);
}

#[test]
fn test_load_strips_byte_order_mark() {
    let mut config = YamlConfiguration::new();
    config.load_from_reader("\u{feff}name: kook\n".as_bytes()).unwrap();
    assert_eq!(config.get_string("name"), Some("kook"));
}

#[test]
fn test_save_to_writer() {
    let mut config = YamlConfiguration::new();
    config.set("a", vec![1, 2]);
    let mut out = Vec::new();
    config.save_to_writer(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "a:\n- 1\n- 2\n");
}

#[test]
fn test_load_errors_are_returned() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = YamlConfiguration::new();

    let missing = config.load(dir.path().join("missing.yml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io(e) if e.kind() == io::ErrorKind::NotFound));

    let path = dir.path().join("broken.yml");
    std::fs::write(&path, "a: 'unterminated\n").unwrap();
    let broken = config.load(&path).unwrap_err();
    let ConfigError::Format(error) = &broken else {
        panic!("expected a format error, got {broken:?}");
    };
    assert_eq!(error.line, Some(1));
    assert!(error.source.is_some());
}

#[test]
fn test_missing_file_loads_empty_without_error_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.yml");

    let (config, logs) = with_logs(|| YamlConfiguration::load_configuration(&path));
    assert!(config.is_empty());
    assert!(!logs.contains("ERROR"), "{logs}");
    assert!(logs.contains("configuration file does not exist"), "{logs}");
}

#[test]
fn test_broken_file_loads_empty_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yml");
    std::fs::write(&path, "- just\n- a list\n").unwrap();

    let (config, logs) = with_logs(|| YamlConfiguration::load_configuration(&path));
    assert!(config.is_empty());
    assert!(logs.contains("ERROR"), "{logs}");
    assert!(logs.contains("cannot load configuration"), "{logs}");
    assert!(logs.contains("top level is not a mapping"), "{logs}");
}

#[test]
fn test_broken_reader_loads_empty_and_logs() {
    let (config, logs) = with_logs(|| YamlConfiguration::load_configuration_from_reader(&b"a: [1\n"[..]));
    assert!(config.is_empty());
    assert!(logs.contains("unclosed flow sequence"), "{logs}");

    let (config, logs) = with_logs(|| YamlConfiguration::load_configuration_from_reader(&b"\xff\xfe"[..]));
    assert!(config.is_empty());
    assert!(logs.contains("I/O error"), "{logs}");
}

#[test]
fn test_fail_open_reload_clears_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "a: 1\n").unwrap();

    let mut config = YamlConfiguration::new();
    config.load_or_clear(&path);
    assert_eq!(config.get_i64("a"), Some(1));

    std::fs::write(&path, "a: [\n").unwrap();
    let (_, logs) = with_logs(|| config.load_or_clear(&path));
    assert!(config.is_empty());
    assert!(logs.contains("cannot load configuration"), "{logs}");
}
