mod common;

use std::collections::HashSet;
use std::sync::Arc;

use safelink::config::StorageConfig;
use safelink::errors::SafelinkError;
use safelink::storage::{Health, ShortCode, Store};
use tempfile::TempDir;

use common::{MemoryLog, memory_store};

fn storage_config(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        data_dir: dir.path().to_string_lossy().into_owned(),
        sync_on_write: false,
        segment_max_bytes: 1024 * 1024,
    }
}

#[cfg(test)]
mod shorten_tests {
    use super::*;

    #[test]
    fn test_codes_are_sequential_and_fixed_length() {
        let (store, _log) = memory_store();
        let codes: Vec<String> = (0..3)
            .map(|i| store.shorten(&format!("https://example.com/{}", i)).unwrap().to_string())
            .collect();
        assert_eq!(codes, vec!["AAAAAA", "AAAAAB", "AAAAAC"]);
        assert!(codes.iter().all(|c| c.len() == 6));
    }

    #[test]
    fn test_idempotent_under_normalization() {
        let (store, log) = memory_store();
        let a = store.shorten("HTTPS://Example.COM/path?q=1#top").unwrap();
        let b = store.shorten("https://example.com/path?q=1").unwrap();
        let c = store.shorten("https://example.com/path?q=2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_resolve_unknown_and_malformed_codes() {
        let (store, _log) = memory_store();
        store.shorten("https://example.com/").unwrap();
        assert!(store.resolve_str("AAAAAB").is_none());
        assert!(store.resolve_str("AAAAA").is_none());
        assert!(store.resolve_str("AAAA-A").is_none());
        assert!(store.resolve_str("AAAAAA").is_some());
    }

    #[test]
    fn test_new_record_starts_unknown() {
        let (store, _log) = memory_store();
        let code = store.shorten("https://example.com/").unwrap();
        assert_eq!(store.resolve(&code).unwrap().health(), Health::Unknown);
    }

    #[test]
    fn test_log_failure_leaves_store_unchanged() {
        let (store, log) = memory_store();
        log.set_failing(true);

        let err = store.shorten("https://example.com/a").unwrap_err();
        assert!(matches!(err, SafelinkError::Persistence(_)));
        assert!(store.is_empty());
        assert!(store.find_by_address("https://example.com/a").is_none());

        log.set_failing(false);
        let code = store.shorten("https://example.com/a").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.resolve(&code).unwrap().address(),
            "https://example.com/a"
        );
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_rejects_relative_and_hostless() {
        let (store, _log) = memory_store();
        for bad in ["", "   ", "/relative/path", "example.com", "mailto:a@b.c"] {
            assert!(
                matches!(store.shorten(bad), Err(SafelinkError::Validation(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(store.is_empty());
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[test]
    fn test_concurrent_shorten_same_addresses() {
        let (store, log) = memory_store();
        let addresses: Vec<String> = (0..50)
            .map(|i| format!("https://site{}.example/", i))
            .collect();

        let results: Vec<Vec<ShortCode>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let addresses = &addresses;
                    scope.spawn(move || {
                        addresses
                            .iter()
                            .map(|a| store.shorten(a).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for thread_codes in &results[1..] {
            assert_eq!(thread_codes, &results[0]);
        }
        let unique: HashSet<_> = results[0].iter().collect();
        assert_eq!(unique.len(), 50);
        assert_eq!(store.len(), 50);
        assert_eq!(log.len(), 50);
    }

    #[test]
    fn test_concurrent_distinct_addresses_get_distinct_codes() {
        let (store, _log) = memory_store();

        let codes: Vec<ShortCode> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || {
                        (0..100)
                            .map(|i| store.shorten(&format!("https://t{}.example/{}", t, i)).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        let unique: HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), 400);
        for code in &codes {
            assert!(store.resolve(code).is_some());
        }
    }
}

#[cfg(test)]
mod persistence_tests {
    use super::*;

    #[test]
    fn test_restart_restores_every_mapping() {
        let dir = TempDir::new().unwrap();
        let config = storage_config(&dir);

        let mut expected = Vec::new();
        {
            let store = Store::open(&config);
            for i in 0..20 {
                let address = format!("https://example.com/item/{}", i);
                expected.push((store.shorten(&address).unwrap(), address));
            }
        }

        let store = Store::open(&config);
        assert_eq!(store.len(), 20);
        assert_eq!(store.stats().replayed, 20);
        for (code, address) in &expected {
            let record = store.resolve(code).unwrap();
            assert_eq!(record.address(), address);
            assert_eq!(record.health(), Health::Unknown);
        }

        // 已存在的地址复用短码，新地址从最大短码之后继续
        assert_eq!(store.shorten("https://example.com/item/3").unwrap(), expected[3].0);
        let next = store.shorten("https://example.com/new").unwrap();
        assert_eq!(next.as_str(), "AAAAAU");
    }

    #[test]
    fn test_each_startup_writes_new_segment() {
        let dir = TempDir::new().unwrap();
        let config = storage_config(&dir);

        Store::open(&config).shorten("https://a.example/").unwrap();
        Store::open(&config).shorten("https://b.example/").unwrap();
        // 只读启动不创建段文件
        let _ = Store::open(&config);

        let segments = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(segments, 2);

        let store = Store::open(&config);
        assert_eq!(store.resolve_str("AAAAAA").unwrap().address(), "https://a.example/");
        assert_eq!(store.resolve_str("AAAAAB").unwrap().address(), "https://b.example/");
    }

    #[test]
    fn test_memory_log_records_normalized_address() {
        let log = Arc::new(MemoryLog::default());
        let store = Store::new(Vec::new(), log.clone());
        store.shorten("https://EXAMPLE.com#frag").unwrap();
        assert_eq!(log.lines.lock()[0].1, "https://example.com/");
    }
}
