use hbase_scan::{
    bridge::memory::{MemoryBridge, MemoryTables},
    registry, RemoteSymbol, ScanError, ScanOptions, TableScanner,
};

// Process-wide state: keep this the only test in the binary.
#[test]
fn init_resolves_once_for_the_process() {
    assert!(matches!(registry::registry(), Err(ScanError::NotInitialized)));

    let tables = MemoryTables::new();
    let broken = MemoryBridge::new();
    broken.remove_symbol(RemoteSymbol::Type(
        "org/apache/hadoop/hbase/client/ResultScanner",
    ));
    assert!(matches!(
        registry::init(&broken),
        Err(ScanError::Resolution(_))
    ));
    assert!(matches!(
        TableScanner::with_global_registry(&broken, &tables, ScanOptions::default()),
        Err(ScanError::NotInitialized)
    ));

    let bridge = MemoryBridge::legacy();
    let first = registry::init(&bridge).expect("init");
    let second = registry::init(&MemoryBridge::new()).expect("second init");
    assert!(std::ptr::eq(first, second));
    assert_eq!(first.cell_api(), registry::CellApi::KeyValue);
    assert!(std::ptr::eq(registry::registry().expect("registry"), first));

    let scanner = TableScanner::with_global_registry(&bridge, &tables, ScanOptions::default())
        .expect("scanner");
    assert!(!scanner.is_closed());
}
