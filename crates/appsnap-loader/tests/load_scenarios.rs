//! End-to-end loading of bare, appended and embedded snapshots.

mod common;

use std::fs;

use appsnap_loader::container::probe_file;
use appsnap_loader::{
    AppSnapshot, ContainerFormat, ErrorKind, LoadOptions, MagicNumber, Region, RegionDirectory,
    RegionEntry, Snapshot, SnapshotBuilder, SnapshotLayout, CODE_ALIGNMENT,
};

fn exactly_one_kind(snapshot: &AppSnapshot) -> bool {
    [
        snapshot.is_jit(),
        snapshot.is_aot(),
        snapshot.is_kernel(),
        snapshot.is_kernel_list(),
    ]
    .iter()
    .filter(|hit| **hit)
    .count()
        == 1
}

// ────────────────────────────────────────────────────────────────────────────
// Bare payloads
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bare_kernel_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = common::kernel(&[]);
    bytes.resize(2048, 0x5a);
    let path = common::write(dir.path(), "app.dill", &bytes);

    let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap();
    assert!(snapshot.is_kernel());
    assert!(exactly_one_kind(&snapshot));
    assert_eq!(snapshot.layout(), SnapshotLayout::BareFile);

    let buffers = snapshot.set_buffers();
    let isolate_data = buffers.isolate_data();
    assert!(!isolate_data.is_null());
    assert_eq!(isolate_data.len, 2044);
    assert!(buffers.vm_data().is_null());
    assert!(buffers.vm_instructions().is_null());
    assert!(buffers.isolate_instructions().is_null());
    assert_eq!(buffers.vm_data().len, 0);
}

#[test]
fn test_write_then_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.jit");
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 253) as u8).collect();
    let instructions: Vec<u8> = (0..777u32).map(|i| (i % 7) as u8).collect();
    Snapshot::write_app_snapshot(&path, &data, &instructions).unwrap();

    for in_memory in [false, true] {
        let options = LoadOptions::default().in_memory(in_memory);
        let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &options).unwrap();
        assert!(snapshot.is_jit());
        assert!(exactly_one_kind(&snapshot));

        let buffers = snapshot.set_buffers();
        assert_eq!(buffers.as_slice(Region::IsolateData), Some(&data[..]));
        assert_eq!(buffers.as_slice(Region::IsolateInstructions), Some(&instructions[..]));
        assert_eq!(buffers.as_slice(Region::VmData), None);
        assert_eq!(buffers.as_slice(Region::VmInstructions), None);
        assert_eq!(buffers.isolate_instructions().ptr as usize % CODE_ALIGNMENT, 0);
    }
}

#[test]
fn test_set_buffers_returns_same_pointers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.jit");
    Snapshot::write_app_snapshot(&path, &[1; 64], &[2; 64]).unwrap();

    let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap();
    let first = snapshot.set_buffers();
    let second = snapshot.set_buffers();
    for region in Region::ALL {
        assert_eq!(first.view(region), second.view(region));
    }
}

#[test]
fn test_in_memory_load_outlives_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.jit");
    Snapshot::write_app_snapshot(&path, b"isolate", b"code").unwrap();

    let options = LoadOptions::default().in_memory(true);
    let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &options).unwrap();
    assert!(!snapshot.is_file_backed());

    fs::remove_file(&path).unwrap();
    let buffers = snapshot.set_buffers();
    assert_eq!(buffers.as_slice(Region::IsolateData), Some(&b"isolate"[..]));
}

#[cfg(unix)]
#[test]
fn test_default_load_maps_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.jit");
    Snapshot::write_app_snapshot(&path, b"isolate", b"code").unwrap();

    let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap();
    assert!(snapshot.is_file_backed());
}

#[test]
fn test_decode_uri() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write(dir.path(), "app name", &common::kernel(b"body"));

    let file_uri = url::Url::from_file_path(&path).unwrap().to_string();
    assert!(file_uri.contains("app%20name"));
    let snapshot = Snapshot::read_app_snapshot(&file_uri, &LoadOptions::default()).unwrap();
    assert!(snapshot.is_kernel());

    let encoded = common::uri(&path).replace(' ', "%20");
    assert!(Snapshot::try_read_app_snapshot(&encoded, &LoadOptions::default()).is_some());

    let err = Snapshot::read_app_snapshot(&encoded, &LoadOptions::default().decode(false)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_truncated_instructions() {
    let dir = tempfile::tempdir().unwrap();
    let mut directory = RegionDirectory::new(MagicNumber::AppJit);
    directory.set(Region::IsolateData, RegionEntry::new(128, 64));
    directory.set(Region::IsolateInstructions, RegionEntry::new(256, 4096));
    let mut payload = directory.encode().to_vec();
    payload.resize(1024, 0);
    let path = common::write(dir.path(), "corrupt.jit", &payload);

    for in_memory in [false, true] {
        let options = LoadOptions::default().in_memory(in_memory);
        let err = Snapshot::read_app_snapshot(&common::uri(&path), &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncation);
        assert!(Snapshot::try_read_app_snapshot(&common::uri(&path), &options).is_none());
    }
}

#[test]
fn test_gzip_file_is_inflated() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&common::kernel(b"compressed program")).unwrap();
    let path = common::write(dir.path(), "app.dill.gz", &encoder.finish().unwrap());

    let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap();
    assert!(snapshot.is_kernel());
    assert_eq!(snapshot.layout(), SnapshotLayout::InMemory);
    assert_eq!(
        snapshot.set_buffers().as_slice(Region::IsolateData),
        Some(&b"compressed program"[..])
    );
}

// ────────────────────────────────────────────────────────────────────────────
// Payloads inside host executables
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_aot_appended_to_macho() {
    let Some(aot) = MagicNumber::host_aot() else {
        return;
    };
    const HOST_LEN: usize = 1 << 20;
    const PAYLOAD_LEN: usize = 512 * 1024;

    let mut directory = RegionDirectory::new(aot);
    let regions = [
        (Region::VmData, RegionEntry::new(128, 256), 0x11),
        (Region::VmInstructions, RegionEntry::new(384, 131_072), 0x22),
        (Region::IsolateData, RegionEntry::new(131_456, 256), 0x33),
        (Region::IsolateInstructions, RegionEntry::new(131_712, 380_000), 0x44),
    ];
    let mut payload = vec![0u8; PAYLOAD_LEN];
    for (region, entry, fill) in regions {
        directory.set(region, entry);
        let start = entry.offset as usize;
        payload[start..start + entry.length as usize].fill(fill);
    }
    payload[..72].copy_from_slice(&directory.encode());

    let mut image = common::macho(HOST_LEN, None);
    image.extend_from_slice(&payload);
    let dir = tempfile::tempdir().unwrap();
    let path = common::write(dir.path(), "host", &image);

    let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap();
    assert!(snapshot.is_aot());
    assert!(snapshot.is_jit_or_aot());
    assert!(exactly_one_kind(&snapshot));
    assert_eq!(snapshot.layout(), SnapshotLayout::Appended(ContainerFormat::MachO));
    assert_eq!(snapshot.payload_len(), PAYLOAD_LEN);

    let buffers = snapshot.set_buffers();
    for (region, entry, _) in regions {
        let absolute = HOST_LEN + entry.offset as usize;
        let expected = &image[absolute..absolute + entry.length as usize];
        assert_eq!(buffers.as_slice(region), Some(expected), "{}", region.name());
    }
    assert_eq!(buffers.vm_instructions().ptr as usize % CODE_ALIGNMENT, 0);
    assert_eq!(buffers.isolate_instructions().ptr as usize % CODE_ALIGNMENT, 0);

    let explicit = appsnap_loader::loader::read_appended_from(&path, ContainerFormat::MachO, &LoadOptions::default())
        .unwrap();
    assert_eq!(explicit.magic(), aot);
}

#[test]
fn test_unrecognized_appended_payload() {
    let mut image = common::macho(32 * 1024, None);
    image.extend_from_slice(b"definitely not a snapshot");
    let dir = tempfile::tempdir().unwrap();
    let path = common::write(dir.path(), "host", &image);

    let err = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Classification);
    assert!(Snapshot::try_read_app_snapshot(&common::uri(&path), &LoadOptions::default()).is_none());
    assert_eq!(probe_file(&path), Some(ContainerFormat::MachO));
}

#[test]
fn test_container_without_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write(dir.path(), "host", &common::macho(16 * 1024, None));
    let err = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoPayload);
}

#[test]
fn test_named_section_wins() {
    let mut image = common::macho(32 * 1024, Some((16 * 1024, 9)));
    image[16 * 1024..16 * 1024 + 9].copy_from_slice(&common::kernel(b"inner"));
    // Appended bytes are ignored once a section names the payload
    image.extend_from_slice(b"trailing junk");
    let dir = tempfile::tempdir().unwrap();
    let path = common::write(dir.path(), "host", &image);

    let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap();
    assert_eq!(snapshot.layout(), SnapshotLayout::Section(ContainerFormat::MachO));
    assert_eq!(
        snapshot.set_buffers().as_slice(Region::IsolateData),
        Some(&b"inner"[..])
    );
}

#[test]
fn test_append_then_read_elf() {
    let dir = tempfile::tempdir().unwrap();
    let host = common::write(dir.path(), "host", &common::elf(10_000));
    let payload = SnapshotBuilder::new(MagicNumber::AppJit)
        .unwrap()
        .region(Region::IsolateData, b"heap".to_vec())
        .region(Region::IsolateInstructions, vec![0xc3; 32])
        .build();
    let out = dir.path().join("app");

    let location = Snapshot::append_app_snapshot(&host, &payload, &out).unwrap();
    assert_eq!(location.format, ContainerFormat::Elf);
    assert_eq!(location.offset, 16 * 1024);

    let snapshot =
        appsnap_loader::loader::read_appended_from(&out, ContainerFormat::Elf, &LoadOptions::default()).unwrap();
    assert!(snapshot.is_jit());
    assert_eq!(snapshot.layout(), SnapshotLayout::Appended(ContainerFormat::Elf));
    let buffers = snapshot.set_buffers();
    assert_eq!(buffers.as_slice(Region::IsolateData), Some(&b"heap"[..]));
    assert_eq!(buffers.as_slice(Region::IsolateInstructions), Some(&[0xc3; 32][..]));

    #[cfg(not(any(target_vendor = "apple", windows)))]
    assert!(Snapshot::try_read_appended_app_snapshot(&out).is_some());
}

#[test]
fn test_buffers_shared_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.jit");
    let data = vec![0x7e; 4096];
    Snapshot::write_app_snapshot(&path, &data, &[0x90; 64]).unwrap();

    let snapshot = Snapshot::read_app_snapshot(&common::uri(&path), &LoadOptions::default()).unwrap();
    let buffers = snapshot.set_buffers();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(move || {
                    buffers.acquire();
                    buffers
                        .as_slice(Region::IsolateData)
                        .map(|bytes| bytes.iter().map(|b| *b as u64).sum::<u64>())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(0x7e * 4096));
        }
    });
}
