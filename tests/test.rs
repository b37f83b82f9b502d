use std::io::Cursor;

use bcsv::{ColumnDefinition, ColumnType, Error, Reader, ReaderDirectAccess, Row, Value, Writer, WriterOptions};

fn mixed_layout() -> bcsv::Layout {
    bcsv::Layout::new(vec![
        ColumnDefinition::new("active", ColumnType::Bool),
        ColumnDefinition::new("id", ColumnType::Uint32),
        ColumnDefinition::new("score", ColumnType::Double),
        ColumnDefinition::new("name", ColumnType::String),
    ])
    .unwrap()
}

fn sample_row(layout: &bcsv::Layout, i: u32) -> Row {
    let mut row = Row::new(layout);
    row.set(0, Value::Bool(i % 2 == 0)).unwrap();
    row.set(1, Value::Uint32(i)).unwrap();
    row.set(2, Value::Double(i as f64 * 1.5)).unwrap();
    row.set(3, Value::String(format!("item-{i}"))).unwrap();
    row
}

fn assert_row(row: &Row, i: u32) {
    assert_eq!(row.get(0), &Value::Bool(i % 2 == 0));
    assert_eq!(row.get(1), &Value::Uint32(i));
    assert_eq!(row.get(2), &Value::Double(i as f64 * 1.5));
    assert_eq!(row.get(3).as_str(), Some(format!("item-{i}").as_str()));
}

fn write_all(options: WriterOptions, row_count: u32) -> Vec<u8> {
    let layout = mixed_layout();
    let mut writer = Writer::create(Cursor::new(Vec::new()), layout.clone(), options).unwrap();
    for i in 0..row_count {
        let mut row = sample_row(&layout, i);
        writer.write_row(&mut row).unwrap();
    }
    writer.close().unwrap().into_inner()
}

#[test]
fn round_trips_every_file_codec() {
    let variants = [
        ("stream", WriterOptions { streaming: true, compression_level: 0, ..WriterOptions::default() }),
        ("stream_lz4", WriterOptions { streaming: true, compression_level: 3, ..WriterOptions::default() }),
        ("packet", WriterOptions { compression_level: 0, ..WriterOptions::default() }),
        ("packet_lz4", WriterOptions { compression_level: 3, batch_compression: false, ..WriterOptions::default() }),
        ("packet_lz4_batch", WriterOptions { compression_level: 3, batch_compression: true, ..WriterOptions::default() }),
    ];

    for (name, options) in variants {
        let bytes = write_all(options, 50);
        let mut reader = Reader::open(Cursor::new(bytes)).unwrap();
        for i in 0..50u32 {
            let row = reader.read_row().unwrap().unwrap_or_else(|| panic!("{name}: missing row {i}"));
            assert_row(row, i);
        }
        assert!(reader.read_row().unwrap().is_none(), "{name}: expected EOF after last row");
    }
}

#[test]
fn zoh_repeats_collapse_and_round_trip() {
    let layout = mixed_layout();
    let options = WriterOptions { zoh_enabled: true, ..WriterOptions::default() };
    let mut writer = Writer::create(Cursor::new(Vec::new()), layout.clone(), options).unwrap();

    let mut row = sample_row(&layout, 7);
    for _ in 0..10 {
        writer.write_row(&mut row).unwrap();
    }
    let mut changed_row = sample_row(&layout, 8);
    writer.write_row(&mut changed_row).unwrap();
    let bytes = writer.close().unwrap().into_inner();

    let mut reader = Reader::open(Cursor::new(bytes)).unwrap();
    for _ in 0..10 {
        let row = reader.read_row().unwrap().unwrap();
        assert_row(row, 7);
    }
    let last = reader.read_row().unwrap().unwrap();
    assert_row(last, 8);
    assert!(reader.read_row().unwrap().is_none());
}

#[test]
fn packet_boundaries_are_transparent_to_sequential_reads() {
    let options = WriterOptions {
        zoh_enabled: true,
        packet_size: bcsv::definitions::MIN_PACKET_SIZE as u32,
        ..WriterOptions::default()
    };
    let bytes = write_all(options, 2_000);

    let mut reader = Reader::open(Cursor::new(bytes)).unwrap();
    for i in 0..2_000u32 {
        let row = reader.read_row().unwrap().unwrap();
        assert_row(row, i);
    }
    assert!(reader.read_row().unwrap().is_none());
}

#[test]
fn corrupted_packet_payload_is_rejected_with_checksum_mismatch() {
    let options = WriterOptions { packet_size: bcsv::definitions::MIN_PACKET_SIZE as u32, ..WriterOptions::default() };
    let mut bytes = write_all(options, 100);

    // Flip a byte well inside the packet body (past the fixed header and
    // schema, and before the footer) to corrupt the payload without
    // touching the packet's own framing magic.
    let corrupt_at = bytes.len() / 2;
    bytes[corrupt_at] ^= 0xFF;

    let mut reader = Reader::open(Cursor::new(bytes)).unwrap();
    let mut saw_checksum_mismatch = false;
    loop {
        match reader.read_row() {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(Error::ChecksumMismatch { .. }) => {
                saw_checksum_mismatch = true;
                break;
            }
            Err(_) => break,
        }
    }
    assert!(saw_checksum_mismatch, "expected a checksum mismatch somewhere while reading the corrupted file");
}

#[test]
fn direct_access_rebuilds_index_and_finds_rows_without_a_footer() {
    let layout = mixed_layout();
    let options = WriterOptions {
        packet_size: bcsv::definitions::MIN_PACKET_SIZE as u32,
        build_index: false,
        ..WriterOptions::default()
    };
    let mut writer = Writer::create(Cursor::new(Vec::new()), layout.clone(), options).unwrap();
    for i in 0..1_000u32 {
        let mut row = sample_row(&layout, i);
        writer.write_row(&mut row).unwrap();
    }
    let bytes = writer.close().unwrap().into_inner();

    let mut direct = ReaderDirectAccess::open(Cursor::new(bytes)).unwrap();
    assert!(direct.packet_count() > 1, "expected several packets at this packet size");
    for &i in &[0u32, 1, 500, 999] {
        let row = direct.seek_to_row(i as u64).unwrap();
        assert_row(row, i);
    }
}

#[test]
fn batch_lz4_codec_handles_sustained_writes_without_loss_or_duplication() {
    const ROWS: u32 = 100_000;
    let options = WriterOptions {
        compression_level: 4,
        batch_compression: true,
        packet_size: bcsv::definitions::MIN_PACKET_SIZE as u32,
        ..WriterOptions::default()
    };
    let bytes = write_all(options, ROWS);

    let mut reader = Reader::open(Cursor::new(bytes)).unwrap();
    let mut count = 0u32;
    while let Some(row) = reader.read_row().unwrap() {
        assert_row(row, count);
        count += 1;
    }
    assert_eq!(count, ROWS, "row count must match exactly: no loss, no duplication");
}
