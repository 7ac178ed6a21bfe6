use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use vdec::engine::stream::{PictureUnit, SequenceHeader, SyntheticStream};
use vdec::prelude::*;

/// Scratch directory removed when the test ends.
struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("vdec-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self, file: &str) -> PathBuf {
        self.0.join(file)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn header(width: u32, height: u32, bit_depth: u8) -> SequenceHeader {
    SequenceHeader::new(Dimension::new(width, height), ChromaMode::Yuv420, bit_depth)
}

fn config(dir: &Scratch, stream: SyntheticStream) -> Config {
    let input = dir.path("in.bin");
    stream.write_to(&input).unwrap();
    Config {
        input,
        output: Some(dir.path("out.yuv")),
        ..Default::default()
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn single_picture_is_written_as_planar_yuv() {
    let dir = Scratch::new("single");
    let stream = SyntheticStream::new().sequence(header(64, 64, 8)).picture(PictureUnit::new(0x2a));
    let config = config(&dir, stream);
    let output = config.output.clone().unwrap();

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(report.displayed, 1);
    assert_eq!(report.decoded, 1);
    assert_eq!(report.conceal, 0);
    assert!(!report.timed_out);
    assert_eq!(file_len(&output), 64 * 64 * 3 / 2);
    assert_eq!(fs::read(&output).unwrap()[0], 0x2a);
    assert!(report.statistics().starts_with("Decoded time = "));
}

#[test]
fn max_frames_stops_the_channel_early() {
    let dir = Scratch::new("max-frames");
    const PICTURES: u64 = 1000;
    const PICTURE_BYTES: u64 = 64 * 64 * 3 / 2;
    let stream = SyntheticStream::new()
        .sequence(header(64, 64, 8))
        .pictures(0, PICTURES as u32);
    // Four pictures per input buffer: most of the stream is still unread at the cutoff.
    let config = Config {
        max_frames: 2,
        input_buffer_size: 52,
        input_buffers: 2,
        ..config(&dir, stream)
    };
    let output = config.output.clone().unwrap();

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert!(report.displayed >= 3, "{report:?}");
    assert!(report.displayed < PICTURES, "{report:?}");
    assert!(report.decoded >= report.displayed);

    let written = file_len(&output);
    assert_eq!(written % PICTURE_BYTES, 0);
    assert!(written / PICTURE_BYTES >= report.displayed);
    assert!(written / PICTURE_BYTES < PICTURES);
}

#[test]
fn preallocated_pool_accepts_a_smaller_stream() {
    let dir = Scratch::new("prealloc");
    let stream = SyntheticStream::new().sequence(header(64, 64, 8)).pictures(0, 3);
    let mut config = config(&dir, stream);
    config.settings.stream = Some("128x64:progr:420:8:1:40".parse().unwrap());
    let output = config.output.clone().unwrap();

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(report.displayed, 3);
    assert_eq!(file_len(&output), 3 * 6144);
}

#[test]
fn preallocated_pool_refuses_another_bit_depth() {
    let dir = Scratch::new("prealloc-bd");
    let stream = SyntheticStream::new().sequence(header(64, 64, 8)).pictures(0, 2);
    let mut config = config(&dir, stream);
    config.settings.stream = Some("128x64:progr:420:10:1:40".parse().unwrap());

    let err = ChannelRunner::new(config).unwrap().run().unwrap_err();
    assert!(matches!(err, VdecError::NoFrameDecoded), "{err}");
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn cropping_shrinks_the_written_picture() {
    let dir = Scratch::new("crop");
    let cropped = header(1920, 16, 8).with_crop(CropInfo {
        left: 8,
        right: 8,
        ..Default::default()
    });
    let stream = SyntheticStream::new().sequence(cropped).picture(PictureUnit::new(1));
    let config = config(&dir, stream);
    let output = config.output.clone().unwrap();

    ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(file_len(&output), 1904 * 16 + 2 * 952 * 8);
}

#[test]
fn decoder_and_written_crcs_agree_without_conversion() {
    let dir = Scratch::new("crc");
    let stream = SyntheticStream::new().sequence(header(64, 64, 8)).pictures(10, 4);
    let config = Config {
        output: None,
        crc: Some(dir.path("crc.hex")),
        cert_crc: Some(dir.path("cert.hex")),
        ..config(&dir, stream)
    };
    let crc = config.crc.clone().unwrap();
    let cert = config.cert_crc.clone().unwrap();

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(report.displayed, 4);
    let decoder = lines(&crc);
    assert_eq!(decoder.len(), 4);
    assert!(decoder.iter().all(|line| line.len() == 8));
    assert_eq!(decoder, lines(&cert));
}

#[test]
fn split_input_dumps_sei_in_both_files() {
    let dir = Scratch::new("split-sei");
    let sei = SeiMessage {
        prefix: true,
        payload_type: 137,
        payload: vec![0xde, 0xad, 0xbe, 0xef],
    };
    let stream = SyntheticStream::new()
        .sequence(header(64, 64, 8))
        .sei(&sei)
        .picture(PictureUnit::new(3));
    let mut config = Config {
        sei_file: Some(dir.path("sei.txt")),
        ..config(&dir, stream)
    };
    config.settings.input_mode = InputMode::Split;

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(report.displayed, 1);
    let parsed = fs::read_to_string(dir.path("sei.txt")).unwrap();
    let synced = fs::read_to_string(dir.path("sei.txt_sync.txt")).unwrap();
    for dump in [&parsed, &synced] {
        assert_eq!(dump.matches("sei_payload_type: 137").count(), 1);
        assert!(dump.contains("de ad be ef"));
    }
}

#[test]
fn hdr_metadata_follows_displayed_pictures() {
    let dir = Scratch::new("hdr");
    let hdr = HdrMeta {
        colour_primaries: 9,
        transfer_characteristics: 16,
        matrix_coefficients: 9,
        ..Default::default()
    };
    let stream = SyntheticStream::new()
        .sequence(header(64, 64, 8))
        .hdr(&hdr)
        .pictures(0, 2);
    let config = Config {
        output: None,
        hdr_file: Some(dir.path("hdr.json")),
        ..config(&dir, stream)
    };

    ChannelRunner::new(config).unwrap().run().unwrap();
    let records = lines(&dir.path("hdr.json"));
    assert_eq!(records.len(), 2);
    for (frame, record) in records.iter().enumerate() {
        let value: serde_json::Value = serde_json::from_str(record).unwrap();
        assert_eq!(value["frame"], frame as u64);
        assert_eq!(value["transfer_characteristics"], 16);
    }
}

#[test]
fn corrupt_picture_ends_with_a_codec_error() {
    let dir = Scratch::new("corrupt");
    let stream = SyntheticStream::new()
        .sequence(header(64, 64, 8))
        .picture(PictureUnit::new(0))
        .picture(PictureUnit {
            seed: 1,
            corrupt: true,
            ..Default::default()
        })
        .picture(PictureUnit::new(2));
    let config = config(&dir, stream);

    let err = ChannelRunner::new(config).unwrap().run().unwrap_err();
    assert!(matches!(err, VdecError::Codec(ErrorCode::Error)), "{err}");
    assert_eq!(err.exit_code(), 0x80);
}

#[test]
fn concealed_pictures_are_counted() {
    let dir = Scratch::new("conceal");
    let stream = SyntheticStream::new()
        .sequence(header(64, 64, 8))
        .picture(PictureUnit {
            seed: 5,
            conceal: true,
            ..Default::default()
        })
        .picture(PictureUnit::new(6));
    let config = config(&dir, stream);

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!((report.displayed, report.conceal), (2, 1));
    assert!(report.statistics().ends_with("Frame(s) conceal = 1"));
}

#[test]
fn memory_shortage_is_reported() {
    let dir = Scratch::new("no-memory");
    let stream = SyntheticStream::new().sequence(header(64, 64, 8)).pictures(0, 2);
    let config = config(&dir, stream);
    let device = Device::with_allocator(0, Arc::new(BudgetAllocator::new(1024))).unwrap();

    let err = ChannelRunner::with_device(config, device).unwrap().run().unwrap_err();
    assert!(matches!(err, VdecError::Codec(ErrorCode::NoMemory)), "{err}");
    assert_eq!(err.exit_code(), 0x81);
}

#[test]
fn empty_input_decodes_nothing() {
    let dir = Scratch::new("empty");
    let config = config(&dir, SyntheticStream::new());
    let err = ChannelRunner::new(config).unwrap().run().unwrap_err();
    assert!(matches!(err, VdecError::NoFrameDecoded));
}

#[test]
fn missing_input_is_a_file_error() {
    let dir = Scratch::new("missing");
    let config = Config {
        input: dir.path("absent.bin"),
        output: None,
        ..Default::default()
    };
    let err = ChannelRunner::new(config).unwrap().run().unwrap_err();
    assert!(matches!(err, VdecError::File { .. }), "{err}");
}

#[test]
fn deep_streams_write_two_bytes_per_sample() {
    let dir = Scratch::new("ten-bit");
    let stream = SyntheticStream::new().sequence(header(64, 64, 10)).picture(PictureUnit::new(0));
    let config = config(&dir, stream);
    let output = config.output.clone().unwrap();

    ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(file_len(&output), 2 * 6144);
}

#[test]
fn stream_bit_depth_can_be_narrowed() {
    let dir = Scratch::new("narrow");
    let stream = SyntheticStream::new().sequence(header(64, 64, 10)).picture(PictureUnit::new(0));
    let mut config = config(&dir, stream);
    config.settings.bit_depth = 8;
    let output = config.output.clone().unwrap();

    ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(file_len(&output), 6144);
}

#[test]
fn tiled_pictures_are_untiled_on_output() {
    let dir = Scratch::new("tiled");
    let stream = SyntheticStream::new().sequence(header(64, 64, 8)).pictures(0, 2);
    let mut config = config(&dir, stream);
    config.settings.storage = StorageMode::Tile64x4;
    let output = config.output.clone().unwrap();

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(report.displayed, 2);
    assert_eq!(file_len(&output), 2 * 6144);
}

#[test]
fn multi_chunk_pictures_match_single_chunk_output() {
    let single_dir = Scratch::new("chunk-one");
    let multi_dir = Scratch::new("chunk-many");
    let stream = || SyntheticStream::new().sequence(header(64, 64, 8)).pictures(7, 2);

    let single = config(&single_dir, stream());
    let multi = Config {
        multi_chunk: true,
        ..config(&multi_dir, stream())
    };
    let (single_out, multi_out) = (single.output.clone().unwrap(), multi.output.clone().unwrap());
    ChannelRunner::new(single).unwrap().run().unwrap();
    ChannelRunner::new(multi).unwrap().run().unwrap();
    assert_eq!(fs::read(single_out).unwrap(), fs::read(multi_out).unwrap());
}

#[test]
fn loops_decode_the_input_again() {
    let dir = Scratch::new("loops");
    let stream = SyntheticStream::new().sequence(header(64, 64, 8)).pictures(0, 3);
    let config = Config {
        loops: 2,
        ..config(&dir, stream)
    };
    let output = config.output.clone().unwrap();

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!(report.displayed, 6);
    assert_eq!(file_len(&output), 6 * 6144);
}

#[test]
fn low_latency_split_input_decodes_every_picture() {
    let dir = Scratch::new("slicelat");
    let stream = SyntheticStream::new().sequence(header(64, 64, 8)).pictures(0, 4);
    let mut config = config(&dir, stream);
    config.settings.input_mode = InputMode::Split;
    config.settings.dec_unit = DecodeUnit::VclUnit;
    config.settings.dpb_mode = DpbMode::NoReordering;

    let report = ChannelRunner::new(config).unwrap().run().unwrap();
    assert_eq!((report.displayed, report.decoded), (4, 4));
}
