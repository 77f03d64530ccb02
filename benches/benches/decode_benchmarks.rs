use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rdbstream::{rdb::Crc64, Decoder, Entry};

const KEY_COUNTS: [usize; 3] = [100, 1_000, 10_000];

fn push_len(
    out: &mut Vec<u8>,
    len: usize,
) {
    if len < 64 {
        out.push(len as u8);
    } else if len < 16_384 {
        out.push(0x40 | (len >> 8) as u8);
        out.push(len as u8);
    } else {
        out.push(0x80);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
}

fn push_str(
    out: &mut Vec<u8>,
    s: &[u8],
) {
    push_len(out, s.len());
    out.extend_from_slice(s);
}

/// Listpack holding `fields` field/value pairs, all short strings.
fn listpack(fields: usize) -> Vec<u8> {
    let mut out = vec![0u8; 6];
    for i in 0..fields * 2 {
        let s = format!("f{i:05}");
        out.push(0x80 | s.len() as u8);
        out.extend_from_slice(s.as_bytes());
        out.push(s.len() as u8 + 1);
    }
    out.push(0xFF);
    let total = out.len() as u32;
    out[0..4].copy_from_slice(&total.to_le_bytes());
    out[4..6].copy_from_slice(&((fields * 2) as u16).to_le_bytes());
    out
}

fn finish(mut out: Vec<u8>) -> Vec<u8> {
    out.push(0xFF);
    let crc = Crc64::checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

fn string_dump(keys: usize) -> Vec<u8> {
    let mut out = b"REDIS0011".to_vec();
    out.extend_from_slice(&[0xFE, 0x00]);
    for i in 0..keys {
        out.push(0);
        push_str(&mut out, format!("key:{i:08}").as_bytes());
        push_str(&mut out, format!("value-{i}-{}", "x".repeat(32)).as_bytes());
    }
    finish(out)
}

fn hash_dump(keys: usize) -> Vec<u8> {
    let blob = listpack(16);
    let mut out = b"REDIS0011".to_vec();
    out.extend_from_slice(&[0xFE, 0x00]);
    for i in 0..keys {
        out.push(16);
        push_str(&mut out, format!("hash:{i:08}").as_bytes());
        push_str(&mut out, &blob);
    }
    finish(out)
}

fn decode_all(bytes: &[u8]) -> usize {
    let mut decoder = Decoder::open(Cursor::new(bytes)).unwrap();
    let mut keys = 0;
    loop {
        match decoder.next_entry().unwrap() {
            Entry::EndOfStream => return keys,
            Entry::KeyValue(kv) => {
                black_box(&kv);
                keys += 1;
            }
            _ => {}
        }
    }
}

fn bench_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_strings");
    for keys in KEY_COUNTS {
        let dump = string_dump(keys);
        group.throughput(Throughput::Bytes(dump.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(keys), &dump, |b, dump| {
            b.iter(|| assert_eq!(decode_all(dump), keys))
        });
    }
    group.finish();
}

fn bench_listpack_hashes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_listpack_hashes");
    for keys in KEY_COUNTS {
        let dump = hash_dump(keys);
        group.throughput(Throughput::Bytes(dump.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(keys), &dump, |b, dump| {
            b.iter(|| assert_eq!(decode_all(dump), keys))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_strings, bench_listpack_hashes);
criterion_main!(benches);
