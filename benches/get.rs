use criterion::{black_box, BenchmarkId, Criterion};
use criterion::{criterion_group, criterion_main};
use tempfile::tempdir;

use tas::{Codec, Date, Record, RecordKind, StoreConfig, TasStore};

const DAYS: u8 = 20;

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    for &(codec, level) in &[(Codec::Zlib, 6), (Codec::Zstd, 3)] {
        for &records_per_day in &[1_000_usize, 50_000] {
            let dir = tempdir().expect("tempdir");
            let path = dir.path().join("bench.trades");
            let config = StoreConfig {
                codec,
                compression_level: level,
                ..StoreConfig::default()
            };
            let mut writer = TasStore::create(&path, RecordKind::Trades, 1, "BENCH", config)
                .expect("create");
            let records: Vec<Record> = (0..records_per_day)
                .map(|i| Record::trade(34_200 + (i / 3) as i32, 1000 + (i % 17) as i32, 100, 0, 0, "@"))
                .collect();
            for day in 1..=DAYS {
                let date = Date::new(2008, 1, day).expect("date");
                writer.append(date, &records).expect("append");
            }
            writer.close().expect("close");

            let store = TasStore::open(&path, StoreConfig::default()).expect("open");
            let dates: Vec<Date> = store.dates().collect();
            let id = format!("{codec:?}/{records_per_day}");
            group.bench_with_input(BenchmarkId::from_parameter(id), &dates, |b, dates| {
                let mut i = 0usize;
                b.iter(|| {
                    let date = dates[i % dates.len()];
                    i = i.wrapping_add(7);
                    black_box(store.get(date).expect("get"))
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_get);
criterion_main!(benches);
