use std::hint::black_box;

use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use memc_load::codec::{encode_record, UserApps};
use memc_load::record::parse_line;

const LINE: &str = "idfa\t1rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23";

fn long_line(apps: usize) -> String {
    let apps: Vec<String> = (0..apps).map(|i| (i * 37).to_string()).collect();
    format!("gaid\t7rfw452y52g2gq4g\t-12.5\t101.75\t{}", apps.join(","))
}

fn bench_parse_line(c: &mut Criterion) {
    c.bench_function("parse_line_short", |b| {
        b.iter(|| black_box(parse_line(black_box(LINE))));
    });

    let line = long_line(500);
    c.bench_function("parse_line_500_apps", |b| {
        b.iter(|| black_box(parse_line(black_box(&line))));
    });
}

fn bench_encode(c: &mut Criterion) {
    let record = parse_line(&long_line(500)).unwrap();
    let payload = UserApps::from(&record);
    let mut buf = BytesMut::with_capacity(4096);

    c.bench_function("user_apps_encode_500_apps", |b| {
        b.iter(|| {
            buf.clear();
            black_box(&payload).encode(&mut buf);
            black_box(buf.len());
        });
    });

    let bytes = payload.to_bytes();
    c.bench_function("user_apps_decode_500_apps", |b| {
        b.iter(|| black_box(UserApps::decode(black_box(&bytes))));
    });
}

fn bench_parse_and_encode(c: &mut Criterion) {
    let lines: Vec<String> = (0..1000)
        .map(|i| format!("adid\tdev{}\t{}.5\t{}.5\t{},{},{}", i, i % 90, i % 180, i, i * 2, i * 3))
        .collect();

    let mut group = c.benchmark_group("route_path");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("parse_and_encode_1000_lines", |b| {
        b.iter(|| {
            for line in &lines {
                let record = parse_line(line).unwrap();
                black_box(encode_record(&record).unwrap());
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_parse_line, bench_encode, bench_parse_and_encode);
criterion_main!(benches);
