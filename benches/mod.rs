use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    receive::bench_parse_reading,
    receive::bench_reassemble,
    receive::bench_poll_publish
);
criterion_main!(benches);
