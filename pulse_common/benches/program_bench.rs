//! ULP counting program micro-benchmark.
//!
//! Measures one `counting_step()` on a steady line and on a line toggling at
//! the filter width, the two paths the program takes per wakeup.

use criterion::{Criterion, criterion_group, criterion_main};
use pulse_common::counter::mode::CountMode;
use pulse_common::ulp::layout::{store16, RtcSlowMemory};
use pulse_common::ulp::program::counting_step;
use std::hint::black_box;
use std::sync::atomic::Ordering;

fn started_memory(debounce: u16) -> RtcSlowMemory {
    let mem = RtcSlowMemory::new();
    let vars = mem.variables();
    store16(&vars.debounce_counter, debounce);
    store16(&vars.debounce_max_count, debounce);
    vars.rising_edge_mode
        .store(CountMode::Increment.as_word(), Ordering::Release);
    mem
}

fn bench_steady_line(c: &mut Criterion) {
    let mem = started_memory(3);

    c.bench_function("counting_step_steady", |b| {
        b.iter(|| counting_step(mem.variables(), black_box(false)));
    });
}

fn bench_toggling_line(c: &mut Criterion) {
    let mem = started_memory(3);
    let mut i = 0u32;

    c.bench_function("counting_step_toggling", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            counting_step(mem.variables(), black_box((i / 4) % 2 == 1))
        });
    });
}

criterion_group!(benches, bench_steady_line, bench_toggling_line);
criterion_main!(benches);
