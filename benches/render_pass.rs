//! Render pass benchmarks: one full 72x38 pass per shader over a 640x480 frame.
//! Run: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use poorlaroid::cell_grid::CellGrid;
use poorlaroid::color::Rgb;
use poorlaroid::pixel_buffer::PixelBuffer;
use poorlaroid::render_loop::{render_pass, CancelToken};
use poorlaroid::shaders::ShaderBank;

fn bench_render_pass(c: &mut Criterion) {
    let frame = PixelBuffer::from_fn(640, 480, |x, y| {
        Rgb::new((x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8)
    });
    let mut bank = ShaderBank::standard();
    let names = bank.names();

    let mut group = c.benchmark_group("render_pass");
    group.sample_size(50);

    for name in names {
        bank.select(name).expect("shader from bank");
        let mut grid = CellGrid::new(72, 38);
        let cancel = CancelToken::new();
        group.bench_function(name.to_ascii_lowercase(), |b| {
            b.iter(|| {
                let shader = bank.active_mut().expect("active shader");
                render_pass(black_box(&frame), &mut grid, shader, false, &cancel)
                    .expect("render");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render_pass);
criterion_main!(benches);
