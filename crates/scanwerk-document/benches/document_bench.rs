// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the document stage: resampling and encoding one
// full A4 colour page acquired at 300 dpi, and assembling a two-page PDF.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use scanwerk_core::{PaperSize, RasterPage};
use scanwerk_document::{JpegPageEncoder, PageEncoder, Resampler, assemble};

/// A4 at 300 dpi with a soft gradient, so the encoder has real work to do.
fn a4_page() -> RasterPage {
    let img = RgbImage::from_fn(2480, 3508, |x, y| {
        Rgb([(x / 10) as u8, (y / 14) as u8, ((x + y) / 24) as u8])
    });
    RasterPage::new(DynamicImage::ImageRgb8(img), 300)
}

fn bench_resample_encode(c: &mut Criterion) {
    let page = a4_page();
    let resampler = Resampler::new(300, 150).expect("valid ratio");
    let encoder = JpegPageEncoder::new(95);

    let mut group = c.benchmark_group("a4_page");
    group.sample_size(10);
    group.bench_function("resample (300 -> 150 dpi)", |b| {
        b.iter(|| black_box(resampler.resample(black_box(page.clone()))));
    });

    let small = resampler.resample(page.clone());
    group.bench_function("jpeg encode (q95)", |b| {
        b.iter(|| black_box(encoder.encode(black_box(&small), 0).expect("encode")));
    });

    let encoded = encoder.encode(&small, 0).expect("encode");
    let pages = vec![encoded.clone(), encoded];
    group.bench_function("assemble (2 pages)", |b| {
        b.iter(|| black_box(assemble(black_box(&pages), PaperSize::A4).expect("assemble")));
    });
    group.finish();
}

criterion_group!(benches, bench_resample_encode);
criterion_main!(benches);
