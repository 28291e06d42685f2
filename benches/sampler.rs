use criterion::{black_box, criterion_group, criterion_main, Criterion};

use texcache::imageio::{tiled, ImageSpec, PixelType};
use texcache::texture::Wrap;
use texcache::{TextureOptions, TextureSystem, VaryingRef};

/// Write a 256x256 single-channel gradient with 32x32 tiles
fn fixture(name: &str) -> String {
    let dir = std::env::temp_dir().join("texcache_benches");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);

    let mut spec = ImageSpec::new_2d(256, 256, 1, PixelType::Float32);
    spec.tile_width = 32;
    spec.tile_height = 32;
    let data: Vec<f32> = (0..256 * 256).map(|i| (i as f32 * 0.13).fract()).collect();
    tiled::write_texture(&path, &[(spec, &data)]).unwrap();
    path.to_str().unwrap().to_string()
}

fn bench_batch_warm_cache(c: &mut Criterion) {
    let path = fixture("warm.txr");
    let sys = TextureSystem::new();

    let lanes = 64usize;
    let s: Vec<f32> = (0..lanes).map(|i| i as f32 / lanes as f32).collect();
    let t: Vec<f32> = (0..lanes).map(|i| (i as f32 * 0.41).fract()).collect();
    let runflags = vec![true; lanes];
    let mut result = vec![0.0f32; lanes];

    c.bench_function("texture_batch_64_warm", |b| {
        b.iter(|| {
            let mut opt = TextureOptions::new(0, 1);
            opt.swrap = Wrap::Periodic;
            opt.twrap = Wrap::Periodic;
            sys.texture(
                black_box(&path),
                &mut opt,
                &runflags,
                0,
                lanes - 1,
                VaryingRef::varying(black_box(&s)),
                VaryingRef::varying(black_box(&t)),
                None,
                None,
                None,
                None,
                &mut result,
            );
            black_box(result[0])
        });
    });
}

fn bench_batch_evicting_cache(c: &mut Criterion) {
    let path = fixture("churn.txr");
    let sys = TextureSystem::new();
    // A zero budget forces a miss and an eviction on nearly every tap
    sys.set_max_memory_mb(0);

    let lanes = 16usize;
    let s: Vec<f32> = (0..lanes).map(|i| i as f32 / lanes as f32).collect();
    let t: Vec<f32> = (0..lanes).map(|i| (i as f32 * 0.17).fract()).collect();
    let runflags = vec![true; lanes];
    let mut result = vec![0.0f32; lanes];

    c.bench_function("texture_batch_16_evicting", |b| {
        b.iter(|| {
            let mut opt = TextureOptions::new(0, 1);
            opt.swrap = Wrap::Periodic;
            opt.twrap = Wrap::Periodic;
            sys.texture(
                black_box(&path),
                &mut opt,
                &runflags,
                0,
                lanes - 1,
                VaryingRef::varying(black_box(&s)),
                VaryingRef::varying(black_box(&t)),
                None,
                None,
                None,
                None,
                &mut result,
            );
            black_box(result[0])
        });
    });
}

criterion_group!(benches, bench_batch_warm_cache, bench_batch_evicting_cache);
criterion_main!(benches);
