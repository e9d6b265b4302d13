use chart_calibration::{
    apply_recipe, ColorConverter, ColorSpace, CorrectionRecipe, Corrector, ImagePixelType, MappingMethod,
    ReferenceWhite,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, Rgb, RgbImage};

fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    DynamicImage::ImageRgb8(img)
}

fn fitted_corrector(method: MappingMethod) -> Corrector {
    let mut observed = Vec::new();
    for i in 0..4 {
        for j in 0..4 {
            for k in 0..4 {
                observed.push([i as f64 / 3.0, j as f64 / 3.0, k as f64 / 3.0]);
            }
        }
    }
    let reference: Vec<[f64; 3]> = observed
        .iter()
        .map(|v| [0.9 * v[0] + 0.05 * v[1], 1.1 * v[1] - 0.02, v[2] * v[2]])
        .collect();
    match chart_calibration::calibration::fit_vectors(&observed, &reference, method) {
        Ok(corrector) => corrector,
        Err(e) => panic!("benchmark fit failed: {}", e),
    }
}

fn benchmark_recipe_apply(c: &mut Criterion) {
    let image = gradient_image(640, 480);

    for (space, method) in [
        (ColorSpace::LinearRgb, MappingMethod::LinearCrossBand),
        (ColorSpace::Lab, MappingMethod::CubicCrossBand),
    ] {
        let recipe = CorrectionRecipe::new(
            fitted_corrector(method),
            ColorConverter::new(ReferenceWhite::D50),
            space,
            ImagePixelType::Rgb8,
        )
        .unwrap();
        let name = format!("apply_recipe_640x480_{}_{}", space, method).replace(' ', "_");
        c.bench_function(&name, |b| b.iter(|| apply_recipe(black_box(&recipe), black_box(&image))));
    }
}

criterion_group!(benches, benchmark_recipe_apply);
criterion_main!(benches);
