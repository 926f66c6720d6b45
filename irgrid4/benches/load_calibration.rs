use criterion::{criterion_group, criterion_main, Criterion};

use irgrid4::{calibration, EepromImage};
use irgrid4_test_data::{datasheet_eeprom, datasheet_eeprom_words};

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Calibration Loading");

    group.bench_with_input("EEPROM decode", &datasheet_eeprom(), |b, eeprom| {
        b.iter(|| EepromImage::from_be_bytes(eeprom))
    });
    let image = EepromImage::load(datasheet_eeprom_words()).unwrap();
    group.bench_with_input("Extract", &image, |b, image| {
        b.iter(|| calibration::extract(image))
    });
    group.bench_with_input("Decode and extract", &datasheet_eeprom(), |b, eeprom| {
        b.iter(|| {
            let image = EepromImage::from_be_bytes(eeprom).unwrap();
            calibration::extract(&image)
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
