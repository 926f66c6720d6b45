// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::env;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{anyhow, Context};
use linux_embedded_hal::I2cdev;

use irgrid4::bus::{read_eeprom, read_frame_if_ready};
use irgrid4::calculations::{compute, TemperatureSettings};
use irgrid4::{calibration, Subpage, NUM_PIXELS, WIDTH};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        return Err(anyhow!(
            "Two or three arguments required: <I2C bus> <sensor address> [emissivity]"
        ));
    }
    let address: u8 = if let Some(hex_digits) = args[2].strip_prefix("0x") {
        u8::from_str_radix(hex_digits, 16)?
    } else {
        args[2].parse()?
    };
    let emissivity = args
        .get(3)
        .map(|value| value.parse::<f32>())
        .transpose()
        .context("The emissivity must be a number")?;
    let bus_path = Path::new(&args[1]);
    let mut bus = I2cdev::new(bus_path)?;
    let eeprom = read_eeprom(&mut bus, address)?;
    let report = eeprom.decode_report();
    if !report.is_clean() {
        eprintln!(
            "EEPROM needed correcting: {} corrected, {} uncorrectable",
            report.corrected, report.uncorrectable
        );
    }
    let params = calibration::extract(&eeprom)?;
    if let Some(broken_pixel) = params.broken_pixel() {
        eprintln!("Pixel {} has no calibration data", broken_pixel);
    }
    let settings = TemperatureSettings {
        emissivity,
        ..TemperatureSettings::default()
    };
    let delay = Duration::from_millis(500);
    let mut temperatures = [0f32; NUM_PIXELS];
    let mut ambient = 0f32;
    let mut last_subpage = Subpage::Zero;
    let mut seen_subpages = [false; 2];
    while seen_subpages.iter().any(|seen| !seen) {
        if let Some(frame) = read_frame_if_ready(&mut bus, address)? {
            last_subpage = frame.subpage();
            seen_subpages[usize::from(last_subpage)] = true;
            let result = compute(&frame, &params, &settings);
            ambient = result.ambient;
            temperatures = result.image;
            let invalid = result.invalid_pixels().count();
            if invalid > 0 {
                eprintln!("{} pixels did not have a valid temperature", invalid);
            }
        }
        sleep(delay);
    }
    println!(
        "Ambient: {:4.2}℃ (last subpage {:?})",
        ambient, last_subpage
    );
    print_temperatures(&temperatures, WIDTH);
    println!();
    Ok(())
}

fn print_temperatures(temperatures: &[f32], width: usize) {
    for (count, temperature) in temperatures.iter().enumerate() {
        if count % width == 0 {
            println!();
        }
        print!("{:4.2}  ", temperature);
    }
}
