// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::env;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use linux_embedded_hal::I2cdev;

use irgrid4::bus::{read_frame_if_ready, FromI2C};
use irgrid4::calculations::{compute, TemperatureSettings};
use irgrid4::{CalibrationParams, WIDTH};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        println!("Two arguments required: <I2C bus> <sensor address>");
        return;
    }
    let address: u8 = if args[2].starts_with("0x") {
        let hex_digits = args[2].split_at(2).1;
        u8::from_str_radix(hex_digits, 16)
            .expect("If the address starts with 0x, its a base-16 number")
    } else {
        args[2].parse().expect("The address to be an integer")
    };
    let bus_path = Path::new(&args[1]);
    let mut bus = I2cdev::new(bus_path).expect("The given path should work as an I2C device");
    let calibration = CalibrationParams::from_i2c(&mut bus, address)
        .expect("The calibration data should be readable");
    let settings = TemperatureSettings::default();
    // The default refresh rate is 2Hz
    let delay = Duration::from_millis(500);
    let mut frames_read = 0;
    // Both subpages need to be read to cover every pixel.
    while frames_read < 2 {
        let frame = read_frame_if_ready(&mut bus, address).expect("reading a frame to work");
        if let Some(frame) = frame {
            frames_read += 1;
            let result = compute(&frame, &calibration, &settings);
            println!("Ambient: {:4.2}", result.ambient);
            print_temperatures(&result.image, WIDTH);
            println!();
        }
        sleep(delay);
    }
}

fn print_temperatures(temperatures: &[f32], width: usize) {
    for (count, temperature) in temperatures.iter().enumerate() {
        if count % width == 0 {
            println!();
        }
        print!("{:4.2}  ", temperature);
    }
}
