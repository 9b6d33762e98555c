/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::error;

use trpx::container::Terse;
use trpx::tiff::{GreyTiff, Pixels};

#[derive(Parser, Debug)]
#[command(
    about = "Compress grayscale TIFF files and stacks to Terse (.trpx) files",
    long_about = "Compress grayscale TIFF files and stacks to Terse (.trpx) files.\n\n\
        Every recognized input (extension .tif or .tiff) is compressed to a \
        sibling .trpx file and removed on success. Failed files are reported \
        on standard error and the remaining files are still processed."
)]
struct Args {
    /// Print a summary with timings and the overall compression rate.
    #[arg(short, long)]
    verbose: bool,

    /// List every compressed file.
    #[arg(short, long)]
    list: bool,

    /// The TIFF files to compress.
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    stderrlog::new()
        .verbosity(2)
        .timestamp(stderrlog::Timestamp::Second)
        .init()
        .unwrap();

    let start = Instant::now();
    let mut failed = 0usize;
    let mut compressed = 0usize;
    let mut raw_bytes = 0u64;
    let mut terse_bytes = 0u64;

    for file in &args.files {
        let is_tiff = matches!(
            file.extension().and_then(|e| e.to_str()),
            Some("tif") | Some("tiff")
        );
        if !is_tiff {
            continue;
        }
        match compress(file) {
            Ok((input_size, output_size)) => {
                compressed += 1;
                raw_bytes += input_size;
                terse_bytes += output_size;
                if args.list {
                    println!("Compressed: {}", file.display());
                }
            }
            Err(e) => {
                error!("{}: {:#}", file.display(), e);
                failed += 1;
            }
        }
    }

    if args.verbose {
        println!("terse compressed: {} files", compressed);
        println!("elapsed         : {:.3} seconds", start.elapsed().as_secs_f64());
        if raw_bytes > 0 {
            let rate = 100.0 * (1.0 - terse_bytes as f64 / raw_bytes as f64);
            println!("compression rate: {:.1}%", rate);
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Compress one TIFF file to a sibling `.trpx` file, removing the source on
/// success; returns the input and output sizes in bytes.
fn compress(path: &Path) -> Result<(u64, u64)> {
    let mut reader = BufReader::new(File::open(path).context("cannot open input file")?);
    let tiff = GreyTiff::read_from(&mut reader).context("cannot read TIFF data")?;
    drop(reader);
    ensure!(!tiff.images.is_empty(), "the file contains no images");

    let first = &tiff.images[0];
    for (index, image) in tiff.images.iter().enumerate().skip(1) {
        ensure!(
            image.width == first.width && image.height == first.height,
            "image {} is {}x{}, image 0 is {}x{}: all images of a stack must share dimensions",
            index,
            image.width,
            image.height,
            first.width,
            first.height,
        );
    }

    let mut container = encode_frame(&first.pixels);
    if !first.pixels.is_empty() {
        container.set_dimensions(&[first.width as u64, first.height as u64])?;
    }
    for (index, image) in tiff.images.iter().enumerate().skip(1) {
        append_frame(&mut container, &image.pixels)
            .with_context(|| format!("cannot append image {}", index))?;
    }

    let output_path = path.with_extension("trpx");
    let mut writer =
        BufWriter::new(File::create(&output_path).context("cannot create output file")?);
    container
        .write_to(&mut writer)
        .with_context(|| format!("cannot write {}", output_path.display()))?;
    drop(writer);

    let input_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    std::fs::remove_file(path).context("cannot remove input file")?;
    Ok((input_size, std::fs::metadata(&output_path)?.len()))
}

/// Open a container with the pixels of the first image. Floating-point
/// samples are cast to 64-bit integers before encoding.
fn encode_frame(pixels: &Pixels) -> Terse {
    match pixels {
        Pixels::U8(v) => Terse::new(v),
        Pixels::I8(v) => Terse::new(v),
        Pixels::U16(v) => Terse::new(v),
        Pixels::I16(v) => Terse::new(v),
        Pixels::U32(v) => Terse::new(v),
        Pixels::I32(v) => Terse::new(v),
        Pixels::F32(v) => Terse::new(&v.iter().map(|&x| x as i64).collect::<Vec<_>>()),
        Pixels::F64(v) => Terse::new(&v.iter().map(|&x| x as i64).collect::<Vec<_>>()),
    }
}

fn append_frame(container: &mut Terse, pixels: &Pixels) -> Result<()> {
    match pixels {
        Pixels::U8(v) => container.append_frame(v),
        Pixels::I8(v) => container.append_frame(v),
        Pixels::U16(v) => container.append_frame(v),
        Pixels::I16(v) => container.append_frame(v),
        Pixels::U32(v) => container.append_frame(v),
        Pixels::I32(v) => container.append_frame(v),
        Pixels::F32(v) => {
            container.append_frame(&v.iter().map(|&x| x as i64).collect::<Vec<_>>())
        }
        Pixels::F64(v) => {
            container.append_frame(&v.iter().map(|&x| x as i64).collect::<Vec<_>>())
        }
    }?;
    Ok(())
}
