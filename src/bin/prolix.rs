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

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use trpx::container::Terse;
use trpx::tiff::{GreyTiff, GreyTiffImage, Pixels};

#[derive(Parser, Debug)]
#[command(
    about = "Expand Terse (.trpx, .trs) files to grayscale TIFF files",
    long_about = "Expand Terse (.trpx, .trs) files to grayscale TIFF files.\n\n\
        Every recognized input is expanded to a sibling .tif file and removed \
        on success; a multi-frame container becomes a TIFF stack. Failed \
        files are reported on standard error and the remaining files are \
        still processed."
)]
struct Args {
    /// Print a summary with timings.
    #[arg(short, long)]
    verbose: bool,

    /// List every expanded file.
    #[arg(short, long)]
    list: bool,

    /// The Terse files to expand.
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
    let mut expanded = 0usize;

    for file in &args.files {
        let is_terse = matches!(
            file.extension().and_then(|e| e.to_str()),
            Some("trpx") | Some("trs")
        );
        if !is_terse {
            continue;
        }
        match expand(file) {
            Ok(()) => {
                expanded += 1;
                if args.list {
                    println!("Expanded: {}", file.display());
                }
            }
            Err(e) => {
                error!("{}: {:#}", file.display(), e);
                failed += 1;
            }
        }
    }

    if args.verbose {
        println!("prolix expanded: {} files", expanded);
        println!("elapsed        : {:.3} seconds", start.elapsed().as_secs_f64());
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Expand one container to a sibling `.tif` file, removing the source on
/// success.
fn expand(path: &Path) -> Result<()> {
    let mut reader = BufReader::new(File::open(path).context("cannot open input file")?);
    let container = Terse::read_from(&mut reader).context("cannot read Terse data")?;
    drop(reader);

    let (width, height) = frame_shape(&container);
    let mut tiff = GreyTiff::new();
    for frame in 0..container.number_of_frames() as usize {
        let pixels = decode_frame(&container, frame)
            .with_context(|| format!("cannot decode frame {}", frame))?;
        tiff.push_image(GreyTiffImage::new(width, height, pixels));
    }

    let output_path = path.with_extension("tif");
    let mut writer =
        BufWriter::new(File::create(&output_path).context("cannot create output file")?);
    tiff.write_to(&mut writer)
        .with_context(|| format!("cannot write {}", output_path.display()))?;
    drop(writer);

    std::fs::remove_file(path).context("cannot remove input file")?;
    Ok(())
}

/// The TIFF shape of a frame: the declared (or inferred square) dimensions,
/// or a single row as a last resort.
fn frame_shape(container: &Terse) -> (u32, u32) {
    match container.dimensions() {
        Some(d) if d.len() == 1 => (d[0] as u32, 1),
        Some(d) => (d[0] as u32, d[1..].iter().product::<u64>() as u32),
        None => (container.number_of_values() as u32, 1),
    }
}

/// Decode one frame into the smallest pixel type that holds every possible
/// value. Data wider than 32 bits becomes 64-bit floating point, TIFF's
/// widest grayscale sample format.
fn decode_frame(container: &Terse, frame: usize) -> Result<Pixels, trpx::error::Error> {
    let n = container.number_of_values() as usize;
    Ok(match (container.is_signed(), container.prolix_bits()) {
        (false, ..=8) => {
            let mut v = vec![0u8; n];
            container.prolix_frame(&mut v, frame)?;
            Pixels::U8(v)
        }
        (false, 9..=16) => {
            let mut v = vec![0u16; n];
            container.prolix_frame(&mut v, frame)?;
            Pixels::U16(v)
        }
        (false, 17..=32) => {
            let mut v = vec![0u32; n];
            container.prolix_frame(&mut v, frame)?;
            Pixels::U32(v)
        }
        (false, _) => {
            let mut v = vec![0u64; n];
            container.prolix_frame(&mut v, frame)?;
            Pixels::F64(v.iter().map(|&x| x as f64).collect())
        }
        (true, ..=8) => {
            let mut v = vec![0i8; n];
            container.prolix_frame(&mut v, frame)?;
            Pixels::I8(v)
        }
        (true, 9..=16) => {
            let mut v = vec![0i16; n];
            container.prolix_frame(&mut v, frame)?;
            Pixels::I16(v)
        }
        (true, 17..=32) => {
            let mut v = vec![0i32; n];
            container.prolix_frame(&mut v, frame)?;
            Pixels::I32(v)
        }
        (true, _) => {
            let mut v = vec![0i64; n];
            container.prolix_frame(&mut v, frame)?;
            Pixels::F64(v.iter().map(|&x| x as f64).collect())
        }
    })
}
