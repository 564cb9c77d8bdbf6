use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::Instant;

use clap::Parser;

use decaf_rs::{archive_dir, unarchive_to_dir};

#[derive(Parser)]
#[command(name = "decaf")]
#[command(about = "manipulate DeCAF archives")]
#[command(version, long_about = None)]
struct Cli {
    /// Path to the input archive (.df) or directory
    input: PathBuf,

    /// Optional path for the output file or directory
    output: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            exit(1);
        }
    };

    let metadata = match fs::metadata(&cli.input) {
        Ok(metadata) => metadata,
        Err(err) => {
            eprintln!("decaf: cannot stat {}: {}", cli.input.display(), err);
            exit(2);
        }
    };

    if metadata.is_dir() {
        archive(&cli.input, cli.output);
    } else {
        unarchive(&cli.input, cli.output);
    }
}

fn archive(input: &Path, output: Option<PathBuf>) {
    let output = output.unwrap_or_else(|| default_archive_path(input));
    let timer = Instant::now();

    println!("decaf: archiving {}", input.display());
    let bytes = match archive_dir(input) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("decaf: failed to archive {}: {}", input.display(), err);
            exit(4);
        }
    };
    if let Err(err) = fs::write(&output, &bytes) {
        eprintln!("decaf: failed to write {}: {}", output.display(), err);
        exit(4);
    }

    println!(
        "decaf: archived {} as {} (wrote {:.2} MiB) in {:.2} sec",
        input.display(),
        output.display(),
        bytes.len() as f64 / 1024.0 / 1024.0,
        timer.elapsed().as_secs_f32()
    );
}

fn unarchive(input: &Path, output: Option<PathBuf>) {
    let output = output.unwrap_or_else(|| default_extract_path(input));
    let timer = Instant::now();

    println!("decaf: extracting files from archive {}", input.display());
    let bytes = match fs::read(input) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("decaf: failed to read {}: {}", input.display(), err);
            exit(5);
        }
    };
    if let Err(err) = unarchive_to_dir(&bytes, &output) {
        eprintln!("decaf: failed to extract {}: {}", input.display(), err);
        exit(5);
    }

    println!(
        "decaf: unarchived {} to {} in {:.2} sec",
        input.display(),
        output.display(),
        timer.elapsed().as_secs_f32()
    );
}

/// `<basename>.df` in the current directory
fn default_archive_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    PathBuf::from(format!("{name}.df"))
}

/// `./<basename>/` with any `.df` suffix stripped
fn default_extract_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    PathBuf::from(name.strip_suffix(".df").unwrap_or(&name).to_string())
}
