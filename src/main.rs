//! gzprobe - diagnose the gzip member layout of WARC files.
//!
//! WARC files are conventionally compressed one gzip member per record
//! so that records can be seeked independently. Tools that gzip a whole
//! WARC in one block, or gzip an already-compressed WARC a second time,
//! silently destroy that random access. gzprobe walks the raw member
//! structure of a file and reports what it finds.

use std::path::Path;
use std::process;

use gzprobe::analyzer;
use gzprobe::cli::ProbeArgs;
use gzprobe::counting_decoder::DEFAULT_SNIPPET_SIZE;
use gzprobe::error::{ProbeError, ProbeResult};

const VERSION: &str = concat!("gzprobe ", env!("CARGO_PKG_VERSION"));

fn main() {
    match run() {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("gzprobe: {}", e);
            process::exit(1);
        }
    }
}

fn run() -> ProbeResult<i32> {
    let args = ProbeArgs::parse()?;

    if args.version {
        println!("{}", VERSION);
        return Ok(0);
    }

    if args.help {
        print_help();
        return Ok(0);
    }

    if args.files.is_empty() {
        return Err(ProbeError::invalid_argument(
            "please provide at least one file as argument",
        ));
    }

    let files = collect_inputs(&args)?;
    let mut exit_code = 0;

    for file in &files {
        println!();
        println!("Processing '{}'...", file);
        match analyzer::analyze_with_snippet_size(Path::new(file), args.snippet_size) {
            Ok(report) => {
                if args.quiet {
                    println!("{}", report);
                } else {
                    println!("{}", report.render(args.verbose));
                }
            }
            Err(e) => {
                eprintln!("gzprobe: {}: {}", file, e);
                exit_code = 1;
            }
        }
    }

    Ok(exit_code)
}

/// Expands directory arguments into the files below them. Plain file
/// arguments pass through untouched.
fn collect_inputs(args: &ProbeArgs) -> ProbeResult<Vec<String>> {
    let mut files = Vec::new();
    for file in &args.files {
        let path = Path::new(file);
        if path.is_dir() {
            if !args.recursive {
                return Err(ProbeError::invalid_argument(format!(
                    "{} is a directory (use --recursive)",
                    file
                )));
            }
            for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(entry.path().display().to_string());
                }
            }
        } else {
            files.push(file.clone());
        }
    }
    Ok(files)
}

fn print_help() {
    println!("Usage: gzprobe [OPTION]... FILE...");
    println!();
    println!("Diagnose how FILEs are gzip-compressed. Intended for WARC files,");
    println!("which need one gzip member per record for random record access.");
    println!();
    println!("Options:");
    println!("  -r, --recursive  Probe every file under directory arguments");
    println!(
        "  -s, --snippet N  Captured content bytes per member (default {})",
        DEFAULT_SNIPPET_SIZE
    );
    println!("  -v, --verbose    Show content snippets in the entry listing");
    println!("  -q, --quiet      One-line report only");
    println!("  -h, --help       Show this help");
    println!("  -V, --version    Show version");
    println!();
    println!("Statuses:");
    println!("  uncompressed       Not gzip at all");
    println!("  single-compressed  One gzip block; random record access impossible");
    println!("  multi-compressed   One gzip member per record (correct for WARC)");
    println!("  faulty-compressed  Broken gzip structure after valid members");
    println!("  garbage-at-end     Valid members followed by non-gzip bytes");
    println!("  recompressed       A correctly compressed WARC gzipped once more");
}
