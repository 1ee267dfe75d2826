//! Command-line argument handling.

use crate::counting_decoder::DEFAULT_SNIPPET_SIZE;
use crate::error::{ProbeError, ProbeResult};

/// Parsed command-line arguments.
#[derive(Debug, Clone)]
pub struct ProbeArgs {
    pub files: Vec<String>,
    pub recursive: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub snippet_size: usize,
    pub help: bool,
    pub version: bool,
}

impl Default for ProbeArgs {
    fn default() -> Self {
        ProbeArgs {
            files: Vec::new(),
            recursive: false,
            verbose: false,
            quiet: false,
            snippet_size: DEFAULT_SNIPPET_SIZE,
            help: false,
            version: false,
        }
    }
}

impl ProbeArgs {
    pub fn parse() -> ProbeResult<Self> {
        Self::parse_from(std::env::args().skip(1))
    }

    pub fn parse_from<I>(args: I) -> ProbeResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = ProbeArgs::default();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "-V" | "--version" => parsed.version = true,
                "-r" | "--recursive" => parsed.recursive = true,
                "-v" | "--verbose" => parsed.verbose = true,
                "-q" | "--quiet" => parsed.quiet = true,
                "-s" | "--snippet" => {
                    let value = iter.next().ok_or_else(|| {
                        ProbeError::invalid_argument("--snippet requires a value")
                    })?;
                    parsed.snippet_size = parse_snippet_size(&value)?;
                }
                _ if arg.starts_with("--snippet=") => {
                    parsed.snippet_size = parse_snippet_size(&arg["--snippet=".len()..])?;
                }
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    return Err(ProbeError::invalid_argument(format!(
                        "unknown option: {}",
                        arg
                    )));
                }
                _ => parsed.files.push(arg),
            }
        }
        Ok(parsed)
    }
}

fn parse_snippet_size(value: &str) -> ProbeResult<usize> {
    value
        .parse()
        .map_err(|_| ProbeError::invalid_argument(format!("invalid snippet size: {}", value)))
}
