use std::{ffi::OsString, path::PathBuf};

use clap::{CommandFactory, FromArgMatches, Parser};

use crate::{archive::ArchiveEmitter, group::EntryAccumulator, Error, Result};

/// Concatenates groups of regular and gzip-compressed files and writes the
/// results to stdout as entries of a tar stream.
#[derive(Debug, Parser)]
#[command(
    name = "tarlogs",
    version,
    after_help = "The tar stream holds one entry per -o. Each -o concatenates all \
previous -i/-z inputs not yet written into one entry with the given name, which \
inherits permissions and ownership from its last input. With no pending inputs the \
-o name itself is archived. A directory input is archived recursively and must be \
the only input of its entry. FIFOs and character devices are buffered in memory."
)]
pub struct Args {
    /// Add a plain file, stream or directory to the current entry
    #[arg(short = 'i', long = "input", allow_hyphen_values = true, value_name = "PATH")]
    input: Vec<PathBuf>,

    /// Add a gzip-compressed file or stream to the current entry
    #[arg(short = 'z', long = "input-zip", allow_hyphen_values = true, value_name = "PATH")]
    input_zip: Vec<PathBuf>,

    /// Write the current entry to the archive under NAME
    #[arg(short = 'o', long = "output-entry", allow_hyphen_values = true, value_name = "NAME")]
    output_entry: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Input(PathBuf),
    InputZip(PathBuf),
    Output(PathBuf),
}

/// Parses the command line into operations, in the order they were given.
pub fn parse_ops<I, T>(args: I) -> std::result::Result<Vec<Op>, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Args::command().try_get_matches_from(args)?;
    let parsed = Args::from_arg_matches(&matches)?;

    let mut ops = Vec::new();
    let mut collect = |id: &str, paths: Vec<PathBuf>, op: fn(PathBuf) -> Op| {
        if let Some(indices) = matches.indices_of(id) {
            ops.extend(indices.zip(paths).map(|(i, p)| (i, op(p))));
        }
    };
    collect("input", parsed.input, Op::Input);
    collect("input_zip", parsed.input_zip, Op::InputZip);
    collect("output_entry", parsed.output_entry, Op::Output);

    ops.sort_by_key(|(i, _)| *i);
    Ok(ops.into_iter().map(|(_, op)| op).collect())
}

pub fn print_help() -> std::io::Result<()> {
    Args::command().print_help()
}

pub fn usage() -> String {
    Args::command().render_usage().to_string()
}

/// Rejects invocations that would silently lose inputs.
pub fn validate(ops: &[Op]) -> Result<()> {
    let dangling = ops
        .iter()
        .rev()
        .take_while(|op| !matches!(op, Op::Output(_)))
        .count();
    if dangling > 0 {
        return Err(Error::Usage(format!(
            "{dangling} input(s) after the last --output-entry would never be archived"
        )));
    }
    Ok(())
}

/// Applies the operations in order, writing one entry per `Op::Output`.
pub fn run<E>(ops: &[Op], emitter: &mut E) -> Result<()>
where
    E: ArchiveEmitter + ?Sized,
{
    validate(ops)?;
    let mut group = EntryAccumulator::new();
    for op in ops {
        match op {
            Op::Input(path) => group.add_plain(path)?,
            Op::InputZip(path) => group.add_compressed(path)?,
            Op::Output(name) => group.flush(name, emitter)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(args: &[&str]) -> std::result::Result<Vec<Op>, clap::Error> {
        parse_ops(std::iter::once("tarlogs").chain(args.iter().copied()))
    }

    #[test]
    fn keeps_interleaved_order() {
        let parsed = ops(&[
            "-i", "a.log", "-z", "b.log.gz", "-o", "ab.log", "--input-zip", "c.gz",
            "--input", "d", "--output-entry", "cd.log", "-o", "self.txt",
        ])
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                Op::Input("a.log".into()),
                Op::InputZip("b.log.gz".into()),
                Op::Output("ab.log".into()),
                Op::InputZip("c.gz".into()),
                Op::Input("d".into()),
                Op::Output("cd.log".into()),
                Op::Output("self.txt".into()),
            ]
        );
    }

    #[test]
    fn value_after_a_flag_may_start_with_a_hyphen() {
        let parsed = ops(&["-i", "-a.log", "-z", "-b.gz", "-o", "-x"]).unwrap();
        assert_eq!(
            parsed,
            vec![
                Op::Input("-a.log".into()),
                Op::InputZip("-b.gz".into()),
                Op::Output("-x".into()),
            ]
        );
    }

    #[test]
    fn trailing_flag_without_value_is_rejected() {
        let err = ops(&["-i", "a.log", "-o"]).unwrap_err();
        assert_ne!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn help_flag_is_reported() {
        let err = ops(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn inputs_after_last_output_are_rejected() {
        let parsed = ops(&["-i", "a", "-o", "x", "-z", "b"]).unwrap();
        assert!(matches!(validate(&parsed), Err(Error::Usage(_))));
        assert!(validate(&parsed[..3]).is_ok());
        assert!(validate(&[]).is_ok());
    }
}
