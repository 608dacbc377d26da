use std::ffi::OsString;
use std::iter;

use clap::Parser;

/// pywrap takes no options of its own: every argument belongs to the
/// interpreter it delegates to.
#[derive(Parser, Debug)]
#[command(
    name = "pywrap",
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
pub struct PywrapCli {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<OsString>,
}

impl PywrapCli {
    /// Parses a raw argv. A `--` is inserted after the program name so that
    /// arguments like `-h`, `--version`, or a literal `--` reach the
    /// interpreter unchanged.
    pub fn from_argv(raw: impl IntoIterator<Item = OsString>) -> Self {
        let mut raw = raw.into_iter();
        let program = raw.next().unwrap_or_else(|| OsString::from("pywrap"));
        Self::parse_from(iter::once(program).chain(iter::once(OsString::from("--"))).chain(raw))
    }
}
