//! FLOP counter options

use clap::Parser;
use std::fmt;

use crate::{CountingMode, ErrWrongArguments, FlopCounterErr, FpCriterion};

pub const FLOPCOUNT_VERSION_MESSAGE: &str = env!("CARGO_PKG_VERSION");

/// Routines instrumented when no `--routine` is given: the two benchmark kernels
pub const DEFAULT_TARGET_ROUTINES: [&str; 2] = ["multiplyMatrix", "multiplySparseMatrix"];

/// FLOP counter options structure
#[derive(Parser, Debug, Clone)]
#[command(version = FLOPCOUNT_VERSION_MESSAGE, about, long_about = None)]
#[command(propagate_version = true)]
pub struct FlopOptions {
    /// Sets the recorded session file to replay
    #[clap(short, long, value_name = "TRACE_FILE")]
    pub trace: Option<String>,
    /// Sets the report output file path.  The report goes to stderr when not set.
    #[clap(short, long, value_name = "OUTPUT_FILE")]
    pub output: Option<String>,
    /// Adds a routine to the instrumentation allow-list.  Can be repeated.  Names are matched
    /// against the undecorated symbol name, without parameters.
    #[clap(short = 'r', long = "routine", value_name = "ROUTINE", default_values = DEFAULT_TARGET_ROUTINES)]
    pub routines: Vec<String>,
    /// Only instrument routines of the image with this file name (path is ignored)
    #[clap(short, long, value_name = "IMAGE")]
    pub image: Option<String>,
    /// Counting strategy used on the hot path
    #[clap(short, long, value_enum, value_name = "MODE", default_value_t = CountingMode::ThreadLocal)]
    pub mode: CountingMode,
    /// Floating-point classification criterion
    #[clap(short, long, value_enum, value_name = "CRITERION", default_value_t = FpCriterion::Strict)]
    pub fp_criterion: FpCriterion,
    /// Also saves the aggregated result as JSON in this file
    #[clap(short, long, value_name = "JSON_FILE")]
    pub json: Option<String>,
    /// Lists every executed instruction form in the report, not only the floating-point ones.
    /// Enabled with `-a`.
    #[clap(short = 'a', long, default_value = "false")]
    pub all_forms: bool,
    /// Verbosity (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, help = "Increase verbosity level")]
    pub verbose: u8,
}

impl Default for FlopOptions {
    /// Default constructor for FlopOptions structure
    fn default() -> Self {
        Self {
            trace: None,
            output: None,
            routines: DEFAULT_TARGET_ROUTINES.iter().map(|name| name.to_string()).collect(),
            image: None,
            mode: CountingMode::ThreadLocal,
            fp_criterion: FpCriterion::Strict,
            json: None,
            all_forms: false,
            verbose: 0,
        }
    }
}

impl fmt::Display for FlopOptions {
    /// Formats a string with the configuration information
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TRACE: {:?}", self.trace)?;
        writeln!(f, "OUTPUT: {:?}", self.output)?;
        writeln!(f, "ROUTINES: {:?}", self.routines)?;
        writeln!(f, "IMAGE: {:?}", self.image)?;
        writeln!(f, "MODE: {}", self.mode)?;
        writeln!(f, "FP_CRITERION: {}", self.fp_criterion)?;
        writeln!(f, "JSON: {:?}", self.json)?;
        writeln!(f, "ALL_FORMS: {}", self.all_forms)?;
        writeln!(f, "VERBOSE: {}", self.verbose)?;
        Ok(())
    }
}

impl FlopOptions {
    /// Checks the options that clap cannot check by itself
    pub fn validate(&self) -> Result<(), FlopCounterErr> {
        if self.routines.is_empty() {
            return Err(FlopCounterErr::WrongArguments(ErrWrongArguments::new(
                "at least one target routine is required",
            )));
        }
        if let Some(name) = self.routines.iter().find(|name| name.trim().is_empty()) {
            return Err(FlopCounterErr::WrongArguments(ErrWrongArguments::new(format!(
                "invalid target routine name {name:?}"
            ))));
        }
        if matches!(&self.image, Some(image) if image.trim().is_empty()) {
            return Err(FlopCounterErr::WrongArguments(ErrWrongArguments::new(
                "target image name cannot be empty",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = FlopOptions::parse_from(["flopcount"]);
        assert_eq!(options.routines, vec!["multiplyMatrix", "multiplySparseMatrix"]);
        assert_eq!(options.mode, CountingMode::ThreadLocal);
        assert_eq!(options.fp_criterion, FpCriterion::Strict);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_parse_options() {
        let options = FlopOptions::parse_from([
            "flopcount",
            "-t",
            "session.json",
            "-r",
            "dgemm",
            "-r",
            "spmv",
            "-m",
            "locked",
            "-f",
            "category",
            "-i",
            "bench.exe",
            "-vv",
        ]);
        assert_eq!(options.trace.as_deref(), Some("session.json"));
        assert_eq!(options.routines, vec!["dgemm", "spmv"]);
        assert_eq!(options.mode, CountingMode::Locked);
        assert_eq!(options.fp_criterion, FpCriterion::CategoryOnly);
        assert_eq!(options.image.as_deref(), Some("bench.exe"));
        assert_eq!(options.verbose, 2);
    }

    #[test]
    fn test_validate_rejects_blank_routine() {
        let options = FlopOptions { routines: vec!["  ".to_string()], ..Default::default() };
        assert!(matches!(options.validate(), Err(FlopCounterErr::WrongArguments(_))));

        let options = FlopOptions { routines: Vec::new(), ..Default::default() };
        assert!(options.validate().is_err());
    }
}
