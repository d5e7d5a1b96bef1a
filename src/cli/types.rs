//! CLI type definitions
//!
//! This module contains the clap structure that defines the CLI interface.

use std::path::PathBuf;

use clap::Parser;

/// Test each parameter of a fitting template as a free variable and rank
/// the resulting fits.
#[derive(Parser, Debug)]
#[command(name = "fitsweep")]
#[command(about = "Parallel parameter sweep over an external fitting program", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Template input file of the fitting program
    pub input: PathBuf,

    /// Number of fits run at the same time (defaults to max_workers from config)
    #[arg(short, long, alias = "ncore", value_parser = clap::value_parser!(u16).range(1..=256))]
    pub workers: Option<u16>,

    /// Fix the other free parameters sharing a candidate's parent name
    #[arg(long)]
    pub fix: bool,

    /// Score candidates from their saved .out files when present instead of
    /// running the program again
    #[arg(long)]
    pub reuse_outputs: bool,

    /// Only test parameters up to this order (e.g. 2, 21, 211)
    #[arg(long)]
    pub order: Option<u32>,

    /// Only test the named parameters (takes precedence over --order)
    #[arg(long, num_args = 1.., value_name = "NAME")]
    pub params: Vec<String>,

    /// Fitting program to run (overrides config)
    #[arg(long)]
    pub program: Option<String>,

    /// Directory collecting the .out files (overrides config)
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Configuration file (defaults to ./fitsweep.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output the final report in JSON format
    #[arg(short, long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_minimal_invocation() {
        let cli = Cli::try_parse_from(["fitsweep", "input.txt"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("input.txt"));
        assert_eq!(cli.workers, None);
        assert!(!cli.fix);
        assert!(cli.params.is_empty());
        assert!(!cli.json);
    }

    #[test]
    fn test_full_invocation() {
        let cli = Cli::try_parse_from([
            "fitsweep",
            "molecule.inp",
            "--workers",
            "8",
            "--fix",
            "--reuse-outputs",
            "--params",
            "Dab",
            "Gab",
            "--results-dir",
            "runs",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.workers, Some(8));
        assert!(cli.fix);
        assert!(cli.reuse_outputs);
        assert_eq!(cli.params, vec!["Dab".to_string(), "Gab".to_string()]);
        assert_eq!(cli.results_dir, Some(PathBuf::from("runs")));
        assert!(cli.json);
    }

    #[test]
    fn test_ncore_alias() {
        let cli = Cli::try_parse_from(["fitsweep", "in.txt", "--ncore", "3"]).unwrap();
        assert_eq!(cli.workers, Some(3));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Cli::try_parse_from(["fitsweep", "in.txt", "--workers", "0"]).is_err());
    }

    #[test]
    fn test_order_and_params_together() {
        let cli = Cli::try_parse_from(["fitsweep", "in.txt", "--params", "Dab", "--order", "2"]).unwrap();
        assert_eq!(cli.order, Some(2));
        assert_eq!(cli.params, vec!["Dab".to_string()]);
    }
}
