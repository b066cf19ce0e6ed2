//! AutoGaitA CLI
//!
//! Batch driver for the step-cycle engine: runs the per-subject pipeline
//! over every annotated subject (and trial, for 2D data), then assembles
//! group tables from the results.
//!
//! # Usage
//!
//! ```bash
//! # Every subject/trial of a 2D experiment
//! autogaita dlc --folderinfo folderinfo.json --config config.json
//!
//! # One 3D subject
//! autogaita simi --folderinfo folderinfo.json --config config.json --subject SK1
//!
//! # Group tables
//! autogaita group --config group_config.json
//! ```

use clap::{Parser, Subcommand};

pub mod batch;

/// AutoGaitA Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "autogaita")]
#[command(author, version, about = "Automated step-cycle analysis of pose-tracked gait")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyse 2D (DeepLabCut) subjects and trials
    Dlc(batch::DlcArgs),

    /// Analyse 3D (Simi) subjects
    Simi(batch::SimiArgs),

    /// Assemble group tables from per-subject results
    Group(batch::GroupArgs),

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dlc_single_trial() {
        let cli = Cli::try_parse_from([
            "autogaita",
            "dlc",
            "--folderinfo",
            "f.json",
            "--config",
            "c.json",
            "--subject",
            "15",
            "--run",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Dlc(args) => {
                assert_eq!(args.subject.as_deref(), Some("15"));
                assert_eq!(args.run.as_deref(), Some("3"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_run_requires_subject() {
        let result = Cli::try_parse_from([
            "autogaita",
            "dlc",
            "--folderinfo",
            "f.json",
            "--config",
            "c.json",
            "--run",
            "3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_group() {
        let cli = Cli::try_parse_from(["autogaita", "group", "--config", "g.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Group(_)));
    }
}
