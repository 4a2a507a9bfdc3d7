use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rmtree", version)]
#[command(about = "Rebuild the folder tree of a reMarkable backup and export it as PDF", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export every document of the store as PDF
    Export {
        /// The store folder (xochitl directory of the tablet)
        src: PathBuf,

        /// Where to write the folder tree
        dst: PathBuf,

        /// Export even if the store has structural problems
        #[arg(long)]
        ignore_assertions: bool,

        /// Keep the intermediate SVG of every page next to the PDF
        #[arg(long)]
        keep_svg: bool,

        /// Directory holding the page templates as `<name>.svg`
        #[arg(long, value_name = "DIR")]
        templates: Option<PathBuf>,
    },

    /// Check the store without exporting anything
    Check {
        /// The store folder
        src: PathBuf,
    },

    /// Show where each entity of the store would be exported
    #[command(alias = "ls")]
    Tree {
        /// The store folder
        src: PathBuf,
    },

    /// Count the store entries per extension
    Stats {
        /// The store folder
        src: PathBuf,
    },
}
