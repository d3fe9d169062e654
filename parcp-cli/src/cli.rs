use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "parcp")]
#[clap(about = "Copy a file with a group of parallel workers", long_about = None)]
pub struct Cli {
    #[clap(help = "File to copy")]
    pub source: PathBuf,

    #[clap(help = "Where to copy it")]
    pub destination: PathBuf,

    #[clap(
        short,
        long,
        help = "Number of workers [default: available parallelism]"
    )]
    pub workers: Option<usize>,
}
