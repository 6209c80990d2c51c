use std::path::PathBuf;

/// Vector tile builder and server (logs go to stderr)
#[derive(clap::Parser, Debug)]
#[command(name = "vectiles", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Build an MBTiles store from GeoJSON layers
    Build(BuildArgs),

    /// Serve an MBTiles store over HTTP
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// GeoJSON FeatureCollection files, one layer each, named after the file stem
    #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
    pub inputs: Vec<PathBuf>,

    /// Output MBTiles file, defaults to the configured store
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Lowest zoom level to build
    #[arg(long)]
    pub min_zoom: Option<u8>,

    /// Highest zoom level to build
    #[arg(long)]
    pub max_zoom: Option<u8>,

    /// JSON config file
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Serve the result once built
    #[arg(long)]
    pub serve: bool,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// MBTiles file, defaults to the configured store
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub mbtiles: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind, 0 for any free port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// JSON config file
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}
