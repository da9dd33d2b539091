use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vidfetch")]
#[command(author, version, about = "Local web front-end for downloading videos with live progress", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server (default)
    Serve {
        /// Address to bind (overrides WEB_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Default download directory (overrides DOWNLOAD_DIR)
        #[arg(short, long)]
        download_dir: Option<String>,
    },

    /// Show the available formats of a video
    Info {
        /// Video URL
        url: String,

        /// Print the format table as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
