use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "twinchat")]
#[command(about = "Chat backend for a tool-using persona", long_about = None)]
pub struct Args {
    #[arg(long = "host", help = "Address to listen on (default 0.0.0.0)")]
    pub host: Option<String>,

    #[arg(short = 'p', long = "port", help = "Port to listen on (default 8000)")]
    pub port: Option<u16>,

    #[arg(short = 'c', long = "config", help = "Path to a YAML or JSON config file")]
    pub config: Option<String>,

    #[arg(short = 'v', long = "verbose", help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        long = "api-endpoint",
        help = "Custom model API base URL (e.g., http://localhost:11434/v1)"
    )]
    pub api_endpoint: Option<String>,

    #[arg(long = "model", help = "Model name to request")]
    pub model: Option<String>,

    #[arg(long = "list-tools", help = "Print the registered tools and exit")]
    pub list_tools: bool,
}
