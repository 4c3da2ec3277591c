use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "vsphere-metrics")]
#[command(about = "Collect datastore and virtual machine metrics from ESX or vCenter")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// ESX or vCenter URL [GOVMOMI_URL]
    #[arg(short, long, global = true)]
    pub url: Option<String>,

    /// Username, overrides the one in the URL [GOVMOMI_USERNAME]
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Password, overrides the one in the URL [GOVMOMI_PASSWORD]
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Don't verify the server's certificate chain [GOVMOMI_INSECURE]
    #[arg(short = 'k', long, global = true)]
    pub insecure: bool,

    /// Datacenter to collect from when more than one exists [GOVMOMI_DATACENTER]
    #[arg(short, long, global = true)]
    pub datacenter: Option<String>,

    /// Only collect objects whose name matches this glob
    #[arg(short, long, default_value = "*", global = true)]
    pub pattern: String,

    /// VI/JSON API release to address [GOVMOMI_VIM_VERSION]
    #[arg(long, global = true)]
    pub api_release: Option<String>,

    /// Deadline for the whole run, in seconds [GOVMOMI_TIMEOUT]
    #[arg(short, long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect datastore and VM metrics and print them
    Collect {
        /// Output format (table, json, or yaml)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Collect datastore and VM metrics and post them to a metrics API
    Post {
        /// Metrics API base URL
        #[arg(short, long, default_value = "http://localhost:6183")]
        api_url: String,
    },
}
