use clap::Parser;
use env_logger::Env;

use facecheck::Opts;
use facecheck::cli::SubCommandExtend;
use facecheck::config::SubCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Server(cmd) => cmd.run(&opts).await,
        SubCommand::Compare(cmd) => cmd.run(&opts).await,
    }
}
