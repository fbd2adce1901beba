// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, ApplyChanges, Fetch, Matrix, Rollback, Single, Strip, Whoami};

use drivemaster::logging::init_logging;
use drivemaster::AppConfig;

command_enum! {
    (Fetch, Fetch),
    (ApplyChanges, ApplyChanges),
    (Rollback, Rollback),
    (Strip, Strip),
    (Matrix, Matrix),
    (Single, Single),
    (Whoami, Whoami),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let guards = init_logging(args.log_dir.as_deref());
    let ctx = cli::op::OpContext::new(config, args.yes);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush the log writers before exiting
    drop(guards);
    std::process::exit(code);
}
