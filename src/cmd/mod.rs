//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], or [`validate`]. Each handler
//! lives in its own submodule.

pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::BroadcasterError;

pub async fn dispatch(cli: Cli) -> Result<(), BroadcasterError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  broadcaster v{version} \u{2014} HTTP request broadcaster for cache clusters\n\n  \
         No command provided. To get started:\n\n    \
         broadcaster init                  Generate a starter config\n    \
         broadcaster run                   Start (auto-detects ./broadcaster.yaml)\n    \
         broadcaster run -c caches.yaml    Start with a specific config file\n    \
         broadcaster --help                See all commands and options\n"
    );
}
