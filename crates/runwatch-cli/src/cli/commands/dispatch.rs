use super::super::args::{Cli, Command};
use crate::exit_codes::EXIT_SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    match cli.cmd {
        Command::Ingest(args) => super::ingest::run(args, &global),
        Command::Ack(args) => super::ack::run(args, &global),
        Command::Subscribe(args) => super::subscribe::run(args, &global),
        Command::Task(args) => super::task::run(args, &global),
        Command::Fanout(args) => super::fanout::run(args, &global).await,
        Command::Serve(args) => super::serve::run(args, &global).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(EXIT_SUCCESS)
        }
    }
}
