use super::args::{Cli, Command};

pub mod evaluate;
pub mod experiments;
pub mod generate;
pub(crate) mod registry_builder;
pub mod summarize;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.config.clone();
    let config = config.as_deref();
    match cli.cmd {
        Command::Translate(args) => generate::run(args, generate::Stage::Translate, config).await,
        Command::Analyze(args) => generate::run(args, generate::Stage::Analyze, config).await,
        Command::Evaluate(args) => evaluate::run(args, config).await,
        Command::Experiments(args) => experiments::run(args, config),
        Command::Summarize(args) => summarize::run(args, config),
    }
}
