#![deny(rust_2018_idioms)]

use snafu::{ErrorCompat, ResultExt, Snafu};

pub use config::Config;

mod config;
mod flow;
mod homework;
mod practicum;
mod telegram;

fn main() {
    if let Err(e) = core() {
        eprintln!("Error: {}", e);
        for cause in ErrorCompat::iter_chain(&e).skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

#[tokio::main]
async fn core() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = Config::from_environment().context(UnableToConfigureSnafu)?;

    let practicum_config =
        practicum::Config::from_environment().context(UnableToConfigurePracticumSnafu)?;
    let telegram_config =
        telegram::Config::from_environment().context(UnableToConfigureTelegramSnafu)?;

    let relay_flow = flow::RelayFlow::new(
        practicum_config.into_client(),
        telegram_config.into_client(),
        config.poll_interval,
    );
    relay_flow.run().await;

    FlowExitedSnafu.fail()
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Unable to configure application"))]
    UnableToConfigure { source: config::Error },

    #[snafu(display("Unable to configure the homework statuses integration"))]
    UnableToConfigurePracticum { source: practicum::Error },

    #[snafu(display("Unable to configure the Telegram integration"))]
    UnableToConfigureTelegram { source: telegram::Error },

    #[snafu(display("The relay loop exited and never should"))]
    FlowExited,
}

type Result<T, E = Error> = std::result::Result<T, E>;
