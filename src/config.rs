use snafu::{ensure, ResultExt, Snafu};
use std::{env, time::Duration};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct Config {
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_environment() -> Result<Self> {
        let poll_interval = poll_interval(env::var("POLL_INTERVAL_SECONDS").ok())?;

        Ok(Self { poll_interval })
    }
}

fn poll_interval(raw: Option<String>) -> Result<Duration> {
    match raw {
        Some(seconds) => {
            let parsed = seconds.parse::<u64>().context(InvalidPollIntervalSnafu {
                seconds: seconds.clone(),
            })?;
            ensure!(parsed > 0, ZeroPollIntervalSnafu { seconds });

            Ok(Duration::from_secs(parsed))
        }
        None => Ok(DEFAULT_POLL_INTERVAL),
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("POLL_INTERVAL_SECONDS is invalid: {:?}", seconds))]
    InvalidPollInterval {
        source: std::num::ParseIntError,
        seconds: String,
    },

    #[snafu(display("POLL_INTERVAL_SECONDS must be positive, got {:?}", seconds))]
    ZeroPollInterval { seconds: String },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_the_poll_interval() {
        let interval = poll_interval(None).unwrap();

        assert_eq!(interval, Duration::from_secs(600));
    }

    #[test]
    fn accepts_an_explicit_poll_interval() {
        let interval = poll_interval(Some("30".into())).unwrap();

        assert_eq!(interval, Duration::from_secs(30));
    }

    #[test]
    fn rejects_a_zero_poll_interval() {
        let err = poll_interval(Some("0".into())).unwrap_err();

        assert!(matches!(err, Error::ZeroPollInterval { .. }));
    }

    #[test]
    fn rejects_a_poll_interval_that_is_not_a_number() {
        let err = poll_interval(Some("soon".into())).unwrap_err();

        assert!(matches!(err, Error::InvalidPollInterval { .. }));
    }
}
