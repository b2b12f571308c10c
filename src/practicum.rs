use serde::Serialize;
use serde_json::Value;
use snafu::{ensure, ResultExt, Snafu};
use std::env;
use tracing::{trace, trace_span, Instrument};
use url::Url;

const STATUSES_URI: &str = "https://practicum.yandex.ru/api/user_api/homework_statuses/";

#[derive(Debug, Clone)]
pub struct Config {
    token: String,
    statuses_url: Url,
}

impl Config {
    pub fn from_environment() -> Result<Self> {
        let token = env::var("PRACTICUM_TOKEN").context(UnknownApiTokenSnafu)?;
        ensure!(!token.is_empty(), EmptyApiTokenSnafu);

        let statuses_url = Url::parse(STATUSES_URI).context(UnableToConfigureStatusesUrlSnafu)?;

        Ok(Self {
            token,
            statuses_url,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_statuses_url(token: impl Into<String>, statuses_url: Url) -> Self {
        Self {
            token: token.into(),
            statuses_url,
        }
    }

    pub fn into_client(self) -> Client {
        Client {
            client: reqwest::Client::new(),
            config: self,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    client: reqwest::Client,
    config: Config,
}

impl Client {
    /// Fetches every homework whose status changed since `from_date`.
    ///
    /// The body is decoded but deliberately kept loose; shape checks
    /// belong to [`crate::homework`].
    pub async fn homework_statuses(&self, from_date: i64) -> Result<Value> {
        let Self { client, config } = self;
        let s = trace_span!("homework_statuses", from_date);

        #[derive(Debug, Serialize)]
        struct StatusesParams {
            from_date: i64,
        }

        async {
            trace!("Requesting homework statuses");

            let resp = client
                .get(config.statuses_url.clone())
                .header("Authorization", format!("OAuth {}", config.token))
                .query(&StatusesParams { from_date })
                .send()
                .await
                .context(UnableToExecuteRequestSnafu)?;

            let status = resp.status();
            ensure!(
                status == reqwest::StatusCode::OK,
                EndpointFailedSnafu { status }
            );

            resp.json().await.context(UnableToDeserializeResponseSnafu)
        }
        .instrument(s)
        .await
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("PRACTICUM_TOKEN must be set"))]
    UnknownApiToken {
        source: env::VarError,
    },

    #[snafu(display("PRACTICUM_TOKEN must not be empty"))]
    EmptyApiToken,

    UnableToConfigureStatusesUrl {
        source: url::ParseError,
    },

    #[snafu(display("Unable to reach the homework statuses endpoint"))]
    UnableToExecuteRequest {
        source: reqwest::Error,
    },

    #[snafu(display("The homework statuses endpoint returned status {}", status))]
    EndpointFailed {
        status: reqwest::StatusCode,
    },

    #[snafu(display("The homework statuses response was not JSON"))]
    UnableToDeserializeResponse {
        source: reqwest::Error,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;
