use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt, Snafu};
use std::env;
use tracing::{trace, trace_span, Instrument};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChatId(pub String);

#[derive(Debug, Clone)]
pub struct Config {
    chat_id: ChatId,
    send_message_url: Url,
}

impl Config {
    pub fn from_environment() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN").context(UnknownBotTokenSnafu)?;
        ensure!(!token.is_empty(), EmptyBotTokenSnafu);

        let chat_id = env::var("TELEGRAM_CHAT_ID").context(UnknownChatIdSnafu)?;
        ensure!(!chat_id.is_empty(), EmptyChatIdSnafu);

        let send_message_url =
            Url::parse(&format!("https://api.telegram.org/bot{token}/sendMessage"))
                .context(UnableToConfigureSendMessageUrlSnafu)?;

        Ok(Self {
            chat_id: ChatId(chat_id),
            send_message_url,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_send_message_url(chat_id: impl Into<String>, send_message_url: Url) -> Self {
        Self {
            chat_id: ChatId(chat_id.into()),
            send_message_url,
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
    /// Sends one text message to the configured chat.
    ///
    /// The caller decides what a failure means; this never retries.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let Self { client, config } = self;
        let s = trace_span!("send_message", chat_id = %config.chat_id.0);

        #[derive(Debug, Serialize)]
        struct SendMessageParams<'a> {
            chat_id: &'a ChatId,
            text: &'a str,
        }

        #[derive(Debug, Deserialize)]
        struct SendMessageResponse {
            ok: bool,
            description: Option<String>,
        }

        async {
            trace!("Sending notification");

            let resp = client
                .post(config.send_message_url.clone())
                .form(&SendMessageParams {
                    chat_id: &config.chat_id,
                    text,
                })
                .send()
                .await
                .context(UnableToSendMessageSnafu)?;

            let status = resp.status();
            ensure!(status.is_success(), SendRejectedSnafu { status });

            let resp: SendMessageResponse = resp
                .json()
                .await
                .context(UnableToDeserializeResponseSnafu)?;
            ensure!(
                resp.ok,
                SendFailedSnafu {
                    description: resp.description.unwrap_or_default(),
                }
            );

            Ok(())
        }
        .instrument(s)
        .await
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("TELEGRAM_BOT_TOKEN must be set"))]
    UnknownBotToken {
        source: env::VarError,
    },

    #[snafu(display("TELEGRAM_BOT_TOKEN must not be empty"))]
    EmptyBotToken,

    #[snafu(display("TELEGRAM_CHAT_ID must be set"))]
    UnknownChatId {
        source: env::VarError,
    },

    #[snafu(display("TELEGRAM_CHAT_ID must not be empty"))]
    EmptyChatId,

    UnableToConfigureSendMessageUrl {
        source: url::ParseError,
    },

    #[snafu(display("Unable to reach the Telegram Bot API"))]
    UnableToSendMessage {
        source: reqwest::Error,
    },

    #[snafu(display("The Telegram Bot API returned status {}", status))]
    SendRejected {
        status: reqwest::StatusCode,
    },

    #[snafu(display("The Telegram Bot API response was not JSON"))]
    UnableToDeserializeResponse {
        source: reqwest::Error,
    },

    #[snafu(display("The Telegram Bot API rejected the message: {}", description))]
    SendFailed {
        description: String,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;
