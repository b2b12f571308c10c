use crate::{homework, practicum, telegram};
use snafu::{ErrorCompat, ResultExt, Snafu};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time;
use tracing::{error, info, trace, trace_span, Instrument};

/// Drives the fetch → validate → diff → notify cycle.
///
/// Owns the only two pieces of state in the program: the poll cursor
/// bounding the next query and the `date_updated` marker of the last
/// notified homework. Neither survives a restart.
pub struct RelayFlow {
    practicum: practicum::Client,
    telegram: telegram::Client,
    poll_interval: Duration,
    cursor: i64,
    marker: Option<String>,
}

impl RelayFlow {
    pub fn new(
        practicum: practicum::Client,
        telegram: telegram::Client,
        poll_interval: Duration,
    ) -> Self {
        Self {
            practicum,
            telegram,
            poll_interval,
            cursor: unix_now(),
            marker: None,
        }
    }

    /// Runs until the process is killed. There is no terminal state.
    pub async fn run(mut self) {
        loop {
            self.tick().await;
            time::sleep(self.poll_interval).await;
        }
    }

    /// One complete cycle. Every failure is absorbed here; the fixed
    /// interval cadence belongs to [`run`](Self::run) alone.
    async fn tick(&mut self) {
        if let Err(e) = self.poll_once().await {
            let report = error_chain(&e);
            error!("Polling iteration failed: {}", report);
            self.notify(&format!("Сбой в работе программы: {report}"))
                .await;
        }
    }

    async fn poll_once(&mut self) -> Result<()> {
        let s = trace_span!("poll_once", cursor = self.cursor);

        async {
            let body = self
                .practicum
                .homework_statuses(self.cursor)
                .await
                .context(UnableToFetchStatusesSnafu)?;

            let homeworks = homework::homeworks(&body).context(MalformedResponseSnafu)?;

            // The next query starts from "now" only once this one has
            // fetched and validated; a failed cycle re-queries the same
            // window.
            self.cursor = unix_now();

            let record = match homeworks.first() {
                Some(record) => record,
                None => {
                    trace!("No homeworks updated");
                    return Ok(());
                }
            };

            // A record without a date collapses to the empty marker, so
            // the first one observed after boot still notifies.
            let date_updated = homework::date_updated(record).unwrap_or_default();
            if self.marker.as_deref() == Some(date_updated) {
                trace!("Most recent homework already notified");
                return Ok(());
            }
            self.marker = Some(date_updated.to_owned());

            let message =
                homework::status_change_message(record).context(UnableToFormatStatusSnafu)?;
            self.notify(&message).await;

            Ok(())
        }
        .instrument(s)
        .await
    }

    /// Best-effort dispatch. A failed send is logged and dropped, never
    /// retried.
    async fn notify(&self, text: &str) {
        match self.telegram.send_message(text).await {
            Ok(()) => info!("Sent notification: {}", text),
            Err(e) => error!("Unable to send notification: {}", e),
        }
    }
}

fn error_chain(e: &Error) -> String {
    e.iter_chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to fetch homework statuses"))]
    UnableToFetchStatuses { source: practicum::Error },

    #[snafu(display("The homework statuses response is malformed"))]
    MalformedResponse { source: homework::Error },

    #[snafu(display("Unable to format the homework status"))]
    UnableToFormatStatus { source: homework::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const STATUSES_PATH: &str = "/api/user_api/homework_statuses/";
    const SEND_MESSAGE_PATH: &str = "/botTEST/sendMessage";

    fn flow_for(api: &MockServer, bot: &MockServer) -> RelayFlow {
        let statuses_url = Url::parse(&api.uri()).unwrap().join(STATUSES_PATH).unwrap();
        let send_message_url = Url::parse(&bot.uri())
            .unwrap()
            .join(SEND_MESSAGE_PATH)
            .unwrap();

        RelayFlow::new(
            practicum::Config::with_statuses_url("test-token", statuses_url).into_client(),
            telegram::Config::with_send_message_url("12345", send_message_url).into_client(),
            Duration::from_secs(600),
        )
    }

    async fn mount_statuses(api: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(STATUSES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(api)
            .await;
    }

    async fn mount_send_message(bot: &MockServer, expect: u64) {
        Mock::given(method("POST"))
            .and(path(SEND_MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(expect)
            .mount(bot)
            .await;
    }

    fn sent_texts(requests: &[Request]) -> Vec<String> {
        requests
            .iter()
            .map(|r| {
                url::form_urlencoded::parse(&r.body)
                    .find(|(key, _)| key == "text")
                    .map(|(_, value)| value.into_owned())
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn notifies_once_per_status_update() {
        let api = MockServer::start().await;
        let bot = MockServer::start().await;

        mount_statuses(
            &api,
            json!({
                "homeworks": [{
                    "homework_name": "hw1",
                    "status": "approved",
                    "date_updated": "2024-01-01T00:00:00",
                }],
            }),
        )
        .await;
        mount_send_message(&bot, 1).await;

        let mut flow = flow_for(&api, &bot);
        flow.tick().await;
        flow.tick().await;

        let requests = bot.received_requests().await.unwrap();
        assert_eq!(
            sent_texts(&requests),
            ["Изменился статус проверки работы \"hw1\". \
              Работа проверена: ревьюеру всё понравилось. Ура!"]
        );
        assert_eq!(flow.marker.as_deref(), Some("2024-01-01T00:00:00"));
    }

    #[tokio::test]
    async fn stays_quiet_when_nothing_changed() {
        let api = MockServer::start().await;
        let bot = MockServer::start().await;

        mount_statuses(&api, json!({ "homeworks": [] })).await;
        mount_send_message(&bot, 0).await;

        let mut flow = flow_for(&api, &bot);
        flow.tick().await;

        assert_eq!(flow.marker, None);
    }

    #[tokio::test]
    async fn advances_the_cursor_after_a_successful_poll() {
        let api = MockServer::start().await;
        let bot = MockServer::start().await;

        mount_statuses(&api, json!({ "homeworks": [] })).await;
        mount_send_message(&bot, 0).await;

        let mut flow = flow_for(&api, &bot);
        flow.cursor = 0;
        flow.tick().await;

        assert!(flow.cursor > 0);
    }

    #[tokio::test]
    async fn sends_the_cursor_as_the_query_lower_bound() {
        let api = MockServer::start().await;
        let bot = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(STATUSES_PATH))
            .and(query_param("from_date", "1700000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "homeworks": [] })))
            .expect(1)
            .mount(&api)
            .await;
        mount_send_message(&bot, 0).await;

        let mut flow = flow_for(&api, &bot);
        flow.cursor = 1700000000;
        flow.tick().await;
    }

    #[tokio::test]
    async fn an_unknown_status_fails_without_notifying() {
        let api = MockServer::start().await;
        let bot = MockServer::start().await;

        mount_statuses(
            &api,
            json!({
                "homeworks": [{
                    "homework_name": "hw2",
                    "status": "weird",
                }],
            }),
        )
        .await;
        mount_send_message(&bot, 0).await;

        let mut flow = flow_for(&api, &bot);
        let err = flow.poll_once().await.unwrap_err();

        assert!(matches!(
            err,
            Error::UnableToFormatStatus {
                source: homework::Error::UnknownStatus { .. },
            }
        ));
    }

    #[tokio::test]
    async fn a_failing_endpoint_leaves_the_cursor_alone() {
        let api = MockServer::start().await;
        let bot = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(STATUSES_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&api)
            .await;
        mount_send_message(&bot, 0).await;

        let mut flow = flow_for(&api, &bot);
        flow.cursor = 42;
        let err = flow.poll_once().await.unwrap_err();

        assert!(matches!(
            err,
            Error::UnableToFetchStatuses {
                source: practicum::Error::EndpointFailed { .. },
            }
        ));
        assert_eq!(flow.cursor, 42);
    }

    #[tokio::test]
    async fn a_malformed_response_is_relayed_as_a_failure_message() {
        let api = MockServer::start().await;
        let bot = MockServer::start().await;

        mount_statuses(&api, json!({ "current_date": 0 })).await;
        mount_send_message(&bot, 1).await;

        let mut flow = flow_for(&api, &bot);
        flow.tick().await;

        let requests = bot.received_requests().await.unwrap();
        let texts = sent_texts(&requests);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Сбой в работе программы: "));
        assert!(texts[0].contains("\"homeworks\""));
    }
}
