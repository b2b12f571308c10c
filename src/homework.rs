use serde_json::Value;
use snafu::{OptionExt, Snafu};

/// The closed review vocabulary. Anything else coming over the wire is an
/// error, never a silently ignored case.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Approved,
    Reviewing,
    Rejected,
}

impl Status {
    fn from_api(status: &str) -> Option<Self> {
        match status {
            "approved" => Some(Status::Approved),
            "reviewing" => Some(Status::Reviewing),
            "rejected" => Some(Status::Rejected),
            _ => None,
        }
    }

    pub fn verdict(self) -> &'static str {
        match self {
            Status::Approved => "Работа проверена: ревьюеру всё понравилось. Ура!",
            Status::Reviewing => "Работа взята на проверку ревьюером.",
            Status::Rejected => "Работа проверена: у ревьюера есть замечания.",
        }
    }
}

/// The `homeworks` sequence, most recently updated submission first.
///
/// Individual records are passed through unchecked.
pub fn homeworks(body: &Value) -> Result<&[Value]> {
    let homeworks = body.get("homeworks").context(MissingHomeworksKeySnafu)?;
    let homeworks = homeworks.as_array().context(HomeworksNotAListSnafu {
        found: json_type(homeworks),
    })?;

    Ok(homeworks)
}

pub fn date_updated(record: &Value) -> Option<&str> {
    record.get("date_updated").and_then(Value::as_str)
}

/// The notification line for one homework record.
pub fn status_change_message(record: &Value) -> Result<String> {
    let name = record
        .get("homework_name")
        .and_then(Value::as_str)
        .context(MissingHomeworkNameSnafu)?;
    let status = record
        .get("status")
        .and_then(Value::as_str)
        .context(MissingStatusSnafu)?;
    let status = Status::from_api(status).context(UnknownStatusSnafu { status })?;

    Ok(format!(
        "Изменился статус проверки работы \"{name}\". {}",
        status.verdict()
    ))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("The response has no \"homeworks\" key"))]
    MissingHomeworksKey,

    #[snafu(display("The \"homeworks\" value is {}, not a list", found))]
    HomeworksNotAList { found: &'static str },

    #[snafu(display("The homework record has no \"homework_name\" key"))]
    MissingHomeworkName,

    #[snafu(display("The homework record has no \"status\" key"))]
    MissingStatus,

    #[snafu(display("The homework status {:?} is unknown", status))]
    UnknownStatus { status: String },
}

type Result<T, E = Error> = std::result::Result<T, E>;
