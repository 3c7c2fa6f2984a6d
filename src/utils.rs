use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::content::RawJson;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Value;
use serde::Serializer;

pub fn try_respond<'r>(req: &'r Request<'_>, json: &Value, status: Status) -> response::Result<'static> {
    let as_json = serde_json::to_string(json);
    match as_json {
        Ok(json) => RawJson(json)
            .respond_to(req)
            .and_then(|resp| Response::build_from(resp).status(status).ok()),

        Err(_) => Err(Status::InternalServerError),
    }
}

/// Timestamps are stored as naive UTC and rendered as ISO-8601 with a `Z`.
pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = DateTime::<Utc>::from_naive_utc_and_offset(*date, Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

/// Current UTC time in the form it is stored.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
