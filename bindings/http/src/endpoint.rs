use std::fmt::{Display, Formatter};

use rand::Rng;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::checks::Check;
use crate::client::HttpResponse;

const ACCEPT_JSON: &str =
    "application/json,text/html;q=0.9,application/xhtml+xml;q=0.9,application/xml;q=0.8,*/*;q=0.7";
const ACCEPT_PLAINTEXT: &str =
    "text/plain,text/html;q=0.9,application/xhtml+xml;q=0.9,application/xml;q=0.8,*/*;q=0.7";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

const HELLO_WORLD: &str = "Hello, World!";
const WORLD_ID_RANGE: std::ops::RangeInclusive<i64> = 1..=10_000;

/// Rows in the fortunes table, 12 fortunes plus the header row, must be at least this many.
const MIN_FORTUNE_ROWS: usize = 12;

const FORTUNES_STRUCTURE: [&str; 10] = [
    "<!DOCTYPE html>",
    "<html>",
    "<head>",
    "<title>Fortunes</title>",
    "<body>",
    "<table>",
    "<tr><th>id</th><th>message</th></tr>",
    "</table>",
    "</body>",
    "</html>",
];

/// An endpoint of the benchmark server, with the request to send and the checks its response must
/// pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Plaintext,
    Json,
    /// A single database row
    Db,
    /// `q` database rows
    Queries(usize),
    /// `q` rows from the server's cache
    CachedQueries(usize),
    /// Update and return `q` database rows
    Updates(usize),
    Fortunes,
    /// A form POST that the server answers after `delay_ms`
    HelloForm { delay_ms: u64 },
}

impl Endpoint {
    /// [Endpoint::Queries] with a random row count from 1 to 20.
    pub fn random_queries() -> Self {
        Endpoint::Queries(rand::thread_rng().gen_range(1..=20))
    }

    /// [Endpoint::CachedQueries] with a random row count from 1 to 100.
    pub fn random_cached_queries() -> Self {
        Endpoint::CachedQueries(rand::thread_rng().gen_range(1..=100))
    }

    /// [Endpoint::Updates] with a random row count from 1 to 20.
    pub fn random_updates() -> Self {
        Endpoint::Updates(rand::thread_rng().gen_range(1..=20))
    }

    /// The path without its leading slash or query, used to label summary files.
    pub fn slug(&self) -> &'static str {
        match self {
            Endpoint::Plaintext => "plaintext",
            Endpoint::Json => "json",
            Endpoint::Db => "db",
            Endpoint::Queries(_) => "queries",
            Endpoint::CachedQueries(_) => "cached-queries",
            Endpoint::Updates(_) => "updates",
            Endpoint::Fortunes => "fortunes",
            Endpoint::HelloForm { .. } => "helloform",
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::Plaintext => "/plaintext".to_string(),
            Endpoint::Json => "/json".to_string(),
            Endpoint::Db => "/db".to_string(),
            Endpoint::Queries(q) => format!("/queries?q={q}"),
            Endpoint::CachedQueries(q) => format!("/cached-queries?q={q}"),
            Endpoint::Updates(q) => format!("/updates?q={q}"),
            Endpoint::Fortunes => "/fortunes".to_string(),
            Endpoint::HelloForm { .. } => "/helloform".to_string(),
        }
    }

    pub fn accept(&self) -> Option<&'static str> {
        match self {
            Endpoint::Plaintext => Some(ACCEPT_PLAINTEXT),
            Endpoint::Json
            | Endpoint::Db
            | Endpoint::Queries(_)
            | Endpoint::CachedQueries(_)
            | Endpoint::Updates(_) => Some(ACCEPT_JSON),
            Endpoint::Fortunes => Some(ACCEPT_HTML),
            Endpoint::HelloForm { .. } => None,
        }
    }

    /// Build the request against `base_url`, which must not end with a slash.
    pub fn request(&self, client: &Client, base_url: &str) -> RequestBuilder {
        let url = format!("{base_url}{}", self.path());

        let request = match self {
            Endpoint::HelloForm { delay_ms } => client
                .post(url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(format!("delay={delay_ms}&message=Hello, world!")),
            _ => client.get(url),
        };

        match self.accept() {
            Some(accept) => request.header(ACCEPT, accept),
            None => request,
        }
    }

    /// Evaluate every check for this endpoint against the response.
    pub fn checks(&self, response: &HttpResponse) -> Vec<Check> {
        let mut checks = vec![Check::new("status is 200", response.status == 200)];

        match self {
            Endpoint::Plaintext => {
                checks.push(content_type_check(
                    "content-type is text/plain",
                    response,
                    "text/plain",
                ));
                checks.push(Check::new(
                    "body is exactly Hello, World!",
                    response.body == HELLO_WORLD,
                ));
                checks.push(Check::new(
                    "content-length header matches body length",
                    response.content_length() == Some(HELLO_WORLD.len() as u64),
                ));
            }
            Endpoint::Json => {
                let body = json_checks(response, &mut checks);
                checks.push(Check::new(
                    "has correct structure",
                    body.is_some_and(|b| b["message"] == HELLO_WORLD),
                ));
            }
            Endpoint::Db => {
                let body = json_checks(response, &mut checks);
                checks.push(Check::new(
                    "has correct structure",
                    body.is_some_and(|b| is_world(&b)),
                ));
            }
            Endpoint::Queries(q) | Endpoint::CachedQueries(q) | Endpoint::Updates(q) => {
                let body = json_checks(response, &mut checks);
                checks.push(Check::new(
                    "has correct structure",
                    body.is_some_and(|b| is_world_list(&b, *q)),
                ));
            }
            Endpoint::Fortunes => {
                checks.push(content_type_check(
                    "content-type is text/html",
                    response,
                    "text/html",
                ));
                checks.push(Check::new(
                    "has fortune table",
                    response.body.contains("<table>"),
                ));
                checks.push(Check::new(
                    "has expected structure",
                    FORTUNES_STRUCTURE
                        .iter()
                        .all(|part| response.body.contains(part)),
                ));
                checks.push(Check::new(
                    "has appropriate fortune count",
                    response.body.matches("<tr>").count() >= MIN_FORTUNE_ROWS,
                ));
            }
            Endpoint::HelloForm { .. } => {}
        }

        checks
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

fn content_type_check(name: &'static str, response: &HttpResponse, expected: &str) -> Check {
    Check::new(
        name,
        response
            .content_type()
            .is_some_and(|content_type| content_type.contains(expected)),
    )
}

/// Add the content type and valid JSON checks, returning the parsed body if it was valid.
fn json_checks(response: &HttpResponse, checks: &mut Vec<Check>) -> Option<Value> {
    let content_type = content_type_check(
        "content-type is application/json",
        response,
        "application/json",
    );
    checks.push(content_type);

    let body = serde_json::from_str::<Value>(&response.body).ok();
    checks.push(Check::new(
        "response is valid JSON",
        response.status == 200 && content_type.passed && body.is_some(),
    ));

    body
}

fn is_world(value: &Value) -> bool {
    let in_range = |key: &str| {
        value[key]
            .as_i64()
            .is_some_and(|n| WORLD_ID_RANGE.contains(&n))
    };

    value.is_object() && in_range("id") && in_range("randomNumber")
}

fn is_world_list(value: &Value, expected: usize) -> bool {
    value
        .as_array()
        .is_some_and(|rows| rows.len() == expected && rows.iter().all(is_world))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};

    fn response(status: u16, content_type: &str, body: &str) -> HttpResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers.insert(
            CONTENT_LENGTH,
            HeaderValue::from_str(&body.len().to_string()).unwrap(),
        );
        HttpResponse::new(status, headers, body)
    }

    fn failed(checks: &[Check]) -> Vec<&'static str> {
        checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name)
            .collect()
    }

    fn fortunes_body(rows: usize) -> String {
        let mut body = String::from(
            "<!DOCTYPE html><html><head><title>Fortunes</title></head><body><table><tr><th>id</th><th>message</th></tr>",
        );
        for i in 1..rows {
            body.push_str(&format!("<tr><td>{i}</td><td>fortune</td></tr>"));
        }
        body.push_str("</table></body></html>");
        body
    }

    #[test]
    fn paths() {
        assert_eq!("/plaintext", Endpoint::Plaintext.path());
        assert_eq!("/queries?q=7", Endpoint::Queries(7).path());
        assert_eq!("/cached-queries?q=100", Endpoint::CachedQueries(100).path());
        assert_eq!("/helloform", Endpoint::HelloForm { delay_ms: 5 }.path());
    }

    #[test]
    fn slug_drops_query() {
        assert_eq!("cached-queries", Endpoint::CachedQueries(3).slug());
        assert_eq!(
            format!("/{}", Endpoint::Fortunes.slug()),
            Endpoint::Fortunes.path()
        );
    }

    #[test]
    fn random_counts_stay_in_range() {
        for _ in 0..200 {
            match Endpoint::random_queries() {
                Endpoint::Queries(q) => assert!((1..=20).contains(&q)),
                other => panic!("unexpected endpoint {other}"),
            }
            match Endpoint::random_cached_queries() {
                Endpoint::CachedQueries(q) => assert!((1..=100).contains(&q)),
                other => panic!("unexpected endpoint {other}"),
            }
        }
    }

    #[test]
    fn plaintext_passes() {
        let checks =
            Endpoint::Plaintext.checks(&response(200, "text/plain; charset=utf-8", "Hello, World!"));

        assert_eq!(4, checks.len());
        assert!(failed(&checks).is_empty());
    }

    #[test]
    fn plaintext_wrong_body() {
        let checks = Endpoint::Plaintext.checks(&response(200, "text/plain", "Hello, World"));

        assert_eq!(
            vec![
                "body is exactly Hello, World!",
                "content-length header matches body length"
            ],
            failed(&checks)
        );
    }

    #[test]
    fn json_message() {
        let ok = Endpoint::Json.checks(&response(
            200,
            "application/json",
            r#"{"message":"Hello, World!"}"#,
        ));
        assert!(failed(&ok).is_empty());

        let wrong = Endpoint::Json.checks(&response(
            200,
            "application/json",
            r#"{"message":"Goodbye"}"#,
        ));
        assert_eq!(vec!["has correct structure"], failed(&wrong));
    }

    #[test]
    fn invalid_json_fails_every_body_check() {
        let checks = Endpoint::Db.checks(&response(200, "application/json", "not json"));

        assert_eq!(
            vec!["response is valid JSON", "has correct structure"],
            failed(&checks)
        );
    }

    #[test]
    fn db_row_bounds() {
        let ok = Endpoint::Db.checks(&response(
            200,
            "application/json",
            r#"{"id":1,"randomNumber":10000}"#,
        ));
        assert!(failed(&ok).is_empty());

        let out_of_range = Endpoint::Db.checks(&response(
            200,
            "application/json",
            r#"{"id":0,"randomNumber":5}"#,
        ));
        assert_eq!(vec!["has correct structure"], failed(&out_of_range));
    }

    #[test]
    fn query_row_count_must_match() {
        let body = r#"[{"id":1,"randomNumber":2},{"id":3,"randomNumber":4}]"#;

        let ok = Endpoint::Updates(2).checks(&response(200, "application/json", body));
        assert!(failed(&ok).is_empty());

        let short = Endpoint::Queries(3).checks(&response(200, "application/json", body));
        assert_eq!(vec!["has correct structure"], failed(&short));
    }

    #[test]
    fn fortunes_table() {
        let ok = Endpoint::Fortunes.checks(&response(
            200,
            "text/html; charset=utf-8",
            &fortunes_body(13),
        ));
        assert!(failed(&ok).is_empty());

        let short = Endpoint::Fortunes.checks(&response(200, "text/html", &fortunes_body(5)));
        assert_eq!(vec!["has appropriate fortune count"], failed(&short));
    }

    #[test]
    fn server_error_fails_status() {
        let checks = Endpoint::HelloForm { delay_ms: 0 }.checks(&response(500, "text/plain", ""));

        assert_eq!(vec!["status is 200"], failed(&checks));
    }

    #[test]
    fn hello_form_request() {
        let request = Endpoint::HelloForm { delay_ms: 25 }
            .request(&Client::new(), "http://localhost:8000")
            .build()
            .unwrap();

        assert_eq!(reqwest::Method::POST, request.method());
        assert_eq!("http://localhost:8000/helloform", request.url().as_str());
        assert_eq!(
            Some(&b"delay=25&message=Hello, world!"[..]),
            request.body().and_then(|b| b.as_bytes())
        );
    }

    #[test]
    fn accept_header_is_set() {
        let request = Endpoint::Fortunes
            .request(&Client::new(), "http://localhost:8000")
            .build()
            .unwrap();

        assert_eq!(ACCEPT_HTML, request.headers()[ACCEPT]);
    }
}
