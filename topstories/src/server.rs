use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rocket::fairing::AdHoc;
use rocket::http::{ContentType, Status};
use rocket::request::{FromParam, FromRequest, Outcome, Request};
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::catcher::{self, Catcher};
use rocket::{catch, catchers, get, routes, Build, Rocket, State};
use serde::Serialize;
use serde_json::json;

use common::Config;

use crate::articles::{Article, DateBucket};
use crate::error::StoryError;
use crate::sources::{SourceKind, SourceRegistry};
use crate::stories::{StoryQuery, StoryService};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub service: StoryService,
    /// Used when the source header is absent or unparseable
    pub default_source: SourceKind,
    pub source_header: String,
    pub home_section: String,
}

impl AppState {
    pub fn new(service: StoryService, stories: &common::StoriesConfig) -> Result<Self> {
        let default_source: SourceKind = stories
            .default_source
            .parse()
            .map_err(|e| anyhow!("invalid stories.default_source: {}", e))?;

        Ok(Self {
            started_at: Utc::now(),
            service,
            default_source,
            source_header: stories.source_header.clone(),
            home_section: stories.home_section.clone(),
        })
    }
}

/// Source selected by the request header, falling back to the configured default.
pub struct RequestedSource(pub SourceKind);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestedSource {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = req.rocket().state::<AppState>() else {
            return Outcome::Success(RequestedSource(SourceKind::default()));
        };

        let kind = req
            .headers()
            .get_one(&state.source_header)
            .and_then(|value| value.parse::<SourceKind>().ok())
            .unwrap_or(state.default_source);

        Outcome::Success(RequestedSource(kind))
    }
}

/// Path segment made only of ASCII letters.
pub struct Section(String);

impl<'a> FromParam<'a> for Section {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        if !param.is_empty() && param.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Section(param.to_string()))
        } else {
            Err(param)
        }
    }
}

/// `YYYY-MM-DD` path segment.
pub struct DateParam(NaiveDate);

impl<'a> FromParam<'a> for DateParam {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        NaiveDate::parse_from_str(param, "%Y-%m-%d")
            .map(DateParam)
            .map_err(|_| param)
    }
}

/// Seven alphanumeric characters, the tail of a short link.
pub struct ShortUrl(String);

impl<'a> FromParam<'a> for ShortUrl {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        if param.len() == 7 && param.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(ShortUrl(param.to_string()))
        } else {
            Err(param)
        }
    }
}

/// JSON body whose shape depends on how many items there are.
pub enum Unwrapped<T> {
    One(T),
    Many(Vec<T>),
    /// 200 with an empty body
    Nothing,
}

impl<'r, T: Serialize> Responder<'r, 'static> for Unwrapped<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Unwrapped::One(item) => Json(item).respond_to(req),
            Unwrapped::Many(items) => Json(items).respond_to(req),
            Unwrapped::Nothing => Response::build()
                .status(Status::Ok)
                .header(ContentType::JSON)
                .ok(),
        }
    }
}

fn error_body(status: Status, message: &str) -> serde_json::Value {
    json!({ "message": message, "statusCode": status.code })
}

impl<'r> Responder<'r, 'static> for StoryError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = match &self {
            StoryError::UnsupportedSource(_) => Status::BadRequest,
            StoryError::UpstreamUnavailable(_) => Status::ServiceUnavailable,
            StoryError::UpstreamAuth(_) | StoryError::UpstreamMalformed(_) => Status::BadGateway,
        };
        tracing::error!(%status, error = %self, uri = %req.uri(), "story request failed");

        Response::build_from(Json(error_body(status, &self.to_string())).respond_to(req)?)
            .status(status)
            .ok()
    }
}

const NOT_FOUND_MESSAGE: &str = "The resource you have requested cannot be found.";

type StoryResult<T> = std::result::Result<T, StoryError>;

#[get("/")]
async fn index() -> Json<serde_json::Value> {
    Json(json!({ "message": "Hello world!" }))
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    default_source: String,
    sources: Vec<String>,
}

/// Status endpoint returning uptime and the registered sources.
#[get("/api/v1/status")]
async fn api_status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        default_source: state.default_source.to_string(),
        sources: state
            .service
            .registry()
            .kinds()
            .iter()
            .map(|k| k.to_string())
            .collect(),
    })
}

#[get("/list/<section>/first", rank = 1)]
async fn list_first(
    state: &State<AppState>,
    source: RequestedSource,
    section: Section,
) -> StoryResult<Unwrapped<Article>> {
    let query = StoryQuery::default().top(1);
    let stories = state.service.list_stories(source.0, &section.0, &query).await?;
    Ok(first_or_nothing(stories))
}

#[get("/list/<section>/<date>", rank = 2)]
async fn list_since(
    state: &State<AppState>,
    source: RequestedSource,
    section: Section,
    date: DateParam,
) -> StoryResult<Json<Vec<Article>>> {
    let query = StoryQuery::default().since(date.0);
    let stories = state.service.list_stories(source.0, &section.0, &query).await?;
    Ok(Json(stories))
}

#[get("/list/<section>")]
async fn list_all(
    state: &State<AppState>,
    source: RequestedSource,
    section: Section,
) -> StoryResult<Json<Vec<Article>>> {
    let stories = state
        .service
        .list_stories(source.0, &section.0, &StoryQuery::default())
        .await?;
    Ok(Json(stories))
}

#[get("/article/<short_url>")]
async fn article_by_short_url(
    state: &State<AppState>,
    source: RequestedSource,
    short_url: ShortUrl,
) -> StoryResult<Unwrapped<Article>> {
    let query = StoryQuery::default().top(1).link_ending_with(short_url.0);
    let stories = state
        .service
        .list_stories(source.0, &state.home_section, &query)
        .await?;
    Ok(first_or_nothing(stories))
}

#[get("/group/<section>")]
async fn group_by_date(
    state: &State<AppState>,
    source: RequestedSource,
    section: Section,
) -> StoryResult<Unwrapped<DateBucket>> {
    let mut buckets = state.service.grouped_by_date(source.0, &section.0).await?;
    if buckets.len() == 1 {
        return Ok(Unwrapped::One(buckets.remove(0)));
    }
    Ok(Unwrapped::Many(buckets))
}

fn first_or_nothing<T>(items: Vec<T>) -> Unwrapped<T> {
    match items.into_iter().next() {
        Some(item) => Unwrapped::One(item),
        None => Unwrapped::Nothing,
    }
}

#[catch(404)]
fn not_found() -> Json<serde_json::Value> {
    Json(error_body(Status::NotFound, NOT_FOUND_MESSAGE))
}

/// Path segments that fail their `FromParam` check forward with 422; report them as 404.
fn unmatched_segment<'r>(_: Status, req: &'r Request<'_>) -> catcher::BoxFuture<'r> {
    Box::pin(async move {
        let body = Json(error_body(Status::NotFound, NOT_FOUND_MESSAGE)).respond_to(req)?;
        Response::build_from(body).status(Status::NotFound).ok()
    })
}

#[catch(default)]
fn internal_error(status: Status, req: &Request<'_>) -> Json<serde_json::Value> {
    tracing::error!(%status, uri = %req.uri(), "request failed");
    Json(error_body(status, status.reason().unwrap_or("Internal Server Error")))
}

/// Build the Rocket instance with routes, catchers and request logging, without launching it.
pub fn build_rocket(state: AppState, figment: rocket::figment::Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .attach(AdHoc::on_request("Request logging", |req, _| {
            Box::pin(async move {
                tracing::info!(method = %req.method(), uri = %req.uri(), "request");
            })
        }))
        .attach(AdHoc::on_response("Response logging", |req, res| {
            Box::pin(async move {
                tracing::debug!(uri = %req.uri(), status = %res.status(), "response");
            })
        }))
        .mount(
            "/",
            routes![
                index,
                health,
                api_status,
                list_first,
                list_since,
                list_all,
                article_by_short_url,
                group_by_date,
            ],
        )
        .register("/", catchers![not_found, internal_error])
        .register("/", vec![Catcher::new(422, unmatched_segment)])
}

/// Build sources from config and run the HTTP server until shutdown.
pub async fn launch_rocket(config: &Config) -> Result<()> {
    let registry = SourceRegistry::from_config(config)?;
    tracing::info!(sources = ?registry.kinds(), "source registry ready");

    let state = AppState::new(StoryService::new(registry), &config.stories)?;
    if state.default_source == SourceKind::None {
        tracing::warn!("default source is 'none'; requests without a source header will fail");
    }

    // Apply [server] bind and port on top of Rocket's own defaults.
    let figment = rocket::Config::figment()
        .merge(("address", config.server.bind.clone()))
        .merge(("port", config.server.port));

    tracing::info!(bind = %config.server.bind, port = config.server.port, "Starting Rocket HTTP server");
    build_rocket(state, figment)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
