use crate::generator::profile::ScenarioConfig;
use crate::upstream::client::HistoryClient;
use crate::workflow::runner::Runner;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use skywatchcore::feed_interface::{CameraFeed, DetectionEvent, Numeric};
use skywatchcore::{Coordinate, CoreError};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

#[derive(Debug)]
struct BridgeError(String);

impl warp::reject::Reject for BridgeError {}

fn reject(message: impl Into<String>) -> Rejection {
    warp::reject::custom(BridgeError(message.into()))
}

fn reply(status: StatusCode, body: Value) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn ok() -> WithStatus<Json> {
    reply(StatusCode::OK, json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct RadiusRequest {
    radius_m: Numeric,
}

#[derive(Debug, Deserialize)]
struct ZoomRequest {
    zoom: f64,
}

#[derive(Debug, Deserialize)]
struct SelectRequest {
    obj_id: Option<String>,
}

/// State shared by every route.
#[derive(Clone)]
pub struct BridgeState {
    runner: Runner,
    upstream: Option<Arc<HistoryClient>>,
}

impl BridgeState {
    pub fn new(runner: Runner, upstream: Option<Arc<HistoryClient>>) -> Self {
        Self { runner, upstream }
    }
}

fn with_state(state: BridgeState) -> impl Filter<Extract = (BridgeState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn camera_from_path(camera: &str) -> Result<CameraFeed, Rejection> {
    camera
        .parse::<CameraFeed>()
        .map_err(|err| reject(err.to_string()))
}

async fn get_snapshot(state: BridgeState) -> Result<Json, Rejection> {
    Ok(warp::reply::json(&state.runner.view()))
}

async fn ingest_live(event: DetectionEvent, state: BridgeState) -> Result<WithStatus<Json>, Rejection> {
    state.runner.ingest_live(event);
    Ok(ok())
}

async fn ingest_history(
    camera: String,
    events: Vec<DetectionEvent>,
    state: BridgeState,
) -> Result<WithStatus<Json>, Rejection> {
    let feed = camera_from_path(&camera)?;
    let count = events.len();
    state.runner.ingest_history(feed, events);
    Ok(reply(StatusCode::OK, json!({"status": "ok", "events": count})))
}

async fn clear_history(camera: String, state: BridgeState) -> Result<WithStatus<Json>, Rejection> {
    let feed = camera_from_path(&camera)?;
    if let Some(client) = state.upstream.as_ref() {
        if let Err(err) = client.clear_history(state.runner.camera_id(feed)).await {
            state.runner.metrics().record_transport_error();
            let message = format!("{:#}", err);
            warn!("clear history for {} failed: {}", feed, message);
            state.runner.report_status(message.clone());
            return Ok(reply(
                StatusCode::BAD_GATEWAY,
                json!({"status": "error", "message": message}),
            ));
        }
    }
    let removed = state.runner.clear_local(feed);
    state.runner.report_status(format!("History cleared for {}", feed));
    Ok(reply(StatusCode::OK, json!({"status": "ok", "removed": removed})))
}

async fn set_defended_point(
    point: Option<Coordinate>,
    state: BridgeState,
) -> Result<WithStatus<Json>, Rejection> {
    state
        .runner
        .with_controller(|ctl| ctl.set_defended_point(point));
    Ok(ok())
}

async fn set_radius(request: RadiusRequest, state: BridgeState) -> Result<WithStatus<Json>, Rejection> {
    let result = state.runner.with_controller(|ctl| match &request.radius_m {
        Numeric::Number(value) => ctl.set_radius(*value),
        Numeric::Text(text) => ctl.set_radius_input(text),
        Numeric::Other(value) => Err(CoreError::InvalidRadius(value.to_string())),
    });
    match result {
        Ok(()) => Ok(ok()),
        Err(err) => {
            let radius_m = state.runner.with_controller(|ctl| ctl.radius_m());
            Ok(reply(
                StatusCode::BAD_REQUEST,
                json!({"status": "error", "message": err.to_string(), "radius_m": radius_m}),
            ))
        }
    }
}

async fn set_zoom(request: ZoomRequest, state: BridgeState) -> Result<WithStatus<Json>, Rejection> {
    state
        .runner
        .with_controller(|ctl| ctl.set_zoom(request.zoom))
        .map_err(|err| reject(err.to_string()))?;
    Ok(ok())
}

async fn select(request: SelectRequest, state: BridgeState) -> Result<WithStatus<Json>, Rejection> {
    state.runner.with_controller(|ctl| ctl.select(request.obj_id));
    Ok(ok())
}

async fn ingest_scenario(
    config: ScenarioConfig,
    state: BridgeState,
) -> Result<WithStatus<Json>, Rejection> {
    let result = state
        .runner
        .execute(&config)
        .map_err(|err| reject(format!("{:#}", err)))?;
    if let Some(description) = config.description.as_ref() {
        info!(
            "scenario {} -> {} objects, {} intruders",
            description,
            result.object_count,
            result.intruders.len()
        );
    }
    Ok(reply(
        StatusCode::OK,
        json!({
            "status": "ok",
            "events": result.event_count,
            "objects": result.object_count,
            "intruders": result.intruders.len(),
            "description": config.description.clone().unwrap_or_default()
        }),
    ))
}

/// All bridge routes, without rejection recovery.
pub fn routes(state: BridgeState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let snapshot = warp::path("snapshot")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_snapshot);

    let ingest = warp::path("ingest")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(ingest_live);

    let history_post = warp::path!("history" / String)
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(ingest_history);

    let history_delete = warp::path!("history" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and_then(clear_history);

    let defended_point = warp::path("defended-point")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(set_defended_point);

    let radius = warp::path("radius")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(set_radius);

    let zoom = warp::path("zoom")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(set_zoom);

    let selection = warp::path("select")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(select);

    let scenario = warp::path("ingest-scenario")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(ingest_scenario);

    snapshot
        .or(ingest)
        .or(history_post)
        .or(history_delete)
        .or(defended_point)
        .or(radius)
        .or(zoom)
        .or(selection)
        .or(scenario)
}

/// Turns rejections into JSON error bodies.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(BridgeError(message)) = err.find::<BridgeError>() {
        (StatusCode::BAD_REQUEST, message.clone())
    } else if let Some(body) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, body.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        warn!("unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };
    Ok(reply(status, json!({"status": "error", "message": message})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::MonitorConfig;
    use skywatchcore::math::EARTH_RADIUS_M;

    const DEFENDED: Coordinate = Coordinate {
        lat: 14.297567,
        lng: 101.166279,
    };

    fn state() -> BridgeState {
        let cfg = MonitorConfig::from_args(Some(DEFENDED), 1500.0, 16.0, None);
        BridgeState::new(Runner::new(&cfg).unwrap(), None)
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn live_ingest_shows_up_in_snapshot() {
        let state = state();
        let api = routes(state.clone()).recover(handle_rejection);
        let lat = DEFENDED.lat + (999.8 / EARTH_RADIUS_M).to_degrees();

        let response = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&json!({
                "id": "evt-1",
                "cam_id": "defensive",
                "timestamp": "2024-05-01T10:00:00Z",
                "objects": [{"obj_id": "obj_001", "type": "drone",
                             "lat": lat, "lng": DEFENDED.lng, "speed": 10}]
            }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = warp::test::request()
            .method("GET")
            .path("/snapshot")
            .reply(&api)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["objects"].as_array().unwrap().len(), 1);
        assert_eq!(body["intruders"][0]["distance"], "1000 m");
        assert_eq!(body["intruders"][0]["eta"], "1m 40s");
        assert_eq!(body["ring"].as_array().unwrap().len(), 65);
    }

    #[tokio::test]
    async fn invalid_radius_is_rejected_and_kept() {
        let api = routes(state()).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/radius")
            .json(&json!({"radius_m": "-20"}))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response.body())["radius_m"], 1500.0);

        let response = warp::test::request()
            .method("POST")
            .path("/radius")
            .json(&json!({"radius_m": 900}))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn history_routes_use_camera_path() {
        let api = routes(state()).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/history/offensive")
            .json(&json!([
                {"id": "h1", "cam_id": "offensive", "timestamp": "2024-05-01T10:00:00Z",
                 "objects": [{"obj_id": "a", "lat": 14.3, "lng": 101.2}]}
            ]))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = warp::test::request()
            .method("DELETE")
            .path("/history/offensive")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response.body())["removed"], 1);

        let response = warp::test::request()
            .method("DELETE")
            .path("/history/rear")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn scenario_route_populates_registry() {
        let state = state();
        let api = routes(state.clone()).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/ingest-scenario")
            .json(&json!({"drones": 3, "frames": 2, "seed": 7, "description": "smoke"}))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response.body())["objects"], 3);
        assert_eq!(state.runner.view().objects.len(), 3);
    }

    #[tokio::test]
    async fn scenario_route_rejects_out_of_range_interval() {
        let state = state();
        let api = routes(state.clone()).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/ingest-scenario")
            .json(&json!({"frames": 3, "interval_s": i64::MAX / 2 + 1}))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response.body())["status"], "error");
        assert_eq!(state.runner.view().objects.len(), 0);
    }
}
