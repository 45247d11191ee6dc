#![allow(dead_code)]

use std::time::Duration;

use fpl_core::FplClient;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn client(server: &MockServer) -> FplClient {
    FplClient::new(&server.uri(), Duration::from_secs(2)).expect("client")
}

pub fn element(id: u32, news: &str, added: Option<&str>, chance: Option<u8>) -> Value {
    json!({
        "id": id,
        "web_name": format!("Player{id}"),
        "team": 1 + id % 2,
        "element_type": 3,
        "status": if news.is_empty() { "a" } else { "d" },
        "news": news,
        "news_added": added,
        "chance_of_playing_next_round": chance,
        "chance_of_playing_this_round": chance,
    })
}

pub fn catalog(elements: Vec<Value>) -> Value {
    json!({
        "events": [{"id": 5, "name": "Gameweek 5", "is_current": true, "is_next": false}],
        "teams": [
            {"id": 1, "name": "Arsenal", "short_name": "ARS"},
            {"id": 2, "name": "Chelsea", "short_name": "CHE"}
        ],
        "element_types": [{"id": 3, "singular_name_short": "MID", "plural_name_short": "MID"}],
        "elements": elements,
    })
}

/// Catalog of `count` athletes with no news.
pub fn quiet_catalog(count: u32) -> Value {
    catalog((1..=count).map(|id| element(id, "", None, None)).collect())
}

pub fn picks(picks: &[(u32, u8, i32, bool)], transfer_cost: i32) -> Value {
    let picks: Vec<Value> = picks
        .iter()
        .map(|&(element, position, multiplier, is_captain)| {
            json!({
                "element": element,
                "position": position,
                "multiplier": multiplier,
                "is_captain": is_captain,
                "is_vice_captain": false,
            })
        })
        .collect();
    json!({
        "active_chip": null,
        "entry_history": {"event": 5, "points": 0, "event_transfers_cost": transfer_cost},
        "picks": picks,
    })
}

pub fn live(points: &[(u32, i32)]) -> Value {
    let elements: Vec<Value> = points
        .iter()
        .map(|&(id, total_points)| json!({"id": id, "stats": {"minutes": 90, "total_points": total_points}}))
        .collect();
    json!({ "elements": elements })
}

pub fn fixtures() -> Value {
    json!([
        {"id": 50, "event": 5, "team_h": 1, "team_a": 2, "team_h_score": 1, "team_a_score": 1,
         "kickoff_time": "2024-09-21T14:00:00Z", "started": true, "finished": false, "minutes": 60}
    ])
}

pub async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_catalog(server: &MockServer, body: Value) {
    mount_json(server, "/bootstrap-static/", body).await;
}

pub async fn mount_fixtures(server: &MockServer, round: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path("/fixtures/"))
        .and(query_param("event", round.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}
