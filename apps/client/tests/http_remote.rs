//! Wire behaviour of the HTTP remote against a mock server.

use mockito::{Matcher, Server};
use pretty_assertions::assert_eq;
use serde_json::json;
use wordquiz_client::remote::{HttpRemote, RemoteApi, RemoteError};
use wordquiz_core::types::{
    MemorizedToggle, QuizMode, QuizProgressRecord, QuizResultRecord, DEFAULT_FOLDER_COLOR,
};

#[tokio::test]
async fn toggle_sends_bearer_and_idempotency_key() {
    let mut server = Server::new_async().await;
    let toggle = MemorizedToggle::new("w1", true);
    let mock = server
        .mock("POST", "/api/words/w1/memorized")
        .match_header("authorization", "Bearer secret")
        .match_header("idempotency-key", toggle.request_id.to_string().as_str())
        .match_body(Matcher::Json(json!({ "memorized": true })))
        .with_status(204)
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), Some("secret".into())).unwrap();
    remote.toggle_memorized(&toggle).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn word_id_is_sent_as_a_single_path_segment() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/words/a%2Fb%3Fc%23d/memorized")
        .with_status(204)
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), None).unwrap();
    remote
        .toggle_memorized(&MemorizedToggle::new("a/b?c#d", true))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn toggle_for_missing_word_is_stale() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/words/gone/memorized")
        .with_status(404)
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), None).unwrap();
    let err = remote
        .toggle_memorized(&MemorizedToggle::new("gone", false))
        .await
        .unwrap_err();
    assert!(err.is_stale());
}

#[tokio::test]
async fn server_errors_keep_status_and_body() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/quiz/results")
        .with_status(500)
        .with_body("database down")
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), None).unwrap();
    let err = remote
        .save_quiz_result(&QuizResultRecord::new(4, 3, 1, QuizMode::Normal))
        .await
        .unwrap_err();
    match err {
        RemoteError::Backend { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database down");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_maps_to_not_authenticated() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/api/quiz/progress")
        .with_status(401)
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), Some("expired".into())).unwrap();
    let err = remote
        .save_quiz_progress(&QuizProgressRecord::new(2, 1, 1, QuizMode::Reverse))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::NotAuthenticated));
}

#[tokio::test]
async fn quiz_records_are_sent_as_camel_case_json() {
    let mut server = Server::new_async().await;
    let result = QuizResultRecord::new(4, 3, 1, QuizMode::MultipleChoice);
    let mock = server
        .mock("POST", "/api/quiz/results")
        .match_header("idempotency-key", result.request_id.to_string().as_str())
        .match_body(Matcher::PartialJson(json!({
            "totalWords": 4,
            "correctCount": 3,
            "wrongCount": 1,
            "quizMode": "multipleChoice",
        })))
        .with_status(201)
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), None).unwrap();
    remote.save_quiz_result(&result).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn clearing_a_missing_session_succeeds() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/api/quiz/session")
        .with_status(404)
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), None).unwrap();
    remote.clear_quiz_session().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn snapshot_is_decoded_with_folder_color_default() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/offline/snapshot")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "words": [{
                    "id": "w1",
                    "word": "apple",
                    "meaning": "사과",
                    "memorized": false,
                    "level": 2,
                    "nextReviewAt": "2026-04-01T00:00:00.000Z",
                    "folderId": "f1"
                }],
                "folders": [{ "id": "f1", "name": "Fruit", "sortOrder": 0 }],
                "stats": { "totalWords": 1, "memorizedCount": 0 }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let remote = HttpRemote::new(&format!("{}/", server.url()), None).unwrap();
    let snapshot = remote.get_offline_snapshot().await.unwrap();

    assert_eq!(snapshot.words[0].level, 2);
    assert_eq!(snapshot.words[0].folder_id.as_deref(), Some("f1"));
    assert_eq!(snapshot.folders[0].color, DEFAULT_FOLDER_COLOR);
    assert_eq!(snapshot.stats.total_words, 1);
}

#[tokio::test]
async fn malformed_snapshot_is_a_parse_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/offline/snapshot")
        .with_status(200)
        .with_body("{\"words\": 12}")
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), None).unwrap();
    let err = remote.get_offline_snapshot().await.unwrap_err();
    assert!(matches!(err, RemoteError::Parse(_)));
}

#[tokio::test]
async fn health_check_reports_reachability() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(200)
        .with_body("OK")
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), None).unwrap();
    assert!(remote.check_connectivity().await);

    let unreachable = HttpRemote::new("http://127.0.0.1:1", None).unwrap();
    assert!(!unreachable.check_connectivity().await);
}
