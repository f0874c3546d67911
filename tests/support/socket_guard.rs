//! Skips wiremock-backed tests when the sandbox cannot bind a localhost socket.
//!
//! Set `URL_RELAY_REQUIRE_SOCKET_TESTS=1` to turn a skip into a failure.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_SOCKET_TESTS_ENV: &str = "URL_RELAY_REQUIRE_SOCKET_TESTS";

fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_SOCKET_TESTS_ENV)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` when sockets are unavailable.
#[track_caller]
#[allow(dead_code)]
pub fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
    let location = Location::caller();
    let bindable = TcpListener::bind("127.0.0.1:0").is_ok();
    async move {
        if bindable {
            return Some(MockServer::start().await);
        }
        let message = format!(
            "[socket-bound-test] cannot bind localhost socket at {}:{}",
            location.file(),
            location.line()
        );
        assert!(
            !socket_tests_required(),
            "{message}. Unset {REQUIRE_SOCKET_TESTS_ENV} to allow skipping."
        );
        eprintln!("{message}. Skipping test.");
        None
    }
}
