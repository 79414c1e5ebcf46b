use std::time::Duration;

use canonical_core::{normalize_url, FetchFailure, NormalizedUrl};
use canonical_engine::{BlockingFetcher, BlockingReqwestFetcher, FetchSettings, Fetcher, ReqwestFetcher};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(server: &MockServer, route: &str) -> NormalizedUrl {
    normalize_url(&format!("{}{}", server.uri(), route)).expect("mock server url is valid")
}

#[tokio::test]
async fn fetcher_returns_html_with_header_charset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html>ok</html>", "text/html; charset=ISO-8859-1"),
        )
        .mount(&server)
        .await;

    let target = url(&server, "/doc");
    let outcome = ReqwestFetcher::default().fetch(&target).await;

    assert_eq!(outcome.failure, None);
    assert_eq!(outcome.body.as_deref(), Some(&b"<html>ok</html>"[..]));
    assert_eq!(outcome.declared_charset.as_deref(), Some("iso-8859-1"));
    assert_eq!(outcome.final_url, Some(target));
}

#[tokio::test]
async fn fetcher_reports_post_redirect_address() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/short"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/landing", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let outcome = ReqwestFetcher::default().fetch(&url(&server, "/short")).await;

    assert_eq!(outcome.failure, None);
    assert_eq!(outcome.final_url, Some(url(&server, "/landing")));
}

#[tokio::test]
async fn cookies_survive_the_redirect_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Set-Cookie", "session=abc; Path=/")
                .insert_header("Location", format!("{}/members", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/members"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>in</html>", "text/html"))
        .mount(&server)
        .await;

    let outcome = ReqwestFetcher::default().fetch(&url(&server, "/login")).await;

    assert_eq!(outcome.failure, None);
    assert_eq!(outcome.body.as_deref(), Some(&b"<html>in</html>"[..]));
}

#[tokio::test]
async fn redirect_loop_is_a_download_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/loop", server.uri())),
        )
        .mount(&server)
        .await;

    let outcome = ReqwestFetcher::default().fetch(&url(&server, "/loop")).await;

    assert_eq!(outcome.failure, Some(FetchFailure::Download));
    assert_eq!(outcome.body, None);
}

/// `/hop/0` redirects to `/hop/1` and so on up to `/hop/{last}`, which serves a page.
async fn redirect_chain(server: &MockServer, last: usize) {
    for hop in 0..last {
        Mock::given(method("GET"))
            .and(path(format!("/hop/{hop}")))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/hop/{}", server.uri(), hop + 1)),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(format!("/hop/{last}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>end</html>", "text/html"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn redirect_limit_counts_hops() {
    let server = MockServer::start().await;
    redirect_chain(&server, 4).await;
    let fetcher = ReqwestFetcher::new(FetchSettings {
        redirect_limit: 3,
        ..FetchSettings::default()
    });

    let within = fetcher.fetch(&url(&server, "/hop/1")).await;
    let beyond = fetcher.fetch(&url(&server, "/hop/0")).await;

    assert_eq!(within.failure, None);
    assert_eq!(within.final_url, Some(url(&server, "/hop/4")));
    assert_eq!(beyond.failure, Some(FetchFailure::Download));
    assert_eq!(beyond.final_url, None);
}

#[tokio::test]
async fn single_hop_is_followed_with_a_limit_of_one() {
    let server = MockServer::start().await;
    redirect_chain(&server, 1).await;
    let fetcher = ReqwestFetcher::new(FetchSettings {
        redirect_limit: 1,
        ..FetchSettings::default()
    });

    let outcome = fetcher.fetch(&url(&server, "/hop/0")).await;

    assert_eq!(outcome.failure, None);
    assert_eq!(outcome.final_url, Some(url(&server, "/hop/1")));
}

#[tokio::test]
async fn default_limit_follows_ten_redirects() {
    let server = MockServer::start().await;
    redirect_chain(&server, 11).await;

    let ten = ReqwestFetcher::default().fetch(&url(&server, "/hop/1")).await;
    let eleven = ReqwestFetcher::default().fetch(&url(&server, "/hop/0")).await;

    assert_eq!(ten.failure, None);
    assert_eq!(eleven.failure, Some(FetchFailure::Download));
}

#[tokio::test]
async fn timeout_after_redirect_keeps_the_redirect_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/short"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/stalled", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stalled"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html></html>", "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        request_timeout: Duration::from_millis(300),
        ..FetchSettings::default()
    });
    let outcome = fetcher.fetch(&url(&server, "/short")).await;

    assert_eq!(outcome.failure, Some(FetchFailure::Timeout));
    assert_eq!(outcome.final_url, Some(url(&server, "/stalled")));
    assert_eq!(outcome.body, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_transport_failure_after_redirect_keeps_the_redirect_target() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let dead_end = format!("http://{}/gone", closed.local_addr().expect("local addr"));
    drop(closed);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/short"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", dead_end.as_str()))
        .mount(&server)
        .await;

    let short = url(&server, "/short");
    let outcome = tokio::task::spawn_blocking(move || BlockingReqwestFetcher::default().fetch(&short))
        .await
        .expect("blocking fetch task");

    assert_eq!(outcome.failure, Some(FetchFailure::Download));
    assert_eq!(outcome.final_url, normalize_url(&dead_end));
}

#[tokio::test]
async fn http_status_failure_keeps_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let target = url(&server, "/missing");
    let outcome = ReqwestFetcher::default().fetch(&target).await;

    assert_eq!(outcome.failure, Some(FetchFailure::HttpStatus(404)));
    assert_eq!(outcome.final_url, Some(target));
    assert_eq!(outcome.body, None);
}

#[tokio::test]
async fn non_html_is_rejected_before_reading_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/paper.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .mount(&server)
        .await;

    let target = url(&server, "/paper.pdf");
    let outcome = ReqwestFetcher::default().fetch(&target).await;

    assert_eq!(outcome.failure, Some(FetchFailure::ContentType));
    assert_eq!(outcome.final_url, Some(target));
    assert_eq!(outcome.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(outcome.body, None);
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html></html>", "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        request_timeout: Duration::from_millis(200),
        ..FetchSettings::default()
    });
    let outcome = fetcher.fetch(&url(&server, "/slow")).await;

    assert_eq!(outcome.failure, Some(FetchFailure::Timeout));
}

#[tokio::test]
async fn oversized_body_is_truncated() {
    let server = MockServer::start().await;
    let page = format!("<html>{}</html>", "x".repeat(500));
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page.clone(), "text/html"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        max_bytes: 64,
        ..FetchSettings::default()
    });
    let outcome = fetcher.fetch(&url(&server, "/big")).await;

    assert_eq!(outcome.failure, None);
    assert_eq!(outcome.body.as_deref(), Some(&page.as_bytes()[..64]));
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_fetcher_matches_async_behaviour() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let ok = url(&server, "/doc");
    let gone = url(&server, "/gone");
    let (ok_outcome, gone_outcome) = tokio::task::spawn_blocking(move || {
        let fetcher = BlockingReqwestFetcher::new(FetchSettings {
            max_bytes: 6,
            ..FetchSettings::default()
        });
        (fetcher.fetch(&ok), fetcher.fetch(&gone))
    })
    .await
    .expect("blocking fetch task");

    assert_eq!(ok_outcome.failure, None);
    assert_eq!(ok_outcome.body.as_deref(), Some(&b"<html>"[..]));
    assert_eq!(gone_outcome.failure, Some(FetchFailure::HttpStatus(410)));
}
