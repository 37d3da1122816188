use std::io::Write;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use mockito::Matcher;
use payload_auth::hasher::sha1_hex;
use tempfile::NamedTempFile;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_request-with-payload"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run request-with-payload")
}

fn payload_file(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[test]
fn post_prints_response_body() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upload")
        .match_body(Matcher::Exact("{\"alleles\":[]}".to_string()))
        .with_status(200)
        .with_body("OK")
        .expect(1)
        .create();
    let file = payload_file(b"{\"alleles\":[]}");

    let output = run(&[
        format!("{}/upload", server.url()).as_str(),
        file.path().to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "OK\n");
    mock.assert();
}

#[test]
fn post_to_url_without_scheme() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upload")
        .with_status(200)
        .with_body("OK")
        .expect(1)
        .create();
    let file = payload_file(b"x");

    let output = run(&[
        format!("{}/upload", server.host_with_port()).as_str(),
        file.path().to_str().unwrap(),
    ]);

    assert!(output.status.success());
    mock.assert();
}

#[test]
fn post_error_status_exits_non_zero() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/upload")
        .with_status(404)
        .with_body("Not Found")
        .create();
    let file = payload_file(b"x");

    let output = run(&[
        format!("{}/upload", server.url()).as_str(),
        file.path().to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error for POST requests: Not Found"), "{stderr}");
}

#[test]
fn put_sends_signed_url() {
    let mut server = mockito::Server::new();
    let url = format!("{}/alleles?file=x", server.url());
    let identity = sha1_hex("alicesecret");
    let start = now();
    let candidates = (start.saturating_sub(2)..=start + 2)
        .map(|time| {
            let token = sha1_hex(format!("{url}{identity}{time}"));
            Matcher::AllOf(vec![
                Matcher::UrlEncoded("file".into(), "x".into()),
                Matcher::UrlEncoded("gbLogin".into(), "alice".into()),
                Matcher::UrlEncoded("gbTime".into(), time.to_string()),
                Matcher::UrlEncoded("gbToken".into(), token),
            ])
        })
        .collect();
    let mock = server
        .mock("PUT", "/alleles")
        .match_query(Matcher::AnyOf(candidates))
        .match_body(Matcher::Exact("payload".to_string()))
        .with_status(200)
        .with_body("accepted")
        .expect(1)
        .create();
    let file = payload_file(b"payload");

    let output = run(&[url.as_str(), file.path().to_str().unwrap(), "alice", "secret"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "accepted\n");
    mock.assert();
}

#[test]
fn put_with_hyphenated_password() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("PUT", "/alleles")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("file".into(), "x".into()),
            Matcher::UrlEncoded("gbLogin".into(), "alice".into()),
        ]))
        .with_status(200)
        .with_body("accepted")
        .expect(1)
        .create();
    let file = payload_file(b"payload");
    let url = format!("{}/alleles?file=x", server.url());

    let output = run(&[url.as_str(), file.path().to_str().unwrap(), "alice", "-secret"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "accepted\n");
    mock.assert();
}

#[test]
fn wrong_argument_count_prints_usage() {
    let mut server = mockito::Server::new();
    let mock = server.mock("POST", Matcher::Any).expect(0).create();
    let put_mock = server.mock("PUT", Matcher::Any).expect(0).create();
    let file = payload_file(b"x");
    let url = server.url();
    let path = file.path().to_str().unwrap();

    for args in [vec![url.as_str()], vec![url.as_str(), path, "alice"]] {
        let output = run(&args);

        assert_eq!(output.status.code(), Some(1));
        assert_eq!(
            String::from_utf8_lossy(&output.stderr),
            "Incorrect parameters!\n"
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.lines().count(), 3);
        assert!(stdout.starts_with("This program sends POST or PUT request"));
    }

    mock.assert();
    put_mock.assert();
}

#[test]
fn missing_file_exits_non_zero() {
    let output = run(&["127.0.0.1:1/upload", "/nonexistent/payload.json"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unable to read payload file"));
}
