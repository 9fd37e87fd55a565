//! Minimal HTTP/1.1 server that answers every GET with one fixed JSON body.
//!
//! Records each request line so tests can assert on the lookup query.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

pub struct RoomInfoServer {
    /// Endpoint URL to put in `LookupSettings::endpoint`.
    pub endpoint: String,
    pub requests: Arc<Mutex<Vec<String>>>,
}

/// Starts a server in a background thread answering with `status` and `body`.
/// The server runs until the process exits.
pub fn start(status: u16, body: &str) -> RoomInfoServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body.to_string());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let seen = Arc::clone(&seen);
            thread::spawn(move || handle(stream, status, &body, &seen));
        }
    });
    RoomInfoServer {
        endpoint: format!("http://127.0.0.1:{}/webcast/room/info/", port),
        requests,
    }
}

fn handle(mut stream: std::net::TcpStream, status: u16, body: &str, seen: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    if let Some(line) = request.lines().next() {
        seen.lock().unwrap().push(line.to_string());
    }
    let reason = if status == 200 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}
