//! `nimbuskv-cli`: a minimal line-oriented test client. Reads queries
//! from stdin, frames each one, and prints the framed response.

use nimbuskv::codec;
use std::io::{self, BufRead, Write};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() {
    let address = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:6123".to_string());
    let mut stream = match TcpStream::connect(&address).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to connect to {address}: {e}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = codec::write_frame(&mut stream, line.as_bytes()).await {
            eprintln!("write error: {e}");
            break;
        }
        match codec::read_frame(&mut stream, 4 * 1024 * 1024).await {
            Ok(response) => {
                let _ = stdout.write_all(&response);
                let _ = stdout.write_all(b"\n");
                let _ = stdout.flush();
            }
            Err(e) => {
                eprintln!("read error: {e}");
                break;
            }
        }
    }
}
