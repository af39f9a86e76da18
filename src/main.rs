use std::process::ExitCode;
use std::time::Duration;

use totp_dash::{Countdown, SystemClock};

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let secret = match args.next() {
        Some(secret) => secret,
        None => {
            eprintln!("usage: totp-dash <BASE32 SECRET> [--once]");
            return ExitCode::FAILURE;
        }
    };
    let once = args.any(|arg| arg == "--once");

    for tick in Countdown::new(secret, SystemClock) {
        if !tick.result.valid {
            eprintln!("secret is not valid base32, no token available");
            return ExitCode::FAILURE;
        }
        if tick.rotated {
            println!("-- new code --");
        }
        println!(
            "code {}\t ttl {}",
            tick.result.token, tick.result.remaining_seconds
        );
        if once {
            break;
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    ExitCode::SUCCESS
}
