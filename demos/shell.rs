//! Example Shell
//!
//! Installs a device on an in-process host and drives it interactively.
//! Set `RUST_LOG=chardev=debug` to see every operation.

use chardev::{CharDevice, DeviceConfig, MemoryHost, Registration, Session};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chardev-shell")]
#[command(about = "Interactive shell over a shared character device", long_about = None)]
struct Cli {
    /// Device name
    #[arg(short, long, default_value = "chardev")]
    name: String,

    /// Device class
    #[arg(long, default_value = "char")]
    class: String,

    /// Buffer capacity in bytes
    #[arg(short, long, default_value = "1024")]
    capacity: usize,

    /// Run a single command and exit
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn print_help() {
    println!("Commands:");
    println!("  write <text>  - Append text to the device");
    println!("  read <n>      - Drain up to n bytes");
    println!("  peek          - Show pending bytes without draining");
    println!("  open          - Open another session");
    println!("  close         - Close the most recent session");
    println!("  stat          - Show buffer state");
    println!("  exit          - Exit this shell");
    println!("  help          - Show this help");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = DeviceConfig {
        name: cli.name,
        class: cli.class,
        capacity: cli.capacity,
    };

    let device = match CharDevice::new(config) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            eprintln!("[Shell] Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let host = MemoryHost::new();
    let registration = match Registration::install(&host, Arc::clone(&device)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[Shell] Failed to install device: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "[Shell] Device '{}' installed as {} ({} bytes)",
        device.name(),
        registration.number(),
        device.capacity()
    );

    let mut sessions = vec![device.open()];

    if !cli.command.is_empty() {
        execute_command(&device, &mut sessions, &cli.command.join(" "));
        return;
    }

    println!("[Shell] Type 'help' for available commands");
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!(">>> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" {
            println!("[Shell] Goodbye!");
            break;
        }

        execute_command(&device, &mut sessions, input);
    }

    drop(sessions);
    if let Err(e) = registration.uninstall() {
        eprintln!("[Shell] Teardown incomplete: {}", e);
    }
}

fn execute_command<'a>(device: &'a CharDevice, sessions: &mut Vec<Session<'a>>, input: &str) {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).copied().unwrap_or("");

    match cmd {
        "help" => print_help(),

        "write" => {
            let Some(session) = sessions.last() else {
                println!("[Shell] No open session");
                return;
            };
            match session.write(arg.as_bytes()) {
                Ok(out) if out.is_truncated() => println!(
                    "[Shell] Wrote {} of {} bytes ({} dropped)",
                    out.accepted,
                    out.requested,
                    out.dropped()
                ),
                Ok(out) => println!("[Shell] Wrote {} bytes", out.accepted),
                Err(e) => println!("[Shell] Write failed: {}", e),
            }
        }

        "read" => {
            let Some(session) = sessions.last() else {
                println!("[Shell] No open session");
                return;
            };
            let n: usize = arg.parse().unwrap_or(device.capacity());
            match session.read_to_vec(n) {
                Ok(data) if data.is_empty() => println!("[Shell] No data available"),
                Ok(data) => println!(
                    "[Shell] Data ({} bytes): {}",
                    data.len(),
                    String::from_utf8_lossy(&data)
                ),
                Err(e) => println!("[Shell] Read failed: {}", e),
            }
        }

        "peek" => {
            let data = device.pending();
            println!("[Shell] Pending ({} bytes): {}", data.len(), String::from_utf8_lossy(&data));
        }

        "open" => {
            let session = device.open();
            println!("[Shell] Session {} opened", session.id());
            sessions.push(session);
        }

        "close" => match sessions.pop() {
            Some(mut session) => {
                let _ = session.close();
                println!("[Shell] Session {} closed", session.id());
            }
            None => println!("[Shell] No open session"),
        },

        "stat" => {
            println!(
                "[Shell] {:?}: {}/{} bytes, {} opens, {} live sessions",
                device.state(),
                device.len(),
                device.capacity(),
                device.open_count(),
                sessions.len()
            );
        }

        other => println!("[Shell] Unknown command: {}", other),
    }
}
