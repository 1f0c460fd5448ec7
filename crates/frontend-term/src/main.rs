//! MSP430 emulator frontend v0.2.0.
//!
//! Provides two execution modes:
//!
//! - **Network mode** (default): a worker thread accepts a firmware
//!   upload over TCP, then bridges the same connection to the debugger
//!   console. Requires `-p PORT`.
//! - **Console mode** (`-m console`): interactive debugger on the local
//!   terminal, optionally loading a firmware image named on the command
//!   line (raw binary or Intel HEX).
//!
//! In both modes the main loop alternates between debug mode (read and
//! dispatch one command line) and run mode (step the processor once per
//! iteration) until a quit command is issued. All emulator state lives
//! on this thread; the network worker communicates through the
//! `ServerEvent` channel and the stop token only.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::sync::mpsc;
use std::thread::JoinHandle;

use msp430_core::debugger::InterfaceKind;
use msp430_core::firmware::{self, DEFAULT_LOAD_ADDR};
use msp430_core::upload_server::{self, ServerEvent};
use msp430_core::Emulator;

const PROGRAM_NAME: &str = "msp430-emu";

enum Mode {
    Console,
    Network,
}

struct Config {
    mode: Mode,
    port: Option<u16>,
    image: Option<String>,
    debug: bool,
}

/// Network server context: the bound port and a handle to the worker
/// thread. Opaque to the emulator core.
struct ServerContext {
    port: u16,
    handle: JoinHandle<()>,
}

fn print_version() {
    println!("{} version {}", PROGRAM_NAME, env!("CARGO_PKG_VERSION"));
}

fn print_usage() {
    print_version();
    println!("The following options are supported:");
    println!("  -v              Print program version");
    println!("  -h              Print this help");
    println!("  -m net|console  Set mode to upload server (default) or local terminal");
    println!("  -p PORT         Upload server port (required in net mode)");
    println!("  --debug         Enable stderr diagnostics");
    println!("  [IMAGE]         Firmware image to load in console mode");
}

fn parse_args(args: &[String]) -> Option<Config> {
    let mut cfg = Config {
        mode: Mode::Network,
        port: None,
        image: None,
        debug: false,
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-m" => {
                i += 1;
                match args.get(i).map(|s| s.as_str()) {
                    Some("net") | Some("web") => cfg.mode = Mode::Network,
                    Some("console") | Some("cli") => cfg.mode = Mode::Console,
                    _ => {
                        eprintln!("Invalid mode (expected net or console)");
                        return None;
                    }
                }
            }
            "-p" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse().ok()) {
                    Some(p) => cfg.port = Some(p),
                    None => {
                        eprintln!("Invalid port argument");
                        return None;
                    }
                }
            }
            "--debug" => cfg.debug = true,
            s if s.starts_with('-') => {
                eprintln!("Unknown option: {}", s);
                return None;
            }
            s => cfg.image = Some(s.to_string()),
        }
        i += 1;
    }
    if matches!(cfg.mode, Mode::Network) && cfg.port.is_none() {
        eprintln!("Need port argument");
        return None;
    }
    Some(cfg)
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let Some(cfg) = parse_args(&args) else {
        print_usage();
        process::exit(1);
    };

    match cfg.mode {
        Mode::Network => run_network(&cfg),
        Mode::Console => run_console(&cfg),
    }
}

// ─── Network Mode ───────────────────────────────────────────────────────────

fn run_network(cfg: &Config) {
    let mut emu = Emulator::new(InterfaceKind::Network);
    emu.debug = cfg.debug;

    let (tx, rx) = mpsc::channel();
    let port = cfg.port.expect("port checked during argument parsing");
    let server = match upload_server::spawn(port, tx, emu.stop.clone()) {
        Ok((bound, handle)) => ServerContext {
            port: bound,
            handle,
        },
        Err(e) => {
            eprintln!("Error starting upload server on port {}: {}", port, e);
            process::exit(1);
        }
    };
    if emu.debug {
        eprintln!("Upload server thread started on port {}", server.port);
    }

    // Readiness before anything else: a client must be connected
    match rx.recv() {
        Ok(ServerEvent::Ready(console)) => emu.set_console(Box::new(console)),
        _ => {
            eprintln!("Upload server terminated before a client connected");
            process::exit(1);
        }
    }
    emu.print_console(" [MSP430 Emulator]\n");
    emu.print_console(" [!] Upload your firmware image; type 'h' for debugger options.\n\n");

    // Upload before proceeding: the emulator never runs without firmware
    loop {
        match rx.recv() {
            Ok(ServerEvent::Firmware { image, load_addr }) => {
                match firmware::load_image(&mut emu.mem, &image, load_addr) {
                    Ok(n) => {
                        if emu.debug {
                            eprintln!("Loaded {} bytes at 0x{:04X}", n, load_addr);
                        }
                    }
                    Err(e) => {
                        emu.print_console(&format!("\t[Firmware load failed: {}]\n", e));
                    }
                }
                break;
            }
            Ok(ServerEvent::Ready(_)) | Ok(ServerEvent::Command(_)) => continue,
            Ok(ServerEvent::Closed) | Err(_) => {
                eprintln!("Client disconnected before uploading firmware");
                process::exit(1);
            }
        }
    }

    emu.reset_to_vector();
    emu.render_state();

    // Fetch-decode-execute cycle (run machine)
    while !emu.debugger.quit {
        if emu.debugger.debug_mode {
            match rx.recv() {
                Ok(ServerEvent::Command(line)) => emu.exec_command(&line),
                Ok(ServerEvent::Closed) | Err(_) => break,
                Ok(_) => {}
            }
        } else {
            emu.process_iteration();
        }
    }

    // The worker may still be blocked on the socket; it dies with the
    // process rather than being joined
    drop(server.handle);
}

// ─── Console Mode ───────────────────────────────────────────────────────────

fn run_console(cfg: &Config) {
    let mut emu = Emulator::new(InterfaceKind::Console);
    emu.debug = cfg.debug;

    if let Some(path) = &cfg.image {
        match firmware::load_file(&mut emu.mem, Path::new(path), DEFAULT_LOAD_ADDR) {
            Ok(n) => {
                if cfg.debug {
                    eprintln!("Loaded {} bytes from {}", n, path);
                }
            }
            Err(e) => {
                eprintln!("{}: {}", path, e);
                process::exit(1);
            }
        }
    }

    println!(" [MSP430 Emulator]");
    println!(" Type 'h' for debugger options.\n");
    emu.reset_to_vector();
    emu.render_state();

    let stdin = io::stdin();
    while !emu.debugger.quit {
        if emu.debugger.debug_mode {
            print!("(dbg) ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break, // EOF ends the session
                Ok(_) => emu.exec_command(&line),
            }
        } else {
            emu.process_iteration();
        }
    }
}
