//! Entry point for the console host.
//!
//! Initializes logging and configuration, attaches to the server handle
//! the driver passed on the command line, and either hands the session to
//! the legacy inbox host (by policy) or runs the dispatch loop on a
//! dedicated thread while the main thread consumes published snapshots.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Keep logger alive for the duration of the process.
    let _logger = condrv_host::logger::init_logger()?;
    run()
}

#[cfg(not(windows))]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    log::error!("the console driver is only available on Windows");
    eprintln!("condrv-host: the console driver is only available on Windows");
    std::process::exit(1);
}

#[cfg(windows)]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Read;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use std::{ptr, thread};

    use condrv::handle::HandleValue;
    use condrv_host::communications::{ConDrvDeviceComm, DeviceComm};
    use condrv_host::config::{self, Config};
    use condrv_host::runtime::{legacy_host, startup_command};
    use condrv_host::server::ServerDispatch;
    use condrv_host::view::PublishedScreenBuffer;
    use log::{debug, error, info, warn};
    use windows_sys::Win32::System::Threading::CreateEventW;

    let config_path = config::find_config_file();
    let config = Config::load(&config_path)?;
    info!("configuration loaded from {}", config_path.display());

    let arguments = parse_arguments(std::env::args().skip(1))?;
    let Some(server_handle) = arguments.server_handle else {
        return Err("missing --server <handle> argument".into());
    };

    let comm = ConDrvDeviceComm::from_server_handle(HandleValue::from_raw(server_handle))?;

    // Policy can route the whole session to the inbox host. After the
    // transfer this process only keeps the module alive.
    if config.host.legacy_activation {
        legacy_host::activate(comm.server_handle())?;
        info!("legacy host owns the session; parking");
        thread::park();
        return Ok(());
    }

    let input_available_event = unsafe { CreateEventW(ptr::null(), 0, 0, ptr::null()) };
    if input_available_event.is_null() {
        return Err(std::io::Error::last_os_error().into());
    }
    comm.set_server_information(HandleValue::from_raw(input_available_event as usize))?;

    if config.host.allow_ui_access {
        comm.allow_ui_access()?;
    }

    let client_command = arguments
        .client_command
        .or(config.host.default_client.clone())
        .unwrap_or_else(startup_command::resolve_default_client_command);
    info!("client command: {client_command}");

    let published = Arc::new(PublishedScreenBuffer::new());
    let mut dispatch =
        ServerDispatch::new(&comm, config.screen_buffer_settings(), Arc::clone(&published))?;

    let input_tx = dispatch.input_sender();
    let finished = AtomicBool::new(false);

    // Terminal bytes flow to the server thread, which owns all decode
    // state. The feeder is detached; it dies with the process.
    if let Err(spawn_error) = thread::Builder::new()
        .name("input-feeder".into())
        .spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut buffer = [0u8; 4096];
            loop {
                match stdin.read(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(read) => {
                        if input_tx.send(buffer[..read].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        })
    {
        warn!("failed to spawn the input feeder thread: {spawn_error}");
    }

    let outcome = thread::scope(|scope| {
        let server = thread::Builder::new()
            .name("condrv-server".into())
            .spawn_scoped(scope, || {
                let result = dispatch.run();
                finished.store(true, Ordering::Release);
                result
            })
            .expect("failed to spawn the server thread");

        // The main thread plays the UI role: observe published snapshot
        // revisions until the server winds down.
        let mut last_revision = 0u64;
        while !finished.load(Ordering::Acquire) {
            if let Some(snapshot) = published.latest() {
                if snapshot.revision != last_revision {
                    last_revision = snapshot.revision;
                    debug!("snapshot revision {last_revision}");
                }
            }
            thread::sleep(Duration::from_millis(20));
        }

        server.join().expect("server thread panicked")
    });

    match outcome {
        Ok(()) => Ok(()),
        Err(error) if error.is_fatal() => {
            error!("fatal session error: {error}");
            Err(error.into())
        }
        Err(error) => {
            // The device handle went away underneath a blocking call;
            // treated as the end of the session.
            warn!("session ended: {error}");
            Ok(())
        }
    }
}

#[cfg(windows)]
struct Arguments {
    server_handle: Option<usize>,
    client_command: Option<String>,
}

/// Parse `--server <handle>` plus an optional `-- <client command line>`.
#[cfg(windows)]
fn parse_arguments(
    mut args: impl Iterator<Item = String>,
) -> Result<Arguments, Box<dyn std::error::Error>> {
    let mut parsed = Arguments {
        server_handle: None,
        client_command: None,
    };

    while let Some(argument) = args.next() {
        match argument.as_str() {
            "--server" => {
                let value = args.next().ok_or("--server requires a handle value")?;
                let digits = value.trim_start_matches("0x");
                let radix = if digits.len() == value.len() { 10 } else { 16 };
                parsed.server_handle = Some(usize::from_str_radix(digits, radix)?);
            }
            "--" => {
                let rest: Vec<String> = args.by_ref().collect();
                if !rest.is_empty() {
                    parsed.client_command = Some(rest.join(" "));
                }
                break;
            }
            other => {
                return Err(format!("unknown argument `{other}`").into());
            }
        }
    }

    Ok(parsed)
}
