use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use iocmed_frame::{encode_link, LinkDecoder, MAX_LINK_SIZE, SRV_POS};
use serde::Serialize;
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{channel_name, parse_hex, print_json, print_service_frame, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Serialize)]
struct SendOutput<'a> {
    path: String,
    mux: u8,
    channel: &'a str,
    command: u8,
    bytes_sent: usize,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = match args.data.as_deref() {
        Some(hex) => parse_hex(hex).map_err(|msg| CliError::new(USAGE, msg))?,
        None => Vec::new(),
    };
    let wait_timeout = if args.wait {
        Some(parse_duration(&args.wait_timeout)?)
    } else {
        None
    };

    let mut service = Vec::with_capacity(2 + payload.len());
    service.push(args.mux);
    service.push(args.command);
    service.extend_from_slice(&payload);

    let mut frame = BytesMut::new();
    encode_link(&service, &mut frame).map_err(|err| frame_error("encode failed", err))?;

    let mut uart = open_uart(&args.path)?;
    uart.write_all(&frame)
        .map_err(|err| io_error("write failed", err))?;
    debug!(path = %args.path.display(), bytes = frame.len(), "frame sent");

    match wait_timeout {
        Some(timeout) => {
            let reply = read_frame(&mut uart, timeout)?;
            print_service_frame(&reply, format);
        }
        None => {
            let channel = channel_name(args.mux);
            match format {
                OutputFormat::Json => print_json(&SendOutput {
                    path: args.path.display().to_string(),
                    mux: args.mux,
                    channel,
                    command: args.command,
                    bytes_sent: frame.len(),
                }),
                OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => println!(
                    "sent {} bytes to {} (channel={channel}, command=0x{:02x})",
                    frame.len(),
                    args.path.display(),
                    args.command
                ),
            }
        }
    }

    Ok(SUCCESS)
}

fn open_uart(path: &Path) -> CliResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
        .map_err(|err| io_error(&format!("open {}", path.display()), err))
}

/// Read until one complete link frame arrives and return its service part.
fn read_frame(uart: &mut File, timeout: Duration) -> CliResult<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut decoder = LinkDecoder::new();
    let mut chunk = [0u8; 64];

    loop {
        match uart.read(&mut chunk) {
            Ok(0) => {
                return Err(CliError::new(
                    TIMEOUT,
                    "virtual uart closed before a reply arrived",
                ))
            }
            Ok(n) => {
                for &byte in &chunk[..n] {
                    if let Some(boundary) = decoder.feed_byte(byte) {
                        let mut link = [0u8; MAX_LINK_SIZE];
                        decoder
                            .take_frame(boundary, &mut link)
                            .map_err(|err| frame_error("decode failed", err))?;
                        return Ok(link[SRV_POS..boundary.link_len].to_vec());
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read failed", err)),
        }

        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no reply within {}ms", timeout.as_millis()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn read_frame_skips_noise_and_returns_service() {
        let (mut reader, mut writer) = pipe();
        writer
            .write_all(&[0x00, 0xA5, 0x03, 0x00, 0x08, 0x11, 0x7F])
            .unwrap();

        let service = read_frame(&mut reader, Duration::from_secs(1)).unwrap();
        assert_eq!(service, [0x08, 0x11, 0x7F]);
    }

    #[test]
    fn read_frame_times_out_on_silence() {
        let (mut reader, _writer) = pipe();
        let err = read_frame(&mut reader, Duration::from_millis(30)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }

    fn pipe() -> (File, File) {
        use std::os::fd::FromRawFd;

        let mut fds = [0; 2];
        // SAFETY: `fds` has room for the two descriptors pipe2 writes.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        assert_eq!(rc, 0);
        // SAFETY: both descriptors were just created and are owned by nothing else.
        unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
    }
}
