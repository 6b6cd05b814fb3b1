//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `slotbook_core` linkage, configuration and engine selection.
//! - Print the publicly visible slots for one day (today by default).
//!
//! Usage: `slotbook [YYYY-MM-DD]`

use log::error;
use slotbook_core::{default_log_level, init_logging, open_booking_service, AppConfig, Slot};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("slotbook_core ping={}", slotbook_core::ping());
    println!("slotbook_core version={}", slotbook_core::core_version());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::from(2);
        }
    };

    if let Some(log_dir) = config.log_dir.as_deref() {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let (service, engine) = match open_booking_service(&config) {
        Ok(opened) => opened,
        Err(err) => {
            error!("event=cli_start module=cli status=error error_code={}", err.code());
            eprintln!("failed to open slot store: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("slotbook engine={engine}");

    let requested = std::env::args().nth(1);
    let date = service.public_date(requested.as_deref());
    match service.open_day(date) {
        Ok(slots) => {
            println!("date={date} slots={}", slots.len());
            for slot in &slots {
                println!("{}", describe(slot));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

fn describe(slot: &Slot) -> String {
    let state = if slot.is_available() {
        "open"
    } else if slot.is_blocked() {
        "blocked"
    } else {
        "booked"
    };
    format!("{} {state}", slot.hour)
}
