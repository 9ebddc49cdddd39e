//! Console and webhook message text.

use crate::booking::Seat;
use crate::domain::Route;

/// Header printed before each attempt, e.g. `[1/3] 전주 -> 서울, date: 20240917, time: 193000`
pub fn attempt_header(index: u32, max_attempts: u32, route: &Route) -> String {
    format!("[{}/{}] {}", index + 1, max_attempts, route)
}

pub fn success_console(route: &Route, seat: &Seat) -> String {
    format!("Train seat reserved! {}\nSeat: {}", route, seat)
}

pub fn success_message(route: &Route, seat: &Seat) -> String {
    format!(":tada: {}", success_console(route, seat))
}

pub fn exhaustion_console(max_attempts: u32) -> String {
    format!(
        "Tried {} times but could not reserve a seat on any route.",
        max_attempts
    )
}

pub fn exhaustion_message(max_attempts: u32) -> String {
    format!(":man-gesturing-no: {}", exhaustion_console(max_attempts))
}

pub fn error_message(detail: &str) -> String {
    format!("Other error occurred: {}", detail)
}

pub fn retry_notice(wait_secs: f64) -> String {
    format!("Retrying in {:.2}s..", wait_secs)
}
