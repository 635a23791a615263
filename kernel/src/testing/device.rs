//! Console, shutdown device, and keyboard doubles: real process-wide
//! singletons in the true hal (see `hal::device`'s module doc), so the test
//! registrations are global statics too, wired up the same way the real
//! platform would wire them (via `crate_interface`, not a trait object
//! injected through `Platform`).

use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use crate::hal::{Console, Keyboard, ShutdownDevice};

fn console_buffer() -> &'static Mutex<Vec<u8>> {
    static BUFFER: OnceLock<Mutex<Vec<u8>>> = OnceLock::new();
    BUFFER.get_or_init(|| Mutex::new(Vec::new()))
}

fn keyboard_buffer() -> &'static Mutex<VecDeque<u8>> {
    static BUFFER: OnceLock<Mutex<VecDeque<u8>>> = OnceLock::new();
    BUFFER.get_or_init(|| Mutex::new(VecDeque::new()))
}

/// Marker a test's [`crate::testing::TestScheduler::exit_current`]-style
/// panic would also be caught against, if `HALT` is ever exercised
/// end-to-end; kept private since no scenario currently needs to resume
/// after it.
struct Halted;

struct TestConsole;

#[crate_interface::impl_interface]
impl Console for TestConsole {
    fn write(bytes: &[u8]) {
        console_buffer().lock().unwrap().extend_from_slice(bytes);
    }
}

struct TestShutdown;

#[crate_interface::impl_interface]
impl ShutdownDevice for TestShutdown {
    fn power_off() -> ! {
        std::panic::panic_any(Halted)
    }
}

struct TestKeyboard;

#[crate_interface::impl_interface]
impl Keyboard for TestKeyboard {
    fn read_char() -> u8 {
        keyboard_buffer().lock().unwrap().pop_front().unwrap_or(0)
    }
}

/// Everything written to the console since the last [`reset_console`].
pub fn console_output() -> Vec<u8> {
    console_buffer().lock().unwrap().clone()
}

/// Clears the console double's accumulated output; called at the start of
/// every [`crate::testing::TestHarness::new`].
pub fn reset_console() {
    console_buffer().lock().unwrap().clear();
}

/// Queues bytes for `SYS_READ` on descriptor 0 to consume.
pub fn feed_keyboard(bytes: &[u8]) {
    keyboard_buffer().lock().unwrap().extend(bytes.iter().copied());
}
