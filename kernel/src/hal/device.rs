//! Console output, the shutdown device, and keyboard input.
//!
//! These are true process-wide singletons (there is exactly one console),
//! so unlike the scheduler/file-system/page-directory collaborators above
//! they are wired up with `crate_interface` rather than injected as trait
//! objects: the platform implements the trait once, anywhere in the
//! dependency graph, and the core calls it through `call_interface!` without
//! ever linking against the concrete implementation.

use alloc::string::String;
use core::fmt::Write;

#[crate_interface::def_interface]
pub trait Console {
    /// Writes `bytes` to the console as-is (no implicit newline).
    fn write(bytes: &[u8]);
}

#[crate_interface::def_interface]
pub trait ShutdownDevice {
    /// Powers the machine off. Never returns.
    fn power_off() -> !;
}

#[crate_interface::def_interface]
pub trait Keyboard {
    /// Blocks until a key is available and returns it.
    fn read_char() -> u8;
}

/// Writes `bytes` to the console through the registered [`Console`] impl.
pub fn console_write(bytes: &[u8]) {
    crate_interface::call_interface!(Console::write(bytes))
}

/// Formats the standard `"<name>: exit(<code>)\n"` termination message and
/// writes it to the console.
pub fn print_exit_message(name: &str, code: i32) {
    let mut line = String::with_capacity(name.len() + 16);
    let _ = write!(line, "{}: exit({})\n", name, code);
    console_write(line.as_bytes());
}

/// Powers the machine off through the registered [`ShutdownDevice`] impl.
pub fn power_off() -> ! {
    crate_interface::call_interface!(ShutdownDevice::power_off())
}

/// Reads one character through the registered [`Keyboard`] impl.
pub fn read_char() -> u8 {
    crate_interface::call_interface!(Keyboard::read_char())
}
