//! User-memory access: the fallible pointer wrapper and the argument-stack
//! writer built on top of it.

mod stack;
mod user_ptr;

pub use stack::build_argument_stack;
pub use user_ptr::{validate_word, UserPtr};
