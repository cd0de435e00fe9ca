//! Ordered init sequences.

use core::fmt;
use hal::Error;

/// Why an init step did not succeed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Failure {
    /// Stop the sequence.
    Fatal(Error),
    /// Report and go on.
    Soft(Error),
}

impl From<Error> for Failure {
    #[inline]
    fn from(value: Error) -> Self {
        Self::Fatal(value)
    }
}

pub type InitResult = Result<(), Failure>;

/// One named step of a sequence over context `C`.
pub struct Initcall<C> {
    pub name: &'static str,
    pub func: fn(&mut C) -> InitResult,
}

/// The step that stopped a sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InitcallError {
    pub name: &'static str,
    pub error: Error,
}

impl fmt::Display for InitcallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "initcall failed at call {}: {}", self.name, self.error)
    }
}

/// Runs `list` in order and stops at the first fatal failure.
///
/// Steps after a fatal failure are never called.
pub fn run_list<C>(ctx: &mut C, list: &[Initcall<C>]) -> Result<(), InitcallError> {
    for call in list {
        log::trace!("initcall: {}", call.name);
        match (call.func)(ctx) {
            Ok(()) => {}
            Err(Failure::Soft(error)) => log::warn!("{}: {error}, continuing", call.name),
            Err(Failure::Fatal(error)) => {
                log::error!("{}: {error}", call.name);
                return Err(InitcallError {
                    name: call.name,
                    error,
                });
            }
        }
    }
    Ok(())
}

/// Builds an initcall table from methods of `Self`, named after them.
macro_rules! initcalls {
    ($($name:ident),* $(,)?) => {
        [$($crate::initcall::Initcall {
            name: stringify!($name),
            func: Self::$name,
        }),*]
    };
}

pub(crate) use initcalls;
