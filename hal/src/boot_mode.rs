/// Boot-mode strap, OTP word or config register.
///
/// The value is board defined; the core maps it through the board's
/// configured table and never interprets it otherwise.
pub trait BootMode {
    fn read(&self) -> u32;
}
