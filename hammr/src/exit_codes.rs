#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Could not establish the connection to the target host.
    ConnectError = 10,

    /// Schema compilation or method resolution failed.
    SchemaError = 20,

    /// Invalid CLI arguments or configuration file.
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, report rendering, panics
    /// caught at top level).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
