use pore_network_core::PoreNetworkError;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Common interface for FFI error types.
///
/// - `code()` - Returns the error code to be passed across FFI boundary
/// - `msg()` - Returns the error message for diagnostic purposes
pub(crate) trait PnmError {
    /// Returns the error code to be returned across the FFI boundary.
    fn code(&self) -> PnmErrorCode;

    /// Returns the human-readable error message.
    fn msg(&self) -> &str;
}

/// Default implementation of `PnmError` for FFI error scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultPnmError {
    code: PnmErrorCode,
    msg: String,
}

impl DefaultPnmError {
    /// Create error for null pointer passed where non-null required.
    ///
    /// # Arguments
    /// * `param_name` - The name of the parameter that was null (e.g., `"out_network"`)
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: PnmErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// Create error for an out-of-range argument.
    pub fn invalid_parameter(param_name: &str, message: &str) -> Self {
        Self {
            code: PnmErrorCode::InvalidParameter,
            msg: format!("Parameter '{param_name}': {message}"),
        }
    }

    /// Create error for a panic caught at the FFI boundary.
    pub fn panic(operation: &str) -> Self {
        Self {
            code: PnmErrorCode::Panic,
            msg: format!("Internal panic during {operation}"),
        }
    }
}

impl From<PoreNetworkError> for DefaultPnmError {
    fn from(error: PoreNetworkError) -> Self {
        let code = match &error {
            PoreNetworkError::InvalidModel(_) => PnmErrorCode::InvalidModel,
            PoreNetworkError::Cancelled => PnmErrorCode::Cancelled,
            PoreNetworkError::GpuUnavailable(_) => PnmErrorCode::GpuUnavailable,
            PoreNetworkError::GpuSolverFailure(_) => PnmErrorCode::GpuSolverFailure,
            PoreNetworkError::InvalidParameter { .. } => PnmErrorCode::InvalidParameter,
            PoreNetworkError::InvalidVolume(_) => PnmErrorCode::InvalidVolume,
            PoreNetworkError::WorkerPool(_) => PnmErrorCode::WorkerPool,
        };
        Self {
            code,
            msg: error.to_string(),
        }
    }
}

impl PnmError for DefaultPnmError {
    fn code(&self) -> PnmErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

/// FFI error codes returned by pore network functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnmErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Invalid pointer: null pointer passed where non-null required.
    NullPointer = 1,

    /// Invalid parameter passed to function.
    InvalidParameter = 2,

    /// The network has no pores or no throats, or references missing pores.
    InvalidModel = 3,

    /// The operation was cancelled.
    Cancelled = 4,

    /// No GPU device is available.
    GpuUnavailable = 5,

    /// The GPU solver failed and no fallback was possible.
    GpuSolverFailure = 6,

    /// The label volume or particle list is malformed.
    InvalidVolume = 7,

    /// The worker pool could not be created.
    WorkerPool = 8,

    /// A panic was caught at the FFI boundary.
    Panic = 9,
}

impl From<DefaultPnmError> for PnmErrorCode {
    fn from(error: DefaultPnmError) -> Self {
        error.code
    }
}

thread_local! {
    /// Thread-local storage for the most recent FFI error (C string, error code).
    /// The CString is stored so the pointer handed to C stays valid.
    static LAST_ERROR: RefCell<(Option<CString>, PnmErrorCode)> = const { RefCell::new((None, PnmErrorCode::Ok)) };
}

/// Internal helper to read `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, PnmErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

/// Internal helper to mutate `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, PnmErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns:
/// - A borrowed pointer to the error message if an error occurred.
/// - `null` if the last call on this thread succeeded.
///
/// # Lifetime
/// The returned pointer is valid until the next FFI call on this thread.
///
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```cpp
/// PnmNetwork* network = nullptr;
/// PnmErrorCode err = pnm_network_create(labels, nx, ny, nz, nullptr, 0, &config, &network);
/// if (err != PnmErrorCode::Ok) {
///     const char* error = pnm_get_last_error();
///     if (error) {
///         printf("Network generation failed: %s\n", error);
///     }
/// }
/// ```
#[no_mangle]
pub extern "C" fn pnm_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code (`Ok` if the last call succeeded).
#[no_mangle]
pub extern "C" fn pnm_get_last_error_code() -> PnmErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
