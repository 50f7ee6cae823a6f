use crate::error::{with_last_error_mut, DefaultPnmError, PnmError, PnmErrorCode};
use std::ffi::CString;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Set the thread-local error message and code.
/// Accepts any type implementing `PnmError` trait.
pub(crate) fn set_last_error(error: &impl PnmError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Track an error by setting it in thread-local storage and returning its code.
#[inline]
pub(crate) fn track_error(error: &impl PnmError) -> PnmErrorCode {
    set_last_error(error);
    error.code()
}

/// Record the error of `result` (or clear the last error on success).
pub(crate) fn track_result<T>(result: Result<T, DefaultPnmError>) -> Result<T, PnmErrorCode> {
    match result {
        Ok(value) => {
            clear_last_error();
            Ok(value)
        }
        Err(error) => Err(track_error(&error)),
    }
}

/// Clear the thread-local error message and code.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = PnmErrorCode::Ok;
    });
}

/// Run `f`, turning a panic into a `Panic` error so it never unwinds into C.
pub(crate) fn guard_panic<T, F>(operation: &str, f: F) -> Result<T, DefaultPnmError>
where
    F: FnOnce() -> Result<T, DefaultPnmError>,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| Err(DefaultPnmError::panic(operation)))
}

/// Borrow `len` elements at `ptr`. A null pointer is accepted only for `len == 0`.
///
/// # Safety
/// A non-null `ptr` must point to `len` initialized, properly aligned values that stay
/// alive and unmodified for `'a`.
pub(crate) unsafe fn slice_from_raw<'a, T>(
    ptr: *const T,
    len: usize,
    name: &str,
) -> Result<&'a [T], DefaultPnmError> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(DefaultPnmError::null_pointer(name));
    }
    // SAFETY: non-null and covers `len` elements per the caller contract.
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// Write `value` through `out`, returning `NullPointer` for a null destination.
///
/// # Safety
/// A non-null `out` must be valid for writes.
pub(crate) unsafe fn write_out<T>(out: *mut T, value: T, name: &str) -> PnmErrorCode {
    if out.is_null() {
        return track_error(&DefaultPnmError::null_pointer(name));
    }
    // SAFETY: checked non-null; validity is the caller's contract.
    unsafe {
        out.write(value);
    }
    clear_last_error();
    PnmErrorCode::Ok
}

/// Hand out a borrowed array through `out_len`/`out_array`.
///
/// # Safety
/// Non-null output pointers must be valid for writes.
pub(crate) unsafe fn write_array<T>(
    values: &[T],
    out_len: *mut usize,
    out_array: *mut *const T,
) -> PnmErrorCode {
    if out_len.is_null() {
        return track_error(&DefaultPnmError::null_pointer("out_len"));
    }
    if out_array.is_null() {
        return track_error(&DefaultPnmError::null_pointer("out_array"));
    }
    // SAFETY: both checked non-null; validity is the caller's contract.
    unsafe {
        out_len.write(values.len());
        out_array.write(values.as_ptr());
    }
    clear_last_error();
    PnmErrorCode::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::pnm_get_last_error_code;

    #[test]
    fn test_track_result_sets_and_clears() {
        let failed: Result<(), PnmErrorCode> = track_result(Err(DefaultPnmError::null_pointer("x")));
        assert_eq!(failed, Err(PnmErrorCode::NullPointer));
        assert_eq!(pnm_get_last_error_code(), PnmErrorCode::NullPointer);

        assert_eq!(track_result(Ok(5)), Ok(5));
        assert_eq!(pnm_get_last_error_code(), PnmErrorCode::Ok);
    }

    #[test]
    fn test_guard_panic() {
        let result: Result<(), DefaultPnmError> = guard_panic("test", || panic!("boom"));
        assert_eq!(result.unwrap_err().code(), PnmErrorCode::Panic);
    }

    #[test]
    fn test_slice_from_raw() {
        let values = [1u32, 2, 3];
        let slice = unsafe { slice_from_raw(values.as_ptr(), 3, "values") }.unwrap();
        assert_eq!(slice, &values);
        let empty = unsafe { slice_from_raw::<u32>(std::ptr::null(), 0, "values") }.unwrap();
        assert!(empty.is_empty());
        assert!(unsafe { slice_from_raw::<u32>(std::ptr::null(), 2, "values") }.is_err());
    }
}
