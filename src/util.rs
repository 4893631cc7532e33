use std::any::Any;

/// Best-effort text of a caught panic.
pub fn panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, panic_any};

    #[test]
    fn reads_str_panic() {
        let payload = catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_payload(payload.as_ref()), "boom");
    }

    #[test]
    fn reads_string_panic() {
        let payload = catch_unwind(|| panic_any(String::from("kaboom"))).unwrap_err();
        assert_eq!(panic_payload(payload.as_ref()), "kaboom");
    }

    #[test]
    fn non_string_panic_has_placeholder() {
        let payload = catch_unwind(|| panic_any(123_i32)).unwrap_err();
        assert_eq!(panic_payload(payload.as_ref()), "unknown panic payload");
    }
}
