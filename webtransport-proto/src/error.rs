/// WebTransport application error codes are carried inside the HTTP/3 error
/// code space, offset so they don't collide with HTTP/3's own codes.
/// See <https://www.ietf.org/archive/id/draft-ietf-webtrans-http3-07.html#section-8.1>.
const ERROR_FIRST: u64 = 0x52e4a40fa8db;
const ERROR_LAST: u64 = 0x52e4a40fa9e2;

/// Recover an application error code from an HTTP/3 error code, if it falls
/// within the WebTransport-reserved range.
pub fn error_from_http3(code: u64) -> Option<u32> {
    if !(ERROR_FIRST..=ERROR_LAST).contains(&code) {
        return None;
    }

    let shifted = code - ERROR_FIRST;

    // Every 0x1f-th value in the range is reserved for greasing.
    if shifted % 0x1f == 0x1f - 1 {
        return None;
    }

    Some((shifted - shifted / 0x1f) as u32)
}

/// Map an application error code into the HTTP/3 error code space.
pub fn error_to_http3(code: u32) -> u64 {
    let code = code as u64;
    ERROR_FIRST + code + code / 0x1e
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for code in [0u32, 1, 41, 1000] {
            let http3 = error_to_http3(code);
            assert_eq!(error_from_http3(http3), Some(code));
        }
    }

    #[test]
    fn outside_range_is_none() {
        assert_eq!(error_from_http3(0), None);
        assert_eq!(error_from_http3(u64::MAX), None);
    }
}
