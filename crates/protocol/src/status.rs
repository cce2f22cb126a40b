//! Translation of numeric status codes into operator-facing diagnostics.
//!
//! Three ranges share one decoder: the negative local codes produced by the
//! link layer, the PCCC STS octet values (multiples of 16), and the
//! extended-status codes reported as `0x100 + EXT` when STS is 0xF0.

/// Renders any status code as diagnostic text. Codes outside the known
/// tables stringify as `Unknown Message - <n>`.
#[must_use]
pub fn status_message(code: i32) -> String {
    match code {
        0 => "No error".into(),
        -2 => "Command not acknowledged (NAK)".into(),
        -3 => "No response from target node".into(),
        -5 => "Invalid address".into(),
        -6 => "Could not open comm port".into(),
        -7 => "No data supplied".into(),
        -8 => "No data returned from target node".into(),
        -20 => "No response, timed out waiting for reply".into(),
        -21 => "Received frame failed checksum, NAK returned".into(),
        16 => "Illegal command or format".into(),
        32 => "Host has a problem and will not communicate".into(),
        48 => "Remote node host is missing, disconnected, or shut down".into(),
        64 => "Host could not complete function due to a hardware fault".into(),
        80 => "Addressing problem or memory protect rungs".into(),
        96 => "Function not allowed due to command protection selection".into(),
        112 => "Processor is in Program mode".into(),
        128 => "Compatibility mode file missing or communication zone problem".into(),
        144 => "Remote node cannot buffer command".into(),
        240 => "Error code in the EXT STS byte".into(),
        257 => "A field has an illegal value".into(),
        258 => "Fewer levels specified in address than minimum for any address".into(),
        259 => "More levels specified in address than system supports".into(),
        260 => "Symbol not found".into(),
        261 => "Symbol is of improper format".into(),
        262 => "Address does not point to something usable".into(),
        263 => "File is wrong size".into(),
        264 => "Cannot complete request, situation has changed since start of command".into(),
        265 => "Data or file is too large".into(),
        266 => "Transaction size plus word address is too large".into(),
        267 => "Access denied, improper privilege".into(),
        268 => "Condition cannot be generated, resource is not available".into(),
        269 => "Condition already exists, resource is readily available".into(),
        270 => "Command cannot be executed".into(),
        other => format!("Unknown Message - {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::status_message;

    #[test]
    fn every_sts_multiple_of_sixteen_has_text() {
        for code in (16..=144).step_by(16) {
            assert!(
                !status_message(code).starts_with("Unknown"),
                "missing text for STS {code}"
            );
        }
    }

    #[test]
    fn extended_codes_are_covered() {
        for code in 257..=270 {
            assert!(
                !status_message(code).starts_with("Unknown"),
                "missing text for EXT {code}"
            );
        }
    }

    #[test]
    fn unknown_codes_fall_through() {
        assert_eq!(status_message(9999), "Unknown Message - 9999");
        assert_eq!(status_message(-99), "Unknown Message - -99");
    }

    #[test]
    fn local_codes_render() {
        assert_eq!(status_message(-20), "No response, timed out waiting for reply");
        assert_eq!(
            status_message(-21),
            "Received frame failed checksum, NAK returned"
        );
    }
}
