//! The V2 response status code, mirrored on the normative table in the spec.

use std::fmt;

/// Status codes used by the V2 response meta-position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Code {
    /// The call completed normally; the body carries the encoded return value.
    Success = 0,
    /// A business-layer exception, marked as such by the server.
    BusinessException = 1,
    /// Any other exception raised from user code or infrastructure.
    ServerError = 2,
    /// Parse failure, security violation, or unknown method.
    ProtocolError = 3,
}

impl Code {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Code::Success),
            1 => Some(Code::BusinessException),
            2 => Some(Code::ServerError),
            3 => Some(Code::ProtocolError),
            _ => None,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Code::Success => "SUCCESS",
            Code::BusinessException => "BUSINESS_EXCEPTION",
            Code::ServerError => "SERVER_ERROR",
            Code::ProtocolError => "PROTOCOL_ERROR",
        };
        f.write_str(s)
    }
}
