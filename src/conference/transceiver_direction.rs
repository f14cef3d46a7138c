use std::fmt;

/// TransceiverDirection indicates the direction of a conference entry's
/// transceiver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransceiverDirection {
    Unspecified,

    /// Sendrecv indicates the entry offers to both send and receive media.
    Sendrecv,

    /// Sendonly indicates the entry offers to send media.
    Sendonly,

    /// Recvonly indicates the entry offers to receive media.
    Recvonly,

    /// Inactive indicates the entry offers neither to send nor to receive
    /// media.
    Inactive,
}

const TRANSCEIVER_DIRECTION_SENDRECV_STR: &str = "sendrecv";
const TRANSCEIVER_DIRECTION_SENDONLY_STR: &str = "sendonly";
const TRANSCEIVER_DIRECTION_RECVONLY_STR: &str = "recvonly";
const TRANSCEIVER_DIRECTION_INACTIVE_STR: &str = "inactive";

impl From<&str> for TransceiverDirection {
    fn from(raw: &str) -> Self {
        match raw {
            TRANSCEIVER_DIRECTION_SENDRECV_STR => TransceiverDirection::Sendrecv,
            TRANSCEIVER_DIRECTION_SENDONLY_STR => TransceiverDirection::Sendonly,
            TRANSCEIVER_DIRECTION_RECVONLY_STR => TransceiverDirection::Recvonly,
            TRANSCEIVER_DIRECTION_INACTIVE_STR => TransceiverDirection::Inactive,
            _ => TransceiverDirection::Unspecified,
        }
    }
}

impl From<u8> for TransceiverDirection {
    fn from(v: u8) -> Self {
        match v {
            1 => TransceiverDirection::Sendrecv,
            2 => TransceiverDirection::Sendonly,
            3 => TransceiverDirection::Recvonly,
            4 => TransceiverDirection::Inactive,
            _ => TransceiverDirection::Unspecified,
        }
    }
}

impl fmt::Display for TransceiverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TransceiverDirection::Sendrecv => {
                write!(f, "{TRANSCEIVER_DIRECTION_SENDRECV_STR}")
            }
            TransceiverDirection::Sendonly => {
                write!(f, "{TRANSCEIVER_DIRECTION_SENDONLY_STR}")
            }
            TransceiverDirection::Recvonly => {
                write!(f, "{TRANSCEIVER_DIRECTION_RECVONLY_STR}")
            }
            TransceiverDirection::Inactive => {
                write!(f, "{TRANSCEIVER_DIRECTION_INACTIVE_STR}")
            }
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}

impl TransceiverDirection {
    pub fn from_send_recv(send: bool, recv: bool) -> TransceiverDirection {
        match (send, recv) {
            (true, true) => Self::Sendrecv,
            (true, false) => Self::Sendonly,
            (false, true) => Self::Recvonly,
            (false, false) => Self::Inactive,
        }
    }

    pub fn has_send(&self) -> bool {
        matches!(self, Self::Sendrecv | Self::Sendonly)
    }

    pub fn has_recv(&self) -> bool {
        matches!(self, Self::Sendrecv | Self::Recvonly)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_transceiver_direction() {
        let tests = vec![
            ("Unspecified", TransceiverDirection::Unspecified),
            ("sendrecv", TransceiverDirection::Sendrecv),
            ("sendonly", TransceiverDirection::Sendonly),
            ("recvonly", TransceiverDirection::Recvonly),
            ("inactive", TransceiverDirection::Inactive),
        ];

        for (direction_str, expected_direction) in tests {
            assert_eq!(TransceiverDirection::from(direction_str), expected_direction);
        }
    }

    #[test]
    fn test_transceiver_direction_string() {
        let tests = vec![
            (TransceiverDirection::Unspecified, "Unspecified"),
            (TransceiverDirection::Sendrecv, "sendrecv"),
            (TransceiverDirection::Sendonly, "sendonly"),
            (TransceiverDirection::Recvonly, "recvonly"),
            (TransceiverDirection::Inactive, "inactive"),
        ];

        for (direction, expected_string) in tests {
            assert_eq!(direction.to_string(), expected_string);
        }
    }

    #[test]
    fn test_transceiver_direction_has_send() {
        let tests = vec![
            (TransceiverDirection::Unspecified, false),
            (TransceiverDirection::Sendrecv, true),
            (TransceiverDirection::Sendonly, true),
            (TransceiverDirection::Recvonly, false),
            (TransceiverDirection::Inactive, false),
        ];

        for (direction, expected) in tests {
            assert_eq!(direction.has_send(), expected);
        }
    }

    #[test]
    fn test_transceiver_direction_from_send_recv() {
        let tests = vec![
            ((true, true), TransceiverDirection::Sendrecv),
            ((true, false), TransceiverDirection::Sendonly),
            ((false, true), TransceiverDirection::Recvonly),
            ((false, false), TransceiverDirection::Inactive),
        ];

        for ((send, recv), expected_direction) in tests {
            assert_eq!(
                TransceiverDirection::from_send_recv(send, recv),
                expected_direction
            );
        }
    }
}
