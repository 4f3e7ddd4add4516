use std::borrow::Cow;
use std::fmt;

/// One reading pulled off the serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
    /// A line of text as sent by the board, terminators stripped.
    Reading(String),
    /// The read timed out before a single byte arrived.
    NoData,
}

impl Sample {
    /// Decode the raw bytes of one line read.
    ///
    /// An empty buffer means the read timed out with nothing received.
    /// Partial lines cut by a timeout are kept as readings.
    pub fn decode(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::NoData;
        }

        let text = String::from_utf8_lossy(bytes);
        if matches!(text, Cow::Owned(_)) {
            log::warn!("Received non UTF-8 bytes from board: {:?}", bytes);
        }

        Self::Reading(text.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Text persisted for this sample, empty for [`Sample::NoData`].
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reading(text) => text,
            Self::NoData => "",
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    /// Parse the reading as a number, `None` for no-data or garbled lines.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Reading(text) => text.trim().parse().ok(),
            Self::NoData => None,
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
