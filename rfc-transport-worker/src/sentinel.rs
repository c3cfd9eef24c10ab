//! Control sentinels (spec.md §6 "Control sentinels"): small distinguished
//! strings that share the line-delimited channel with encoded Invoke
//! frames but can never be produced by the codec, since the codec only ever
//! emits JSON objects and these are bare identifiers.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    None,
    Opening,
    Open,
    Closing,
    Closed,
}

impl Sentinel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Sentinel::None => "NONE",
            Sentinel::Opening => "OPENING",
            Sentinel::Open => "OPEN",
            Sentinel::Closing => "CLOSING",
            Sentinel::Closed => "CLOSED",
        }
    }

    pub fn parse(line: &str) -> Option<Sentinel> {
        match line {
            "NONE" => Some(Sentinel::None),
            "OPENING" => Some(Sentinel::Opening),
            "OPEN" => Some(Sentinel::Open),
            "CLOSING" => Some(Sentinel::Closing),
            "CLOSED" => Some(Sentinel::Closed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_round_trip_through_their_string_form() {
        for s in [Sentinel::None, Sentinel::Opening, Sentinel::Open, Sentinel::Closing, Sentinel::Closed] {
            assert_eq!(Sentinel::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn an_encoded_invoke_frame_never_parses_as_a_sentinel() {
        let frame = r#"{"uid":0,"listener":"plus","parameters":[]}"#;
        assert_eq!(Sentinel::parse(frame), None);
    }
}
