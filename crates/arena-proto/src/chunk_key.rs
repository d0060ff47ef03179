use std::fmt;
use std::str::FromStr;

/// Wire form of a chunk coordinate: `"<cx>|<cy>"`, with `cx` already wrapped
/// to `[0, ceil(W/C))` and `cy` in `[0, ceil(H/C))` (spec §6).
///
/// Internal maps key on the integer pair directly (spec §9: "string chunk
/// keys -> integer (cx,cy) pairs in internal maps"); this type exists only
/// at the wire boundary and in tests that assert on wire output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub cx: u32,
    pub cy: u32,
}

impl ChunkKey {
    pub fn new(cx: u32, cy: u32) -> Self {
        Self { cx, cy }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.cx, self.cy)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid chunk key: {0:?}")]
pub struct ChunkKeyParseError(String);

impl FromStr for ChunkKey {
    type Err = ChunkKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cx_s, cy_s) = s
            .split_once('|')
            .ok_or_else(|| ChunkKeyParseError(s.to_string()))?;
        let cx = cx_s.parse().map_err(|_| ChunkKeyParseError(s.to_string()))?;
        let cy = cy_s.parse().map_err(|_| ChunkKeyParseError(s.to_string()))?;
        Ok(ChunkKey { cx, cy })
    }
}

impl serde::Serialize for ChunkKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ChunkKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let key = ChunkKey::new(3, 7);
        let s = key.to_string();
        assert_eq!(s, "3|7");
        assert_eq!(s.parse::<ChunkKey>().unwrap(), key);
    }

    #[test]
    fn serializes_as_json_string() {
        let key = ChunkKey::new(0, 0);
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"0|0\"");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!("3".parse::<ChunkKey>().is_err());
        assert!("a|b".parse::<ChunkKey>().is_err());
    }
}
