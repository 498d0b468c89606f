use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Cursor helpers: encode/decode a (created_at, id) tuple into a base64 string.
/// Format used internally: "{created_at_rfc3339}|{uuid}" then base64 encoded.

pub fn encode(created_at: DateTime<Utc>, id: Uuid) -> String {
    let s = format!("{}|{}", created_at.to_rfc3339(), id);
    STANDARD.encode(s)
}

pub fn decode(cursor: &str) -> Result<(DateTime<Utc>, Uuid), String> {
    let decoded = STANDARD
        .decode(cursor)
        .map_err(|e| format!("base64 decode error: {}", e))?;
    let s = String::from_utf8(decoded).map_err(|e| format!("utf8 error: {}", e))?;
    let mut parts = s.splitn(2, '|');
    let ts_str = parts
        .next()
        .ok_or_else(|| "missing timestamp in cursor".to_string())?;
    let id_str = parts
        .next()
        .ok_or_else(|| "missing id in cursor".to_string())?;
    let ts = DateTime::parse_from_rfc3339(ts_str)
        .map_err(|e| format!("timestamp parse error: {}", e))?
        .with_timezone(&Utc);
    let id = Uuid::parse_str(id_str).map_err(|e| format!("uuid parse error: {}", e))?;
    Ok((ts, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let ts = Utc::now();
        let id = Uuid::new_v4();
        let (decoded_ts, decoded_id) = decode(&encode(ts, id)).unwrap();
        assert_eq!(decoded_ts, ts);
        assert_eq!(decoded_id, id);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not-base64!!").is_err());
        assert!(decode(&STANDARD.encode("no separator")).is_err());
        assert!(decode(&STANDARD.encode("2024-01-01T00:00:00Z|not-a-uuid")).is_err());
    }
}
