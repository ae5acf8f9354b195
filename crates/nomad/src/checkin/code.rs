// Check-in code generation.
//
// Codes are six decimal digits. Uniqueness is only required among live
// tokens, so a code held by an expired token is reclaimed on the spot.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::Rng;

use nomad_core::error::{ErrorCode, Result};

use crate::internal_adapter::InternalAdapter;

/// Supplies candidate codes. Candidates may collide; the caller checks.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> u32;
}

/// Uniform draws over an inclusive range.
#[derive(Debug, Clone)]
pub struct RandomCodeSource {
    min: u32,
    max: u32,
}

impl RandomCodeSource {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min: min.min(max), max: max.max(min) }
    }
}

impl CodeSource for RandomCodeSource {
    fn next_code(&self) -> u32 {
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

/// Replays a fixed sequence, then repeats the last value.
#[derive(Debug)]
pub struct ScriptedCodeSource {
    queue: Mutex<VecDeque<u32>>,
    last: Mutex<u32>,
}

impl ScriptedCodeSource {
    pub fn new(codes: impl IntoIterator<Item = u32>) -> Self {
        let queue: VecDeque<u32> = codes.into_iter().collect();
        let first = queue.front().copied().unwrap_or(100_000);
        Self { queue: Mutex::new(queue), last: Mutex::new(first) }
    }
}

impl CodeSource for ScriptedCodeSource {
    fn next_code(&self) -> u32 {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(code) = queue.pop_front() {
            *last = code;
        }
        *last
    }
}

pub fn format_code(code: u32) -> String {
    format!("{code:06}")
}

/// Normalize user input to a six-digit code, or `None` if malformed.
pub fn parse_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (trimmed.len() == 6 && trimmed.bytes().all(|b| b.is_ascii_digit())).then(|| trimmed.to_string())
}

/// Draw until a code not held by any live token turns up.
///
/// Must run inside the issuing transaction so the check and the insert
/// that follows are not interleaved with another issuance.
pub(crate) async fn generate_code(
    store: InternalAdapter<'_>,
    source: &dyn CodeSource,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<String> {
    for attempt in 1..=max_attempts.max(1) {
        let code = format_code(source.next_code());
        match store.find_token_by_code(&code).await? {
            None => return Ok(code),
            Some(held) if held.is_expired(now) => {
                store.delete_token(&held.id).await?;
                tracing::debug!(code = %code, "reclaimed code from expired token");
                return Ok(code);
            }
            Some(_) => {
                tracing::debug!(attempt, "check-in code collision, drawing again");
            }
        }
    }
    tracing::error!(max_attempts, "no free check-in code found");
    Err(ErrorCode::CodeSpaceExhausted.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use nomad_core::db::models::CheckInToken;
    use nomad_core::db::schema::NomadSchema;
    use nomad_memory::MemoryAdapter;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn token(id: &str, principal: &str, code: &str, expires_at: DateTime<Utc>) -> CheckInToken {
        CheckInToken {
            id: id.into(),
            principal_id: principal.into(),
            code: code.into(),
            created_at: expires_at - Duration::minutes(5),
            expires_at,
        }
    }

    #[test]
    fn test_random_codes_stay_in_range() {
        let source = RandomCodeSource::new(100_000, 999_999);
        for _ in 0..1000 {
            let code = source.next_code();
            assert!((100_000..=999_999).contains(&code));
            assert_eq!(format_code(code).len(), 6);
        }
    }

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code(" 123456 ").as_deref(), Some("123456"));
        assert!(parse_code("12345").is_none());
        assert!(parse_code("1234567").is_none());
        assert!(parse_code("12a456").is_none());
        assert!(parse_code("١٢٣٤٥٦").is_none());
    }

    #[test]
    fn test_scripted_source_repeats_last() {
        let source = ScriptedCodeSource::new([111_111, 222_222]);
        assert_eq!(source.next_code(), 111_111);
        assert_eq!(source.next_code(), 222_222);
        assert_eq!(source.next_code(), 222_222);
    }

    #[tokio::test]
    async fn test_collision_with_live_token_draws_again() {
        let db = MemoryAdapter::with_schema(&NomadSchema::default());
        let store = InternalAdapter::new(&db);
        store.create_token(&token("t1", "u1", "111111", now() + Duration::minutes(5))).await.unwrap();

        let source = ScriptedCodeSource::new([111_111, 222_222]);
        let code = generate_code(store, &source, now(), 8).await.unwrap();
        assert_eq!(code, "222222");
    }

    #[tokio::test]
    async fn test_expired_holder_is_reclaimed() {
        let db = MemoryAdapter::with_schema(&NomadSchema::default());
        let store = InternalAdapter::new(&db);
        store.create_token(&token("t1", "u1", "111111", now() - Duration::seconds(1))).await.unwrap();

        let source = ScriptedCodeSource::new([111_111]);
        let code = generate_code(store, &source, now(), 8).await.unwrap();
        assert_eq!(code, "111111");
        assert!(store.find_token_by_code("111111").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let db = MemoryAdapter::with_schema(&NomadSchema::default());
        let store = InternalAdapter::new(&db);
        store.create_token(&token("t1", "u1", "111111", now() + Duration::minutes(5))).await.unwrap();

        let source = ScriptedCodeSource::new([111_111]);
        let err = generate_code(store, &source, now(), 3).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CodeSpaceExhausted);
    }
}
