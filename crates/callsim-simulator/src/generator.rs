//! Synthetic record generation.
//!
//! Randomized fields go through an explicit `Rng` so property tests can
//! drive the generators with a seeded source.

use std::sync::Arc;

use callsim_core::{CallId, CallIdentity, Cdr, Clock};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::config::AccountProfile;

/// Prefix of every generated call identifier.
pub const CALL_ID_PREFIX: &str = "NM";

/// Mobile prefixes phone numbers are drawn from.
pub const MOBILE_PREFIXES: [&str; 9] = ["131", "132", "133", "134", "135", "136", "137", "138", "139"];

/// Longest generated call, in seconds.
pub const MAX_CALL_DURATION_SECS: i64 = 600;

const MAX_SETUP_SECS: i64 = 15;
const MAX_SLACK_SECS: i64 = 3600;

/// Builds a call identifier: prefix, millisecond timestamp, 8 random hex
/// characters.
pub fn generate_call_id(now: DateTime<Utc>) -> CallId {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    CallId::new(format!("{CALL_ID_PREFIX}{}{suffix}", now.format("%Y%m%d%H%M%S%3f")))
}

/// Builds an 11-digit mobile number from a known prefix.
pub fn generate_phone_number<R: Rng>(rng: &mut R) -> String {
    let prefix = MOBILE_PREFIXES[rng.random_range(0..MOBILE_PREFIXES.len())];
    format!("{prefix}{:08}", rng.random_range(0..100_000_000_u32))
}

/// Builds a CDR for a call that ended some time before `now`.
///
/// The call began `slack + setup + duration` seconds ago; the callee rang
/// during setup, answered at `start_time` and hung up at `end_time`.
pub fn generate_cdr<R: Rng>(
    rng: &mut R,
    account: &AccountProfile,
    now: DateTime<Utc>,
) -> Cdr {
    let duration = rng.random_range(0..=MAX_CALL_DURATION_SECS);
    let setup = rng.random_range(1..=MAX_SETUP_SECS);
    let slack = rng.random_range(0..=MAX_SLACK_SECS);
    let ring_offset = rng.random_range(0..=setup);

    let begin = now - Duration::seconds(slack + setup + duration);
    let ring = begin + Duration::seconds(ring_offset);
    let start = begin + Duration::seconds(setup);
    let end = start + Duration::seconds(duration);

    Cdr {
        account_id: account.account_id.clone(),
        call_id: generate_call_id(now),
        service_type: account.service_type,
        sub_service_type: 0,
        number_pool_no: String::new(),
        caller: generate_phone_number(rng),
        caller_country_iso_code: String::new(),
        caller_province_code: String::new(),
        caller_city_code: String::new(),
        callee: generate_phone_number(rng),
        callee_country_iso_code: String::new(),
        callee_province_code: String::new(),
        callee_city_code: String::new(),
        begin_call_time: begin.timestamp_millis(),
        ring_time: ring.timestamp_millis(),
        start_time: start.timestamp_millis(),
        end_time: end.timestamp_millis(),
        release_type: 0,
        call_duration: duration,
        call_result: 1,
        audio_record_flag: 0,
        cdr_create_time: now.timestamp_millis(),
        subscription_id: String::new(),
        phone_no_x: String::new(),
        phone_no_a: String::new(),
        phone_no_b: String::new(),
        secret_call_type: 0,
        message_type: 1,
        call_display_type: 0,
        cdr_type: 1,
        user_data: format!(
            "{{\"simulateTime\":\"{}\"}}",
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
    }
}

/// Record factory bound to an account and a clock.
#[derive(Debug, Clone)]
pub struct RecordGenerator {
    account: AccountProfile,
    clock: Arc<dyn Clock>,
}

impl RecordGenerator {
    /// Creates a generator for `account`.
    pub fn new(account: AccountProfile, clock: Arc<dyn Clock>) -> Self {
        Self { account, clock }
    }

    /// Account records are attributed to.
    pub fn account(&self) -> &AccountProfile {
        &self.account
    }

    /// Fresh call identifier stamped with the current time.
    pub fn call_id(&self) -> CallId {
        generate_call_id(self.clock.now_utc())
    }

    /// Random mobile number.
    pub fn phone_number(&self) -> String {
        generate_phone_number(&mut rand::rng())
    }

    /// CDR for a call that ended before now.
    pub fn cdr(&self) -> Cdr {
        generate_cdr(&mut rand::rng(), &self.account, self.clock.now_utc())
    }

    /// Identity for a new simulated call.
    pub fn call_identity(&self) -> CallIdentity {
        let mut rng = rand::rng();
        CallIdentity {
            id: self.call_id(),
            account_id: self.account.account_id.clone(),
            service_type: self.account.service_type,
            caller: generate_phone_number(&mut rng),
            callee: generate_phone_number(&mut rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn account() -> AccountProfile {
        AccountProfile { account_id: "acct-1".to_string(), service_type: 7 }
    }

    #[test]
    fn call_id_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap() + Duration::milliseconds(45);
        let id = generate_call_id(now);

        let text = id.as_str();
        assert!(text.starts_with("NM20240309080706045"), "unexpected id {text}");
        assert_eq!(text.len(), 2 + 17 + 8);
        assert!(text[19..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn call_ids_differ_within_the_same_millisecond() {
        let now = Utc::now();
        assert_ne!(generate_call_id(now), generate_call_id(now));
    }

    #[test]
    fn phone_numbers_use_mobile_prefixes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let number = generate_phone_number(&mut rng);
            assert_eq!(number.len(), 11);
            assert!(number.chars().all(|c| c.is_ascii_digit()));
            assert!(MOBILE_PREFIXES.contains(&&number[..3]));
        }
    }

    #[test]
    fn cdr_carries_account_and_fixed_codes() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cdr = generate_cdr(&mut StdRng::seed_from_u64(1), &account(), now);

        assert_eq!(cdr.account_id, "acct-1");
        assert_eq!(cdr.service_type, 7);
        assert_eq!(cdr.call_result, 1);
        assert_eq!(cdr.cdr_type, 1);
        assert_eq!(cdr.cdr_create_time, now.timestamp_millis());
        assert_eq!(cdr.user_data, r#"{"simulateTime":"2024-01-01T00:00:00Z"}"#);
    }
}
