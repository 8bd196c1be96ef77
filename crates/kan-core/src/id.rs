use std::sync::{Mutex, OnceLock};

use chrono::Utc;
use uuid::Uuid;

/// Epoch for ID tick encoding: 2026-01-01T00:00:00Z in unix millis.
const ID_EPOCH_MILLIS: i64 = 1_767_225_600_000;
/// One tick is 10 ms.
const TICK_MILLIS: i64 = 10;
/// Fixed width of the encoded tick, enough for centuries of 10 ms ticks.
const TICK_WIDTH: usize = 8;
/// Random tail length.
const TAIL_LEN: usize = 3;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Card,
    Board,
    Comment,
    Project,
}

impl Entity {
    /// Prefix is a human-recognition convenience only; IDs are opaque.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Card => "a_",
            Self::Board => "b_",
            Self::Comment => "c_",
            Self::Project => "p_",
        }
    }
}

/// Produces prefixed, time-ordered IDs: monotone non-decreasing within one
/// process, string-comparable (fixed-width base-36 tick), with a short
/// random tail against cross-process collisions.
pub struct IdGenerator {
    last_tick: Mutex<u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            last_tick: Mutex::new(0),
        }
    }

    pub fn generate(&self, entity: Entity) -> String {
        let elapsed = (Utc::now().timestamp_millis() - ID_EPOCH_MILLIS).max(0);
        let mut tick = (elapsed / TICK_MILLIS) as u64;

        let mut last = self
            .last_tick
            .lock()
            .expect("id generator mutex poisoned");
        if tick <= *last {
            tick = *last + 1;
        }
        *last = tick;
        drop(last);

        let mut id = String::with_capacity(2 + TICK_WIDTH + TAIL_LEN);
        id.push_str(entity.prefix());
        id.push_str(&encode_base36(tick, TICK_WIDTH));
        id.push_str(&random_tail(TAIL_LEN));
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide generator. Nothing outside this module may parse IDs.
pub fn generate_id(entity: Entity) -> String {
    static GENERATOR: OnceLock<IdGenerator> = OnceLock::new();
    GENERATOR.get_or_init(IdGenerator::new).generate(entity)
}

fn encode_base36(mut value: u64, width: usize) -> String {
    let mut buf = vec![b'0'; width];
    let mut i = width;
    while value > 0 && i > 0 {
        i -= 1;
        buf[i] = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8(buf).expect("base36 output is ascii")
}

fn random_tail(len: usize) -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    bytes
        .iter()
        .take(len)
        .map(|b| ALPHABET[(*b % 36) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert!(generate_id(Entity::Card).starts_with("a_"));
        assert!(generate_id(Entity::Board).starts_with("b_"));
        assert!(generate_id(Entity::Comment).starts_with("c_"));
        assert!(generate_id(Entity::Project).starts_with("p_"));
    }

    #[test]
    fn test_fixed_length() {
        let id = generate_id(Entity::Card);
        assert_eq!(id.len(), 2 + 8 + 3);
    }

    #[test]
    fn test_monotone_and_unique() {
        let gen = IdGenerator::new();
        let ids: Vec<String> = (0..1000).map(|_| gen.generate(Entity::Card)).collect();
        for pair in ids.windows(2) {
            // String comparison must agree with issuance order.
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_encode_base36_width_and_order() {
        assert_eq!(encode_base36(0, 8), "00000000");
        assert_eq!(encode_base36(35, 8), "0000000z");
        assert_eq!(encode_base36(36, 8), "00000010");
        assert!(encode_base36(100, 8) < encode_base36(101, 8));
    }
}
