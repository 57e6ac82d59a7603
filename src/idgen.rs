//! Monotonic id generator used for both LSNs and transaction ids (spec
//! calls both out as "int64 counter"). Grounded on the teacher's atomic
//! connection counter in `network/server.rs`.

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: AtomicI64::new(1) }
    }

    /// Restores the generator so the next id issued is `> last_seen`.
    pub fn restore(&self, last_seen: i64) {
        let mut current = self.next.load(Ordering::SeqCst);
        while last_seen + 1 > current {
            match self.next.compare_exchange_weak(
                current,
                last_seen + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotone() {
        let gen = IdGenerator::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert!(a < b);
    }

    #[test]
    fn restore_advances_past_last_seen() {
        let gen = IdGenerator::new();
        gen.restore(100);
        assert!(gen.next_id() > 100);
    }
}
