//! Per-session conversation history.
//!
//! Keeps the last `max_history` exchanges (user + assistant pairs) of each
//! session in memory, for at most `max_sessions` sessions. Past that the
//! least recently used session is dropped. Sessions are not persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Default cap on live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

struct Session {
    messages: Vec<Message>,
    last_used: u64,
}

pub struct SessionManager {
    max_history: usize,
    max_sessions: usize,
    counter: AtomicU64,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    clock: u64,
    sessions: HashMap<String, Session>,
}

impl SessionState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Get or create `id`, evicting the least recently used session when full.
    fn touch(&mut self, id: &str, max_sessions: usize) -> &mut Session {
        let now = self.tick();
        if !self.sessions.contains_key(id) {
            while self.sessions.len() >= max_sessions.max(1) {
                let Some(oldest) = self
                    .sessions
                    .iter()
                    .min_by_key(|(_, s)| s.last_used)
                    .map(|(k, _)| k.clone())
                else {
                    break;
                };
                tracing::debug!(session = %oldest, "evicting least recently used session");
                self.sessions.remove(&oldest);
            }
        }
        let session = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| Session {
                messages: Vec::new(),
                last_used: now,
            });
        session.last_used = now;
        session
    }
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self::with_capacity(max_history, DEFAULT_MAX_SESSIONS)
    }

    /// At most `max_sessions` sessions are kept.
    pub fn with_capacity(max_history: usize, max_sessions: usize) -> Self {
        Self {
            max_history,
            max_sessions,
            counter: AtomicU64::new(0),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Start a new, empty session and return its id.
    pub fn create_session(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("session_{}", n);
        self.state.lock().unwrap().touch(&id, self.max_sessions);
        id
    }

    /// Record one question and answer, trimming to the newest exchanges.
    pub fn add_exchange(&self, session_id: &str, question: &str, answer: &str) {
        let mut state = self.state.lock().unwrap();
        let messages = &mut state.touch(session_id, self.max_sessions).messages;
        messages.push(Message {
            role: Role::User,
            content: question.to_string(),
        });
        messages.push(Message {
            role: Role::Assistant,
            content: answer.to_string(),
        });
        let keep = self.max_history * 2;
        if messages.len() > keep {
            let excess = messages.len() - keep;
            messages.drain(..excess);
        }
    }

    /// History as `User: ...` / `Assistant: ...` lines, or `None` if empty.
    pub fn history(&self, session_id: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        let session = state.sessions.get_mut(session_id)?;
        session.last_used = now;
        if session.messages.is_empty() {
            return None;
        }
        Some(
            session
                .messages
                .iter()
                .map(|m| format!("{}: {}", m.role.label(), m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    pub fn clear_session(&self, session_id: &str) {
        if let Some(session) = self.state.lock().unwrap().sessions.get_mut(session_id) {
            session.messages.clear();
        }
    }

    /// Number of sessions currently held.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_sequential() {
        let sm = SessionManager::new(2);
        assert_eq!(sm.create_session(), "session_1");
        assert_eq!(sm.create_session(), "session_2");
    }

    #[test]
    fn history_keeps_newest_exchanges() {
        let sm = SessionManager::new(2);
        let id = sm.create_session();
        assert_eq!(sm.history(&id), None);

        sm.add_exchange(&id, "q1", "a1");
        sm.add_exchange(&id, "q2", "a2");
        sm.add_exchange(&id, "q3", "a3");

        assert_eq!(
            sm.history(&id).as_deref(),
            Some("User: q2\nAssistant: a2\nUser: q3\nAssistant: a3")
        );
    }

    #[test]
    fn unknown_session_is_created_on_write() {
        let sm = SessionManager::new(1);
        assert_eq!(sm.history("custom"), None);
        sm.add_exchange("custom", "q", "a");
        assert_eq!(sm.history("custom").as_deref(), Some("User: q\nAssistant: a"));
        sm.clear_session("custom");
        assert_eq!(sm.history("custom"), None);
    }

    #[test]
    fn zero_history_keeps_nothing() {
        let sm = SessionManager::new(0);
        sm.add_exchange("s", "q", "a");
        assert_eq!(sm.history("s"), None);
    }

    #[test]
    fn least_recently_used_session_is_evicted() {
        let sm = SessionManager::with_capacity(2, 2);
        let a = sm.create_session();
        let b = sm.create_session();
        sm.add_exchange(&a, "qa", "aa");
        sm.add_exchange(&b, "qb", "ab");

        // b was used last, so a goes
        sm.add_exchange(&b, "qb2", "ab2");
        let c = sm.create_session();

        assert_eq!(sm.len(), 2);
        assert_eq!(sm.history(&a), None);
        assert!(sm.history(&b).is_some());
        sm.add_exchange(&c, "qc", "ac");
        assert!(sm.history(&c).is_some());
    }

    #[test]
    fn client_supplied_ids_are_bounded() {
        let sm = SessionManager::with_capacity(1, 3);
        for i in 0..50 {
            sm.add_exchange(&format!("client-{}", i), "q", "a");
        }
        assert_eq!(sm.len(), 3);
        assert!(sm.history("client-49").is_some());
        assert_eq!(sm.history("client-0"), None);
    }
}
