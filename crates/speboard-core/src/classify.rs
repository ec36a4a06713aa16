//! Ordered keyword rule tables
//!
//! Every text heuristic in speboard (root cause, phase, status keywords,
//! responsibility) is an ordered list of `(keywords, outcome)` rules matched
//! as lower-case substrings. The first rule with a matching keyword wins, so
//! precedence is exactly the table order.
//!
//! ```rust
//! use speboard_core::classify::{classify_root_cause, RootCause};
//!
//! // "assinatura" (Documentation) is checked before "cliente" (Client)
//! assert_eq!(
//!     classify_root_cause("Aguardando assinatura do cliente"),
//!     RootCause::Documentation
//! );
//! ```

use serde::{Deserialize, Serialize};

use crate::{MilestoneStatus, Timestamp};

/// One entry of an ordered rule table
#[derive(Clone, Copy, Debug)]
pub struct Rule<T: 'static> {
    /// Lower-case substrings, any of which selects `outcome`
    pub keywords: &'static [&'static str],
    pub outcome: T,
}

impl<T: Copy> Rule<T> {
    pub const fn new(keywords: &'static [&'static str], outcome: T) -> Self {
        Self { keywords, outcome }
    }

    /// Whether any keyword occurs in already lower-cased text
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// Evaluate a rule table against free text; first matching rule wins
pub fn first_match<T: Copy>(rules: &[Rule<T>], text: &str) -> Option<T> {
    let lowered = text.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.outcome)
}

// ============================================================================
// Root cause
// ============================================================================

/// Coarse category explaining why a task is delayed or blocked
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    Documentation,
    AccessSystem,
    TechnicalError,
    Client,
    Other,
}

impl RootCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCause::Documentation => "Documentation",
            RootCause::AccessSystem => "Access/System",
            RootCause::TechnicalError => "Technical Error",
            RootCause::Client => "Client",
            RootCause::Other => "Other",
        }
    }

    /// Portuguese display label
    pub fn label(&self) -> &'static str {
        match self {
            RootCause::Documentation => "Documentação",
            RootCause::AccessSystem => "Acesso/Sistema",
            RootCause::TechnicalError => "Erro Técnico",
            RootCause::Client => "Cliente",
            RootCause::Other => "Outros",
        }
    }
}

impl std::fmt::Display for RootCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const ROOT_CAUSE_RULES: &[Rule<RootCause>] = &[
    Rule::new(
        &["doc", "assinatura", "assinar", "contrato", "certid", "signature"],
        RootCause::Documentation,
    ),
    Rule::new(
        &["acesso", "login", "senha", "sistema", "access", "password"],
        RootCause::AccessSystem,
    ),
    Rule::new(&["erro", "bug", "falha", "error"], RootCause::TechnicalError),
    Rule::new(&["aguardando", "cliente", "client", "waiting"], RootCause::Client),
];

/// Classify a task comment; no match yields `Other`
pub fn classify_root_cause(comment: &str) -> RootCause {
    first_match(ROOT_CAUSE_RULES, comment).unwrap_or(RootCause::Other)
}

// ============================================================================
// Milestones
// ============================================================================

/// Completed if a completion date is set, else Delayed once the deadline
/// has passed, else Pending
pub fn classify_milestone(
    completed_date: Option<Timestamp>,
    deadline: Option<Timestamp>,
    now: Timestamp,
) -> MilestoneStatus {
    if completed_date.is_some() {
        return MilestoneStatus::Completed;
    }
    match deadline {
        Some(deadline) if now > deadline => MilestoneStatus::Delayed,
        _ => MilestoneStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn signature_wins_over_client() {
        assert_eq!(
            classify_root_cause("Aguardando assinatura do cliente"),
            RootCause::Documentation
        );
    }

    #[test]
    fn root_cause_is_case_insensitive() {
        assert_eq!(classify_root_cause("LOGIN expirado"), RootCause::AccessSystem);
        assert_eq!(classify_root_cause("Falha na integração"), RootCause::TechnicalError);
        assert_eq!(classify_root_cause("Aguardando retorno"), RootCause::Client);
    }

    #[test]
    fn access_wins_over_error() {
        assert_eq!(classify_root_cause("erro de acesso ao portal"), RootCause::AccessSystem);
    }

    #[test]
    fn unmatched_comment_is_other() {
        assert_eq!(classify_root_cause(""), RootCause::Other);
        assert_eq!(classify_root_cause("sem novidades"), RootCause::Other);
    }

    #[test]
    fn milestone_states() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let yesterday = now - Duration::days(1);
        let tomorrow = now + Duration::days(1);

        assert_eq!(classify_milestone(None, Some(yesterday), now), MilestoneStatus::Delayed);
        assert_eq!(classify_milestone(None, Some(tomorrow), now), MilestoneStatus::Pending);
        assert_eq!(classify_milestone(None, None, now), MilestoneStatus::Pending);
        assert_eq!(
            classify_milestone(Some(now), Some(yesterday), now),
            MilestoneStatus::Completed
        );
        // Deadline exactly now has not passed yet
        assert_eq!(classify_milestone(None, Some(now), now), MilestoneStatus::Pending);
    }

    #[test]
    fn first_match_respects_table_order() {
        const RULES: &[Rule<u8>] = &[Rule::new(&["ab"], 1), Rule::new(&["a"], 2)];
        assert_eq!(first_match(RULES, "xAByz"), Some(1));
        assert_eq!(first_match(RULES, "xa"), Some(2));
        assert_eq!(first_match(RULES, "zzz"), None);
    }
}
