//! # Group Policy Objects
//!
//! A [`Gpo`] is an ordered bag of [`Entry`] values grouped by policy domain,
//! as delivered by the directory client. The merge engine treats it as
//! immutable input.
//!
//! ## Report Format
//!
//! [`Gpo::format`] renders one GPO of a precedence chain:
//!
//! ```text
//! * Default Domain Policy ({31B2F340-016D-11D2-945F-00C04FB984F9})
//! ** dconf:
//! *** org/gnome/desktop/background/picture-uri: file:///corp.png
//! ***+ org/gnome/shell/favorite-apps: firefox.desktop
//! ***- org/gnome/desktop/interface/clock-format: 12h
//! ```
//!
//! No marker: the rule is effective. `+`: an append contribution merged into
//! a closer value. `-`: overridden by a closer GPO (only shown on request).

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use crate::entry::{Entry, Strategy};

/// A single GPO: identity plus its rules keyed by domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gpo {
    /// Directory-assigned unique identifier.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Rules per domain, in GPO order within each domain.
    #[serde(default)]
    pub rules: BTreeMap<String, Vec<Entry>>,
}

/// `(domain, key)` pairs already rendered by closer GPOs.
///
/// The strategy recorded per pair is the one of the closest effective rule:
/// `Append` while the chain is still open to farther contributions,
/// `Override` once it is closed.
#[derive(Debug, Clone, Default)]
pub struct SeenRules {
    rules: HashMap<(String, String), Strategy>,
}

impl SeenRules {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a closer GPO already rendered `(domain, key)`.
    pub fn contains(&self, domain: &str, key: &str) -> bool {
        self.rules
            .contains_key(&(domain.to_string(), key.to_string()))
    }

    /// Number of distinct `(domain, key)` pairs seen.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether nothing has been rendered yet.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// How a rule relates to the closer GPOs of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleStatus {
    Effective,
    Appended,
    Overridden,
}

impl RuleStatus {
    fn marker(&self) -> &'static str {
        match self {
            Self::Effective => "",
            Self::Appended => "+",
            Self::Overridden => "-",
        }
    }
}

impl Gpo {
    /// Create a GPO with no rules.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rules: BTreeMap::new(),
        }
    }

    /// Append `entries` to the rules of `domain`.
    pub fn with_rules(mut self, domain: impl Into<String>, entries: Vec<Entry>) -> Self {
        self.rules.entry(domain.into()).or_default().extend(entries);
        self
    }

    /// Render this GPO into `w`.
    ///
    /// GPOs must be formatted closest-first, threading the same `seen` set
    /// through each call so that farther rules are classified against the
    /// closer ones. With `with_rules == false` only the header line is
    /// written and `seen` is left untouched.
    pub fn format<W: Write>(
        &self,
        w: &mut W,
        with_rules: bool,
        with_overridden: bool,
        seen: &mut SeenRules,
    ) -> fmt::Result {
        writeln!(w, "* {} ({})", self.name, self.id)?;
        if !with_rules {
            return Ok(());
        }

        for (domain, entries) in &self.rules {
            writeln!(w, "** {domain}:")?;
            for e in entries {
                let status = classify(seen, domain, e);
                if status == RuleStatus::Overridden && !with_overridden {
                    continue;
                }
                write!(w, "***{} {}: ", status.marker(), e.key)?;
                if e.disabled {
                    writeln!(w, "[disabled]")?;
                    continue;
                }
                let mut lines = e.value.split('\n');
                writeln!(w, "{}", lines.next().unwrap_or_default())?;
                for line in lines {
                    writeln!(w, "    {line}")?;
                }
            }
        }
        Ok(())
    }
}

/// Classify `e` against closer rules and record it, mirroring the merge
/// engine: disabled append entries never take part.
fn classify(seen: &mut SeenRules, domain: &str, e: &Entry) -> RuleStatus {
    let contributes = !(e.strategy == Strategy::Append && e.disabled);
    let slot = (domain.to_string(), e.key.clone());
    match seen.rules.get(&slot) {
        _ if !contributes => RuleStatus::Overridden,
        None => {
            seen.rules.insert(slot, e.strategy);
            RuleStatus::Effective
        }
        Some(Strategy::Append) if e.strategy == Strategy::Append => RuleStatus::Appended,
        Some(_) => RuleStatus::Overridden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(gpos: &[Gpo], with_overridden: bool) -> String {
        let mut out = String::new();
        let mut seen = SeenRules::new();
        for g in gpos {
            g.format(&mut out, true, with_overridden, &mut seen).unwrap();
        }
        out
    }

    #[test]
    fn header_only_without_rules() {
        let g = Gpo::new("{A}", "Closest").with_rules("dconf", vec![Entry::new("k", "v")]);
        let mut out = String::new();
        let mut seen = SeenRules::new();
        g.format(&mut out, false, false, &mut seen).unwrap();
        assert_eq!(out, "* Closest ({A})\n");
        assert!(seen.is_empty());
    }

    #[test]
    fn effective_rules_sorted_by_domain() {
        let g = Gpo::new("{A}", "GPO A")
            .with_rules("privilege", vec![Entry::new("allow-local-admins", "true")])
            .with_rules("dconf", vec![Entry::new("a/b", "1")]);
        assert_eq!(
            render(&[g], false),
            "* GPO A ({A})\n\
             ** dconf:\n\
             *** a/b: 1\n\
             ** privilege:\n\
             *** allow-local-admins: true\n"
        );
    }

    #[test]
    fn overridden_rules_hidden_unless_requested() {
        let closer = Gpo::new("{A}", "A").with_rules("dconf", vec![Entry::new("k", "near")]);
        let farther = Gpo::new("{B}", "B").with_rules("dconf", vec![Entry::new("k", "far")]);
        let gpos = [closer, farther];

        let hidden = render(&gpos, false);
        assert!(!hidden.contains("far"));

        let shown = render(&gpos, true);
        assert!(shown.contains("***- k: far\n"));
        assert!(shown.contains("*** k: near\n"));
    }

    #[test]
    fn append_contributions_are_marked() {
        let closer = Gpo::new("{A}", "A").with_rules(
            "dconf",
            vec![Entry::new("apps", "x").with_strategy(Strategy::Append)],
        );
        let farther = Gpo::new("{B}", "B").with_rules(
            "dconf",
            vec![Entry::new("apps", "y").with_strategy(Strategy::Append)],
        );
        let out = render(&[closer, farther], false);
        assert!(out.contains("*** apps: x\n"));
        assert!(out.contains("***+ apps: y\n"));
    }

    #[test]
    fn override_closes_append_chain_in_report() {
        let closer = Gpo::new("{A}", "A").with_rules("dconf", vec![Entry::new("apps", "x")]);
        let farther = Gpo::new("{B}", "B").with_rules(
            "dconf",
            vec![Entry::new("apps", "y").with_strategy(Strategy::Append)],
        );
        let out = render(&[closer, farther], true);
        assert!(out.contains("***- apps: y\n"));
    }

    #[test]
    fn disabled_and_multiline_values() {
        let g = Gpo::new("{A}", "A").with_rules(
            "dconf",
            vec![
                Entry::new("off", "ignored").disabled(),
                Entry::new("list", "one\ntwo"),
            ],
        );
        let out = render(&[g], false);
        assert!(out.contains("*** off: [disabled]\n"));
        assert!(out.contains("*** list: one\n    two\n"));
    }

    #[test]
    fn seen_rules_shared_across_calls() {
        let g = Gpo::new("{A}", "A").with_rules("dconf", vec![Entry::new("k", "v")]);
        let mut seen = SeenRules::new();
        let mut out = String::new();
        g.format(&mut out, true, false, &mut seen).unwrap();
        assert!(seen.contains("dconf", "k"));
        assert!(!seen.contains("privilege", "k"));
        assert_eq!(seen.len(), 1);
    }
}
