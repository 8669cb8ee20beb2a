//! Change detection for rule definitions.
//!
//! A [`Fingerprint`] covers every field that changes what a rule evaluates
//! or how its results are labelled. Object revision, modification time and
//! the pause flag are deliberately left out, so re-saving an unchanged rule
//! or pausing it never looks like a definition change.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::rule::RuleSnapshot;

/// Opaque comparable digest of a rule definition plus its folder title.
///
/// [`Fingerprint::ZERO`] is reserved for "never evaluated"; [`fingerprint`]
/// never returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const ZERO: Fingerprint = Fingerprint(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Compute the fingerprint of `rule` as seen in folder `folder_title`.
pub fn fingerprint(rule: &RuleSnapshot, folder_title: &str) -> Fingerprint {
    let mut w = FieldWriter(Sha256::new());

    w.str(folder_title);
    w.i64(rule.org_id);
    w.str(&rule.uid);
    w.str(&rule.title);
    w.str(&rule.namespace_uid);
    w.str(&rule.rule_group);
    w.i64(rule.interval_seconds);

    w.str(&rule.condition.ref_id);
    w.u64(rule.condition.queries.len() as u64);
    for query in &rule.condition.queries {
        w.str(&query.ref_id);
        w.str(&query.query_type);
        w.str(&query.datasource_uid);
        w.duration(query.relative_range.0);
        w.duration(query.relative_range.1);
        w.json(&query.model);
    }

    w.str(rule.no_data_state.as_str());
    w.str(rule.exec_err_state.as_str());
    w.duration(rule.for_duration);
    w.map(&rule.labels);
    w.map(&rule.annotations);

    let digest = w.0.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    match u64::from_be_bytes(head) {
        0 => Fingerprint(1),
        v => Fingerprint(v),
    }
}

/// Length-prefixed field encoder so that adjacent fields cannot bleed into
/// each other (`"ab" + "c"` vs `"a" + "bc"`).
struct FieldWriter(Sha256);

impl FieldWriter {
    fn bytes(&mut self, b: &[u8]) {
        self.0.update((b.len() as u64).to_be_bytes());
        self.0.update(b);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.0.update(v.to_be_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.0.update(v.to_be_bytes());
    }

    fn duration(&mut self, d: Duration) {
        self.u64(d.as_secs());
        self.u64(u64::from(d.subsec_nanos()));
    }

    /// Walks the value with object keys sorted, so the digest does not
    /// depend on how the map type orders its entries.
    fn json(&mut self, v: &Value) {
        match v {
            Value::Null => self.tag(b'n'),
            Value::Bool(b) => {
                self.tag(b'b');
                self.u64(u64::from(*b));
            }
            Value::Number(n) => {
                self.tag(b'#');
                self.str(&n.to_string());
            }
            Value::String(s) => {
                self.tag(b's');
                self.str(s);
            }
            Value::Array(items) => {
                self.tag(b'a');
                self.u64(items.len() as u64);
                for item in items {
                    self.json(item);
                }
            }
            Value::Object(fields) => {
                self.tag(b'o');
                self.u64(fields.len() as u64);
                let mut entries: Vec<_> = fields.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
                for (k, v) in entries {
                    self.str(k);
                    self.json(v);
                }
            }
        }
    }

    fn tag(&mut self, t: u8) {
        self.0.update([t]);
    }

    fn map(&mut self, m: &BTreeMap<String, String>) {
        self.u64(m.len() as u64);
        for (k, v) in m {
            self.str(k);
            self.str(v);
        }
    }
}
