use std::collections::BTreeMap;

use pgrule_core::{PolicyError, Result};

/// Policy engine side of the adapter contract.
///
/// Loaders hand each decoded line to `load_rule`; `save_policy` reads rules
/// back out per section.
pub trait PolicyModel: Send + Sync {
    /// Ingests one line `[ptype, v0, ...]`. Returns `false` when the rule was already present.
    fn load_rule(&mut self, line: Vec<String>) -> Result<bool>;

    /// Every `(ptype, fields)` pair held in section `sec` (`"p"` or `"g"`).
    fn section_rules(&self, sec: &str) -> Vec<(String, Vec<String>)>;
}

/// Section a rule type belongs to: its first character (`p2` -> `p`).
pub fn section_of(ptype: &str) -> Option<&str> {
    let first = ptype.chars().next()?;
    Some(&ptype[..first.len_utf8()])
}

type Section = BTreeMap<String, Vec<Vec<String>>>;

/// In-process rule set keyed by section and rule type, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryModel {
    sections: BTreeMap<String, Section>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule to `sec`/`ptype`; returns `false` for a duplicate.
    pub fn add_rule(&mut self, sec: &str, ptype: &str, fields: Vec<String>) -> bool {
        let rules = self
            .sections
            .entry(sec.to_string())
            .or_default()
            .entry(ptype.to_string())
            .or_default();
        if rules.contains(&fields) {
            return false;
        }
        rules.push(fields);
        true
    }

    /// Rules stored under a rule type, in insertion order.
    pub fn rules(&self, ptype: &str) -> &[Vec<String>] {
        section_of(ptype)
            .and_then(|sec| self.sections.get(sec))
            .and_then(|section| section.get(ptype))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_rule<S: AsRef<str>>(&self, ptype: &str, fields: &[S]) -> bool {
        self.rules(ptype).iter().any(|rule| {
            rule.len() == fields.len()
                && rule.iter().zip(fields).all(|(held, given)| held == given.as_ref())
        })
    }

    pub fn len(&self) -> usize {
        self.sections
            .values()
            .flat_map(|section| section.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }
}

impl PolicyModel for MemoryModel {
    fn load_rule(&mut self, mut line: Vec<String>) -> Result<bool> {
        if line.is_empty() {
            return Err(PolicyError::Model("empty rule line".into()));
        }
        let fields = line.split_off(1);
        let ptype = line.remove(0);
        let sec = section_of(&ptype)
            .ok_or_else(|| PolicyError::Model("empty rule type".into()))?
            .to_string();
        Ok(self.add_rule(&sec, &ptype, fields))
    }

    fn section_rules(&self, sec: &str) -> Vec<(String, Vec<String>)> {
        self.sections
            .get(sec)
            .map(|section| {
                section
                    .iter()
                    .flat_map(|(ptype, rules)| {
                        rules.iter().map(move |rule| (ptype.clone(), rule.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
