use crate::accumulator::UsageAccumulator;
use crate::error::EngineError;
use crate::models::{AppKey, ApplicationGroup, LimitKind, LimitRule, QuotaTarget};
use crate::validation::{validate_name, validate_threshold, validate_time_window};
use crate::{read_lock, write_lock};
use chrono::NaiveDateTime;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

/// Where the usage figures for an evaluation come from.
pub trait UsageSource {
    /// Current total for one tracked application.
    fn usage_of(&self, app: &AppKey) -> Duration;

    /// Summed current totals of every tracked application in `group`.
    fn usage_of_group(&self, group: &ApplicationGroup) -> Duration;
}

impl UsageSource for UsageAccumulator {
    fn usage_of(&self, app: &AppKey) -> Duration {
        self.current_total(app)
    }

    fn usage_of_group(&self, group: &ApplicationGroup) -> Duration {
        self.total_matching(|key| group.contains(key))
    }
}

/// A rule found exceeded during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breach {
    pub target: QuotaTarget,
    pub kind: &'static str,
    pub usage: Duration,
}

/// Outcome of checking every rule that applies to the focused application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// The application's own rule, if exceeded.
    pub application_breach: Option<Breach>,
    /// Rules of groups the application belongs to, if exceeded.
    pub group_breaches: Vec<Breach>,
    /// Time left under the application's own DAILY/WEEKLY rule. Only set
    /// while that rule is not exceeded and was not reset by this check.
    pub remaining: Option<Duration>,
}

impl Evaluation {
    pub fn is_exceeded(&self) -> bool {
        self.application_breach.is_some() || !self.group_breaches.is_empty()
    }

    /// All breaches, the application's own first.
    pub fn breaches(&self) -> impl Iterator<Item = &Breach> {
        self.application_breach.iter().chain(self.group_breaches.iter())
    }
}

/// One rule in a [`QuotaSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub target: QuotaTarget,
    pub rule: LimitRule,
}

/// Serializable copy of the whole store, for hosts that persist rule edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    #[serde(default)]
    pub groups: Vec<ApplicationGroup>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

#[derive(Default)]
pub struct QuotaStore {
    rules: RwLock<HashMap<QuotaTarget, LimitRule>>,
    groups: RwLock<BTreeMap<String, ApplicationGroup>>,
}

impl QuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `rule` to `target`, replacing any previous rule.
    /// Returns the replaced rule.
    pub fn set_limit(
        &self,
        target: QuotaTarget,
        rule: LimitRule,
    ) -> Result<Option<LimitRule>, EngineError> {
        let target = self.validate_target(target)?;
        validate_rule(&rule)?;

        info!("Setting {rule} on {target}");
        Ok(write_lock(&self.rules, "QuotaStore rules").insert(target, rule))
    }

    pub fn remove_limit(&self, target: &QuotaTarget) -> Option<LimitRule> {
        let removed = write_lock(&self.rules, "QuotaStore rules").remove(target);
        if removed.is_some() {
            info!("Removed limit on {target}");
        }
        removed
    }

    /// The rule stored under exactly `target`.
    pub fn limit(&self, target: &QuotaTarget) -> Option<LimitRule> {
        read_lock(&self.rules, "QuotaStore rules").get(target).cloned()
    }

    pub fn list_limits(&self) -> Vec<(QuotaTarget, LimitRule)> {
        let mut limits: Vec<(QuotaTarget, LimitRule)> = read_lock(&self.rules, "QuotaStore rules")
            .iter()
            .map(|(target, rule)| (target.clone(), rule.clone()))
            .collect();
        limits.sort_by(|a, b| a.0.cmp(&b.0));
        limits
    }

    pub fn create_group(&self, name: &str) -> Result<(), EngineError> {
        let name = validate_name("group_name", name)?;
        let mut groups = write_lock(&self.groups, "QuotaStore groups");
        if groups.contains_key(&name) {
            return Err(EngineError::AlreadyExists { name });
        }
        info!("Created group {name}");
        groups.insert(name.clone(), ApplicationGroup::new(name));
        Ok(())
    }

    /// Delete a group together with its rule.
    pub fn remove_group(&self, name: &str) -> Result<ApplicationGroup, EngineError> {
        let removed = write_lock(&self.groups, "QuotaStore groups")
            .remove(name.trim())
            .ok_or(EngineError::NotFound { entity: "Group" })?;

        write_lock(&self.rules, "QuotaStore rules")
            .remove(&QuotaTarget::Group(removed.name.clone()));
        info!("Removed group {}", removed.name);
        Ok(removed)
    }

    /// Returns false if the application was already a member.
    pub fn add_to_group(&self, name: &str, app: AppKey) -> Result<bool, EngineError> {
        let app = validate_app_key(app)?;
        let mut groups = write_lock(&self.groups, "QuotaStore groups");
        let group = groups
            .get_mut(name.trim())
            .ok_or(EngineError::NotFound { entity: "Group" })?;
        debug!("Adding {app} to group {}", group.name);
        Ok(group.add(app))
    }

    /// Returns false if the application was not a member.
    pub fn remove_from_group(&self, name: &str, app: &AppKey) -> Result<bool, EngineError> {
        let mut groups = write_lock(&self.groups, "QuotaStore groups");
        let group = groups
            .get_mut(name.trim())
            .ok_or(EngineError::NotFound { entity: "Group" })?;
        Ok(group.remove(app))
    }

    pub fn group(&self, name: &str) -> Option<ApplicationGroup> {
        read_lock(&self.groups, "QuotaStore groups")
            .get(name.trim())
            .cloned()
    }

    pub fn groups(&self) -> Vec<ApplicationGroup> {
        read_lock(&self.groups, "QuotaStore groups")
            .values()
            .cloned()
            .collect()
    }

    /// Groups with a member entry covering `app`.
    pub fn groups_containing(&self, app: &AppKey) -> Vec<ApplicationGroup> {
        read_lock(&self.groups, "QuotaStore groups")
            .values()
            .filter(|group| group.contains(app))
            .cloned()
            .collect()
    }

    /// The target whose rule applies to `app`: an exact match first, then a
    /// rule keyed on the bare name.
    fn application_target(
        rules: &HashMap<QuotaTarget, LimitRule>,
        app: &AppKey,
    ) -> Option<QuotaTarget> {
        let exact = QuotaTarget::Application(app.clone());
        if rules.contains_key(&exact) {
            return Some(exact);
        }
        if app.executable_path.is_none() {
            return None;
        }
        let by_name = QuotaTarget::Application(AppKey::new(app.name.clone()));
        rules.contains_key(&by_name).then_some(by_name)
    }

    /// Check the focused application's own rule and the rules of every group
    /// it belongs to.
    ///
    /// A rule whose period has rolled over is reset and counts as not exceeded
    /// for this check.
    pub fn evaluate(
        &self,
        app: &AppKey,
        now: NaiveDateTime,
        usage: &dyn UsageSource,
    ) -> Evaluation {
        let groups = self.groups_containing(app);
        let mut evaluation = Evaluation::default();
        let mut due_for_reset = Vec::new();

        {
            let rules = read_lock(&self.rules, "QuotaStore rules");

            if let Some(target) = Self::application_target(&rules, app) {
                if let Some(rule) = rules.get(&target) {
                    if rule.needs_reset(now) {
                        due_for_reset.push(target);
                    } else {
                        let used = usage.usage_of(app);
                        if rule.is_exceeded(used, now) {
                            evaluation.application_breach = Some(Breach {
                                target,
                                kind: rule.kind().as_str(),
                                usage: used,
                            });
                        } else {
                            evaluation.remaining = rule.remaining(used).filter(|r| !r.is_zero());
                        }
                    }
                }
            }

            for group in &groups {
                let target = QuotaTarget::Group(group.name.clone());
                let Some(rule) = rules.get(&target) else {
                    continue;
                };
                if rule.needs_reset(now) {
                    due_for_reset.push(target);
                    continue;
                }
                let used = usage.usage_of_group(group);
                if rule.is_exceeded(used, now) {
                    evaluation.group_breaches.push(Breach {
                        target,
                        kind: rule.kind().as_str(),
                        usage: used,
                    });
                }
            }
        }

        if !due_for_reset.is_empty() {
            let mut rules = write_lock(&self.rules, "QuotaStore rules");
            for target in due_for_reset {
                // Another evaluation may have reset it in between
                if let Some(rule) = rules.get_mut(&target).filter(|r| r.needs_reset(now)) {
                    info!("Resetting {} quota window for {target}", rule.kind().as_str());
                    rule.reset(now);
                }
            }
        }

        evaluation
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        QuotaSnapshot {
            groups: self.groups(),
            rules: self
                .list_limits()
                .into_iter()
                .map(|(target, rule)| RuleEntry { target, rule })
                .collect(),
        }
    }

    /// Replace the whole store. Nothing changes unless every group and rule
    /// in `snapshot` is valid.
    pub fn restore(&self, snapshot: QuotaSnapshot) -> Result<(), EngineError> {
        let mut groups = BTreeMap::new();
        for group in snapshot.groups {
            let name = validate_name("group_name", &group.name)?;
            if groups.contains_key(&name) {
                return Err(EngineError::AlreadyExists { name });
            }
            let mut validated = ApplicationGroup::new(name.clone());
            for member in group.members() {
                validated.add(validate_app_key(member.clone())?);
            }
            groups.insert(name, validated);
        }

        let mut rules = HashMap::new();
        for RuleEntry { target, rule } in snapshot.rules {
            let target = normalize_target(target)?;
            if let QuotaTarget::Group(name) = &target {
                if !groups.contains_key(name) {
                    return Err(EngineError::NotFound { entity: "Group" });
                }
            }
            validate_rule(&rule)?;
            rules.insert(target, rule);
        }

        info!("Restored {} group(s) and {} rule(s)", groups.len(), rules.len());
        *write_lock(&self.groups, "QuotaStore groups") = groups;
        *write_lock(&self.rules, "QuotaStore rules") = rules;
        Ok(())
    }

    fn validate_target(&self, target: QuotaTarget) -> Result<QuotaTarget, EngineError> {
        let target = normalize_target(target)?;
        if let QuotaTarget::Group(name) = &target {
            if !read_lock(&self.groups, "QuotaStore groups").contains_key(name) {
                return Err(EngineError::NotFound { entity: "Group" });
            }
        }
        Ok(target)
    }
}

fn validate_app_key(app: AppKey) -> Result<AppKey, EngineError> {
    Ok(AppKey {
        name: validate_name("application_name", &app.name)?,
        executable_path: app.executable_path,
    })
}

fn normalize_target(target: QuotaTarget) -> Result<QuotaTarget, EngineError> {
    match target {
        QuotaTarget::Application(app) => Ok(QuotaTarget::Application(validate_app_key(app)?)),
        QuotaTarget::Group(name) => Ok(QuotaTarget::Group(validate_name("group_name", &name)?)),
    }
}

fn validate_rule(rule: &LimitRule) -> Result<(), EngineError> {
    match rule.kind() {
        LimitKind::Daily { threshold } | LimitKind::Weekly { threshold } => {
            validate_threshold(*threshold)
        }
        LimitKind::Schedule { schedule } => schedule
            .windows()
            .iter()
            .try_for_each(|w| validate_time_window(w.start, w.end)),
    }
}
