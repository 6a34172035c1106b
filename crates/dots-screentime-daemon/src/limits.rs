use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use dots_screentime_common::time::{format_time_of_day, parse_time_of_day};
use dots_screentime_common::{ActionOnLimit, LimitReason, LimitRule};
use dots_screentime_db::queries::RuleQueries;
use dots_screentime_db::Database;
use dots_screentime_proto::dto::LimitRuleDto;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Outcome of evaluating one app that is over its limit or in curfew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub app_id: Uuid,
    pub process_name: String,
    pub reason: LimitReason,
    pub action: ActionOnLimit,
    /// True only on the tick the app became alerted
    pub notify: bool,
    /// Pids to terminate this tick; each pid appears once per alert cycle
    pub terminate: Vec<u32>,
}

#[derive(Debug, Default)]
struct Alert {
    /// Pids already handed out for termination this cycle
    attempted: HashSet<u32>,
}

#[derive(Debug, Default)]
struct AlertBook {
    date: Option<NaiveDate>,
    alerts: HashMap<String, Alert>,
    extensions: HashMap<String, i64>,
}

/// Per-app limit state machine.
///
/// An app with an enabled rule is armed. Crossing its daily limit or
/// entering its curfew alerts it exactly once; it stays alerted until the
/// condition clears, an extension is granted, or the local date changes.
/// Rules and extensions are keyed by lower-cased process name.
pub struct LimitEvaluator {
    rules: RwLock<HashMap<String, LimitRule>>,
    book: Mutex<AlertBook>,
}

impl LimitEvaluator {
    pub fn new() -> Self {
        Self { rules: RwLock::new(HashMap::new()), book: Mutex::new(AlertBook::default()) }
    }

    /// Replace the rule cache with every enabled rule in the store.
    pub async fn reload_rules(&self, db: &Database) -> Result<usize> {
        let bindings = RuleQueries::list_enabled_bindings(db)
            .await
            .context("Failed to load limit rules")?;

        let mut rules = HashMap::with_capacity(bindings.len());
        for binding in bindings {
            let rule = LimitRule::try_from(binding.rule)?;
            rules.insert(binding.process_name.to_lowercase(), rule);
        }

        let count = rules.len();
        *self.rules.write() = rules;
        debug!("Loaded {} enabled limit rules", count);
        Ok(count)
    }

    pub fn set_rules(&self, rules: HashMap<String, LimitRule>) {
        let rules = rules.into_iter().map(|(name, rule)| (name.to_lowercase(), rule)).collect();
        *self.rules.write() = rules;
    }

    pub fn rule_for(&self, process_name: &str) -> Option<LimitRule> {
        self.rules.read().get(&process_name.to_lowercase()).cloned()
    }

    pub fn extension_minutes(&self, process_name: &str) -> i64 {
        self.book.lock().extensions.get(&process_name.to_lowercase()).copied().unwrap_or(0)
    }

    /// Add minutes to today's effective limit and re-arm the app.
    pub fn grant_extension(&self, process_name: &str, minutes: i64) -> i64 {
        let key = process_name.to_lowercase();
        let mut book = self.book.lock();
        book.alerts.remove(&key);
        let total = book.extensions.entry(key).or_insert(0);
        *total = total.saturating_add(minutes);
        info!("Granted {} extra minutes to {} ({} total)", minutes, process_name, total);
        *total
    }

    pub fn is_alerted(&self, process_name: &str) -> bool {
        self.book.lock().alerts.contains_key(&process_name.to_lowercase())
    }

    /// Check one app against its rule.
    ///
    /// `pids` are the app's currently running instances, `used_seconds` its
    /// usage so far today and `local` the current local time. Returns `None`
    /// when the app has no enabled rule or is within its limits.
    pub fn evaluate(
        &self,
        process_name: &str,
        pids: &[u32],
        used_seconds: i64,
        local: NaiveDateTime,
    ) -> Option<Verdict> {
        let key = process_name.to_lowercase();
        let rule = self.rules.read().get(&key).cloned()?;
        if !rule.enabled {
            return None;
        }

        let mut book = self.book.lock();
        if book.date != Some(local.date()) {
            if book.date.is_some() {
                debug!("Local date changed, clearing limit alerts");
            }
            book.date = Some(local.date());
            book.alerts.clear();
        }

        let in_curfew = rule.curfew().is_some_and(|curfew| curfew.contains(local.time()));
        let over_limit = rule.daily_limit_minutes.is_some_and(|limit| {
            let extension = book.extensions.get(&key).copied().unwrap_or(0);
            used_seconds >= limit.saturating_add(extension).saturating_mul(60)
        });

        let reason = if in_curfew {
            LimitReason::Curfew
        } else if over_limit {
            LimitReason::DailyLimit
        } else {
            if book.alerts.remove(&key).is_some() {
                debug!("{} is back within its limits", key);
            }
            return None;
        };

        let notify = !book.alerts.contains_key(&key);
        let alert = book.alerts.entry(key).or_default();

        let terminate: Vec<u32> = if rule.action_on_limit.terminates() {
            pids.iter().copied().filter(|pid| !alert.attempted.contains(pid)).collect()
        } else {
            Vec::new()
        };
        alert.attempted.extend(terminate.iter().copied());

        Some(Verdict {
            app_id: rule.app_id,
            process_name: process_name.to_string(),
            reason,
            action: rule.action_on_limit,
            notify,
            terminate,
        })
    }
}

impl Default for LimitEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn rule_to_dto(rule: &LimitRule, process_name: &str, display_name: &str) -> LimitRuleDto {
    LimitRuleDto {
        app_id: rule.app_id,
        process_name: process_name.to_string(),
        display_name: display_name.to_string(),
        daily_limit_minutes: rule.daily_limit_minutes,
        curfew_start: rule.curfew_start.map(format_time_of_day),
        curfew_end: rule.curfew_end.map(format_time_of_day),
        action_on_limit: rule.action_on_limit,
        enabled: rule.enabled,
    }
}

pub fn dto_to_rule(dto: &LimitRuleDto) -> Result<LimitRule> {
    if let Some(minutes) = dto.daily_limit_minutes {
        anyhow::ensure!(minutes >= 0, "Daily limit must not be negative");
    }

    let parse = |value: &Option<String>| -> Result<_> {
        match value.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(Some(parse_time_of_day(text)?)),
            _ => Ok(None),
        }
    };

    Ok(LimitRule {
        app_id: dto.app_id,
        daily_limit_minutes: dto.daily_limit_minutes,
        curfew_start: parse(&dto.curfew_start)?,
        curfew_end: parse(&dto.curfew_end)?,
        action_on_limit: dto.action_on_limit,
        enabled: dto.enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn evaluator_with(rule: LimitRule) -> LimitEvaluator {
        let evaluator = LimitEvaluator::new();
        evaluator.set_rules(HashMap::from([("Game".to_string(), rule)]));
        evaluator
    }

    fn daily(minutes: i64, action: ActionOnLimit) -> LimitRule {
        let mut rule = LimitRule::new(Uuid::new_v4());
        rule.daily_limit_minutes = Some(minutes);
        rule.action_on_limit = action;
        rule
    }

    #[test]
    fn test_bdd_given_sixty_minute_limit_when_usage_reaches_3600_then_violation() {
        let evaluator = evaluator_with(daily(60, ActionOnLimit::NotifyOnly));

        assert!(evaluator.evaluate("game", &[1], 3599, at(12, 0)).is_none());

        let verdict = evaluator.evaluate("game", &[1], 3600, at(12, 0)).unwrap();
        assert_eq!(verdict.reason, LimitReason::DailyLimit);
        assert!(verdict.notify);
        assert!(verdict.terminate.is_empty());
    }

    #[test]
    fn test_bdd_given_alerted_app_when_evaluated_again_then_no_second_notification() {
        let evaluator = evaluator_with(daily(60, ActionOnLimit::NotifyOnly));

        assert!(evaluator.evaluate("GAME", &[1], 3600, at(12, 0)).unwrap().notify);
        assert!(!evaluator.evaluate("game", &[1], 3700, at(12, 1)).unwrap().notify);
        assert!(evaluator.is_alerted("game"));
    }

    #[test]
    fn test_bdd_given_extension_when_granted_then_threshold_moves_to_75_minutes() {
        let evaluator = evaluator_with(daily(60, ActionOnLimit::NotifyOnly));
        assert!(evaluator.evaluate("game", &[1], 3600, at(12, 0)).unwrap().notify);

        assert_eq!(evaluator.grant_extension("Game", 15), 15);
        assert!(!evaluator.is_alerted("game"));

        assert!(evaluator.evaluate("game", &[1], 3601, at(12, 1)).is_none());
        assert!(evaluator.evaluate("game", &[1], 4499, at(12, 15)).is_none());

        let verdict = evaluator.evaluate("game", &[1], 4500, at(12, 16)).unwrap();
        assert!(verdict.notify);
        assert_eq!(evaluator.extension_minutes("GAME"), 15);
    }

    #[test]
    fn test_bdd_given_wrapping_curfew_when_evaluated_then_night_hours_violate() {
        let mut rule = LimitRule::new(Uuid::new_v4());
        rule.curfew_start = NaiveTime::from_hms_opt(22, 0, 0);
        rule.curfew_end = NaiveTime::from_hms_opt(7, 0, 0);
        let evaluator = evaluator_with(rule);

        let verdict = evaluator.evaluate("game", &[1], 0, at(23, 0)).unwrap();
        assert_eq!(verdict.reason, LimitReason::Curfew);
        assert!(evaluator.evaluate("game", &[1], 0, at(3, 0)).is_some());
        assert!(evaluator.evaluate("game", &[1], 0, at(12, 0)).is_none());
    }

    #[test]
    fn test_bdd_given_force_close_when_violating_then_each_pid_terminated_once() {
        let evaluator = evaluator_with(daily(10, ActionOnLimit::ForceClose));

        let first = evaluator.evaluate("game", &[1, 2], 600, at(12, 0)).unwrap();
        assert_eq!(first.terminate.len(), 2);

        let second = evaluator.evaluate("game", &[1, 2, 3], 601, at(12, 0)).unwrap();
        assert_eq!(second.terminate, vec![3]);
        assert!(!second.notify);
    }

    #[test]
    fn test_bdd_given_block_new_when_limit_reached_then_running_instance_is_terminated_once() {
        let evaluator = evaluator_with(daily(60, ActionOnLimit::BlockNew));

        let first = evaluator.evaluate("game", &[100], 3600, at(12, 0)).unwrap();
        assert!(first.notify);
        assert_eq!(first.terminate, vec![100]);

        let second = evaluator.evaluate("game", &[100, 105], 3620, at(12, 1)).unwrap();
        assert!(!second.notify);
        assert_eq!(second.terminate, vec![105]);
    }

    #[test]
    fn test_huge_limit_and_extension_do_not_overflow() {
        let evaluator = evaluator_with(daily(i64::MAX / 2, ActionOnLimit::NotifyOnly));
        evaluator.grant_extension("game", i64::MAX);
        evaluator.grant_extension("game", i64::MAX);

        assert_eq!(evaluator.extension_minutes("game"), i64::MAX);
        assert!(evaluator.evaluate("game", &[1], i64::MAX - 1, at(12, 0)).is_none());
    }

    #[test]
    fn test_bdd_given_new_day_when_evaluated_then_alert_rearms() {
        let evaluator = evaluator_with(daily(10, ActionOnLimit::NotifyOnly));
        assert!(evaluator.evaluate("game", &[1], 600, at(23, 59)).unwrap().notify);

        let tomorrow = at(0, 30) + chrono::Duration::days(1);
        assert!(evaluator.evaluate("game", &[1], 600, tomorrow).unwrap().notify);
    }

    #[test]
    fn test_disabled_or_missing_rule_never_violates() {
        let mut rule = daily(0, ActionOnLimit::ForceClose);
        rule.enabled = false;
        let evaluator = evaluator_with(rule);

        assert!(evaluator.evaluate("game", &[1], 10_000, at(12, 0)).is_none());
        assert!(evaluator.evaluate("other", &[1], 10_000, at(12, 0)).is_none());
    }

    #[test]
    fn test_dto_conversion_round_trip() {
        let dto = LimitRuleDto {
            app_id: Uuid::new_v4(),
            process_name: "steam".to_string(),
            display_name: "Steam".to_string(),
            daily_limit_minutes: Some(90),
            curfew_start: Some("21:30".to_string()),
            curfew_end: Some("06:00".to_string()),
            action_on_limit: ActionOnLimit::BlockNew,
            enabled: true,
        };

        let rule = dto_to_rule(&dto).unwrap();
        assert!(rule.curfew().unwrap().wraps_midnight());
        assert_eq!(rule_to_dto(&rule, "steam", "Steam"), dto);
    }

    #[test]
    fn test_dto_rejects_bad_curfew_and_negative_limit() {
        let mut dto = LimitRuleDto {
            app_id: Uuid::new_v4(),
            process_name: String::new(),
            display_name: String::new(),
            daily_limit_minutes: None,
            curfew_start: Some("25:00".to_string()),
            curfew_end: None,
            action_on_limit: ActionOnLimit::NotifyOnly,
            enabled: true,
        };
        assert!(dto_to_rule(&dto).is_err());

        dto.curfew_start = Some(String::new());
        dto.daily_limit_minutes = Some(-5);
        assert!(dto_to_rule(&dto).is_err());
    }
}
