//! Attribute-based access control evaluator (spec §4.4 "ABAC evaluator").
//!
//! No direct teacher counterpart — `atlas-pharma` only has the fixed role
//! gate of [`super::roles`]. The rule/condition/operator matrix below is
//! taken directly from the spec; evaluation order and explicit-deny
//! precedence are implemented exactly as described there.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConditionType {
    Time,
    Ip,
    Role,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Operator {
    Equals,
    In,
    Between,
    Matches,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessCondition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub operator: Operator,
    pub value: Value,
    /// Only consulted when `kind == ConditionType::Custom`: the key this
    /// condition looks up in the evaluator's custom-fact context.
    #[serde(default)]
    pub custom_key: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessRule {
    pub id: String,
    pub resource: String,
    pub action: String,
    pub effect: Effect,
    pub conditions: Vec<AccessCondition>,
}

/// Request-time facts a rule's conditions are evaluated against.
pub struct Context<'a> {
    pub resource: &'a str,
    pub action: &'a str,
    pub roles: &'a HashSet<Role>,
    /// Local hour of day, 0-23.
    pub current_hour: u32,
    pub ip: Option<&'a str>,
    pub custom: &'a HashMap<String, Value>,
}

fn matches_pattern(pattern: &str, value: &str) -> bool {
    pattern == "*" || pattern == value
}

fn numeric_of(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn eval_between(operand: f64, rule_value: &Value) -> bool {
    match rule_value.as_array() {
        Some(arr) if arr.len() == 2 => match (numeric_of(&arr[0]), numeric_of(&arr[1])) {
            (Some(lo), Some(hi)) => operand >= lo && operand <= hi,
            _ => false,
        },
        _ => false,
    }
}

fn eval_condition(condition: &AccessCondition, ctx: &Context) -> bool {
    match condition.kind {
        ConditionType::Time => match condition.operator {
            Operator::Equals => numeric_of(&condition.value)
                .map(|v| v as u32 == ctx.current_hour)
                .unwrap_or(false),
            Operator::In => condition
                .value
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(numeric_of)
                        .any(|v| v as u32 == ctx.current_hour)
                })
                .unwrap_or(false),
            Operator::Between => eval_between(ctx.current_hour as f64, &condition.value),
            Operator::Matches => false,
        },
        ConditionType::Ip => {
            let ip = match ctx.ip {
                Some(ip) => ip,
                None => return false,
            };
            match condition.operator {
                Operator::Equals => condition.value.as_str().map(|v| v == ip).unwrap_or(false),
                Operator::In => condition
                    .value
                    .as_array()
                    .map(|arr| arr.iter().any(|v| v.as_str() == Some(ip)))
                    .unwrap_or(false),
                Operator::Matches => condition
                    .value
                    .as_str()
                    .and_then(|pattern| Regex::new(pattern).ok())
                    .map(|re| re.is_match(ip))
                    .unwrap_or(false),
                Operator::Between => false,
            }
        }
        ConditionType::Role => match condition.operator {
            Operator::Equals => condition
                .value
                .as_str()
                .map(|role| ctx.roles.iter().any(|r| r.0 == role))
                .unwrap_or(false),
            Operator::In => condition
                .value
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str())
                        .any(|role| ctx.roles.iter().any(|r| r.0 == role))
                })
                .unwrap_or(false),
            Operator::Matches | Operator::Between => false,
        },
        ConditionType::Custom => {
            let key = match &condition.custom_key {
                Some(k) => k,
                None => return false,
            };
            let fact = match ctx.custom.get(key) {
                Some(v) => v,
                None => return false,
            };
            match condition.operator {
                Operator::Equals => fact == &condition.value,
                Operator::In => condition
                    .value
                    .as_array()
                    .map(|arr| arr.contains(fact))
                    .unwrap_or(false),
                Operator::Between => numeric_of(fact)
                    .map(|operand| eval_between(operand, &condition.value))
                    .unwrap_or(false),
                Operator::Matches => match (fact.as_str(), condition.value.as_str()) {
                    (Some(f), Some(pattern)) => Regex::new(pattern).map(|re| re.is_match(f)).unwrap_or(false),
                    _ => false,
                },
            }
        }
    }
}

fn rule_matches(rule: &AccessRule, ctx: &Context) -> bool {
    matches_pattern(&rule.resource, ctx.resource)
        && matches_pattern(&rule.action, ctx.action)
        && rule.conditions.iter().all(|c| eval_condition(c, ctx))
}

/// Evaluates a rule set in registration order. Default decision is deny; an
/// explicit deny match always wins, even over a later-evaluated allow.
pub fn evaluate(rules: &[AccessRule], ctx: &Context) -> Effect {
    let mut decision = Effect::Deny;
    for rule in rules {
        if !rule_matches(rule, ctx) {
            continue;
        }
        match rule.effect {
            Effect::Deny => return Effect::Deny,
            Effect::Allow => decision = Effect::Allow,
        }
    }
    decision
}

/// Owns the registered rule list. Mutation and reads both go through the
/// lock; reads return an owned clone rather than a guard (see DESIGN.md).
pub struct AbacEvaluator {
    rules: Arc<RwLock<Vec<AccessRule>>>,
}

impl Default for AbacEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl AbacEvaluator {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn register(&self, rule: AccessRule) {
        self.rules.write().await.push(rule);
    }

    pub async fn evaluate(&self, ctx: &Context<'_>) -> Effect {
        let rules = self.rules.read().await;
        evaluate(&rules, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(roles: &'a HashSet<Role>, custom: &'a HashMap<String, Value>) -> Context<'a> {
        Context {
            resource: "secret:db",
            action: "read",
            roles,
            current_hour: 12,
            ip: Some("10.0.0.1"),
            custom,
        }
    }

    #[test]
    fn explicit_deny_wins_regardless_of_order() {
        let rules = vec![
            AccessRule {
                id: "allow-all".into(),
                resource: "*".into(),
                action: "*".into(),
                effect: Effect::Allow,
                conditions: vec![],
            },
            AccessRule {
                id: "deny-db-read".into(),
                resource: "secret:db".into(),
                action: "read".into(),
                effect: Effect::Deny,
                conditions: vec![],
            },
        ];
        let roles = HashSet::new();
        let custom = HashMap::new();
        assert_eq!(evaluate(&rules, &ctx(&roles, &custom)), Effect::Deny);
    }

    #[test]
    fn default_decision_is_deny() {
        let roles = HashSet::new();
        let custom = HashMap::new();
        assert_eq!(evaluate(&[], &ctx(&roles, &custom)), Effect::Deny);
    }

    #[test]
    fn malformed_condition_is_inert_not_error() {
        let rules = vec![AccessRule {
            id: "bad-shape".into(),
            resource: "*".into(),
            action: "*".into(),
            effect: Effect::Allow,
            conditions: vec![AccessCondition {
                kind: ConditionType::Time,
                operator: Operator::Matches, // time never supports `matches`
                value: Value::String("whatever".into()),
                custom_key: None,
            }],
        }];
        let roles = HashSet::new();
        let custom = HashMap::new();
        // Condition is false => rule doesn't match => default deny, no panic.
        assert_eq!(evaluate(&rules, &ctx(&roles, &custom)), Effect::Deny);
    }

    #[test]
    fn role_in_matches_any_actor_role() {
        let rules = vec![AccessRule {
            id: "writers-only".into(),
            resource: "*".into(),
            action: "*".into(),
            effect: Effect::Allow,
            conditions: vec![AccessCondition {
                kind: ConditionType::Role,
                operator: Operator::In,
                value: serde_json::json!(["writer", "admin"]),
                custom_key: None,
            }],
        }];
        let roles = HashSet::from([Role::from("writer")]);
        let custom = HashMap::new();
        assert_eq!(evaluate(&rules, &ctx(&roles, &custom)), Effect::Allow);
    }

    #[tokio::test]
    async fn evaluator_registers_rules_in_order() {
        let evaluator = AbacEvaluator::new();
        evaluator
            .register(AccessRule {
                id: "allow-all".into(),
                resource: "*".into(),
                action: "*".into(),
                effect: Effect::Allow,
                conditions: vec![],
            })
            .await;
        evaluator
            .register(AccessRule {
                id: "deny-db".into(),
                resource: "secret:db".into(),
                action: "read".into(),
                effect: Effect::Deny,
                conditions: vec![],
            })
            .await;

        let roles = HashSet::new();
        let custom = HashMap::new();
        assert_eq!(evaluator.evaluate(&ctx(&roles, &custom)).await, Effect::Deny);
    }
}
