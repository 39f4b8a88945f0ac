//! The model: parsed definitions, effect rule, and compiled matcher.

use std::path::Path;
use std::str::FromStr;

use tracing::debug;
use turnstile_config::Config;
use turnstile_matcher::{Environment, EvalResult, Program, Value};

use crate::definition::{PolicyDefinition, RequestDefinition, RoleMapping};
use crate::effect::PolicyEffect;
use crate::policy::{Policy, Request};
use crate::{AttrValue, ModelError, ModelResult};

const REQUEST_SECTION: &str = "request_definition";
const POLICY_SECTION: &str = "policy_definition";
const EFFECT_SECTION: &str = "policy_effect";
const MATCHER_SECTION: &str = "matchers";
const ROLE_SECTION: &str = "role_definition";

/// A validated PERM model. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Model {
    request: RequestDefinition,
    policies: Vec<PolicyDefinition>,
    effect: PolicyEffect,
    matcher: Program,
    role_mappings: Vec<RoleMapping>,
}

impl Model {
    /// Reads and validates a model file.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] for I/O failures, missing or malformed
    /// sections, unrecognized effect rules, and matcher compile errors.
    pub async fn from_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let config = Config::from_file(path).await?;
        Self::from_config(&config)
    }

    /// Validates an already-parsed configuration.
    ///
    /// # Errors
    ///
    /// Same validation failures as [`Model::from_file`], minus I/O.
    pub fn from_config(config: &Config) -> ModelResult<Self> {
        let request_section = config
            .section(REQUEST_SECTION)
            .ok_or(ModelError::MissingSection {
                section: REQUEST_SECTION,
            })?;
        let [(request_key, request_attrs)] = request_section.entries() else {
            return Err(ModelError::InvalidRequestDefinition);
        };
        let request = RequestDefinition::new(request_key, request_attrs)?;

        let policy_section = config
            .section(POLICY_SECTION)
            .ok_or(ModelError::MissingSection {
                section: POLICY_SECTION,
            })?;
        if policy_section.entries().is_empty() {
            return Err(ModelError::InvalidPolicyDefinition);
        }
        let mut policies = Vec::with_capacity(policy_section.entries().len());
        for (key, attrs) in policy_section.entries() {
            if policies.iter().any(|d: &PolicyDefinition| d.key() == key) {
                return Err(ModelError::InvalidPolicyDefinition);
            }
            policies.push(PolicyDefinition::new(key, attrs)?);
        }

        let effect_section = config
            .section(EFFECT_SECTION)
            .ok_or(ModelError::MissingSection {
                section: EFFECT_SECTION,
            })?;
        let [(_, effect_rule)] = effect_section.entries() else {
            return Err(ModelError::InvalidPolicyEffect);
        };
        let effect = PolicyEffect::parse(effect_rule)?;

        let matcher_section = config
            .section(MATCHER_SECTION)
            .ok_or(ModelError::MissingSection {
                section: MATCHER_SECTION,
            })?;
        let [(_, matcher_source)] = matcher_section.entries() else {
            return Err(ModelError::InvalidMatchers);
        };
        if matcher_source.is_empty() {
            return Err(ModelError::InvalidMatchers);
        }
        let matcher = Program::compile(matcher_source)?;

        let mut role_mappings = Vec::new();
        if let Some(role_section) = config.section(ROLE_SECTION) {
            for (name, arity) in role_section.entries() {
                if role_mappings.iter().any(|m: &RoleMapping| m.name() == name) {
                    return Err(ModelError::InvalidRoleDefinition);
                }
                role_mappings.push(RoleMapping::new(name, arity)?);
            }
        }

        debug!(
            request_key = request.key(),
            policy_definitions = policies.len(),
            role_mappings = role_mappings.len(),
            "model loaded"
        );

        Ok(Self {
            request,
            policies,
            effect,
            matcher,
            role_mappings,
        })
    }

    /// Returns the request definition.
    #[must_use]
    pub fn request_definition(&self) -> &RequestDefinition {
        &self.request
    }

    /// Returns all policy definitions.
    #[must_use]
    pub fn policy_definitions(&self) -> &[PolicyDefinition] {
        &self.policies
    }

    /// Returns the policy definition for `key`, if declared.
    #[must_use]
    pub fn policy_definition(&self, key: &str) -> Option<&PolicyDefinition> {
        self.policies.iter().find(|d| d.key() == key)
    }

    /// Returns the effect rule.
    #[must_use]
    pub fn effect(&self) -> PolicyEffect {
        self.effect
    }

    /// Returns the compiled matcher program.
    #[must_use]
    pub fn matcher(&self) -> &Program {
        &self.matcher
    }

    /// Returns the declared role mappings in declaration order.
    #[must_use]
    pub fn role_mappings(&self) -> &[RoleMapping] {
        &self.role_mappings
    }

    /// Returns the role mapping named `name`, if declared.
    #[must_use]
    pub fn role_mapping(&self, name: &str) -> Option<&RoleMapping> {
        self.role_mappings.iter().find(|m| m.name() == name)
    }

    /// True iff some policy definition uses `key`.
    #[must_use]
    pub fn has_policy_key(&self, key: &str) -> bool {
        self.policy_definition(key).is_some()
    }

    /// True iff a role mapping named `name` is declared.
    #[must_use]
    pub fn has_role_mapping(&self, name: &str) -> bool {
        self.role_mapping(name).is_some()
    }

    /// Builds a [`Request`] from positional values.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidRequest`] when the arity differs from
    /// the request definition or a value is neither string nor number.
    pub fn create_request(&self, values: Vec<Value>) -> ModelResult<Request> {
        if values.len() != self.request.arity() {
            return Err(ModelError::InvalidRequest);
        }
        let mut attrs = Vec::with_capacity(values.len());
        for (name, value) in self.request.attrs().iter().zip(values) {
            let value = AttrValue::try_from(value).map_err(|_| ModelError::InvalidRequest)?;
            attrs.push((name.clone(), value));
        }
        Ok(Request::new(self.request.key(), attrs))
    }

    /// Builds a [`Policy`] from a key and positional values.
    ///
    /// The trailing `eft` value may be omitted and defaults to `"allow"`;
    /// when supplied it must be `"allow"` or `"deny"`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UndefinedPolicyKey`] for an unknown key,
    /// [`ModelError::InvalidPolicy`] on arity mismatch,
    /// [`ModelError::InvalidEft`] on a bad effect value, and
    /// [`ModelError::InvalidAttrType`] on a value that is neither string
    /// nor number.
    pub fn create_policy(&self, key: &str, values: Vec<Value>) -> ModelResult<Policy> {
        let definition = self
            .policy_definition(key)
            .ok_or_else(|| ModelError::UndefinedPolicyKey {
                key: key.to_owned(),
            })?;

        let mut attr_values = Vec::with_capacity(values.len() + 1);
        for value in values {
            attr_values.push(AttrValue::try_from(value)?);
        }

        if attr_values.len() + 1 == definition.arity() {
            attr_values.push(AttrValue::from("allow"));
        } else if attr_values.len() == definition.arity() {
            let Some(eft) = attr_values.last() else {
                return Err(ModelError::InvalidPolicy);
            };
            if !matches!(eft.as_str(), Some("allow" | "deny")) {
                return Err(ModelError::InvalidEft {
                    value: eft.to_string(),
                });
            }
        } else {
            return Err(ModelError::InvalidPolicy);
        }

        let attrs = definition
            .attrs()
            .iter()
            .cloned()
            .zip(attr_values)
            .collect();
        Ok(Policy::new(key, attrs))
    }

    /// Evaluates the matcher for one request/policy pair.
    ///
    /// The environment is overlaid with the request and policy bound under
    /// their keys; `env` itself is left untouched.
    ///
    /// # Errors
    ///
    /// Propagates matcher evaluation errors; callers typically treat them
    /// as a non-match.
    pub fn matches(
        &self,
        request: &Request,
        policy: &Policy,
        env: &Environment,
    ) -> EvalResult<bool> {
        let mut scope = env.clone();
        scope.insert(request.key().to_owned(), request.to_record());
        scope.insert(policy.key().to_owned(), policy.to_record());
        self.matcher.eval_bool(&scope)
    }

    /// Folds matched policies through the effect rule.
    #[must_use]
    pub fn allow<'a>(&self, matched: impl IntoIterator<Item = &'a Policy>) -> bool {
        self.effect.resolve(matched.into_iter().map(Policy::eft))
    }
}

impl FromStr for Model {
    type Err = ModelError;

    fn from_str(text: &str) -> ModelResult<Self> {
        let config: Config = text.parse()?;
        Self::from_config(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACL_MODEL: &str = r"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
";

    const RBAC_MODEL: &str = r"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _
g2 = _, _, _

[policy_effect]
e = !some(where (p.eft == deny))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
";

    fn acl() -> Model {
        ACL_MODEL.parse().unwrap()
    }

    fn strs(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    #[test]
    fn parses_a_complete_model() {
        let model: Model = RBAC_MODEL.parse().unwrap();
        assert_eq!(model.request_definition().attrs(), ["sub", "obj", "act"]);
        assert_eq!(model.effect(), PolicyEffect::DenyOverride);
        assert!(model.has_policy_key("p"));
        assert!(!model.has_policy_key("p2"));
        assert!(model.has_role_mapping("g"));
        assert!(model.has_role_mapping("g2"));
        assert!(!model.has_role_mapping("g3"));
        assert!(!model.matcher().instrs().is_empty());
    }

    #[test]
    fn each_missing_required_section_is_named() {
        for section in [
            "request_definition",
            "policy_definition",
            "policy_effect",
            "matchers",
        ] {
            let mut text = String::new();
            for part in [
                ("request_definition", "r = sub, obj, act"),
                ("policy_definition", "p = sub, obj, act"),
                ("policy_effect", "e = some(where (p.eft == allow))"),
                ("matchers", "m = r.sub == p.sub"),
            ] {
                if part.0 != section {
                    text.push_str(&format!("[{}]\n{}\n", part.0, part.1));
                }
            }
            let err = text.parse::<Model>().unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("missing {section} section in the config file"),
            );
        }
    }

    #[test]
    fn role_definition_is_optional() {
        let model = acl();
        assert!(model.role_mappings().is_empty());
    }

    #[test]
    fn bad_role_definition_values_fail() {
        let text = RBAC_MODEL.replace("g = _, _", "g = left, right");
        assert!(matches!(
            text.parse::<Model>(),
            Err(ModelError::InvalidRoleDefinition)
        ));
    }

    #[test]
    fn unrecognized_effect_rule_fails() {
        let text = ACL_MODEL.replace(
            "e = some(where (p.eft == allow))",
            "e = priority(p.eft) || deny",
        );
        assert!(matches!(
            text.parse::<Model>(),
            Err(ModelError::InvalidPolicyEffect)
        ));
    }

    #[test]
    fn matcher_compile_errors_abort_construction() {
        let text = ACL_MODEL.replace(
            "m = r.sub == p.sub && r.obj == p.obj && r.act == p.act",
            "m = r.sub == (p.sub",
        );
        assert!(matches!(
            text.parse::<Model>(),
            Err(ModelError::Compile(_))
        ));
    }

    #[test]
    fn create_request_checks_arity_and_types() {
        let model = acl();
        assert!(model.create_request(strs(&["alice", "data", "read"])).is_ok());
        assert!(matches!(
            model.create_request(strs(&["alice", "data"])),
            Err(ModelError::InvalidRequest)
        ));
        assert!(matches!(
            model.create_request(vec![
                Value::from("alice"),
                Value::Bool(true),
                Value::from("read"),
            ]),
            Err(ModelError::InvalidRequest)
        ));
    }

    #[test]
    fn create_policy_defaults_eft_to_allow() {
        let model = acl();
        let policy = model
            .create_policy("p", strs(&["alice", "data", "read"]))
            .unwrap();
        assert_eq!(policy.eft(), "allow");
        assert_eq!(policy.attrs().len(), 4);
    }

    #[test]
    fn create_policy_accepts_an_explicit_eft() {
        let model = acl();
        let policy = model
            .create_policy("p", strs(&["alice", "data", "read", "deny"]))
            .unwrap();
        assert_eq!(policy.eft(), "deny");
    }

    #[test]
    fn create_policy_rejects_bad_eft_values() {
        let model = acl();
        let err = model
            .create_policy("p", strs(&["alice", "data", "read", "maybe"]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for the eft attribute: maybe"
        );
    }

    #[test]
    fn create_policy_rejects_unknown_keys_and_bad_arity() {
        let model = acl();
        assert_eq!(
            model
                .create_policy("q", strs(&["alice", "data", "read"]))
                .unwrap_err()
                .to_string(),
            "policy with key q is undefined"
        );
        assert!(matches!(
            model.create_policy("p", strs(&["alice"])),
            Err(ModelError::InvalidPolicy)
        ));
    }

    #[test]
    fn matching_overlays_request_and_policy_records() {
        let model = acl();
        let request = model
            .create_request(strs(&["alice", "blog_post", "read"]))
            .unwrap();
        let policy = model
            .create_policy("p", strs(&["alice", "blog_post", "read"]))
            .unwrap();
        let env = Environment::new();
        assert_eq!(model.matches(&request, &policy, &env), Ok(true));

        let other = model
            .create_request(strs(&["bob", "blog_post", "read"]))
            .unwrap();
        assert_eq!(model.matches(&other, &policy, &env), Ok(false));
    }

    #[test]
    fn effect_aggregation_follows_the_rule() {
        let model = acl();
        let allow = model
            .create_policy("p", strs(&["alice", "data", "read"]))
            .unwrap();
        let deny = model
            .create_policy("p", strs(&["alice", "data", "read", "deny"]))
            .unwrap();

        assert!(!model.allow([]));
        assert!(model.allow([&allow]));
        assert!(!model.allow([&deny]));
        assert!(model.allow([&allow, &deny]));
    }

    #[tokio::test]
    async fn from_file_loads_a_model() {
        let mut path = std::env::temp_dir();
        path.push(format!("turnstile-model-{}.conf", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, ACL_MODEL).await.unwrap();

        let model = Model::from_file(&path).await.unwrap();
        assert_eq!(model.request_definition().key(), "r");

        let _ = std::fs::remove_file(path);
    }
}
