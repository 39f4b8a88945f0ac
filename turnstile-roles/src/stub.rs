//! Matcher-function stubs over role group snapshots.

use std::sync::Arc;

use turnstile_matcher::{EvalError, EvalResult, Value};

use crate::RoleGroup;

fn str_arg<'a>(args: &'a [Value], idx: usize, name: &str) -> EvalResult<&'a str> {
    match args.get(idx) {
        Some(Value::Str(s)) => Ok(s.as_str()),
        Some(other) => Err(EvalError::TypeMismatch {
            op: "role query",
            operand: other.type_name(),
        }),
        None => Err(EvalError::Arity {
            function: name.to_owned(),
            got: args.len(),
        }),
    }
}

/// Builds the 2-argument matcher callable for a role group:
/// `g(child, parent)` is true iff the group has a path `child => parent`.
///
/// The stub captures a snapshot; the enforcer installs a fresh one after
/// every mapping-policy mutation.
#[must_use]
pub fn stub_2(group: Arc<RoleGroup>) -> Value {
    let name = group.name().to_owned();
    Value::function(move |args| {
        if args.len() != 2 {
            return Err(EvalError::Arity {
                function: name.clone(),
                got: args.len(),
            });
        }
        let child = str_arg(args, 0, &name)?;
        let parent = str_arg(args, 1, &name)?;
        Ok(Value::Bool(group.has_inheritance(child, parent)))
    })
}

/// Builds the 3-argument, domain-qualified matcher callable:
/// `g(child, parent, domain)` concatenates the domain onto both role
/// identifiers to form the opaque vertex keys the mapping policies were
/// stored under, so inheritance chains stay transitive within one domain
/// and invisible from any other.
#[must_use]
pub fn stub_3(group: Arc<RoleGroup>) -> Value {
    let name = group.name().to_owned();
    Value::function(move |args| {
        if args.len() != 3 {
            return Err(EvalError::Arity {
                function: name.clone(),
                got: args.len(),
            });
        }
        let child = str_arg(args, 0, &name)?;
        let parent = str_arg(args, 1, &name)?;
        let domain = str_arg(args, 2, &name)?;
        Ok(Value::Bool(group.has_inheritance(
            &format!("{child}{domain}"),
            &format!("{parent}{domain}"),
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(stub: &Value, args: &[Value]) -> EvalResult<Value> {
        match stub {
            Value::Function(f) => f(args),
            other => panic!("not a function: {other:?}"),
        }
    }

    #[test]
    fn two_arg_stub_answers_reachability() {
        let mut group = RoleGroup::new("g");
        group.add_inheritance("bob", "reader");
        let stub = stub_2(Arc::new(group));

        assert_eq!(
            call(&stub, &["bob".into(), "reader".into()]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call(&stub, &["reader".into(), "bob".into()]),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            call(&stub, &["x".into(), "x".into()]),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn two_arg_stub_rejects_wrong_arity() {
        let stub = stub_2(Arc::new(RoleGroup::new("g")));
        assert_eq!(
            call(&stub, &["only".into()]),
            Err(EvalError::Arity {
                function: "g".into(),
                got: 1
            })
        );
    }

    #[test]
    fn three_arg_stub_qualifies_both_roles_with_the_domain() {
        let mut group = RoleGroup::new("g");
        // Stored the way the enforcer stores 4-tuple mapping policies.
        group.add_inheritance("alicedomain1", "admindomain1");
        group.add_inheritance("admindomain1", "readerdomain1");
        let stub = stub_3(Arc::new(group));

        assert_eq!(
            call(&stub, &["alice".into(), "admin".into(), "domain1".into()]),
            Ok(Value::Bool(true))
        );
        // Transitive within the domain.
        assert_eq!(
            call(&stub, &["alice".into(), "reader".into(), "domain1".into()]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call(&stub, &["alice".into(), "admin".into(), "domain2".into()]),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn non_string_arguments_are_type_errors() {
        let stub = stub_2(Arc::new(RoleGroup::new("g")));
        let err = call(&stub, &[Value::Num(1.0), "x".into()]).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }
}
